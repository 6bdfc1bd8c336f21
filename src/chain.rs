//! Chain allocator: the suballocator scheme backing inode, extent
//! block, and cluster allocation. A dinode with `CHAIN_FL` set owns a
//! `ChainList` of `ChainRec`s, each the head of a linked list of
//! `GroupDescriptor` blocks threaded through `bg_next_group`.
//!
//! Grounded in `examples/original_source/libocfs2/chain.c`
//! (`ocfs2_chain_iterate`, `chain_iterate_gd`/`chain_iterate_cl`: the
//! exact walk and the `bg_blkno`/`bg_chain` cross-check this module's
//! `iterate_chain` reproduces) and `examples/original_source/
//! libocfs2/alloc.c` (`ocfs2_new_inode`, `ocfs2_chain_alloc_with_io`,
//! `ocfs2_chain_add_group` for allocation/growth). Field names cross-
//! referenced against `examples/original_source/fswreck/group.c`.

use binrw::binrw;
use log::warn;

use crate::check::BlockCheck;
use crate::error::{Ocfs2Error, Result};
use crate::io::{BlockDevice, Cache};

pub const GROUP_DESC_SIGNATURE: &[u8; 8] = b"GROUP01\0";

/// Byte offset of `GroupDescriptor::bg_check` within its encoded block,
/// fixed by the field order above (8+2+2+2+2+4+8+8+8).
pub(crate) const GROUP_DESC_CHECK_OFFSET: usize = 44;

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainRec {
    pub c_free: u32,
    pub c_total: u32,
    pub c_blkno: u64,
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainList {
    pub cl_cpg: u16,
    pub cl_bpc: u16,
    pub cl_count: u16,
    pub cl_next_free_rec: u16,
    #[br(count = cl_count)]
    pub cl_recs: Vec<ChainRec>,
}

impl ChainList {
    pub fn new(count: u16, cpg: u16, bpc: u16) -> Self {
        ChainList {
            cl_cpg: cpg,
            cl_bpc: bpc,
            cl_count: count,
            cl_next_free_rec: 0,
            cl_recs: vec![ChainRec::default(); count as usize],
        }
    }

    pub fn recs(&self) -> &[ChainRec] {
        &self.cl_recs[..self.cl_next_free_rec as usize]
    }

    /// Picks the chain with the most free bits, matching the real
    /// allocator's preference for the least-fragmented chain.
    pub fn best_chain(&self) -> Option<usize> {
        self.recs()
            .iter()
            .enumerate()
            .max_by_key(|(_, r)| r.c_free)
            .map(|(i, _)| i)
    }

    pub fn total_free(&self) -> u64 {
        self.recs().iter().map(|r| r.c_free as u64).sum()
    }

    pub fn total_bits(&self) -> u64 {
        self.recs().iter().map(|r| r.c_total as u64).sum()
    }
}

/// A group descriptor: one node in a chain's linked list, describing
/// `bg_bits` allocatable units (clusters or inodes) via a trailing
/// bitmap.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDescriptor {
    #[br(assert(&bg_signature == GROUP_DESC_SIGNATURE, "bad group descriptor signature"))]
    pub bg_signature: [u8; 8],
    pub bg_size: u16,
    pub bg_bits: u16,
    pub bg_free_bits_count: u16,
    pub bg_chain: u16,
    pub bg_generation: u32,
    pub bg_blkno: u64,
    pub bg_next_group: u64,
    pub bg_parent_dinode: u64,
    pub bg_check: BlockCheck,
    #[br(count = (bg_bits as usize).div_ceil(8))]
    pub bg_bitmap: Vec<u8>,
}

impl GroupDescriptor {
    pub fn new(blkno: u64, parent_dinode: u64, chain: u16, bits: u16, generation: u32) -> Self {
        GroupDescriptor {
            bg_signature: *GROUP_DESC_SIGNATURE,
            bg_size: bits.div_ceil(8),
            bg_bits: bits,
            bg_free_bits_count: bits,
            bg_chain: chain,
            bg_generation: generation,
            bg_blkno: blkno,
            bg_next_group: 0,
            bg_parent_dinode: parent_dinode,
            bg_check: BlockCheck::default(),
            bg_bitmap: vec![0u8; bits.div_ceil(8) as usize],
        }
    }

    fn bit_is_set(&self, bit: u16) -> bool {
        self.bg_bitmap[(bit / 8) as usize] & (1 << (bit % 8)) != 0
    }

    fn set_bit(&mut self, bit: u16, used: bool) {
        let byte = &mut self.bg_bitmap[(bit / 8) as usize];
        if used {
            *byte |= 1 << (bit % 8);
        } else {
            *byte &= !(1 << (bit % 8));
        }
    }

    /// Finds and marks the first free bit, mirroring `ocfs2_find_first_free_bit`.
    pub fn alloc_bit(&mut self) -> Option<u16> {
        for bit in 0..self.bg_bits {
            if !self.bit_is_set(bit) {
                self.set_bit(bit, true);
                self.bg_free_bits_count -= 1;
                return Some(bit);
            }
        }
        None
    }

    pub fn free_bit(&mut self, bit: u16) -> Result<()> {
        if bit >= self.bg_bits {
            return Err(Ocfs2Error::InvalidBit(bit as u64));
        }
        if !self.bit_is_set(bit) {
            return Err(Ocfs2Error::InvalidBit(bit as u64));
        }
        self.set_bit(bit, false);
        self.bg_free_bits_count += 1;
        Ok(())
    }

    pub fn is_bit_set(&self, bit: u16) -> bool {
        bit < self.bg_bits && self.bit_is_set(bit)
    }

    /// Marks a specific bit used, for callers (like `alloc_range`) that
    /// already picked the bit rather than asking for the first free one.
    pub fn mark_used(&mut self, bit: u16) -> Result<()> {
        if bit >= self.bg_bits || self.bit_is_set(bit) {
            return Err(Ocfs2Error::InvalidBit(bit as u64));
        }
        self.set_bit(bit, true);
        self.bg_free_bits_count -= 1;
        Ok(())
    }

    /// Finds the first run of consecutive free bits at least `min`
    /// long, capped at `max`. Used by `alloc_range` to grant a
    /// contiguous-cluster request the way `ocfs2_block_group_find_clear_bits`
    /// finds contiguous runs within one group.
    pub fn find_free_run(&self, min: u16, max: u16) -> Option<(u16, u16)> {
        let mut bit = 0u16;
        while bit < self.bg_bits {
            if self.bit_is_set(bit) {
                bit += 1;
                continue;
            }
            let start = bit;
            let mut len = 0u16;
            while bit < self.bg_bits && !self.bit_is_set(bit) && len < max {
                len += 1;
                bit += 1;
            }
            if len >= min {
                return Some((start, len));
            }
            while bit < self.bg_bits && !self.bit_is_set(bit) {
                bit += 1;
            }
        }
        None
    }
}

/// Reads and checksum-verifies the group descriptor at `blkno`, the
/// common first step of every chain operation below.
fn read_group_descriptor<D: BlockDevice>(cache: &mut Cache<D>, blkno: u64) -> Result<GroupDescriptor> {
    let mut buf = cache.read(blkno)?;
    BlockCheck::verify(&mut buf, GROUP_DESC_CHECK_OFFSET, blkno)?;
    let mut cursor = std::io::Cursor::new(&buf);
    binrw::BinRead::read_le(&mut cursor).map_err(|_| Ocfs2Error::CorruptGroupDescriptor(blkno))
}

fn write_group_descriptor<D: BlockDevice>(cache: &mut Cache<D>, gd: &GroupDescriptor) -> Result<()> {
    let mut out = std::io::Cursor::new(Vec::new());
    binrw::BinWrite::write_le(gd, &mut out).map_err(|_| Ocfs2Error::CorruptGroupDescriptor(gd.bg_blkno))?;
    let mut block = out.into_inner();
    block.resize(cache.block_size() as usize, 0);
    BlockCheck::stamp(&mut block, GROUP_DESC_CHECK_OFFSET);
    cache.write(gd.bg_blkno, block);
    Ok(())
}

/// Walks every group descriptor of every chain in `list`, starting at
/// `list.cl_recs[i].c_blkno` and following `bg_next_group` until a
/// terminal zero block number (the Open Question resolution recorded
/// in `DESIGN.md`). Cross-checks `bg_blkno`/`bg_chain` against the
/// expected position exactly as `chain_iterate_gd` does.
pub fn iterate_chain<D: BlockDevice>(
    cache: &mut Cache<D>,
    list: &ChainList,
    chain_num: usize,
    mut visit: impl FnMut(&GroupDescriptor),
) -> Result<()> {
    let mut blkno = list.cl_recs[chain_num].c_blkno;
    while blkno != 0 {
        let gd = read_group_descriptor(cache, blkno)?;
        if gd.bg_blkno != blkno || gd.bg_chain as usize != chain_num {
            return Err(Ocfs2Error::CorruptGroupDescriptor(blkno));
        }
        blkno = gd.bg_next_group;
        visit(&gd);
    }
    Ok(())
}

/// Allocates one bit from the best-fitting chain, writing the updated
/// group descriptor and chain record counters back through `cache`.
/// Returns `(group_blkno, bit)`. Grounded in `ocfs2_chain_alloc_with_io`'s
/// "pick chain with most free bits, walk its groups for the first one
/// with room" strategy.
pub fn alloc_from_chain_list<D: BlockDevice>(
    cache: &mut Cache<D>,
    list: &mut ChainList,
) -> Result<(u64, u16)> {
    let chain_num = list.best_chain().ok_or(Ocfs2Error::NoSpace)?;
    if list.cl_recs[chain_num].c_free == 0 {
        return Err(Ocfs2Error::NoSpace);
    }
    let mut blkno = list.cl_recs[chain_num].c_blkno;
    while blkno != 0 {
        let mut gd = read_group_descriptor(cache, blkno)?;
        if gd.bg_free_bits_count > 0 {
            let bit = gd.alloc_bit().ok_or(Ocfs2Error::BitNotFound)?;
            write_group_descriptor(cache, &gd)?;
            list.cl_recs[chain_num].c_free -= 1;
            return Ok((blkno, bit));
        }
        blkno = gd.bg_next_group;
    }
    warn!("chain {chain_num} reported free bits but no group had room");
    Err(Ocfs2Error::CorruptChain(list.cl_recs[chain_num].c_blkno))
}

/// Allocates a contiguous run of `min..=max` free bits from the first
/// group with room, mirroring `ocfs2_claim_clusters`'s range request
/// (as opposed to `alloc_from_chain_list`'s single-bit grant). Returns
/// `(group_blkno, first_bit, count)`; `count` is the run actually
/// granted, which may be anywhere from `min` to `max`.
pub fn alloc_range<D: BlockDevice>(
    cache: &mut Cache<D>,
    list: &mut ChainList,
    min: u16,
    max: u16,
) -> Result<(u64, u16, u16)> {
    if min == 0 || min > max {
        return Err(Ocfs2Error::InvalidArgument(format!(
            "alloc_range: min {min} must be nonzero and no greater than max {max}"
        )));
    }
    for chain_num in 0..list.cl_next_free_rec as usize {
        if (list.cl_recs[chain_num].c_free as u16) < min {
            continue;
        }
        let mut blkno = list.cl_recs[chain_num].c_blkno;
        while blkno != 0 {
            let mut gd = read_group_descriptor(cache, blkno)?;
            if let Some((start, count)) = gd.find_free_run(min, max) {
                for bit in start..start + count {
                    gd.mark_used(bit)?;
                }
                write_group_descriptor(cache, &gd)?;
                list.cl_recs[chain_num].c_free -= count as u32;
                return Ok((blkno, start, count));
            }
            blkno = gd.bg_next_group;
        }
    }
    Err(Ocfs2Error::NoSpace)
}

/// Frees bit `bit` in the group at `group_blkno`, updating both the
/// group descriptor and the owning chain record.
pub fn free_in_chain_list<D: BlockDevice>(
    cache: &mut Cache<D>,
    list: &mut ChainList,
    group_blkno: u64,
    bit: u16,
) -> Result<()> {
    let mut gd = read_group_descriptor(cache, group_blkno)?;
    gd.free_bit(bit)?;
    let chain_num = gd.bg_chain as usize;
    write_group_descriptor(cache, &gd)?;
    if let Some(rec) = list.cl_recs.get_mut(chain_num) {
        rec.c_free += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_descriptor_allocates_and_frees_bits() {
        let mut gd = GroupDescriptor::new(10, 2, 0, 8, 1);
        let bit = gd.alloc_bit().unwrap();
        assert_eq!(bit, 0);
        assert_eq!(gd.bg_free_bits_count, 7);
        gd.free_bit(bit).unwrap();
        assert_eq!(gd.bg_free_bits_count, 8);
    }

    #[test]
    fn double_free_is_rejected() {
        let mut gd = GroupDescriptor::new(10, 2, 0, 8, 1);
        let bit = gd.alloc_bit().unwrap();
        gd.free_bit(bit).unwrap();
        assert!(gd.free_bit(bit).is_err());
    }

    #[test]
    fn chain_list_best_chain_prefers_most_free() {
        let mut list = ChainList::new(2, 1, 1);
        list.cl_next_free_rec = 2;
        list.cl_recs[0] = ChainRec { c_free: 3, c_total: 10, c_blkno: 1 };
        list.cl_recs[1] = ChainRec { c_free: 8, c_total: 10, c_blkno: 2 };
        assert_eq!(list.best_chain(), Some(1));
    }

    #[test]
    fn find_free_run_caps_at_max_and_requires_min() {
        let mut gd = GroupDescriptor::new(10, 2, 0, 16, 1);
        for bit in [0u16, 5, 6, 7, 8, 9] {
            gd.set_bit(bit, true);
        }
        // free runs: [1..5) len 4, [10..16) len 6
        assert_eq!(gd.find_free_run(5, 8), Some((10, 6)));
        assert_eq!(gd.find_free_run(3, 3), Some((1, 3)));
        assert!(gd.find_free_run(7, 7).is_none());
    }

    #[test]
    fn alloc_range_grants_a_contiguous_run_and_updates_chain_free() {
        use crate::io::{Cache, FileDevice};
        use std::io::Cursor;

        let dev = FileDevice::new(Cursor::new(vec![0u8; 4096 * 4]), 4096);
        let mut cache = Cache::new(dev);
        let group = GroupDescriptor::new(1, 2, 0, 32, 1);
        let mut gbuf = std::io::Cursor::new(Vec::new());
        binrw::BinWrite::write_le(&group, &mut gbuf).unwrap();
        let mut gbuf = gbuf.into_inner();
        gbuf.resize(4096, 0);
        BlockCheck::stamp(&mut gbuf, GROUP_DESC_CHECK_OFFSET);
        cache.write(1, gbuf);

        let mut list = ChainList::new(1, 1, 1);
        list.cl_next_free_rec = 1;
        list.cl_recs[0] = ChainRec { c_free: 32, c_total: 32, c_blkno: 1 };

        let (blkno, start, count) = alloc_range(&mut cache, &mut list, 4, 8).unwrap();
        assert_eq!(blkno, 1);
        assert_eq!(start, 0);
        assert_eq!(count, 8);
        assert_eq!(list.cl_recs[0].c_free, 24);
    }
}
