//! Bitmap operations expressed as a capability trait rather than the
//! original C library's `ocfs2_bitmap` struct-of-function-pointers
//! ("vtable") approach, per the redesign note in `spec.md` §7: three
//! concrete implementations (an in-memory bitmap for tests and
//! scratch work, a cluster bitmap backed by a chain allocator, and —
//! not needed here since local allocation already has its own type in
//! `local_alloc.rs` — a window bitmap) share one trait instead of one
//! struct switching on a tag.
//!
//! Grounded in the teacher's `UsageBitmap` (originally in `src/lib.rs`)
//! for the bit-twiddling shape, and in
//! `examples/original_source/libocfs2/bitmap.c` for the operation set
//! (`set_bit`/`clear_bit`/`test_bit`/`find_next_set`/`alloc_range`).

use crate::chain::{alloc_from_chain_list, free_in_chain_list, ChainList, GROUP_DESC_CHECK_OFFSET};
use crate::check::BlockCheck;
use crate::error::{Ocfs2Error, Result};
use crate::io::{BlockDevice, Cache};

pub trait BitmapOps {
    fn test_bit(&mut self, bit: u64) -> Result<bool>;
    fn set_bit(&mut self, bit: u64) -> Result<()>;
    fn clear_bit(&mut self, bit: u64) -> Result<()>;
    fn find_next_set(&mut self, start: u64) -> Option<u64>;
    fn total_bits(&self) -> u64;
    fn free_bits(&self) -> u64;

    /// Allocates the first available bit at or after `start`, the
    /// linear-scan fallback the real bitmap uses once a chain's
    /// best-fit search comes up empty.
    fn alloc_any(&mut self) -> Result<u64> {
        for bit in 0..self.total_bits() {
            if !self.test_bit(bit)? {
                self.set_bit(bit)?;
                return Ok(bit);
            }
        }
        Err(Ocfs2Error::NoSpace)
    }

    /// Finds the first clear bit at or after `start`, the complement of
    /// `find_next_set` used to locate the start of a free run.
    fn find_next_zero_bit(&mut self, start: u64) -> Option<u64> {
        let total = self.total_bits();
        (start..total).find(|&bit| !self.test_bit(bit).unwrap_or(true))
    }

    /// Marks every bit in `[start, start+len)` used. Matches
    /// `ocfs2_bitmap.c`'s `set_bits` helper for claiming a
    /// just-allocated contiguous run in one pass.
    fn set_range(&mut self, start: u64, len: u64) -> Result<()> {
        for bit in start..start + len {
            self.set_bit(bit)?;
        }
        Ok(())
    }

    /// Marks every bit in `[start, start+len)` free.
    fn clear_range(&mut self, start: u64, len: u64) -> Result<()> {
        for bit in start..start + len {
            self.clear_bit(bit)?;
        }
        Ok(())
    }
}

/// A flat in-memory bitmap, used by tests and by the local allocator's
/// scratch bookkeeping before it is committed to a `LocalAlloc` window.
#[derive(Debug, Clone)]
pub struct MemoryBitmap {
    bits: Vec<u8>,
    total: u64,
}

impl MemoryBitmap {
    pub fn new(total_bits: u64) -> Self {
        MemoryBitmap { bits: vec![0u8; total_bits.div_ceil(8) as usize], total: total_bits }
    }

    fn check(&self, bit: u64) -> Result<()> {
        if bit >= self.total {
            return Err(Ocfs2Error::InvalidBit(bit));
        }
        Ok(())
    }
}

impl BitmapOps for MemoryBitmap {
    fn test_bit(&mut self, bit: u64) -> Result<bool> {
        self.check(bit)?;
        Ok(self.bits[(bit / 8) as usize] & (1 << (bit % 8)) != 0)
    }

    fn set_bit(&mut self, bit: u64) -> Result<()> {
        self.check(bit)?;
        if self.test_bit(bit)? {
            return Err(Ocfs2Error::InvalidBit(bit));
        }
        self.bits[(bit / 8) as usize] |= 1 << (bit % 8);
        Ok(())
    }

    fn clear_bit(&mut self, bit: u64) -> Result<()> {
        self.check(bit)?;
        if !self.test_bit(bit)? {
            return Err(Ocfs2Error::InvalidBit(bit));
        }
        self.bits[(bit / 8) as usize] &= !(1 << (bit % 8));
        Ok(())
    }

    fn find_next_set(&mut self, start: u64) -> Option<u64> {
        (start..self.total).find(|&bit| self.test_bit(bit).unwrap_or(false))
    }

    fn total_bits(&self) -> u64 {
        self.total
    }

    fn free_bits(&self) -> u64 {
        let set_count = (0..self.total)
            .filter(|&b| self.bits[(b / 8) as usize] & (1 << (b % 8)) != 0)
            .count() as u64;
        self.total - set_count
    }
}

/// A cluster bitmap backed by a chain allocator's group descriptors on
/// disk. Bit numbers here are global cluster-relative positions; each
/// `alloc_any`/`set_bit`/`clear_bit` call walks the chain list fresh
/// since groups are the unit of truth, not a cached flat array.
pub struct ClusterBitmap<'a, D: BlockDevice> {
    cache: &'a mut Cache<D>,
    chain_list: &'a mut ChainList,
}

impl<'a, D: BlockDevice> ClusterBitmap<'a, D> {
    pub fn new(cache: &'a mut Cache<D>, chain_list: &'a mut ChainList) -> Self {
        ClusterBitmap { cache, chain_list }
    }

    /// Allocates a single cluster from the backing chain allocator,
    /// returning the `(group block, bit)` pair the caller needs to
    /// translate into a physical cluster number.
    pub fn alloc_cluster(&mut self) -> Result<(u64, u16)> {
        alloc_from_chain_list(self.cache, self.chain_list)
    }

    pub fn free_cluster(&mut self, group_blkno: u64, bit: u16) -> Result<()> {
        free_in_chain_list(self.cache, self.chain_list, group_blkno, bit)
    }

    /// Allocates a contiguous run of `min..=max` clusters, delegating
    /// to `chain::alloc_range`. Returns `(group_blkno, first_bit, count)`.
    pub fn alloc_cluster_range(&mut self, min: u16, max: u16) -> Result<(u64, u16, u16)> {
        crate::chain::alloc_range(self.cache, self.chain_list, min, max)
    }

    pub fn free_bits(&self) -> u64 {
        self.chain_list.total_free() as u64
    }

    pub fn total_bits(&self) -> u64 {
        self.chain_list.total_bits() as u64
    }

    /// Maps a global, cluster-relative bit number to the group that
    /// owns it and the bit's position within that group's own bitmap.
    /// Bits are numbered by walking chains in order and, within a
    /// chain, groups in head-to-tail (`bg_next_group`) order — a
    /// convention this crate defines since OCFS2's own global bitmap
    /// never splits across more than one chain in practice.
    fn locate_bit(&mut self, bit: u64) -> Result<(u64, u16)> {
        let mut base = 0u64;
        for chain_num in 0..self.chain_list.cl_next_free_rec as usize {
            let mut found = None;
            let mut running = base;
            crate::chain::iterate_chain(self.cache, self.chain_list, chain_num, |gd| {
                if found.is_none() && bit >= running && bit < running + gd.bg_bits as u64 {
                    found = Some((gd.bg_blkno, (bit - running) as u16));
                }
                running += gd.bg_bits as u64;
            })?;
            if let Some(loc) = found {
                return Ok(loc);
            }
            base = running;
        }
        Err(Ocfs2Error::InvalidBit(bit))
    }
}

impl<'a, D: BlockDevice> BitmapOps for ClusterBitmap<'a, D> {
    fn test_bit(&mut self, bit: u64) -> Result<bool> {
        let (group_blkno, local) = self.locate_bit(bit)?;
        let mut buf = self.cache.read(group_blkno)?;
        BlockCheck::verify(&mut buf, GROUP_DESC_CHECK_OFFSET, group_blkno)?;
        let mut cursor = std::io::Cursor::new(&buf);
        let gd: crate::chain::GroupDescriptor = binrw::BinRead::read_le(&mut cursor)
            .map_err(|_| Ocfs2Error::CorruptGroupDescriptor(group_blkno))?;
        Ok(gd.is_bit_set(local))
    }

    fn set_bit(&mut self, bit: u64) -> Result<()> {
        self.set_specific_bit(bit)
    }

    fn clear_bit(&mut self, bit: u64) -> Result<()> {
        let (group_blkno, local) = self.locate_bit(bit)?;
        self.free_cluster(group_blkno, local)
    }

    fn find_next_set(&mut self, start: u64) -> Option<u64> {
        (start..self.total_bits()).find(|&bit| self.test_bit(bit).unwrap_or(false))
    }

    fn total_bits(&self) -> u64 {
        ClusterBitmap::total_bits(self)
    }

    fn free_bits(&self) -> u64 {
        ClusterBitmap::free_bits(self)
    }
}

impl<'a, D: BlockDevice> ClusterBitmap<'a, D> {
    fn set_specific_bit(&mut self, bit: u64) -> Result<()> {
        let (group_blkno, local) = self.locate_bit(bit)?;
        let mut buf = self.cache.read(group_blkno)?;
        BlockCheck::verify(&mut buf, GROUP_DESC_CHECK_OFFSET, group_blkno)?;
        let mut cursor = std::io::Cursor::new(&buf);
        let mut gd: crate::chain::GroupDescriptor = binrw::BinRead::read_le(&mut cursor)
            .map_err(|_| Ocfs2Error::CorruptGroupDescriptor(group_blkno))?;
        gd.mark_used(local)?;
        let chain_num = gd.bg_chain as usize;
        let mut out = std::io::Cursor::new(Vec::new());
        binrw::BinWrite::write_le(&gd, &mut out).map_err(|_| Ocfs2Error::CorruptGroupDescriptor(group_blkno))?;
        let mut block = out.into_inner();
        block.resize(self.cache.block_size() as usize, 0);
        BlockCheck::stamp(&mut block, GROUP_DESC_CHECK_OFFSET);
        self.cache.write(group_blkno, block);
        if let Some(rec) = self.chain_list.cl_recs.get_mut(chain_num) {
            rec.c_free -= 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_bitmap_allocates_lowest_free_bit() {
        let mut bm = MemoryBitmap::new(16);
        bm.set_bit(0).unwrap();
        let allocated = bm.alloc_any().unwrap();
        assert_eq!(allocated, 1);
    }

    #[test]
    fn memory_bitmap_rejects_double_set() {
        let mut bm = MemoryBitmap::new(4);
        bm.set_bit(2).unwrap();
        assert!(bm.set_bit(2).is_err());
    }

    #[test]
    fn memory_bitmap_find_next_set_skips_clear_bits() {
        let mut bm = MemoryBitmap::new(8);
        bm.set_bit(5).unwrap();
        assert_eq!(bm.find_next_set(0), Some(5));
        assert_eq!(bm.find_next_set(6), None);
    }

    #[test]
    fn memory_bitmap_reports_free_bits() {
        let mut bm = MemoryBitmap::new(10);
        bm.set_bit(0).unwrap();
        bm.set_bit(1).unwrap();
        assert_eq!(bm.free_bits(), 8);
    }

    #[test]
    fn memory_bitmap_set_range_and_find_next_zero_bit() {
        let mut bm = MemoryBitmap::new(16);
        bm.set_range(2, 4).unwrap();
        assert_eq!(bm.find_next_zero_bit(0), Some(0));
        assert_eq!(bm.find_next_zero_bit(2), Some(6));
        bm.clear_range(2, 4).unwrap();
        assert!(bm.test_bit(3).is_ok_and(|b| !b));
    }

    fn fresh_cluster_chain() -> (crate::io::Cache<crate::io::FileDevice<std::io::Cursor<Vec<u8>>>>, ChainList) {
        use crate::chain::GroupDescriptor;
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
        list.cl_recs[0] = crate::chain::ChainRec { c_free: 32, c_total: 32, c_blkno: 1 };
        (cache, list)
    }

    #[test]
    fn cluster_bitmap_implements_bitmap_ops() {
        let (mut cache, mut list) = fresh_cluster_chain();
        let mut bm = ClusterBitmap::new(&mut cache, &mut list);
        assert!(!bm.test_bit(5).unwrap());
        bm.set_bit(5).unwrap();
        assert!(bm.test_bit(5).unwrap());
        assert_eq!(bm.find_next_set(0), Some(5));
        bm.clear_bit(5).unwrap();
        assert!(!bm.test_bit(5).unwrap());
        assert_eq!(BitmapOps::free_bits(&bm), 32);
    }

    #[test]
    fn cluster_bitmap_alloc_range_grants_contiguous_run() {
        let (mut cache, mut list) = fresh_cluster_chain();
        let mut bm = ClusterBitmap::new(&mut cache, &mut list);
        let (_, start, count) = bm.alloc_cluster_range(4, 8).unwrap();
        assert_eq!(start, 0);
        assert_eq!(count, 8);
        assert_eq!(bm.free_bits(), 24);
    }
}
