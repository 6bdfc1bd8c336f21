//! Extent tree: the variable-depth B-tree of extent records that maps
//! a file's logical clusters to physical clusters.
//!
//! Grounded in `examples/original_source/libocfs2/extents.c`:
//! `ocfs2_extent_iterate`/`extent_iterate_el`/`extent_iterate_eb` for
//! the depth-first walk and the parent/depth/signature validation it
//! performs at each step, and the cluster-to-block conversion via
//! `c_to_b_bits`. Struct layout follows the teacher's binrw style
//! (`src/ext4_h.rs`'s `Ext4Extent`/`Ext4ExtentHeader`), generalized
//! from ext4's single inline extent to OCFS2's real extent-list tree.

use binrw::binrw;

use crate::check::BlockCheck;
use crate::error::{Ocfs2Error, Result};
use crate::io::{BlockDevice, Cache};

pub const EXTENT_BLOCK_SIGNATURE: &[u8; 8] = b"EXTBLK01";

/// One record in an extent list: `e_cpos` is the first logical cluster
/// this extent covers, `e_blkno` is the first physical block, and
/// `e_leaf_clusters`'s top bit marks the extent "unwritten" (allocated
/// but not yet holding real data) per the Open Question resolution in
/// `DESIGN.md`. A zero `e_blkno` with nonzero `e_int_clusters` instead
/// means this record points at a child extent block, not data.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtentRec {
    pub e_cpos: u32,
    pub e_leaf_clusters: u32,
    pub e_blkno: u64,
}

const UNWRITTEN_BIT: u32 = 1 << 31;

impl ExtentRec {
    pub fn clusters(&self) -> u32 {
        self.e_leaf_clusters & !UNWRITTEN_BIT
    }

    pub fn is_unwritten(&self) -> bool {
        self.e_leaf_clusters & UNWRITTEN_BIT != 0
    }

    pub fn covers(&self, cpos: u32) -> bool {
        cpos >= self.e_cpos && cpos < self.e_cpos + self.clusters()
    }

    /// True when this record is an interior pointer to a child
    /// extent block rather than a leaf mapping to data clusters. Only
    /// meaningful inside an `ExtentList` whose `el_tree_depth` is
    /// nonzero.
    pub fn is_interior(&self, tree_depth: u16) -> bool {
        tree_depth > 0
    }
}

/// The list header embedded either directly in a dinode (the tree
/// root) or at the start of every `ExtentBlock` (an interior/leaf
/// node further down).
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtentList {
    pub el_tree_depth: u16,
    pub el_count: u16,
    pub el_next_free_rec: u16,
    pub el_reserved: u16,
    #[br(count = el_count)]
    pub el_recs: Vec<ExtentRec>,
}

impl ExtentList {
    pub fn new(capacity: u16) -> Self {
        ExtentList {
            el_tree_depth: 0,
            el_count: capacity,
            el_next_free_rec: 0,
            el_reserved: 0,
            el_recs: Vec::new(),
        }
    }

    pub fn is_full(&self) -> bool {
        self.el_next_free_rec as usize >= self.el_count as usize
    }

    pub fn records(&self) -> &[ExtentRec] {
        &self.el_recs[..self.el_next_free_rec as usize]
    }

    /// Appends a record in logical-cluster order, matching the real
    /// library's "insert rightmost" fast path; out-of-order insertion
    /// (needed for punch-hole/truncate reshaping) is not modeled here
    /// since this crate only grows files monotonically during format.
    pub fn append(&mut self, rec: ExtentRec) -> Result<()> {
        if self.is_full() {
            return Err(Ocfs2Error::CorruptExtent(0));
        }
        if self.el_recs.len() <= self.el_next_free_rec as usize {
            self.el_recs.resize(self.el_next_free_rec as usize + 1, ExtentRec::default());
        }
        self.el_recs[self.el_next_free_rec as usize] = rec;
        self.el_next_free_rec += 1;
        Ok(())
    }

    pub fn find(&self, cpos: u32) -> Option<&ExtentRec> {
        self.records().iter().find(|r| r.covers(cpos))
    }

    pub fn total_clusters(&self) -> u64 {
        self.records().iter().map(|r| r.clusters() as u64).sum()
    }
}

/// An interior or leaf node of the extent tree, stored in its own
/// block when the dinode's root list overflows.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtentBlock {
    #[br(assert(&h_signature == EXTENT_BLOCK_SIGNATURE, "bad extent block signature"))]
    pub h_signature: [u8; 8],
    pub h_suballoc_slot: u16,
    pub h_suballoc_bit: u16,
    pub h_fs_generation: u32,
    pub h_blkno: u64,
    pub h_parent_blk: u64,
    pub h_next_leaf_blk: u64,
    pub h_check: BlockCheck,
    pub h_list: ExtentList,
}

impl ExtentBlock {
    pub fn new(blkno: u64, parent_blk: u64, capacity: u16) -> Self {
        ExtentBlock {
            h_signature: *EXTENT_BLOCK_SIGNATURE,
            h_suballoc_slot: 0,
            h_suballoc_bit: 0,
            h_fs_generation: 0,
            h_blkno: blkno,
            h_parent_blk: parent_blk,
            h_next_leaf_blk: 0,
            h_check: BlockCheck::default(),
            h_list: ExtentList::new(capacity),
        }
    }
}

/// Byte offset of `h_check` within an encoded `ExtentBlock`:
/// `h_signature`(8) + `h_suballoc_slot`(2) + `h_suballoc_bit`(2) +
/// `h_fs_generation`(4) + `h_blkno`(8) + `h_parent_blk`(8) +
/// `h_next_leaf_blk`(8) = 40.
const EXTENT_BLOCK_CHECK_OFFSET: usize = 40;

fn read_extent_block<D: BlockDevice>(cache: &mut Cache<D>, blkno: u64) -> Result<ExtentBlock> {
    let mut buf = cache.read(blkno)?;
    BlockCheck::verify(&mut buf, EXTENT_BLOCK_CHECK_OFFSET, blkno)?;
    let mut cursor = std::io::Cursor::new(&buf);
    binrw::BinRead::read_le(&mut cursor).map_err(|_| Ocfs2Error::CorruptExtent(blkno))
}

/// How many `ExtentRec`s fit in a freshly allocated leaf block: the
/// block minus the fixed header (40 bytes) and `h_check` (8 bytes) and
/// the embedded `ExtentList`'s own 8-byte header, divided by a record's
/// 16 encoded bytes. A leaf's capacity is independent of whatever
/// capacity the dinode's inline root list happens to have.
fn leaf_capacity(block_size: u32) -> u16 {
    let available = block_size.saturating_sub(EXTENT_BLOCK_CHECK_OFFSET as u32 + 8 + 8);
    (available / 16) as u16
}

fn write_extent_block<D: BlockDevice>(cache: &mut Cache<D>, block: &ExtentBlock) -> Result<()> {
    let mut out = std::io::Cursor::new(Vec::new());
    binrw::BinWrite::write_le(block, &mut out)
        .map_err(|_| Ocfs2Error::CorruptExtent(block.h_blkno))?;
    let mut buf = out.into_inner();
    buf.resize(cache.block_size() as usize, 0);
    BlockCheck::stamp(&mut buf, EXTENT_BLOCK_CHECK_OFFSET);
    cache.write(block.h_blkno, buf);
    Ok(())
}

/// Depth-first visitor over every leaf extent record in a tree rooted
/// at `root`, in logical order. Mirrors `extent_iterate_el`'s
/// recursive-into-`extent_iterate_eb` shape, validating at each
/// interior hop that the child's `h_parent_blk`/`h_fs_generation`
/// agree with its parent (the invariant `ocfs2_extent_iterate`
/// enforces via `OCFS2_ET_CORRUPT_EXTENT_BLOCK`).
pub fn iterate_leaves<D: BlockDevice>(
    cache: &mut Cache<D>,
    root: &ExtentList,
    self_blkno: u64,
    fs_generation: u32,
    visit: &mut dyn FnMut(&ExtentRec),
) -> Result<()> {
    if root.el_tree_depth == 0 {
        for rec in root.records() {
            visit(rec);
        }
        return Ok(());
    }
    for rec in root.records() {
        let block = read_extent_block(cache, rec.e_blkno)?;
        if block.h_blkno != rec.e_blkno || block.h_parent_blk != self_blkno {
            return Err(Ocfs2Error::CorruptExtent(rec.e_blkno));
        }
        if block.h_fs_generation != fs_generation {
            return Err(Ocfs2Error::CorruptExtent(rec.e_blkno));
        }
        iterate_leaves(cache, &block.h_list, rec.e_blkno, fs_generation, visit)?;
    }
    Ok(())
}

/// The logical-cluster range `[start, start+span)` a leaf's records
/// cover, including any internal holes between them — what an interior
/// record must report so `get_block` can route a `cpos` lookup into
/// the right leaf even when that leaf isn't fully packed.
fn list_span(list: &ExtentList) -> (u32, u32) {
    let recs = list.records();
    match (recs.first(), recs.last()) {
        (Some(first), Some(last)) => (first.e_cpos, last.e_cpos + last.clusters() - first.e_cpos),
        _ => (0, 0),
    }
}

/// True if `rec` was merged into the list's last record (same
/// unwritten-ness, logically and physically contiguous), mirroring
/// `ocfs2_extent_map_insert`'s merge-before-split preference.
fn try_merge(list: &mut ExtentList, rec: &ExtentRec) -> bool {
    if list.el_next_free_rec == 0 {
        return false;
    }
    let idx = list.el_next_free_rec as usize - 1;
    let last = list.el_recs[idx];
    let contiguous = last.e_cpos + last.clusters() == rec.e_cpos
        && last.e_blkno + last.clusters() as u64 == rec.e_blkno;
    if contiguous && last.is_unwritten() == rec.is_unwritten() {
        let merged = last.clusters() + rec.clusters();
        let flag = if rec.is_unwritten() { UNWRITTEN_BIT } else { 0 };
        list.el_recs[idx].e_leaf_clusters = merged | flag;
        true
    } else {
        false
    }
}

/// Inserts a new leaf extent into the tree rooted at `root`, growing
/// the tree from depth 0 to depth 1 (moving the root's records into a
/// freshly allocated `ExtentBlock`, the only way `ExtentBlock::new` is
/// actually reached) the first time the root list overflows, and
/// chaining further sibling leaves off depth-1 root records after
/// that. Deeper trees are out of scope: a depth-1 root that itself
/// fills returns `NoSpace` rather than growing to depth 2, a
/// deliberate cap recorded in `DESIGN.md`. `alloc_metadata_block`
/// hands back a fresh block number for a new `ExtentBlock`, expected
/// to be backed by the same metadata chain allocator `format.rs` uses
/// for other system structures.
pub fn insert<D: BlockDevice>(
    cache: &mut Cache<D>,
    self_blkno: u64,
    fs_generation: u32,
    root: &mut ExtentList,
    rec: ExtentRec,
    mut alloc_metadata_block: impl FnMut() -> Result<u64>,
) -> Result<()> {
    match root.el_tree_depth {
        0 => {
            if try_merge(root, &rec) {
                return Ok(());
            }
            if !root.is_full() {
                return root.append(rec);
            }
            grow_depth(cache, self_blkno, fs_generation, root, rec, &mut alloc_metadata_block)
        }
        1 => insert_depth1(cache, self_blkno, fs_generation, root, rec, &mut alloc_metadata_block),
        _ => Err(Ocfs2Error::CorruptExtent(self_blkno)),
    }
}

fn grow_depth<D: BlockDevice>(
    cache: &mut Cache<D>,
    self_blkno: u64,
    fs_generation: u32,
    root: &mut ExtentList,
    rec: ExtentRec,
    alloc_metadata_block: &mut dyn FnMut() -> Result<u64>,
) -> Result<()> {
    let capacity = leaf_capacity(cache.block_size());
    let leaf_blkno = alloc_metadata_block()?;
    let mut leaf = ExtentBlock::new(leaf_blkno, self_blkno, capacity);
    leaf.h_fs_generation = fs_generation;
    for r in root.records() {
        leaf.h_list.append(*r)?;
    }
    let placed_in_leaf = try_merge(&mut leaf.h_list, &rec) || (!leaf.h_list.is_full() && leaf.h_list.append(rec).is_ok());
    write_extent_block(cache, &leaf)?;

    let (leaf_cpos, leaf_span) = list_span(&leaf.h_list);
    root.el_tree_depth = 1;
    root.el_next_free_rec = 0;
    root.el_recs.clear();
    root.append(ExtentRec { e_cpos: leaf_cpos, e_leaf_clusters: leaf_span, e_blkno: leaf_blkno })?;

    if placed_in_leaf {
        return Ok(());
    }
    // The moved records already filled the new leaf: give the incoming
    // record its own sibling leaf, chained after the first.
    let sibling_blkno = alloc_metadata_block()?;
    let mut sibling = ExtentBlock::new(sibling_blkno, self_blkno, capacity);
    sibling.h_fs_generation = fs_generation;
    sibling.h_list.append(rec)?;
    write_extent_block(cache, &sibling)?;
    leaf.h_next_leaf_blk = sibling_blkno;
    write_extent_block(cache, &leaf)?;
    let (sibling_cpos, sibling_span) = list_span(&sibling.h_list);
    root.append(ExtentRec { e_cpos: sibling_cpos, e_leaf_clusters: sibling_span, e_blkno: sibling_blkno })
}

fn insert_depth1<D: BlockDevice>(
    cache: &mut Cache<D>,
    self_blkno: u64,
    fs_generation: u32,
    root: &mut ExtentList,
    rec: ExtentRec,
    alloc_metadata_block: &mut dyn FnMut() -> Result<u64>,
) -> Result<()> {
    let last_idx = root.el_next_free_rec as usize - 1;
    let leaf_blkno = root.el_recs[last_idx].e_blkno;
    let mut leaf = read_extent_block(cache, leaf_blkno)?;
    if leaf.h_blkno != leaf_blkno
        || leaf.h_parent_blk != self_blkno
        || leaf.h_fs_generation != fs_generation
    {
        return Err(Ocfs2Error::CorruptExtent(leaf_blkno));
    }

    if try_merge(&mut leaf.h_list, &rec) || (!leaf.h_list.is_full() && leaf.h_list.append(rec).is_ok())
    {
        let (_, new_span) = list_span(&leaf.h_list);
        write_extent_block(cache, &leaf)?;
        root.el_recs[last_idx].e_leaf_clusters = new_span;
        return Ok(());
    }

    if root.is_full() {
        return Err(Ocfs2Error::NoSpace);
    }
    let new_leaf_blkno = alloc_metadata_block()?;
    let mut new_leaf = ExtentBlock::new(new_leaf_blkno, self_blkno, leaf_capacity(cache.block_size()));
    new_leaf.h_fs_generation = fs_generation;
    new_leaf.h_list.append(rec)?;
    write_extent_block(cache, &new_leaf)?;
    leaf.h_next_leaf_blk = new_leaf_blkno;
    write_extent_block(cache, &leaf)?;
    let (new_cpos, new_span) = list_span(&new_leaf.h_list);
    root.append(ExtentRec { e_cpos: new_cpos, e_leaf_clusters: new_span, e_blkno: new_leaf_blkno })
}

/// Resolves the physical block backing logical cluster `cpos`, or
/// `None` when it falls in an unmapped hole (`spec.md` §4.5's sparse
/// read-as-zero semantics).
pub fn get_block<D: BlockDevice>(
    cache: &mut Cache<D>,
    root: &ExtentList,
    self_blkno: u64,
    fs_generation: u32,
    cpos: u32,
) -> Result<Option<u64>> {
    if root.el_tree_depth == 0 {
        return Ok(root.find(cpos).map(|r| r.e_blkno + (cpos - r.e_cpos) as u64));
    }
    let Some(rec) = root.find(cpos) else {
        return Ok(None);
    };
    let block = read_extent_block(cache, rec.e_blkno)?;
    if block.h_blkno != rec.e_blkno
        || block.h_parent_blk != self_blkno
        || block.h_fs_generation != fs_generation
    {
        return Err(Ocfs2Error::CorruptExtent(rec.e_blkno));
    }
    Ok(block.h_list.find(cpos).map(|leaf| leaf.e_blkno + (cpos - leaf.e_cpos) as u64))
}

fn truncate_list(
    list: &mut ExtentList,
    new_clusters: u32,
    free_clusters: &mut dyn FnMut(u64, u32) -> Result<()>,
) -> Result<()> {
    let mut kept = Vec::new();
    for rec in list.records() {
        let rec_end = rec.e_cpos + rec.clusters();
        if rec.e_cpos >= new_clusters {
            free_clusters(rec.e_blkno, rec.clusters())?;
        } else if rec_end > new_clusters {
            let keep = new_clusters - rec.e_cpos;
            let dropped = rec.clusters() - keep;
            free_clusters(rec.e_blkno + keep as u64, dropped)?;
            let flag = if rec.is_unwritten() { UNWRITTEN_BIT } else { 0 };
            kept.push(ExtentRec { e_cpos: rec.e_cpos, e_leaf_clusters: keep | flag, e_blkno: rec.e_blkno });
        } else {
            kept.push(*rec);
        }
    }
    let count = kept.len() as u16;
    list.el_recs = kept;
    list.el_recs.resize(list.el_count as usize, ExtentRec::default());
    list.el_next_free_rec = count;
    Ok(())
}

/// Shrinks the tree to `new_clusters` logical clusters, clipping or
/// dropping trailing extents and invoking `free_clusters` for every
/// physical cluster released — the `spec.md` §8 scenario of shrinking
/// a 100-cluster file down to 7. A depth-1 leaf dropped in its
/// entirety has its own clusters freed but its metadata block itself
/// is left allocated; reclaiming extent-block metadata on truncate is
/// not modeled here.
pub fn truncate<D: BlockDevice>(
    cache: &mut Cache<D>,
    root: &mut ExtentList,
    new_clusters: u32,
    mut free_clusters: impl FnMut(u64, u32) -> Result<()>,
) -> Result<()> {
    if root.el_tree_depth == 0 {
        return truncate_list(root, new_clusters, &mut free_clusters);
    }
    let mut kept = Vec::new();
    for rec in root.records().to_vec() {
        if rec.e_cpos >= new_clusters {
            let mut block = read_extent_block(cache, rec.e_blkno)?;
            truncate_list(&mut block.h_list, 0, &mut free_clusters)?;
            continue;
        }
        if rec.e_cpos + rec.clusters() > new_clusters {
            let mut block = read_extent_block(cache, rec.e_blkno)?;
            let local_new = new_clusters - rec.e_cpos;
            truncate_list(&mut block.h_list, local_new, &mut free_clusters)?;
            write_extent_block(cache, &block)?;
            let (new_cpos, new_span) = list_span(&block.h_list);
            kept.push(ExtentRec { e_cpos: new_cpos, e_leaf_clusters: new_span, e_blkno: rec.e_blkno });
        } else {
            kept.push(rec);
        }
    }
    let count = kept.len() as u16;
    root.el_recs = kept;
    root.el_recs.resize(root.el_count as usize, ExtentRec::default());
    root.el_next_free_rec = count;
    Ok(())
}

/// Sum of every leaf extent's cluster count, used by `check.rs` to
/// validate a dinode's `i_clusters` invariant.
pub fn total_clusters<D: BlockDevice>(
    cache: &mut Cache<D>,
    root: &ExtentList,
    self_blkno: u64,
    fs_generation: u32,
) -> Result<u64> {
    let mut total = 0u64;
    iterate_leaves(cache, root, self_blkno, fs_generation, &mut |rec| {
        total += rec.clusters() as u64;
    })?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extent_list_append_and_find() {
        let mut list = ExtentList::new(4);
        list.append(ExtentRec { e_cpos: 0, e_leaf_clusters: 10, e_blkno: 100 })
            .unwrap();
        list.append(ExtentRec { e_cpos: 10, e_leaf_clusters: 5, e_blkno: 200 })
            .unwrap();
        assert_eq!(list.find(12).unwrap().e_blkno, 200);
        assert_eq!(list.total_clusters(), 15);
    }

    #[test]
    fn extent_list_rejects_overflow() {
        let mut list = ExtentList::new(1);
        list.append(ExtentRec { e_cpos: 0, e_leaf_clusters: 1, e_blkno: 1 })
            .unwrap();
        assert!(list.append(ExtentRec::default()).is_err());
    }

    #[test]
    fn unwritten_bit_is_masked_from_cluster_count() {
        let rec = ExtentRec {
            e_cpos: 0,
            e_leaf_clusters: UNWRITTEN_BIT | 7,
            e_blkno: 1,
        };
        assert!(rec.is_unwritten());
        assert_eq!(rec.clusters(), 7);
    }

    fn fresh_cache() -> crate::io::Cache<crate::io::FileDevice<std::io::Cursor<Vec<u8>>>> {
        use crate::io::{Cache, FileDevice};
        use std::io::Cursor;
        crate::io::Cache::new(FileDevice::new(Cursor::new(vec![0u8; 4096 * 16]), 4096))
    }

    #[test]
    fn insert_coalesces_contiguous_extents() {
        let mut cache = fresh_cache();
        let mut root = ExtentList::new(4);
        let mut next_blkno = 100u64;
        insert(&mut cache, 1, 1, &mut root, ExtentRec { e_cpos: 0, e_leaf_clusters: 4, e_blkno: 50 }, || {
            next_blkno += 1;
            Ok(next_blkno)
        })
        .unwrap();
        insert(&mut cache, 1, 1, &mut root, ExtentRec { e_cpos: 4, e_leaf_clusters: 3, e_blkno: 54 }, || {
            next_blkno += 1;
            Ok(next_blkno)
        })
        .unwrap();
        assert_eq!(root.el_next_free_rec, 1);
        assert_eq!(root.records()[0].clusters(), 7);
    }

    #[test]
    fn insert_grows_depth_when_root_overflows() {
        let mut cache = fresh_cache();
        let mut root = ExtentList::new(1);
        let mut next_blkno = 200u64;
        insert(&mut cache, 1, 1, &mut root, ExtentRec { e_cpos: 0, e_leaf_clusters: 4, e_blkno: 50 }, || {
            next_blkno += 1;
            Ok(next_blkno)
        })
        .unwrap();
        // Non-contiguous: forces the root's single slot to overflow.
        insert(&mut cache, 1, 1, &mut root, ExtentRec { e_cpos: 10, e_leaf_clusters: 4, e_blkno: 90 }, || {
            next_blkno += 1;
            Ok(next_blkno)
        })
        .unwrap();
        assert_eq!(root.el_tree_depth, 1);
        assert_eq!(root.el_next_free_rec, 1);
        assert_eq!(get_block(&mut cache, &root, 1, 1, 0).unwrap(), Some(50));
        assert_eq!(get_block(&mut cache, &root, 1, 1, 10).unwrap(), Some(90));
        assert_eq!(get_block(&mut cache, &root, 1, 1, 5).unwrap(), None);
    }

    #[test]
    fn truncate_depth_zero_clips_trailing_clusters_and_frees_them() {
        let mut cache = fresh_cache();
        let mut root = ExtentList::new(4);
        root.append(ExtentRec { e_cpos: 0, e_leaf_clusters: 100, e_blkno: 1000 }).unwrap();
        let mut freed = Vec::new();
        truncate(&mut cache, &mut root, 7, |blkno, clusters| {
            freed.push((blkno, clusters));
            Ok(())
        })
        .unwrap();
        assert_eq!(root.total_clusters(), 7);
        assert_eq!(freed, vec![(1007, 93)]);
    }

    #[test]
    fn truncate_depth_one_drops_whole_leaves_past_the_boundary() {
        let mut cache = fresh_cache();
        let mut root = ExtentList::new(1);
        let mut next_blkno = 300u64;
        insert(&mut cache, 1, 1, &mut root, ExtentRec { e_cpos: 0, e_leaf_clusters: 5, e_blkno: 50 }, || {
            next_blkno += 1;
            Ok(next_blkno)
        })
        .unwrap();
        insert(&mut cache, 1, 1, &mut root, ExtentRec { e_cpos: 20, e_leaf_clusters: 5, e_blkno: 90 }, || {
            next_blkno += 1;
            Ok(next_blkno)
        })
        .unwrap();
        assert_eq!(root.el_tree_depth, 1);
        let mut freed = Vec::new();
        truncate(&mut cache, &mut root, 5, |blkno, clusters| {
            freed.push((blkno, clusters));
            Ok(())
        })
        .unwrap();
        assert_eq!(root.el_next_free_rec, 1);
        assert_eq!(get_block(&mut cache, &root, 1, 1, 0).unwrap(), Some(50));
        assert_eq!(get_block(&mut cache, &root, 1, 1, 20).unwrap(), None);
        assert_eq!(freed, vec![(90, 5)]);
    }
}
