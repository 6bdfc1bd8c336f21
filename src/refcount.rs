//! Refcount trees: shared-extent bookkeeping for reflinked files. A
//! refcounted dinode points at a root block; the root is either a
//! direct leaf (few records) or an interior node over further leaves,
//! each leaf holding `RefcountRec`s keyed by starting physical
//! cluster.
//!
//! Grounded in `examples/original_source/fswreck/refcount.c` for the
//! block/record field names.

use binrw::binrw;

use crate::check::BlockCheck;
use crate::error::{Ocfs2Error, Result};

pub const REFCOUNT_BLOCK_SIGNATURE: &[u8; 8] = b"REFCNT1\0";

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefcountRec {
    pub r_cpos: u64,
    pub r_clusters: u32,
    pub r_refcount: u32,
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefcountBlock {
    #[br(assert(&rf_signature == REFCOUNT_BLOCK_SIGNATURE, "bad refcount block signature"))]
    pub rf_signature: [u8; 8],
    pub rf_suballoc_slot: u16,
    pub rf_suballoc_bit: u16,
    pub rf_parent: u64,
    pub rf_blkno: u64,
    pub rf_count: u16,
    pub rf_records_count: u16,
    pub rf_check: BlockCheck,
    #[br(count = rf_records_count)]
    pub rf_records: Vec<RefcountRec>,
}

impl RefcountBlock {
    pub fn new(blkno: u64, parent: u64, capacity: u16) -> Self {
        RefcountBlock {
            rf_signature: *REFCOUNT_BLOCK_SIGNATURE,
            rf_suballoc_slot: 0,
            rf_suballoc_bit: 0,
            rf_parent: parent,
            rf_blkno: blkno,
            rf_count: capacity,
            rf_records_count: 0,
            rf_check: BlockCheck::default(),
            rf_records: Vec::new(),
        }
    }

    /// Attaches a fresh shared-extent record with a refcount of 2 (the
    /// original owner plus the one new reflink), matching
    /// `ocfs2_attach_refcount_tree`'s starting count.
    pub fn attach(&mut self, cpos: u64, clusters: u32) -> Result<()> {
        if self.rf_records_count >= self.rf_count {
            return Err(Ocfs2Error::NoSpace);
        }
        self.rf_records.push(RefcountRec { r_cpos: cpos, r_clusters: clusters, r_refcount: 2 });
        self.rf_records_count += 1;
        Ok(())
    }

    pub fn find(&self, cpos: u64) -> Option<&RefcountRec> {
        self.rf_records
            .iter()
            .find(|r| cpos >= r.r_cpos && cpos < r.r_cpos + r.r_clusters as u64)
    }

    /// Changes a record's count by `delta`. A record survives as long
    /// as its count is at least 1 — a count of 1 still means "this
    /// extent started life shared and must stay addressable through
    /// the refcount tree", matching `spec.md` §8's one-sided-truncate
    /// scenario where dropping from 2 referents to 1 leaves the record
    /// in place and frees nothing. Only a count of exactly 0 removes
    /// the record and hands the underlying clusters back to the
    /// caller-supplied `free_clusters` callback, which is expected to
    /// be backed by the same chain allocator `bitmap::ClusterBitmap`
    /// wraps (this module stays allocator-agnostic so it can be tested
    /// without a real device).
    pub fn change_refcount(
        &mut self,
        cpos: u64,
        delta: i32,
        mut free_clusters: impl FnMut(u64, u32) -> Result<()>,
    ) -> Result<u32> {
        let idx = self
            .rf_records
            .iter()
            .position(|r| cpos >= r.r_cpos && cpos < r.r_cpos + r.r_clusters as u64)
            .ok_or(Ocfs2Error::CorruptRefcount(self.rf_blkno))?;
        let new_count = self.rf_records[idx].r_refcount as i32 + delta;
        if new_count < 0 {
            return Err(Ocfs2Error::CorruptRefcount(self.rf_blkno));
        }
        if new_count == 0 {
            let rec = self.rf_records.remove(idx);
            self.rf_records_count -= 1;
            free_clusters(rec.r_cpos, rec.r_clusters)?;
            return Ok(0);
        }
        self.rf_records[idx].r_refcount = new_count as u32;
        Ok(new_count as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_then_find() {
        let mut block = RefcountBlock::new(10, 0, 4);
        block.attach(100, 8).unwrap();
        assert_eq!(block.find(104).unwrap().r_refcount, 2);
    }

    #[test]
    fn refcount_drops_to_zero_removes_record_and_frees_clusters() {
        let mut block = RefcountBlock::new(10, 0, 4);
        block.attach(100, 8).unwrap();
        let mut freed = None;
        let count = block.change_refcount(100, -2, |cpos, clusters| {
            freed = Some((cpos, clusters));
            Ok(())
        }).unwrap();
        assert_eq!(count, 0);
        assert!(block.find(100).is_none());
        assert_eq!(freed, Some((100, 8)));
    }

    #[test]
    fn one_sided_truncate_leaves_record_at_count_one_and_frees_nothing() {
        let mut block = RefcountBlock::new(10, 0, 4);
        block.attach(100, 8).unwrap();
        let mut freed = false;
        let count = block.change_refcount(100, -1, |_, _| {
            freed = true;
            Ok(())
        }).unwrap();
        assert_eq!(count, 1);
        assert!(!freed);
        assert_eq!(block.find(100).unwrap().r_refcount, 1);
    }
}
