//! Truncate log: a per-slot staging area for clusters freed by
//! truncate/unlink, flushed to the global bitmap in batches rather
//! than immediately (so a crash mid-truncate leaves the freed space
//! merely "pending recovery" instead of losing track of it).
//!
//! Grounded in `examples/original_source/fswreck/truncate_log.c` for
//! the record shape (`t_start`/`t_clusters` pairs).

use binrw::binrw;

use crate::error::{Ocfs2Error, Result};

pub const TRUNCATE_LOG_MAX_RECORDS: usize = 64;

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TruncateRec {
    pub t_start: u32,
    pub t_clusters: u32,
}

#[derive(Debug, Clone, Default)]
pub struct TruncateLog {
    pub records: Vec<TruncateRec>,
}

impl TruncateLog {
    pub fn append(&mut self, start: u32, clusters: u32) -> Result<()> {
        if self.records.len() >= TRUNCATE_LOG_MAX_RECORDS {
            return Err(Ocfs2Error::NoSpace);
        }
        if let Some(last) = self.records.last_mut() {
            if last.t_start + last.t_clusters == start {
                last.t_clusters += clusters;
                return Ok(());
            }
        }
        self.records.push(TruncateRec { t_start: start, t_clusters: clusters });
        Ok(())
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= TRUNCATE_LOG_MAX_RECORDS
    }

    /// Drains every record, handing each `(start, clusters)` pair to
    /// `free_one` (typically `bitmap::BitmapOps::free`). On crash
    /// recovery the real tool reaps these the same way: nothing ties
    /// a pending record back to the file it came from, so recovery is
    /// just "free everything still logged here" (the Open Question
    /// noted in `SPEC_FULL.md` §4.7).
    pub fn flush(&mut self, mut free_one: impl FnMut(u32, u32) -> Result<()>) -> Result<()> {
        for rec in self.records.drain(..) {
            free_one(rec.t_start, rec.t_clusters)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjacent_records_coalesce() {
        let mut log = TruncateLog::default();
        log.append(0, 4).unwrap();
        log.append(4, 6).unwrap();
        assert_eq!(log.records.len(), 1);
        assert_eq!(log.records[0].t_clusters, 10);
    }

    #[test]
    fn flush_visits_every_record_and_drains() {
        let mut log = TruncateLog::default();
        log.append(0, 4).unwrap();
        log.append(20, 2).unwrap();
        let mut freed = Vec::new();
        log.flush(|start, clusters| {
            freed.push((start, clusters));
            Ok(())
        })
        .unwrap();
        assert_eq!(freed, vec![(0, 4), (20, 2)]);
        assert!(log.records.is_empty());
    }
}
