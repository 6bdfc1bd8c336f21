//! `resize.ocfs2`'s driver: append-only volume growth. New clusters
//! are only ever added past the current end of the volume; shrinking
//! a mounted filesystem would require relocating live data and is out
//! of scope (`spec.md` §4.12's Non-goal on online shrink).
//!
//! Grounded in `examples/original_source/mkfs.ocfs2/mkfs2.c`'s
//! `format_leading_clusters`-adjacent group growth and
//! `examples/original_source/libocfs2/alloc.c`'s
//! `ocfs2_chain_add_group`, wired through `format::grow_chain` since
//! growth is just "chain-add-group" run against the already-live
//! global bitmap instead of a freshly-laid-out one.

use crate::error::{Ocfs2Error, Result};
use crate::format::grow_chain;
use crate::io::BlockDevice;
use crate::superblock::Ocfs2Filesystem;

/// One group's worth of bits a single grow step adds to the global
/// bitmap. Real `resize.ocfs2` sizes this from the volume's cluster
/// group size; a fixed size keeps this crate's model simple while
/// still exercising the same growth path at any scale.
const GROW_STEP_BITS: u16 = 1024;

impl<D: BlockDevice> Ocfs2Filesystem<D> {
    /// Grows the volume to `new_clusters_count`, appending one or more
    /// groups to the global bitmap's least-loaded chain and bumping
    /// `s_clusters_count`. Refuses to shrink.
    pub fn grow_to(&mut self, new_clusters_count: u32, next_group_blkno: &mut u64) -> Result<()> {
        if new_clusters_count <= self.super_info.s_clusters_count {
            return Err(Ocfs2Error::InvalidArgument(
                "resize can only grow a volume, never shrink it".into(),
            ));
        }
        let mut dinode = self.read_dinode(crate::format::GLOBAL_BITMAP_BLKNO)?;
        let chain_list = dinode.as_chain_list_mut()?;

        let mut added = 0u32;
        let needed = new_clusters_count - self.super_info.s_clusters_count;
        while added < needed {
            if crate::util::interrupted() {
                return Err(Ocfs2Error::Interrupted);
            }
            let step = GROW_STEP_BITS.min((needed - added).max(1) as u16);
            grow_chain(&mut self.cache, chain_list, crate::format::GLOBAL_BITMAP_BLKNO, *next_group_blkno, step)?;
            *next_group_blkno += 1;
            added += step as u32;
        }

        self.write_dinode(&dinode)?;
        self.super_info.s_clusters_count = new_clusters_count;
        self.write_superblock_info()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::Features;
    use crate::format::{format, FormatOptions};
    use crate::io::FileDevice;
    use std::io::Cursor;

    fn fresh_volume(clusters: u32) -> Ocfs2Filesystem<FileDevice<Cursor<Vec<u8>>>> {
        let size = clusters as u64 * 4096;
        format(
            Cursor::new(vec![0u8; size as usize]),
            FormatOptions {
                label: "grow-me".to_string(),
                uuid: [3u8; 16],
                block_size: 4096,
                cluster_size: 4096,
                volume_size_bytes: size,
                max_slots: 2,
                features: Features::default(),
            },
        )
        .unwrap()
    }

    #[test]
    fn grow_to_increases_cluster_count() {
        let mut fs = fresh_volume(4096);
        let before = fs.super_info.s_clusters_count;
        let mut next_group = 9000u64;
        fs.grow_to(before + 2048, &mut next_group).unwrap();
        assert_eq!(fs.super_info.s_clusters_count, before + 2048);
    }

    #[test]
    fn grow_to_rejects_shrink() {
        let mut fs = fresh_volume(4096);
        let current = fs.super_info.s_clusters_count;
        let mut next_group = 9000u64;
        assert!(fs.grow_to(current - 1, &mut next_group).is_err());
    }
}
