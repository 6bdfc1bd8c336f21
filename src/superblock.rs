//! Superblock payload and the `Ocfs2Filesystem` open/close handle.
//!
//! Grounded in `src/ext4_h.rs`'s `Ext4SuperBlock` for the binrw struct
//! shape (inline `new()` with sane defaults, derived accessor methods,
//! checksum-stamped-in-place field), with field names taken from the
//! signature/flags retained in `examples/original_source/ocfs2/format/
//! inc/ocfs2_fs.h` (the older header, still correct for the signature
//! and `OCFS2_SUPER_BLOCK_BLKNO = 2`) and the cluster-stack fields used
//! by `ocfs2_fill_cluster_desc` in `examples/original_source/
//! libocfs2/dlm.c`.

use binrw::{BinRead, BinWrite, binrw};

use crate::check::BlockCheck;
use crate::dinode::{Dinode, DinodeHeader, DinodePayload, SUPER_BLOCK_FL, VALID_FL};
use crate::error::{Ocfs2Error, Result};
use crate::feature::Features;
use crate::io::{BlockDevice, Cache, FileDevice, check_signature};

pub const OCFS1_SIGNATURE: &[u8; 8] = b"OracleCF";
pub const OCFS2_SIGNATURE: &[u8; 8] = b"OCFSV2\0\0";
pub const SUPER_BLOCK_BLKNO: u64 = 2;
pub const STACK_LABEL_LEN: usize = 4;
pub const CLUSTER_NAME_LEN: usize = 16;
pub const VOLUME_LABEL_LEN: usize = 64;

/// GiB offsets the `backup-super` feature stashes a spare copy of the
/// superblock dinode at, matching the real tool's fixed table (1G, 4G,
/// 16G, 64G, 256G, 1T) rather than scaling with volume size.
pub const BACKUP_SB_OFFSETS_GB: [u64; 6] = [1, 4, 16, 64, 256, 1024];

fn backup_sb_blkno(offset_gb: u64, block_size: u32) -> u64 {
    (offset_gb * 1024 * 1024 * 1024) / block_size as u64
}

/// Which backup offsets fit inside a volume of `clusters_count` clusters.
pub fn backup_sb_blknos(clusters_count: u32, cluster_size: u32, block_size: u32) -> Vec<u64> {
    let volume_bytes = clusters_count as u64 * cluster_size as u64;
    BACKUP_SB_OFFSETS_GB
        .iter()
        .map(|&gb| (gb, backup_sb_blkno(gb, block_size)))
        .take_while(|&(gb, _)| gb * 1024 * 1024 * 1024 < volume_bytes)
        .map(|(_, blkno)| blkno)
        .collect()
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone)]
pub struct ClusterInfo {
    pub ci_stack: [u8; STACK_LABEL_LEN],
    pub ci_cluster: [u8; CLUSTER_NAME_LEN],
}

impl Default for ClusterInfo {
    fn default() -> Self {
        ClusterInfo {
            ci_stack: [0u8; STACK_LABEL_LEN],
            ci_cluster: [0u8; CLUSTER_NAME_LEN],
        }
    }
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone)]
pub struct SuperBlockInfo {
    pub s_major_version: u16,
    pub s_minor_version: u16,
    pub s_root_blkno: u64,
    pub s_system_dir_blkno: u64,
    pub s_first_cluster_group: u64,
    pub s_blocksize_bits: u8,
    pub s_clustersize_bits: u8,
    pub s_max_slots: u16,
    pub s_feature_compat: u32,
    pub s_feature_incompat: u32,
    pub s_feature_ro_compat: u32,
    pub s_clusters_count: u32,
    pub s_state: u16,
    pub s_errors: u16,
    pub s_uuid: [u8; 16],
    pub s_label: [u8; VOLUME_LABEL_LEN],
    pub s_cluster_info: ClusterInfo,
}

impl Default for SuperBlockInfo {
    fn default() -> Self {
        SuperBlockInfo {
            s_major_version: 0,
            s_minor_version: 90,
            s_root_blkno: 0,
            s_system_dir_blkno: 0,
            s_first_cluster_group: 0,
            s_blocksize_bits: 12,
            s_clustersize_bits: 12,
            s_max_slots: 4,
            s_feature_compat: 0,
            s_feature_incompat: 0,
            s_feature_ro_compat: 0,
            s_clusters_count: 0,
            s_state: 0,
            s_errors: 0,
            s_uuid: [0u8; 16],
            s_label: [0u8; VOLUME_LABEL_LEN],
            s_cluster_info: ClusterInfo::default(),
        }
    }
}

impl SuperBlockInfo {
    pub fn block_size(&self) -> u32 {
        1 << self.s_blocksize_bits
    }

    pub fn cluster_size(&self) -> u32 {
        1 << self.s_clustersize_bits
    }

    pub fn userspace_stack(&self) -> bool {
        self.s_feature_incompat & crate::feature::INCOMPAT_USERSPACE_STACK != 0
    }

    pub fn features(&self) -> Features {
        Features {
            compat: self.s_feature_compat,
            incompat: self.s_feature_incompat,
            ro_compat: self.s_feature_ro_compat,
        }
    }

    pub fn label_str(&self) -> String {
        let len = self.s_label.iter().position(|&b| b == 0).unwrap_or(self.s_label.len());
        String::from_utf8_lossy(&self.s_label[..len]).into_owned()
    }

    pub fn set_label(&mut self, label: &str) {
        self.s_label = [0u8; VOLUME_LABEL_LEN];
        let bytes = label.as_bytes();
        let len = bytes.len().min(VOLUME_LABEL_LEN);
        self.s_label[..len].copy_from_slice(&bytes[..len]);
    }

    pub fn uuid(&self) -> uuid::Uuid {
        uuid::Uuid::from_bytes(self.s_uuid)
    }
}

/// A handle onto an opened OCFS2 volume. Every driver (`format`,
/// `tunefs`, `resize`, `fsck`) and every library module (`chain`,
/// `extent`, `dir`, ...) threads calls through this instead of the
/// process-wide globals the original C library kept, per the
/// redesign note in `spec.md` §9.
#[derive(Debug)]
pub struct Ocfs2Filesystem<D: BlockDevice> {
    pub cache: Cache<D>,
    pub super_info: SuperBlockInfo,
    pub fs_generation: u32,
}

/// Parses a candidate superblock dinode out of a just-read block and
/// validates its signature, without touching any I/O. Shared between
/// `open`'s blocksize probe and `open_from_backup`'s GiB-offset probe.
fn parse_superblock_dinode(buf: &[u8], blkno: u64) -> Result<(SuperBlockInfo, u32)> {
    let dinode = Dinode::read(buf, blkno)?;
    if dinode.header.i_flags & SUPER_BLOCK_FL == 0 {
        return Err(Ocfs2Error::NotOcfs2);
    }
    let DinodePayload::Raw(tail) = &dinode.payload else {
        return Err(Ocfs2Error::NotOcfs2);
    };
    check_signature(tail, OCFS2_SIGNATURE, blkno)?;
    let mut c = std::io::Cursor::new(&tail[8..]);
    let super_info = SuperBlockInfo::read_le(&mut c).map_err(|_| Ocfs2Error::NotOcfs2)?;
    Ok((super_info, dinode.header.i_fs_generation))
}

impl<F: std::io::Read + std::io::Write + std::io::Seek> Ocfs2Filesystem<FileDevice<F>> {
    /// Probes blocksizes in the documented order, rejects legacy
    /// OCFS1 volumes outright, and validates the `OCFSV2` signature.
    pub fn open(mut inner: F) -> Result<Self> {
        use std::io::{Read, Seek, SeekFrom};
        let mut sig = [0u8; 8];
        inner.seek(SeekFrom::Start(0))?;
        inner.read_exact(&mut sig)?;
        if sig == *OCFS1_SIGNATURE {
            return Err(Ocfs2Error::IsOcfs1);
        }

        for block_size in [512u32, 1024, 2048, 4096] {
            let blkno = SUPER_BLOCK_BLKNO;
            inner.seek(SeekFrom::Start(blkno * block_size as u64))?;
            let mut buf = vec![0u8; block_size as usize];
            if inner.read_exact(&mut buf).is_err() {
                continue;
            }
            if let Ok((super_info, fs_generation)) = parse_superblock_dinode(&buf, blkno) {
                let device = FileDevice::new(inner, super_info.block_size());
                return Ok(Ocfs2Filesystem {
                    cache: Cache::new(device),
                    super_info,
                    fs_generation,
                });
            }
        }
        Err(Ocfs2Error::NotOcfs2)
    }

    /// Recovers from a destroyed primary superblock (block 2) by reading
    /// one of the `backup-super` copies at the documented GiB offsets,
    /// then writing it back to block 2 so the volume opens normally
    /// from then on. `block_size` must be supplied by the caller, the
    /// same way the real tool's `-r` / `-B` option requires it: with the
    /// primary superblock gone there is nothing left to probe it from.
    pub fn open_from_backup(mut inner: F, block_size: u32) -> Result<Self> {
        use std::io::{Read, Seek, SeekFrom, Write};

        for offset_gb in BACKUP_SB_OFFSETS_GB {
            let blkno = backup_sb_blkno(offset_gb, block_size);
            inner.seek(SeekFrom::Start(blkno * block_size as u64))?;
            let mut buf = vec![0u8; block_size as usize];
            if inner.read_exact(&mut buf).is_err() {
                continue;
            }
            if parse_superblock_dinode(&buf, blkno).is_err() {
                continue;
            }

            // Backup copies carry `i_blkno` stamped with their own
            // location; relocate it to block 2 and restamp the check
            // structure before writing it back as the primary.
            let mut dinode = Dinode::read(&buf, blkno)?;
            dinode.header.i_blkno = SUPER_BLOCK_BLKNO;
            let restored = dinode.write(block_size as usize)?;
            inner.seek(SeekFrom::Start(SUPER_BLOCK_BLKNO * block_size as u64))?;
            inner.write_all(&restored)?;
            inner.flush()?;

            return Self::open(inner);
        }
        Err(Ocfs2Error::NotOcfs2)
    }

    pub fn close(mut self) -> Result<F> {
        self.cache.flush()?;
        Ok(self.cache.into_device().into_inner())
    }
}

impl<D: BlockDevice> Ocfs2Filesystem<D> {
    pub fn read_dinode(&mut self, blkno: u64) -> Result<Dinode> {
        let buf = self.cache.read(blkno)?;
        Dinode::read(&buf, blkno)
    }

    pub fn write_dinode(&mut self, dinode: &Dinode) -> Result<()> {
        let buf = dinode.write(self.cache.block_size() as usize)?;
        self.cache.write(dinode.header.i_blkno, buf);
        Ok(())
    }

    /// Re-serializes `self.super_info` into the on-disk superblock
    /// dinode. Shared by every driver (`tunefs`, `resize`) that mutates
    /// superblock fields after the volume is already formatted.
    pub fn write_superblock_info(&mut self) -> Result<()> {
        let dinode = self.read_dinode(SUPER_BLOCK_BLKNO)?;
        let mut tail = std::io::Cursor::new(Vec::new());
        std::io::Write::write_all(&mut tail, OCFS2_SIGNATURE)?;
        self.super_info
            .write_le(&mut tail)
            .map_err(|_| Ocfs2Error::InvalidArgument("superblock payload too large".into()))?;
        let dinode = Dinode::from_parts(dinode.header, DinodePayload::Raw(tail.into_inner()));
        self.write_dinode(&dinode)
    }
}

/// Builds the superblock dinode (block 2) for a freshly formatted
/// volume. Used only by `format.rs`.
pub fn build_superblock_dinode(
    uuid: [u8; 16],
    label: &str,
    block_size: u32,
    cluster_size: u32,
    clusters_count: u32,
    max_slots: u16,
    root_blkno: u64,
    system_dir_blkno: u64,
    features: Features,
) -> Dinode {
    let mut info = SuperBlockInfo {
        s_root_blkno: root_blkno,
        s_system_dir_blkno: system_dir_blkno,
        s_blocksize_bits: block_size.trailing_zeros() as u8,
        s_clustersize_bits: cluster_size.trailing_zeros() as u8,
        s_max_slots: max_slots,
        s_feature_compat: features.compat,
        s_feature_incompat: features.incompat,
        s_feature_ro_compat: features.ro_compat,
        s_clusters_count: clusters_count,
        s_uuid: uuid,
        ..Default::default()
    };
    info.set_label(label);

    let mut tail = std::io::Cursor::new(Vec::new());
    std::io::Write::write_all(&mut tail, OCFS2_SIGNATURE).unwrap();
    info.write_le(&mut tail).unwrap();

    let header = DinodeHeader {
        i_signature: *crate::dinode::INODE_SIGNATURE,
        i_generation: 1,
        i_fs_generation: 1,
        i_suballoc_slot: 0xffff,
        i_suballoc_bit: 0xffff,
        i_suballoc_loc: 0,
        i_blkno: SUPER_BLOCK_BLKNO,
        i_flags: VALID_FL | SUPER_BLOCK_FL,
        i_dyn_features: 0,
        i_reserved0: 0,
        i_clusters: clusters_count,
        i_uid: 0,
        i_gid: 0,
        i_size: clusters_count as u64 * cluster_size as u64,
        i_mode: 0o644,
        i_links_count: 1,
        i_attr: 0,
        i_orphaned_slot: 0,
        i_reserved1: 0,
        i_ctime: 0,
        i_mtime: 0,
        i_atime: 0,
        i_dtime: 0,
        i_blocks: 0,
        i_last_eb_blk: 0,
        i_check: BlockCheck::default(),
    };

    Dinode::from_parts(header, DinodePayload::Raw(tail.into_inner()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn rejects_ocfs1_signature() {
        let mut data = vec![0u8; 4096 * 8];
        data[0..8].copy_from_slice(OCFS1_SIGNATURE);
        let cursor = Cursor::new(data);
        let err = Ocfs2Filesystem::open(cursor).unwrap_err();
        assert!(matches!(err, Ocfs2Error::IsOcfs1));
    }

    #[test]
    fn opens_a_freshly_built_superblock() {
        let dinode = build_superblock_dinode(
            [1u8; 16],
            "test-vol",
            4096,
            4096,
            1024,
            4,
            0,
            0,
            Features::default(),
        );
        let mut data = vec![0u8; 4096 * 8];
        let buf = dinode.write(4096).unwrap();
        data[4096 * 2..4096 * 3].copy_from_slice(&buf);
        let cursor = Cursor::new(data);
        let fs = Ocfs2Filesystem::open(cursor).unwrap();
        assert_eq!(fs.super_info.label_str(), "test-vol");
    }

    #[test]
    fn recovers_from_a_backup_copy_when_the_primary_is_gone() {
        let block_size = 4096u32;
        let mut dinode = build_superblock_dinode(
            [2u8; 16],
            "backed-up",
            block_size,
            block_size,
            1024,
            4,
            0,
            0,
            Features::default(),
        );
        let backup_blkno = backup_sb_blkno(BACKUP_SB_OFFSETS_GB[0], block_size);
        dinode.header.i_blkno = backup_blkno;
        let buf = dinode.write(block_size as usize).unwrap();

        let mut data = vec![0u8; (backup_blkno + 1) as usize * block_size as usize];
        data[(backup_blkno * block_size as u64) as usize..(backup_blkno * block_size as u64) as usize + buf.len()]
            .copy_from_slice(&buf);
        let cursor = Cursor::new(data);

        let fs = Ocfs2Filesystem::open_from_backup(cursor, block_size).unwrap();
        assert_eq!(fs.super_info.label_str(), "backed-up");
    }
}
