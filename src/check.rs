//! The `ocfs2_block_check` structure embedded in every metadata block:
//! a CRC32C plus the single-bit ECC parity word from `crate::ecc`.
//! Grounded in the CRC32C-in-check-word-zeroed-position pattern the
//! teacher uses for `Ext4SuperBlock`/`Ext4Inode` (`#[br(temp,
//! assert(...))]` / `#[bw(calc(...))]`), extended with the ECC word
//! `spec.md` additionally requires.

use binrw::binrw;

use crate::ecc;
use crate::error::{Ocfs2Error, Result};

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockCheck {
    pub bc_crc32e: u32,
    pub bc_ecc: u16,
    pub bc_reserved: u16,
}

impl BlockCheck {
    /// Stamps `buf` (which must contain this `BlockCheck` at
    /// `check_offset`, currently zeroed) with the CRC32C and ECC of
    /// the rest of the block.
    pub fn stamp(buf: &mut [u8], check_offset: usize) {
        buf[check_offset..check_offset + 8].fill(0);
        let crc = crc32c::crc32c(buf);
        let ecc = ecc::compute(buf);
        buf[check_offset..check_offset + 4].copy_from_slice(&crc.to_le_bytes());
        buf[check_offset + 4..check_offset + 6].copy_from_slice(&(ecc as u16).to_le_bytes());
    }

    /// Verifies and, if a single bit was flipped, repairs `buf` in
    /// place. Returns an error carrying `blkno` if verification can't
    /// reconcile the block at all.
    pub fn verify(buf: &mut [u8], check_offset: usize, blkno: u64) -> Result<()> {
        let stored_crc = u32::from_le_bytes(buf[check_offset..check_offset + 4].try_into().unwrap());
        let stored_ecc =
            u16::from_le_bytes(buf[check_offset + 4..check_offset + 6].try_into().unwrap());
        buf[check_offset..check_offset + 8].fill(0);
        if ecc::verify_and_correct(buf, stored_ecc as u32) {
            // corrected; recompute crc with the repaired bit in place
        }
        let crc = crc32c::crc32c(buf);
        buf[check_offset..check_offset + 4].copy_from_slice(&stored_crc.to_le_bytes());
        buf[check_offset + 4..check_offset + 6].copy_from_slice(&stored_ecc.to_le_bytes());
        if crc != stored_crc {
            return Err(Ocfs2Error::BadChecksum { blkno });
        }
        Ok(())
    }
}
