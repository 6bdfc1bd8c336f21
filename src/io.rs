//! Block device abstraction and the write-back cache in front of it.
//!
//! Grounded on `BlockWriteDeviece` in the teacher crate's `lib.rs`
//! (a single-method trait, blanket-implemented for any
//! `io::Write + io::Seek`), generalized to cover reads as well, since
//! every driver but `format` must read back an existing volume.

use std::collections::HashMap;
use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::error::{Ocfs2Error, Result};

/// Anything that can be addressed as a flat array of fixed-size blocks.
pub trait BlockDevice {
    fn block_size(&self) -> u32;
    fn read_block(&mut self, block_num: u64, buf: &mut [u8]) -> io::Result<()>;
    fn write_block(&mut self, block_num: u64, buf: &[u8]) -> io::Result<()>;
}

/// A plain file (or anything seekable) addressed at a fixed block size.
#[derive(Debug)]
pub struct FileDevice<F> {
    inner: F,
    block_size: u32,
}

impl<F: Read + Write + Seek> FileDevice<F> {
    pub fn new(inner: F, block_size: u32) -> Self {
        FileDevice { inner, block_size }
    }

    pub fn into_inner(self) -> F {
        self.inner
    }
}

impl<F: Read + Write + Seek> BlockDevice for FileDevice<F> {
    fn block_size(&self) -> u32 {
        self.block_size
    }

    fn read_block(&mut self, block_num: u64, buf: &mut [u8]) -> io::Result<()> {
        assert!(buf.len() <= self.block_size as usize);
        self.inner
            .seek(SeekFrom::Start(block_num * self.block_size as u64))?;
        self.inner.read_exact(buf)
    }

    fn write_block(&mut self, block_num: u64, buf: &[u8]) -> io::Result<()> {
        assert!(buf.len() <= self.block_size as usize);
        self.inner
            .seek(SeekFrom::Start(block_num * self.block_size as u64))?;
        self.inner.write_all(buf)
    }
}

/// Order in which a compound metadata update must hit the device, per
/// the concurrency model's crash-consistency requirement: group
/// descriptor, then chain record, then dinode counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CommitPhase {
    GroupDescriptor,
    ChainRecord,
    DinodeCounters,
}

/// Wraps a `BlockDevice`, batching dirty blocks in RAM and flushing
/// them in a caller-specified phase order. Verification of metadata
/// blocks (signature/CRC32C/ECC) happens one layer up, in
/// `superblock.rs` and friends, since only they know a given block's
/// expected signature.
#[derive(Debug)]
pub struct Cache<D> {
    device: D,
    dirty: HashMap<u64, Vec<u8>>,
    pending: Vec<(CommitPhase, u64, Vec<u8>)>,
}

impl<D: BlockDevice> Cache<D> {
    pub fn new(device: D) -> Self {
        Cache {
            device,
            dirty: HashMap::new(),
            pending: Vec::new(),
        }
    }

    pub fn block_size(&self) -> u32 {
        self.device.block_size()
    }

    pub fn read(&mut self, block_num: u64) -> Result<Vec<u8>> {
        if let Some(buf) = self.dirty.get(&block_num) {
            return Ok(buf.clone());
        }
        let mut buf = vec![0u8; self.device.block_size() as usize];
        self.device.read_block(block_num, &mut buf)?;
        Ok(buf)
    }

    /// Stage a write for immediate (unordered) visibility to later
    /// `read()` calls, without committing to the device yet.
    pub fn write(&mut self, block_num: u64, buf: Vec<u8>) {
        self.dirty.insert(block_num, buf);
    }

    /// Stage a write that must land on the device only after every
    /// write of an earlier `CommitPhase` has landed.
    pub fn write_ordered(&mut self, phase: CommitPhase, block_num: u64, buf: Vec<u8>) {
        self.dirty.insert(block_num, buf.clone());
        self.pending.push((phase, block_num, buf));
    }

    /// Flush every block staged via `write`/`write_ordered`. Ordered
    /// writes land by increasing `CommitPhase`; plain writes land
    /// first since they carry no ordering requirement.
    pub fn flush(&mut self) -> Result<()> {
        let mut ordered = std::mem::take(&mut self.pending);
        ordered.sort_by_key(|(phase, _, _)| *phase);
        let ordered_blocks: std::collections::HashSet<u64> =
            ordered.iter().map(|(_, b, _)| *b).collect();
        for (block_num, buf) in self.dirty.drain() {
            if !ordered_blocks.contains(&block_num) {
                self.device.write_block(block_num, &buf)?;
            }
        }
        for (_, block_num, buf) in ordered {
            self.device.write_block(block_num, &buf)?;
        }
        Ok(())
    }

    pub fn into_device(self) -> D {
        self.device
    }
}

pub fn check_signature(buf: &[u8], expected: &'static [u8], blkno: u64) -> Result<()> {
    if !buf.starts_with(expected) {
        return Err(Ocfs2Error::BadMagic {
            expected,
            found: buf[..expected.len().min(buf.len())].to_vec(),
            blkno,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn file_device_round_trips_a_block() {
        let cursor = Cursor::new(vec![0u8; 4096 * 4]);
        let mut dev = FileDevice::new(cursor, 4096);
        let block = vec![0xABu8; 4096];
        dev.write_block(2, &block).unwrap();
        let mut read_back = vec![0u8; 4096];
        dev.read_block(2, &mut read_back).unwrap();
        assert_eq!(read_back, block);
    }

    #[test]
    fn cache_flushes_ordered_writes_in_phase_order() {
        let cursor = Cursor::new(vec![0u8; 4096 * 4]);
        let dev = FileDevice::new(cursor, 4096);
        let mut cache = Cache::new(dev);
        cache.write_ordered(CommitPhase::DinodeCounters, 0, vec![3u8; 4096]);
        cache.write_ordered(CommitPhase::GroupDescriptor, 1, vec![1u8; 4096]);
        cache.write_ordered(CommitPhase::ChainRecord, 2, vec![2u8; 4096]);
        cache.flush().unwrap();
        let mut dev = cache.into_device();
        let mut buf = vec![0u8; 4096];
        dev.read_block(0, &mut buf).unwrap();
        assert_eq!(buf[0], 3);
    }
}
