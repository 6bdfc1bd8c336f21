use std::io;

use thiserror::Error;

/// The closed set of faults this crate can report. Every on-disk
/// inconsistency the core detects maps to exactly one variant here;
/// there is no catch-all "other" case.
#[derive(Debug, Error)]
pub enum Ocfs2Error {
    #[error("i/o error: {0}")]
    IoError(io::ErrorKind),

    #[error("bad magic at block {blkno}: expected {expected:?}, found {found:?}")]
    BadMagic {
        expected: &'static [u8],
        found: Vec<u8>,
        blkno: u64,
    },

    #[error("bad checksum at block {blkno}")]
    BadChecksum { blkno: u64 },

    #[error("not an OCFS2 volume")]
    NotOcfs2,

    #[error("volume uses the legacy OCFS1 on-disk format")]
    IsOcfs1,

    #[error("corrupt extent tree at block {0}")]
    CorruptExtent(u64),

    #[error("corrupt chain allocator at block {0}")]
    CorruptChain(u64),

    #[error("corrupt group descriptor at block {0}")]
    CorruptGroupDescriptor(u64),

    #[error("corrupt directory entry in block {0}")]
    CorruptDirent(u64),

    #[error("corrupt refcount tree at block {0}")]
    CorruptRefcount(u64),

    #[error("corrupt quota structure at block {0}")]
    CorruptQuota(u64),

    #[error("invalid bit {0} in bitmap")]
    InvalidBit(u64),

    #[error("no free bit found")]
    BitNotFound,

    #[error("inode at block {0} is not valid")]
    InodeNotValid(u64),

    #[error("inode at block {0} cannot be iterated as a chain")]
    InodeCannotBeIterated(u64),

    #[error("no space left on device")]
    NoSpace,

    #[error("unsupported feature: {name}")]
    UnsupportedFeature { name: String },

    #[error("cluster denied the requested operation")]
    ClusterDenied,

    #[error("lock is busy")]
    LockBusy,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("directory has no space for a new entry")]
    DirNoSpace,

    #[error("file not found")]
    FileNotFound,

    #[error("interrupted by signal")]
    Interrupted,
}

impl From<io::Error> for Ocfs2Error {
    fn from(e: io::Error) -> Self {
        Ocfs2Error::IoError(e.kind())
    }
}

pub type Result<T> = std::result::Result<T, Ocfs2Error>;
