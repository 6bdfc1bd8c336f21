//! A userspace library and tool suite for the OCFS2 on-disk format:
//! reading, formatting, growing, and checking volumes without going
//! through the kernel driver.
//!
//! The crate is organized bottom-up: fixed-size on-disk structures
//! (`dinode`, `extent`, `chain`, `check`, `superblock`) at the base,
//! allocation policy (`bitmap`, `local_alloc`, `truncate_log`,
//! `refcount`, `quota`) above that, then the driver engines
//! (`format`, `tunefs`, `resize`, `fsck`) that compose them into the
//! operations the `mkfs.ocfs2`/`tunefs.ocfs2`/`fsck.ocfs2`/
//! `debugfs.ocfs2` binaries expose.

pub mod bitmap;
pub mod chain;
pub mod check;
pub mod dinode;
pub mod dir;
pub mod dlm;
pub mod ecc;
pub mod error;
pub mod extent;
pub mod feature;
pub(crate) mod file_tree;
pub mod format;
pub mod fsck;
pub mod io;
pub mod local_alloc;
pub mod quota;
pub mod refcount;
pub mod resize;
pub mod superblock;
pub mod truncate_log;
pub mod tunefs;
pub mod util;
pub mod wire;

pub use error::{Ocfs2Error, Result};
