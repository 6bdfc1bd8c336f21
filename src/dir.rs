//! Directory blocks: the linear encoding (a flat list of
//! variable-length dirents) plus an indexed (`dx_root`/`dx_leaf`) hash
//! index for directories large enough to need one. The literal dirent
//! payload always lives in an ordinary `LinearDirBlock`; the index
//! layer only stores hash-to-block pointers, so `lookup`/`link`/
//! `unlink` fall back to a linear scan inside whichever block the
//! index routes them to.
//!
//! Grounded in `examples/original_source/libocfs2/unlink.c` for
//! unlink/coalesce and `examples/original_source/fswreck/dir.c` for
//! record layout and padding. The variable-length record shape mirrors
//! `src/ext4_h.rs`'s `Ext4DirEntry2`. The index's root/leaf block split
//! follows the same shape as `chain.rs`'s `ChainList`/`GroupDescriptor`
//! split (a small in-place index fanning out to linked/ranged blocks)
//! rather than the real format's two-level TEA-hashed htree; `dx_hash`
//! here is an FNV-1a variant, not the real TEA-derived hash, since
//! nothing in this crate needs on-disk hash compatibility with another
//! implementation, only a stable name-to-bucket mapping.

use binrw::binrw;

use crate::check::BlockCheck;
use crate::error::{Ocfs2Error, Result};
use crate::io::{BlockDevice, Cache};

pub const DIR_REC_LEN_ALIGN: usize = 4;
/// Fixed bytes preceding a dirent's name: `inode`(8) + `rec_len`(2) +
/// `name_len`(1) + `file_type`(1), matching `DirEntry::encode`'s layout.
pub const DIR_ENTRY_HEADER_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub inode: u64,
    pub file_type: u8,
    pub name: String,
}

impl DirEntry {
    pub fn rec_len(&self) -> usize {
        let raw = DIR_ENTRY_HEADER_LEN + self.name.len();
        raw.div_ceil(DIR_REC_LEN_ALIGN) * DIR_REC_LEN_ALIGN
    }

    fn encode(&self, buf: &mut [u8], rec_len: u16) {
        buf[0..8].copy_from_slice(&self.inode.to_le_bytes());
        buf[8..10].copy_from_slice(&rec_len.to_le_bytes());
        buf[10] = self.name.len() as u8;
        buf[11] = self.file_type;
        buf[12..12 + self.name.len()].copy_from_slice(self.name.as_bytes());
    }

    fn decode(buf: &[u8]) -> Option<(Self, u16)> {
        if buf.len() < 12 {
            return None;
        }
        let inode = u64::from_le_bytes(buf[0..8].try_into().unwrap());
        let rec_len = u16::from_le_bytes(buf[8..10].try_into().unwrap());
        let name_len = buf[10] as usize;
        let file_type = buf[11];
        if rec_len as usize > buf.len() || 12 + name_len > buf.len() {
            return None;
        }
        let name = if inode == 0 {
            String::new()
        } else {
            String::from_utf8_lossy(&buf[12..12 + name_len]).into_owned()
        };
        Some((DirEntry { inode, file_type, name }, rec_len))
    }
}

/// A zero-length placeholder record standing in for a "hole" — a slot
/// whose `inode` is 0, meaning its whole `rec_len` is free space.
fn free_hole() -> DirEntry {
    DirEntry { inode: 0, file_type: 0, name: String::new() }
}

/// A single linear directory block: a packed run of `DirEntry`
/// records, the last of which absorbs any leftover space via its
/// `rec_len` (an inode of 0 in a trailing record means "free space",
/// matching the real format's hole-as-deleted-entry convention).
#[derive(Debug, Clone)]
pub struct LinearDirBlock {
    block_size: usize,
    entries: Vec<(DirEntry, u16)>,
}

impl LinearDirBlock {
    pub fn new(block_size: usize) -> Self {
        LinearDirBlock { block_size, entries: Vec::new() }
    }

    /// `.`/`..` must be the first two entries (`spec.md` §3's
    /// directory-block invariant); callers must add them before
    /// anything else.
    pub fn init_dots(&mut self, self_ino: u64, parent_ino: u64) {
        self.entries.clear();
        let dot = DirEntry { inode: self_ino, file_type: 2, name: ".".to_string() };
        let dot_len = dot.rec_len() as u16;
        self.entries.push((dot, dot_len));
        let dotdot = DirEntry { inode: parent_ino, file_type: 2, name: "..".to_string() };
        let dotdot_len = self.block_size as u16 - dot_len;
        self.entries.push((dotdot, dotdot_len));
    }

    fn used_len(&self) -> usize {
        self.entries.iter().map(|(_, len)| *len as usize).sum()
    }

    /// Trailing free space held by the record at `idx`: the whole slot
    /// if it's a deleted (`inode == 0`) hole, otherwise whatever is
    /// left after the live entry's own encoded length.
    fn free_space_at(&self, idx: usize) -> usize {
        let (entry, rec_len) = &self.entries[idx];
        let rec_len = *rec_len as usize;
        if entry.inode == 0 {
            rec_len
        } else {
            rec_len - entry.rec_len()
        }
    }

    /// Finds the first record whose trailing free space fits `entry`,
    /// scanning every record in block order rather than only the last
    /// one, so space freed by `remove` anywhere in the block is
    /// reusable (`spec.md` §4.6's `link`: "finds the first record whose
    /// trailing free space is >= DIR_REC_LEN(name_len)").
    fn find_first_fit(&self, entry: &DirEntry) -> Option<usize> {
        (0..self.entries.len()).find(|&idx| self.free_space_at(idx) >= entry.rec_len())
    }

    pub fn fits(&self, entry: &DirEntry) -> bool {
        if self.entries.is_empty() {
            return entry.rec_len() <= self.block_size;
        }
        self.find_first_fit(entry).is_some()
    }

    pub fn add_entry(&mut self, entry: DirEntry) -> Result<()> {
        if self.entries.is_empty() {
            if entry.rec_len() > self.block_size {
                return Err(Ocfs2Error::DirNoSpace);
            }
            self.entries.push((entry, self.block_size as u16));
            return Ok(());
        }
        let idx = self.find_first_fit(&entry).ok_or(Ocfs2Error::DirNoSpace)?;
        let needed = entry.rec_len() as u16;
        let (host, host_rec_len) = self.entries[idx].clone();
        let is_hole = host.inode == 0;
        let host_used = if is_hole { 0 } else { host.rec_len() as u16 };
        let leftover = host_rec_len - host_used - needed;

        if is_hole {
            if leftover == 0 {
                self.entries[idx] = (entry, host_rec_len);
            } else {
                self.entries[idx] = (entry, needed);
                self.entries.insert(idx + 1, (free_hole(), leftover));
            }
        } else {
            self.entries[idx].1 = host_used;
            self.entries.insert(idx + 1, (entry, needed));
            if leftover > 0 {
                self.entries.insert(idx + 2, (free_hole(), leftover));
            }
        }
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<&DirEntry> {
        self.entries.iter().map(|(e, _)| e).find(|e| e.inode != 0 && e.name == name)
    }

    /// Marks `name`'s entry as free by zeroing its inode number and
    /// merging its space into whichever entry directly precedes it,
    /// mirroring the real unlink's in-place coalescing.
    pub fn remove(&mut self, name: &str) -> Result<()> {
        let idx = self
            .entries
            .iter()
            .position(|(e, _)| e.inode != 0 && e.name == name)
            .ok_or(Ocfs2Error::FileNotFound)?;
        if idx == 0 {
            self.entries[0].0.inode = 0;
            self.entries[0].0.name.clear();
        } else {
            let (_, freed_len) = self.entries.remove(idx);
            self.entries[idx - 1].1 += freed_len;
        }
        Ok(())
    }

    pub fn entries(&self) -> impl Iterator<Item = &DirEntry> {
        self.entries.iter().map(|(e, _)| e).filter(|e| e.inode != 0)
    }

    pub fn write_into(&self, buf: &mut [u8]) {
        assert!(buf.len() >= self.block_size);
        buf[..self.block_size].fill(0);
        let mut offset = 0usize;
        for (entry, rec_len) in &self.entries {
            entry.encode(&mut buf[offset..offset + *rec_len as usize], *rec_len);
            offset += *rec_len as usize;
        }
    }

    pub fn read_from(buf: &[u8]) -> Result<Self> {
        let mut entries = Vec::new();
        let mut offset = 0usize;
        while offset + 12 <= buf.len() {
            let (entry, rec_len) =
                DirEntry::decode(&buf[offset..]).ok_or(Ocfs2Error::CorruptDirent(0))?;
            if rec_len == 0 {
                break;
            }
            entries.push((entry, rec_len));
            offset += rec_len as usize;
        }
        Ok(LinearDirBlock { block_size: buf.len(), entries })
    }
}

pub const DX_ROOT_SIGNATURE: &[u8; 8] = b"DXDIR01\0";
pub const DX_LEAF_SIGNATURE: &[u8; 8] = b"DXLEAF1\0";

const DX_ROOT_CHECK_OFFSET: usize = 26;
const DX_LEAF_CHECK_OFFSET: usize = 20;

/// A simplified hash used to bucket names into `dx_leaf` blocks. Not
/// the real format's TEA-derived hash — an FNV-1a variant, since this
/// index only needs a stable name-to-bucket mapping, not wire
/// compatibility with another implementation's htree.
pub fn dx_hash(name: &str) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for b in name.as_bytes() {
        hash ^= *b as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

/// One hash-to-block pointer inside a `DxLeaf`. Unlike the real
/// format's `ocfs2_dx_entry` (which also records a byte offset into
/// the target block), this crate always resolves a hit by scanning the
/// whole target `LinearDirBlock` for the literal name, so only the
/// block number is kept.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DxEntry {
    pub hash: u32,
    pub dirent_blkno: u64,
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DxLeaf {
    #[br(assert(&dl_signature == DX_LEAF_SIGNATURE, "bad dx leaf signature"))]
    pub dl_signature: [u8; 8],
    pub dl_blkno: u64,
    pub dl_count: u16,
    pub dl_num_used: u16,
    pub dl_check: BlockCheck,
    #[br(count = dl_num_used)]
    pub dl_list: Vec<DxEntry>,
}

/// One hash-range-to-leaf pointer inside a `DxRoot`. `hash_start` is
/// the lowest hash routed to `leaf_blkno`; entries are kept sorted so
/// `leaf_for_hash` can pick "the last range whose start is <= hash".
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DxRootEntry {
    pub hash_start: u32,
    pub leaf_blkno: u64,
}

/// The root of a directory's hash index: a flat, single-level fan-out
/// to `DxLeaf` blocks. The real format allows a second level of
/// interior nodes above the leaves; this crate caps the index at one
/// level, splitting a full leaf via `spill` instead of growing a
/// second level, a deliberate simplification recorded in `DESIGN.md`.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DxRoot {
    #[br(assert(&dr_signature == DX_ROOT_SIGNATURE, "bad dx root signature"))]
    pub dr_signature: [u8; 8],
    pub dr_blkno: u64,
    pub dr_dir_blkno: u64,
    pub dr_num_entries: u16,
    pub dr_check: BlockCheck,
    #[br(count = dr_num_entries)]
    pub dr_entries: Vec<DxRootEntry>,
}

/// A directory's hash index, backing `lookup`/`link`/`unlink` for
/// directories too large to scan linearly. Dirent payloads still live
/// in ordinary `LinearDirBlock`s addressed by `DxEntry::dirent_blkno`;
/// this type only maintains the hash-to-block routing layer.
pub struct IndexedDir<'a, D: BlockDevice> {
    cache: &'a mut Cache<D>,
}

impl<'a, D: BlockDevice> IndexedDir<'a, D> {
    pub fn new(cache: &'a mut Cache<D>) -> Self {
        IndexedDir { cache }
    }

    fn read_root(&mut self, blkno: u64) -> Result<DxRoot> {
        let mut buf = self.cache.read(blkno)?;
        BlockCheck::verify(&mut buf, DX_ROOT_CHECK_OFFSET, blkno)?;
        let mut cursor = std::io::Cursor::new(&buf);
        binrw::BinRead::read_le(&mut cursor).map_err(|_| Ocfs2Error::CorruptDirent(blkno))
    }

    fn write_root(&mut self, root: &DxRoot) -> Result<()> {
        let mut out = std::io::Cursor::new(Vec::new());
        binrw::BinWrite::write_le(root, &mut out).map_err(|_| Ocfs2Error::CorruptDirent(root.dr_blkno))?;
        let mut buf = out.into_inner();
        buf.resize(self.cache.block_size() as usize, 0);
        BlockCheck::stamp(&mut buf, DX_ROOT_CHECK_OFFSET);
        self.cache.write(root.dr_blkno, buf);
        Ok(())
    }

    fn read_leaf(&mut self, blkno: u64) -> Result<DxLeaf> {
        let mut buf = self.cache.read(blkno)?;
        BlockCheck::verify(&mut buf, DX_LEAF_CHECK_OFFSET, blkno)?;
        let mut cursor = std::io::Cursor::new(&buf);
        binrw::BinRead::read_le(&mut cursor).map_err(|_| Ocfs2Error::CorruptDirent(blkno))
    }

    fn write_leaf(&mut self, leaf: &DxLeaf) -> Result<()> {
        let mut out = std::io::Cursor::new(Vec::new());
        binrw::BinWrite::write_le(leaf, &mut out).map_err(|_| Ocfs2Error::CorruptDirent(leaf.dl_blkno))?;
        let mut buf = out.into_inner();
        buf.resize(self.cache.block_size() as usize, 0);
        BlockCheck::stamp(&mut buf, DX_LEAF_CHECK_OFFSET);
        self.cache.write(leaf.dl_blkno, buf);
        Ok(())
    }

    fn leaf_for_hash(root: &DxRoot, hash: u32) -> Option<u64> {
        root.dr_entries.iter().rev().find(|e| e.hash_start <= hash).map(|e| e.leaf_blkno)
    }

    /// Creates a fresh, empty index: one root block and the single
    /// leaf it starts out pointing at (covering every hash).
    pub fn create(&mut self, root_blkno: u64, dir_blkno: u64, leaf_blkno: u64, leaf_capacity: u16) -> Result<()> {
        let leaf = DxLeaf {
            dl_signature: *DX_LEAF_SIGNATURE,
            dl_blkno: leaf_blkno,
            dl_count: leaf_capacity,
            dl_num_used: 0,
            dl_check: BlockCheck::default(),
            dl_list: Vec::new(),
        };
        self.write_leaf(&leaf)?;
        let root = DxRoot {
            dr_signature: *DX_ROOT_SIGNATURE,
            dr_blkno: root_blkno,
            dr_dir_blkno: dir_blkno,
            dr_num_entries: 1,
            dr_check: BlockCheck::default(),
            dr_entries: vec![DxRootEntry { hash_start: 0, leaf_blkno }],
        };
        self.write_root(&root)
    }

    /// Finds `name`'s dirent by hashing it, routing to the owning leaf,
    /// then checking every candidate block a matching hash points at
    /// (hash collisions are resolved by the literal name comparison,
    /// same as the real htree).
    pub fn lookup(&mut self, root_blkno: u64, name: &str) -> Result<Option<DirEntry>> {
        let root = self.read_root(root_blkno)?;
        let hash = dx_hash(name);
        let Some(leaf_blkno) = Self::leaf_for_hash(&root, hash) else {
            return Ok(None);
        };
        let leaf = self.read_leaf(leaf_blkno)?;
        for entry in leaf.dl_list.iter().filter(|e| e.hash == hash) {
            let buf = self.cache.read(entry.dirent_blkno)?;
            let block = LinearDirBlock::read_from(&buf)?;
            if let Some(found) = block.find(name) {
                return Ok(Some(found.clone()));
            }
        }
        Ok(None)
    }

    /// Records that `name` (already written into `dirent_blkno`'s
    /// `LinearDirBlock` by the caller) is routed through the index.
    /// Spills the owning leaf into two when it's full, calling
    /// `alloc_block` for the new leaf's block number.
    pub fn link(
        &mut self,
        root_blkno: u64,
        name: &str,
        dirent_blkno: u64,
        mut alloc_block: impl FnMut() -> Result<u64>,
    ) -> Result<()> {
        let mut root = self.read_root(root_blkno)?;
        let hash = dx_hash(name);
        let leaf_blkno =
            Self::leaf_for_hash(&root, hash).ok_or(Ocfs2Error::CorruptDirent(root_blkno))?;
        let mut leaf = self.read_leaf(leaf_blkno)?;
        if leaf.dl_list.len() < leaf.dl_count as usize {
            leaf.dl_list.push(DxEntry { hash, dirent_blkno });
            leaf.dl_num_used = leaf.dl_list.len() as u16;
            return self.write_leaf(&leaf);
        }
        let new_leaf_blkno = alloc_block()?;
        self.spill(&mut root, &leaf, new_leaf_blkno)?;
        self.write_root(&root)?;
        self.link(root_blkno, name, dirent_blkno, alloc_block)
    }

    /// Removes the index pointer for `name` in `dirent_blkno`. The
    /// caller is responsible for removing the literal dirent from the
    /// `LinearDirBlock` itself.
    pub fn unlink(&mut self, root_blkno: u64, name: &str, dirent_blkno: u64) -> Result<()> {
        let root = self.read_root(root_blkno)?;
        let hash = dx_hash(name);
        let leaf_blkno =
            Self::leaf_for_hash(&root, hash).ok_or(Ocfs2Error::FileNotFound)?;
        let mut leaf = self.read_leaf(leaf_blkno)?;
        let idx = leaf
            .dl_list
            .iter()
            .position(|e| e.hash == hash && e.dirent_blkno == dirent_blkno)
            .ok_or(Ocfs2Error::FileNotFound)?;
        leaf.dl_list.remove(idx);
        leaf.dl_num_used = leaf.dl_list.len() as u16;
        self.write_leaf(&leaf)
    }

    /// Splits an over-full leaf at its median hash: the lower half
    /// stays at the original block, the upper half moves to
    /// `new_leaf_blkno`, and `root` gains a new range entry pointing
    /// at it. Mirrors `ocfs2_dx_dir_rebalance`'s median split, without
    /// that function's recursive growth into a second index level.
    fn spill(&mut self, root: &mut DxRoot, full_leaf: &DxLeaf, new_leaf_blkno: u64) -> Result<()> {
        let mut sorted = full_leaf.dl_list.clone();
        sorted.sort_by_key(|e| e.hash);
        let upper = sorted.split_off(sorted.len() / 2);
        let split_hash = upper.first().map(|e| e.hash).unwrap_or(u32::MAX);

        let mut lower_leaf = full_leaf.clone();
        lower_leaf.dl_list = sorted;
        lower_leaf.dl_num_used = lower_leaf.dl_list.len() as u16;
        self.write_leaf(&lower_leaf)?;

        let upper_leaf = DxLeaf {
            dl_signature: *DX_LEAF_SIGNATURE,
            dl_blkno: new_leaf_blkno,
            dl_count: full_leaf.dl_count,
            dl_num_used: upper.len() as u16,
            dl_check: BlockCheck::default(),
            dl_list: upper,
        };
        self.write_leaf(&upper_leaf)?;

        root.dr_entries.push(DxRootEntry { hash_start: split_hash, leaf_blkno: new_leaf_blkno });
        root.dr_entries.sort_by_key(|e| e.hash_start);
        root.dr_num_entries = root.dr_entries.len() as u16;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_and_dotdot_are_first() {
        let mut block = LinearDirBlock::new(256);
        block.init_dots(5, 2);
        let names: Vec<_> = block.entries().map(|e| e.name.clone()).collect();
        assert_eq!(names, vec![".", ".."]);
    }

    #[test]
    fn add_find_and_remove_round_trip() {
        let mut block = LinearDirBlock::new(256);
        block.init_dots(5, 2);
        block
            .add_entry(DirEntry { inode: 42, file_type: 1, name: "hello.txt".to_string() })
            .unwrap();
        assert_eq!(block.find("hello.txt").unwrap().inode, 42);
        block.remove("hello.txt").unwrap();
        assert!(block.find("hello.txt").is_none());
    }

    #[test]
    fn write_then_read_preserves_entries() {
        let mut block = LinearDirBlock::new(256);
        block.init_dots(5, 2);
        block
            .add_entry(DirEntry { inode: 42, file_type: 1, name: "a".to_string() })
            .unwrap();
        let mut buf = vec![0u8; 256];
        block.write_into(&mut buf);
        let read_back = LinearDirBlock::read_from(&buf).unwrap();
        assert_eq!(read_back.find("a").unwrap().inode, 42);
    }

    #[test]
    fn reuses_space_freed_in_the_middle_of_a_block() {
        let mut block = LinearDirBlock::new(256);
        block.init_dots(5, 2);
        block.add_entry(DirEntry { inode: 10, file_type: 1, name: "first".to_string() }).unwrap();
        block.add_entry(DirEntry { inode: 11, file_type: 1, name: "second".to_string() }).unwrap();
        block.add_entry(DirEntry { inode: 12, file_type: 1, name: "third".to_string() }).unwrap();
        // Free the middle entry; its space must not be the only thing
        // appended to, it must become reusable for the next add.
        block.remove("second").unwrap();
        assert!(block.find("second").is_none());
        block.add_entry(DirEntry { inode: 13, file_type: 1, name: "s2".to_string() }).unwrap();
        assert_eq!(block.find("s2").unwrap().inode, 13);
        assert_eq!(block.find("first").unwrap().inode, 10);
        assert_eq!(block.find("third").unwrap().inode, 12);
        // Round-trip through the on-disk encoding to confirm no
        // overlapping or truncated records resulted.
        let mut buf = vec![0u8; 256];
        block.write_into(&mut buf);
        let read_back = LinearDirBlock::read_from(&buf).unwrap();
        assert_eq!(read_back.find("first").unwrap().inode, 10);
        assert_eq!(read_back.find("s2").unwrap().inode, 13);
        assert_eq!(read_back.find("third").unwrap().inode, 12);
    }

    #[test]
    fn rejects_entry_that_does_not_fit() {
        let mut block = LinearDirBlock::new(32);
        block.init_dots(5, 2);
        let long_name = "a".repeat(64);
        let result = block.add_entry(DirEntry { inode: 9, file_type: 1, name: long_name });
        assert!(result.is_err());
    }

    fn fresh_cache() -> Cache<crate::io::FileDevice<std::io::Cursor<Vec<u8>>>> {
        use crate::io::FileDevice;
        use std::io::Cursor;
        Cache::new(FileDevice::new(Cursor::new(vec![0u8; 4096 * 64]), 4096))
    }

    fn write_dirent_block(cache: &mut Cache<crate::io::FileDevice<std::io::Cursor<Vec<u8>>>>, blkno: u64, inode: u64, name: &str) {
        let mut block = LinearDirBlock::new(4096);
        block.add_entry(DirEntry { inode, file_type: 1, name: name.to_string() }).unwrap();
        let mut buf = vec![0u8; 4096];
        block.write_into(&mut buf);
        cache.write(blkno, buf);
    }

    #[test]
    fn indexed_dir_link_then_lookup_round_trips() {
        let mut cache = fresh_cache();
        let mut idx = IndexedDir::new(&mut cache);
        idx.create(1, 0, 2, 4).unwrap();
        drop(idx);

        write_dirent_block(&mut cache, 10, 42, "hello.txt");
        let mut idx = IndexedDir::new(&mut cache);
        idx.link(1, "hello.txt", 10, || unreachable!()).unwrap();
        let found = idx.lookup(1, "hello.txt").unwrap().unwrap();
        assert_eq!(found.inode, 42);
        assert!(idx.lookup(1, "nope.txt").unwrap().is_none());
    }

    #[test]
    fn indexed_dir_unlink_removes_the_pointer() {
        let mut cache = fresh_cache();
        let mut idx = IndexedDir::new(&mut cache);
        idx.create(1, 0, 2, 4).unwrap();
        drop(idx);
        write_dirent_block(&mut cache, 10, 42, "hello.txt");
        let mut idx = IndexedDir::new(&mut cache);
        idx.link(1, "hello.txt", 10, || unreachable!()).unwrap();
        idx.unlink(1, "hello.txt", 10).unwrap();
        assert!(idx.lookup(1, "hello.txt").unwrap().is_none());
    }

    #[test]
    fn indexed_dir_spills_a_full_leaf_into_two() {
        let mut cache = fresh_cache();
        let mut idx = IndexedDir::new(&mut cache);
        idx.create(1, 0, 2, 2).unwrap();
        drop(idx);
        for (i, name) in ["a", "b", "c"].iter().enumerate() {
            write_dirent_block(&mut cache, 10 + i as u64, 100 + i as u64, name);
        }
        let mut idx = IndexedDir::new(&mut cache);
        let mut next_blkno = 50u64;
        for (i, name) in ["a", "b", "c"].iter().enumerate() {
            idx.link(1, name, 10 + i as u64, || {
                next_blkno += 1;
                Ok(next_blkno)
            })
            .unwrap();
        }
        for (i, name) in ["a", "b", "c"].iter().enumerate() {
            let found = idx.lookup(1, name).unwrap().unwrap();
            assert_eq!(found.inode, 100 + i as u64);
        }
        let root = idx.read_root(1).unwrap();
        assert!(root.dr_entries.len() > 1);
    }
}
