//! `debugfs.ocfs2`: a minimal read-only inspector, mirroring the real
//! tool's non-interactive single-command mode (`debugfs.ocfs2 -R
//! "<command>" device`) rather than its interactive shell, which is
//! out of scope here.
//!
//! Supported commands: `stats` (superblock summary) and `ls <root|
//! system>` (list one of the two fixed directories this crate models).

use std::env;
use std::fs::OpenOptions;
use std::process::exit;

use ocfs2::dinode::DinodePayload;
use ocfs2::dir::LinearDirBlock;
use ocfs2::extent::iterate_leaves;
use ocfs2::io::FileDevice;
use ocfs2::superblock::Ocfs2Filesystem;
use ocfs2::util::hexdump;

fn die(msg: impl std::fmt::Display) -> ! {
    eprintln!("debugfs.ocfs2: {msg}");
    exit(1)
}

fn print_stats(fs: &ocfs2::superblock::Ocfs2Filesystem<FileDevice<std::fs::File>>) {
    let info = &fs.super_info;
    println!("Label: {}", info.label_str());
    println!("UUID: {}", info.uuid());
    println!("Block size: {}", info.block_size());
    println!("Cluster size: {}", info.cluster_size());
    println!("Clusters: {}", info.s_clusters_count);
    println!("Node slots: {}", info.s_max_slots);
    println!("Root dir blkno: {}", info.s_root_blkno);
    println!("System dir blkno: {}", info.s_system_dir_blkno);
    let features = info.features();
    let mut names = Vec::new();
    for name in ["backup-super", "sparse", "inline-data", "local", "unwritten", "refcount"] {
        if features.has(name) {
            names.push(name);
        }
    }
    println!("Features: {}", names.join(","));
}

fn list_dir(fs: &mut Ocfs2Filesystem<FileDevice<std::fs::File>>, blkno: u64) {
    let dinode = fs.read_dinode(blkno).unwrap_or_else(|e| die(e));
    if !dinode.is_directory() {
        die(format!("inode {blkno} is not a directory"));
    }
    let el = match &dinode.payload {
        DinodePayload::ExtentTree(el) => el.clone(),
        _ => die(format!("inode {blkno} has no extent tree")),
    };
    let fs_generation = fs.fs_generation;
    let mut blocks = Vec::new();
    iterate_leaves(&mut fs.cache, &el, blkno, fs_generation, &mut |rec| {
        for i in 0..rec.clusters() as u64 {
            blocks.push(rec.e_blkno + i);
        }
    })
    .unwrap_or_else(|e| die(e));

    for data_blkno in blocks {
        let buf = fs.cache.read(data_blkno).unwrap_or_else(|e| die(e));
        let block = LinearDirBlock::read_from(&buf).unwrap_or_else(|e| die(e));
        for entry in block.entries() {
            println!("{:<10} {}", entry.inode, entry.name);
        }
    }
}

fn main() {
    env_logger::init();
    let mut iter = env::args().skip(1);
    let command = iter.next().unwrap_or_else(|| die("specify a command: stats | ls | dump"));

    match command.as_str() {
        "stats" => {
            let device_path = iter.next().unwrap_or_else(|| die("specify a device"));
            let file = OpenOptions::new().read(true).open(&device_path).unwrap_or_else(|e| die(e));
            let fs: Ocfs2Filesystem<FileDevice<_>> = Ocfs2Filesystem::open(file).unwrap_or_else(|e| die(e));
            print_stats(&fs);
        }
        "ls" => {
            let which = iter.next().unwrap_or_else(|| die("specify 'root' or 'system'"));
            let device_path = iter.next().unwrap_or_else(|| die("specify a device"));
            let file = OpenOptions::new().read(true).open(&device_path).unwrap_or_else(|e| die(e));
            let mut fs: Ocfs2Filesystem<FileDevice<_>> = Ocfs2Filesystem::open(file).unwrap_or_else(|e| die(e));
            let blkno = match which.as_str() {
                "root" => fs.super_info.s_root_blkno,
                "system" => fs.super_info.s_system_dir_blkno,
                other => die(format!("unknown directory '{other}'")),
            };
            list_dir(&mut fs, blkno);
        }
        "dump" => {
            let blkno: u64 = iter
                .next()
                .unwrap_or_else(|| die("specify a block number"))
                .parse()
                .unwrap_or_else(|_| die("invalid block number"));
            let device_path = iter.next().unwrap_or_else(|| die("specify a device"));
            let file = OpenOptions::new().read(true).open(&device_path).unwrap_or_else(|e| die(e));
            let mut fs: Ocfs2Filesystem<FileDevice<_>> = Ocfs2Filesystem::open(file).unwrap_or_else(|e| die(e));
            let buf = fs.cache.read(blkno).unwrap_or_else(|e| die(e));
            hexdump(&buf);
        }
        other => die(format!("unknown command '{other}'")),
    }
}
