//! `fsck.ocfs2`: read-only consistency check. Exits non-zero and
//! prints every finding when the volume isn't clean; repair is out of
//! scope (`ocfs2::fsck`'s module doc explains why).

use std::env;
use std::fs::OpenOptions;
use std::process::exit;

use ocfs2::fsck::check;
use ocfs2::io::FileDevice;
use ocfs2::superblock::Ocfs2Filesystem;

fn die(msg: impl std::fmt::Display) -> ! {
    eprintln!("fsck.ocfs2: {msg}");
    exit(1)
}

fn main() {
    env_logger::init();
    let device_path = env::args().nth(1).unwrap_or_else(|| die("specify a device"));

    let file = OpenOptions::new()
        .read(true)
        .open(&device_path)
        .unwrap_or_else(|e| die(format!("{device_path}: {e}")));

    let mut fs: Ocfs2Filesystem<FileDevice<_>> =
        Ocfs2Filesystem::open(file).unwrap_or_else(|e| die(format!("{device_path}: {e}")));

    let report = check(&mut fs).unwrap_or_else(|e| die(format!("check failed: {e}")));

    if report.is_clean() {
        println!("{device_path}: clean");
        return;
    }

    for finding in &report.findings {
        println!("{finding:?}");
    }
    eprintln!("{device_path}: {} problem(s) found", report.findings.len());
    exit(1);
}
