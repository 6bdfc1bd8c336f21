//! `mkfs.ocfs2`: formats a device (or plain file, for testing) as a
//! fresh OCFS2 volume.
//!
//! Argument handling follows the manual, no-dependency style
//! `examples/maestro-os-maestro-utils/mkfs/src/main.rs` uses for its
//! own `parse_args`/`Args` pair rather than reaching for a CLI parsing
//! crate, since the teacher crate doesn't pull one in either.

use std::env;
use std::fs::OpenOptions;
use std::process::exit;

use ocfs2::feature::{level_defaults, parse_feature_string, Features};
use ocfs2::format::{format, FormatOptions};

struct Args {
    device: Option<String>,
    label: String,
    block_size: u32,
    cluster_size: u32,
    max_slots: u16,
    level: String,
    fs_features: Option<String>,
    volume_size_bytes: Option<u64>,
}

impl Default for Args {
    fn default() -> Self {
        Args {
            device: None,
            label: String::new(),
            block_size: 4096,
            cluster_size: 4096,
            max_slots: 4,
            level: "default".to_string(),
            fs_features: None,
            volume_size_bytes: None,
        }
    }
}

fn die(msg: impl std::fmt::Display) -> ! {
    eprintln!("mkfs.ocfs2: {msg}");
    exit(1)
}

fn parse_args() -> Args {
    let mut args = Args::default();
    let mut iter = env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-b" | "--block-size" => {
                let v = iter.next().unwrap_or_else(|| die("-b requires a value"));
                args.block_size = v.parse().unwrap_or_else(|_| die("invalid block size"));
            }
            "-C" | "--cluster-size" => {
                let v = iter.next().unwrap_or_else(|| die("-C requires a value"));
                args.cluster_size = v.parse().unwrap_or_else(|_| die("invalid cluster size"));
            }
            "-L" | "--label" => {
                args.label = iter.next().unwrap_or_else(|| die("-L requires a value"));
            }
            "-N" | "--node-slots" => {
                let v = iter.next().unwrap_or_else(|| die("-N requires a value"));
                args.max_slots = v.parse().unwrap_or_else(|_| die("invalid slot count"));
            }
            "-T" => {
                args.level = iter.next().unwrap_or_else(|| die("-T requires a value"));
            }
            "--fs-features" => {
                args.fs_features = Some(iter.next().unwrap_or_else(|| die("--fs-features requires a value")));
            }
            "--size" => {
                let v = iter.next().unwrap_or_else(|| die("--size requires a value"));
                args.volume_size_bytes = Some(v.parse().unwrap_or_else(|_| die("invalid size")));
            }
            _ => {
                if args.device.is_some() {
                    die(format!("unexpected argument '{arg}'"));
                }
                args.device = Some(arg);
            }
        }
    }
    args
}

fn main() {
    env_logger::init();
    ocfs2::util::install_sigint_handler();
    let args = parse_args();
    let device_path = args.device.clone().unwrap_or_else(|| die("specify a device"));

    let mut features: Features = level_defaults(&args.level).unwrap_or_else(|e| die(e));
    if let Some(spec) = &args.fs_features {
        features = parse_feature_string(features, spec).unwrap_or_else(|e| die(e));
    }

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(&device_path)
        .unwrap_or_else(|e| die(format!("{device_path}: {e}")));

    let volume_size_bytes = match args.volume_size_bytes {
        Some(size) => size,
        None => file
            .metadata()
            .unwrap_or_else(|e| die(format!("{device_path}: {e}")))
            .len(),
    };

    let uuid = *uuid::Uuid::new_v4().as_bytes();
    let label = if args.label.is_empty() {
        device_path.rsplit('/').next().unwrap_or(&device_path).to_string()
    } else {
        args.label.clone()
    };

    let opts = FormatOptions {
        label,
        uuid,
        block_size: args.block_size,
        cluster_size: args.cluster_size,
        volume_size_bytes,
        max_slots: args.max_slots,
        features,
    };

    let fs = format(file, opts).unwrap_or_else(|e| die(format!("format failed: {e}")));
    println!(
        "Created OCFS2 volume: label={} uuid={} clusters={} slots={}",
        fs.super_info.label_str(),
        fs.super_info.uuid(),
        fs.super_info.s_clusters_count,
        fs.super_info.s_max_slots
    );
    fs.close().unwrap_or_else(|e| die(e));
}
