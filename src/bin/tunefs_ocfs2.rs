//! `tunefs.ocfs2`: relabels, grows the slot count, or enables features
//! on an already-formatted volume.

use std::env;
use std::fs::OpenOptions;
use std::process::exit;

use ocfs2::io::FileDevice;
use ocfs2::superblock::Ocfs2Filesystem;

struct Args {
    device: Option<String>,
    label: Option<String>,
    max_slots: Option<u16>,
    fs_features: Option<String>,
}

fn die(msg: impl std::fmt::Display) -> ! {
    eprintln!("tunefs.ocfs2: {msg}");
    exit(1)
}

fn parse_args() -> Args {
    let mut args = Args { device: None, label: None, max_slots: None, fs_features: None };
    let mut iter = env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-L" | "--label" => {
                args.label = Some(iter.next().unwrap_or_else(|| die("-L requires a value")));
            }
            "-N" | "--node-slots" => {
                let v = iter.next().unwrap_or_else(|| die("-N requires a value"));
                args.max_slots = Some(v.parse().unwrap_or_else(|_| die("invalid slot count")));
            }
            "--fs-features" => {
                args.fs_features = Some(iter.next().unwrap_or_else(|| die("--fs-features requires a value")));
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

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(&device_path)
        .unwrap_or_else(|e| die(format!("{device_path}: {e}")));

    let mut fs: Ocfs2Filesystem<FileDevice<_>> =
        Ocfs2Filesystem::open(file).unwrap_or_else(|e| die(format!("{device_path}: {e}")));

    if let Some(label) = &args.label {
        fs.set_label(label).unwrap_or_else(|e| die(e));
        println!("Changed label to '{label}'");
    }
    if let Some(new_max_slots) = args.max_slots {
        fs.add_slots(new_max_slots).unwrap_or_else(|e| die(e));
        println!("Grew slot count to {new_max_slots}");
    }
    if let Some(spec) = &args.fs_features {
        fs.apply_feature_string(spec).unwrap_or_else(|e| die(e));
        println!("Applied feature set '{spec}'");
    }

    fs.close().unwrap_or_else(|e| die(e));
}
