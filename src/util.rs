use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn mark_interrupted(_signum: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Installs a `SIGINT` handler that sets a process-wide flag instead of
/// terminating the process, so a driver mid-way through laying out
/// on-disk structures (`format`, `resize`) can finish the write it's on
/// and exit cleanly rather than leaving a half-written volume.
pub fn install_sigint_handler() {
    unsafe {
        libc::signal(libc::SIGINT, mark_interrupted as libc::sighandler_t);
    }
}

/// True once `SIGINT` has arrived since the last `install_sigint_handler`
/// call. Long-running loops poll this between steps.
pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

#[allow(dead_code)]
pub fn hexdump(data: &[u8]) {
    println!("Hexdump ({} bytes):", data.len());
    let mut last_omitted = false;
    for (i, chunk) in data.chunks(16).enumerate() {
        if chunk.iter().all(|&b| b == 0) {
            if !last_omitted {
                println!("*");
            }
            last_omitted = true;
            continue;
        }
        last_omitted = false;
        print!("{:08X}  ", i * 16);
        for byte in chunk {
            print!("{:02X} ", byte);
        }
        for _ in 0..(16 - chunk.len()) {
            print!("   ");
        }
        print!(" |");
        for byte in chunk {
            if byte.is_ascii_graphic() || *byte == b' ' {
                print!("{}", *byte as char);
            } else {
                print!(".");
            }
        }
        println!("|");
    }
    println!("Hexdump end.");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigint_sets_the_flag() {
        install_sigint_handler();
        unsafe {
            libc::raise(libc::SIGINT);
        }
        assert!(interrupted());
    }
}
