//
// Resolve the physical address behind each page of a process's virtual
// address range, by reading /proc/<pid>/pagemap.
//
// Requires CAP_SYS_ADMIN privilege, or root, otherwise physical addresses
// will read as zero.
//

use std::env;
use std::process::ExitCode;

use virt2phys::{PageMap, TranslationOutcome};

fn usage(prog: &str) {
    eprintln!(
        "usage: \n\
         {} pid address size\n\
         \n\
         \x20   Resolves and converts to physical addresses the\n\
         \x20   virtual addresses of a process's user space.\n\
         \n\
         \x20   pid    : PID of the process that owns the addresses.\n\
         \x20   address: First virtual address to be resolved.\n\
         \x20   size   : Size of the range to be resolved, in bytes.\n\
         \n\
         \x20   address and size accept decimal or 0x-prefixed hex.",
        prog
    );
}

/// Accepts decimal or `0x`-prefixed hexadecimal.
fn parse_number(s: &str) -> Option<u64> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    if args.len() < 4 {
        usage(&args[0]);
        return ExitCode::FAILURE;
    }

    let parsed = (
        parse_number(&args[1]),
        parse_number(&args[2]),
        parse_number(&args[3]),
    );
    let (pid, virt_addr, size) = match parsed {
        (Some(pid), Some(virt_addr), Some(size)) if pid <= i32::MAX as u64 => {
            (pid as i32, virt_addr, size)
        }
        _ => {
            usage(&args[0]);
            return ExitCode::FAILURE;
        }
    };

    if !rustix::process::geteuid().is_root() {
        eprintln!("WARNING: Access to /proc/<PID>/pagemap requires root, physical addresses will read as zero");
    }

    let mut pagemap = match PageMap::open(pid) {
        Ok(pagemap) => pagemap,
        Err(e) => {
            eprintln!("{}: {}", args[0], e);
            return ExitCode::FAILURE;
        }
    };

    let page_size = virt2phys::page_size();

    println!("pid:{:6}:", pid);
    for (virt_addr, outcome) in pagemap.translate_range(page_size, virt_addr, size) {
        match outcome {
            TranslationOutcome::Resolved(phys_addr) => {
                println!(" virt:0x{:08x}, phys:0x{:08x}", virt_addr, phys_addr)
            }
            TranslationOutcome::NotPresent => {
                println!(" virt:0x{:08x}, phys:(not present)", virt_addr)
            }
            TranslationOutcome::Failed(e) => {
                eprintln!("{}", e);
                println!(" virt:0x{:08x}, (not valid virtual address)", virt_addr);
            }
        }
    }

    ExitCode::SUCCESS
}
