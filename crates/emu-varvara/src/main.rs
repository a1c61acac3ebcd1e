//! Varvara emulator binary.
//!
//! Headless host loop: boots the ROM, delivers command-line arguments to
//! the console device, then interleaves a ~60 Hz screen-vector timer with
//! a stdin pump feeding the console vector one byte per eval.

use std::io::Read;
use std::path::PathBuf;
use std::process;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use emu_varvara::{ConsoleType, Varvara, VarvaraConfig};

/// Screen vector period, ~60 Hz.
const FRAME_DURATION: Duration = Duration::from_micros(16_666);

// ---------------------------------------------------------------------------
// CLI argument parsing
// ---------------------------------------------------------------------------

struct CliArgs {
    rom_path: Option<PathBuf>,
    rom_args: Vec<String>,
    show_version: bool,
}

fn parse_args() -> CliArgs {
    let mut cli = CliArgs {
        rom_path: None,
        rom_args: Vec::new(),
        show_version: false,
    };

    for arg in std::env::args().skip(1) {
        if cli.rom_path.is_none() && arg == "-v" {
            cli.show_version = true;
            return cli;
        }
        if cli.rom_path.is_none() {
            cli.rom_path = Some(PathBuf::from(arg));
        } else {
            cli.rom_args.push(arg);
        }
    }
    cli
}

// ---------------------------------------------------------------------------
// Host loop
// ---------------------------------------------------------------------------

/// Pump stdin and the frame timer until the program halts or runs out of
/// event sources.
fn run(varvara: &mut Varvara) {
    let (tx, rx) = mpsc::channel::<u8>();
    thread::spawn(move || {
        let mut stdin = std::io::stdin().lock();
        let mut buf = [0u8; 256];
        loop {
            match stdin.read(&mut buf) {
                Ok(0) | Err(_) => return,
                Ok(n) => {
                    for &b in &buf[..n] {
                        if tx.send(b).is_err() {
                            return;
                        }
                    }
                }
            }
        }
    });

    let mut stdin_open = true;
    let mut next_frame = Instant::now() + FRAME_DURATION;
    while varvara.halt() == 0 {
        let console_armed = stdin_open && varvara.console_vector() != 0;
        let screen_armed = varvara.screen_vector() != 0;
        if !console_armed && !screen_armed {
            // Nothing can ever wake the program again.
            return;
        }

        let now = Instant::now();
        if now >= next_frame {
            varvara.run_screen_vector();
            next_frame += FRAME_DURATION;
            continue;
        }

        if console_armed {
            match rx.recv_timeout(next_frame - now) {
                Ok(byte) => {
                    varvara.console_input(byte, ConsoleType::Std);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => stdin_open = false,
            }
        } else {
            thread::sleep(next_frame - now);
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    env_logger::init();
    let cli = parse_args();

    if cli.show_version {
        println!(
            "emu-varvara {} - Varvara emulator, console/system/datetime devices.",
            env!("CARGO_PKG_VERSION")
        );
        return;
    }

    let Some(rom_path) = cli.rom_path else {
        println!("usage: emu-varvara [-v] file.rom [args..]");
        process::exit(1);
    };

    let rom_data = match std::fs::read(&rom_path) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Failed to read ROM file {}: {e}", rom_path.display());
            process::exit(1);
        }
    };

    let config = VarvaraConfig::new(rom_data);
    let mut varvara = match Varvara::new(&config) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Failed to load ROM: {e}");
            process::exit(1);
        }
    };

    if varvara.boot(&cli.rom_args) {
        run(&mut varvara);
    }
    process::exit(i32::from(varvara.exit_code()));
}
