//! Integration tests: whole ROMs running against the Varvara devices.
//!
//! Each test builds a machine with a capturing console, boots a ROM
//! written as raw bytes (disassembly alongside), and inspects the
//! machine afterwards.

use emu_varvara::{ConsoleType, Varvara, VarvaraConfig};
use uxn_cpu::{FaultKind, PAGE_SIZE};

/// Boot a ROM with a capturing console.
fn boot(rom: &[u8], args: &[&str]) -> Varvara {
    let config = VarvaraConfig::new(rom.to_vec());
    let mut varvara = Varvara::capturing(&config).expect("ROM loads");
    let args: Vec<String> = args.iter().map(ToString::to_string).collect();
    assert!(varvara.boot(&args), "boot should not fault");
    varvara
}

/// A ROM whose reset vector arms the console vector at 0x0200 and whose
/// handler there runs `body`.
fn rom_with_console_handler(body: &[u8]) -> Vec<u8> {
    let mut rom = vec![0u8; 0x100 + body.len()];
    rom[..7].copy_from_slice(&[
        0xa0, 0x02, 0x00, // LIT2 0200
        0x80, 0x10, // LIT 10
        0x37, // DEO2  ( console vector )
        0x00, // BRK
    ]);
    rom[0x100..].copy_from_slice(body);
    rom
}

// ---------------------------------------------------------------------------
// Console output
// ---------------------------------------------------------------------------

#[test]
fn hello_writes_to_stdout_and_exits_clean() {
    // LIT 'H' LIT 18 DEO, LIT 'i' LIT 18 DEO, LIT 0a LIT 18 DEO, BRK
    let varvara = boot(
        &[
            0x80, 0x48, 0x80, 0x18, 0x17, // 'H'
            0x80, 0x69, 0x80, 0x18, 0x17, // 'i'
            0x80, 0x0a, 0x80, 0x18, 0x17, // '\n'
            0x00,
        ],
        &[],
    );
    assert_eq!(varvara.devices().console.captured_out(), b"Hi\n");
    assert_eq!(varvara.exit_code(), 0);
}

#[test]
fn stderr_port_is_separate() {
    // LIT '!' LIT 19 DEO, BRK
    let varvara = boot(&[0x80, 0x21, 0x80, 0x19, 0x17, 0x00], &[]);
    assert_eq!(varvara.devices().console.captured_out(), b"");
    assert_eq!(varvara.devices().console.captured_err(), b"!");
}

// ---------------------------------------------------------------------------
// Vector re-entry
// ---------------------------------------------------------------------------

#[test]
fn console_vector_runs_once_per_input_byte() {
    // Handler: LIT 12 DEI, LIT 18 DEO, BRK  ( echo the input byte )
    let rom = rom_with_console_handler(&[0x80, 0x12, 0x16, 0x80, 0x18, 0x17, 0x00]);
    let mut varvara = boot(&rom, &[]);
    assert_eq!(varvara.console_vector(), 0x0200);

    assert!(varvara.console_input(b'A', ConsoleType::Std));
    assert_eq!(varvara.uxn().wst.ptr, 0, "no working-stack leakage");
    assert_eq!(varvara.uxn().rst.ptr, 0, "no return-stack leakage");

    assert!(varvara.console_input(b'B', ConsoleType::Std));
    assert_eq!(varvara.uxn().wst.ptr, 0);
    assert_eq!(varvara.uxn().rst.ptr, 0);

    assert_eq!(varvara.devices().console.captured_out(), b"AB");
}

#[test]
fn input_with_disarmed_vector_is_dropped() {
    let mut varvara = boot(&[0x00], &[]);
    assert_eq!(varvara.console_vector(), 0);
    assert!(!varvara.console_input(b'A', ConsoleType::Std));
    assert!(varvara.uxn().last_fault().is_none(), "refusal is not a fault");
}

// ---------------------------------------------------------------------------
// Argument delivery
// ---------------------------------------------------------------------------

#[test]
fn boot_reports_pending_argument_count() {
    // LIT 17 DEI, LIT 80 STZ, BRK  ( stash the type port in zero page )
    let varvara = boot(&[0x80, 0x17, 0x16, 0x80, 0x80, 0x11, 0x00], &["a", "b"]);
    assert_eq!(varvara.uxn().ram()[0x80], 2);
}

#[test]
fn arguments_arrive_tagged_and_newline_separated() {
    // Handler: type byte to stderr, data byte to stdout
    let rom = rom_with_console_handler(&[
        0x80, 0x17, 0x16, // LIT 17 DEI
        0x80, 0x19, 0x17, // LIT 19 DEO
        0x80, 0x12, 0x16, // LIT 12 DEI
        0x80, 0x18, 0x17, // LIT 18 DEO
        0x00,
    ]);
    let varvara = boot(&rom, &["ab", "c"]);
    assert_eq!(varvara.devices().console.captured_out(), b"ab\nc\n");
    assert_eq!(
        varvara.devices().console.captured_err(),
        &[0x02, 0x02, 0x03, 0x02, 0x04],
        "arg, arg, eoa, arg, end"
    );
}

// ---------------------------------------------------------------------------
// System device
// ---------------------------------------------------------------------------

#[test]
fn stack_pointer_mirror_reads_live_depth() {
    // LIT aa LIT bb LIT 04 DEI: the mirror sees depth 2 after the port
    // byte is consumed
    let varvara = boot(&[0x80, 0xaa, 0x80, 0xbb, 0x80, 0x04, 0x16, 0x00], &[]);
    assert_eq!(&varvara.uxn().wst.dat[..3], &[0xaa, 0xbb, 0x02]);
}

#[test]
fn expansion_fill_reaches_an_upper_page() {
    // LIT2 0120 LIT 02 DEO2 points the expansion pair at the record
    // embedded at 0x0120, then BRK.
    let mut rom = vec![0u8; 0x28];
    rom[..7].copy_from_slice(&[0xa0, 0x01, 0x20, 0x80, 0x02, 0x37, 0x00]);
    // fill: length 0004, page 0001, addr 0040, value cc
    rom[0x20..0x28].copy_from_slice(&[0x00, 0x00, 0x04, 0x00, 0x01, 0x00, 0x40, 0xcc]);
    let varvara = boot(&rom, &[]);
    assert_eq!(
        &varvara.uxn().ram()[PAGE_SIZE + 0x40..PAGE_SIZE + 0x44],
        &[0xcc; 4]
    );
}

#[test]
fn malformed_expansion_faults_the_eval() {
    let mut rom = vec![0u8; 0x28];
    rom[..7].copy_from_slice(&[0xa0, 0x01, 0x20, 0x80, 0x02, 0x37, 0x00]);
    rom[0x20] = 0x09; // no such opcode
    let config = VarvaraConfig::new(rom);
    let mut varvara = Varvara::capturing(&config).expect("ROM loads");
    assert!(!varvara.boot(&[]), "boot reports the fault");
    let fault = varvara.uxn().last_fault().expect("fault recorded");
    assert_eq!(fault.kind, FaultKind::Expansion);
    assert_eq!(fault.instr, 0x37, "the DEO2 that issued the command");
}

#[test]
fn palette_pokes_decode_to_rgb() {
    // LIT2 2ce9 LIT 08 DEO2, LIT2 01c0 LIT 0a DEO2, LIT2 2ce5 LIT 0c DEO2
    let varvara = boot(
        &[
            0xa0, 0x2c, 0xe9, 0x80, 0x08, 0x37, // red
            0xa0, 0x01, 0xc0, 0x80, 0x0a, 0x37, // green
            0xa0, 0x2c, 0xe5, 0x80, 0x0c, 0x37, // blue
            0x00,
        ],
        &[],
    );
    assert_eq!(
        varvara.palette(),
        [0x0022_0022, 0x00cc_11cc, 0x00ee_ccee, 0x0099_0055]
    );
}

#[test]
fn halt_write_stops_the_machine() {
    // LIT 05 LIT 0f DEO halts with code 5; the trailing write never runs
    let mut varvara = boot(
        &[
            0x80, 0x05, 0x80, 0x0f, 0x17, // halt
            0x80, 0x21, 0x80, 0x18, 0x17, // LIT '!' LIT 18 DEO
            0x00,
        ],
        &[],
    );
    assert_eq!(varvara.halt(), 0x05);
    assert_eq!(varvara.exit_code(), 5);
    assert_eq!(varvara.devices().console.captured_out(), b"");
    // Once halted, evaluator entries are refused.
    assert!(!varvara.console_input(b'x', ConsoleType::Std));
}

// ---------------------------------------------------------------------------
// Unimplemented devices and reset
// ---------------------------------------------------------------------------

#[test]
fn unimplemented_device_ports_are_plain_memory() {
    // LIT 7f LIT 22 DEO, LIT 22 DEI: the screen width port stores and
    // reads back like RAM
    let varvara = boot(&[0x80, 0x7f, 0x80, 0x22, 0x17, 0x80, 0x22, 0x16, 0x00], &[]);
    assert_eq!(&varvara.uxn().wst.dat[..1], &[0x7f]);
    assert_eq!(varvara.uxn().dev[0x22], 0x7f);
}

#[test]
fn datetime_reads_through_a_program() {
    // LIT c2 DEI leaves the month on the stack
    let varvara = boot(&[0x80, 0xc2, 0x16, 0x00], &[]);
    assert!(varvara.uxn().wst.dat[0] <= 11);
}

#[test]
fn soft_reset_keeps_upper_pages() {
    let mut rom = vec![0u8; 0x28];
    rom[..7].copy_from_slice(&[0xa0, 0x01, 0x20, 0x80, 0x02, 0x37, 0x00]);
    rom[0x20..0x28].copy_from_slice(&[0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0xcc]);
    let mut varvara = boot(&rom, &[]);
    assert_eq!(varvara.uxn().ram()[PAGE_SIZE], 0xcc);

    varvara.reset(true).expect("reset reloads the ROM");
    assert_eq!(varvara.uxn().ram()[PAGE_SIZE], 0xcc, "soft reset keeps it");
    assert_eq!(varvara.uxn().ram()[0x100], 0xa0, "ROM reloaded");
    assert_eq!(varvara.halt(), 0, "device page cleared");

    varvara.reset(false).expect("reset reloads the ROM");
    assert_eq!(varvara.uxn().ram()[PAGE_SIZE], 0x00, "hard reset clears it");
}
