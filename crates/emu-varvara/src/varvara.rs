//! Top-level Varvara machine.
//!
//! Owns the Uxn core and the device handlers, and is the only place that
//! enters the evaluator: once at boot for the reset vector, and then once
//! per external event (console byte, screen tick). Entries are strictly
//! serialized - device handlers never re-enter the evaluator themselves.

use uxn_cpu::{Device, FaultKind, PAGE_PROGRAM, Uxn};

use crate::config::VarvaraConfig;
use crate::console::{CONSOLE_READ, CONSOLE_TYPE, CONSOLE_VECTOR, Console, ConsoleType};
use crate::datetime::Datetime;
use crate::system::System;

/// Screen vector port pair. The screen itself is not emulated; its
/// vector still fires on the host's frame timer and its other ports
/// behave as plain memory.
pub const SCREEN_VECTOR: u8 = 0x20;

/// Live input ports: system stack-pointer mirrors (0x04-0x05) and the
/// whole datetime device.
const DEI_MASK: [u16; 16] = [
    0x0030, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x07ff, 0, 0, 0,
];

/// Live output ports: system expansion/mirrors/palette/debug
/// (0x03-0x05, 0x08-0x0e) and the console stdout/stderr pair
/// (0x18-0x19).
const DEO_MASK: [u16; 16] = [
    0x7f38, 0x0300, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];

/// The device handlers, dispatched by the high nibble of the port.
pub struct Devices {
    pub system: System,
    pub console: Console,
    pub datetime: Datetime,
}

impl Devices {
    fn new(console: Console) -> Self {
        Self {
            system: System::new(),
            console,
            datetime: Datetime,
        }
    }
}

impl Device for Devices {
    fn dei(&mut self, uxn: &mut Uxn, port: u8) -> u8 {
        match port & 0xf0 {
            0x00 => self.system.dei(uxn, port),
            0xc0 => self.datetime.dei(uxn, port),
            _ => uxn.dev[usize::from(port)],
        }
    }

    fn deo(&mut self, uxn: &mut Uxn, port: u8) -> Result<(), FaultKind> {
        match port & 0xf0 {
            0x00 => self.system.deo(uxn, port),
            0x10 => self.console.deo(uxn, port),
            _ => Ok(()),
        }
    }
}

/// The Varvara computer: Uxn core plus system, console and datetime
/// devices.
pub struct Varvara {
    uxn: Uxn,
    dev: Devices,
    /// Retained ROM image, reloaded on reset.
    rom: Vec<u8>,
}

impl Varvara {
    /// Build a machine and load the ROM at the reset vector.
    pub fn new(config: &VarvaraConfig) -> Result<Self, String> {
        Self::with_console(config, Console::new())
    }

    /// Build a machine whose console collects output in memory.
    pub fn capturing(config: &VarvaraConfig) -> Result<Self, String> {
        Self::with_console(config, Console::capturing())
    }

    fn with_console(config: &VarvaraConfig, console: Console) -> Result<Self, String> {
        let mut uxn = Uxn::new(config.pages, DEI_MASK, DEO_MASK);
        uxn.load_rom(&config.rom_data)?;
        Ok(Self {
            uxn,
            dev: Devices::new(console),
            rom: config.rom_data.clone(),
        })
    }

    /// Run the reset vector, then deliver the command-line arguments to
    /// the console vector byte by byte.
    ///
    /// The console type port carries the number of pending arguments
    /// while the reset vector runs. Each argument's bytes are tagged
    /// `Arg`, followed by a newline tagged `Eoa` between arguments and
    /// `End` after the last.
    ///
    /// Returns `false` if the reset vector faulted.
    pub fn boot(&mut self, args: &[String]) -> bool {
        self.uxn.dev[usize::from(CONSOLE_TYPE)] = args.len() as u8;
        if !self.uxn.eval(&mut self.dev, PAGE_PROGRAM) {
            self.report_eval();
            return false;
        }
        for (i, arg) in args.iter().enumerate() {
            for &b in arg.as_bytes() {
                self.console_input(b, ConsoleType::Arg);
            }
            let tag = if i + 1 == args.len() {
                ConsoleType::End
            } else {
                ConsoleType::Eoa
            };
            self.console_input(b'\n', tag);
        }
        true
    }

    /// Deliver one input byte: store it and its tag in the device page,
    /// then run the console vector.
    pub fn console_input(&mut self, byte: u8, tag: ConsoleType) -> bool {
        self.uxn.dev[usize::from(CONSOLE_READ)] = byte;
        self.uxn.dev[usize::from(CONSOLE_TYPE)] = tag as u8;
        let vector = self.uxn.dev_vector(CONSOLE_VECTOR);
        let ok = self.uxn.eval(&mut self.dev, vector);
        if !ok {
            self.report_eval();
        }
        ok
    }

    /// Run the screen vector; called by the host on its frame timer.
    pub fn run_screen_vector(&mut self) -> bool {
        let vector = self.uxn.dev_vector(SCREEN_VECTOR);
        let ok = self.uxn.eval(&mut self.dev, vector);
        if !ok {
            self.report_eval();
        }
        ok
    }

    /// Current console vector address; zero means disarmed.
    #[must_use]
    pub fn console_vector(&self) -> u16 {
        self.uxn.dev_vector(CONSOLE_VECTOR)
    }

    /// Current screen vector address; zero means disarmed.
    #[must_use]
    pub fn screen_vector(&self) -> u16 {
        self.uxn.dev_vector(SCREEN_VECTOR)
    }

    /// Halt flag; non-zero stops the host loop.
    #[must_use]
    pub fn halt(&self) -> u8 {
        self.uxn.halt()
    }

    /// Process exit code: the low seven bits of the halt port.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        self.uxn.halt() & 0x7f
    }

    /// Zero the machine and reload the ROM. A soft reset keeps the RAM
    /// pages above the first; a hard reset clears them too.
    pub fn reset(&mut self, soft: bool) -> Result<(), String> {
        self.uxn.reset(soft);
        self.dev.system = System::new();
        self.uxn.load_rom(&self.rom)
    }

    /// The four palette colors most recently poked by the program.
    #[must_use]
    pub fn palette(&self) -> [u32; 4] {
        self.dev.system.palette()
    }

    /// Reference to the Uxn core.
    #[must_use]
    pub fn uxn(&self) -> &Uxn {
        &self.uxn
    }

    /// Mutable reference to the Uxn core.
    pub fn uxn_mut(&mut self) -> &mut Uxn {
        &mut self.uxn
    }

    /// Reference to the device handlers.
    #[must_use]
    pub fn devices(&self) -> &Devices {
        &self.dev
    }

    /// Mutable reference to the device handlers.
    pub fn devices_mut(&mut self) -> &mut Devices {
        &mut self.dev
    }

    /// Log the fault behind a failed eval, with both stacks for
    /// post-mortem reading.
    fn report_eval(&self) {
        if let Some(fault) = self.uxn.last_fault() {
            log::error!("{fault}");
            log::error!("<wst> {}", self.uxn.wst);
            log::error!("<rst> {}", self.uxn.rst);
        }
    }
}
