//! Console device (slice 0x10): byte-oriented standard input and output.
//!
//! Writing the stdout/stderr ports emits one byte immediately. Input
//! bytes are delivered by the host: it stores the byte and its type tag
//! in the device page and enters the evaluator at the console vector,
//! one run per byte.

use std::io::{self, Write};

use uxn_cpu::{FaultKind, Uxn};

/// Input vector port pair.
pub const CONSOLE_VECTOR: u8 = 0x10;
/// Last input byte.
pub const CONSOLE_READ: u8 = 0x12;
/// Type tag of the last input byte.
pub const CONSOLE_TYPE: u8 = 0x17;
/// Stdout port.
pub const CONSOLE_WRITE: u8 = 0x18;
/// Stderr port.
pub const CONSOLE_ERROR: u8 = 0x19;

/// Tag stored in the type port alongside each input byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConsoleType {
    /// A byte from standard input.
    Std = 0x1,
    /// A byte within a command-line argument.
    Arg = 0x2,
    /// Separator after an argument with more arguments to follow.
    Eoa = 0x3,
    /// Separator after the last argument.
    End = 0x4,
}

/// Where emitted bytes go.
enum Sink {
    /// The process's own stdout/stderr, flushed per byte.
    Stdio,
    /// In-memory buffers, for tests.
    Capture { out: Vec<u8>, err: Vec<u8> },
}

/// The console device.
pub struct Console {
    sink: Sink,
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Console {
    /// A console wired to the process's stdout and stderr.
    #[must_use]
    pub fn new() -> Self {
        Self { sink: Sink::Stdio }
    }

    /// A console that collects output in memory instead of emitting it.
    #[must_use]
    pub fn capturing() -> Self {
        Self {
            sink: Sink::Capture {
                out: Vec::new(),
                err: Vec::new(),
            },
        }
    }

    /// Bytes captured from the stdout port. Empty unless capturing.
    #[must_use]
    pub fn captured_out(&self) -> &[u8] {
        match &self.sink {
            Sink::Stdio => &[],
            Sink::Capture { out, .. } => out,
        }
    }

    /// Bytes captured from the stderr port. Empty unless capturing.
    #[must_use]
    pub fn captured_err(&self) -> &[u8] {
        match &self.sink {
            Sink::Stdio => &[],
            Sink::Capture { err, .. } => err,
        }
    }

    pub(crate) fn deo(&mut self, uxn: &mut Uxn, port: u8) -> Result<(), FaultKind> {
        match port {
            CONSOLE_WRITE => self.emit(false, uxn.dev[usize::from(port)]),
            CONSOLE_ERROR => self.emit(true, uxn.dev[usize::from(port)]),
            _ => {}
        }
        Ok(())
    }

    fn emit(&mut self, to_err: bool, byte: u8) {
        match &mut self.sink {
            Sink::Stdio => {
                // Emission failures are not the program's problem; a
                // closed pipe just drops the byte.
                if to_err {
                    let mut err = io::stderr().lock();
                    let _ = err.write_all(&[byte]);
                    let _ = err.flush();
                } else {
                    let mut out = io::stdout().lock();
                    let _ = out.write_all(&[byte]);
                    let _ = out.flush();
                }
            }
            Sink::Capture { out, err } => {
                if to_err {
                    err.push(byte);
                } else {
                    out.push(byte);
                }
            }
        }
    }
}
