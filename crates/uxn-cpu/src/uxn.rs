//! Machine state and the instruction executor.

use crate::device::Device;
use crate::fault::{Fault, FaultKind};
use crate::op::Instr;
use crate::stack::Stack;

/// Load address of the executable page and the reset vector.
pub const PAGE_PROGRAM: u16 = 0x0100;

/// Size of one RAM page. Only the first page is directly addressable;
/// pages above it are reached through the memory-expansion command.
pub const PAGE_SIZE: usize = 0x10000;

/// Device port holding the halt flag and exit code.
///
/// Any non-zero value inhibits further evaluator entries; the low seven
/// bits are the exit code, the high bit marks an external termination
/// request.
pub const HALT_PORT: u8 = 0x0f;

/// Why the executor left its loop.
enum Flow {
    Continue,
    Break,
}

/// Mode bits applied to one instruction.
#[derive(Clone, Copy)]
struct Mode {
    short: bool,
    ret: bool,
    keep: bool,
}

/// The Uxn machine: RAM, the two stacks and the device page.
pub struct Uxn {
    /// One or more 64 KiB pages. The first page holds the program.
    ram: Vec<u8>,
    /// Working stack.
    pub wst: Stack,
    /// Return stack.
    pub rst: Stack,
    /// 256 device-port bytes shared with the host.
    pub dev: [u8; 256],
    /// Per-device bitmask of live input ports.
    dei_mask: [u16; 16],
    /// Per-device bitmask of live output ports.
    deo_mask: [u16; 16],
    /// Fault recorded by the most recent failed eval.
    fault: Option<Fault>,
}

impl Uxn {
    /// Create a zeroed machine with `pages` 64 KiB RAM pages.
    ///
    /// The masks flag which ports route to the [`Device`] handler; ports
    /// without a bit behave as plain memory. Masks are fixed for the
    /// lifetime of the machine.
    #[must_use]
    pub fn new(pages: usize, dei_mask: [u16; 16], deo_mask: [u16; 16]) -> Self {
        Self {
            ram: vec![0; pages.max(1) * PAGE_SIZE],
            wst: Stack::default(),
            rst: Stack::default(),
            dev: [0; 256],
            dei_mask,
            deo_mask,
            fault: None,
        }
    }

    /// Copy a flat ROM image to the reset vector.
    pub fn load_rom(&mut self, rom: &[u8]) -> Result<(), String> {
        let base = usize::from(PAGE_PROGRAM);
        if rom.len() > PAGE_SIZE - base {
            return Err(format!(
                "ROM is {} bytes; at most {} fit above the reset vector",
                rom.len(),
                PAGE_SIZE - base
            ));
        }
        self.ram[base..base + rom.len()].copy_from_slice(rom);
        Ok(())
    }

    /// Zero stacks, device page, and RAM.
    ///
    /// A soft reset preserves the pages above the first; a hard reset
    /// clears everything. Neither reloads the ROM - that is the host's
    /// job, since it owns the image.
    pub fn reset(&mut self, soft: bool) {
        if soft {
            self.ram[..PAGE_SIZE].fill(0);
        } else {
            self.ram.fill(0);
        }
        self.wst = Stack::default();
        self.rst = Stack::default();
        self.dev = [0; 256];
        self.fault = None;
    }

    /// Number of 64 KiB pages.
    #[must_use]
    pub fn pages(&self) -> usize {
        self.ram.len() / PAGE_SIZE
    }

    /// All RAM, including pages above the first.
    #[must_use]
    pub fn ram(&self) -> &[u8] {
        &self.ram
    }

    /// Mutable view of all RAM.
    pub fn ram_mut(&mut self) -> &mut [u8] {
        &mut self.ram
    }

    /// Current halt flag (the byte at [`HALT_PORT`]).
    #[must_use]
    pub fn halt(&self) -> u8 {
        self.dev[usize::from(HALT_PORT)]
    }

    /// Read a big-endian vector from a device port pair.
    #[must_use]
    pub fn dev_vector(&self, port: u8) -> u16 {
        u16::from(self.dev[usize::from(port)]) << 8
            | u16::from(self.dev[usize::from(port.wrapping_add(1))])
    }

    /// The fault that aborted the most recent eval, if any.
    #[must_use]
    pub fn last_fault(&self) -> Option<Fault> {
        self.fault
    }

    /// Big-endian 16-bit read from the executable page.
    #[must_use]
    pub fn peek16(&self, addr: u16) -> u16 {
        u16::from(self.ram[usize::from(addr)]) << 8
            | u16::from(self.ram[usize::from(addr.wrapping_add(1))])
    }

    /// Run the evaluator at `pc` until `BRK`, a halt flag, or a fault.
    ///
    /// Entry is refused (returning `false`, with no work done) when `pc`
    /// is zero or the halt flag is already set. A clean stop returns
    /// `true`. A fault records kind, opcode and PC - readable through
    /// [`Uxn::last_fault`] - and returns `false`, leaving the stacks as
    /// the fault found them.
    ///
    /// The evaluator is not re-entrant; the host must let each entry run
    /// to completion before starting the next.
    pub fn eval<D: Device>(&mut self, dev: &mut D, mut pc: u16) -> bool {
        self.fault = None;
        if pc == 0 || self.halt() != 0 {
            return false;
        }
        loop {
            // A device handler may set the halt flag mid-entry; honour it
            // at the next instruction boundary.
            if self.halt() != 0 {
                return true;
            }
            let at = pc;
            let byte = self.ram[usize::from(pc)];
            pc = pc.wrapping_add(1);
            match self.step(dev, byte, &mut pc) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Break) => return true,
                Err(kind) => {
                    self.fault = Some(Fault {
                        kind,
                        instr: byte,
                        pc: at,
                    });
                    return false;
                }
            }
        }
    }

    /// Execute one decoded instruction. `pc` has already advanced past
    /// the instruction byte.
    fn step<D: Device>(&mut self, dev: &mut D, byte: u8, pc: &mut u16) -> Result<Flow, FaultKind> {
        let i = Instr::decode(byte);
        if i.is_immediate() {
            return self.immediate(i, pc);
        }
        let m = Mode {
            short: i.short,
            ret: i.ret,
            keep: i.keep,
        };
        // Shadow of the active stack pointer: operand pops move it, and
        // commit it back only when keep mode is clear.
        let mut head = if m.ret { self.rst.ptr } else { self.wst.ptr };
        let h = &mut head;
        match i.op {
            // INC
            0x01 => {
                let a = self.pop(h, m)?;
                self.push(m, a.wrapping_add(1))?;
            }
            // POP
            0x02 => {
                self.pop(h, m)?;
            }
            // NIP: b a -- a
            0x03 => {
                let a = self.pop(h, m)?;
                self.pop(h, m)?;
                self.push(m, a)?;
            }
            // SWP: b a -- a b
            0x04 => {
                let a = self.pop(h, m)?;
                let b = self.pop(h, m)?;
                self.push(m, a)?;
                self.push(m, b)?;
            }
            // ROT: c b a -- b a c
            0x05 => {
                let a = self.pop(h, m)?;
                let b = self.pop(h, m)?;
                let c = self.pop(h, m)?;
                self.push(m, b)?;
                self.push(m, a)?;
                self.push(m, c)?;
            }
            // DUP
            0x06 => {
                let a = self.pop(h, m)?;
                self.push(m, a)?;
                self.push(m, a)?;
            }
            // OVR: b a -- b a b
            0x07 => {
                let a = self.pop(h, m)?;
                let b = self.pop(h, m)?;
                self.push(m, b)?;
                self.push(m, a)?;
                self.push(m, b)?;
            }
            // EQU NEQ GTH LTH: the flag is one byte in every mode
            0x08..=0x0b => {
                let a = self.pop(h, m)?;
                let b = self.pop(h, m)?;
                let t = match i.op {
                    0x08 => b == a,
                    0x09 => b != a,
                    0x0a => b > a,
                    _ => b < a,
                };
                self.push_flag(m, u8::from(t))?;
            }
            // JMP
            0x0c => {
                let a = self.pop(h, m)?;
                jump(pc, a, m.short);
            }
            // JCN: the condition below the target is always one byte
            0x0d => {
                let a = self.pop(h, m)?;
                let b = self.pop8(h, m)?;
                if b != 0 {
                    jump(pc, a, m.short);
                }
            }
            // JSR: return address goes to the opposite stack
            0x0e => {
                let a = self.pop(h, m)?;
                self.push16_other(m, *pc)?;
                jump(pc, a, m.short);
            }
            // STH
            0x0f => {
                let a = self.pop(h, m)?;
                self.push_other(m, a)?;
            }
            // LDZ
            0x10 => {
                let a = self.pop8(h, m)?;
                let v = self.peek(u16::from(a), m.short);
                self.push(m, v)?;
            }
            // STZ
            0x11 => {
                let a = self.pop8(h, m)?;
                let v = self.pop(h, m)?;
                self.poke(u16::from(a), v, m.short);
            }
            // LDR
            0x12 => {
                let a = self.pop8(h, m)?;
                let v = self.peek(relative(*pc, a), m.short);
                self.push(m, v)?;
            }
            // STR
            0x13 => {
                let a = self.pop8(h, m)?;
                let v = self.pop(h, m)?;
                self.poke(relative(*pc, a), v, m.short);
            }
            // LDA: the address is a short in every mode
            0x14 => {
                let a = self.pop16(h, m)?;
                let v = self.peek(a, m.short);
                self.push(m, v)?;
            }
            // STA
            0x15 => {
                let a = self.pop16(h, m)?;
                let v = self.pop(h, m)?;
                self.poke(a, v, m.short);
            }
            // DEI: short mode reads the port pair, high byte first
            0x16 => {
                let port = self.pop8(h, m)?;
                if m.short {
                    let hi = self.dei_byte(dev, port);
                    let lo = self.dei_byte(dev, port.wrapping_add(1));
                    self.push(m, u16::from(hi) << 8 | u16::from(lo))?;
                } else {
                    let v = self.dei_byte(dev, port);
                    self.push(m, u16::from(v))?;
                }
            }
            // DEO
            0x17 => {
                let port = self.pop8(h, m)?;
                let v = self.pop(h, m)?;
                if m.short {
                    self.deo_byte(dev, port, (v >> 8) as u8)?;
                    self.deo_byte(dev, port.wrapping_add(1), v as u8)?;
                } else {
                    self.deo_byte(dev, port, v as u8)?;
                }
            }
            // ADD SUB MUL DIV AND ORA EOR
            0x18..=0x1e => {
                let a = self.pop(h, m)?;
                let b = self.pop(h, m)?;
                let v = match i.op {
                    0x18 => b.wrapping_add(a),
                    0x19 => b.wrapping_sub(a),
                    0x1a => u32::from(b).wrapping_mul(u32::from(a)) as u16,
                    // Division by zero yields zero, not a fault.
                    0x1b => {
                        if a == 0 {
                            0
                        } else {
                            b / a
                        }
                    }
                    0x1c => b & a,
                    0x1d => b | a,
                    _ => b ^ a,
                };
                self.push(m, v)?;
            }
            // SFT: the shift amount is always one byte; right by the low
            // nibble, then left by the high nibble
            0x1f => {
                let a = self.pop8(h, m)?;
                let b = self.pop(h, m)?;
                let v = (u32::from(b) >> (a & 0x0f)) << (a >> 4);
                self.push(m, v as u16)?;
            }
            _ => unreachable!("op field is five bits"),
        }
        Ok(Flow::Continue)
    }

    /// The eight immediates: fixed behavior, addressed by the top three
    /// bits of the instruction byte.
    fn immediate(&mut self, i: Instr, pc: &mut u16) -> Result<Flow, FaultKind> {
        match i.byte & 0xe0 {
            // BRK
            0x00 => return Ok(Flow::Break),
            // JCI: the condition comes from the working stack
            0x20 => {
                let cond = self.wst.pop8()?;
                let offset = self.peek16(*pc);
                *pc = pc.wrapping_add(2);
                if cond != 0 {
                    *pc = pc.wrapping_add(offset);
                }
            }
            // JMI
            0x40 => {
                let offset = self.peek16(*pc);
                *pc = pc.wrapping_add(2).wrapping_add(offset);
            }
            // JSI: the return address is the byte after the offset
            0x60 => {
                self.rst.push16(pc.wrapping_add(2))?;
                let offset = self.peek16(*pc);
                *pc = pc.wrapping_add(2).wrapping_add(offset);
            }
            // LIT LIT2 LITr LIT2r
            _ => {
                if i.short {
                    let v = self.peek16(*pc);
                    *pc = pc.wrapping_add(2);
                    self.stack_mut(i.ret).push16(v)?;
                } else {
                    let v = self.ram[usize::from(*pc)];
                    *pc = pc.wrapping_add(1);
                    self.stack_mut(i.ret).push8(v)?;
                }
            }
        }
        Ok(Flow::Continue)
    }

    fn stack_mut(&mut self, ret: bool) -> &mut Stack {
        if ret { &mut self.rst } else { &mut self.wst }
    }

    /// Pop an operand of the mode's width through the shadow pointer.
    fn pop(&mut self, head: &mut u8, m: Mode) -> Result<u16, FaultKind> {
        let s = self.stack_mut(m.ret);
        let v = if m.short {
            s.read16(head)?
        } else {
            u16::from(s.read8(head)?)
        };
        if !m.keep {
            s.ptr = *head;
        }
        Ok(v)
    }

    /// Pop one byte regardless of the short flag.
    fn pop8(&mut self, head: &mut u8, m: Mode) -> Result<u8, FaultKind> {
        let s = self.stack_mut(m.ret);
        let v = s.read8(head)?;
        if !m.keep {
            s.ptr = *head;
        }
        Ok(v)
    }

    /// Pop a short regardless of the short flag.
    fn pop16(&mut self, head: &mut u8, m: Mode) -> Result<u16, FaultKind> {
        let s = self.stack_mut(m.ret);
        let v = s.read16(head)?;
        if !m.keep {
            s.ptr = *head;
        }
        Ok(v)
    }

    /// Push a result of the mode's width. Pushes go through the real
    /// pointer, so in keep mode results land above the operands.
    fn push(&mut self, m: Mode, v: u16) -> Result<(), FaultKind> {
        let s = self.stack_mut(m.ret);
        if m.short { s.push16(v) } else { s.push8(v as u8) }
    }

    /// Push a one-byte result regardless of the short flag.
    fn push_flag(&mut self, m: Mode, v: u8) -> Result<(), FaultKind> {
        self.stack_mut(m.ret).push8(v)
    }

    /// Push a result of the mode's width onto the opposite stack.
    fn push_other(&mut self, m: Mode, v: u16) -> Result<(), FaultKind> {
        let s = self.stack_mut(!m.ret);
        if m.short { s.push16(v) } else { s.push8(v as u8) }
    }

    /// Push a short onto the opposite stack.
    fn push16_other(&mut self, m: Mode, v: u16) -> Result<(), FaultKind> {
        self.stack_mut(!m.ret).push16(v)
    }

    /// Mode-width read from the executable page. Short reads take the
    /// high byte from the lower address; address arithmetic wraps at 16
    /// bits.
    fn peek(&self, addr: u16, short: bool) -> u16 {
        if short {
            self.peek16(addr)
        } else {
            u16::from(self.ram[usize::from(addr)])
        }
    }

    /// Mode-width write to the executable page.
    fn poke(&mut self, addr: u16, v: u16, short: bool) {
        if short {
            self.ram[usize::from(addr)] = (v >> 8) as u8;
            self.ram[usize::from(addr.wrapping_add(1))] = v as u8;
        } else {
            self.ram[usize::from(addr)] = v as u8;
        }
    }

    fn live(mask: &[u16; 16], port: u8) -> bool {
        mask[usize::from(port >> 4)] >> (port & 0x0f) & 1 != 0
    }

    /// Device read: live ports ask the handler for a fresh byte, dead
    /// ports read the device page.
    fn dei_byte<D: Device>(&mut self, dev: &mut D, port: u8) -> u8 {
        if Self::live(&self.dei_mask, port) {
            dev.dei(self, port)
        } else {
            self.dev[usize::from(port)]
        }
    }

    /// Device write: the byte always lands in the device page; live
    /// ports notify the handler afterwards.
    fn deo_byte<D: Device>(&mut self, dev: &mut D, port: u8, v: u8) -> Result<(), FaultKind> {
        self.dev[usize::from(port)] = v;
        if Self::live(&self.deo_mask, port) {
            dev.deo(self, port)?;
        }
        Ok(())
    }
}

/// Jump helper: short targets are absolute, byte targets are signed
/// PC-relative.
fn jump(pc: &mut u16, target: u16, short: bool) {
    if short {
        *pc = target;
    } else {
        *pc = relative(*pc, target as u8);
    }
}

/// PC plus a signed one-byte offset, wrapping at 16 bits.
fn relative(pc: u16, offset: u8) -> u16 {
    pc.wrapping_add_signed(i16::from(offset as i8))
}
