//! System device (slice 0x00): halt, expansion, palette, introspection.

use uxn_cpu::{FaultKind, PAGE_SIZE, Uxn};

/// Expansion command pointer pair; the command runs when the low byte
/// lands.
pub const SYSTEM_EXPANSION: u8 = 0x02;
/// Working-stack pointer mirror.
pub const SYSTEM_WST: u8 = 0x04;
/// Return-stack pointer mirror.
pub const SYSTEM_RST: u8 = 0x05;
/// Start of the six palette bytes (three big-endian channel shorts).
pub const SYSTEM_RED: u8 = 0x08;
const SYSTEM_GREEN: u8 = 0x0a;
const SYSTEM_BLUE: u8 = 0x0c;
/// Debug port: any non-zero write dumps both stacks to stderr.
pub const SYSTEM_DEBUG: u8 = 0x0e;

/// Expansion opcodes.
const EXPANSION_FILL: u8 = 0x00;
const EXPANSION_CPYL: u8 = 0x01;
const EXPANSION_CPYR: u8 = 0x02;

/// The system device.
///
/// Holds the decoded palette; everything else it touches lives in the
/// machine (stacks, RAM pages, device page).
#[derive(Default)]
pub struct System {
    palette: [u32; 4],
}

impl System {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The four palette colors as 0x00RRGGBB, most recently poked first
    /// color first.
    #[must_use]
    pub fn palette(&self) -> [u32; 4] {
        self.palette
    }

    pub(crate) fn dei(&mut self, uxn: &mut Uxn, port: u8) -> u8 {
        match port {
            SYSTEM_WST => uxn.wst.ptr,
            SYSTEM_RST => uxn.rst.ptr,
            _ => uxn.dev[usize::from(port)],
        }
    }

    pub(crate) fn deo(&mut self, uxn: &mut Uxn, port: u8) -> Result<(), FaultKind> {
        match port {
            // Low byte of the expansion pointer completes the command.
            0x03 => self.expansion(uxn)?,
            SYSTEM_WST => uxn.wst.ptr = uxn.dev[usize::from(SYSTEM_WST)],
            SYSTEM_RST => uxn.rst.ptr = uxn.dev[usize::from(SYSTEM_RST)],
            SYSTEM_RED..=0x0d => self.refresh_palette(uxn),
            SYSTEM_DEBUG => {
                if uxn.dev[usize::from(SYSTEM_DEBUG)] != 0 {
                    log::debug!("<wst> {}", uxn.wst);
                    log::debug!("<rst> {}", uxn.rst);
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Run the memory-expansion command whose record sits at the address
    /// in the expansion pointer pair.
    ///
    /// `fill` sets a run of bytes in one page; `cpyl`/`cpyr` copy a run
    /// between pages, walking forward or backward so overlapping ranges
    /// behave. Page indices wrap modulo the page count, in-page offsets
    /// wrap at 64 KiB. An unknown opcode is an expansion fault.
    fn expansion(&mut self, uxn: &mut Uxn) -> Result<(), FaultKind> {
        let addr = uxn.dev_vector(SYSTEM_EXPANSION);
        let op = uxn.ram()[usize::from(addr)];
        let pages = uxn.pages();
        let length = uxn.peek16(addr.wrapping_add(1));
        match op {
            EXPANSION_FILL => {
                let page = usize::from(uxn.peek16(addr.wrapping_add(3))) % pages;
                let dst = uxn.peek16(addr.wrapping_add(5));
                let value = uxn.ram()[usize::from(addr.wrapping_add(7))];
                let ram = uxn.ram_mut();
                for i in 0..length {
                    ram[page * PAGE_SIZE + usize::from(dst.wrapping_add(i))] = value;
                }
            }
            EXPANSION_CPYL | EXPANSION_CPYR => {
                let src_page = usize::from(uxn.peek16(addr.wrapping_add(3))) % pages;
                let src = uxn.peek16(addr.wrapping_add(5));
                let dst_page = usize::from(uxn.peek16(addr.wrapping_add(7))) % pages;
                let dst = uxn.peek16(addr.wrapping_add(9));
                let ram = uxn.ram_mut();
                for i in 0..length {
                    let i = if op == EXPANSION_CPYR { length - 1 - i } else { i };
                    ram[dst_page * PAGE_SIZE + usize::from(dst.wrapping_add(i))] =
                        ram[src_page * PAGE_SIZE + usize::from(src.wrapping_add(i))];
                }
            }
            _ => {
                log::error!("malformed expansion command {op:#04x} at {addr:#06x}");
                return Err(FaultKind::Expansion);
            }
        }
        Ok(())
    }

    /// Rebuild the four colors from the three channel shorts. Channels
    /// are 4 bits per color; nibbles are doubled up to 8-bit intensity.
    fn refresh_palette(&mut self, uxn: &Uxn) {
        let r = uxn.dev_vector(SYSTEM_RED);
        let g = uxn.dev_vector(SYSTEM_GREEN);
        let b = uxn.dev_vector(SYSTEM_BLUE);
        for (i, color) in self.palette.iter_mut().enumerate() {
            let shift = 12 - 4 * i;
            let r = u32::from(r >> shift & 0xf) * 0x11;
            let g = u32::from(g >> shift & 0xf) * 0x11;
            let b = u32::from(b >> shift & 0xf) * 0x11;
            *color = r << 16 | g << 8 | b;
        }
    }
}
