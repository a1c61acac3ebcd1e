//! Datetime device (slice 0xC0): live reads of local wall-clock time.

use chrono::{Datelike, Local, Timelike};
use uxn_cpu::Uxn;

/// The datetime device. Stateless; every read samples the local clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct Datetime;

impl Datetime {
    pub(crate) fn dei(&mut self, uxn: &mut Uxn, port: u8) -> u8 {
        let now = Local::now();
        match port & 0x0f {
            0x0 => (now.year() as u16 >> 8) as u8,
            0x1 => now.year() as u8,
            0x2 => now.month0() as u8,
            0x3 => now.day() as u8,
            0x4 => now.hour() as u8,
            0x5 => now.minute() as u8,
            0x6 => now.second() as u8,
            0x7 => now.weekday().num_days_from_sunday() as u8,
            0x8 => (now.ordinal0() >> 8) as u8,
            0x9 => now.ordinal0() as u8,
            // chrono has no tm_isdst equivalent; report standard time
            0xa => 0,
            _ => uxn.dev[usize::from(port)],
        }
    }
}
