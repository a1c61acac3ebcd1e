//! The device seam between the CPU and its peripherals.

use crate::fault::FaultKind;
use crate::uxn::Uxn;

/// Host-side handler for live device ports.
///
/// The evaluator routes `DEI`/`DEO` through this trait for ports whose
/// bit is set in the machine's read/write masks; all other ports behave
/// as plain bytes in the device page. Handlers receive the machine so
/// they can read vectors, poke port bytes and reach RAM, but they must
/// never re-enter [`Uxn::eval`] - vectors fire between entries, driven
/// by the host loop.
pub trait Device {
    /// Produce a fresh byte for a live input port.
    ///
    /// The returned value is what `DEI` pushes; it is not written back to
    /// the device page unless the handler does so itself.
    fn dei(&mut self, uxn: &mut Uxn, port: u8) -> u8;

    /// React to a write that has already landed in the device page.
    fn deo(&mut self, uxn: &mut Uxn, port: u8) -> Result<(), FaultKind>;
}

/// A device with no live ports: every port is plain memory.
///
/// Useful as the device argument for tests and tools that only exercise
/// the CPU.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDevice;

impl Device for NullDevice {
    fn dei(&mut self, uxn: &mut Uxn, port: u8) -> u8 {
        uxn.dev[usize::from(port)]
    }

    fn deo(&mut self, _uxn: &mut Uxn, _port: u8) -> Result<(), FaultKind> {
        Ok(())
    }
}
