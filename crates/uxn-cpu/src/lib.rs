//! Uxn stack-machine CPU core.
//!
//! The Uxn CPU is a 16-bit stack machine with a 64 KiB executable page,
//! two 256-byte circular stacks and a 32-opcode instruction set. Every
//! opcode exists in eight variants under three orthogonal mode bits:
//!
//! - **`2` (short)** - operands and results are 16-bit big-endian pairs
//! - **`r` (return)** - the instruction runs against the return stack
//! - **`k` (keep)** - operand reads leave the stack untouched
//!
//! Peripherals are reached through 256 memory-mapped device ports (16
//! devices x 16 ports). The [`Device`] trait is the seam to the host:
//! ports flagged in the read/write masks are routed to it, all other
//! ports behave as plain memory.

mod device;
mod fault;
mod op;
mod stack;
mod uxn;

pub use device::{Device, NullDevice};
pub use fault::{Fault, FaultKind};
pub use op::Instr;
pub use stack::Stack;
pub use uxn::{HALT_PORT, PAGE_PROGRAM, PAGE_SIZE, Uxn};
