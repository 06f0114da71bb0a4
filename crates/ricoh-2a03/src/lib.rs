//! Ricoh 2A03 CPU core, the NES's 6502 derivative.
//!
//! The 2A03 is a stock 6502 with the BCD circuitry disconnected: the D
//! flag can be set and cleared but never changes arithmetic. Only the
//! documented instruction set is implemented; an undocumented opcode is
//! treated as a fatal decode defect.

pub mod flags;
mod cpu;
mod registers;

pub use cpu::Ricoh2a03;
pub use flags::Status;
pub use registers::Registers;
