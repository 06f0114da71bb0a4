//! Cycle-accurate Famicom/NES emulator core.
//!
//! The master crystal ticks at 21,477,272 Hz (NTSC). The pixel processor
//! runs at crystal/4 and the CPU at crystal/12, a fixed 3:1 dot:cycle
//! ratio. The dispatcher keeps both in lockstep by granting tick budgets
//! from a shared accumulator; one `run_frame` call produces exactly one
//! 256×240 frame of layer-tagged palette indices.

mod apu;
mod bus;
mod cartridge;
mod famicom;
mod input;
mod ppu;
mod ram;
mod rom;

pub use apu::Apu;
pub use bus::SystemBus;
pub use cartridge::{CartridgeError, Mapper, Nrom, load};
pub use famicom::Famicom;
pub use input::{ControllerPort, InputSource, NullInput, Player, button};
pub use ppu::{FB_HEIGHT, FB_WIDTH, Ppu, layer};
pub use ram::WorkRam;
pub use rom::{Mirroring, RomError, RomImage};
