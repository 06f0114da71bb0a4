//! System bus: CPU address decoding.
//!
//! The sole address decoder. Routes CPU addresses to work RAM, the PPU
//! register mirror, the audio/IO ports, and the cartridge windows per the
//! fixed region table. Reads of write-only or unimplemented IO return 0
//! and writes there are dropped, matching the permissive hardware bus.

use famicom_core::Bus;

use crate::apu::Apu;
use crate::cartridge::Mapper;
use crate::input::{ControllerPort, InputSource, Player};
use crate::ppu::Ppu;
use crate::ram::WorkRam;

pub struct SystemBus {
    pub ram: WorkRam,
    pub ppu: Ppu,
    pub apu: Apu,
    pub cartridge: Box<dyn Mapper>,
    pub port1: ControllerPort,
    pub port2: ControllerPort,
    input: Box<dyn InputSource>,
    /// OAM DMA page latched by a $4014 write; the dispatcher performs the
    /// transfer at the instruction boundary.
    pub oam_dma_page: Option<u8>,
}

impl SystemBus {
    #[must_use]
    pub fn new(cartridge: Box<dyn Mapper>, input: Box<dyn InputSource>) -> Self {
        Self {
            ram: WorkRam::new(),
            ppu: Ppu::new(),
            apu: Apu::new(),
            cartridge,
            port1: ControllerPort::new(),
            port2: ControllerPort::new(),
            input,
            oam_dma_page: None,
        }
    }

    /// Run the PPU for its dot budget, then sample the input source if
    /// this slice crossed the VBlank edge.
    pub(crate) fn run_ppu(&mut self, dots: u64) {
        self.ppu.run(dots, self.cartridge.as_mut());
        if self.ppu.take_vblank_edge() {
            self.port1.refresh(self.input.sample(Player::One));
            self.port2.refresh(self.input.sample(Player::Two));
        }
    }

    /// Copy 256 bytes from CPU memory into OAM through the data port.
    /// Reads go through the normal decoder, side effects included.
    pub(crate) fn oam_dma(&mut self, page: u8) {
        let base = u16::from(page) << 8;
        for offset in 0..=255u16 {
            let value = self.read(base | offset);
            self.ppu.oam_dma_write(value);
        }
    }
}

impl Bus for SystemBus {
    fn read(&mut self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.ram.read(addr),
            0x2000..=0x3FFF => self
                .ppu
                .read_register(addr & 0x0007, self.cartridge.as_mut()),
            0x4015 => self.apu.read_status(),
            0x4016 => self.port1.read(),
            0x4017 => self.port2.read(),
            // Write-only audio and DMA registers
            0x4000..=0x4014 => 0,
            0x4018..=0x5FFF => self.cartridge.register_read(addr),
            0x6000..=0x7FFF => self.cartridge.save_read(addr),
            0x8000..=0xBFFF => self.cartridge.prg_read_low(addr),
            0xC000..=0xFFFF => self.cartridge.prg_read_high(addr),
        }
    }

    fn write(&mut self, addr: u16, value: u8) {
        match addr {
            0x0000..=0x1FFF => self.ram.write(addr, value),
            0x2000..=0x3FFF => {
                self.ppu
                    .write_register(addr & 0x0007, value, self.cartridge.as_mut());
            }
            0x4014 => self.oam_dma_page = Some(value),
            0x4016 => {
                // One strobe line feeds both ports.
                self.port1.write_strobe(value);
                self.port2.write_strobe(value);
            }
            0x4000..=0x4013 | 0x4015 | 0x4017 => self.apu.write(addr, value),
            0x4018..=0x5FFF => self.cartridge.register_write(addr, value),
            0x6000..=0x7FFF => self.cartridge.save_write(addr, value),
            0x8000..=0xBFFF => self.cartridge.prg_write_low(addr, value),
            0xC000..=0xFFFF => self.cartridge.prg_write_high(addr, value),
        }
    }
}
