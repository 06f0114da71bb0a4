//! Top-level console: component composition and the clock-budget
//! dispatcher.
//!
//! The dispatcher owns the master-tick accumulator. Each scheduling round
//! divides it into a CPU budget (÷12) and a PPU budget (÷4), zeroes it,
//! runs the CPU in whole instructions until its budget is covered, then
//! lets the PPU catch up. CPU consumption is charged back as master
//! ticks, so both devices hold their exact 3:1 dot:cycle ratio. The
//! round loop ends when the PPU signals frame-complete at the end of its
//! pre-render line.

use famicom_core::{Bus, ClockBudget, MasterClock, Observable, Reset, Ticks, Value};
use ricoh_2a03::Ricoh2a03;

use crate::bus::SystemBus;
use crate::cartridge::{self, CartridgeError};
use crate::input::InputSource;

/// Master-clock divisor for the CPU.
const CPU_DIVISOR: u64 = 12;
/// Master-clock divisor for the PPU.
const PPU_DIVISOR: u64 = 4;

/// The composed console.
pub struct Famicom {
    cpu: Ricoh2a03,
    bus: SystemBus,
    /// Master ticks awaiting distribution.
    budget: ClockBudget,
    /// Total CPU cycles executed; also the DMA parity reference.
    cpu_cycles: u64,
    /// Total master ticks elapsed.
    master_ticks: u64,
    /// Completed frame counter.
    frame_count: u64,
}

impl Famicom {
    /// NTSC master crystal.
    pub const MASTER_CLOCK: MasterClock = MasterClock::new(21_477_272);

    /// Build a console around an iNES image and an input collaborator,
    /// then power it on. A load failure attaches nothing.
    pub fn new(rom_data: &[u8], input: Box<dyn InputSource>) -> Result<Self, CartridgeError> {
        let cartridge = cartridge::load(rom_data)?;
        let mut console = Self {
            cpu: Ricoh2a03::new(),
            bus: SystemBus::new(cartridge, input),
            budget: ClockBudget::new(),
            cpu_cycles: 0,
            master_ticks: 0,
            frame_count: 0,
        };
        console.hard_reset();
        Ok(console)
    }

    /// Power-on reset: RAM, CPU, then PPU, and a zeroed accumulator. The
    /// audio registers are silenced by the CPU's reset bus writes.
    pub fn hard_reset(&mut self) {
        log::debug!("hard reset");
        self.bus.ram.hard_reset();
        self.cpu.hard_reset(&mut self.bus);
        self.bus.ppu.hard_reset();
        self.bus.port1.clear();
        self.bus.port2.clear();
        self.budget.clear();
    }

    /// Reset-button reset: RAM survives; CPU and PPU reinitialize their
    /// documented subset. The cartridge hook is a no-op on NROM.
    pub fn reset(&mut self) {
        log::debug!("soft reset");
        self.bus.ram.reset();
        self.cpu.reset(&mut self.bus);
        self.bus.ppu.reset();
        self.bus.cartridge.reset();
        self.budget.clear();
    }

    /// Run exactly one rendered frame. Returns the master ticks consumed.
    pub fn run_frame(&mut self) -> u64 {
        let start = self.master_ticks;
        loop {
            let granted = self.budget.drain().get();
            let cpu_budget = granted / CPU_DIVISOR;
            let ppu_budget = granted / PPU_DIVISOR;

            // Whole instructions only. At least one always runs, which is
            // what seeds the clock from a cold accumulator; any overshoot
            // is charged back and reappears in the next round's budgets.
            let mut consumed = 0u64;
            loop {
                consumed += u64::from(self.cpu.step(&mut self.bus));
                if let Some(page) = self.bus.oam_dma_page.take() {
                    self.bus.oam_dma(page);
                    // 513 cycles, 514 when triggered on an odd CPU cycle.
                    consumed += 513 + ((self.cpu_cycles + consumed) & 1);
                }
                if consumed >= cpu_budget {
                    break;
                }
            }
            self.cpu_cycles += consumed;
            self.bus.cartridge.tick(consumed);

            let ticks = consumed * CPU_DIVISOR;
            self.master_ticks += ticks;
            self.budget.charge(Ticks::new(ticks));

            self.bus.run_ppu(ppu_budget);
            if self.bus.ppu.take_nmi() {
                self.cpu.request_nmi();
            }
            if self.bus.ppu.take_frame_complete() {
                break;
            }
        }
        self.frame_count += 1;
        self.master_ticks - start
    }

    /// Debug read through the normal decoder (side effects included).
    pub fn read(&mut self, addr: u16) -> u8 {
        self.bus.read(addr)
    }

    /// Debug write through the normal decoder. A $4014 write latches a
    /// DMA page that the next `run_frame` services.
    pub fn write(&mut self, addr: u16, value: u8) {
        self.bus.write(addr, value);
    }

    /// Completed frame: 256×240 layer-tagged palette indices.
    #[must_use]
    pub fn framebuffer(&self) -> &[u8] {
        self.bus.ppu.framebuffer()
    }

    /// Greyscale palette mask for the presentation layer.
    #[must_use]
    pub fn palette_mask(&self) -> u8 {
        self.bus.ppu.palette_mask()
    }

    /// Audio channel enable/length status bits ($4015, side-effect free).
    #[must_use]
    pub fn audio_status(&self) -> u8 {
        self.bus.apu.read_status()
    }

    /// Reference to the CPU.
    #[must_use]
    pub fn cpu(&self) -> &Ricoh2a03 {
        &self.cpu
    }

    /// Mutable reference to the CPU.
    pub fn cpu_mut(&mut self) -> &mut Ricoh2a03 {
        &mut self.cpu
    }

    /// Reference to the bus.
    #[must_use]
    pub fn bus(&self) -> &SystemBus {
        &self.bus
    }

    /// Mutable reference to the bus.
    pub fn bus_mut(&mut self) -> &mut SystemBus {
        &mut self.bus
    }

    /// Total master ticks elapsed.
    #[must_use]
    pub fn master_ticks(&self) -> u64 {
        self.master_ticks
    }

    /// Completed frame count.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

impl Observable for Famicom {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some(rest) = path.strip_prefix("cpu.") {
            self.cpu.query(rest)
        } else {
            match path {
                "ppu.scanline" => Some(self.bus.ppu.scanline().into()),
                "ppu.dot" => Some(self.bus.ppu.dot().into()),
                "master_ticks" => Some(self.master_ticks.into()),
                "frame_count" => Some(self.frame_count.into()),
                _ => None,
            }
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "cpu.pc",
            "cpu.a",
            "cpu.x",
            "cpu.y",
            "cpu.s",
            "cpu.p",
            "cpu.cycles",
            "ppu.scanline",
            "ppu.dot",
            "master_ticks",
            "frame_count",
        ]
    }
}
