//! Audio port stub.
//!
//! Channel synthesis lives outside the core. The CPU-visible surface is
//! the channel-enable register ($4015, whose read reports which enabled
//! channels have live length counters), and the frame-counter register
//! ($4017). Nothing else is modeled.

use famicom_core::Reset;

pub struct Apu {
    /// Channel enable bits ($4015 write, low 5 bits).
    enable: u8,
    /// Frame counter mode byte ($4017 write).
    frame_mode: u8,
}

impl Apu {
    #[must_use]
    pub fn new() -> Self {
        Self {
            enable: 0,
            frame_mode: 0,
        }
    }

    /// $4015 read: length-counter status. With synthesis stubbed out, an
    /// enabled channel reports its counter as live.
    #[must_use]
    pub fn read_status(&self) -> u8 {
        self.enable
    }

    pub fn write(&mut self, addr: u16, value: u8) {
        match addr {
            0x4015 => self.enable = value & 0x1F,
            0x4017 => self.frame_mode = value,
            // Channel parameter registers, ignored by the stub
            0x4000..=0x4013 => {}
            _ => {}
        }
    }
}

impl Default for Apu {
    fn default() -> Self {
        Self::new()
    }
}

impl Reset for Apu {
    fn hard_reset(&mut self) {
        self.enable = 0;
        self.frame_mode = 0;
    }

    fn reset(&mut self) {
        self.enable = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enable_register_round_trips_low_bits() {
        let mut apu = Apu::new();
        apu.write(0x4015, 0xFF);
        assert_eq!(apu.read_status(), 0x1F);
        apu.write(0x4015, 0x05);
        assert_eq!(apu.read_status(), 0x05);
    }

    #[test]
    fn reset_silences_channels() {
        let mut apu = Apu::new();
        apu.write(0x4015, 0x1F);
        apu.reset();
        assert_eq!(apu.read_status(), 0);
    }
}
