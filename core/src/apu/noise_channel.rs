//! Channel 4 (noise): register plumbing kept from
//! `gebeh-core/src/apu/noise_channel.rs`; sampling rewritten to step a real 15-bit
//! LFSR per T-cycle rather than the teacher's precomputed lookup tables (see
//! DESIGN.md).

use super::envelope::Envelope;
use super::length::Length;

const DIVISORS: [u32; 8] = [8, 16, 32, 48, 64, 80, 96, 112];

pub struct NoiseChannel {
    pub enabled: bool,
    pub length: Length<64>,
    envelope: Envelope,
    clock_shift: u8,
    width_mode_7bit: bool,
    divisor_code: u8,
    lfsr: u16,
    freq_timer: u32,
}

impl Default for NoiseChannel {
    fn default() -> Self {
        NoiseChannel {
            enabled: false,
            length: Length::default(),
            envelope: Envelope::default(),
            clock_shift: 0,
            width_mode_7bit: false,
            divisor_code: 0,
            lfsr: 0x7FFF,
            freq_timer: DIVISORS[0],
        }
    }
}

impl NoiseChannel {
    /// NR41.
    pub fn write_length(&mut self, value: u8) {
        self.length.write(u16::from(value & 0x3F));
    }

    /// NR42.
    pub fn write_envelope(&mut self, value: u8) {
        self.envelope.write_control(value);
        if !self.envelope.dac_enabled() {
            self.enabled = false;
        }
    }

    /// NR43: bits 4-7 clock shift, bit 3 width mode, bits 0-2 divisor code.
    pub fn write_polynomial(&mut self, value: u8) {
        self.clock_shift = value >> 4;
        self.width_mode_7bit = value & 0x08 != 0;
        self.divisor_code = value & 0x07;
    }

    /// NR44: bit 7 trigger, bit 6 length-enable.
    pub fn write_control(&mut self, value: u8) {
        self.length.enabled = value & 0x40 != 0;
        if value & 0x80 != 0 {
            self.trigger();
        }
    }

    fn period(&self) -> u32 {
        DIVISORS[usize::from(self.divisor_code)] << self.clock_shift
    }

    fn trigger(&mut self) {
        self.envelope.trigger();
        self.length.trigger();
        self.lfsr = 0x7FFF;
        self.freq_timer = self.period();
        self.enabled = self.envelope.dac_enabled();
    }

    pub fn tick_length(&mut self) {
        if self.length.tick() {
            self.enabled = false;
        }
    }

    pub fn tick_envelope(&mut self) {
        self.envelope.tick();
    }

    pub fn step(&mut self, t_cycles: u32) {
        let mut remaining = t_cycles;
        while remaining > 0 {
            let period = self.freq_timer.max(1);
            if remaining < period {
                self.freq_timer -= remaining;
                remaining = 0;
            } else {
                remaining -= period;
                self.freq_timer = self.period();
                let bit = (self.lfsr ^ (self.lfsr >> 1)) & 1;
                self.lfsr = (self.lfsr >> 1) | (bit << 14);
                if self.width_mode_7bit {
                    self.lfsr = (self.lfsr & !(1 << 6)) | (bit << 6);
                }
            }
        }
    }

    pub fn sample(&self) -> f32 {
        if !self.enabled {
            return 0.0;
        }
        let volume = f32::from(self.envelope.volume) / 15.0;
        if self.lfsr & 1 == 0 {
            volume
        } else {
            -volume
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_resets_lfsr_to_all_ones() {
        let mut ch = NoiseChannel::default();
        ch.lfsr = 0;
        ch.write_envelope(0xF0);
        ch.write_control(0x80);
        assert_eq!(ch.lfsr, 0x7FFF);
        assert!(ch.enabled);
    }

    #[test]
    fn lfsr_advances_after_a_full_period() {
        let mut ch = NoiseChannel::default();
        ch.write_polynomial(0x00); // shift 0, divisor code 0 -> period 8
        ch.write_envelope(0xF0);
        ch.write_control(0x80);
        let before = ch.lfsr;
        ch.step(8);
        assert_ne!(ch.lfsr, before);
    }
}
