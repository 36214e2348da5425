//! Frame sequencer, four channels, and the mixing/ring-buffer pipeline.
//!
//! Frame-sequencer dispatch (`Apu::step`) and the `Nr52`/`Nr51`/`Nr50` bitflags are
//! reused near-verbatim from `gebeh-core/src/apu/mod.rs`; mixing and the
//! DC-blocking high-pass filter are rewritten against `spec.md` §4.5 (see
//! DESIGN.md).

pub mod envelope;
pub mod length;
pub mod noise_channel;
pub mod pulse_channel;
pub mod sweep;
pub mod wave_channel;

use bitflags::bitflags;
use noise_channel::NoiseChannel;
use pulse_channel::PulseChannel;
use sweep::Ch1Sweep;
use wave_channel::WaveChannel;

use crate::state::{CH1_SWEEP, WAVE_RAM};

pub const SAMPLE_RATE: u32 = 48_000;
const T_CYCLES_PER_SAMPLE: f32 = crate::SYSTEM_CLOCK_FREQUENCY as f32 / SAMPLE_RATE as f32;
const FRAME_SEQUENCER_PERIOD: u32 = 8192;
const RING_BUFFER_CAPACITY: usize = 4096;
const HPF_CHARGE_FACTOR: f32 = 0.999_958;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Nr52: u8 {
        const POWER = 0b1000_0000;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Nr51: u8 {
        const CH4_LEFT  = 0b1000_0000;
        const CH3_LEFT  = 0b0100_0000;
        const CH2_LEFT  = 0b0010_0000;
        const CH1_LEFT  = 0b0001_0000;
        const CH4_RIGHT = 0b0000_1000;
        const CH3_RIGHT = 0b0000_0100;
        const CH2_RIGHT = 0b0000_0010;
        const CH1_RIGHT = 0b0000_0001;
    }
}

struct RingBuffer {
    samples: [(f32, f32); RING_BUFFER_CAPACITY],
    head: usize,
    len: usize,
    last: (f32, f32),
}

impl Default for RingBuffer {
    fn default() -> Self {
        RingBuffer {
            samples: [(0.0, 0.0); RING_BUFFER_CAPACITY],
            head: 0,
            len: 0,
            last: (0.0, 0.0),
        }
    }
}

impl RingBuffer {
    fn push(&mut self, sample: (f32, f32)) {
        self.last = sample;
        let index = (self.head + self.len) % RING_BUFFER_CAPACITY;
        self.samples[index] = sample;
        if self.len < RING_BUFFER_CAPACITY {
            self.len += 1;
        } else {
            self.head = (self.head + 1) % RING_BUFFER_CAPACITY;
        }
    }

    fn pop(&mut self) -> Option<(f32, f32)> {
        if self.len == 0 {
            return None;
        }
        let sample = self.samples[self.head];
        self.head = (self.head + 1) % RING_BUFFER_CAPACITY;
        self.len -= 1;
        Some(sample)
    }
}

#[derive(Default)]
struct HighPassFilter {
    capacitor_left: f32,
    capacitor_right: f32,
}

impl HighPassFilter {
    fn apply(&mut self, (left, right): (f32, f32)) -> (f32, f32) {
        let out_left = left - self.capacitor_left;
        self.capacitor_left = left - out_left * HPF_CHARGE_FACTOR;
        let out_right = right - self.capacitor_right;
        self.capacitor_right = right - out_right * HPF_CHARGE_FACTOR;
        (out_left, out_right)
    }
}

pub struct Apu {
    power: bool,
    panning: Nr51,
    volume_left: u8,
    volume_right: u8,
    frame_sequencer_step: u8,
    frame_sequencer_counter: u32,
    sample_accumulator: f32,
    ch1: PulseChannel<Ch1Sweep>,
    ch2: PulseChannel<()>,
    ch3: WaveChannel,
    ch4: NoiseChannel,
    filter: HighPassFilter,
    ring: RingBuffer,
}

impl Default for Apu {
    fn default() -> Self {
        Apu {
            power: false,
            panning: Nr51::empty(),
            volume_left: 0,
            volume_right: 0,
            frame_sequencer_step: 0,
            frame_sequencer_counter: 0,
            sample_accumulator: 0.0,
            ch1: PulseChannel::default(),
            ch2: PulseChannel::default(),
            ch3: WaveChannel::default(),
            ch4: NoiseChannel::default(),
            filter: HighPassFilter::default(),
            ring: RingBuffer::default(),
        }
    }
}

impl Apu {
    pub fn read(&self, address: u16) -> u8 {
        match address {
            CH1_SWEEP => 0xFF,                   // NR10 write-only bits read as 1 in practice
            0xFF11 | 0xFF16 => 0x3F,              // duty/length, length not readable
            0xFF1A => if self.ch3.enabled { 0xFF } else { 0x7F },
            0xFF1C => 0x9F,
            0xFF26 => {
                let mut bits = 0x70;
                if self.power {
                    bits |= Nr52::POWER.bits();
                }
                if self.ch1.enabled {
                    bits |= 0x01;
                }
                if self.ch2.enabled {
                    bits |= 0x02;
                }
                if self.ch3.enabled {
                    bits |= 0x04;
                }
                if self.ch4.enabled {
                    bits |= 0x08;
                }
                bits
            }
            0xFF25 => self.panning.bits(),
            0xFF24 => (self.volume_left << 4) | self.volume_right,
            WAVE_RAM..=0xFF3F => self.ch3.read_wave_ram(address - WAVE_RAM),
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, address: u16, value: u8) {
        if address == 0xFF26 {
            let was_power = self.power;
            self.power = value & Nr52::POWER.bits() != 0;
            if was_power && !self.power {
                *self = Apu {
                    ring: core::mem::take(&mut self.ring),
                    ..Apu::default()
                };
            }
            return;
        }
        if (WAVE_RAM..=0xFF3F).contains(&address) {
            self.ch3.write_wave_ram(address - WAVE_RAM, value);
            return;
        }
        if !self.power {
            return;
        }
        match address {
            0xFF10 => self.ch1.write_sweep(value),
            0xFF11 => self.ch1.write_length_and_duty(value),
            0xFF12 => self.ch1.write_envelope(value),
            0xFF13 => self.ch1.write_frequency_low(value),
            0xFF14 => self.ch1.write_frequency_high_and_control(value),
            0xFF16 => self.ch2.write_length_and_duty(value),
            0xFF17 => self.ch2.write_envelope(value),
            0xFF18 => self.ch2.write_frequency_low(value),
            0xFF19 => self.ch2.write_frequency_high_and_control(value),
            0xFF1A => self.ch3.write_dac_enable(value),
            0xFF1B => self.ch3.write_length(value),
            0xFF1C => self.ch3.write_volume(value),
            0xFF1D => self.ch3.write_frequency_low(value),
            0xFF1E => self.ch3.write_frequency_high_and_control(value),
            0xFF20 => self.ch4.write_length(value),
            0xFF21 => self.ch4.write_envelope(value),
            0xFF22 => self.ch4.write_polynomial(value),
            0xFF23 => self.ch4.write_control(value),
            0xFF24 => {
                self.volume_left = (value >> 4) & 0x07;
                self.volume_right = value & 0x07;
            }
            0xFF25 => self.panning = Nr51::from_bits_truncate(value),
            _ => {}
        }
    }

    fn tick_length(&mut self) {
        self.ch1.tick_length();
        self.ch2.tick_length();
        self.ch3.tick_length();
        self.ch4.tick_length();
    }

    fn tick_sweep(&mut self) {
        self.ch1.tick_sweep();
    }

    fn tick_envelope(&mut self) {
        self.ch1.tick_envelope();
        self.ch2.tick_envelope();
        self.ch4.tick_envelope();
    }

    fn advance_frame_sequencer(&mut self, t_cycles: u32) {
        self.frame_sequencer_counter += t_cycles;
        while self.frame_sequencer_counter >= FRAME_SEQUENCER_PERIOD {
            self.frame_sequencer_counter -= FRAME_SEQUENCER_PERIOD;
            let step = self.frame_sequencer_step;
            if step % 2 == 0 {
                self.tick_length();
            }
            if step == 2 || step == 6 {
                self.tick_sweep();
            }
            if step == 7 {
                self.tick_envelope();
            }
            self.frame_sequencer_step = (step + 1) % 8;
        }
    }

    fn mix(&self) -> (f32, f32) {
        let channels = [
            (self.ch1.sample(), Nr51::CH1_LEFT, Nr51::CH1_RIGHT),
            (self.ch2.sample(), Nr51::CH2_LEFT, Nr51::CH2_RIGHT),
            (self.ch3.sample(), Nr51::CH3_LEFT, Nr51::CH3_RIGHT),
            (self.ch4.sample(), Nr51::CH4_LEFT, Nr51::CH4_RIGHT),
        ];
        let mut left = 0.0f32;
        let mut right = 0.0f32;
        for (sample, left_bit, right_bit) in channels {
            if self.panning.contains(left_bit) {
                left += sample;
            }
            if self.panning.contains(right_bit) {
                right += sample;
            }
        }
        let left_gain = f32::from(self.volume_left + 1) / 8.0 / 4.0;
        let right_gain = f32::from(self.volume_right + 1) / 8.0 / 4.0;
        (left * left_gain, right * right_gain)
    }

    /// Advances every channel and the frame sequencer by `t_cycles`, emitting
    /// finished stereo samples into the ring buffer as the 48 kHz boundary is
    /// crossed.
    pub fn step(&mut self, t_cycles: u32) {
        if self.power {
            self.ch1.step(t_cycles);
            self.ch2.step(t_cycles);
            self.ch3.step(t_cycles);
            self.ch4.step(t_cycles);
            self.advance_frame_sequencer(t_cycles);
        }
        self.sample_accumulator += t_cycles as f32;
        while self.sample_accumulator >= T_CYCLES_PER_SAMPLE {
            self.sample_accumulator -= T_CYCLES_PER_SAMPLE;
            let raw = if self.power { self.mix() } else { (0.0, 0.0) };
            let filtered = self.filter.apply(raw);
            self.ring.push(filtered);
        }
    }

    /// Drains up to `out.len()` stereo samples; on underrun, fills the remainder
    /// with exponentially decaying copies of the last produced sample.
    pub fn pull_audio(&mut self, out: &mut [(f32, f32)]) -> usize {
        let mut produced = 0;
        for slot in out.iter_mut() {
            if let Some(sample) = self.ring.pop() {
                *slot = sample;
                produced += 1;
            } else {
                let (l, r) = self.ring.last;
                self.ring.last = (l * 0.5, r * 0.5);
                *slot = self.ring.last;
            }
        }
        produced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn powering_off_clears_channel_enables() {
        let mut apu = Apu::default();
        apu.write(0xFF26, 0x80);
        apu.write(0xFF12, 0xF0);
        apu.write(0xFF14, 0x80);
        assert!(apu.ch1.enabled);
        apu.write(0xFF26, 0x00);
        assert!(!apu.ch1.enabled);
    }

    #[test]
    fn writes_ignored_while_powered_off() {
        let mut apu = Apu::default();
        apu.write(0xFF12, 0xF0);
        apu.write(0xFF14, 0x80);
        assert!(!apu.ch1.enabled);
    }

    #[test]
    fn produces_at_least_one_sample_after_a_full_period() {
        let mut apu = Apu::default();
        apu.write(0xFF26, 0x80);
        apu.step(200);
        assert!(apu.ring.len >= 1);
    }
}
