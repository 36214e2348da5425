//! `no_std` Game Boy (DMG) core: CPU, PPU, APU, timer, joypad, OAM DMA and cartridge
//! bank switching, wired together by [`Machine`].
//!
//! Grounded on `gebeh-core/src/lib.rs`'s top-level `Emulator`, reworked from its
//! back-pointer `Speeder`/`ly_handler` fields into the borrowing [`cpu::mmu::Bus`]
//! this crate uses everywhere else (see DESIGN.md). `Machine::step_frame` runs the
//! tick order `spec.md` §5 specifies — timer, then PPU, then APU, then CPU — once
//! per 4-T-cycle quantum, with OAM DMA stepped alongside at the same cadence.

#![no_std]

extern crate alloc;

pub mod apu;
pub mod cpu;
pub mod dma;
pub mod joypad;
pub mod mbc;
pub mod ppu;
pub mod state;
pub mod timer;

pub use joypad::JoypadInput;
pub use ppu::{HEIGHT, WIDTH};

use cpu::mmu::Bus;
use cpu::Cpu;
use mbc::Mbc;
use state::{Interruptions, State};

/// The DMG system clock: 4 the CPU's instruction rate, shared by the PPU scanline
/// timer and the APU's frame sequencer. `gebeh-native/src/emulator_loop.rs`'s
/// cycles-per-sample pacing divides this by the host's chosen audio sample rate.
pub const SYSTEM_CLOCK_FREQUENCY: u32 = 4_194_304;

/// Every peripheral except the cartridge, which callers own separately (as a
/// `Box<dyn Mbc>` or a concrete type) so it can be swapped, saved, and reloaded
/// independently of the rest of the machine.
pub struct Machine {
    pub cpu: Cpu,
    pub state: State,
    pub ppu: ppu::Ppu,
    pub apu: apu::Apu,
    pub timer: timer::Timer,
    pub joypad: joypad::Joypad,
    pub dma: dma::Dma,
    /// T-cycles accumulated since the last `Mbc::tick_rtc_second` call.
    rtc_cycles: u32,
}

impl Default for Machine {
    fn default() -> Self {
        Machine {
            cpu: Cpu::default(),
            state: State::default(),
            ppu: ppu::Ppu::default(),
            apu: apu::Apu::default(),
            timer: timer::Timer::default(),
            joypad: joypad::Joypad::default(),
            dma: dma::Dma::default(),
            rtc_cycles: 0,
        }
    }
}

impl Machine {
    /// Reports the current joypad matrix, raising the press-edge interrupt line in
    /// `state.interrupt_flag` if this changes a previously-unset button to pressed.
    pub fn set_input(&mut self, input: JoypadInput) {
        self.joypad.set_input(input);
    }

    /// Runs exactly one `Cpu::step` (which may itself be an interrupt dispatch, a
    /// HALT idle tick, or a full instruction), then ticks OAM DMA, the timer, the
    /// PPU, and the APU in lockstep with however many T-cycles that step reports —
    /// `spec.md` §5 bills the whole quantum's cycles to whichever of those the CPU
    /// actually did, not a fixed 4. OAM DMA advances one byte per 4 of those
    /// T-cycles, matching the real 160-byte/640-T-cycle transfer duration
    /// (`spec.md` §4.3) regardless of how many T-cycles this particular
    /// instruction took.
    fn tick<M: Mbc + ?Sized>(&mut self, mbc: &mut M) -> u32 {
        let mut bus = Bus {
            mbc: &mut *mbc,
            state: &mut self.state,
            ppu: &mut self.ppu,
            apu: &mut self.apu,
            timer: &mut self.timer,
            joypad: &mut self.joypad,
            dma: &mut self.dma,
        };

        let t_cycles = self.cpu.step(&mut bus);

        // One DMA byte per 4-T-cycle quantum, not one per `tick` call: `tick` runs
        // once per instruction, which spans a variable number of these quanta, and
        // the 160-byte/640-T-cycle transfer `spec.md` §4.3 describes only comes out
        // right if it's paced off T-cycles actually elapsed, not off call count.
        let mut dma_cycles = 0u32;
        while dma_cycles < t_cycles {
            if let Some((index, byte)) = self.dma.step(mbc, &self.state.video_ram, &self.state.wram) {
                self.state.oam[usize::from(index)] = byte;
            }
            dma_cycles += 4;
        }

        if self.timer.step(t_cycles) {
            self.state.interrupt_flag.insert(Interruptions::TIMER);
        }

        let events = self.ppu.step(t_cycles, &self.state.oam, &self.state.video_ram);
        if events.vblank_interrupt {
            self.state.interrupt_flag.insert(Interruptions::VBLANK);
        }
        if events.stat_interrupt {
            self.state.interrupt_flag.insert(Interruptions::LCD);
        }

        self.apu.step(t_cycles);

        if self.joypad.take_requested_interrupt() {
            self.state.interrupt_flag.insert(Interruptions::JOYPAD);
        }

        self.rtc_cycles += t_cycles;
        while self.rtc_cycles >= SYSTEM_CLOCK_FREQUENCY {
            self.rtc_cycles -= SYSTEM_CLOCK_FREQUENCY;
            mbc.tick_rtc_second();
        }

        t_cycles
    }

    /// Runs the machine until the PPU finishes a frame (or gives up after one
    /// frame's worth of T-cycles with the LCD disabled, so a game that turns the
    /// screen off doesn't spin this loop forever). Returns the completed
    /// framebuffer.
    pub fn step_frame<M: Mbc + ?Sized>(&mut self, mbc: &mut M) -> &[u8; WIDTH * HEIGHT] {
        self.ppu.frame_completed = false;
        let mut cycles_run: u64 = 0;
        const CYCLES_PER_FRAME: u64 = 70224;
        while !self.ppu.frame_completed && cycles_run < CYCLES_PER_FRAME * 2 {
            cycles_run += u64::from(self.tick(mbc));
        }
        &self.ppu.framebuffer
    }

    /// Drains up to `out.len()` stereo samples queued by the APU, returning how
    /// many were actually available.
    pub fn pull_audio(&mut self, out: &mut [(f32, f32)]) -> usize {
        self.apu.pull_audio(out)
    }

    /// Runs at least `cycles` T-cycles (the last `tick` may overshoot by up to one
    /// instruction, since `tick` always completes whatever the CPU started), then
    /// reports whether the PPU completed a frame somewhere during that span.
    ///
    /// The audio-driven hosts this is for (`gebeh-native/src/emulator_loop.rs`'s
    /// `create_stream`) don't care about frame boundaries mid-callback, just
    /// whether to hand the caller a fresh framebuffer afterward — this is the
    /// cycle-count-driven counterpart to [`Self::step_frame`]'s run-to-vblank loop.
    pub fn run_cycles<M: Mbc + ?Sized>(&mut self, mbc: &mut M, cycles: u32) -> bool {
        let mut ran = 0u32;
        let mut completed = false;
        while ran < cycles {
            ran += self.tick(mbc);
            completed |= self.ppu.frame_completed;
        }
        if completed {
            self.ppu.frame_completed = false;
        }
        completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mbc::mbc1::Mbc1;

    #[test]
    fn default_machine_boots_past_reset_vector() {
        let mut machine = Machine::default();
        let mut mbc = Mbc1::new(alloc::vec![0u8; 0x8000], 0);
        assert_eq!(machine.cpu.pc, 0x0100);
        machine.tick(&mut mbc);
        assert_ne!(machine.cpu.pc, 0x0100);
    }

    #[test]
    fn step_frame_advances_ly_through_a_full_frame() {
        let mut machine = Machine::default();
        let mut mbc = Mbc1::new(alloc::vec![0u8; 0x8000], 0);
        machine.ppu.set_lcd_control(ppu::LcdControl::LCD_PPU_ENABLE);
        let frame = machine.step_frame(&mut mbc);
        assert_eq!(frame.len(), WIDTH * HEIGHT);
    }
}
