//! Shared host-facing glue: the completed-frame type, the real-time clock
//! abstraction an RTC cartridge catches up against at load time, and the cartridge
//! loader that ties the two together with `dmgcore-front-helper`.

use std::time::{SystemTime, UNIX_EPOCH};

use dmgcore_core::mbc::Mbc;

pub use dmgcore_core::{HEIGHT, WIDTH};

/// A completed 160x144 indexed framebuffer, one byte per pixel, values 0..3.
#[derive(Clone)]
pub struct Frame {
    pub pixels: [u8; WIDTH as usize * HEIGHT as usize],
}

impl Default for Frame {
    fn default() -> Self {
        Frame {
            pixels: [0; WIDTH as usize * HEIGHT as usize],
        }
    }
}

/// Supplies wall-clock seconds to an MBC3 real-time-clock cartridge.
///
/// The core never reads the system clock itself (it has no notion of wall time);
/// a host picks how "real" the clock should be by choosing an implementation.
pub trait Rtc {
    /// Seconds elapsed since some fixed epoch, monotonic for a single process run.
    fn now_secs(&self) -> u64;
}

/// An [`Rtc`] backed by [`SystemTime`], for desktop/native hosts.
#[derive(Clone, Copy, Default)]
pub struct InstantRtc;

impl Rtc for InstantRtc {
    fn now_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

/// A clock that never advances on its own; useful for deterministic tests.
#[derive(Clone, Copy, Default)]
pub struct FrozenRtc(pub u64);

impl Rtc for FrozenRtc {
    fn now_secs(&self) -> u64 {
        self.0
    }
}

/// Builds a cartridge's `Mbc`, loading saved RAM and catching an RTC-equipped
/// cartridge up to `rtc.now_secs()` from the timestamp the save was written at.
///
/// `last_saved_secs` should come from whatever the caller persisted alongside the
/// save RAM on the previous run (0 for a cartridge with no prior save).
pub fn load_cartridge(
    rom: Vec<u8>,
    saved_ram: Option<&[u8]>,
    rtc: &dyn Rtc,
    last_saved_secs: u64,
) -> Option<Box<dyn Mbc + Send>> {
    let elapsed = rtc.now_secs().saturating_sub(last_saved_secs);
    dmgcore_front_helper::load_cartridge(rom, saved_ram, elapsed)
}
