//! cpal stream construction and audio-paced emulation.
//!
//! Grounded on `gebeh-native/src/emulator_loop.rs`'s `spawn_emulator`/`create_stream`
//! shape (dispatch on `cpal::SampleFormat`, a `StreamConfig` with a fixed 128-frame
//! buffer, cycles-per-host-sample pacing against `SYSTEM_CLOCK_FREQUENCY`). Diverges
//! in how cycles turn into samples: the teacher's `Mixer::mix` produces one sample
//! per GB M-cycle call at whatever rate the host asked for, so it paces cycle-by-
//! cycle and checks `get_scanline_if_ready()` after every `execute`. This core's
//! `apu::Apu` generates its own samples internally at a fixed `apu::SAMPLE_RATE`
//! (48 kHz) as `Machine::run_cycles` advances it, so the host side only needs to
//! figure out how many GB cycles correspond to one callback's worth of wall-clock
//! time and then drain `Machine::pull_audio` — see DESIGN.md for the resulting
//! known limitation (no resampling if the device's native rate isn't 48 kHz).

use std::fs;
use std::path::PathBuf;
use std::sync::mpsc::SyncSender;
use std::sync::{Arc, RwLock};

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize, FromSample, SampleFormat, SizedSample, StreamConfig, I24};
use dmgcore_core::apu::SAMPLE_RATE;
use dmgcore_core::joypad::JoypadInput;
use dmgcore_core::{Machine, SYSTEM_CLOCK_FREQUENCY};
use dmgcore_host::{load_cartridge, Frame, InstantRtc, Rtc};

/// Picks the device's default output config, preferring a 48 kHz stereo one if the
/// device offers it — the APU's sample generator runs at a fixed 48 kHz, and a
/// mismatched host rate would otherwise pitch-shift the mix (no resampler exists in
/// this core, see DESIGN.md).
fn pick_output_config(device: &cpal::Device) -> cpal::SupportedStreamConfig {
    let preferred = device.supported_output_configs().ok().and_then(|configs| {
        configs
            .filter(|c| c.channels() == 2)
            .find(|c| c.min_sample_rate().0 <= SAMPLE_RATE && SAMPLE_RATE <= c.max_sample_rate().0)
            .map(|c| c.with_sample_rate(cpal::SampleRate(SAMPLE_RATE)))
    });
    match preferred {
        Some(config) => config,
        None => {
            log::warn!("output device has no 48 kHz stereo config; falling back to its default (audio may be pitch-shifted)");
            device.default_output_config().unwrap()
        }
    }
}

pub fn spawn_emulator(
    device: &cpal::Device,
    shared_frame: SyncSender<Frame>,
    shared_joypad: Arc<RwLock<JoypadInput>>,
) -> cpal::Stream {
    let config = pick_output_config(device);
    let stream = match config.sample_format() {
        SampleFormat::I8 => create_stream::<i8>(device, config.into(), shared_frame, shared_joypad),
        SampleFormat::I16 => create_stream::<i16>(device, config.into(), shared_frame, shared_joypad),
        SampleFormat::I24 => create_stream::<I24>(device, config.into(), shared_frame, shared_joypad),
        SampleFormat::I32 => create_stream::<i32>(device, config.into(), shared_frame, shared_joypad),
        SampleFormat::I64 => create_stream::<i64>(device, config.into(), shared_frame, shared_joypad),
        SampleFormat::U8 => create_stream::<u8>(device, config.into(), shared_frame, shared_joypad),
        SampleFormat::U16 => create_stream::<u16>(device, config.into(), shared_frame, shared_joypad),
        SampleFormat::U32 => create_stream::<u32>(device, config.into(), shared_frame, shared_joypad),
        SampleFormat::U64 => create_stream::<u64>(device, config.into(), shared_frame, shared_joypad),
        SampleFormat::F32 => create_stream::<f32>(device, config.into(), shared_frame, shared_joypad),
        SampleFormat::F64 => create_stream::<f64>(device, config.into(), shared_frame, shared_joypad),
        sample_format => panic!("unsupported sample format '{sample_format}'"),
    };
    stream.play().unwrap();
    stream
}

fn save_path(rom_path: &str) -> PathBuf {
    PathBuf::from(format!("{rom_path}.sav"))
}

fn save_timestamp_path(rom_path: &str) -> PathBuf {
    PathBuf::from(format!("{rom_path}.sav.timestamp"))
}

fn create_stream<T>(
    device: &cpal::Device,
    config: cpal::StreamConfig,
    shared_frame: SyncSender<Frame>,
    shared_joypad: Arc<RwLock<JoypadInput>>,
) -> cpal::Stream
where
    T: SizedSample + FromSample<f32>,
{
    let rom_path = std::env::args().nth(1).expect("please provide a ROM path as the first argument");
    let rom = fs::read(&rom_path).unwrap();

    println!("Title: {}", dmgcore_front_helper::title_from_rom(&rom));

    let saved_ram = fs::read(save_path(&rom_path)).ok();
    let last_saved_secs = fs::read_to_string(save_timestamp_path(&rom_path))
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(0);

    let rtc = InstantRtc;
    let mut mbc = load_cartridge(rom, saved_ram.as_deref(), &rtc, last_saved_secs)
        .expect("unsupported or malformed cartridge header");

    let mut machine = Machine::default();

    let config = StreamConfig {
        channels: 2,
        buffer_size: BufferSize::Fixed(128),
        ..config
    };

    let sample_rate = config.sample_rate.0;
    let base = SYSTEM_CLOCK_FREQUENCY / sample_rate;
    let remainder = SYSTEM_CLOCK_FREQUENCY % sample_rate;
    let mut error = 0u32;

    // Autosaves every few seconds of emulated audio rather than on exit, since the
    // cartridge lives inside this closure with no path back to the window's close
    // handler.
    let autosave_every = sample_rate.saturating_mul(4).max(1);
    let mut frames_since_autosave = 0u32;
    let mut sample_buf = vec![(0.0f32, 0.0f32); 128];

    device
        .build_output_stream(
            &config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                if let Ok(input) = shared_joypad.try_read() {
                    machine.set_input(*input);
                }

                let frame_count = data.len() / 2;
                let mut cycles = base * frame_count as u32;
                error += remainder * frame_count as u32;
                while let Some(new_error) = error.checked_sub(sample_rate) {
                    error = new_error;
                    cycles += 1;
                }

                if machine.run_cycles(mbc.as_mut(), cycles) {
                    let frame = Frame {
                        pixels: machine.ppu.framebuffer,
                    };
                    if shared_frame.try_send(frame).is_err() {
                        log::trace!("frame dropped, receiver busy");
                    }
                }

                sample_buf.resize(frame_count, (0.0, 0.0));
                machine.pull_audio(&mut sample_buf);
                for (slot, &(left, right)) in data.chunks_mut(2).zip(sample_buf.iter()) {
                    slot[0] = T::from_sample(left);
                    slot[1] = T::from_sample(right);
                }

                frames_since_autosave += 1;
                if frames_since_autosave >= autosave_every {
                    frames_since_autosave = 0;
                    let ram = mbc.ram_to_save();
                    if !ram.is_empty() {
                        if let Err(err) = fs::write(save_path(&rom_path), ram) {
                            log::warn!("failed to autosave battery RAM: {err}");
                        }
                        if let Err(err) =
                            fs::write(save_timestamp_path(&rom_path), rtc.now_secs().to_string())
                        {
                            log::warn!("failed to write save timestamp: {err}");
                        }
                    }
                }
            },
            |err| eprintln!("an error occurred on stream: {err}"),
            None,
        )
        .unwrap()
}
