//! Windowed native frontend: `winit` event loop, `pixels` blit, `cpal` audio.
//!
//! Grounded on `gebeh-native/src/main.rs`'s window/event-loop shape (4x-scaled
//! window, `Arc<RwLock<JoypadInput>>` shared with the audio thread, a bounded
//! `sync_channel<Frame>` for completed frames). Diverges in the blit step: the
//! teacher's `Frame` is `[Scanline; HEIGHT]` with an `iter_colors()` that already
//! yields RGBA8, while this core's `Frame` is a flat buffer of 2-bit palette
//! indices (see `dmgcore_host::Frame`), so a palette lookup runs here instead.

mod emulator_loop;

use std::sync::{Arc, RwLock};

use cpal::traits::HostTrait;
use dmgcore_core::joypad::JoypadInput;
use dmgcore_core::{HEIGHT, WIDTH};
use dmgcore_host::Frame;
use pixels::{Pixels, PixelsBuilder, SurfaceTexture};
use winit::dpi::LogicalSize;
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::EventLoop;
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowBuilder};

use crate::emulator_loop::spawn_emulator;

/// Classic DMG four-shade palette, lightest (index 0) to darkest (index 3).
const PALETTE: [[u8; 4]; 4] = [
    [0x9B, 0xBC, 0x0F, 0xFF],
    [0x8B, 0xAC, 0x0F, 0xFF],
    [0x30, 0x62, 0x30, 0xFF],
    [0x0F, 0x38, 0x0F, 0xFF],
];

fn get_pixels_from_window(window: &Window, width: u32, height: u32) -> Pixels<'_> {
    let window_size = window.inner_size();
    let surface_texture = SurfaceTexture::new(window_size.width, window_size.height, window);
    PixelsBuilder::new(width, height, surface_texture)
        .enable_vsync(true)
        .build()
        .unwrap()
}

fn blit(pixels: &mut Pixels<'_>, frame: &Frame) {
    for (rgba, &index) in pixels.frame_mut().chunks_mut(4).zip(frame.pixels.iter()) {
        rgba.copy_from_slice(&PALETTE[usize::from(index.min(3))]);
    }
}

fn main() {
    color_eyre::install().unwrap();
    env_logger::init();

    let event_loop = EventLoop::new().unwrap();

    let window = {
        let size = LogicalSize::new(WIDTH as f64, HEIGHT as f64);
        let scaled_size = LogicalSize::new(WIDTH as f64 * 4.0, HEIGHT as f64 * 4.0);
        WindowBuilder::new()
            .with_title("dmgcore")
            .with_inner_size(scaled_size)
            .with_min_inner_size(size)
            .build(&event_loop)
            .unwrap()
    };

    let mut pixels = get_pixels_from_window(&window, WIDTH as u32, HEIGHT as u32);

    let joypad: Arc<RwLock<JoypadInput>> = Default::default();
    let (tx_frame, rx_frame) = std::sync::mpsc::sync_channel::<Frame>(2);

    let shared_joypad = joypad.clone();

    let host = cpal::default_host();
    let device = host.default_output_device().expect("failed to find output device");

    let _stream = spawn_emulator(&device, tx_frame, shared_joypad);

    event_loop
        .run(|event, elwt| match event {
            Event::WindowEvent {
                event: WindowEvent::RedrawRequested,
                window_id,
                ..
            } if window_id == window.id() => {
                if let Ok(frame) = rx_frame.recv() {
                    blit(&mut pixels, &frame);
                }
                pixels.render().unwrap();
                window.request_redraw();
            }
            Event::WindowEvent {
                event: WindowEvent::Resized(size),
                window_id,
                ..
            } if window_id == window.id() => {
                pixels.resize_surface(size.width, size.height).unwrap();
            }
            Event::WindowEvent {
                event:
                    WindowEvent::KeyboardInput {
                        event:
                            KeyEvent {
                                state: ElementState::Released,
                                physical_key: PhysicalKey::Code(keycode),
                                ..
                            },
                        ..
                    },
                ..
            } => {
                let mut joypad = joypad.write().unwrap();
                match keycode {
                    KeyCode::KeyA => joypad.a = false,
                    KeyCode::KeyB => joypad.b = false,
                    KeyCode::ArrowLeft => joypad.left = false,
                    KeyCode::ArrowRight => joypad.right = false,
                    KeyCode::ArrowUp => joypad.up = false,
                    KeyCode::ArrowDown => joypad.down = false,
                    KeyCode::Enter => joypad.start = false,
                    KeyCode::Tab => joypad.select = false,
                    _ => {}
                }
            }
            Event::WindowEvent {
                event:
                    WindowEvent::KeyboardInput {
                        event:
                            KeyEvent {
                                state: ElementState::Pressed,
                                physical_key: PhysicalKey::Code(keycode),
                                ..
                            },
                        ..
                    },
                ..
            } => {
                let mut joypad = joypad.write().unwrap();
                match keycode {
                    KeyCode::Escape => elwt.exit(),
                    KeyCode::KeyA => joypad.a = true,
                    KeyCode::KeyB => joypad.b = true,
                    KeyCode::ArrowLeft => joypad.left = true,
                    KeyCode::ArrowRight => joypad.right = true,
                    KeyCode::ArrowUp => joypad.up = true,
                    KeyCode::ArrowDown => joypad.down = true,
                    KeyCode::Enter => joypad.start = true,
                    KeyCode::Tab => joypad.select = true,
                    _ => {}
                }
            }
            Event::WindowEvent {
                event: WindowEvent::CloseRequested,
                ..
            } => elwt.exit(),
            _ => {}
        })
        .unwrap();
}
