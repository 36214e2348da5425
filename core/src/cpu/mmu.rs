//! Address decode across the 16-bit bus. Grounded on
//! `gebeh-core/src/cpu/mmu.rs`'s `Peripherals`/`MmuCpuExt` shape, harmonized into a
//! single borrowing `Bus` (no `Cpu` reference needed here: this design keeps
//! `hram`/`interrupt_enable` on `State` rather than `Cpu`, see DESIGN.md, and has no
//! boot ROM to gate).

use crate::apu::Apu;
use crate::dma::Dma;
use crate::joypad::Joypad;
use crate::mbc::Mbc;
use crate::ppu::{LcdControl, Ppu, PpuMode};
use crate::state::*;
use crate::timer::Timer;

pub struct Bus<'a, M: Mbc + ?Sized> {
    pub mbc: &'a mut M,
    pub state: &'a mut State,
    pub ppu: &'a mut Ppu,
    pub apu: &'a mut Apu,
    pub timer: &'a mut Timer,
    pub joypad: &'a mut Joypad,
    pub dma: &'a mut Dma,
}

impl<M: Mbc + ?Sized> Bus<'_, M> {
    pub fn read(&self, address: u16) -> u8 {
        match address {
            ..VIDEO_RAM => self.mbc.read(address),
            VIDEO_RAM..EXTERNAL_RAM => self.state.video_ram[usize::from(address - VIDEO_RAM)],
            EXTERNAL_RAM..WORK_RAM => self.mbc.read(address),
            WORK_RAM..ECHO_RAM => self.state.wram[usize::from(address - WORK_RAM)],
            ECHO_RAM..OAM => self.state.wram[usize::from(address - ECHO_RAM)],
            OAM..NOT_USABLE => {
                let blocked = matches!(self.ppu.get_mode(), PpuMode::Drawing | PpuMode::OamScan) || self.dma.is_active();
                if blocked {
                    0xFF
                } else {
                    self.state.oam[usize::from(address - OAM)]
                }
            }
            NOT_USABLE..JOYPAD => 0xFF,
            JOYPAD => self.joypad.get_register(),
            SB => self.state.sb,
            SC => self.state.sc.bits() | 0b0111_1110,
            0xFF03 => 0xFF,
            DIV => self.timer.get_div(),
            TIMER_COUNTER => self.timer.get_tima(),
            TIMER_MODULO => self.timer.get_tma(),
            TIMER_CONTROL => self.timer.get_tac(),
            0xFF08..INTERRUPT_FLAG => 0xFF,
            INTERRUPT_FLAG => self.state.interrupt_flag.bits() | 0b1110_0000,
            CH1_SWEEP..LCD_CONTROL => self.apu.read(address),
            LCD_CONTROL => self.ppu.get_lcd_control().bits(),
            LCD_STATUS => self.ppu.get_stat(),
            SCY => self.ppu.get_scy(),
            SCX => self.ppu.get_scx(),
            LY => self.ppu.get_ly(),
            LYC => self.ppu.get_lyc(),
            DMA => self.dma.get_register(),
            BGP => self.ppu.get_bgp(),
            OBP0 => self.ppu.get_obp0(),
            OBP1 => self.ppu.get_obp1(),
            WY => self.ppu.get_wy(),
            WX => self.ppu.get_wx(),
            0xFF4C..HRAM => 0xFF,
            HRAM..INTERRUPT_ENABLE => self.state.hram[usize::from(address - HRAM)],
            INTERRUPT_ENABLE => self.state.interrupt_enable.bits() | 0b1110_0000,
        }
    }

    pub fn write(&mut self, address: u16, value: u8) {
        if self.dma.is_active() && (OAM..NOT_USABLE).contains(&address) {
            return;
        }
        match address {
            ..VIDEO_RAM => self.mbc.write(address, value),
            VIDEO_RAM..EXTERNAL_RAM => self.state.video_ram[usize::from(address - VIDEO_RAM)] = value,
            EXTERNAL_RAM..WORK_RAM => self.mbc.write(address, value),
            WORK_RAM..ECHO_RAM => self.state.wram[usize::from(address - WORK_RAM)] = value,
            ECHO_RAM..OAM => self.state.wram[usize::from(address - ECHO_RAM)] = value,
            OAM..NOT_USABLE => {
                let blocked = matches!(self.ppu.get_mode(), PpuMode::Drawing | PpuMode::OamScan);
                if !blocked {
                    self.state.oam[usize::from(address - OAM)] = value;
                }
            }
            NOT_USABLE..JOYPAD => {}
            JOYPAD => self.joypad.set_register(value),
            SB => self.state.sb = value,
            SC => {
                self.state.sc = SerialControl::from_bits_truncate(value);
                if self.state.sc.contains(SerialControl::TRANSFER_START) {
                    log::info!("serial byte 0x{:02x}", self.state.sb);
                }
            }
            0xFF03 => {}
            // any write to DIV resets the internal counter, per the pandocs citation
            // `gebeh-core/src/cpu/mmu.rs` carries verbatim.
            DIV => self.timer.reset_system_counter(),
            TIMER_COUNTER => self.timer.set_tima(value),
            TIMER_MODULO => self.timer.set_tma(value),
            TIMER_CONTROL => self.timer.set_tac(value),
            0xFF08..INTERRUPT_FLAG => {}
            INTERRUPT_FLAG => self.state.interrupt_flag = Interruptions::from_bits_truncate(value),
            CH1_SWEEP..LCD_CONTROL => self.apu.write(address, value),
            LCD_CONTROL => self.ppu.set_lcd_control(LcdControl::from_bits_truncate(value)),
            LCD_STATUS => self.ppu.set_stat(value),
            SCY => self.ppu.set_scy(value),
            SCX => self.ppu.set_scx(value),
            LY => {}
            LYC => self.ppu.set_lyc(value),
            DMA => self.dma.start(value),
            BGP => self.ppu.set_bgp(value),
            OBP0 => self.ppu.set_obp0(value),
            OBP1 => self.ppu.set_obp1(value),
            WY => self.ppu.set_wy(value),
            WX => self.ppu.set_wx(value),
            0xFF4C..HRAM => {}
            HRAM..INTERRUPT_ENABLE => self.state.hram[usize::from(address - HRAM)] = value,
            INTERRUPT_ENABLE => self.state.interrupt_enable = Interruptions::from_bits_retain(value),
        }
    }

    pub fn read16(&self, address: u16) -> u16 {
        u16::from(self.read(address)) | (u16::from(self.read(address.wrapping_add(1))) << 8)
    }

    pub fn write16(&mut self, address: u16, value: u16) {
        self.write(address, (value & 0xFF) as u8);
        self.write(address.wrapping_add(1), (value >> 8) as u8);
    }
}
