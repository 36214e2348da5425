//! Column-selected button matrix. Selection/readback ported from
//! `gebeh-core/src/joypad.rs`; press-edge interrupt requesting is new (absent from
//! the teacher, required by `spec.md` §4.6 — see DESIGN.md).

use bitflags::bitflags;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct JoypadFlags: u8 {
        const SELECT_BUTTONS = 0b0010_0000;
        const SELECT_DPAD    = 0b0001_0000;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct JoypadInput {
    pub a: bool,
    pub b: bool,
    pub select: bool,
    pub start: bool,
    pub right: bool,
    pub left: bool,
    pub up: bool,
    pub down: bool,
}

impl JoypadInput {
    fn buttons_nibble(self) -> u8 {
        (!self.a as u8) | ((!self.b as u8) << 1) | ((!self.select as u8) << 2) | ((!self.start as u8) << 3)
    }

    fn dpad_nibble(self) -> u8 {
        (!self.right as u8) | ((!self.left as u8) << 1) | ((!self.up as u8) << 2) | ((!self.down as u8) << 3)
    }
}

pub struct Joypad {
    input: JoypadInput,
    select_buttons: bool,
    select_dpad: bool,
    requested_interrupt: bool,
}

impl Default for Joypad {
    fn default() -> Self {
        Joypad {
            input: JoypadInput::default(),
            select_buttons: false,
            select_dpad: false,
            requested_interrupt: false,
        }
    }
}

impl Joypad {
    pub fn get_register(&self) -> u8 {
        let mut selection = 0b0011_0000;
        let mut nibble = 0x0F;
        if self.select_buttons {
            selection &= !0b0010_0000;
            nibble &= self.input.buttons_nibble();
        }
        if self.select_dpad {
            selection &= !0b0001_0000;
            nibble &= self.input.dpad_nibble();
        }
        0b1100_0000 | selection | nibble
    }

    pub fn set_register(&mut self, value: u8) {
        self.select_buttons = value & JoypadFlags::SELECT_BUTTONS.bits() == 0;
        self.select_dpad = value & JoypadFlags::SELECT_DPAD.bits() == 0;
    }

    /// Replaces the live input state, requesting the joypad interrupt for any bit
    /// that transitions released -> pressed within the currently selected row(s).
    pub fn set_input(&mut self, new_input: JoypadInput) {
        let before = self.get_register() & 0x0F;
        self.input = new_input;
        let after = self.get_register() & 0x0F;
        // a bit going 1 -> 0 is a release->press transition (negative logic).
        if before & !after != 0 {
            self.requested_interrupt = true;
        }
    }

    pub fn take_requested_interrupt(&mut self) -> bool {
        core::mem::take(&mut self.requested_interrupt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unselected_reads_all_high() {
        let joypad = Joypad::default();
        assert_eq!(joypad.get_register(), 0xFF);
    }

    #[test]
    fn pressed_button_reads_as_zero_bit() {
        let mut joypad = Joypad::default();
        joypad.set_register(0b1101_1111); // select buttons (bit5=0)
        joypad.set_input(JoypadInput {
            a: true,
            ..Default::default()
        });
        assert_eq!(joypad.get_register() & 0x01, 0);
    }

    #[test]
    fn press_edge_requests_interrupt() {
        let mut joypad = Joypad::default();
        joypad.set_register(0b1110_1111); // select dpad (bit4=0)
        assert!(!joypad.take_requested_interrupt());
        joypad.set_input(JoypadInput {
            down: true,
            ..Default::default()
        });
        assert!(joypad.take_requested_interrupt());
        assert!(!joypad.take_requested_interrupt());
    }
}
