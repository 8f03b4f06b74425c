// Standard controller ports ($4016/$4017 serial, auto-joypad)

use serde::{Deserialize, Serialize};

pub const NUM_PORTS: usize = 2;

/// Button masks for `Snes::set_input`.
pub mod button {
    pub const B: u16 = 0x0001;
    pub const Y: u16 = 0x0002;
    pub const SELECT: u16 = 0x0004;
    pub const START: u16 = 0x0008;
    pub const UP: u16 = 0x0010;
    pub const DOWN: u16 = 0x0020;
    pub const LEFT: u16 = 0x0040;
    pub const RIGHT: u16 = 0x0080;
    pub const A: u16 = 0x0100;
    pub const X: u16 = 0x0200;
    pub const L: u16 = 0x0400;
    pub const R: u16 = 0x0800;
    pub const ALL: u16 = 0x0FFF;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Controller {
    buttons: u16,
    shift_register: u16,
}

impl Controller {
    /// Buttons in shift-out order, 1 = pressed:
    ///   bit15..0 = B,Y,Select,Start,Up,Down,Left,Right,A,X,L,R,0,0,0,0
    /// The trailing zeros are the standard controller signature.
    pub fn report(&self) -> u16 {
        const ORDER: [u16; 12] = [
            button::B,
            button::Y,
            button::SELECT,
            button::START,
            button::UP,
            button::DOWN,
            button::LEFT,
            button::RIGHT,
            button::A,
            button::X,
            button::L,
            button::R,
        ];
        let mut report = 0;
        for (i, mask) in ORDER.iter().enumerate() {
            if self.buttons & mask != 0 {
                report |= 0x8000 >> i;
            }
        }
        report
    }

    pub fn buttons(&self) -> u16 {
        self.buttons
    }

    fn latch(&mut self) {
        self.shift_register = self.report();
    }

    fn shift_out(&mut self) -> u8 {
        let bit = (self.shift_register >> 15) as u8;
        // An exhausted pad keeps returning 1.
        self.shift_register = (self.shift_register << 1) | 1;
        bit
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    ports: [Controller; NUM_PORTS],
    strobe: bool,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_buttons(&mut self, port: usize, buttons: u16) {
        match self.ports.get_mut(port) {
            Some(pad) => {
                pad.buttons = buttons & button::ALL;
                if self.strobe {
                    pad.latch();
                }
            }
            None => log::debug!("ignoring input for port {}", port),
        }
    }

    pub fn buttons(&self, port: usize) -> u16 {
        self.ports.get(port).map_or(0, Controller::buttons)
    }

    /// $4016 write. While the strobe is high the pads keep reloading.
    pub fn write_strobe(&mut self, value: u8) {
        self.strobe = value & 0x01 != 0;
        if self.strobe {
            for pad in &mut self.ports {
                pad.latch();
            }
        }
    }

    /// One serial bit from $4016 (port 0) or $4017 (port 1).
    pub fn read_serial(&mut self, port: usize) -> u8 {
        let strobe = self.strobe;
        match self.ports.get_mut(port) {
            Some(pad) if strobe => (pad.buttons & button::B != 0) as u8,
            Some(pad) => pad.shift_out(),
            None => 0,
        }
    }

    /// Auto-joypad read at vblank start. The 16 clocks leave the serial
    /// registers exhausted, like a manual read of all bits would.
    pub fn auto_read(&mut self) -> [u16; NUM_PORTS] {
        let mut result = [0; NUM_PORTS];
        for (slot, pad) in result.iter_mut().zip(self.ports.iter_mut()) {
            *slot = pad.report();
            pad.shift_register = 0xFFFF;
        }
        result
    }
}
