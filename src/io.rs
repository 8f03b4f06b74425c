//! CPU-side I/O block at $4200-$421F: interrupt enables, math unit, H/V
//! timer, RDNMI/TIMEUP/HVBJOY and the auto-joypad result registers.
//! $420B/$420C live in the DMA controller.

use serde::{Deserialize, Serialize};

use crate::input::Input;

/// Dots the auto-joypad read keeps HVBJOY bit 0 set for.
const AUTO_JOY_BUSY_DOTS: u16 = 1056;

const CPU_VERSION: u8 = 0x02;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuIo {
    nmitimen: u8,
    wrio: u8,
    wrmpya: u8,
    dividend: u16,
    htime: u16,
    vtime: u16,
    memsel: u8,
    rddiv: u16,
    rdmpy: u16,
    nmi_flag: bool,
    timeup: bool,
    nmi_request: bool,
    joy: [u16; 4],
    auto_joy_busy: u16,
}

impl Default for CpuIo {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuIo {
    pub fn new() -> Self {
        Self {
            nmitimen: 0,
            wrio: 0xFF,
            wrmpya: 0xFF,
            dividend: 0xFFFF,
            htime: 0x1FF,
            vtime: 0x1FF,
            memsel: 0,
            rddiv: 0,
            rdmpy: 0,
            nmi_flag: false,
            timeup: false,
            nmi_request: false,
            joy: [0; 4],
            auto_joy_busy: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn nmi_enabled(&self) -> bool {
        self.nmitimen & 0x80 != 0
    }

    pub fn wrio(&self) -> u8 {
        self.wrio
    }

    pub fn fast_rom(&self) -> bool {
        self.memsel & 0x01 != 0
    }

    /// Level of the CPU IRQ line.
    pub fn irq_asserted(&self) -> bool {
        self.timeup
    }

    /// Consumes a pending NMI edge.
    pub fn take_nmi_request(&mut self) -> bool {
        std::mem::take(&mut self.nmi_request)
    }

    pub fn auto_joy_busy(&self) -> bool {
        self.auto_joy_busy > 0
    }

    /// Called once per dot.
    pub fn tick(&mut self, line: u16, dot: u16) {
        self.auto_joy_busy = self.auto_joy_busy.saturating_sub(1);
        let hit = match (self.nmitimen >> 4) & 0x03 {
            0 => false,
            1 => dot == self.htime,
            2 => line == self.vtime && dot == 0,
            _ => line == self.vtime && dot == self.htime,
        };
        if hit {
            self.timeup = true;
        }
    }

    pub fn start_vblank(&mut self, input: &mut Input) {
        self.nmi_flag = true;
        if self.nmi_enabled() {
            self.nmi_request = true;
        }
        if self.nmitimen & 0x01 != 0 {
            let [pad1, pad2] = input.auto_read();
            self.joy = [pad1, pad2, 0, 0];
            self.auto_joy_busy = AUTO_JOY_BUSY_DOTS;
        }
    }

    pub fn end_vblank(&mut self) {
        self.nmi_flag = false;
    }

    /// HVBJOY is assembled by the bus, which knows the PPU position.
    pub fn hvbjoy(&self, vblank: bool, hblank: bool, open_bus: u8) -> u8 {
        ((vblank as u8) << 7)
            | ((hblank as u8) << 6)
            | (open_bus & 0x3E)
            | self.auto_joy_busy() as u8
    }

    /// Register read. `None` for write-only registers, which read as open bus.
    pub fn read(&mut self, addr: u16, open_bus: u8) -> Option<u8> {
        let value = match addr {
            0x4210 => {
                let v = ((self.nmi_flag as u8) << 7) | (open_bus & 0x70) | CPU_VERSION;
                self.nmi_flag = false;
                v
            }
            0x4211 => {
                let v = ((self.timeup as u8) << 7) | (open_bus & 0x7F);
                self.timeup = false;
                v
            }
            0x4213 => self.wrio,
            0x4214 => self.rddiv as u8,
            0x4215 => (self.rddiv >> 8) as u8,
            0x4216 => self.rdmpy as u8,
            0x4217 => (self.rdmpy >> 8) as u8,
            0x4218..=0x421F => {
                let pad = self.joy[((addr - 0x4218) >> 1) as usize];
                if addr & 1 == 0 {
                    pad as u8
                } else {
                    (pad >> 8) as u8
                }
            }
            _ => return None,
        };
        Some(value)
    }

    pub fn write(&mut self, addr: u16, value: u8) {
        match addr {
            0x4200 => {
                let was_enabled = self.nmi_enabled();
                self.nmitimen = value;
                if !was_enabled && self.nmi_enabled() && self.nmi_flag {
                    self.nmi_request = true;
                }
                if value & 0x30 == 0 {
                    self.timeup = false;
                }
            }
            0x4201 => self.wrio = value,
            0x4202 => self.wrmpya = value,
            0x4203 => {
                self.rdmpy = self.wrmpya as u16 * value as u16;
                self.rddiv = value as u16;
            }
            0x4204 => self.dividend = (self.dividend & 0xFF00) | value as u16,
            0x4205 => self.dividend = (self.dividend & 0x00FF) | ((value as u16) << 8),
            0x4206 => {
                if value == 0 {
                    self.rddiv = 0xFFFF;
                    self.rdmpy = self.dividend;
                } else {
                    self.rddiv = self.dividend / value as u16;
                    self.rdmpy = self.dividend % value as u16;
                }
            }
            0x4207 => self.htime = (self.htime & 0x100) | value as u16,
            0x4208 => self.htime = (self.htime & 0x0FF) | (((value & 1) as u16) << 8),
            0x4209 => self.vtime = (self.vtime & 0x100) | value as u16,
            0x420A => self.vtime = (self.vtime & 0x0FF) | (((value & 1) as u16) << 8),
            0x420D => self.memsel = value,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiply_unsigned() {
        let mut io = CpuIo::new();
        io.write(0x4202, 0xFF);
        io.write(0x4203, 0xFE);
        assert_eq!(io.read(0x4216, 0), Some(0x02));
        assert_eq!(io.read(0x4217, 0), Some(0xFD));
        assert_eq!(io.read(0x4214, 0), Some(0xFE));
    }

    #[test]
    fn divide_and_divide_by_zero() {
        let mut io = CpuIo::new();
        io.write(0x4204, 0x39);
        io.write(0x4205, 0x30);
        io.write(0x4206, 0x10);
        // 0x3039 = 12345; /16 = 771 r 9
        assert_eq!(io.read(0x4214, 0), Some(0x03));
        assert_eq!(io.read(0x4215, 0), Some(0x03));
        assert_eq!(io.read(0x4216, 0), Some(0x09));

        io.write(0x4206, 0);
        assert_eq!(io.read(0x4214, 0), Some(0xFF));
        assert_eq!(io.read(0x4215, 0), Some(0xFF));
        assert_eq!(io.read(0x4216, 0), Some(0x39));
        assert_eq!(io.read(0x4217, 0), Some(0x30));
    }

    #[test]
    fn rdnmi_clears_on_read_and_reports_version() {
        let mut io = CpuIo::new();
        let mut input = Input::new();
        io.start_vblank(&mut input);
        assert_eq!(io.read(0x4210, 0), Some(0x82));
        assert_eq!(io.read(0x4210, 0), Some(0x02));
        // No NMI without NMITIMEN bit 7.
        assert!(!io.take_nmi_request());
    }

    #[test]
    fn enabling_nmi_inside_vblank_fires_immediately() {
        let mut io = CpuIo::new();
        let mut input = Input::new();
        io.start_vblank(&mut input);
        io.write(0x4200, 0x80);
        assert!(io.take_nmi_request());
        assert!(!io.take_nmi_request());
    }

    #[test]
    fn h_timer_raises_timeup_until_read() {
        let mut io = CpuIo::new();
        io.write(0x4207, 100);
        io.write(0x4208, 0);
        io.write(0x4200, 0x10);
        io.tick(5, 99);
        assert!(!io.irq_asserted());
        io.tick(5, 100);
        assert!(io.irq_asserted());
        assert_eq!(io.read(0x4211, 0), Some(0x80));
        assert!(!io.irq_asserted());
    }

    #[test]
    fn hv_timer_needs_both() {
        let mut io = CpuIo::new();
        io.write(0x4207, 10);
        io.write(0x4208, 0);
        io.write(0x4209, 20);
        io.write(0x420A, 0);
        io.write(0x4200, 0x30);
        io.tick(19, 10);
        assert!(!io.irq_asserted());
        io.tick(20, 10);
        assert!(io.irq_asserted());
    }

    #[test]
    fn auto_joypad_fills_joy_registers() {
        let mut io = CpuIo::new();
        let mut input = Input::new();
        input.set_buttons(0, crate::input::button::B | crate::input::button::A);
        io.write(0x4200, 0x01);
        io.start_vblank(&mut input);
        assert!(io.auto_joy_busy());
        assert_eq!(io.read(0x4218, 0), Some(0x80));
        assert_eq!(io.read(0x4219, 0), Some(0x80));
        assert_eq!(io.read(0x421A, 0), Some(0x00));
        for _ in 0..AUTO_JOY_BUSY_DOTS {
            io.tick(225, 0);
        }
        assert!(!io.auto_joy_busy());
    }

    #[test]
    fn write_only_registers_are_open_bus() {
        let mut io = CpuIo::new();
        assert_eq!(io.read(0x4200, 0x5A), None);
        assert_eq!(io.read(0x420D, 0x5A), None);
    }
}
