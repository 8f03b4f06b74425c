// $2100-$213F register file

use super::{Ppu, VBLANK_LINE};
use crate::cartridge::Region;

/// Sign-extends the 13-bit mode 7 offsets and centre.
#[inline]
fn sext13(value: u16) -> i16 {
    ((value << 3) as i16) >> 3
}

impl Ppu {
    /// Current VRAM word address after VMAIN address translation.
    fn vram_remapped_addr(&self) -> u16 {
        let a = self.vram_addr;
        match (self.vmain >> 2) & 0x03 {
            0 => a,
            1 => (a & 0xFF00) | ((a & 0x001F) << 3) | ((a >> 5) & 0x07),
            2 => (a & 0xFE00) | ((a & 0x003F) << 3) | ((a >> 6) & 0x07),
            _ => (a & 0xFC00) | ((a & 0x007F) << 3) | ((a >> 7) & 0x07),
        }
    }

    fn vram_increment(&self) -> u16 {
        match self.vmain & 0x03 {
            0 => 1,
            1 => 32,
            _ => 128,
        }
    }

    fn increment_on_high(&self) -> bool {
        self.vmain & 0x80 != 0
    }

    fn prefetch_vram(&mut self) {
        self.vram_read_buffer = self.vram_word(self.vram_remapped_addr());
    }

    fn write_vram_byte(&mut self, high: bool, value: u8) {
        let i = ((self.vram_remapped_addr() & 0x7FFF) as usize) << 1;
        self.vram[i + high as usize] = value;
        if high == self.increment_on_high() {
            self.vram_addr = self.vram_addr.wrapping_add(self.vram_increment());
        }
    }

    fn read_vram_byte(&mut self, high: bool) -> u8 {
        let value = if high {
            (self.vram_read_buffer >> 8) as u8
        } else {
            self.vram_read_buffer as u8
        };
        if high == self.increment_on_high() {
            self.vram_addr = self.vram_addr.wrapping_add(self.vram_increment());
            self.prefetch_vram();
        }
        value
    }

    fn oam_index(&self) -> usize {
        if self.oam_addr < 0x200 {
            self.oam_addr as usize
        } else {
            0x200 | (self.oam_addr & 0x1F) as usize
        }
    }

    fn write_oam(&mut self, value: u8) {
        let addr = self.oam_addr;
        if addr < 0x200 {
            if addr & 1 == 0 {
                self.oam_latch = value;
            } else {
                let i = addr as usize;
                self.oam[i - 1] = self.oam_latch;
                self.oam[i] = value;
            }
        } else {
            let i = self.oam_index();
            self.oam[i] = value;
        }
        self.oam_addr = (addr + 1) & 0x3FF;
    }

    fn read_oam(&mut self) -> u8 {
        let value = self.oam[self.oam_index()];
        self.oam_addr = (self.oam_addr + 1) & 0x3FF;
        value
    }

    fn write_cgram(&mut self, value: u8) {
        if !self.cgram_high {
            self.cgram_latch = value;
        } else {
            let i = (self.cgram_addr as usize) << 1;
            self.cgram[i] = self.cgram_latch;
            self.cgram[i + 1] = value & 0x7F;
            self.cgram_addr = self.cgram_addr.wrapping_add(1);
        }
        self.cgram_high = !self.cgram_high;
    }

    fn read_cgram(&mut self) -> u8 {
        let i = (self.cgram_addr as usize) << 1;
        let value = if !self.cgram_read_high {
            self.cgram[i]
        } else {
            let v = self.cgram[i + 1] & 0x7F;
            self.cgram_addr = self.cgram_addr.wrapping_add(1);
            v
        };
        self.cgram_read_high = !self.cgram_read_high;
        value
    }

    fn write_bg_hofs(&mut self, bg: usize, value: u8) {
        let hofs = ((value as u16) << 8)
            | (self.bgofs_latch & !7) as u16
            | (self.bghofs_latch & 7) as u16;
        self.bgs[bg].hofs = hofs & 0x3FF;
        self.bgofs_latch = value;
        self.bghofs_latch = value;
    }

    fn write_bg_vofs(&mut self, bg: usize, value: u8) {
        self.bgs[bg].vofs = (((value as u16) << 8) | self.bgofs_latch as u16) & 0x3FF;
        self.bgofs_latch = value;
    }

    /// Shared write-twice latch of the mode 7 registers.
    fn m7_word(&mut self, value: u8) -> u16 {
        let word = ((value as u16) << 8) | self.m7_latch as u16;
        self.m7_latch = value;
        word
    }

    /// Latches the H/V counters, as a $2137 read or a WRIO 1->0 edge does.
    pub fn latch_counters(&mut self) {
        self.h_latch = self.dot;
        self.v_latch = self.line;
        self.counters_latched = true;
    }

    pub fn write_register(&mut self, addr: u16, value: u8) {
        match addr {
            0x2100 => {
                self.forced_blank = value & 0x80 != 0;
                self.brightness = value & 0x0F;
            }
            0x2101 => self.obsel = value,
            0x2102 => {
                self.oam_reload = (self.oam_reload & 0x100) | value as u16;
                self.oam_addr = self.oam_reload << 1;
            }
            0x2103 => {
                self.oam_reload = (self.oam_reload & 0x0FF) | (((value & 1) as u16) << 8);
                self.obj_priority_rotation = value & 0x80 != 0;
                self.oam_addr = self.oam_reload << 1;
            }
            0x2104 => self.write_oam(value),
            0x2105 => {
                self.bg_mode = value & 0x07;
                self.bg3_priority = value & 0x08 != 0;
                for (i, bg) in self.bgs.iter_mut().enumerate() {
                    bg.tile16 = value & (0x10 << i) != 0;
                }
            }
            0x2106 => {
                self.mosaic_size = (value >> 4) + 1;
                self.mosaic_enable = value & 0x0F;
            }
            0x2107..=0x210A => {
                let bg = &mut self.bgs[(addr - 0x2107) as usize];
                bg.tilemap_base = ((value & 0xFC) as u16) << 8;
                bg.screen_size = value & 0x03;
            }
            0x210B => {
                self.bgs[0].char_base = ((value & 0x0F) as u16) << 12;
                self.bgs[1].char_base = ((value >> 4) as u16) << 12;
            }
            0x210C => {
                self.bgs[2].char_base = ((value & 0x0F) as u16) << 12;
                self.bgs[3].char_base = ((value >> 4) as u16) << 12;
            }
            0x210D..=0x2114 => {
                let bg = ((addr - 0x210D) >> 1) as usize;
                if bg == 0 {
                    // BG1 scroll doubles as the mode 7 scroll.
                    let word = self.m7_word(value);
                    if addr == 0x210D {
                        self.m7_hofs = sext13(word);
                    } else {
                        self.m7_vofs = sext13(word);
                    }
                }
                if addr & 1 == 1 {
                    self.write_bg_hofs(bg, value);
                } else {
                    self.write_bg_vofs(bg, value);
                }
            }
            0x2115 => self.vmain = value,
            0x2116 => {
                self.vram_addr = (self.vram_addr & 0xFF00) | value as u16;
                self.prefetch_vram();
            }
            0x2117 => {
                self.vram_addr = (self.vram_addr & 0x00FF) | ((value as u16) << 8);
                self.prefetch_vram();
            }
            0x2118 => self.write_vram_byte(false, value),
            0x2119 => self.write_vram_byte(true, value),
            0x211A => self.m7sel = value,
            0x211B..=0x211E => {
                let word = self.m7_word(value);
                self.m7_matrix[(addr - 0x211B) as usize] = word as i16;
            }
            0x211F => {
                let word = self.m7_word(value);
                self.m7_center[0] = sext13(word);
            }
            0x2120 => {
                let word = self.m7_word(value);
                self.m7_center[1] = sext13(word);
            }
            0x2121 => {
                self.cgram_addr = value;
                self.cgram_high = false;
                self.cgram_read_high = false;
            }
            0x2122 => self.write_cgram(value),
            0x2123..=0x2125 => self.window_sel[(addr - 0x2123) as usize] = value,
            0x2126..=0x2129 => self.window_pos[(addr - 0x2126) as usize] = value,
            0x212A | 0x212B => self.window_logic[(addr - 0x212A) as usize] = value,
            0x212C => self.tm = value & 0x1F,
            0x212D => self.ts = value & 0x1F,
            0x212E => self.tmw = value & 0x1F,
            0x212F => self.tsw = value & 0x1F,
            0x2130 => self.cgwsel = value,
            0x2131 => self.cgadsub = value,
            0x2132 => {
                let intensity = (value & 0x1F) as u16;
                if value & 0x20 != 0 {
                    self.fixed_color = (self.fixed_color & !0x001F) | intensity;
                }
                if value & 0x40 != 0 {
                    self.fixed_color = (self.fixed_color & !0x03E0) | (intensity << 5);
                }
                if value & 0x80 != 0 {
                    self.fixed_color = (self.fixed_color & !0x7C00) | (intensity << 10);
                }
            }
            0x2133 => self.setini = value,
            _ => log::trace!("write to read-only PPU register ${:04X} = {:02X}", addr, value),
        }
    }

    /// Register read. `None` means the register is write-only and the bus
    /// should return open bus.
    pub fn read_register(&mut self, addr: u16) -> Option<u8> {
        let value = match addr {
            0x2134..=0x2136 => {
                let product = self.m7_matrix[0] as i32 * ((self.m7_matrix[1] >> 8) as i8) as i32;
                (product >> ((addr - 0x2134) * 8)) as u8
            }
            0x2138 => self.read_oam(),
            0x2139 => self.read_vram_byte(false),
            0x213A => self.read_vram_byte(true),
            0x213B => self.read_cgram(),
            0x213C => {
                let v = if self.ophct_high {
                    ((self.h_latch >> 8) & 1) as u8
                } else {
                    self.h_latch as u8
                };
                self.ophct_high = !self.ophct_high;
                v
            }
            0x213D => {
                let v = if self.opvct_high {
                    ((self.v_latch >> 8) & 1) as u8
                } else {
                    self.v_latch as u8
                };
                self.opvct_high = !self.opvct_high;
                v
            }
            0x213E => ((self.time_over as u8) << 7) | ((self.range_over as u8) << 6) | 0x01,
            0x213F => {
                let pal = self.lines_per_frame == Region::Pal.lines_per_frame();
                let v = ((self.field as u8) << 7)
                    | ((self.counters_latched as u8) << 6)
                    | ((pal as u8) << 4)
                    | 0x03;
                self.counters_latched = false;
                self.ophct_high = false;
                self.opvct_high = false;
                v
            }
            _ => return None,
        };
        Some(value)
    }

    /// True while VRAM is reachable without conflicting with rendering.
    pub fn vram_accessible(&self) -> bool {
        self.forced_blank || self.line >= VBLANK_LINE
    }
}
