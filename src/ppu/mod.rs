//! Picture processing unit.
//!
//! One `tick` is one dot. A line is 341 dots; dots 22..=277 output pixels
//! 0..=255. Line 0 is the pre-render line, lines 1..=224 are visible and
//! everything from line 225 to the end of the frame is vertical blank.

mod background;
mod registers;
mod renderer;
mod sprites;
mod window;


use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::cartridge::Region;
use crate::memory::MemoryBlock;
pub use sprites::ObjPixel;

pub const SCREEN_WIDTH: usize = 256;
pub const SCREEN_HEIGHT: usize = 224;
pub const DOTS_PER_LINE: u16 = 341;
pub const FIRST_ACTIVE_DOT: u16 = 22;
pub const LAST_ACTIVE_DOT: u16 = FIRST_ACTIVE_DOT + SCREEN_WIDTH as u16 - 1;
pub const LAST_VISIBLE_LINE: u16 = SCREEN_HEIGHT as u16;
pub const VBLANK_LINE: u16 = LAST_VISIBLE_LINE + 1;

pub const VRAM_SIZE: usize = 0x10000;
pub const CGRAM_SIZE: usize = 0x200;
pub const OAM_SIZE: usize = 0x220;

bitflags! {
    /// What happened during a dot, for the scheduler to act on.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PpuEvents: u8 {
        const HDMA_INIT = 0x01;
        const HDMA_LINE = 0x02;
        const VBLANK_START = 0x04;
        const VBLANK_END = 0x08;
        const FRAME_COMPLETE = 0x10;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Background {
    /// Word address of the tilemap.
    tilemap_base: u16,
    /// BGnSC bits 0-1: wide (64 columns), tall (64 rows).
    screen_size: u8,
    /// Word address of the character data.
    char_base: u16,
    hofs: u16,
    vofs: u16,
    tile16: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ppu {
    vram: MemoryBlock,
    cgram: MemoryBlock,
    oam: MemoryBlock,

    lines_per_frame: u16,
    line: u16,
    dot: u16,
    frame: u64,
    field: bool,

    forced_blank: bool,
    brightness: u8,
    obsel: u8,

    oam_reload: u16,
    oam_addr: u16,
    oam_latch: u8,
    obj_priority_rotation: bool,

    bg_mode: u8,
    bg3_priority: bool,
    mosaic_size: u8,
    mosaic_enable: u8,
    bgs: [Background; 4],
    bgofs_latch: u8,
    bghofs_latch: u8,

    vram_addr: u16,
    vmain: u8,
    vram_read_buffer: u16,

    m7sel: u8,
    /// A, B, C, D
    m7_matrix: [i16; 4],
    m7_center: [i16; 2],
    m7_hofs: i16,
    m7_vofs: i16,
    m7_latch: u8,

    cgram_addr: u8,
    cgram_high: bool,
    cgram_latch: u8,
    cgram_read_high: bool,

    /// W12SEL, W34SEL, WOBJSEL
    window_sel: [u8; 3],
    /// WH0-WH3
    window_pos: [u8; 4],
    /// WBGLOG, WOBJLOG
    window_logic: [u8; 2],
    tm: u8,
    ts: u8,
    tmw: u8,
    tsw: u8,
    cgwsel: u8,
    cgadsub: u8,
    fixed_color: u16,
    setini: u8,

    h_latch: u16,
    v_latch: u16,
    counters_latched: bool,
    ophct_high: bool,
    opvct_high: bool,
    range_over: bool,
    time_over: bool,

    obj_line: Vec<ObjPixel>,
    framebuffer: Vec<u32>,
}

impl Ppu {
    pub fn new(region: Region) -> Self {
        Self {
            vram: MemoryBlock::new(VRAM_SIZE),
            cgram: MemoryBlock::new(CGRAM_SIZE),
            oam: MemoryBlock::new(OAM_SIZE),
            lines_per_frame: region.lines_per_frame(),
            line: 0,
            dot: 0,
            frame: 0,
            field: false,
            forced_blank: true,
            brightness: 0,
            obsel: 0,
            oam_reload: 0,
            oam_addr: 0,
            oam_latch: 0,
            obj_priority_rotation: false,
            bg_mode: 0,
            bg3_priority: false,
            mosaic_size: 1,
            mosaic_enable: 0,
            bgs: [Background::default(); 4],
            bgofs_latch: 0,
            bghofs_latch: 0,
            vram_addr: 0,
            vmain: 0,
            vram_read_buffer: 0,
            m7sel: 0,
            m7_matrix: [0; 4],
            m7_center: [0; 2],
            m7_hofs: 0,
            m7_vofs: 0,
            m7_latch: 0,
            cgram_addr: 0,
            cgram_high: false,
            cgram_latch: 0,
            cgram_read_high: false,
            window_sel: [0; 3],
            window_pos: [0; 4],
            window_logic: [0; 2],
            tm: 0,
            ts: 0,
            tmw: 0,
            tsw: 0,
            cgwsel: 0,
            cgadsub: 0,
            fixed_color: 0,
            setini: 0,
            h_latch: 0,
            v_latch: 0,
            counters_latched: false,
            ophct_high: false,
            opvct_high: false,
            range_over: false,
            time_over: false,
            obj_line: vec![ObjPixel::default(); SCREEN_WIDTH],
            framebuffer: vec![0xFF00_0000; SCREEN_WIDTH * SCREEN_HEIGHT],
        }
    }

    /// Soft reset: registers and counters go back to power-on, video memory
    /// keeps its contents.
    pub fn reset(&mut self) {
        let vram = std::mem::replace(&mut self.vram, MemoryBlock::new(0));
        let cgram = std::mem::replace(&mut self.cgram, MemoryBlock::new(0));
        let oam = std::mem::replace(&mut self.oam, MemoryBlock::new(0));
        let region = if self.lines_per_frame == Region::Pal.lines_per_frame() {
            Region::Pal
        } else {
            Region::Ntsc
        };
        *self = Self::new(region);
        self.vram = vram;
        self.cgram = cgram;
        self.oam = oam;
    }

    /// Advances one dot.
    pub fn tick(&mut self) -> PpuEvents {
        let mut events = PpuEvents::empty();
        let line = self.line;
        let dot = self.dot;

        if dot == 0 {
            match line {
                0 => {
                    events |= PpuEvents::HDMA_INIT | PpuEvents::VBLANK_END;
                    self.range_over = false;
                    self.time_over = false;
                }
                1..=LAST_VISIBLE_LINE => {
                    events |= PpuEvents::HDMA_LINE;
                    self.evaluate_sprites(line - 1);
                }
                VBLANK_LINE => {
                    events |= PpuEvents::VBLANK_START;
                    if !self.forced_blank {
                        self.oam_addr = self.oam_reload << 1;
                    }
                }
                _ => {}
            }
        }

        if (1..=LAST_VISIBLE_LINE).contains(&line)
            && (FIRST_ACTIVE_DOT..=LAST_ACTIVE_DOT).contains(&dot)
        {
            self.render_pixel((dot - FIRST_ACTIVE_DOT) as usize, (line - 1) as usize);
        }

        self.dot += 1;
        if self.dot == DOTS_PER_LINE {
            self.dot = 0;
            self.line += 1;
            if self.line >= self.lines_per_frame {
                self.line = 0;
                self.frame += 1;
                self.field = !self.field;
                events |= PpuEvents::FRAME_COMPLETE;
            }
        }
        events
    }

    pub fn line(&self) -> u16 {
        self.line
    }

    pub fn dot(&self) -> u16 {
        self.dot
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    #[cfg(test)]
    pub(crate) fn set_position(&mut self, line: u16, dot: u16) {
        self.line = line;
        self.dot = dot;
    }

    pub fn lines_per_frame(&self) -> u16 {
        self.lines_per_frame
    }

    pub fn in_vblank(&self) -> bool {
        self.line >= VBLANK_LINE
    }

    pub fn in_hblank(&self) -> bool {
        self.dot < FIRST_ACTIVE_DOT || self.dot > LAST_ACTIVE_DOT
    }

    pub fn forced_blank(&self) -> bool {
        self.forced_blank
    }

    pub fn frame_buffer(&self) -> &[u32] {
        &self.framebuffer
    }

    pub fn vram(&self) -> &[u8] {
        &self.vram
    }

    pub fn cgram(&self) -> &[u8] {
        &self.cgram
    }

    pub fn oam(&self) -> &[u8] {
        &self.oam
    }

    /// STAT77 bits 6 (range over) and 7 (time over).
    pub fn sprite_overflow(&self) -> (bool, bool) {
        (self.range_over, self.time_over)
    }

    /// Buffer lengths as (name, found, expected), for state validation.
    pub fn buffer_sizes(&self) -> [(&'static str, usize, usize); 5] {
        [
            ("vram", self.vram.len(), VRAM_SIZE),
            ("cgram", self.cgram.len(), CGRAM_SIZE),
            ("oam", self.oam.len(), OAM_SIZE),
            ("framebuffer", self.framebuffer.len(), SCREEN_WIDTH * SCREEN_HEIGHT),
            ("obj_line", self.obj_line.len(), SCREEN_WIDTH),
        ]
    }

    #[inline]
    fn vram_word(&self, word_addr: u16) -> u16 {
        let i = ((word_addr & 0x7FFF) as usize) << 1;
        u16::from_le_bytes([self.vram[i], self.vram[i + 1]])
    }

    #[inline]
    fn cgram_color(&self, index: u8) -> u16 {
        let i = (index as usize) << 1;
        u16::from_le_bytes([self.cgram[i], self.cgram[i + 1]]) & 0x7FFF
    }
}
