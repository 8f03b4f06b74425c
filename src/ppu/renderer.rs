//! Per-pixel compositing: layer priority, main/sub screens, colour math
//! and master brightness.

use super::background::BgPixel;
use super::window::{WINDOW_COLOR, WINDOW_OBJ};
use super::{Ppu, SCREEN_WIDTH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    /// Background index and the tile priority bit it matches.
    Bg(usize, bool),
    /// OBJ priority level.
    Obj(u8),
}

use Slot::{Bg, Obj};

#[rustfmt::skip]
const MODE0: &[Slot] = &[
    Obj(3), Bg(0, true), Bg(1, true), Obj(2), Bg(0, false), Bg(1, false),
    Obj(1), Bg(2, true), Bg(3, true), Obj(0), Bg(2, false), Bg(3, false),
];
#[rustfmt::skip]
const MODE1: &[Slot] = &[
    Obj(3), Bg(0, true), Bg(1, true), Obj(2), Bg(0, false), Bg(1, false),
    Obj(1), Bg(2, true), Obj(0), Bg(2, false),
];
#[rustfmt::skip]
const MODE1_BG3_HIGH: &[Slot] = &[
    Bg(2, true), Obj(3), Bg(0, true), Bg(1, true), Obj(2), Bg(0, false),
    Bg(1, false), Obj(1), Obj(0), Bg(2, false),
];
#[rustfmt::skip]
const MODE2_TO_5: &[Slot] = &[
    Obj(3), Bg(0, true), Obj(2), Bg(1, true), Obj(1), Bg(0, false), Obj(0), Bg(1, false),
];
const MODE6: &[Slot] = &[Obj(3), Bg(0, true), Obj(2), Obj(1), Bg(0, false), Obj(0)];
const MODE7: &[Slot] = &[Obj(3), Obj(2), Obj(1), Bg(0, false), Obj(0)];
#[rustfmt::skip]
const MODE7_EXTBG: &[Slot] = &[
    Obj(3), Obj(2), Bg(1, true), Obj(1), Bg(0, false), Obj(0), Bg(1, false),
];

const LAYER_OBJ: u8 = 0x10;
const LAYER_BACKDROP: u8 = 0x20;

/// A resolved screen pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Surface {
    color: u16,
    /// CGADSUB bit of the source layer.
    layer: u8,
    math: bool,
}

/// BGR555 to ARGB8888 with master brightness 0-15. Level 0 is black.
pub(super) fn to_argb(color: u16, brightness: u8) -> u32 {
    if brightness == 0 {
        return 0xFF00_0000;
    }
    let scale = |c: u16| -> u32 {
        let c = (c as u32 & 0x1F) * (brightness as u32 + 1) / 16;
        (c << 3) | (c >> 2)
    };
    let r = scale(color);
    let g = scale(color >> 5);
    let b = scale(color >> 10);
    0xFF00_0000 | (r << 16) | (g << 8) | b
}

/// 5-bit per channel add or subtract; halving happens before clamping.
pub(super) fn blend(main: u16, sub: u16, subtract: bool, halve: bool) -> u16 {
    let mut out = 0;
    for shift in [0, 5, 10] {
        let a = (main >> shift) & 0x1F;
        let b = (sub >> shift) & 0x1F;
        let c = if subtract {
            let d = a.saturating_sub(b);
            if halve {
                d >> 1
            } else {
                d
            }
        } else if halve {
            (a + b) >> 1
        } else {
            (a + b).min(31)
        };
        out |= c << shift;
    }
    out
}

impl Ppu {
    fn priority_order(&self) -> &'static [Slot] {
        match self.bg_mode {
            0 => MODE0,
            1 if self.bg3_priority => MODE1_BG3_HIGH,
            1 => MODE1,
            2..=5 => MODE2_TO_5,
            6 => MODE6,
            _ if self.setini & 0x40 != 0 => MODE7_EXTBG,
            _ => MODE7,
        }
    }

    /// Front-most visible pixel of one screen, `None` if every enabled
    /// layer is transparent or masked.
    fn top_surface(
        &self,
        bgs: &[Option<BgPixel>; 4],
        x: u8,
        enabled: u8,
        windowed: u8,
    ) -> Option<Surface> {
        let obj = self.obj_pixel(x as usize);
        let visible = |layer: usize| {
            let bit = 1u8 << layer;
            enabled & bit != 0 && !(windowed & bit != 0 && self.window_masked(layer, x))
        };

        for slot in self.priority_order() {
            match *slot {
                Bg(bg, high) => {
                    let Some(pixel) = bgs[bg] else { continue };
                    if pixel.priority != high {
                        continue;
                    }
                    if visible(bg) {
                        return Some(Surface {
                            color: pixel.color,
                            layer: 1 << bg,
                            math: true,
                        });
                    }
                }
                Obj(level) => {
                    let Some(pixel) = obj else { continue };
                    if pixel.priority == level && visible(WINDOW_OBJ) {
                        return Some(Surface {
                            color: pixel.color,
                            layer: LAYER_OBJ,
                            math: pixel.math,
                        });
                    }
                }
            }
        }
        None
    }

    fn compose(&self, x: usize, y: usize) -> u16 {
        let xb = x as u8;
        let layers = self.tm | self.ts;
        let mut bgs = [None; 4];
        for (bg, slot) in bgs.iter_mut().enumerate() {
            if layers & (1 << bg) != 0 {
                *slot = self.bg_pixel(bg, x as u16, y as u16);
            }
        }

        let main = self
            .top_surface(&bgs, xb, self.tm, self.tmw)
            .unwrap_or(Surface {
                color: self.cgram_color(0),
                layer: LAYER_BACKDROP,
                math: true,
            });

        let in_color_window = self.window_masked(WINDOW_COLOR, xb);
        let clip = match (self.cgwsel >> 6) & 0x03 {
            0 => false,
            1 => !in_color_window,
            2 => in_color_window,
            _ => true,
        };
        let math_allowed = match (self.cgwsel >> 4) & 0x03 {
            0 => true,
            1 => in_color_window,
            2 => !in_color_window,
            _ => false,
        };
        let main_color = if clip { 0 } else { main.color };

        if !math_allowed || !main.math || self.cgadsub & main.layer == 0 {
            return main_color;
        }

        let (addend, sub_transparent) = if self.cgwsel & 0x02 != 0 {
            match self.top_surface(&bgs, xb, self.ts, self.tsw) {
                Some(sub) => (sub.color, false),
                None => (self.fixed_color, true),
            }
        } else {
            (self.fixed_color, false)
        };
        let subtract = self.cgadsub & 0x80 != 0;
        let halve = self.cgadsub & 0x40 != 0 && !clip && !sub_transparent;
        blend(main_color, addend, subtract, halve)
    }

    pub(super) fn render_pixel(&mut self, x: usize, y: usize) {
        let argb = if self.forced_blank {
            0xFF00_0000
        } else {
            to_argb(self.compose(x, y), self.brightness)
        };
        self.framebuffer[y * SCREEN_WIDTH + x] = argb;
    }
}
