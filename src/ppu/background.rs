//! Background layer fetches for modes 0-6 and the mode 7 affine plane.

use super::Ppu;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct BgPixel {
    /// BGR555
    pub color: u16,
    pub priority: bool,
}

/// Bits per pixel of `bg` in `mode`, `None` if the layer does not exist.
pub(super) fn bg_bpp(mode: u8, bg: usize) -> Option<u8> {
    match (mode, bg) {
        (0, 0..=3) => Some(2),
        (1, 0 | 1) => Some(4),
        (1, 2) => Some(2),
        (2, 0 | 1) => Some(4),
        (3, 0) => Some(8),
        (3, 1) => Some(4),
        (4, 0) => Some(8),
        (4, 1) => Some(2),
        (5, 0) => Some(4),
        (5, 1) => Some(2),
        (6, 0) => Some(4),
        _ => None,
    }
}

/// 8bpp colour index plus palette bits mapped straight to BGR555.
pub(super) fn direct_color(color: u8, palette: u8) -> u16 {
    let c = color as u16;
    let p = palette as u16;
    let r = ((c & 0x07) << 2) | ((p & 0x01) << 1);
    let g = (((c >> 3) & 0x07) << 2) | (p & 0x02);
    let b = (((c >> 6) & 0x03) << 3) | (((p >> 2) & 0x01) << 2);
    r | (g << 5) | (b << 10)
}

impl Ppu {
    /// Pixel of background `bg` at screen position (x, y), `None` when
    /// transparent or the layer is absent in the current mode.
    pub(super) fn bg_pixel(&self, bg: usize, x: u16, y: u16) -> Option<BgPixel> {
        if self.bg_mode == 7 {
            return match bg {
                0 => self.mode7_pixel(x, y, false),
                1 if self.setini & 0x40 != 0 => self.mode7_pixel(x, y, true),
                _ => None,
            };
        }
        let bpp = bg_bpp(self.bg_mode, bg)?;
        let layer = &self.bgs[bg];

        let (mut x, mut y) = (x, y);
        if self.mosaic_enable & (1 << bg) != 0 && self.mosaic_size > 1 {
            let size = self.mosaic_size as u16;
            x -= x % size;
            y -= y % size;
        }

        let hires = matches!(self.bg_mode, 5 | 6);
        if hires {
            x <<= 1;
        }
        let tile_w: u16 = if layer.tile16 || hires { 16 } else { 8 };
        let tile_h: u16 = if layer.tile16 { 16 } else { 8 };

        let px = x.wrapping_add(layer.hofs) & 0x3FF;
        let py = y.wrapping_add(layer.vofs) & 0x3FF;
        let col = px / tile_w;
        let row = py / tile_h;

        let wide = layer.screen_size & 0x01 != 0;
        let tall = layer.screen_size & 0x02 != 0;
        let mut map_addr = layer
            .tilemap_base
            .wrapping_add((row & 31) * 32 + (col & 31));
        if wide && col & 32 != 0 {
            map_addr = map_addr.wrapping_add(0x400);
        }
        if tall && row & 32 != 0 {
            map_addr = map_addr.wrapping_add(if wide { 0x800 } else { 0x400 });
        }

        let entry = self.vram_word(map_addr);
        let mut tile = entry & 0x03FF;
        let palette = ((entry >> 10) & 0x07) as u8;
        let priority = entry & 0x2000 != 0;

        let mut fx = px % tile_w;
        let mut fy = py % tile_h;
        if entry & 0x4000 != 0 {
            fx = tile_w - 1 - fx;
        }
        if entry & 0x8000 != 0 {
            fy = tile_h - 1 - fy;
        }
        if fx >= 8 {
            tile += 1;
        }
        if fy >= 8 {
            tile += 16;
        }

        let color = self.tile_color(layer.char_base, tile & 0x03FF, bpp, fx & 7, fy & 7);
        if color == 0 {
            return None;
        }

        let rgb = match bpp {
            2 => {
                let base = if self.bg_mode == 0 { bg as u8 * 32 } else { 0 };
                self.cgram_color(base + palette * 4 + color)
            }
            4 => self.cgram_color(palette * 16 + color),
            _ if self.cgwsel & 0x01 != 0 => direct_color(color, palette),
            _ => self.cgram_color(color),
        };
        Some(BgPixel {
            color: rgb,
            priority,
        })
    }

    /// Planar tile decode: bitplane pairs are interleaved within a word and
    /// successive pairs sit 8 words apart.
    fn tile_color(&self, char_base: u16, tile: u16, bpp: u8, fx: u16, fy: u16) -> u8 {
        let words_per_tile = bpp as u16 * 4;
        let row_addr = char_base
            .wrapping_add(tile.wrapping_mul(words_per_tile))
            .wrapping_add(fy);
        let shift = 7 - fx;
        let mut color = 0u8;
        for pair in 0..(bpp / 2) as u16 {
            let word = self.vram_word(row_addr.wrapping_add(pair * 8));
            color |= (((word >> shift) & 1) as u8) << (pair * 2);
            color |= (((word >> (8 + shift)) & 1) as u8) << (pair * 2 + 1);
        }
        color
    }

    fn mode7_pixel(&self, x: u16, y: u16, extbg: bool) -> Option<BgPixel> {
        let (mut x, mut y) = (x as i32, y as i32);
        let mosaic_bit = if extbg { 0x02 } else { 0x01 };
        if self.mosaic_enable & mosaic_bit != 0 && self.mosaic_size > 1 {
            let size = self.mosaic_size as i32;
            x -= x % size;
            y -= y % size;
        }
        if self.m7sel & 0x01 != 0 {
            x = 255 - x;
        }
        if self.m7sel & 0x02 != 0 {
            y = 255 - y;
        }

        let [a, b, c, d] = self.m7_matrix.map(i32::from);
        let cx = self.m7_center[0] as i32;
        let cy = self.m7_center[1] as i32;
        let clip = |n: i32| if n & 0x2000 != 0 { n | !1023 } else { n & 1023 };
        let h = clip(self.m7_hofs as i32 - cx);
        let v = clip(self.m7_vofs as i32 - cy);

        let psx = ((a * h) & !63) + ((b * v) & !63) + ((b * y) & !63) + (cx << 8);
        let psy = ((c * h) & !63) + ((d * v) & !63) + ((d * y) & !63) + (cy << 8);
        let mut px = (psx + a * x) >> 8;
        let mut py = (psy + c * x) >> 8;

        let outside = (px | py) & !1023 != 0;
        let tile = match (self.m7sel >> 6) & 0x03 {
            2 if outside => return None,
            3 if outside => 0,
            _ => {
                px &= 1023;
                py &= 1023;
                (self.vram_word((((py >> 3) * 128) + (px >> 3)) as u16) & 0xFF) as u16
            }
        };
        let pixel_addr = tile * 64 + ((py & 7) * 8 + (px & 7)) as u16;
        let mut color = (self.vram_word(pixel_addr) >> 8) as u8;

        let mut priority = false;
        if extbg {
            priority = color & 0x80 != 0;
            color &= 0x7F;
        }
        if color == 0 {
            return None;
        }
        let rgb = if !extbg && self.cgwsel & 0x01 != 0 {
            direct_color(color, 0)
        } else {
            self.cgram_color(color)
        };
        Some(BgPixel {
            color: rgb,
            priority,
        })
    }
}
