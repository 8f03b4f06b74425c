//! Per-line sprite evaluation into a 256-pixel OBJ buffer.

use serde::{Deserialize, Serialize};

use super::{Ppu, SCREEN_WIDTH};

pub const MAX_SPRITES_PER_LINE: usize = 32;
pub const MAX_TILES_PER_LINE: usize = 34;

/// (small, large) sizes in pixels for each OBSEL size mode.
const OBJ_SIZES: [[(u16, u16); 2]; 8] = [
    [(8, 8), (16, 16)],
    [(8, 8), (32, 32)],
    [(8, 8), (64, 64)],
    [(16, 16), (32, 32)],
    [(16, 16), (64, 64)],
    [(32, 32), (64, 64)],
    [(16, 32), (32, 64)],
    [(16, 32), (32, 32)],
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjPixel {
    /// BGR555
    pub color: u16,
    pub priority: u8,
    /// Palettes 4-7 take part in colour math.
    pub math: bool,
    pub opaque: bool,
}

#[derive(Debug, Clone, Copy)]
struct Sprite {
    x: i16,
    y: u8,
    tile: u16,
    palette: u8,
    priority: u8,
    hflip: bool,
    vflip: bool,
    large: bool,
}

impl Ppu {
    fn sprite(&self, index: usize) -> Sprite {
        let base = index * 4;
        let low = &self.oam[base..base + 4];
        let high = self.oam[0x200 + (index >> 2)] >> ((index & 3) * 2);
        let x9 = low[0] as u16 | (((high & 0x01) as u16) << 8);
        Sprite {
            // 9-bit signed X
            x: ((x9 << 7) as i16) >> 7,
            y: low[1],
            tile: low[2] as u16 | (((low[3] & 0x01) as u16) << 8),
            palette: (low[3] >> 1) & 0x07,
            priority: (low[3] >> 4) & 0x03,
            hflip: low[3] & 0x40 != 0,
            vflip: low[3] & 0x80 != 0,
            large: high & 0x02 != 0,
        }
    }

    fn sprite_size(&self, sprite: &Sprite) -> (u16, u16) {
        OBJ_SIZES[((self.obsel >> 5) & 0x07) as usize][sprite.large as usize]
    }

    /// Builds the OBJ line for screen row `y`. Flags range over past 32
    /// sprites and time over past 34 tiles; the excess is dropped.
    pub(super) fn evaluate_sprites(&mut self, y: u16) {
        self.obj_line.fill(ObjPixel::default());

        let first = if self.obj_priority_rotation {
            ((self.oam_reload >> 1) & 0x7F) as usize
        } else {
            0
        };

        let mut selected: Vec<(Sprite, u16)> = Vec::with_capacity(MAX_SPRITES_PER_LINE);
        for i in 0..128 {
            let sprite = self.sprite((first + i) & 0x7F);
            let (width, height) = self.sprite_size(&sprite);
            let row = (y as u8).wrapping_sub(sprite.y) as u16;
            if row >= height {
                continue;
            }
            if sprite.x + width as i16 <= 0 || sprite.x >= SCREEN_WIDTH as i16 {
                continue;
            }
            if selected.len() == MAX_SPRITES_PER_LINE {
                self.range_over = true;
                log::trace!("sprite range over on row {}", y);
                break;
            }
            selected.push((sprite, row));
        }

        let name_base = ((self.obsel & 0x07) as u16) << 13;
        let name_gap = ((((self.obsel >> 3) & 0x03) as u16) + 1) << 12;
        let mut tiles = 0;

        'sprites: for (sprite, row) in &selected {
            let (width, height) = self.sprite_size(sprite);
            let row = if sprite.vflip { height - 1 - row } else { *row };
            let tile_row = row >> 3;
            let fine_y = row & 7;
            let columns = width >> 3;

            for col in 0..columns {
                let sx = sprite.x + (col * 8) as i16;
                if sx <= -8 || sx >= SCREEN_WIDTH as i16 {
                    continue;
                }
                if tiles == MAX_TILES_PER_LINE {
                    self.time_over = true;
                    log::trace!("sprite time over on row {}", y);
                    break 'sprites;
                }
                tiles += 1;

                let tile_col = if sprite.hflip { columns - 1 - col } else { col };
                let cx = ((sprite.tile & 0x0F) + tile_col) & 0x0F;
                let cy = (((sprite.tile >> 4) & 0x0F) + tile_row) & 0x0F;
                let character = (cy << 4) | cx;
                let mut addr = name_base.wrapping_add(character * 16).wrapping_add(fine_y);
                if sprite.tile & 0x100 != 0 {
                    addr = addr.wrapping_add(name_gap);
                }
                addr &= 0x7FFF;

                let planes01 = self.vram_word(addr);
                let planes23 = self.vram_word(addr.wrapping_add(8));
                for px in 0..8i16 {
                    let screen_x = sx + px;
                    if !(0..SCREEN_WIDTH as i16).contains(&screen_x) {
                        continue;
                    }
                    let slot = screen_x as usize;
                    if self.obj_line[slot].opaque {
                        continue;
                    }
                    let shift = if sprite.hflip { px as u16 } else { (7 - px) as u16 };
                    let color = ((planes01 >> shift) & 1)
                        | (((planes01 >> (8 + shift)) & 1) << 1)
                        | (((planes23 >> shift) & 1) << 2)
                        | (((planes23 >> (8 + shift)) & 1) << 3);
                    if color == 0 {
                        continue;
                    }
                    self.obj_line[slot] = ObjPixel {
                        color: self.cgram_color(128 + sprite.palette * 16 + color as u8),
                        priority: sprite.priority,
                        math: sprite.palette >= 4,
                        opaque: true,
                    };
                }
            }
        }
    }

    pub(super) fn obj_pixel(&self, x: usize) -> Option<ObjPixel> {
        self.obj_line.get(x).copied().filter(|p| p.opaque)
    }
}
