// Window masks: two ranges per line combined per layer.

use super::Ppu;

pub(super) const WINDOW_OBJ: usize = 4;
pub(super) const WINDOW_COLOR: usize = 5;

impl Ppu {
    /// Left <= x <= right. A left edge past the right edge is empty.
    fn inside_window(&self, window: usize, x: u8) -> bool {
        let left = self.window_pos[window * 2];
        let right = self.window_pos[window * 2 + 1];
        left <= x && x <= right
    }

    /// Whether `layer` (BG1-4 = 0-3, OBJ = 4, colour = 5) is masked at x.
    /// A layer with neither window enabled is never masked.
    pub(super) fn window_masked(&self, layer: usize, x: u8) -> bool {
        let sel = (self.window_sel[layer / 2] >> ((layer & 1) * 4)) & 0x0F;
        let logic = if layer < 4 {
            (self.window_logic[0] >> (layer * 2)) & 0x03
        } else {
            (self.window_logic[1] >> ((layer - 4) * 2)) & 0x03
        };

        let w1 = (sel & 0x02 != 0).then(|| self.inside_window(0, x) ^ (sel & 0x01 != 0));
        let w2 = (sel & 0x08 != 0).then(|| self.inside_window(1, x) ^ (sel & 0x04 != 0));
        match (w1, w2) {
            (None, None) => false,
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (Some(a), Some(b)) => match logic {
                0 => a | b,
                1 => a & b,
                2 => a ^ b,
                _ => !(a ^ b),
            },
        }
    }
}
