//! Tilemap rendering: 40x32 and 80x32 character grids over the 320/640-wide
//! space.
//!
//! The hardware fetches one tile column ahead of display. Two 8-pixel row
//! buffers alternate: while the current buffer is shown, the next tile's
//! pattern lands in the other one, and they swap at each tile boundary. Map
//! and definition data live in bank 5 and go through the same screen-memory
//! accessor as the ULA.

use super::timing::TilemapCell;
use super::ComposedScreen;
use crate::memory::VideoMemory;
use crate::palette::PaletteSource;

#[derive(Debug, Clone, Copy, Default)]
struct TilePixel {
    rgb333: u16,
    opaque: bool,
}

/// One decoded 8-pixel tile row plus the per-tile ordering bit.
#[derive(Debug, Clone, Copy, Default)]
struct TileRow {
    pixels: [TilePixel; 8],
    below_ula: bool,
}

/// Ping-pong pattern buffers and the fast-path flag.
pub(crate) struct TilemapState {
    buffers: [TileRow; 2],
    current: usize,
    /// Tile column held in the current buffer, -1 when nothing is fetched.
    current_col: i32,
    /// Scrolled row the buffers belong to, -1 when stale.
    row: i32,
    pub fast: bool,
}

impl TilemapState {
    pub fn new() -> Self {
        Self {
            buffers: [TileRow::default(); 2],
            current: 0,
            current_col: -1,
            row: -1,
            fast: false,
        }
    }

    pub fn reset(&mut self) {
        self.current_col = -1;
        self.row = -1;
    }

    pub fn start_frame(&mut self) {
        self.current_col = -1;
        self.row = -1;
    }
}

impl<M: VideoMemory, P: PaletteSource> ComposedScreen<M, P> {
    pub(crate) fn update_tilemap_fast_flag(&mut self) {
        self.tilemap.fast = self.tilemap_scroll_x == 0
            && self.tilemap_scroll_y == 0
            && self.tilemap_clip.is_full(159, 255);
    }

    /// Decodes one tile row: map entry, attribute, then the 8 pattern pixels
    /// with the per-tile transform applied.
    fn fetch_tile_row(&mut self, tile_col: u32, sy: u32, cols: u32) -> TileRow {
        let tile_row = sy >> 3;
        let row_in_tile = sy & 0x07;

        let entry_size = if self.tilemap_eliminate_attr { 1 } else { 2 };
        let map_base = (self.tilemap_base as u16) << 8;
        let entry_offset = map_base
            .wrapping_add(((tile_row * cols + (tile_col % cols)) * entry_size) as u16);

        let index = self.mem.read_screen(entry_offset) as u16;
        let attr = if self.tilemap_eliminate_attr {
            self.tilemap_default_attr
        } else {
            self.mem.read_screen(entry_offset.wrapping_add(1))
        };

        let tile_index = if self.tilemap_512_tiles {
            (((attr & 0x01) as u16) << 8) | index
        } else {
            index
        };
        let below_ula =
            !self.tilemap_512_tiles && !self.tilemap_force_on_top && attr & 0x01 != 0;

        let def_base = (self.tilemap_def_base as u16) << 8;
        let mut row = TileRow {
            pixels: [TilePixel::default(); 8],
            below_ula,
        };

        if self.tilemap_text_mode {
            // 1bpp, one byte per row, never transformed. 7 bits of color come
            // from the attribute, the pattern supplies the last bit.
            let byte = self
                .mem
                .read_screen(def_base.wrapping_add(tile_index * 8 + row_in_tile as u16));
            for x in 0..8 {
                let bit = (byte >> (7 - x)) & 0x01;
                let palette_index = (attr & 0xfe) | bit;
                let rgb333 = self.pal.tilemap_rgb333(palette_index);
                row.pixels[x as usize] = TilePixel {
                    rgb333,
                    opaque: rgb333 >> 1 != self.global_transparency_color as u16,
                };
            }
            return row;
        }

        // 4bpp graphics tile, 32 bytes, nibble-wise with X/Y mirror and
        // rotation. Rotation folds into the X mirror before the axis swap.
        let mirror_x = attr & 0x08 != 0;
        let mirror_y = attr & 0x04 != 0;
        let rotate = attr & 0x02 != 0;
        let palette_offset = attr & 0xf0;
        let tile_def = def_base.wrapping_add(tile_index * 32);

        for x in 0..8u16 {
            let mut fx = if mirror_x ^ rotate { 7 - x } else { x };
            let mut fy = if mirror_y {
                7 - row_in_tile as u16
            } else {
                row_in_tile as u16
            };
            if rotate {
                core::mem::swap(&mut fx, &mut fy);
            }
            let byte = self.mem.read_screen(tile_def.wrapping_add(fy * 4 + (fx >> 1)));
            let nibble = if fx & 0x01 == 0 { byte >> 4 } else { byte & 0x0f };
            if nibble == self.tilemap_transparency_index {
                continue;
            }
            let palette_index = palette_offset | nibble;
            row.pixels[x as usize] = TilePixel {
                rgb333: self.pal.tilemap_rgb333(palette_index),
                opaque: true,
            };
        }
        row
    }

    /// Makes sure the current buffer holds `tile_col` for scrolled row `sy`,
    /// swapping or refetching as needed, and returns the current buffer.
    fn tile_buffer(&mut self, tile_col: i32, sy: u32, cols: u32) -> TileRow {
        if self.tilemap.row == sy as i32 && self.tilemap.current_col == tile_col {
            return self.tilemap.buffers[self.tilemap.current];
        }

        let next_col = (tile_col as u32 + 1) % cols;
        if self.tilemap.row == sy as i32
            && (self.tilemap.current_col + 1) % cols as i32 == tile_col
        {
            // Tile boundary: the prefetched buffer becomes current and the
            // tile after it starts fetching.
            self.tilemap.current ^= 1;
            let back = self.fetch_tile_row(next_col, sy, cols);
            self.tilemap.buffers[self.tilemap.current ^ 1] = back;
        } else {
            // Scanline start (or a scroll write mid-line): fetch both.
            let front = self.fetch_tile_row(tile_col as u32, sy, cols);
            self.tilemap.buffers[self.tilemap.current] = front;
            let back = self.fetch_tile_row(next_col, sy, cols);
            self.tilemap.buffers[self.tilemap.current ^ 1] = back;
            self.tilemap.row = sy as i32;
        }
        self.tilemap.current_col = tile_col;
        self.tilemap.buffers[self.tilemap.current]
    }

    /// 40x32 mode: one tilemap pixel per tact, duplicated into the pair.
    pub(crate) fn render_tilemap_40(&mut self, vc: i32, hc: i32, cell: TilemapCell) {
        if !cell.contains(TilemapCell::DISPLAY_AREA) {
            return;
        }

        let display_vc_wide = vc - self.config.display_y_start + 32;
        let display_hc_wide = hc - self.config.display_x_start + 32;
        if !(0..256).contains(&display_vc_wide) || !(0..320).contains(&display_hc_wide) {
            return;
        }

        if !self.tilemap.fast {
            if display_vc_wide < self.tilemap_clip.y1 as i32
                || display_vc_wide > self.tilemap_clip.y2 as i32
            {
                return;
            }
            // Clip window X coordinates are halved in the register.
            let clip_x1 = (self.tilemap_clip.x1 as i32) << 1;
            let clip_x2 = ((self.tilemap_clip.x2 as i32) << 1) | 1;
            if display_hc_wide < clip_x1 || display_hc_wide > clip_x2 {
                return;
            }
        }

        let sy = ((display_vc_wide + self.tilemap_scroll_y as i32) & 0xff) as u32;
        let sx = (display_hc_wide + self.tilemap_scroll_x as i32) % 320;
        let row = self.tile_buffer(sx >> 3, sy, 40);
        let pixel = row.pixels[(sx & 0x07) as usize];
        if !pixel.opaque {
            return;
        }
        self.tilemap_px[0].rgb333 = pixel.rgb333;
        self.tilemap_px[0].opaque = true;
        self.tilemap_px[1] = self.tilemap_px[0];
        self.tilemap_px_below = [row.below_ula, row.below_ula];
    }

    /// 80x32 mode: the 640-wide space yields two independent pixels per tact.
    pub(crate) fn render_tilemap_80(&mut self, vc: i32, hc: i32, cell: TilemapCell) {
        if !cell.contains(TilemapCell::DISPLAY_AREA) {
            return;
        }

        let display_vc_wide = vc - self.config.display_y_start + 32;
        let display_hc_wide = hc - self.config.display_x_start + 32;
        if !(0..256).contains(&display_vc_wide) || !(0..320).contains(&display_hc_wide) {
            return;
        }

        if !self.tilemap.fast
            && (display_vc_wide < self.tilemap_clip.y1 as i32
                || display_vc_wide > self.tilemap_clip.y2 as i32)
        {
            return;
        }
        // Clip window X coordinates are quartered in 80-column mode.
        let clip_x1 = (self.tilemap_clip.x1 as i32) << 2;
        let clip_x2 = ((self.tilemap_clip.x2 as i32) << 2) | 3;

        let sy = ((display_vc_wide + self.tilemap_scroll_y as i32) & 0xff) as u32;
        for index in 0..2usize {
            let x640 = display_hc_wide * 2 + index as i32;
            if !self.tilemap.fast && (x640 < clip_x1 || x640 > clip_x2) {
                continue;
            }
            let sx = (x640 + self.tilemap_scroll_x as i32) % 640;
            let row = self.tile_buffer(sx >> 3, sy, 80);
            let pixel = row.pixels[(sx & 0x07) as usize];
            if !pixel.opaque {
                continue;
            }
            self.tilemap_px[index].rgb333 = pixel.rgb333;
            self.tilemap_px[index].opaque = true;
            self.tilemap_px_below[index] = row.below_ula;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::FlatMemory;
    use crate::palette::DefaultPalette;

    fn screen() -> ComposedScreen<FlatMemory, DefaultPalette> {
        ComposedScreen::new(FlatMemory::new(0), DefaultPalette::new())
    }

    /// Writes tile 0's definition with pixel (x, y) = a unique nibble so
    /// transforms can be told apart: value = (y << 1 | x >> 2) as nibble.
    fn write_marker_tile(screen: &mut ComposedScreen<FlatMemory, DefaultPalette>) {
        let def_base = 0x0c00usize;
        for y in 0..8usize {
            for byte_col in 0..4usize {
                let left = (y & 0x03) << 2 | byte_col;
                let right = left | 0x01;
                // Avoid the default transparency index 0x0f.
                let left = if left == 0x0f { 0x0e } else { left };
                let right = if right == 0x0f { 0x0e } else { right };
                screen.mem.screen[def_base + y * 4 + byte_col] = ((left << 4) | right) as u8;
            }
        }
    }

    fn raw_nibble(screen: &ComposedScreen<FlatMemory, DefaultPalette>, x: u16, y: u16) -> u8 {
        let byte = screen.mem.screen[0x0c00 + (y * 4 + (x >> 1)) as usize];
        if x & 1 == 0 {
            byte >> 4
        } else {
            byte & 0x0f
        }
    }

    fn fetch_with_attr(
        screen: &mut ComposedScreen<FlatMemory, DefaultPalette>,
        attr: u8,
        sy: u32,
    ) -> [u16; 8] {
        screen.mem.screen[0x2c00] = 0; // tile index
        screen.mem.screen[0x2c01] = attr;
        let row = screen.fetch_tile_row(0, sy, 40);
        let mut out = [0u16; 8];
        for (i, px) in row.pixels.iter().enumerate() {
            out[i] = px.rgb333;
        }
        out
    }

    fn expected(
        screen: &ComposedScreen<FlatMemory, DefaultPalette>,
        attr: u8,
        x: u16,
        y: u16,
    ) -> u16 {
        let mirror_x = attr & 0x08 != 0;
        let mirror_y = attr & 0x04 != 0;
        let rotate = attr & 0x02 != 0;
        let mut fx = if mirror_x ^ rotate { 7 - x } else { x };
        let mut fy = if mirror_y { 7 - y } else { y };
        if rotate {
            core::mem::swap(&mut fx, &mut fy);
        }
        let nibble = raw_nibble(screen, fx, fy);
        screen.pal.tilemap_rgb333((attr & 0xf0) | nibble)
    }

    #[test]
    fn test_all_eight_transforms_sample_correct_cells() {
        let mut s = screen();
        write_marker_tile(&mut s);
        for transform in 0..8u8 {
            let attr = transform << 1; // bits 3:1 = mirrorX, mirrorY, rotate
            let pixels = fetch_with_attr(&mut s, attr, 3);
            for x in 0..8u16 {
                assert_eq!(
                    pixels[x as usize],
                    expected(&s, attr, x, 3),
                    "transform {transform} x {x}"
                );
            }
        }
    }

    #[test]
    fn test_graphics_transparency_uses_raw_nibble() {
        let mut s = screen();
        // Pattern row 0: transparency nibble (0x0f) then opaque values.
        s.mem.screen[0x0c00] = 0xf1;
        s.mem.screen[0x2c00] = 0;
        s.mem.screen[0x2c01] = 0;
        let row = s.fetch_tile_row(0, 0, 40);
        assert!(!row.pixels[0].opaque);
        assert!(row.pixels[1].opaque);
    }

    #[test]
    fn test_text_mode_combines_attr_and_pattern_bit() {
        let mut s = screen();
        s.write_next_reg(0x6b, 0x88); // enabled + text mode
        s.mem.screen[0x2c00] = 1; // tile index 1
        s.mem.screen[0x2c01] = 0x54; // attribute
        s.mem.screen[0x0c00 + 8 + 2] = 0b1010_0000; // tile 1, row 2
        let row = s.fetch_tile_row(0, 2, 40);
        let on = s.pal.tilemap_rgb333(0x55);
        let off = s.pal.tilemap_rgb333(0x54);
        assert_eq!(row.pixels[0].rgb333, on);
        assert_eq!(row.pixels[1].rgb333, off);
        assert_eq!(row.pixels[2].rgb333, on);
        assert_eq!(row.pixels[3].rgb333, off);
    }

    #[test]
    fn test_512_mode_redirects_attr_bit_to_index() {
        let mut s = screen();
        s.write_next_reg(0x6b, 0x82); // enabled + 512-tile mode
        s.write_next_reg(0x6f, 0x00); // definitions at offset 0
        s.mem.screen[0x2c00] = 0;
        s.mem.screen[0x2c01] = 0x01; // index bit 8, not the below bit
        // Tile 256 row 0 starts at def_base + 256*32.
        s.mem.screen[0x2000] = 0x11;
        let row = s.fetch_tile_row(0, 0, 40);
        assert!(!row.below_ula);
        assert_eq!(row.pixels[0].rgb333, s.pal.tilemap_rgb333(0x01));
        assert_eq!(row.pixels[1].rgb333, s.pal.tilemap_rgb333(0x01));
    }

    #[test]
    fn test_below_bit_honored_outside_512_mode() {
        let mut s = screen();
        s.mem.screen[0x2c00] = 0;
        s.mem.screen[0x2c01] = 0x01;
        s.mem.screen[0x0c00] = 0x11;
        let row = s.fetch_tile_row(0, 0, 40);
        assert!(row.below_ula);

        // Force-on-top overrides the per-tile bit.
        s.write_next_reg(0x6b, 0x81);
        let row = s.fetch_tile_row(0, 0, 40);
        assert!(!row.below_ula);
    }

    #[test]
    fn test_ping_pong_swaps_at_tile_boundary() {
        let mut s = screen();
        // Two adjacent tiles with distinct solid patterns.
        s.mem.screen[0x2c00] = 1;
        s.mem.screen[0x2c01] = 0;
        s.mem.screen[0x2c02] = 2;
        s.mem.screen[0x2c03] = 0;
        for i in 0..4 {
            s.mem.screen[0x0c00 + 32 + i] = 0x11; // tile 1
            s.mem.screen[0x0c00 + 64 + i] = 0x22; // tile 2
        }

        let first = s.tile_buffer(0, 0, 40);
        assert_eq!(first.pixels[0].rgb333, s.pal.tilemap_rgb333(0x01));
        // Advancing one column must serve the prefetched buffer.
        let second = s.tile_buffer(1, 0, 40);
        assert_eq!(second.pixels[0].rgb333, s.pal.tilemap_rgb333(0x02));
    }
}
