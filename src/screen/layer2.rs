//! Layer 2 bitmap rendering: 256x192 (8-bit), 320x256 (8-bit) and 640x256
//! (4-bit) modes.
//!
//! Pixels come from flat SRAM starting at bank 16K #8 equivalent
//! (0x04_0000). Sequential fetches stay inside one 8 KiB segment most of the
//! time, so bank arithmetic is cached between reads. Scroll-free, unclipped
//! frames take a reduced path chosen by flags the register setters keep
//! current.

use super::timing::Layer2Cell;
use super::ComposedScreen;
use crate::memory::VideoMemory;
use crate::palette::{PaletteSource, LAYER2_PRIORITY_BIT};

/// Per-frame Layer 2 state: the bank read cache, the X wrap table for the
/// wide modes and the fast-path flags.
pub(crate) struct Layer2State {
    /// Maps X + scroll (up to 320 + 511) back into 0..319.
    x_wrap_320: Box<[u16; 1024]>,
    cache_bank16: i32,
    cache_offset: u32,
    cache_base: u32,
    /// Zero scroll and full clip window for the given resolution.
    pub fast_256: bool,
    pub fast_wide: bool,
}

/// Per-scanline constants shared by every pixel of the row.
struct Layer2Row {
    y: u32,
    bank: u8,
}

impl Layer2State {
    pub fn new() -> Self {
        let mut x_wrap_320 = Box::new([0u16; 1024]);
        for (x, entry) in x_wrap_320.iter_mut().enumerate() {
            *entry = (x % 320) as u16;
        }
        Self {
            x_wrap_320,
            cache_bank16: -1,
            cache_offset: 0,
            cache_base: 0,
            fast_256: false,
            fast_wide: false,
        }
    }

    pub fn reset(&mut self) {
        self.cache_bank16 = -1;
    }

    pub fn start_frame(&mut self) {
        self.cache_bank16 = -1;
    }

    /// Reads one pixel byte from SRAM. `offset` addresses the display
    /// buffer; the 16K bank plus the offset's upper bits select an 8 KiB
    /// segment, which is cached across sequential reads.
    fn read<M: VideoMemory>(&mut self, mem: &M, bank16: u8, offset: u32) -> u8 {
        if self.cache_bank16 == bank16 as i32 && (offset ^ self.cache_offset) < 0x2000 {
            return mem.read_physical(self.cache_base + (offset & 0x1fff));
        }

        let segment16 = (offset >> 14) & 0x07;
        let half8 = (offset >> 13) & 0x01;
        let bank8 = (bank16 as u32 + segment16) * 2 + half8;
        let base = 0x04_0000 + bank8 * 0x2000;

        self.cache_bank16 = bank16 as i32;
        self.cache_offset = offset;
        self.cache_base = base;
        mem.read_physical(base + (offset & 0x1fff))
    }
}

impl<M: VideoMemory, P: PaletteSource> ComposedScreen<M, P> {
    /// Recomputes the reduced-path flags after a scroll, clip or resolution
    /// register write.
    pub(crate) fn update_layer2_fast_flags(&mut self) {
        let unscrolled = self.layer2_scroll_x == 0 && self.layer2_scroll_y == 0;
        self.layer2.fast_256 = unscrolled && self.layer2_clip.is_full(255, 191);
        self.layer2.fast_wide = unscrolled && self.layer2_clip.is_full(159, 255);
    }

    fn layer2_bank(&self) -> u8 {
        if self.layer2_use_shadow {
            self.layer2_shadow_bank
        } else {
            self.layer2_active_bank
        }
    }

    /// Row constants for 256x192, or None when the row is outside the
    /// display or vertically clipped.
    fn layer2_row_256(&self, vc: i32) -> Option<Layer2Row> {
        let display_vc = vc - self.config.display_y_start;
        if !(0..192).contains(&display_vc) {
            return None;
        }
        if display_vc < self.layer2_clip.y1 as i32 || display_vc > self.layer2_clip.y2 as i32 {
            return None;
        }
        let y = ((display_vc + self.layer2_scroll_y as i32) % 192) as u32;
        Some(Layer2Row {
            y,
            bank: self.layer2_bank(),
        })
    }

    /// Row constants for the 320/640 wide modes (0..256 in wide space).
    fn layer2_row_wide(&self, vc: i32) -> Option<Layer2Row> {
        let display_vc_wide = vc - self.config.display_y_start + 32;
        if !(0..256).contains(&display_vc_wide) {
            return None;
        }
        if display_vc_wide < self.layer2_clip.y1 as i32
            || display_vc_wide > self.layer2_clip.y2 as i32
        {
            return None;
        }
        let y = ((display_vc_wide + self.layer2_scroll_y as i32) & 0xff) as u32;
        Some(Layer2Row {
            y,
            bank: self.layer2_bank(),
        })
    }

    /// Decodes an 8-bit pixel byte and stores it in both halves of the
    /// pixel pair.
    fn layer2_set_pair_8bit(&mut self, pixel: u8) {
        if pixel == self.global_transparency_color {
            return;
        }
        let upper = ((pixel >> 4) + (self.layer2_palette_offset & 0x0f)) & 0x0f;
        let palette_index = (upper << 4) | (pixel & 0x0f);
        let rgb333 = self.pal.layer2_rgb333(palette_index);
        let priority = rgb333 & LAYER2_PRIORITY_BIT != 0;

        self.layer2_px[0].rgb333 = rgb333 & 0x1ff;
        self.layer2_px[0].opaque = true;
        self.layer2_px[1] = self.layer2_px[0];
        self.layer2_px_priority = [priority, priority];
    }

    pub(crate) fn render_layer2_256(&mut self, vc: i32, hc: i32, cell: Layer2Cell) {
        if !cell.contains(Layer2Cell::DISPLAY_AREA) {
            return;
        }
        let row = match self.layer2_row_256(vc) {
            Some(row) => row,
            None => return,
        };

        let display_hc = hc - self.config.display_x_start;
        if self.layer2.fast_256 {
            if !(0..256).contains(&display_hc) {
                return;
            }
            let offset = (row.y << 8) | display_hc as u32;
            let pixel = self.layer2.read(&self.mem, row.bank, offset);
            self.layer2_set_pair_8bit(pixel);
            return;
        }

        if !(0..256).contains(&display_hc)
            || display_hc < self.layer2_clip.x1 as i32
            || display_hc > self.layer2_clip.x2 as i32
        {
            return;
        }

        let x = ((display_hc + self.layer2_scroll_x as i32) & 0xff) as u32;
        let offset = (row.y << 8) | x;
        let pixel = self.layer2.read(&self.mem, row.bank, offset);
        self.layer2_set_pair_8bit(pixel);
    }

    pub(crate) fn render_layer2_320(&mut self, vc: i32, hc: i32, cell: Layer2Cell) {
        if !cell.contains(Layer2Cell::DISPLAY_AREA) {
            return;
        }
        let row = match self.layer2_row_wide(vc) {
            Some(row) => row,
            None => return,
        };

        let display_hc_wide = hc - self.config.display_x_start + 32;
        if self.layer2.fast_wide {
            if !(0..320).contains(&display_hc_wide) {
                return;
            }
            // Column-major layout: offset = (x << 8) | y.
            let offset = ((display_hc_wide as u32) << 8) | row.y;
            let pixel = self.layer2.read(&self.mem, row.bank, offset);
            self.layer2_set_pair_8bit(pixel);
            return;
        }

        // Clip window coordinates are halved in the registers.
        let clip_x1 = (self.layer2_clip.x1 as i32) << 1;
        let clip_x2 = ((self.layer2_clip.x2 as i32) << 1) | 1;
        if display_hc_wide >= 320 || display_hc_wide < clip_x1 || display_hc_wide > clip_x2 {
            return;
        }

        let x_pre = (display_hc_wide + self.layer2_scroll_x as i32) as usize;
        let x = self.layer2.x_wrap_320[x_pre & 0x3ff] as u32;
        let offset = (x << 8) | row.y;
        let pixel = self.layer2.read(&self.mem, row.bank, offset);
        self.layer2_set_pair_8bit(pixel);
    }

    /// 640x256: 4 bits per pixel, two pixels per byte with the high nibble
    /// leftmost. Each tact resolves both halves of the pair independently.
    pub(crate) fn render_layer2_640(&mut self, vc: i32, hc: i32, cell: Layer2Cell) {
        if !cell.contains(Layer2Cell::DISPLAY_AREA) {
            return;
        }
        let row = match self.layer2_row_wide(vc) {
            Some(row) => row,
            None => return,
        };

        let display_hc_wide = hc - self.config.display_x_start + 32;
        if display_hc_wide >= 320 {
            return;
        }

        let column = if self.layer2.fast_wide {
            display_hc_wide as u32
        } else {
            let x_pre = (display_hc_wide + self.layer2_scroll_x as i32) as usize;
            self.layer2.x_wrap_320[x_pre & 0x3ff] as u32
        };
        let offset = (column << 8) | row.y;
        let byte = self.layer2.read(&self.mem, row.bank, offset);

        // Clip window coordinates are quartered in the registers.
        let clip_x1 = (self.layer2_clip.x1 as i32) << 2;
        let clip_x2 = ((self.layer2_clip.x2 as i32) << 2) | 3;
        let transparent_nibble = self.global_transparency_color & 0x0f;

        for index in 0..2 {
            let x640 = display_hc_wide * 2 + index as i32;
            if !self.layer2.fast_wide && (x640 < clip_x1 || x640 > clip_x2) {
                continue;
            }
            let nibble = if index == 0 { byte >> 4 } else { byte & 0x0f };
            if nibble == transparent_nibble {
                continue;
            }
            let palette_index = (self.layer2_palette_offset << 4) | nibble;
            let rgb333 = self.pal.layer2_rgb333(palette_index);
            self.layer2_px[index].rgb333 = rgb333 & 0x1ff;
            self.layer2_px[index].opaque = true;
            self.layer2_px_priority[index] = rgb333 & LAYER2_PRIORITY_BIT != 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::FlatMemory;

    #[test]
    fn test_bank_mapping_crosses_segments() {
        let mut mem = FlatMemory::new(0x10_0000);
        // Bank 8, offset 0 lands at 0x04_0000 + (8*2)*0x2000 = 0x06_0000.
        mem.physical[0x06_0000] = 0x11;
        // Offset 0x2000 selects the odd 8K half of the same 16K bank.
        mem.physical[0x06_2000] = 0x22;
        // Offset 0x4000 moves to the next 16K bank.
        mem.physical[0x06_4000] = 0x33;

        let mut state = Layer2State::new();
        assert_eq!(state.read(&mem, 8, 0x0000), 0x11);
        assert_eq!(state.read(&mem, 8, 0x2000), 0x22);
        assert_eq!(state.read(&mem, 8, 0x4000), 0x33);
    }

    #[test]
    fn test_bank_cache_serves_same_segment() {
        let mut mem = FlatMemory::new(0x10_0000);
        mem.physical[0x06_0000] = 0xaa;
        mem.physical[0x06_1fff] = 0xbb;

        let mut state = Layer2State::new();
        assert_eq!(state.read(&mem, 8, 0x0000), 0xaa);
        let cached_base = state.cache_base;
        // Stays within the 8K segment; the base must not change.
        assert_eq!(state.read(&mem, 8, 0x1fff), 0xbb);
        assert_eq!(state.cache_base, cached_base);
        // Crossing the segment recomputes.
        state.read(&mem, 8, 0x2000);
        assert_ne!(state.cache_base, cached_base);
    }

    #[test]
    fn test_cache_invalidated_by_bank_change() {
        let mut mem = FlatMemory::new(0x10_0000);
        mem.physical[0x06_0000] = 0x01;
        // Bank 9 offset 0: 0x04_0000 + 18*0x2000 = 0x06_4000.
        mem.physical[0x06_4000] = 0x02;

        let mut state = Layer2State::new();
        assert_eq!(state.read(&mem, 8, 0), 0x01);
        assert_eq!(state.read(&mem, 9, 0), 0x02);
    }

    #[test]
    fn test_x_wrap_table_folds_into_320() {
        let state = Layer2State::new();
        assert_eq!(state.x_wrap_320[0], 0);
        assert_eq!(state.x_wrap_320[319], 319);
        assert_eq!(state.x_wrap_320[320], 0);
        assert_eq!(state.x_wrap_320[639], 319);
        assert_eq!(state.x_wrap_320[1023], 1023 % 320);
    }
}
