//! ULA-family pixel generation: standard, Timex hi-res/hi-color and LoRes.
//!
//! The fetch pipeline mirrors the hardware: byte reads at fixed HC
//! sub-cycles, a shift register loaded every 8 tacts, and register sampling
//! points that latch scroll/mode values for the rest of the 8-pixel group.
//! All attribute decoding goes through tables built once at construction.

use super::timing::{LoResCell, UlaCell};
use super::ComposedScreen;
use crate::memory::VideoMemory;
use crate::palette::PaletteSource;

/// ULANext format masks that select a contiguous low bit group as INK.
const VALID_ULANEXT_MASKS: [u8; 8] = [0x01, 0x03, 0x07, 0x0f, 0x1f, 0x3f, 0x7f, 0xff];

/// Sentinel in the ULANext paper table: use the fallback color.
pub(crate) const ULANEXT_FALLBACK: u8 = 255;

/// Immutable decode tables for the ULA family.
pub(crate) struct UlaTables {
    /// Base address of each pixel line (Y interleaved as y[7:6], y[2:0], y[5:3]).
    pub pixel_line_base: [u16; 192],
    /// Base address of each attribute line (0x1800 + (y/8)*32).
    pub attr_line_base: [u16; 192],
    /// Attribute byte to ink/paper palette index, indexed by [flash_flag][attr].
    /// BRIGHT is folded in; FLASH swaps ink and paper in the flash-on copy.
    pub attr_to_ink: [[u8; 256]; 2],
    pub attr_to_paper: [[u8; 256]; 2],
    /// ULA+ decode: palette indices 192..255, CLUT from attr bits 7:6.
    pub ula_plus_ink: [u8; 256],
    pub ula_plus_paper: [u8; 256],
    // 256 format masks x 256 attribute bytes.
    ulanext_ink: Vec<u8>,
    ulanext_paper: Vec<u8>,
}

impl UlaTables {
    pub fn new() -> Self {
        let mut pixel_line_base = [0u16; 192];
        let mut attr_line_base = [0u16; 192];
        for y in 0..192u16 {
            let y76 = (y >> 6) & 0x03;
            let y20 = y & 0x07;
            let y53 = (y >> 3) & 0x07;
            pixel_line_base[y as usize] = (y76 << 11) | (y20 << 8) | (y53 << 5);
            attr_line_base[y as usize] = 0x1800 + ((y >> 3) << 5);
        }

        let mut attr_to_ink = [[0u8; 256]; 2];
        let mut attr_to_paper = [[0u8; 256]; 2];
        for attr in 0..256usize {
            let flash = attr & 0x80 != 0;
            let bright = ((attr >> 6) & 0x01) as u8;
            let ink = (attr & 0x07) as u8 + (bright << 3);
            let paper = ((attr >> 3) & 0x07) as u8 + (bright << 3);
            attr_to_ink[0][attr] = ink;
            attr_to_paper[0][attr] = paper;
            if flash {
                attr_to_ink[1][attr] = paper;
                attr_to_paper[1][attr] = ink;
            } else {
                attr_to_ink[1][attr] = ink;
                attr_to_paper[1][attr] = paper;
            }
        }

        let mut ula_plus_ink = [0u8; 256];
        let mut ula_plus_paper = [0u8; 256];
        for attr in 0..256usize {
            let clut = ((attr & 0xc0) >> 2) as u8;
            ula_plus_ink[attr] = 192 + (clut | (attr & 0x07) as u8);
            ula_plus_paper[attr] = 192 + (clut | 0x08 | ((attr >> 3) & 0x07) as u8);
        }

        let mut ulanext_ink = vec![0u8; 256 * 256];
        let mut ulanext_paper = vec![0u8; 256 * 256];
        for format in 0..256usize {
            let valid = VALID_ULANEXT_MASKS.contains(&(format as u8));
            let shift = if valid { format.trailing_ones() } else { 0 };
            for attr in 0..256usize {
                let index = format * 256 + attr;
                ulanext_ink[index] = (attr & format) as u8;
                ulanext_paper[index] = if format == 0xff || !valid {
                    ULANEXT_FALLBACK
                } else {
                    128 + ((attr & !format) >> shift) as u8
                };
            }
        }

        Self {
            pixel_line_base,
            attr_line_base,
            attr_to_ink,
            attr_to_paper,
            ula_plus_ink,
            ula_plus_paper,
            ulanext_ink,
            ulanext_paper,
        }
    }

    pub fn ulanext_ink(&self, format: u8, attr: u8) -> u8 {
        self.ulanext_ink[format as usize * 256 + attr as usize]
    }

    pub fn ulanext_paper(&self, format: u8, attr: u8) -> u8 {
        self.ulanext_paper[format as usize * 256 + attr as usize]
    }
}

impl<M: VideoMemory, P: PaletteSource> ComposedScreen<M, P> {
    /// Latches the register values the ULA pipeline reads mid-frame. Writes
    /// between sampling points only take effect at the next 8-pixel group.
    pub(crate) fn sample_ula_registers(&mut self) {
        self.ula_scroll_x_sampled = self.ula_scroll_x;
        self.ula_scroll_y_sampled = self.ula_scroll_y;
        self.disable_ula_output_sampled = self.disable_ula_output;
        self.ula_hires_mode_sampled = self.ula_hires_mode;
        self.ula_hicolor_mode_sampled = self.ula_hicolor_mode;
        self.lores_enabled_sampled = self.lores_enabled;
    }

    fn set_ula_pair(&mut self, rgb333: u16, opaque: bool) {
        self.ula_px[0].rgb333 = rgb333;
        self.ula_px[0].opaque = opaque;
        self.ula_px[1] = self.ula_px[0];
    }

    fn ula_clipped(&self, display_hc: i32, display_vc: i32) -> bool {
        display_hc < self.ula_clip.x1 as i32
            || display_hc > self.ula_clip.x2 as i32
            || display_vc < self.ula_clip.y1 as i32
            || display_vc > self.ula_clip.y2 as i32
    }

    fn latch_scrolled_row(&mut self, vc: i32) {
        let row = vc - self.config.display_y_start + self.ula_scroll_y_sampled as i32;
        self.ula_row = (row % 192) as u16;
    }

    /// Standard 256x192 mode: pixel byte + attribute byte per column.
    pub(crate) fn render_ula_standard(&mut self, vc: i32, hc: i32, cell: UlaCell) {
        if cell.contains(UlaCell::NREG_SAMPLE) {
            self.sample_ula_registers();
            self.latch_scrolled_row(vc);
        }

        if cell.contains(UlaCell::SHIFT_REG_LOAD) {
            let word = ((self.ula_pixel_byte1 as u32) << 8) | self.ula_pixel_byte2 as u32;
            let pre_shift = self.ula_scroll_x_sampled & 0x07;
            self.ula_shift_reg = (((word << pre_shift) >> 8) & 0xff) as u16;
            self.ula_shift_attr = self.ula_attr_byte1;
            self.ula_shift_attr2 = self.ula_attr_byte2;
            self.ula_shift_attr_count = 8 - pre_shift;
        }

        if cell.contains(UlaCell::BYTE1_READ) {
            let base_col = (hc + 0x0c - self.config.display_x_start) >> 3;
            let cols = ((base_col + (self.ula_scroll_x_sampled >> 3) as i32) & 0x1f) as u16;
            let addr = self.ula_tables.pixel_line_base[self.ula_row as usize] | cols;
            let byte = self.mem.read_screen(addr);
            if hc & 0x04 != 0 {
                self.ula_pixel_byte2 = byte;
            } else {
                self.ula_pixel_byte1 = byte;
            }
            if cell.contains(UlaCell::FLOATING_BUS_UPDATE) {
                self.set_floating_bus(byte);
            }
        }

        if cell.contains(UlaCell::BYTE2_READ) {
            let base_col = (hc + 0x0a - self.config.display_x_start) >> 3;
            let cols = ((base_col + (self.ula_scroll_x_sampled >> 3) as i32) & 0x1f) as u16;
            let addr = self.ula_tables.attr_line_base[self.ula_row as usize] | cols;
            let byte = self.mem.read_screen(addr);
            if hc & 0x04 != 0 {
                self.ula_attr_byte2 = byte;
            } else {
                self.ula_attr_byte1 = byte;
            }
            if cell.contains(UlaCell::FLOATING_BUS_UPDATE) {
                self.set_floating_bus(byte);
            }
        }

        if !cell.contains(UlaCell::DISPLAY_AREA) {
            // ULANext with an all-ink mask paints the border with the
            // fallback color instead of the border color.
            if self.ula_next_enabled && self.ula_next_format == 0xff {
                let rgb = self.fallback_rgb333_cache;
                self.set_ula_pair(rgb, true);
                return;
            }
            let rgb = self.border_rgb_cache;
            self.set_ula_pair(rgb, true);
            return;
        }

        let display_hc = hc - self.config.display_x_start;
        let display_vc = vc - self.config.display_y_start;
        let bit = (self.ula_shift_reg >> (7 - (display_hc & 0x07))) & 0x01;
        let attr = self.ula_shift_attr;

        let rgb333 = if self.ula_next_enabled {
            if bit != 0 {
                let index = self.ula_tables.ulanext_ink(self.ula_next_format, attr);
                self.pal.ula_rgb333(index)
            } else {
                let index = self.ula_tables.ulanext_paper(self.ula_next_format, attr);
                if index == ULANEXT_FALLBACK {
                    self.fallback_rgb333_cache
                } else {
                    self.pal.ula_rgb333(index)
                }
            }
        } else if self.ula_plus_enabled {
            let index = if bit != 0 {
                self.ula_tables.ula_plus_ink[attr as usize]
            } else {
                self.ula_tables.ula_plus_paper[attr as usize]
            };
            self.pal.ula_rgb333(index)
        } else {
            let flash = self.flash_flag as usize;
            let index = if bit != 0 {
                self.ula_tables.attr_to_ink[flash][attr as usize]
            } else {
                self.ula_tables.attr_to_paper[flash][attr as usize]
            };
            self.pal.ula_rgb333(index)
        };

        self.advance_shift_attr();

        let clipped = self.ula_clipped(display_hc, display_vc);
        let opaque = !clipped && rgb333 >> 1 != self.global_transparency_color as u16;
        self.set_ula_pair(rgb333, opaque);
    }

    fn advance_shift_attr(&mut self) {
        self.ula_shift_attr_count = self.ula_shift_attr_count.saturating_sub(1);
        if self.ula_shift_attr_count == 0 {
            self.ula_shift_attr_count = 8;
            self.ula_shift_attr = self.ula_shift_attr2;
        }
    }

    /// Timex hi-res 512x192: both fetch slots carry pixel data, two output
    /// pixels per tact from a 16-bit shift register.
    pub(crate) fn render_ula_hires(&mut self, vc: i32, hc: i32, cell: UlaCell) {
        if cell.contains(UlaCell::NREG_SAMPLE) {
            self.sample_ula_registers();
            self.latch_scrolled_row(vc);
        }

        if cell.contains(UlaCell::SHIFT_REG_LOAD) {
            let word = ((self.ula_pixel_byte1 as u32) << 24)
                | ((self.ula_pixel_byte2 as u32) << 16)
                | ((self.ula_pixel_byte3 as u32) << 8)
                | self.ula_pixel_byte4 as u32;
            let pre_shift = (self.ula_scroll_x_sampled & 0x07) * 2;
            self.ula_shift_reg = ((word << pre_shift) >> 16) as u16;
        }

        if cell.contains(UlaCell::BYTE1_READ) {
            let base_col = (hc + 0x0c - self.config.display_x_start) >> 3;
            let cols = ((base_col + (self.ula_scroll_x_sampled >> 3) as i32) & 0x1f) as u16;
            let addr = self.ula_tables.pixel_line_base[self.ula_row as usize] | cols;
            let byte = self.mem.read_screen(addr);
            if hc & 0x04 != 0 {
                self.ula_pixel_byte3 = byte;
            } else {
                self.ula_pixel_byte1 = byte;
            }
            if cell.contains(UlaCell::FLOATING_BUS_UPDATE) {
                self.set_floating_bus(byte);
            }
        }

        if cell.contains(UlaCell::BYTE2_READ) {
            // Odd columns live in the second Timex bank.
            let base_col = (hc + 0x0a - self.config.display_x_start) >> 3;
            let cols = ((base_col + (self.ula_scroll_x_sampled >> 3) as i32) & 0x1f) as u16;
            let addr = 0x2000 | self.ula_tables.pixel_line_base[self.ula_row as usize] | cols;
            let byte = self.mem.read_screen(addr);
            if hc & 0x04 != 0 {
                self.ula_pixel_byte4 = byte;
            } else {
                self.ula_pixel_byte2 = byte;
            }
            if cell.contains(UlaCell::FLOATING_BUS_UPDATE) {
                self.set_floating_bus(byte);
            }
        }

        if cell.contains(UlaCell::BORDER_AREA) {
            let rgb = if self.ula_next_enabled && self.ula_next_format == 0xff {
                self.fallback_rgb333_cache
            } else {
                // Hi-res border shows the paper color.
                self.ula_hires_paper_rgb333
            };
            self.set_ula_pair(rgb, true);
            return;
        }

        let display_hc = hc - self.config.display_x_start;
        let display_vc = vc - self.config.display_y_start;
        let slot = 7 - (display_hc & 0x07);
        let bit1 = (self.ula_shift_reg >> (2 * slot + 1)) & 0x01;
        let bit2 = (self.ula_shift_reg >> (2 * slot)) & 0x01;

        let (rgb1, rgb2) = if self.ula_next_enabled {
            let attr = self.ula_shift_attr;
            let resolve = |bit: u16, s: &Self| {
                if bit != 0 {
                    let index = s.ula_tables.ulanext_ink(s.ula_next_format, attr);
                    s.pal.ula_rgb333(index)
                } else {
                    let index = s.ula_tables.ulanext_paper(s.ula_next_format, attr);
                    if index == ULANEXT_FALLBACK {
                        s.fallback_rgb333_cache
                    } else {
                        s.pal.ula_rgb333(index)
                    }
                }
            };
            (resolve(bit1, self), resolve(bit2, self))
        } else {
            let pick = |bit: u16, s: &Self| {
                if bit != 0 {
                    s.ula_hires_ink_rgb333
                } else {
                    s.ula_hires_paper_rgb333
                }
            };
            (pick(bit1, self), pick(bit2, self))
        };

        let clipped = self.ula_clipped(display_hc, display_vc);
        let transparency = self.global_transparency_color as u16;
        self.ula_px[0].rgb333 = rgb1;
        self.ula_px[0].opaque = !clipped && rgb1 >> 1 != transparency;
        self.ula_px[1].rgb333 = rgb2;
        self.ula_px[1].opaque = !clipped && rgb2 >> 1 != transparency;
    }

    /// Timex hi-color 256x192: per-column attributes from the second bank.
    pub(crate) fn render_ula_hicolor(&mut self, vc: i32, hc: i32, cell: UlaCell) {
        if cell.contains(UlaCell::NREG_SAMPLE) {
            self.sample_ula_registers();
            self.latch_scrolled_row(vc);
        }

        if cell.contains(UlaCell::SHIFT_REG_LOAD) {
            let word = ((self.ula_pixel_byte1 as u32) << 8) | self.ula_pixel_byte2 as u32;
            let pre_shift = self.ula_scroll_x_sampled & 0x07;
            self.ula_shift_reg = (((word << pre_shift) >> 8) & 0xff) as u16;
            self.ula_shift_attr = self.ula_attr_byte1;
            self.ula_shift_attr2 = self.ula_attr_byte2;
            self.ula_shift_attr_count = 8 - pre_shift;
        }

        if cell.contains(UlaCell::BYTE1_READ) {
            let base_col = (hc + 0x0c - self.config.display_x_start) >> 3;
            let cols = ((base_col + (self.ula_scroll_x_sampled >> 3) as i32) & 0x1f) as u16;
            let addr = self.ula_tables.pixel_line_base[self.ula_row as usize] | cols;
            let byte = self.mem.read_screen(addr);
            if hc & 0x04 != 0 {
                self.ula_pixel_byte2 = byte;
            } else {
                self.ula_pixel_byte1 = byte;
            }
            if cell.contains(UlaCell::FLOATING_BUS_UPDATE) {
                self.set_floating_bus(byte);
            }
        }

        if cell.contains(UlaCell::BYTE2_READ) {
            // Per-column colors at the pixel address in the second bank.
            let base_col = (hc + 0x0a - self.config.display_x_start) >> 3;
            let cols = ((base_col + (self.ula_scroll_x_sampled >> 3) as i32) & 0x1f) as u16;
            let addr = 0x2000 | self.ula_tables.pixel_line_base[self.ula_row as usize] | cols;
            let byte = self.mem.read_screen(addr);
            if hc & 0x04 != 0 {
                self.ula_attr_byte2 = byte;
            } else {
                self.ula_attr_byte1 = byte;
            }
            if cell.contains(UlaCell::FLOATING_BUS_UPDATE) {
                self.set_floating_bus(byte);
            }
        }

        if !cell.contains(UlaCell::DISPLAY_AREA) {
            if self.ula_next_enabled && self.ula_next_format == 0xff {
                let rgb = self.fallback_rgb333_cache;
                self.set_ula_pair(rgb, true);
                return;
            }
            let rgb = self.border_rgb_cache;
            self.set_ula_pair(rgb, true);
            return;
        }

        let display_hc = hc - self.config.display_x_start;
        let display_vc = vc - self.config.display_y_start;
        let bit = (self.ula_shift_reg >> (7 - (display_hc & 0x07))) & 0x01;
        let attr = self.ula_shift_attr;

        let rgb333 = if self.ula_next_enabled {
            if bit != 0 {
                let index = self.ula_tables.ulanext_ink(self.ula_next_format, attr);
                self.pal.ula_rgb333(index)
            } else {
                let index = self.ula_tables.ulanext_paper(self.ula_next_format, attr);
                if index == ULANEXT_FALLBACK {
                    self.fallback_rgb333_cache
                } else {
                    self.pal.ula_rgb333(index)
                }
            }
        } else {
            let flash = self.flash_flag as usize;
            let index = if bit != 0 {
                self.ula_tables.attr_to_ink[flash][attr as usize]
            } else {
                self.ula_tables.attr_to_paper[flash][attr as usize]
            };
            self.pal.ula_rgb333(index)
        };

        self.advance_shift_attr();

        let clipped = self.ula_clipped(display_hc, display_vc);
        let opaque = !clipped && rgb333 >> 1 != self.global_transparency_color as u16;
        self.set_ula_pair(rgb333, opaque);
    }

    /// LoRes 128x96 (standard 8-bit) or Radastan (4-bit) mode. Replaces the
    /// ULA output; each LoRes pixel covers a 2x2 block.
    pub(crate) fn render_lores(&mut self, vc: i32, hc: i32, cell: LoResCell) {
        if cell.contains(LoResCell::NREG_SAMPLE) {
            self.lores_scroll_x_sampled = self.ula_scroll_x;
            self.lores_scroll_y_sampled = self.ula_scroll_y;
            self.lores_enabled_sampled = self.lores_enabled;
            self.lores_radastan_sampled = self.lores_radastan;
        }

        if cell.contains(LoResCell::BLOCK_FETCH) {
            let display_hc = hc - self.config.display_x_start;
            let display_vc = vc - self.config.display_y_start;
            let x = (display_hc + self.lores_scroll_x_sampled as i32) & 0xff;
            let y = Self::lores_scrolled_y(display_vc, self.lores_scroll_y_sampled);

            let fetch = if self.lores_radastan_sampled {
                x & 0x03 == 0
            } else {
                x & 0x01 == 0
            };
            if fetch {
                let addr = if self.lores_radastan_sampled {
                    ((self.lores_dfile as u16) << 13) | (((y as u16) >> 1) << 6) | (x as u16 >> 2)
                } else {
                    let pre = (((y as u16) >> 1) << 7) | (x as u16 >> 1);
                    if y >= 96 {
                        pre + 0x0800
                    } else {
                        pre
                    }
                };
                self.lores_block_byte = self.mem.read_screen(addr);
            }
        }

        if !cell.contains(LoResCell::DISPLAY_AREA) {
            let rgb = self.border_rgb_cache;
            self.set_ula_pair(rgb, true);
            return;
        }

        let display_hc = hc - self.config.display_x_start;
        let display_vc = vc - self.config.display_y_start;
        let x = (display_hc + self.lores_scroll_x_sampled as i32) & 0xff;

        let palette_index = if self.lores_radastan_sampled {
            let nibble = if x & 0x02 != 0 {
                self.lores_block_byte & 0x0f
            } else {
                (self.lores_block_byte >> 4) & 0x0f
            };
            if self.ula_plus_enabled {
                0xc0 | ((self.lores_palette_offset & 0x03) << 2) | nibble
            } else {
                ((self.lores_palette_offset & 0x0f) << 4) | nibble
            }
        } else {
            let high = ((self.lores_block_byte >> 4) + self.lores_palette_offset) & 0x0f;
            (high << 4) | (self.lores_block_byte & 0x0f)
        };
        let rgb333 = self.pal.ula_rgb333(palette_index);

        let clipped = self.ula_clipped(display_hc, display_vc);
        let opaque = !clipped && rgb333 >> 1 != self.global_transparency_color as u16;
        self.set_ula_pair(rgb333, opaque);
    }

    /// Vertical scroll with the 192-line wrap: on overflow the two top Y
    /// bits advance by one block while the low six bits stay.
    fn lores_scrolled_y(display_vc: i32, scroll_y: u8) -> i32 {
        let y_pre = display_vc + scroll_y as i32;
        if y_pre >= 192 {
            let upper = ((y_pre >> 6) + 1) & 0x03;
            (upper << 6) | (y_pre & 0x3f)
        } else {
            y_pre & 0xff
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_line_addresses_interleave() {
        let t = UlaTables::new();
        assert_eq!(t.pixel_line_base[0], 0x0000);
        assert_eq!(t.pixel_line_base[1], 0x0100);
        assert_eq!(t.pixel_line_base[8], 0x0020);
        assert_eq!(t.pixel_line_base[64], 0x0800);
        assert_eq!(t.pixel_line_base[191], 0x17e0);
        assert_eq!(t.attr_line_base[0], 0x1800);
        assert_eq!(t.attr_line_base[191], 0x1800 + 23 * 32);
    }

    #[test]
    fn test_attribute_decode_folds_bright() {
        let t = UlaTables::new();
        // White ink on black paper.
        assert_eq!(t.attr_to_ink[0][0x07], 7);
        assert_eq!(t.attr_to_paper[0][0x07], 0);
        // BRIGHT adds 8 to both.
        assert_eq!(t.attr_to_ink[0][0x47], 15);
        assert_eq!(t.attr_to_paper[0][0x47], 8);
    }

    #[test]
    fn test_flash_swaps_ink_and_paper() {
        let t = UlaTables::new();
        let attr = 0x87; // FLASH, white ink, black paper
        assert_eq!(t.attr_to_ink[0][attr], 7);
        assert_eq!(t.attr_to_paper[0][attr], 0);
        assert_eq!(t.attr_to_ink[1][attr], 0);
        assert_eq!(t.attr_to_paper[1][attr], 7);
        // No FLASH bit: both copies agree.
        assert_eq!(t.attr_to_ink[1][0x07], 7);
        assert_eq!(t.attr_to_paper[1][0x07], 0);
    }

    #[test]
    fn test_ula_plus_uses_clut_groups() {
        let t = UlaTables::new();
        // CLUT 0: ink 0..7, paper 8..15 above 192.
        assert_eq!(t.ula_plus_ink[0x07], 192 + 7);
        assert_eq!(t.ula_plus_paper[0x07], 192 + 8);
        // CLUT 3 from attr bits 7:6.
        assert_eq!(t.ula_plus_ink[0xc1], 192 + 48 + 1);
        assert_eq!(t.ula_plus_paper[0xd9], 192 + 48 + 8 + 3);
    }

    #[test]
    fn test_ulanext_valid_mask_splits_attr() {
        let t = UlaTables::new();
        // Mask 0x0f: low nibble ink, high nibble paper.
        assert_eq!(t.ulanext_ink(0x0f, 0x34), 0x04);
        assert_eq!(t.ulanext_paper(0x0f, 0x34), 128 + 3);
        // Mask 0x03: two ink bits.
        assert_eq!(t.ulanext_ink(0x03, 0xff), 0x03);
        assert_eq!(t.ulanext_paper(0x03, 0xff), 128 + 0x3f);
    }

    #[test]
    fn test_ulanext_invalid_and_full_masks_yield_fallback() {
        let t = UlaTables::new();
        assert_eq!(t.ulanext_paper(0xff, 0x12), ULANEXT_FALLBACK);
        assert_eq!(t.ulanext_paper(0xaa, 0x12), ULANEXT_FALLBACK);
        // Ink still resolves through the mask.
        assert_eq!(t.ulanext_ink(0xff, 0x12), 0x12);
        assert_eq!(t.ulanext_ink(0xaa, 0xff), 0xaa);
    }
}
