//! Sprite engine: 128 hardware sprites over the 320x256 space.
//!
//! Attribute and pattern memory are written through ports and NextRegs;
//! every pattern byte is fanned out to 8 transform variants at write time so
//! the scanline builder indexes the right orientation directly. A scanline is
//! resolved once into a 320-entry line buffer under a fixed time budget, then
//! read back pixel by pixel.

use log::debug;

use super::timing::SpriteCell;
use super::{ClipWindow, ComposedScreen, LayerPixel};
use crate::memory::VideoMemory;
use crate::palette::PaletteSource;

/// Time budget per scanline: 456 tacts at 4 engine sub-steps each.
const LINE_BUDGET: i32 = 456 * 4;

const PATTERN_COUNT: usize = 64;
const VARIANT_COUNT: usize = 8;
const PATTERN_BYTES: usize = 256;

#[derive(Debug, Clone, Copy, Default)]
struct SpriteAttr {
    x: u16,
    y: u16,
    palette_offset: u8,
    mirror_x: bool,
    mirror_y: bool,
    rotate: bool,
    visible: bool,
    has_attr4: bool,
    pattern: u8,
    pattern_bit6: bool,
    four_bit: bool,
    scale_x: u8,
    scale_y: u8,
    relative: bool,
    // Derived: transform variant and full 7-bit pattern index.
    variant: u8,
    pattern7: u8,
}

/// Position and transform of the most recently written anchor sprite.
/// Relative sprites in a chain place themselves against this state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpriteAnchor {
    pub x: u16,
    pub y: u16,
    pub rotate: bool,
    pub mirror_x: bool,
    pub mirror_y: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct LineCell {
    valid: bool,
    index: u8,
}

pub(crate) struct SpriteEngine {
    pub(crate) enabled: bool,
    pub(crate) sprite0_on_top: bool,
    pub(crate) over_border: bool,
    pub(crate) clip_over_border: bool,
    id_lockstep: bool,

    clip: ClipWindow,
    // Effective bounds in the 320x256 sprite space, derived from the clip
    // window and the border flags.
    eff_x1: i32,
    eff_x2: i32,
    eff_y1: i32,
    eff_y2: i32,

    transparency_index: u8,

    pattern_index: u8,
    pattern_sub: u16,
    sprite_index: u8,
    sprite_sub: u8,
    mirror_index: u8,

    too_many_per_line: bool,
    collision: bool,

    pub(crate) anchor: SpriteAnchor,

    // 64 patterns x 8 variants x 256 bytes.
    patterns: Vec<u8>,
    sprites: Vec<SpriteAttr>,

    line_buffer: [LineCell; 320],
    line_y: i32,
}

impl SpriteEngine {
    pub fn new() -> Self {
        let mut engine = Self {
            enabled: false,
            sprite0_on_top: false,
            over_border: false,
            clip_over_border: false,
            id_lockstep: false,
            clip: ClipWindow::new(255, 191),
            eff_x1: 0,
            eff_x2: 0,
            eff_y1: 0,
            eff_y2: 0,
            transparency_index: 0xe3,
            pattern_index: 0,
            pattern_sub: 0,
            sprite_index: 0,
            sprite_sub: 0,
            mirror_index: 0,
            too_many_per_line: false,
            collision: false,
            anchor: SpriteAnchor::default(),
            patterns: vec![0; PATTERN_COUNT * VARIANT_COUNT * PATTERN_BYTES],
            sprites: vec![SpriteAttr::default(); 128],
            line_buffer: [LineCell::default(); 320],
            line_y: -1,
        };
        engine.recompute_clip();
        engine
    }

    /// Control-register reset. Sprite attribute and pattern RAM keep their
    /// contents, like the hardware.
    pub fn reset(&mut self) {
        self.enabled = false;
        self.sprite0_on_top = false;
        self.over_border = false;
        self.clip_over_border = false;
        self.id_lockstep = false;
        self.clip = ClipWindow::new(255, 191);
        self.transparency_index = 0xe3;
        self.pattern_index = 0;
        self.pattern_sub = 0;
        self.sprite_index = 0;
        self.sprite_sub = 0;
        self.mirror_index = 0;
        self.too_many_per_line = false;
        self.collision = false;
        self.line_y = -1;
        self.recompute_clip();
    }

    pub fn start_frame(&mut self) {
        self.line_y = -1;
    }

    pub(crate) fn set_id_lockstep(&mut self, on: bool) {
        self.id_lockstep = on;
    }

    pub(crate) fn set_transparency_index(&mut self, value: u8) {
        self.transparency_index = value;
    }

    pub(crate) fn transparency_index(&self) -> u8 {
        self.transparency_index
    }

    /// Status port 0x303B: read returns and clears both flags.
    pub(crate) fn read_status(&mut self) -> u8 {
        let result = (if self.too_many_per_line { 0x02 } else { 0 })
            | (if self.collision { 0x01 } else { 0 });
        self.too_many_per_line = false;
        self.collision = false;
        result
    }

    /// Port 0x303B write: selects sprite and pattern slots. Bit 7 starts the
    /// pattern upload at the half-cell boundary for 4-bit patterns.
    pub(crate) fn write_select(&mut self, value: u8) {
        self.pattern_index = value & 0x3f;
        self.pattern_sub = (value & 0x80) as u16;
        self.sprite_index = value & 0x7f;
        self.sprite_sub = 0;
    }

    /// NextReg 0x34. In lockstep mode this mirrors the port select.
    pub(crate) fn set_sprite_index(&mut self, value: u8) {
        if self.id_lockstep {
            self.write_select(value);
        } else {
            self.mirror_index = value & 0x7f;
        }
    }

    pub(crate) fn sprite_index(&self) -> u8 {
        self.mirror_index
    }

    pub(crate) fn write_clip(&mut self, value: u8) {
        self.clip.write(value);
        self.recompute_clip();
    }

    pub(crate) fn read_clip(&self) -> u8 {
        self.clip.read()
    }

    pub(crate) fn reset_clip_index(&mut self) {
        self.clip.reset_index();
    }

    pub(crate) fn set_border_flags(&mut self, over_border: bool, clip_over_border: bool) {
        self.over_border = over_border;
        self.clip_over_border = clip_over_border;
        self.recompute_clip();
    }

    /// The effective window changes as a block with the border flags, never
    /// per pixel.
    fn recompute_clip(&mut self) {
        let x1 = self.clip.x1 as i32;
        let x2 = self.clip.x2 as i32;
        let y1 = self.clip.y1 as i32;
        let y2 = self.clip.y2 as i32;
        if self.over_border {
            if self.clip_over_border {
                // Window registers span the full 320-wide space, X doubled.
                self.eff_x1 = x1 << 1;
                self.eff_x2 = (x2 << 1) | 1;
                self.eff_y1 = y1;
                self.eff_y2 = y2;
            } else {
                self.eff_x1 = 0;
                self.eff_x2 = 319;
                self.eff_y1 = 0;
                self.eff_y2 = 255;
            }
        } else {
            // ULA-aligned sub-area: (32, 32) is the display origin.
            self.eff_x1 = x1 + 32;
            self.eff_x2 = (x2 + 32).min(287);
            self.eff_y1 = y1 + 32;
            self.eff_y2 = (y2 + 32).min(223);
        }
    }

    /// Port 0x57 upload stream: 5-byte records with auto-advance, or 4-byte
    /// records when the attribute-3 "has byte 4" bit is clear.
    pub(crate) fn write_attribute_stream(&mut self, value: u8) {
        let index = self.sprite_index as usize;
        self.write_indexed_attribute(index, self.sprite_sub, value);
        if self.sprite_sub == 3 && !self.sprites[index].has_attr4 {
            // Compact form: byte 4 state reverts to defaults.
            let sprite = &mut self.sprites[index];
            sprite.four_bit = false;
            sprite.pattern_bit6 = false;
            sprite.relative = false;
            sprite.scale_x = 0;
            sprite.scale_y = 0;
            sprite.y &= 0xff;
            sprite.pattern7 = sprite.pattern;
            self.sprite_sub += 1;
        }
        self.sprite_sub += 1;
        if self.sprite_sub >= 5 {
            self.sprite_sub = 0;
            self.sprite_index = (self.sprite_index + 1) & 0x7f;
        }
    }

    /// Direct attribute write through NextReg 0x35..0x39 (or the
    /// auto-increment mirrors 0x75..0x79).
    pub(crate) fn write_attribute(&mut self, attr: u8, value: u8, auto_inc: bool) {
        let index = if self.id_lockstep {
            self.sprite_index
        } else {
            self.mirror_index
        };
        self.write_indexed_attribute(index as usize, attr, value);
        if auto_inc {
            if self.id_lockstep {
                self.sprite_index = (self.sprite_index + 1) & 0x7f;
                self.sprite_sub = 0;
            } else {
                self.mirror_index = (self.mirror_index + 1) & 0x7f;
            }
        }
    }

    fn write_indexed_attribute(&mut self, index: usize, attr: u8, value: u8) {
        let sprite = &mut self.sprites[index];
        match attr {
            0 => sprite.x = (sprite.x & 0x100) | value as u16,
            1 => sprite.y = (sprite.y & 0x100) | value as u16,
            2 => {
                sprite.palette_offset = (value & 0xf0) >> 4;
                sprite.mirror_x = value & 0x08 != 0;
                sprite.mirror_y = value & 0x04 != 0;
                sprite.rotate = value & 0x02 != 0;
                sprite.x = (((value & 0x01) as u16) << 8) | (sprite.x & 0xff);
                sprite.variant = (if sprite.rotate { 4 } else { 0 })
                    | (if sprite.mirror_x { 2 } else { 0 })
                    | (if sprite.mirror_y { 1 } else { 0 });
            }
            3 => {
                sprite.visible = value & 0x80 != 0;
                sprite.has_attr4 = value & 0x40 != 0;
                sprite.pattern = value & 0x3f;
                sprite.pattern7 = sprite.pattern | if sprite.pattern_bit6 { 0x40 } else { 0 };
            }
            _ => {
                // Bits 7:6 = 01 mark a relative sprite; its pattern bit 6
                // moves down to bit 5 and bit 0 stops being a Y MSB (the
                // coordinate bytes become signed offsets from the anchor).
                sprite.relative = value & 0xc0 == 0x40;
                if sprite.relative {
                    sprite.four_bit = false;
                    sprite.pattern_bit6 = value & 0x20 != 0;
                } else {
                    sprite.four_bit = value & 0x80 != 0;
                    sprite.pattern_bit6 = value & 0x40 != 0;
                    sprite.y = (((value & 0x01) as u16) << 8) | (sprite.y & 0xff);
                }
                sprite.scale_x = (value & 0x18) >> 3;
                sprite.scale_y = (value & 0x06) >> 1;
                sprite.pattern7 = sprite.pattern | if sprite.pattern_bit6 { 0x40 } else { 0 };
            }
        }

        // A 5-byte non-relative sprite is an anchor: its attribute-2 write
        // latches the state relative sprites build on.
        if attr == 2 && sprite.has_attr4 && !sprite.relative {
            self.anchor = SpriteAnchor {
                x: sprite.x,
                y: sprite.y,
                rotate: sprite.rotate,
                mirror_x: sprite.mirror_x,
                mirror_y: sprite.mirror_y,
            };
        }
    }

    /// Port 0x5B upload: each byte lands in all 8 transform variants of the
    /// selected pattern at its mapped position.
    pub(crate) fn write_pattern_stream(&mut self, value: u8) {
        let src = self.pattern_sub as usize & 0xff;
        let src_y = src >> 4;
        let src_x = src & 0x0f;
        let base = (self.pattern_index as usize) * VARIANT_COUNT * PATTERN_BYTES;

        let destinations = [
            (src_y << 4) | src_x,                   // identity
            ((15 - src_y) << 4) | src_x,            // mirror Y
            (src_y << 4) | (15 - src_x),            // mirror X
            ((15 - src_y) << 4) | (15 - src_x),     // mirror X+Y
            (src_x << 4) | (15 - src_y),            // rotate
            (src_x << 4) | src_y,                   // rotate + mirror Y
            ((15 - src_x) << 4) | (15 - src_y),     // rotate + mirror X
            ((15 - src_x) << 4) | src_y,            // rotate + mirror X+Y
        ];
        for (variant, dst) in destinations.iter().enumerate() {
            self.patterns[base + variant * PATTERN_BYTES + dst] = value;
        }

        self.pattern_sub = (self.pattern_sub + 1) & 0xff;
        if self.pattern_sub == 0 {
            self.pattern_index = (self.pattern_index + 1) & 0x3f;
        }
    }

    fn pattern_byte(&self, pattern: u8, variant: u8, offset: usize) -> u8 {
        let cell = (pattern as usize & 0x3f) * VARIANT_COUNT + variant as usize;
        self.patterns[cell * PATTERN_BYTES + offset]
    }

    /// Resolves one scanline into the line buffer. `y` is in the 320x256
    /// sprite space. QUALIFY costs one budget step per sprite examined,
    /// PROCESS one per output column walked; exhaustion sets the sticky
    /// overtime flag and abandons the rest of the line.
    fn build_line(&mut self, y: i32) {
        self.line_buffer = [LineCell::default(); 320];
        self.line_y = y;

        if y < self.eff_y1 || y > self.eff_y2 {
            return;
        }

        let mut budget = LINE_BUDGET;
        for index in 0..self.sprites.len() {
            if budget <= 0 {
                if !self.too_many_per_line {
                    debug!("sprite budget exhausted on line {y}");
                }
                self.too_many_per_line = true;
                return;
            }
            budget -= 1;

            let sprite = self.sprites[index];
            if !sprite.visible {
                continue;
            }
            // Relative sprites offset from the latched anchor state; the
            // low coordinate bytes are signed.
            let (base_x, base_y) = if sprite.relative {
                (
                    self.anchor.x as i32 + (sprite.x as u8 as i8) as i32,
                    self.anchor.y as i32 + (sprite.y as u8 as i8) as i32,
                )
            } else {
                (sprite.x as i32, sprite.y as i32)
            };
            let height = 16i32 << sprite.scale_y;
            let line = y - base_y;
            if line < 0 || line >= height {
                continue;
            }
            let width = 16i32 << sprite.scale_x;
            let x0 = base_x;
            if x0 + width <= self.eff_x1 || x0 > self.eff_x2 {
                continue;
            }

            let row = (line >> sprite.scale_y) as usize;
            for col_out in 0..width {
                if budget <= 0 {
                    if !self.too_many_per_line {
                        debug!("sprite budget exhausted on line {y}");
                    }
                    self.too_many_per_line = true;
                    return;
                }
                budget -= 1;

                let x = x0 + col_out;
                if x < self.eff_x1 {
                    continue;
                }
                if x > self.eff_x2 || x >= 320 {
                    break;
                }
                let col = (col_out >> sprite.scale_x) as usize;

                let palette_index = if sprite.four_bit {
                    match self.sample_4bit(&sprite, row, col) {
                        Some(nibble) => (sprite.palette_offset << 4) | nibble,
                        None => continue,
                    }
                } else {
                    let byte = self.pattern_byte(
                        sprite.pattern7 & 0x3f,
                        sprite.variant,
                        (row << 4) | col,
                    );
                    if byte == self.transparency_index {
                        continue;
                    }
                    let upper = ((byte >> 4) + sprite.palette_offset) & 0x0f;
                    (upper << 4) | (byte & 0x0f)
                };

                let cell = &mut self.line_buffer[x as usize];
                if cell.valid {
                    self.collision = true;
                    if self.sprite0_on_top {
                        continue;
                    }
                }
                *cell = LineCell {
                    valid: true,
                    index: palette_index,
                };
            }
        }
    }

    /// 4-bit patterns pack two 16x16 cells into one 256-byte slot; the
    /// transform is inverted at sample time against the identity copy.
    fn sample_4bit(&self, sprite: &SpriteAttr, row: usize, col: usize) -> Option<u8> {
        let (sx, sy) = if sprite.rotate {
            let sx = if sprite.mirror_x { 15 - row } else { row };
            let sy = if sprite.mirror_y { col } else { 15 - col };
            (sx, sy)
        } else {
            let sy = if sprite.mirror_y { 15 - row } else { row };
            let sx = if sprite.mirror_x { 15 - col } else { col };
            (sx, sy)
        };
        let linear = (sy << 4) | sx;
        let slot = sprite.pattern7 >> 1;
        let half = (sprite.pattern7 & 0x01) as usize;
        let byte = self.pattern_byte(slot, 0, half * 128 + (linear >> 1));
        let nibble = if linear & 0x01 == 0 {
            byte >> 4
        } else {
            byte & 0x0f
        };
        if nibble == self.transparency_index & 0x0f {
            None
        } else {
            Some(nibble)
        }
    }
}

impl<M: VideoMemory, P: PaletteSource> ComposedScreen<M, P> {
    pub(crate) fn render_sprites(&mut self, vc: i32, hc: i32, cell: SpriteCell) {
        if !cell.contains(SpriteCell::DISPLAY_AREA) {
            return;
        }
        let x = hc - self.config.display_x_start + 32;
        let y = vc - self.config.display_y_start + 32;
        if !(0..320).contains(&x) || !(0..256).contains(&y) {
            return;
        }
        if self.sprites.line_y != y {
            self.sprites.build_line(y);
        }
        let entry = self.sprites.line_buffer[x as usize];
        if !entry.valid {
            return;
        }
        let rgb333 = self.pal.sprite_rgb333(entry.index);
        self.sprite_px[0] = LayerPixel {
            rgb333,
            opaque: true,
        };
        self.sprite_px[1] = self.sprite_px[0];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> SpriteEngine {
        SpriteEngine::new()
    }

    fn upload_pattern(e: &mut SpriteEngine, pattern: u8, value: u8) {
        e.write_select(pattern & 0x3f);
        for _ in 0..256 {
            e.write_pattern_stream(value);
        }
    }

    fn upload_sprite(e: &mut SpriteEngine, index: u8, bytes: &[u8]) {
        e.write_select(index);
        for &b in bytes {
            e.write_attribute_stream(b);
        }
    }

    #[test]
    fn test_attribute_round_trip_five_bytes() {
        let mut e = engine();
        upload_sprite(&mut e, 5, &[0x34, 0x56, 0x1b, 0xc2, 0xcb]);
        let s = e.sprites[5];
        assert_eq!(s.x, 0x134); // attr2 bit 0 is X bit 8
        assert_eq!(s.y, 0x156); // attr4 bit 0 is Y bit 8
        assert_eq!(s.palette_offset, 1);
        assert!(s.mirror_x);
        assert!(!s.mirror_y);
        assert!(s.rotate);
        assert!(s.visible);
        assert!(s.has_attr4);
        assert_eq!(s.pattern, 2);
        assert!(s.four_bit);
        assert!(s.pattern_bit6);
        assert_eq!(s.pattern7, 0x42);
        assert_eq!(s.scale_x, 1);
        assert_eq!(s.scale_y, 1);
        assert_eq!(s.variant, 0b110); // rotate + mirror X
    }

    #[test]
    fn test_compact_form_skips_and_clears_byte4() {
        let mut e = engine();
        // Give sprite 0 byte-4 state first, then rewrite in compact form.
        upload_sprite(&mut e, 0, &[0, 0, 0, 0x40, 0x5f]);
        assert_eq!(e.sprites[0].scale_x, 3);
        assert!(e.sprites[0].relative);
        upload_sprite(&mut e, 0, &[10, 20, 0, 0x81]);
        let s = e.sprites[0];
        assert!(s.visible);
        assert!(!s.four_bit);
        assert!(!s.relative);
        assert_eq!(s.scale_x, 0);
        assert_eq!(s.scale_y, 0);
        assert_eq!(s.y, 20);
        assert_eq!(s.pattern7, 1);
        // The stream advanced to the next sprite.
        assert_eq!(e.sprite_index, 1);
        assert_eq!(e.sprite_sub, 0);
    }

    #[test]
    fn test_pattern_variants_agree_with_transforms() {
        let mut e = engine();
        e.write_select(0);
        for i in 0..256u16 {
            e.write_pattern_stream(i as u8);
        }
        // Identity keeps the linear layout.
        assert_eq!(e.pattern_byte(0, 0, 0x23), 0x23);
        // Mirror Y flips rows: (2,3) holds source (13,3).
        assert_eq!(e.pattern_byte(0, 1, 0x23), 0xd3);
        // Mirror X flips columns: (2,3) holds source (2,12).
        assert_eq!(e.pattern_byte(0, 2, 0x23), 0x2c);
        // Rotate: dest (x, 15-y) of source (y, x); dest (2,3) is source (12,2).
        assert_eq!(e.pattern_byte(0, 4, 0x23), 0xc2);
    }

    #[test]
    fn test_line_buffer_covers_sprite_extent() {
        let mut e = engine();
        upload_pattern(&mut e, 0, 0x11);
        upload_sprite(&mut e, 0, &[100, 50, 0, 0x80]);
        e.build_line(50);
        assert!(!e.line_buffer[99].valid);
        for x in 100..116 {
            assert!(e.line_buffer[x].valid, "x {x}");
            assert_eq!(e.line_buffer[x].index, 0x11);
        }
        assert!(!e.line_buffer[116].valid);
        assert_eq!(e.read_status(), 0);
    }

    #[test]
    fn test_transparent_bytes_leave_no_entry() {
        let mut e = engine();
        upload_pattern(&mut e, 0, 0xe3);
        upload_sprite(&mut e, 0, &[100, 50, 0, 0x80]);
        e.build_line(50);
        for x in 100..116 {
            assert!(!e.line_buffer[x].valid);
        }
    }

    #[test]
    fn test_collision_needs_two_opaque_writers() {
        let mut e = engine();
        upload_pattern(&mut e, 0, 0x11);
        upload_sprite(&mut e, 0, &[100, 50, 0, 0x80]);
        e.build_line(50);
        assert_eq!(e.read_status() & 0x01, 0);

        upload_sprite(&mut e, 1, &[110, 50, 0, 0x80]);
        e.build_line(50);
        assert_eq!(e.read_status() & 0x01, 0x01);
        // Reading cleared the flag.
        assert_eq!(e.read_status(), 0);
    }

    #[test]
    fn test_sprite0_on_top_suppresses_overwrite() {
        let mut e = engine();
        upload_pattern(&mut e, 0, 0x11);
        upload_pattern(&mut e, 1, 0x22);
        upload_sprite(&mut e, 0, &[100, 50, 0, 0x80]);
        upload_sprite(&mut e, 1, &[110, 50, 0, 0x81]);

        e.build_line(50);
        assert_eq!(e.line_buffer[112].index, 0x22);

        e.sprite0_on_top = true;
        e.build_line(50);
        assert_eq!(e.line_buffer[112].index, 0x11);
        assert_eq!(e.line_buffer[118].index, 0x22);
    }

    #[test]
    fn test_scaled_sprite_doubles_width_and_height() {
        let mut e = engine();
        upload_pattern(&mut e, 0, 0x11);
        // attr4 = scaleX 1, scaleY 1.
        upload_sprite(&mut e, 0, &[100, 50, 0, 0xc0, 0x0a]);
        e.build_line(50 + 20); // row 20 of 32
        assert!(e.line_buffer[100].valid);
        assert!(e.line_buffer[131].valid);
        assert!(!e.line_buffer[132].valid);
    }

    #[test]
    fn test_budget_exhaustion_sets_overtime() {
        let mut e = engine();
        upload_pattern(&mut e, 0, 0x11);
        // 128 sprites x (1 qualify + 16 columns) = 2176 > 1824.
        for i in 0..128 {
            upload_sprite(&mut e, i, &[64, 50, 0, 0x80]);
        }
        e.build_line(50);
        assert_eq!(e.read_status() & 0x02, 0x02);
        // Sticky until read, then clear.
        assert_eq!(e.read_status(), 0);
    }

    #[test]
    fn test_clip_window_limits_columns() {
        let mut e = engine();
        upload_pattern(&mut e, 0, 0x11);
        upload_sprite(&mut e, 0, &[100, 50, 0, 0x80]);
        // Clip to X 70..=75 in display space (102..=107 in sprite space).
        e.write_clip(70);
        e.write_clip(75);
        e.write_clip(0);
        e.write_clip(191);
        e.build_line(50);
        assert!(!e.line_buffer[101].valid);
        assert!(e.line_buffer[102].valid);
        assert!(e.line_buffer[107].valid);
        assert!(!e.line_buffer[108].valid);
    }

    #[test]
    fn test_over_border_unclipped_spans_full_space() {
        let mut e = engine();
        upload_pattern(&mut e, 0, 0x11);
        upload_sprite(&mut e, 0, &[10, 10, 0, 0x80]);
        // Default window excludes the border area.
        e.build_line(10);
        assert!(!e.line_buffer[10].valid);

        e.set_border_flags(true, false);
        e.build_line(10);
        assert!(e.line_buffer[10].valid);
    }

    #[test]
    fn test_anchor_state_starts_cleared() {
        let e = engine();
        assert_eq!(e.anchor, SpriteAnchor::default());
    }

    #[test]
    fn test_anchor_latched_by_attr2_write_of_five_byte_sprite() {
        let mut e = engine();
        e.write_indexed_attribute(0, 0, 0x42);
        e.write_indexed_attribute(0, 1, 0x50);
        e.write_indexed_attribute(0, 3, 0x40); // five-byte record
        e.write_indexed_attribute(0, 4, 0x00);
        e.write_indexed_attribute(0, 2, 0xfe); // all transform bits, X MSB clear
        assert_eq!(e.anchor.x, 0x42);
        assert_eq!(e.anchor.y, 0x50);
        assert!(e.anchor.rotate);
        assert!(e.anchor.mirror_x);
        assert!(e.anchor.mirror_y);

        // A later anchor replaces the latched state.
        e.write_indexed_attribute(3, 0, 0xff);
        e.write_indexed_attribute(3, 1, 0x30);
        e.write_indexed_attribute(3, 3, 0x40);
        e.write_indexed_attribute(3, 4, 0x00);
        e.write_indexed_attribute(3, 2, 0xf1); // X MSB, no transforms
        assert_eq!(e.anchor.x, 0x1ff);
        assert_eq!(e.anchor.y, 0x30);
        assert!(!e.anchor.rotate);
        assert!(!e.anchor.mirror_x);
        assert!(!e.anchor.mirror_y);
    }

    #[test]
    fn test_relative_and_four_byte_sprites_leave_anchor_alone() {
        let mut e = engine();
        e.write_indexed_attribute(0, 0, 0x10);
        e.write_indexed_attribute(0, 1, 0x20);
        e.write_indexed_attribute(0, 3, 0x40);
        e.write_indexed_attribute(0, 4, 0x00);
        e.write_indexed_attribute(0, 2, 0xf0);
        assert_eq!(e.anchor.x, 0x10);

        // Relative sprite: attr4 bits 7:6 = 01.
        e.write_indexed_attribute(1, 0, 0x55);
        e.write_indexed_attribute(1, 1, 0x66);
        e.write_indexed_attribute(1, 3, 0x40);
        e.write_indexed_attribute(1, 4, 0x45);
        e.write_indexed_attribute(1, 2, 0xfe);
        assert_eq!(e.anchor.x, 0x10);
        assert_eq!(e.anchor.y, 0x20);

        // Four-byte sprite: never an anchor.
        e.write_indexed_attribute(2, 0, 0x77);
        e.write_indexed_attribute(2, 3, 0x00);
        e.write_indexed_attribute(2, 2, 0xf8);
        assert_eq!(e.anchor.x, 0x10);
        assert!(!e.anchor.mirror_x);
    }

    #[test]
    fn test_relative_sprites_render_at_anchor_offset() {
        let mut e = engine();
        upload_pattern(&mut e, 0, 0x11);
        // Anchor at (100, 50); the attr2 write latches the anchor state.
        e.write_indexed_attribute(0, 0, 100);
        e.write_indexed_attribute(0, 1, 50);
        e.write_indexed_attribute(0, 3, 0xc0);
        e.write_indexed_attribute(0, 4, 0x00);
        e.write_indexed_attribute(0, 2, 0x00);
        // Relative sprite at (+20, 0).
        e.write_indexed_attribute(1, 0, 20);
        e.write_indexed_attribute(1, 1, 0);
        e.write_indexed_attribute(1, 3, 0xc0);
        e.write_indexed_attribute(1, 4, 0x40);
        // Relative sprite at (-10, 0).
        e.write_indexed_attribute(2, 0, 0xf6);
        e.write_indexed_attribute(2, 1, 0);
        e.write_indexed_attribute(2, 3, 0xc0);
        e.write_indexed_attribute(2, 4, 0x40);

        e.build_line(50);
        assert!(!e.line_buffer[89].valid);
        assert!(e.line_buffer[90].valid, "negative offset start");
        assert!(e.line_buffer[120].valid, "positive offset start");
        assert!(e.line_buffer[135].valid);
        assert!(!e.line_buffer[136].valid);

        // One row below the anchor the relative sprites follow along.
        e.build_line(51);
        assert!(e.line_buffer[120].valid);
    }

    #[test]
    fn test_relative_attr4_reads_pattern_bit_from_bit5() {
        let mut e = engine();
        e.write_indexed_attribute(0, 0, 0);
        e.write_indexed_attribute(0, 1, 0);
        e.write_indexed_attribute(0, 3, 0x42);
        e.write_indexed_attribute(0, 4, 0x60); // relative, pattern bit 6 set
        let s = e.sprites[0];
        assert!(s.relative);
        assert!(!s.four_bit);
        assert_eq!(s.pattern7, 0x42);
    }

    #[test]
    fn test_4bit_pattern_selects_half_and_nibble() {
        let mut e = engine();
        // Keep nibbles 3 and 4 opaque.
        e.set_transparency_index(0x0f);
        // Fill pattern 0: first half 0x12 repeated, second half 0x34.
        e.write_select(0);
        for i in 0..256 {
            e.write_pattern_stream(if i < 128 { 0x12 } else { 0x34 });
        }
        // 4-bit sprite, pattern7 = 1 selects the second half of slot 0.
        upload_sprite(&mut e, 0, &[100, 50, 0, 0xc1, 0x80]);
        e.build_line(50);
        assert!(e.line_buffer[100].valid);
        assert_eq!(e.line_buffer[100].index, 0x03);
        assert_eq!(e.line_buffer[101].index, 0x04);
    }
}
