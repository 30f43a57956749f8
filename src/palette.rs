//! Palette seam and color conversion helpers.
//!
//! The palette device is external to the renderer: lookups arrive through
//! [`PaletteSource`] as 9-bit RGB333 values (Layer 2 entries carry a tenth
//! bit, the per-pixel priority flag). Conversion to the output BGRA format
//! goes through a fixed 512-entry table.

/// Priority flag carried in bit 9 of Layer 2 palette entries.
pub const LAYER2_PRIORITY_BIT: u16 = 0x200;

/// Resolves palette indices to RGB333 colors for each layer.
pub trait PaletteSource {
    fn ula_rgb333(&self, index: u8) -> u16;
    /// Bit 9 of the returned value is the Layer 2 priority flag.
    fn layer2_rgb333(&self, index: u8) -> u16;
    fn tilemap_rgb333(&self, index: u8) -> u16;
    fn sprite_rgb333(&self, index: u8) -> u16;
}

/// The 16 standard Spectrum colors as RGB333 (non-bright then bright).
pub const DEFAULT_ULA_COLORS: [u16; 16] = [
    0x000, 0x005, 0x140, 0x145, 0x028, 0x02d, 0x168, 0x16d,
    0x000, 0x007, 0x1c0, 0x1c7, 0x038, 0x03f, 0x1f8, 0x1ff,
];

/// Expands an 8-bit RGB332 value to RGB333. The low blue bit becomes the
/// OR of the two blue source bits.
pub fn rgb332_to_rgb333(value: u8) -> u16 {
    ((value as u16) << 1) | (((value >> 1) | value) as u16 & 1)
}

/// RGB333 to 0xAABBGGRR with 3-to-8 bit channel expansion.
static RGB333_TO_BGRA: [u32; 512] = build_bgra_table();

const fn build_bgra_table() -> [u32; 512] {
    let mut table = [0u32; 512];
    let mut rgb = 0usize;
    while rgb < 512 {
        let r = ((rgb >> 6) & 0x07) as u32;
        let g = ((rgb >> 3) & 0x07) as u32;
        let b = (rgb & 0x07) as u32;
        let r8 = (r << 5) | (r << 2) | (r >> 1);
        let g8 = (g << 5) | (g << 2) | (g >> 1);
        let b8 = (b << 5) | (b << 2) | (b >> 1);
        table[rgb] = 0xff00_0000 | (b8 << 16) | (g8 << 8) | r8;
        rgb += 1;
    }
    table
}

/// Converts an RGB333 color to the output pixel format.
pub fn rgb333_to_bgra(rgb333: u16) -> u32 {
    RGB333_TO_BGRA[(rgb333 & 0x1ff) as usize]
}

/// Hardware reset palette: every entry is the RGB332 expansion of its own
/// index, except the ULA palette, whose ink and paper halves start with the
/// 16 standard Spectrum colors. No Layer 2 entry has the priority bit set.
pub struct DefaultPalette {
    pub ula: [u16; 256],
    pub layer2: [u16; 256],
    pub tilemap: [u16; 256],
    pub sprites: [u16; 256],
}

impl DefaultPalette {
    pub fn new() -> Self {
        let mut ula = [0u16; 256];
        let mut flat = [0u16; 256];
        for i in 0..256 {
            let expanded = rgb332_to_rgb333(i as u8);
            flat[i] = expanded;
            ula[i] = if (i & 0x7f) < 16 {
                DEFAULT_ULA_COLORS[i & 0x0f]
            } else {
                expanded
            };
        }
        Self {
            ula,
            layer2: flat,
            tilemap: flat,
            sprites: flat,
        }
    }
}

impl Default for DefaultPalette {
    fn default() -> Self {
        Self::new()
    }
}

impl PaletteSource for DefaultPalette {
    fn ula_rgb333(&self, index: u8) -> u16 {
        self.ula[index as usize]
    }

    fn layer2_rgb333(&self, index: u8) -> u16 {
        self.layer2[index as usize]
    }

    fn tilemap_rgb333(&self, index: u8) -> u16 {
        self.tilemap[index as usize]
    }

    fn sprite_rgb333(&self, index: u8) -> u16 {
        self.sprites[index as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb332_expansion_sets_low_blue_bit() {
        assert_eq!(rgb332_to_rgb333(0x00), 0x000);
        assert_eq!(rgb332_to_rgb333(0x01), 0x003);
        assert_eq!(rgb332_to_rgb333(0x02), 0x005);
        assert_eq!(rgb332_to_rgb333(0x03), 0x007);
        assert_eq!(rgb332_to_rgb333(0xff), 0x1ff);
    }

    #[test]
    fn test_bgra_channel_expansion() {
        // All channels 7 expand to 0xff.
        assert_eq!(rgb333_to_bgra(0x1ff), 0xffff_ffff);
        assert_eq!(rgb333_to_bgra(0x000), 0xff00_0000);
        // Pure red (r=7): only the low byte carries color.
        assert_eq!(rgb333_to_bgra(0x1c0), 0xff00_00ff);
        // Pure blue (b=7).
        assert_eq!(rgb333_to_bgra(0x007), 0xffff_0000);
    }

    #[test]
    fn test_default_palette_spectrum_colors() {
        let pal = DefaultPalette::new();
        assert_eq!(pal.ula_rgb333(7), 0x16d);
        assert_eq!(pal.ula_rgb333(15), 0x1ff);
        // Paper half mirrors the ink half.
        assert_eq!(pal.ula_rgb333(128 + 7), 0x16d);
        // Everything else is the RGB332 expansion.
        assert_eq!(pal.ula_rgb333(0xe3), rgb332_to_rgb333(0xe3));
        assert_eq!(pal.layer2_rgb333(0xe3), rgb332_to_rgb333(0xe3));
    }
}
