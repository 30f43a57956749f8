//! Frame timing and per-tact activity cells.
//!
//! One tact is one CLK_7 pixel-clock step; a frame is `total_vc * 456` tacts.
//! For every tact and every layer family a precomputed "activity cell" says
//! what the hardware does there (fetches, sampling, pixel output). A cell of
//! zero means blanking, and blanking lines up across all families: whenever
//! the ULA cell is empty, every other family's cell is empty too, which lets
//! the renderer short-circuit on the ULA word alone.

use bitflags::bitflags;

/// Output bitmap width in pixels (360 visible tacts, two pixels each).
pub const BITMAP_WIDTH: usize = 720;
/// Output bitmap height in pixels.
pub const BITMAP_HEIGHT: usize = 288;

/// Tacts per scanline, identical in both timing modes.
pub const HC_PER_LINE: u32 = 456;

/// Machine timing parameters for one refresh mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingConfig {
    pub total_vc: u32,
    /// First/last horizontal counter value of the 256-pixel display area.
    pub display_x_start: i32,
    pub display_x_end: i32,
    /// First/last vertical counter value of the 192-line display area.
    pub display_y_start: i32,
    pub display_y_end: i32,
    /// First horizontal counter value rendered to the bitmap.
    pub first_visible_hc: i32,
    /// First/last vertical counter value rendered to the bitmap.
    pub first_visible_vc: i32,
    pub last_visible_vc: i32,
    /// VC value mapping to bitmap row 0 (may be negative: the 60 Hz frame
    /// is centered inside the 288-row bitmap).
    pub first_bitmap_vc: i32,
    /// Tact range of the frame interrupt pulse.
    pub int_start_tact: u32,
    pub int_end_tact: u32,
}

pub const PLUS3_50HZ: TimingConfig = TimingConfig {
    total_vc: 312,
    display_x_start: 144,
    display_x_end: 399,
    display_y_start: 64,
    display_y_end: 255,
    first_visible_hc: 96,
    first_visible_vc: 16,
    last_visible_vc: 303,
    first_bitmap_vc: 16,
    int_start_tact: 0,
    int_end_tact: 64,
};

pub const PLUS3_60HZ: TimingConfig = TimingConfig {
    total_vc: 262,
    display_x_start: 144,
    display_x_end: 399,
    display_y_start: 40,
    display_y_end: 231,
    first_visible_hc: 96,
    first_visible_vc: 16,
    last_visible_vc: 255,
    first_bitmap_vc: -8,
    int_start_tact: 0,
    int_end_tact: 64,
};

impl TimingConfig {
    pub fn tacts_per_frame(&self) -> u32 {
        self.total_vc * HC_PER_LINE
    }

    fn is_visible(&self, vc: i32, hc: i32) -> bool {
        vc >= self.first_visible_vc && vc <= self.last_visible_vc && hc >= self.first_visible_hc
    }

    fn is_display(&self, vc: i32, hc: i32) -> bool {
        vc >= self.display_y_start
            && vc <= self.display_y_end
            && hc >= self.display_x_start
            && hc <= self.display_x_end
    }

    /// The 320x256 wide area used by Layer 2 320/640 modes, the tilemap and
    /// the sprite engine. Extends 32 tacts left/right and 32 lines up/down
    /// from the display area, clamped to the visible region.
    fn is_wide(&self, vc: i32, hc: i32) -> bool {
        self.is_visible(vc, hc)
            && vc >= self.display_y_start - 32
            && vc <= self.display_y_start + 223
            && hc >= self.display_x_start - 32
            && hc <= self.display_x_start + 287
    }
}

bitflags! {
    /// ULA-family activity flags for one tact.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct UlaCell: u16 {
        const DISPLAY_AREA        = 0x0001;
        const BORDER_AREA         = 0x0002;
        const CONTENTION_WINDOW   = 0x0004;
        const NREG_SAMPLE         = 0x0008;
        const BYTE1_READ          = 0x0010;
        const BYTE2_READ          = 0x0020;
        const SHIFT_REG_LOAD      = 0x0040;
        const FLOATING_BUS_UPDATE = 0x0080;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Layer2Cell: u16 {
        const DISPLAY_AREA = 0x0001;
        const BORDER_AREA  = 0x0002;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SpriteCell: u16 {
        const DISPLAY_AREA     = 0x0001;
        const LINE_BUFFER_READ = 0x0002;
        const VISIBILITY_CHECK = 0x0004;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TilemapCell: u16 {
        const DISPLAY_AREA     = 0x0001;
        const TILE_INDEX_FETCH = 0x0002;
        const PATTERN_FETCH    = 0x0004;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LoResCell: u16 {
        const DISPLAY_AREA    = 0x0001;
        const BORDER_AREA     = 0x0002;
        const NREG_SAMPLE     = 0x0008;
        const BLOCK_FETCH     = 0x0010;
        const PIXEL_REPLICATE = 0x0020;
    }
}

/// Per-tact lookup tables for one timing mode, built once at construction.
pub struct TimingTables {
    pub config: TimingConfig,
    pub ula: Vec<UlaCell>,
    pub layer2_256: Vec<Layer2Cell>,
    pub layer2_320: Vec<Layer2Cell>,
    pub layer2_640: Vec<Layer2Cell>,
    pub sprites: Vec<SpriteCell>,
    pub tilemap: Vec<TilemapCell>,
    pub lores: Vec<LoResCell>,
    pub to_hc: Vec<u16>,
    pub to_vc: Vec<u16>,
    /// Bitmap pixel offset of the tact's first pixel, -1 outside the
    /// visible area.
    pub bitmap_offset: Vec<i32>,
}

impl TimingTables {
    pub fn build(config: TimingConfig) -> Self {
        let tacts = config.tacts_per_frame() as usize;
        let mut tables = Self {
            config,
            ula: vec![UlaCell::empty(); tacts],
            layer2_256: vec![Layer2Cell::empty(); tacts],
            layer2_320: vec![Layer2Cell::empty(); tacts],
            layer2_640: vec![Layer2Cell::empty(); tacts],
            sprites: vec![SpriteCell::empty(); tacts],
            tilemap: vec![TilemapCell::empty(); tacts],
            lores: vec![LoResCell::empty(); tacts],
            to_hc: vec![0; tacts],
            to_vc: vec![0; tacts],
            bitmap_offset: vec![-1; tacts],
        };

        for vc in 0..config.total_vc as i32 {
            for hc in 0..HC_PER_LINE as i32 {
                let tact = (vc * HC_PER_LINE as i32 + hc) as usize;
                tables.to_hc[tact] = hc as u16;
                tables.to_vc[tact] = vc as u16;

                if !config.is_visible(vc, hc) {
                    continue;
                }

                let y = vc - config.first_bitmap_vc;
                if y >= 0 && y < BITMAP_HEIGHT as i32 {
                    let x = (hc - config.first_visible_hc) * 2;
                    tables.bitmap_offset[tact] = y * BITMAP_WIDTH as i32 + x;
                }

                let display = config.is_display(vc, hc);
                let display_row = vc >= config.display_y_start && vc <= config.display_y_end;
                let wide = config.is_wide(vc, hc);

                tables.ula[tact] = Self::ula_cell(&config, vc, hc, display, display_row);
                tables.lores[tact] = Self::lores_cell(&config, vc, hc, display, display_row);

                if display {
                    tables.layer2_256[tact] = Layer2Cell::DISPLAY_AREA;
                } else {
                    tables.layer2_256[tact] = Layer2Cell::BORDER_AREA;
                }
                if wide {
                    tables.layer2_320[tact] = Layer2Cell::DISPLAY_AREA;
                    tables.layer2_640[tact] = Layer2Cell::DISPLAY_AREA;
                    tables.sprites[tact] = SpriteCell::DISPLAY_AREA
                        | SpriteCell::LINE_BUFFER_READ
                        | SpriteCell::VISIBILITY_CHECK;
                    tables.tilemap[tact] = TilemapCell::DISPLAY_AREA
                        | TilemapCell::TILE_INDEX_FETCH
                        | TilemapCell::PATTERN_FETCH;
                } else {
                    tables.layer2_320[tact] = Layer2Cell::BORDER_AREA;
                    tables.layer2_640[tact] = Layer2Cell::BORDER_AREA;
                }
            }
        }
        tables
    }

    fn ula_cell(
        config: &TimingConfig,
        _vc: i32,
        hc: i32,
        display: bool,
        display_row: bool,
    ) -> UlaCell {
        let mut cell = if display {
            UlaCell::DISPLAY_AREA
        } else {
            UlaCell::BORDER_AREA
        };

        // Memory fetches start 16 tacts before the display area opens.
        let fetch_window =
            display_row && hc >= config.display_x_start - 16 && hc <= config.display_x_end;
        if fetch_window {
            let sub = hc & 0x0f;
            if sub == 0x07 || sub == 0x0f {
                cell |= UlaCell::NREG_SAMPLE;
            }
            if sub & 0x03 == 0x00 {
                cell |= UlaCell::BYTE1_READ;
            }
            if sub & 0x03 == 0x02 {
                cell |= UlaCell::BYTE2_READ;
            }
            if sub == 0x00 || sub == 0x08 {
                cell |= UlaCell::SHIFT_REG_LOAD;
            }
            if display && (sub == 0x05 || sub == 0x07 || sub == 0x09 || sub == 0x0b) {
                cell |= UlaCell::FLOATING_BUS_UPDATE;
            }
        }
        if display && (hc & 0x07) < 6 {
            cell |= UlaCell::CONTENTION_WINDOW;
        }
        cell
    }

    fn lores_cell(
        config: &TimingConfig,
        _vc: i32,
        hc: i32,
        display: bool,
        display_row: bool,
    ) -> LoResCell {
        let mut cell = if display {
            LoResCell::DISPLAY_AREA | LoResCell::BLOCK_FETCH | LoResCell::PIXEL_REPLICATE
        } else {
            LoResCell::BORDER_AREA
        };
        let fetch_window =
            display_row && hc >= config.display_x_start - 16 && hc <= config.display_x_end;
        if fetch_window {
            let sub = hc & 0x0f;
            if sub == 0x07 || sub == 0x0f {
                cell |= LoResCell::NREG_SAMPLE;
            }
        }
        cell
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blanking_is_shared_across_families() {
        for config in [PLUS3_50HZ, PLUS3_60HZ] {
            let t = TimingTables::build(config);
            for tact in 0..config.tacts_per_frame() as usize {
                if t.ula[tact].is_empty() {
                    assert!(t.layer2_256[tact].is_empty());
                    assert!(t.layer2_320[tact].is_empty());
                    assert!(t.layer2_640[tact].is_empty());
                    assert!(t.sprites[tact].is_empty());
                    assert!(t.tilemap[tact].is_empty());
                    assert!(t.lores[tact].is_empty());
                    assert_eq!(t.bitmap_offset[tact], -1);
                }
            }
        }
    }

    #[test]
    fn test_hc_vc_round_trip() {
        let t = TimingTables::build(PLUS3_50HZ);
        for tact in (0..PLUS3_50HZ.tacts_per_frame()).step_by(997) {
            let hc = t.to_hc[tact as usize] as u32;
            let vc = t.to_vc[tact as usize] as u32;
            assert_eq!(vc * HC_PER_LINE + hc, tact);
        }
    }

    #[test]
    fn test_bitmap_offsets_stay_in_bounds() {
        for config in [PLUS3_50HZ, PLUS3_60HZ] {
            let t = TimingTables::build(config);
            for &offset in &t.bitmap_offset {
                assert!(offset >= -1);
                assert!(offset + 2 <= (BITMAP_WIDTH * BITMAP_HEIGHT) as i32);
            }
        }
    }

    #[test]
    fn test_60hz_frame_is_vertically_centered() {
        let t = TimingTables::build(PLUS3_60HZ);
        // First visible row lands on bitmap row 24.
        let tact = (16 * HC_PER_LINE + 96) as usize;
        assert_eq!(t.bitmap_offset[tact], 24 * BITMAP_WIDTH as i32);
        // Last visible row lands on bitmap row 263.
        let tact = (255 * HC_PER_LINE + 96) as usize;
        assert_eq!(t.bitmap_offset[tact], 263 * BITMAP_WIDTH as i32);
    }

    #[test]
    fn test_ula_fetch_schedule() {
        let t = TimingTables::build(PLUS3_50HZ);
        let vc = 100;
        // 16 tacts before the display opens, byte 1 of the first column.
        let tact = (vc * HC_PER_LINE as i32 + 128) as usize;
        assert!(t.ula[tact].contains(UlaCell::BYTE1_READ));
        assert!(t.ula[tact].contains(UlaCell::SHIFT_REG_LOAD));
        assert!(t.ula[tact].contains(UlaCell::BORDER_AREA));
        let tact = (vc * HC_PER_LINE as i32 + 130) as usize;
        assert!(t.ula[tact].contains(UlaCell::BYTE2_READ));
        let tact = (vc * HC_PER_LINE as i32 + 135) as usize;
        assert!(t.ula[tact].contains(UlaCell::NREG_SAMPLE));
        // Floating bus updates only inside the display area.
        let tact = (vc * HC_PER_LINE as i32 + 149) as usize;
        assert!(t.ula[tact].contains(UlaCell::FLOATING_BUS_UPDATE));
        let tact = (vc * HC_PER_LINE as i32 + 133) as usize;
        assert!(!t.ula[tact].contains(UlaCell::FLOATING_BUS_UPDATE));
    }

    #[test]
    fn test_wide_area_covers_border() {
        let t = TimingTables::build(PLUS3_50HZ);
        // 32 tacts left of the display area, 32 lines above it.
        let tact = ((64 - 32) * HC_PER_LINE as i32 + 112) as usize;
        assert!(t.sprites[tact].contains(SpriteCell::DISPLAY_AREA));
        assert!(t.tilemap[tact].contains(TilemapCell::DISPLAY_AREA));
        assert!(t.layer2_320[tact].contains(Layer2Cell::DISPLAY_AREA));
        // The standard Layer 2 area does not.
        assert!(!t.layer2_256[tact].contains(Layer2Cell::DISPLAY_AREA));
    }
}
