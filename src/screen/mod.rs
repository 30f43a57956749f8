//! The composited screen device.
//!
//! `ComposedScreen` owns every video register, the per-mode lookup tables and
//! the output bitmap. The host drives it with `render_tact` (one CLK_7 step)
//! or `render_full_screen`, and pokes registers through the port/NextReg
//! accessors; every setter keeps its dependent caches current so the hot path
//! never recomputes them.

pub mod compose;
pub mod layer2;
pub mod sprites;
pub mod tilemap;
pub mod timing;
pub mod ula;


use log::debug;

use crate::memory::VideoMemory;
use crate::palette::{rgb332_to_rgb333, PaletteSource};
use layer2::Layer2State;
use sprites::SpriteEngine;
pub use sprites::SpriteAnchor;
use tilemap::TilemapState;
use timing::{TimingConfig, TimingTables, PLUS3_50HZ, PLUS3_60HZ};
use ula::UlaTables;

pub use timing::{BITMAP_HEIGHT, BITMAP_WIDTH};

pub(crate) const BITMAP_SIZE: usize = BITMAP_WIDTH * BITMAP_HEIGHT;

/// One layer's contribution to the current pixel pair. A non-opaque entry
/// either produced nothing this tact or resolved to transparent.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct LayerPixel {
    pub rgb333: u16,
    pub opaque: bool,
}

/// Rotating 4-coordinate clip window (X1, X2, Y1, Y2), written one byte at
/// a time through a single NextReg.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ClipWindow {
    pub x1: u8,
    pub x2: u8,
    pub y1: u8,
    pub y2: u8,
    index: u8,
}

impl ClipWindow {
    fn new(x2: u8, y2: u8) -> Self {
        Self {
            x1: 0,
            x2,
            y1: 0,
            y2,
            index: 0,
        }
    }

    pub(crate) fn read(&self) -> u8 {
        match self.index {
            0 => self.x1,
            1 => self.x2,
            2 => self.y1,
            _ => self.y2,
        }
    }

    pub(crate) fn write(&mut self, value: u8) {
        match self.index {
            0 => self.x1 = value,
            1 => self.x2 = value,
            2 => self.y1 = value,
            _ => self.y2 = value,
        }
        self.index = (self.index + 1) & 0x03;
    }

    pub(crate) fn reset_index(&mut self) {
        self.index = 0;
    }

    pub(crate) fn is_full(&self, x2: u8, y2: u8) -> bool {
        self.x1 == 0 && self.x2 == x2 && self.y1 == 0 && self.y2 == y2
    }
}

/// Tact-driven renderer for the Next's composited video output.
pub struct ComposedScreen<M: VideoMemory, P: PaletteSource> {
    pub(crate) mem: M,
    pub(crate) pal: P,

    // Timing tables for both refresh modes, built once.
    tables_50: TimingTables,
    tables_60: TimingTables,
    pub(crate) active_60hz: bool,
    pub(crate) config: TimingConfig,
    rendering_tacts: u32,
    pulse_int_active: bool,

    pub(crate) pixel_buffer: Vec<u32>,

    flash_counter: u8,
    pub(crate) flash_flag: bool,

    pub(crate) ula_tables: UlaTables,

    // Global colors
    border_color: u8,
    pub(crate) border_rgb_cache: u16,
    fallback_color: u8,
    pub(crate) fallback_rgb333_cache: u16,
    pub(crate) global_transparency_color: u8,

    // NextReg 0x05
    is_60hz_mode: bool,
    scandoubler_enabled: bool,

    // ULA control
    pub(crate) ula_scroll_x: u8,
    pub(crate) ula_scroll_y: u8,
    pub(crate) ula_clip: ClipWindow,
    disable_ula_output: bool,
    pub(crate) blending_mode: u8,
    ula_half_pixel_scroll: bool,
    pub(crate) stencil_mode: bool,
    pub(crate) ula_plus_enabled: bool,
    pub(crate) ula_next_enabled: bool,
    pub(crate) ula_next_format: u8,

    // Timex port 0xFF
    timex_port_bits: u8,
    standard_screen_at_0x4000: bool,
    ula_hires_mode: bool,
    ula_hicolor_mode: bool,
    ula_hires_color: u8,
    pub(crate) ula_hires_ink_rgb333: u16,
    pub(crate) ula_hires_paper_rgb333: u16,

    // Values sampled at NREG_SAMPLE cells
    pub(crate) ula_scroll_x_sampled: u8,
    pub(crate) ula_scroll_y_sampled: u8,
    pub(crate) ula_row: u16,
    pub(crate) disable_ula_output_sampled: bool,
    pub(crate) ula_hires_mode_sampled: bool,
    pub(crate) ula_hicolor_mode_sampled: bool,
    pub(crate) lores_enabled_sampled: bool,
    pub(crate) lores_radastan_sampled: bool,
    pub(crate) lores_scroll_x_sampled: u8,
    pub(crate) lores_scroll_y_sampled: u8,

    // ULA fetch pipeline
    pub(crate) ula_pixel_byte1: u8,
    pub(crate) ula_pixel_byte2: u8,
    pub(crate) ula_pixel_byte3: u8,
    pub(crate) ula_pixel_byte4: u8,
    pub(crate) ula_attr_byte1: u8,
    pub(crate) ula_attr_byte2: u8,
    pub(crate) ula_shift_reg: u16,
    pub(crate) ula_shift_attr: u8,
    pub(crate) ula_shift_attr2: u8,
    pub(crate) ula_shift_attr_count: u8,
    floating_bus_value: u8,

    // LoRes (NextReg 0x6A + reg 0x15 bit 7)
    lores_enabled: bool,
    lores_radastan: bool,
    pub(crate) lores_palette_offset: u8,
    pub(crate) lores_dfile: u8,
    pub(crate) lores_block_byte: u8,

    // Layer 2
    pub(crate) layer2_enabled: bool,
    pub(crate) layer2_resolution: u8,
    pub(crate) layer2_palette_offset: u8,
    pub(crate) layer2_scroll_x: u16,
    pub(crate) layer2_scroll_y: u8,
    pub(crate) layer2_clip: ClipWindow,
    pub(crate) layer2_active_bank: u8,
    pub(crate) layer2_shadow_bank: u8,
    pub(crate) layer2_use_shadow: bool,
    layer2_bank_select: u8,
    layer2_bank_offset: u8,
    layer2_map_reads: bool,
    layer2_map_writes: bool,
    pub(crate) layer2: Layer2State,

    // Tilemap
    pub(crate) tilemap_enabled: bool,
    pub(crate) tilemap_80x32: bool,
    pub(crate) tilemap_eliminate_attr: bool,
    pub(crate) tilemap_text_mode: bool,
    pub(crate) tilemap_512_tiles: bool,
    pub(crate) tilemap_force_on_top: bool,
    pub(crate) tilemap_default_attr: u8,
    pub(crate) tilemap_base: u8,
    pub(crate) tilemap_def_base: u8,
    pub(crate) tilemap_scroll_x: u16,
    pub(crate) tilemap_scroll_y: u8,
    pub(crate) tilemap_clip: ClipWindow,
    pub(crate) tilemap_transparency_index: u8,
    pub(crate) tilemap: TilemapState,

    // Composition (NextReg 0x15 bits [4:2])
    pub(crate) layer_priority: u8,
    pub(crate) sprites: SpriteEngine,

    // Per-tact scratch, reset at the start of every rendered tact
    pub(crate) ula_px: [LayerPixel; 2],
    pub(crate) layer2_px: [LayerPixel; 2],
    pub(crate) layer2_px_priority: [bool; 2],
    pub(crate) tilemap_px: [LayerPixel; 2],
    pub(crate) tilemap_px_below: [bool; 2],
    pub(crate) sprite_px: [LayerPixel; 2],
}

impl<M: VideoMemory, P: PaletteSource> ComposedScreen<M, P> {
    pub fn new(mem: M, pal: P) -> Self {
        let mut screen = Self {
            mem,
            pal,
            tables_50: TimingTables::build(PLUS3_50HZ),
            tables_60: TimingTables::build(PLUS3_60HZ),
            active_60hz: false,
            config: PLUS3_50HZ,
            rendering_tacts: PLUS3_50HZ.tacts_per_frame(),
            pulse_int_active: false,
            pixel_buffer: vec![0; BITMAP_SIZE],
            flash_counter: 0,
            flash_flag: false,
            ula_tables: UlaTables::new(),
            border_color: 7,
            border_rgb_cache: 0,
            fallback_color: 0,
            fallback_rgb333_cache: 0,
            global_transparency_color: 0xe3,
            is_60hz_mode: false,
            scandoubler_enabled: false,
            ula_scroll_x: 0,
            ula_scroll_y: 0,
            ula_clip: ClipWindow::new(255, 191),
            disable_ula_output: false,
            blending_mode: 0,
            ula_half_pixel_scroll: false,
            stencil_mode: false,
            ula_plus_enabled: false,
            ula_next_enabled: false,
            ula_next_format: 0x0f,
            timex_port_bits: 0,
            standard_screen_at_0x4000: true,
            ula_hires_mode: false,
            ula_hicolor_mode: false,
            ula_hires_color: 0,
            ula_hires_ink_rgb333: 0,
            ula_hires_paper_rgb333: 0,
            ula_scroll_x_sampled: 0,
            ula_scroll_y_sampled: 0,
            ula_row: 0,
            disable_ula_output_sampled: false,
            ula_hires_mode_sampled: false,
            ula_hicolor_mode_sampled: false,
            lores_enabled_sampled: false,
            lores_radastan_sampled: false,
            lores_scroll_x_sampled: 0,
            lores_scroll_y_sampled: 0,
            ula_pixel_byte1: 0,
            ula_pixel_byte2: 0,
            ula_pixel_byte3: 0,
            ula_pixel_byte4: 0,
            ula_attr_byte1: 0,
            ula_attr_byte2: 0,
            ula_shift_reg: 0,
            ula_shift_attr: 0,
            ula_shift_attr2: 0,
            ula_shift_attr_count: 0,
            floating_bus_value: 0,
            lores_enabled: false,
            lores_radastan: false,
            lores_palette_offset: 0,
            lores_dfile: 0,
            lores_block_byte: 0,
            layer2_enabled: false,
            layer2_resolution: 0,
            layer2_palette_offset: 0,
            layer2_scroll_x: 0,
            layer2_scroll_y: 0,
            layer2_clip: ClipWindow::new(255, 191),
            layer2_active_bank: 8,
            layer2_shadow_bank: 11,
            layer2_use_shadow: false,
            layer2_bank_select: 0,
            layer2_bank_offset: 0,
            layer2_map_reads: false,
            layer2_map_writes: false,
            layer2: Layer2State::new(),
            tilemap_enabled: false,
            tilemap_80x32: false,
            tilemap_eliminate_attr: false,
            tilemap_text_mode: false,
            tilemap_512_tiles: false,
            tilemap_force_on_top: false,
            tilemap_default_attr: 0,
            tilemap_base: 0x2c,
            tilemap_def_base: 0x0c,
            tilemap_scroll_x: 0,
            tilemap_scroll_y: 0,
            tilemap_clip: ClipWindow::new(159, 255),
            tilemap_transparency_index: 0x0f,
            tilemap: TilemapState::new(),
            layer_priority: 0,
            sprites: SpriteEngine::new(),
            ula_px: [LayerPixel::default(); 2],
            layer2_px: [LayerPixel::default(); 2],
            layer2_px_priority: [false; 2],
            tilemap_px: [LayerPixel::default(); 2],
            tilemap_px_below: [false; 2],
            sprite_px: [LayerPixel::default(); 2],
        };
        screen.reset();
        screen
    }

    /// Restores the hardware reset state. Memory and palette contents are
    /// the host's business and stay untouched.
    pub fn reset(&mut self) {
        self.pixel_buffer.fill(0);

        self.ula_clip = ClipWindow::new(255, 191);
        self.ula_scroll_x = 0;
        self.ula_scroll_y = 0;
        self.ula_scroll_x_sampled = 0;
        self.ula_scroll_y_sampled = 0;
        self.ula_row = 0;
        self.ula_pixel_byte1 = 0;
        self.ula_pixel_byte2 = 0;
        self.ula_pixel_byte3 = 0;
        self.ula_pixel_byte4 = 0;
        self.ula_attr_byte1 = 0;
        self.ula_attr_byte2 = 0;
        self.ula_shift_reg = 0;
        self.ula_shift_attr = 0;
        self.ula_shift_attr2 = 0;
        self.ula_shift_attr_count = 0;
        self.floating_bus_value = 0;

        self.timex_port_bits = 0;
        self.standard_screen_at_0x4000 = true;
        self.ula_hires_mode = false;
        self.ula_hires_mode_sampled = false;
        self.ula_hicolor_mode = false;
        self.ula_hicolor_mode_sampled = false;
        self.ula_hires_color = 0;

        self.lores_enabled = false;
        self.lores_enabled_sampled = false;
        self.lores_radastan = false;
        self.lores_radastan_sampled = false;
        self.lores_palette_offset = 0;
        self.lores_dfile = 0;
        self.lores_block_byte = 0;
        self.lores_scroll_x_sampled = 0;
        self.lores_scroll_y_sampled = 0;

        self.ula_plus_enabled = false;
        self.ula_next_enabled = false;
        self.ula_next_format = 0x0f;
        self.disable_ula_output = false;
        self.disable_ula_output_sampled = false;
        self.blending_mode = 0;
        self.ula_half_pixel_scroll = false;
        self.stencil_mode = false;

        self.global_transparency_color = 0xe3;
        self.set_fallback_color(0);

        self.layer2_enabled = false;
        self.layer2_resolution = 0;
        self.layer2_palette_offset = 0;
        self.layer2_scroll_x = 0;
        self.layer2_scroll_y = 0;
        self.layer2_clip = ClipWindow::new(255, 191);
        self.layer2_active_bank = 8;
        self.layer2_shadow_bank = 11;
        self.layer2_use_shadow = false;
        self.layer2_bank_select = 0;
        self.layer2_bank_offset = 0;
        self.layer2_map_reads = false;
        self.layer2_map_writes = false;
        self.layer2.reset();
        self.update_layer2_fast_flags();

        self.tilemap_enabled = false;
        self.tilemap_80x32 = false;
        self.tilemap_eliminate_attr = false;
        self.tilemap_text_mode = false;
        self.tilemap_512_tiles = false;
        self.tilemap_force_on_top = false;
        self.tilemap_default_attr = 0;
        self.tilemap_base = 0x2c;
        self.tilemap_def_base = 0x0c;
        self.tilemap_scroll_x = 0;
        self.tilemap_scroll_y = 0;
        self.tilemap_clip = ClipWindow::new(159, 255);
        self.tilemap_transparency_index = 0x0f;
        self.tilemap.reset();
        self.update_tilemap_fast_flag();

        self.layer_priority = 0;
        self.sprites.reset();

        self.is_60hz_mode = false;
        self.scandoubler_enabled = false;
        self.flash_counter = 0;
        self.flash_flag = false;
        self.pulse_int_active = false;

        self.set_border_color(7);
        self.refresh_palette_caches();

        self.active_60hz = false;
        self.config = PLUS3_50HZ;
        self.rendering_tacts = self.config.tacts_per_frame();
        self.reset_tact_scratch();
    }

    fn reset_tact_scratch(&mut self) {
        self.ula_px = [LayerPixel::default(); 2];
        self.layer2_px = [LayerPixel::default(); 2];
        self.layer2_px_priority = [false; 2];
        self.tilemap_px = [LayerPixel::default(); 2];
        self.tilemap_px_below = [false; 2];
        self.sprite_px = [LayerPixel::default(); 2];
    }

    // ==========================================================================================
    // Frame lifecycle

    /// Starts a new frame: latches the timing mode, advances the flash
    /// counter and resets the per-scanline caches.
    pub fn on_new_frame(&mut self) {
        let new_60hz = self.is_60hz_mode;
        if new_60hz != self.active_60hz {
            debug!(
                "timing mode switched to {}",
                if new_60hz { "60 Hz" } else { "50 Hz" }
            );
            // Re-center content by clearing the old frame's rows.
            self.pixel_buffer.fill(0);
        }
        self.active_60hz = new_60hz;
        self.config = if new_60hz { PLUS3_60HZ } else { PLUS3_50HZ };
        self.rendering_tacts = self.config.tacts_per_frame();

        self.flash_counter = (self.flash_counter + 1) & 0x1f;
        self.flash_flag = self.flash_counter >= 16;

        self.layer2.start_frame();
        self.tilemap.start_frame();
        self.sprites.start_frame();
        self.reset_tact_scratch();
    }

    /// Renders the pixel pair belonging to one frame tact. Returns false for
    /// blanking tacts, which touch neither the bitmap nor any layer state.
    pub fn render_tact(&mut self, tact: u32) -> bool {
        self.pulse_int_active =
            tact >= self.config.int_start_tact && tact < self.config.int_end_tact;
        if tact >= self.rendering_tacts {
            return false;
        }

        let i = tact as usize;
        let tables = if self.active_60hz {
            &self.tables_60
        } else {
            &self.tables_50
        };
        let ula_cell = tables.ula[i];
        if ula_cell.is_empty() {
            return false;
        }
        let lores_cell = tables.lores[i];
        let l2_256_cell = tables.layer2_256[i];
        let l2_320_cell = tables.layer2_320[i];
        let l2_640_cell = tables.layer2_640[i];
        let sprite_cell = tables.sprites[i];
        let tilemap_cell = tables.tilemap[i];
        let hc = tables.to_hc[i] as i32;
        let vc = tables.to_vc[i] as i32;
        let bitmap_offset = tables.bitmap_offset[i];

        self.reset_tact_scratch();

        // Stage 1: per-layer pixel generation.
        if self.lores_enabled_sampled {
            self.render_lores(vc, hc, lores_cell);
        } else if !self.disable_ula_output_sampled {
            if self.ula_hires_mode_sampled {
                self.render_ula_hires(vc, hc, ula_cell);
            } else if self.ula_hicolor_mode_sampled {
                self.render_ula_hicolor(vc, hc, ula_cell);
            } else {
                self.render_ula_standard(vc, hc, ula_cell);
            }
        }

        if self.layer2_enabled {
            match self.layer2_resolution {
                0 => self.render_layer2_256(vc, hc, l2_256_cell),
                1 => self.render_layer2_320(vc, hc, l2_320_cell),
                2 => self.render_layer2_640(vc, hc, l2_640_cell),
                _ => {}
            }
        }

        if self.sprites.enabled {
            self.render_sprites(vc, hc, sprite_cell);
        }

        if self.tilemap_enabled {
            if self.tilemap_80x32 {
                self.render_tilemap_80(vc, hc, tilemap_cell);
            } else {
                self.render_tilemap_40(vc, hc, tilemap_cell);
            }
        }

        // Stage 2: merge ULA/tilemap, then compose and write the pair.
        self.merge_tilemap_into_ula();
        if bitmap_offset >= 0 {
            let p0 = self.compose_single_pixel(0);
            let p1 = self.compose_single_pixel(1);
            self.pixel_buffer[bitmap_offset as usize] = p0;
            self.pixel_buffer[bitmap_offset as usize + 1] = p1;
        }
        true
    }

    /// Renders a complete frame from tact 0 and returns the bitmap.
    pub fn render_full_screen(&mut self) -> &[u32] {
        self.on_new_frame();
        self.sample_ula_registers();
        for tact in 0..self.rendering_tacts {
            self.render_tact(tact);
        }
        &self.pixel_buffer
    }

    /// Renders the whole frame in one go (or restores a saved bitmap) and
    /// returns the previous bitmap contents.
    pub fn render_instant_screen(&mut self, saved: Option<&[u32]>) -> Vec<u32> {
        let previous = self.pixel_buffer.clone();
        match saved {
            Some(buffer) => {
                self.pixel_buffer.clear();
                self.pixel_buffer.extend_from_slice(buffer);
            }
            None => {
                for tact in 0..self.rendering_tacts {
                    self.render_tact(tact);
                }
            }
        }
        previous
    }

    pub fn pixel_buffer(&self) -> &[u32] {
        &self.pixel_buffer
    }

    pub fn rendering_tacts(&self) -> u32 {
        self.rendering_tacts
    }

    pub fn timing_config(&self) -> &TimingConfig {
        &self.config
    }

    pub fn pulse_int_active(&self) -> bool {
        self.pulse_int_active
    }

    pub fn floating_bus_value(&self) -> u8 {
        self.floating_bus_value
    }

    pub(crate) fn set_floating_bus(&mut self, value: u8) {
        self.floating_bus_value = value;
    }

    pub fn memory(&self) -> &M {
        &self.mem
    }

    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.mem
    }

    pub fn palette(&self) -> &P {
        &self.pal
    }

    /// Gives mutable palette access; call [`refresh_palette_caches`] after
    /// changing entries the border or Timex hi-res colors depend on.
    ///
    /// [`refresh_palette_caches`]: Self::refresh_palette_caches
    pub fn palette_mut(&mut self) -> &mut P {
        &mut self.pal
    }

    /// Recomputes the RGB values cached outside the palette: the border
    /// color and the Timex hi-res ink/paper pair.
    pub fn refresh_palette_caches(&mut self) {
        self.update_border_rgb_cache();
        self.ula_hires_ink_rgb333 = self.pal.ula_rgb333(self.ula_hires_color);
        self.ula_hires_paper_rgb333 = self.pal.ula_rgb333(7 - self.ula_hires_color);
    }

    // ==========================================================================================
    // Ports

    /// Border color bits of port 0xFE.
    pub fn set_border_color(&mut self, value: u8) {
        self.border_color = value & 0x07;
        self.update_border_rgb_cache();
    }

    pub fn border_color(&self) -> u8 {
        self.border_color
    }

    fn update_border_rgb_cache(&mut self) {
        self.border_rgb_cache = if self.ula_plus_enabled {
            // ULA+ borders live at palette indices 200..207.
            self.pal.ula_rgb333(200 + self.border_color)
        } else {
            self.pal.ula_rgb333(self.border_color)
        };
    }

    /// Timex port 0xFF: screen mode and hi-res ink selection.
    pub fn set_timex_port(&mut self, value: u8) {
        self.timex_port_bits = value & 0x3f;
        self.ula_hires_color = (value >> 3) & 0x07;
        self.ula_hires_ink_rgb333 = self.pal.ula_rgb333(self.ula_hires_color);
        self.ula_hires_paper_rgb333 = self.pal.ula_rgb333(7 - self.ula_hires_color);
        match value & 0x07 {
            0 => {
                self.standard_screen_at_0x4000 = true;
                self.ula_hicolor_mode = false;
                self.ula_hires_mode = false;
            }
            1 => {
                self.standard_screen_at_0x4000 = false;
                self.ula_hicolor_mode = false;
                self.ula_hires_mode = false;
            }
            2 | 3 => {
                self.ula_hicolor_mode = true;
                self.ula_hires_mode = false;
            }
            _ => {
                self.ula_hires_mode = true;
                self.ula_hicolor_mode = false;
            }
        }
    }

    pub fn timex_port(&self) -> u8 {
        self.timex_port_bits
    }

    /// Port 0x123B, mode 0 format. The bank offset is write-only.
    pub fn port_123b(&self) -> u8 {
        (self.layer2_bank_select << 6)
            | if self.layer2_use_shadow { 0x08 } else { 0 }
            | if self.layer2_map_reads { 0x04 } else { 0 }
            | if self.layer2_enabled { 0x02 } else { 0 }
            | if self.layer2_map_writes { 0x01 } else { 0 }
    }

    pub fn set_port_123b(&mut self, value: u8) {
        if value & 0x10 == 0 {
            self.layer2_bank_select = (value & 0xc0) >> 6;
            self.layer2_use_shadow = value & 0x08 != 0;
            self.layer2_map_reads = value & 0x04 != 0;
            self.layer2_enabled = value & 0x02 != 0;
            self.layer2_map_writes = value & 0x01 != 0;
        } else {
            self.layer2_bank_offset = value & 0x07;
        }
    }

    /// ULA+ enable (port 0xBF3B mode register bit).
    pub fn set_ula_plus_enabled(&mut self, enabled: bool) {
        self.ula_plus_enabled = enabled;
        self.update_border_rgb_cache();
    }

    /// Sprite status port 0x303B: returns and clears the collision and
    /// overtime flags.
    pub fn read_sprite_status(&mut self) -> u8 {
        self.sprites.read_status()
    }

    /// Sprite index port 0x303B write.
    pub fn write_sprite_select(&mut self, value: u8) {
        self.sprites.write_select(value);
    }

    /// When lockstep is on, NextReg 0x34 writes mirror the port select
    /// instead of keeping an independent index.
    pub fn set_sprite_id_lockstep(&mut self, on: bool) {
        self.sprites.set_id_lockstep(on);
    }

    /// Sprite attribute upload port 0x57.
    pub fn write_sprite_attribute_port(&mut self, value: u8) {
        self.sprites.write_attribute_stream(value);
    }

    /// Sprite pattern upload port 0x5B.
    pub fn write_sprite_pattern_port(&mut self, value: u8) {
        self.sprites.write_pattern_stream(value);
    }

    /// State of the most recently written anchor sprite. Relative sprites
    /// in a chain position themselves against this.
    pub fn sprite_anchor(&self) -> SpriteAnchor {
        self.sprites.anchor
    }

    // ==========================================================================================
    // Next registers

    pub fn write_next_reg(&mut self, reg: u8, value: u8) {
        match reg {
            0x05 => {
                self.is_60hz_mode = value & 0x04 != 0;
                self.scandoubler_enabled = value & 0x01 != 0;
            }
            0x12 => self.layer2_active_bank = value & 0x7f,
            0x13 => self.layer2_shadow_bank = value & 0x7f,
            0x14 => self.global_transparency_color = value,
            0x15 => {
                self.lores_enabled = value & 0x80 != 0;
                self.sprites.sprite0_on_top = value & 0x40 != 0;
                self.layer_priority = (value >> 2) & 0x07;
                if self.layer_priority >= 6 {
                    debug!(
                        "blend priority mode {} selected; composing as ULS",
                        self.layer_priority
                    );
                }
                let over_border = value & 0x02 != 0;
                let clip_over_border = value & 0x20 != 0;
                self.sprites
                    .set_border_flags(over_border, clip_over_border);
                self.sprites.enabled = value & 0x01 != 0;
            }
            0x16 => {
                self.layer2_scroll_x = (self.layer2_scroll_x & 0x100) | value as u16;
                self.update_layer2_fast_flags();
            }
            0x17 => {
                self.layer2_scroll_y = value;
                self.update_layer2_fast_flags();
            }
            0x18 => {
                self.layer2_clip.write(value);
                self.update_layer2_fast_flags();
            }
            0x19 => self.sprites.write_clip(value),
            0x1a => self.ula_clip.write(value),
            0x1b => {
                self.tilemap_clip.write(value);
                self.update_tilemap_fast_flag();
            }
            0x1c => {
                if value & 0x01 != 0 {
                    self.layer2_clip.reset_index();
                }
                if value & 0x02 != 0 {
                    self.sprites.reset_clip_index();
                }
                if value & 0x04 != 0 {
                    self.ula_clip.reset_index();
                }
                if value & 0x08 != 0 {
                    self.tilemap_clip.reset_index();
                }
            }
            0x26 => self.ula_scroll_x = value,
            0x27 => self.ula_scroll_y = value,
            0x2f => {
                self.tilemap_scroll_x =
                    (self.tilemap_scroll_x & 0xff) | (((value & 0x03) as u16) << 8);
                self.update_tilemap_fast_flag();
            }
            0x30 => {
                self.tilemap_scroll_x = (self.tilemap_scroll_x & 0x300) | value as u16;
                self.update_tilemap_fast_flag();
            }
            0x31 => {
                self.tilemap_scroll_y = value;
                self.update_tilemap_fast_flag();
            }
            0x34 => self.sprites.set_sprite_index(value),
            0x35..=0x39 => self.sprites.write_attribute(reg - 0x35, value, false),
            0x42 => self.ula_next_format = value,
            0x43 => self.ula_next_enabled = value & 0x01 != 0,
            0x4a => self.set_fallback_color(value),
            0x4b => self.sprites.set_transparency_index(value),
            0x4c => self.tilemap_transparency_index = value & 0x0f,
            0x68 => {
                self.disable_ula_output = value & 0x80 != 0;
                self.blending_mode = (value >> 5) & 0x03;
                self.ula_half_pixel_scroll = value & 0x04 != 0;
                self.stencil_mode = value & 0x01 != 0;
            }
            0x6a => {
                self.lores_radastan = value & 0x20 != 0;
                self.lores_dfile = (value >> 4) & 0x01;
                self.lores_palette_offset = value & 0x0f;
            }
            0x6b => {
                self.tilemap_enabled = value & 0x80 != 0;
                self.tilemap_80x32 = value & 0x40 != 0;
                self.tilemap_eliminate_attr = value & 0x20 != 0;
                self.tilemap_text_mode = value & 0x08 != 0;
                self.tilemap_512_tiles = value & 0x02 != 0;
                self.tilemap_force_on_top = value & 0x01 != 0;
            }
            0x6c => self.tilemap_default_attr = value,
            0x6e => self.tilemap_base = value & 0x3f,
            0x6f => self.tilemap_def_base = value & 0x3f,
            0x70 => {
                self.layer2_resolution = (value >> 4) & 0x03;
                self.layer2_palette_offset = value & 0x0f;
                self.update_layer2_fast_flags();
            }
            0x71 => {
                self.layer2_scroll_x =
                    (self.layer2_scroll_x & 0xff) | (((value & 0x01) as u16) << 8);
                self.update_layer2_fast_flags();
            }
            0x75..=0x79 => self.sprites.write_attribute(reg - 0x75, value, true),
            _ => {}
        }
    }

    pub fn read_next_reg(&self, reg: u8) -> u8 {
        match reg {
            0x05 => {
                (if self.is_60hz_mode { 0x04 } else { 0 })
                    | (if self.scandoubler_enabled { 0x01 } else { 0 })
            }
            0x12 => self.layer2_active_bank,
            0x13 => self.layer2_shadow_bank,
            0x14 => self.global_transparency_color,
            0x15 => {
                (if self.lores_enabled { 0x80 } else { 0 })
                    | (if self.sprites.sprite0_on_top { 0x40 } else { 0 })
                    | (if self.sprites.clip_over_border { 0x20 } else { 0 })
                    | (self.layer_priority << 2)
                    | (if self.sprites.over_border { 0x02 } else { 0 })
                    | (if self.sprites.enabled { 0x01 } else { 0 })
            }
            0x16 => self.layer2_scroll_x as u8,
            0x17 => self.layer2_scroll_y,
            0x18 => self.layer2_clip.read(),
            0x19 => self.sprites.read_clip(),
            0x1a => self.ula_clip.read(),
            0x1b => self.tilemap_clip.read(),
            0x26 => self.ula_scroll_x,
            0x27 => self.ula_scroll_y,
            0x2f => (self.tilemap_scroll_x >> 8) as u8,
            0x30 => self.tilemap_scroll_x as u8,
            0x31 => self.tilemap_scroll_y,
            0x34 => self.sprites.sprite_index(),
            0x42 => self.ula_next_format,
            0x43 => {
                if self.ula_next_enabled {
                    0x01
                } else {
                    0
                }
            }
            0x4a => self.fallback_color,
            0x4b => self.sprites.transparency_index(),
            0x4c => self.tilemap_transparency_index,
            0x68 => {
                (if self.disable_ula_output { 0x80 } else { 0 })
                    | (self.blending_mode << 5)
                    | (if self.ula_half_pixel_scroll { 0x04 } else { 0 })
                    | (if self.stencil_mode { 0x01 } else { 0 })
            }
            0x6a => {
                (if self.lores_radastan { 0x20 } else { 0 })
                    | (self.lores_dfile << 4)
                    | self.lores_palette_offset
            }
            0x6b => {
                (if self.tilemap_enabled { 0x80 } else { 0 })
                    | (if self.tilemap_80x32 { 0x40 } else { 0 })
                    | (if self.tilemap_eliminate_attr { 0x20 } else { 0 })
                    | (if self.tilemap_text_mode { 0x08 } else { 0 })
                    | (if self.tilemap_512_tiles { 0x02 } else { 0 })
                    | (if self.tilemap_force_on_top { 0x01 } else { 0 })
            }
            0x6c => self.tilemap_default_attr,
            0x6e => self.tilemap_base,
            0x6f => self.tilemap_def_base,
            0x70 => (self.layer2_resolution << 4) | self.layer2_palette_offset,
            0x71 => (self.layer2_scroll_x >> 8) as u8,
            _ => 0,
        }
    }

    /// NextReg 0x4A: the color shown where every layer is transparent.
    pub fn set_fallback_color(&mut self, value: u8) {
        self.fallback_color = value;
        self.fallback_rgb333_cache = rgb332_to_rgb333(value);
    }

    /// Screen memory start selected by the Timex port (false means 0x6000).
    pub fn standard_screen_at_0x4000(&self) -> bool {
        self.standard_screen_at_0x4000
    }

    pub fn scandoubler_enabled(&self) -> bool {
        self.scandoubler_enabled
    }
}
