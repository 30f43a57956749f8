//! Final composition: tilemap/ULA merge, the 6-way layer ordering and the
//! RGB333 to BGRA conversion.

use super::ComposedScreen;
use crate::memory::VideoMemory;
use crate::palette::{rgb333_to_bgra, PaletteSource};

impl<M: VideoMemory, P: PaletteSource> ComposedScreen<M, P> {
    /// Folds the tilemap output into the ULA slot so the priority switch
    /// only deals with three layers. Stencil mode ANDs the two colors when
    /// both are opaque; otherwise the tilemap wins unless its per-tile
    /// "below ULA" bit defers to an opaque ULA pixel.
    pub(crate) fn merge_tilemap_into_ula(&mut self) {
        if !self.tilemap_enabled {
            return;
        }
        let stencil = self.stencil_mode && !self.disable_ula_output_sampled;
        for i in 0..2 {
            let tm = self.tilemap_px[i];
            if stencil {
                if tm.opaque && self.ula_px[i].opaque {
                    self.ula_px[i].rgb333 &= tm.rgb333;
                } else {
                    self.ula_px[i].opaque = false;
                }
                continue;
            }
            if tm.opaque && !(self.tilemap_px_below[i] && self.ula_px[i].opaque) {
                self.ula_px[i] = tm;
            }
        }
    }

    /// Resolves one half of the pixel pair to a BGRA value. The Layer 2
    /// priority flag beats every ordering; otherwise the first opaque layer
    /// in the configured order wins, and the fallback color covers the rest.
    pub(crate) fn compose_single_pixel(&self, i: usize) -> u32 {
        let ula = self.ula_px[i];
        let layer2 = self.layer2_px[i];
        let sprite = self.sprite_px[i];

        if layer2.opaque && self.layer2_px_priority[i] {
            return rgb333_to_bgra(layer2.rgb333);
        }

        // S = sprites, L = Layer 2, U = merged ULA. Modes 6 and 7 are the
        // unimplemented blend modes and compose as ULS.
        let order = match self.layer_priority {
            0 => [sprite, layer2, ula],
            1 => [layer2, sprite, ula],
            2 => [sprite, ula, layer2],
            3 => [layer2, ula, sprite],
            4 => [ula, sprite, layer2],
            _ => [ula, layer2, sprite],
        };
        for px in order {
            if px.opaque {
                return rgb333_to_bgra(px.rgb333);
            }
        }
        rgb333_to_bgra(self.fallback_rgb333_cache)
    }
}
