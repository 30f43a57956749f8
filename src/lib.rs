//! Tact-accurate renderer for the ZX Spectrum Next video subsystem.
//!
//! The crate models the composited video pipeline of the Next: the ULA family
//! (standard, Timex hi-res/hi-color, LoRes), Layer 2, the hardware tilemap and
//! the sprite engine, merged per pixel into a fixed 720x288 BGRA bitmap. One
//! call to [`ComposedScreen::render_tact`] advances the beam by one pixel
//! clock and writes zero, one or two bitmap pixels.
//!
//! Memory and palettes live outside the renderer and are reached through the
//! [`VideoMemory`] and [`PaletteSource`] traits.

pub mod memory;
pub mod palette;
pub mod screen;

pub use memory::{FlatMemory, VideoMemory};
pub use palette::{DefaultPalette, PaletteSource};
pub use screen::timing::{TimingConfig, PLUS3_50HZ, PLUS3_60HZ};
pub use screen::{ComposedScreen, SpriteAnchor, BITMAP_HEIGHT, BITMAP_WIDTH};
