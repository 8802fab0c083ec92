//! Text layout and glyph atlas caching for an internationalized, styled-text
//! UI toolkit.
//!
//! Combines font discovery and fallback, `§`-formatting-code resolution,
//! Unicode bidi reordering, HarfBuzz shaping, glyph rasterization, and a
//! shelf-packed multi-sheet glyph atlas behind one cached
//! [`TextEngine::lookup`] entry point.

pub mod assemble;
pub mod atlas;
pub mod bidi;
pub mod cache;
pub mod config;
pub mod error;
pub mod font;
pub mod format;
pub mod node;
pub mod rasterizer;
pub mod registry;
pub mod shaper;
pub mod style;

pub use atlas::{AtlasUploader, GlyphAtlasManager, NullUploader, TexturedGlyph};
pub use bidi::{Run, RunDirection};
pub use cache::{CacheKey, RenderNodeCache};
pub use config::TextConfig;
pub use error::{Result, TextError};
pub use font::{FontData, FontFace, FontMetrics, FontStyle, FontWeight};
pub use format::{IndexRemap, StyleChange};
pub use node::{EffectFlags, EffectKind, EffectSpan, GlyphRecord, GlyphVariant, RenderNode, VertexSink};
pub use rasterizer::{GlyphRasterizer, RasterizedGlyph};
pub use registry::{DerivedFont, FontKey, FontRegistry, PhysicalFont};
pub use shaper::Shaper;
pub use style::{Color, ColorValue, Palette, Style};

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

/// The whole pipeline behind one call: resolve formatting codes, segment by
/// bidi/style/font, shape each run, pack glyphs into the atlas, assemble and
/// cache the result. Render-owner-confined — only the thread
/// that owns this `TextEngine` may call [`TextEngine::lookup`]; any other
/// thread that needs the same text goes through
/// [`TextEngine::lookup_off_owner`].
pub struct TextEngine<U: AtlasUploader> {
    config: TextConfig,
    palette: Palette,
    registry: FontRegistry,
    atlas: GlyphAtlasManager<U>,
    shaper: Shaper,
    cache: RenderNodeCache,
}

impl<U: AtlasUploader> TextEngine<U> {
    pub fn new(config: TextConfig, palette: Palette, uploader: U) -> Result<TextEngine<U>> {
        config.validate()?;
        let registry = FontRegistry::new();
        registry.preload_fonts(&config.preferred_font_names);
        let atlas = GlyphAtlasManager::new(
            config.atlas_width,
            config.atlas_height,
            config.resolution_factor,
            config.mipmap,
            uploader,
        );
        let cache = RenderNodeCache::new(config.cache_capacity, config.cache_ttl);
        Ok(TextEngine {
            config,
            palette,
            registry,
            atlas,
            shaper: Shaper::new(),
            cache,
        })
    }

    /// Resolves `text` under `style` to a finished, cached [`RenderNode`].
    /// A cache hit returns immediately without touching the shaping
    /// pipeline at all; a miss resolves formatting codes, segments by bidi
    /// direction/style/font, shapes each run, packs glyphs into the atlas,
    /// assembles the result, and caches it before returning.
    pub fn lookup(&mut self, text: &str, style: Style) -> Arc<RenderNode> {
        let key = CacheKey::new(text, style.geometry_bits());
        let registry = &self.registry;
        let atlas = &mut self.atlas;
        let shaper = &mut self.shaper;
        let palette = &self.palette;
        let font_size = self.config.default_font_size;

        self.cache.lookup(key, move || {
            let (stripped, changes, remap) = crate::format::resolve(text, style, palette);
            let runs = bidi::segment(&stripped, &changes, registry);

            let mut cursor = 0.0f32;
            let mut records = Vec::new();
            for run in &runs {
                if let Err(e) = shaper.shape_run(&stripped, run, font_size, registry, atlas, &mut cursor, &mut records) {
                    warn!(error = %e, "failed to shape run, remaining glyphs in this run are dropped");
                }
            }

            assemble::assemble(records, &changes, &remap, cursor)
        })
    }

    /// Non-owner entry point: reads the cache or waits (up to `timeout`)
    /// for the owner thread to build the same key via [`TextEngine::lookup`].
    /// Never runs the shaping pipeline itself.
    pub fn lookup_off_owner(&self, text: &str, style: Style, timeout: Duration) -> Option<Arc<RenderNode>> {
        let key = CacheKey::new(text, style.geometry_bits());
        self.cache.lookup_off_owner(key, timeout)
    }

    pub fn list_families(&self) -> Vec<String> {
        self.registry.list_families()
    }

    pub fn has_font(&self, family: &str) -> bool {
        self.registry.has_font(family)
    }

    pub fn preload_fonts(&self, names: &[String]) {
        self.registry.preload_fonts(names)
    }

    pub fn sheet_count(&self) -> usize {
        self.atlas.sheet_count()
    }

    /// Best-effort estimate of the render-node cache's resident size, in
    /// bytes.
    pub fn cache_memory_usage(&self) -> usize {
        self.cache.memory_usage()
    }

    pub fn take_dirty_sheet(&mut self, sheet_index: usize) -> bool {
        self.atlas.take_dirty(sheet_index)
    }

    pub fn config(&self) -> &TextConfig {
        &self.config
    }
}
