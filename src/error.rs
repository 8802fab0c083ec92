//! Error types for the text layout and glyph atlas pipeline.

use thiserror::Error;

/// Errors surfaced by the text rendering pipeline.
///
/// Per the error-handling design: only configuration errors discovered at
/// initialization are fatal. Everything else is recovered locally by the
/// caller (a dropped glyph, a logged warning, a non-cached empty node) and
/// never propagates out of [`crate::cache::RenderNodeCache::lookup`].
#[derive(Error, Debug)]
pub enum TextError {
    #[error("failed to load font: {0}")]
    FontLoadError(String),

    #[error("failed to parse font: {0}")]
    FontParseError(String),

    #[error("glyph not found for codepoint: {0}")]
    GlyphNotFound(char),

    #[error("atlas is full, cannot allocate glyph")]
    AtlasFull,

    #[error("invalid font data")]
    InvalidFontData,

    #[error("mipmapped atlas dimensions must be powers of two")]
    InvalidAtlasConfig,

    #[error("no fonts available to render text")]
    NoFontsAvailable,
}

pub type Result<T> = std::result::Result<T, TextError>;
