//! Parsed font data and the metrics derived from it.
//!
//! `FontData` splits owned bytes from a shared byte source so an mmap'd
//! file doesn't get copied; `FontFace` parses via `ttf_parser::Face` once
//! at construction and stores the bytes alongside the derived metrics.

use std::sync::Arc;

use crate::error::{Result, TextError};

/// Where a font's raw bytes live. `Shared` lets a caller hand in an mmap'd
/// file or another crate's buffer without a copy.
#[derive(Clone)]
pub enum FontData {
    Owned(Arc<Vec<u8>>),
    Shared(Arc<dyn AsRef<[u8]> + Send + Sync>),
}

impl FontData {
    pub fn as_slice(&self) -> &[u8] {
        match self {
            FontData::Owned(bytes) => bytes,
            FontData::Shared(bytes) => bytes.as_ref().as_ref(),
        }
    }
}

impl std::fmt::Debug for FontData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontData")
            .field("len", &self.as_slice().len())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStyle {
    Normal,
    Italic,
    Oblique,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FontWeight {
    Thin,
    ExtraLight,
    Light,
    Normal,
    Medium,
    SemiBold,
    Bold,
    ExtraBold,
    Black,
}

impl FontWeight {
    pub fn from_number(n: u16) -> FontWeight {
        match n {
            0..=149 => FontWeight::Thin,
            150..=249 => FontWeight::ExtraLight,
            250..=349 => FontWeight::Light,
            350..=449 => FontWeight::Normal,
            450..=549 => FontWeight::Medium,
            550..=649 => FontWeight::SemiBold,
            650..=749 => FontWeight::Bold,
            750..=849 => FontWeight::ExtraBold,
            _ => FontWeight::Black,
        }
    }

    pub fn to_number(self) -> u16 {
        match self {
            FontWeight::Thin => 100,
            FontWeight::ExtraLight => 200,
            FontWeight::Light => 300,
            FontWeight::Normal => 400,
            FontWeight::Medium => 500,
            FontWeight::SemiBold => 600,
            FontWeight::Bold => 700,
            FontWeight::ExtraBold => 800,
            FontWeight::Black => 900,
        }
    }
}

/// Face-level metrics in font units, plus the conversions layout needs.
#[derive(Debug, Clone, Copy)]
pub struct FontMetrics {
    pub units_per_em: u16,
    pub ascender: i16,
    pub descender: i16,
    pub line_gap: i16,
    pub cap_height: i16,
    pub x_height: i16,
    pub underline_position: i16,
    pub underline_thickness: i16,
}

impl FontMetrics {
    pub fn scale(&self, font_size: f32) -> f32 {
        font_size / self.units_per_em as f32
    }

    pub fn ascender_px(&self, font_size: f32) -> f32 {
        self.ascender as f32 * self.scale(font_size)
    }

    pub fn descender_px(&self, font_size: f32) -> f32 {
        self.descender as f32 * self.scale(font_size)
    }

    pub fn line_height(&self) -> i16 {
        self.ascender - self.descender + self.line_gap
    }

    pub fn line_height_px(&self, font_size: f32) -> f32 {
        self.line_height() as f32 * self.scale(font_size)
    }

    pub fn underline_position_px(&self, font_size: f32) -> f32 {
        self.underline_position as f32 * self.scale(font_size)
    }

    pub fn underline_thickness_px(&self, font_size: f32) -> f32 {
        (self.underline_thickness.max(1)) as f32 * self.scale(font_size)
    }
}

/// One parsed physical font face. Immutable once built; `as_ttf_face` is
/// the only way to get back the borrowed `ttf_parser::Face` the shaper and
/// rasterizer need, since it can't be stored directly (it borrows `data`).
/// Re-parsing is expected to succeed (the bytes were already validated in
/// `from_data_with_index`), but callers still propagate the `None` case
/// rather than assume it.
pub struct FontFace {
    data: FontData,
    face_index: u32,
    metrics: FontMetrics,
    glyph_count: u16,
    family_name: String,
    weight: FontWeight,
    style: FontStyle,
}

impl FontFace {
    pub fn from_data(data: FontData) -> Result<FontFace> {
        Self::from_data_with_index(data, 0)
    }

    pub fn from_data_with_index(data: FontData, face_index: u32) -> Result<FontFace> {
        let face = ttf_parser::Face::parse(data.as_slice(), face_index)
            .map_err(|e| TextError::FontParseError(e.to_string()))?;

        let metrics = FontMetrics {
            units_per_em: face.units_per_em(),
            ascender: face.ascender(),
            descender: face.descender(),
            line_gap: face.line_gap(),
            cap_height: face.capital_height().unwrap_or(face.ascender()),
            x_height: face.x_height().unwrap_or(face.ascender() / 2),
            underline_position: face
                .underline_metrics()
                .map(|m| m.position)
                .unwrap_or(-face.units_per_em() as i16 / 10),
            underline_thickness: face
                .underline_metrics()
                .map(|m| m.thickness)
                .unwrap_or(face.units_per_em() as i16 / 20),
        };

        let family_name = face
            .names()
            .into_iter()
            .find(|n| n.name_id == ttf_parser::name_id::FAMILY)
            .and_then(|n| n.to_string())
            .unwrap_or_else(|| "Unknown".to_string());

        let weight = FontWeight::from_number(face.weight().to_number());
        let style = if face.is_italic() {
            FontStyle::Italic
        } else if face.is_oblique() {
            FontStyle::Oblique
        } else {
            FontStyle::Normal
        };

        let glyph_count = face.number_of_glyphs();

        Ok(FontFace {
            data,
            face_index,
            metrics,
            glyph_count,
            family_name,
            weight,
            style,
        })
    }

    pub fn from_file(bytes: Vec<u8>) -> Result<FontFace> {
        Self::from_data(FontData::Owned(Arc::new(bytes)))
    }

    pub fn as_ttf_face(&self) -> Option<ttf_parser::Face<'_>> {
        ttf_parser::Face::parse(self.data.as_slice(), self.face_index).ok()
    }

    pub fn metrics(&self) -> FontMetrics {
        self.metrics
    }

    pub fn glyph_count(&self) -> u16 {
        self.glyph_count
    }

    pub fn family_name(&self) -> &str {
        &self.family_name
    }

    pub fn weight(&self) -> FontWeight {
        self.weight
    }

    pub fn style(&self) -> FontStyle {
        self.style
    }

    pub fn data(&self) -> &FontData {
        &self.data
    }

    pub fn face_index(&self) -> u32 {
        self.face_index
    }

    pub fn glyph_id(&self, c: char) -> Option<u16> {
        self.as_ttf_face()?.glyph_index(c).map(|id| id.0)
    }

    pub fn has_glyph(&self, c: char) -> bool {
        self.glyph_id(c).is_some()
    }

    pub fn glyph_advance(&self, glyph_id: u16) -> Option<u16> {
        self.as_ttf_face()?.glyph_hor_advance(ttf_parser::GlyphId(glyph_id))
    }
}
