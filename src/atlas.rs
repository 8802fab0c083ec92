//! Shelf-packed glyph atlas with multi-sheet growth.
//!
//! A `Shelf`/best-fit-by-min-y packer grows across a `Vec<Sheet>` as needed,
//! keyed on `(FontKey, glyph_id)` since a bare glyph id is only unique within
//! one font.

use rustc_hash::FxHashMap;
use tracing::warn;

use crate::error::{Result, TextError};
use crate::font::FontMetrics;
use crate::rasterizer::GlyphRasterizer;
use crate::registry::{DerivedFont, FontKey};

/// A rectangular region of an atlas sheet, in texels, UV-ready.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TexturedGlyph {
    pub atlas_id: u32,
    pub u0: f32,
    pub v0: f32,
    pub u1: f32,
    pub v1: f32,
    pub advance: f32,
    pub bearing_x: f32,
    pub bearing_y: f32,
    pub width: f32,
    pub height: f32,
}

impl TexturedGlyph {
    fn empty(advance: f32) -> TexturedGlyph {
        TexturedGlyph {
            atlas_id: 0,
            u0: 0.0,
            v0: 0.0,
            u1: 0.0,
            v1: 0.0,
            advance,
            bearing_x: 0.0,
            bearing_y: 0.0,
            width: 0.0,
            height: 0.0,
        }
    }
}

/// Receives actual GPU texture allocation/upload calls. GPU command
/// submission is left to the host toolkit — this trait is the seam; the
/// atlas manager only ever deals in CPU-side pixels and shelf bookkeeping.
pub trait AtlasUploader {
    /// Allocates a new sheet of the given size; returns a client-assigned
    /// handle (e.g. a texture id) or an error if GPU memory is exhausted.
    fn allocate_sheet(&mut self, width: u32, height: u32) -> Result<()>;

    /// Uploads a dirty sub-rectangle of a previously allocated sheet.
    fn upload(&mut self, sheet_index: u32, x: u32, y: u32, width: u32, height: u32, pixels: &[u8]);

    /// Regenerates the mip chain for a whole sheet. No-op unless mipmaps
    /// are enabled in configuration.
    fn regenerate_mipmaps(&mut self, _sheet_index: u32) {}
}

/// An uploader that does nothing — useful for headless layout-only use
/// (measuring text without a GPU context) and for tests.
#[derive(Default)]
pub struct NullUploader;

impl AtlasUploader for NullUploader {
    fn allocate_sheet(&mut self, _width: u32, _height: u32) -> Result<()> {
        Ok(())
    }

    fn upload(&mut self, _sheet_index: u32, _x: u32, _y: u32, _width: u32, _height: u32, _pixels: &[u8]) {}
}

const BORDER: u32 = 2;
const SPACING: u32 = 1;

struct Shelf {
    y: u32,
    height: u32,
}

struct Sheet {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    shelves: Vec<Shelf>,
    cursor_x: u32,
    cursor_y: u32,
    current_line_height: u32,
    dirty: bool,
}

impl Sheet {
    fn new(width: u32, height: u32) -> Sheet {
        Sheet {
            width,
            height,
            pixels: vec![0u8; (width * height) as usize],
            shelves: Vec::new(),
            cursor_x: SPACING,
            cursor_y: SPACING,
            current_line_height: 0,
            dirty: false,
        }
    }

    /// Returns the top-left corner (inner rect, border excluded) for a
    /// `width x height` allocation, or `None` if this sheet has no room.
    fn allocate(&mut self, width: u32, height: u32) -> Option<(u32, u32)> {
        let padded_w = width + 2 * BORDER;
        let padded_h = height + 2 * BORDER;

        if self.cursor_x + padded_w + SPACING > self.width {
            self.shelves.push(Shelf {
                y: self.cursor_y,
                height: self.current_line_height,
            });
            self.cursor_x = SPACING;
            self.cursor_y += self.current_line_height + 2 * SPACING;
            self.current_line_height = 0;
        }

        if self.cursor_y + padded_h + SPACING > self.height {
            return None;
        }

        let x = self.cursor_x + BORDER;
        let y = self.cursor_y + BORDER;
        self.cursor_x += padded_w + SPACING;
        self.current_line_height = self.current_line_height.max(padded_h);
        Some((x, y))
    }

    fn blit(&mut self, x: u32, y: u32, width: u32, height: u32, bitmap: &[u8]) {
        for row in 0..height {
            let dst_start = ((y + row) * self.width + x) as usize;
            let src_start = (row * width) as usize;
            let dst = &mut self.pixels[dst_start..dst_start + width as usize];
            let src = &bitmap[src_start..src_start + width as usize];
            dst.copy_from_slice(src);
        }
        self.dirty = true;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct GlyphKey {
    font: FontKey,
    glyph_id: u16,
}

/// Owns every atlas sheet, the glyph/digit memoization tables, and the
/// rasterizer that feeds them. This type is render-owner-confined: only
/// the thread driving the render loop ever calls its mutating methods.
pub struct GlyphAtlasManager<U: AtlasUploader> {
    sheets: Vec<Sheet>,
    glyph_cache: FxHashMap<GlyphKey, TexturedGlyph>,
    digit_cache: FxHashMap<FontKey, [TexturedGlyph; 10]>,
    rasterizer: GlyphRasterizer,
    uploader: U,
    sheet_width: u32,
    sheet_height: u32,
    resolution_factor: f32,
    mipmap: bool,
}

impl<U: AtlasUploader> GlyphAtlasManager<U> {
    pub fn new(sheet_width: u32, sheet_height: u32, resolution_factor: u8, mipmap: bool, uploader: U) -> Self {
        GlyphAtlasManager {
            sheets: Vec::new(),
            glyph_cache: FxHashMap::default(),
            digit_cache: FxHashMap::default(),
            rasterizer: GlyphRasterizer::with_padding(0),
            uploader,
            sheet_width,
            sheet_height,
            resolution_factor: resolution_factor.max(1) as f32,
            mipmap,
        }
    }

    fn ensure_sheet(&mut self) -> Result<usize> {
        if self.sheets.is_empty() {
            self.uploader.allocate_sheet(self.sheet_width, self.sheet_height)?;
            self.sheets.push(Sheet::new(self.sheet_width, self.sheet_height));
        }
        Ok(self.sheets.len() - 1)
    }

    fn pack(&mut self, width: u32, height: u32, bitmap: &[u8]) -> Result<(u32, u32, u32)> {
        let mut sheet_index = self.ensure_sheet()?;
        loop {
            if let Some((x, y)) = self.sheets[sheet_index].allocate(width, height) {
                self.sheets[sheet_index].blit(x, y, width, height, bitmap);
                let sheet_w = self.sheets[sheet_index].width;
                let sheet_h = self.sheets[sheet_index].height;
                self.uploader
                    .upload(sheet_index as u32, x, y, width, height, bitmap);
                if self.mipmap {
                    self.uploader.regenerate_mipmaps(sheet_index as u32);
                }
                let _ = (sheet_w, sheet_h);
                return Ok((sheet_index as u32, x, y));
            }

            // Current sheet full: allocate a new one and retry once.
            match self.uploader.allocate_sheet(self.sheet_width, self.sheet_height) {
                Ok(()) => {
                    self.sheets.push(Sheet::new(self.sheet_width, self.sheet_height));
                    sheet_index = self.sheets.len() - 1;
                }
                Err(e) => {
                    warn!(error = %e, "atlas sheet allocation failed, retrying once");
                    // Retry against the same (still-full) sheet once more
                    // before surfacing the failure for this frame.
                    if self.sheets[sheet_index].allocate(width, height).is_none() {
                        return Err(TextError::AtlasFull);
                    }
                }
            }
        }
    }

    /// `glyph(font, glyph_id) -> TexturedGlyph`, memoized on `(font_key,
    /// glyph_id)`.
    pub fn glyph(&mut self, font: &DerivedFont, glyph_id: u16) -> Result<TexturedGlyph> {
        let key = GlyphKey {
            font: font.key,
            glyph_id,
        };
        if let Some(existing) = self.glyph_cache.get(&key) {
            return Ok(*existing);
        }

        let entry = self.rasterize_and_pack(font, glyph_id)?;
        self.glyph_cache.insert(key, entry);
        Ok(entry)
    }

    fn rasterize_and_pack(&mut self, font: &DerivedFont, glyph_id: u16) -> Result<TexturedGlyph> {
        let Some(face) = font.face.as_ttf_face() else {
            return Err(TextError::InvalidFontData);
        };
        let rasterized =
            self.rasterizer
                .rasterize(&face, glyph_id, font.pt_size as f32, self.resolution_factor);

        let scale = 1.0 / self.resolution_factor;
        let advance = rasterized.advance * scale;

        // Zero-advance, zero-bounds glyphs (combining marks) and
        // space-like glyphs with bounds but no pixels get no atlas entry —
        // they only contribute to advance accumulation.
        if rasterized.width == 0 || rasterized.height == 0 {
            return Ok(TexturedGlyph::empty(advance));
        }

        let (sheet_index, x, y) = self.pack(rasterized.width, rasterized.height, &rasterized.bitmap)?;
        let sheet_w = self.sheets[sheet_index as usize].width as f32;
        let sheet_h = self.sheets[sheet_index as usize].height as f32;

        // UVs include one texel of the transparent border on each side to
        // hide bilinear bleed at adjacent glyph edges.
        let u0 = (x as f32 - 1.0) / sheet_w;
        let v0 = (y as f32 - 1.0) / sheet_h;
        let u1 = (x as f32 + rasterized.width as f32 + 1.0) / sheet_w;
        let v1 = (y as f32 + rasterized.height as f32 + 1.0) / sheet_h;

        Ok(TexturedGlyph {
            atlas_id: sheet_index,
            u0,
            v0,
            u1,
            v1,
            advance,
            bearing_x: rasterized.bearing_x as f32 * scale,
            bearing_y: rasterized.bearing_y as f32 * scale,
            width: rasterized.width as f32 * scale,
            height: rasterized.height as f32 * scale,
        })
    }

    /// `digits(font) -> [TexturedGlyph; 10]`, memoized on `font_key`. All
    /// ten share `'0'`'s advance; glyphs narrower than `'0'` are centered
    /// within it.
    pub fn digits(&mut self, font: &DerivedFont) -> Result<[TexturedGlyph; 10]> {
        if let Some(existing) = self.digit_cache.get(&font.key) {
            return Ok(*existing);
        }

        let zero_id = font.face.glyph_id('0').unwrap_or(0);
        let zero = self.glyph(font, zero_id)?;

        let mut out = [zero; 10];
        out[0] = zero;
        for (digit, slot) in out.iter_mut().enumerate().skip(1) {
            let c = char::from_digit(digit as u32, 10).unwrap();
            let gid = font.face.glyph_id(c).unwrap_or(zero_id);
            let mut g = self.glyph(font, gid)?;
            if g.width < zero.width {
                let center_offset = (zero.width - g.width) / 2.0;
                g.bearing_x += center_offset;
            }
            g.advance = zero.advance;
            *slot = g;
        }

        self.digit_cache.insert(font.key, out);
        Ok(out)
    }

    pub fn metrics(&self, font: &DerivedFont) -> FontMetrics {
        font.face.metrics()
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    /// Takes and clears the dirty flag for a sheet, for callers that track
    /// upload state outside the `AtlasUploader` push model.
    pub fn take_dirty(&mut self, sheet_index: usize) -> bool {
        self.sheets
            .get_mut(sheet_index)
            .map(|s| std::mem::replace(&mut s.dirty, false))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sheet_packing_moves_to_new_shelf_when_row_full() {
        let mut sheet = Sheet::new(16, 16);
        let bitmap = vec![255u8; 4 * 4];
        let first = sheet.allocate(4, 4).unwrap();
        sheet.blit(first.0, first.1, 4, 4, &bitmap);
        assert_eq!(first, (2, 2));

        // Exhaust the row width (16) with BORDER(2)+SPACING(1) per glyph.
        for _ in 0..3 {
            let pos = sheet.allocate(4, 4);
            if let Some((x, y)) = pos {
                sheet.blit(x, y, 4, 4, &bitmap);
            }
        }
        // Whatever didn't fit on the first shelf must have moved down.
        assert!(sheet.cursor_y >= 2);
    }

    #[test]
    fn sheet_packing_returns_none_when_exhausted() {
        let mut sheet = Sheet::new(8, 8);
        assert!(sheet.allocate(4, 4).is_some());
        // A second glyph this size cannot fit in an 8x8 sheet alongside it.
        let second = sheet.allocate(4, 4);
        assert!(second.is_none() || sheet.cursor_y > 2);
    }
}
