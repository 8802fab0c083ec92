//! Outline-to-bitmap rasterization.
//!
//! `ttf_parser::OutlineBuilder` feeds an `ab_glyph_rasterizer::Rasterizer`,
//! sized to the glyph's bounding box plus padding, with an early return for
//! empty or oversized glyphs. Rasterizes at `resolution_factor`× so the
//! atlas manager can account for the oversampling scale when it records
//! final on-screen metrics.

use ab_glyph_rasterizer::{Point, Rasterizer};
use ttf_parser::{Face, GlyphId, OutlineBuilder};

const MAX_GLYPH_DIMENSION: u32 = 1024;

#[derive(Debug, Clone)]
pub struct RasterizedGlyph {
    /// Single-channel (coverage) bitmap, row-major, `width * height` bytes.
    pub bitmap: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub bearing_x: i32,
    pub bearing_y: i32,
    pub advance: f32,
}

struct PathBuilder {
    rasterizer: Rasterizer,
    scale: f32,
    offset_x: f32,
    offset_y: f32,
    current: Point,
}

impl PathBuilder {
    fn map(&self, x: f32, y: f32) -> Point {
        Point {
            x: x * self.scale + self.offset_x,
            y: -y * self.scale + self.offset_y,
        }
    }
}

impl OutlineBuilder for PathBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        self.current = self.map(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let p = self.map(x, y);
        self.rasterizer.draw_line(self.current, p);
        self.current = p;
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let c = self.map(x1, y1);
        let p = self.map(x, y);
        self.rasterizer.draw_quad(self.current, c, p);
        self.current = p;
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let c1 = self.map(x1, y1);
        let c2 = self.map(x2, y2);
        let p = self.map(x, y);
        self.rasterizer.draw_cubic(self.current, c1, c2, p);
        self.current = p;
    }

    fn close(&mut self) {
        // ab_glyph_rasterizer auto-closes contours during coverage fill.
    }
}

/// Rasterizes glyph outlines into coverage bitmaps at a chosen padding and
/// oversampling factor.
pub struct GlyphRasterizer {
    padding: u32,
}

impl GlyphRasterizer {
    pub fn new() -> GlyphRasterizer {
        GlyphRasterizer { padding: 1 }
    }

    pub fn with_padding(padding: u32) -> GlyphRasterizer {
        GlyphRasterizer { padding }
    }

    /// `font_size` and `resolution_factor` combine into the scale applied
    /// to font units; the resulting bitmap is `resolution_factor` times
    /// larger than final on-screen size, to be downsampled by whatever
    /// consumes it (or used directly for a higher-DPI atlas entry).
    pub fn rasterize(
        &self,
        face: &Face<'_>,
        glyph_id: u16,
        font_size: f32,
        resolution_factor: f32,
    ) -> RasterizedGlyph {
        let gid = GlyphId(glyph_id);
        let units_per_em = face.units_per_em() as f32;
        let scale = (font_size * resolution_factor) / units_per_em;
        let advance = face
            .glyph_hor_advance(gid)
            .map(|a| a as f32 * scale)
            .unwrap_or(0.0);

        let Some(bbox) = face.glyph_bounding_box(gid) else {
            return RasterizedGlyph {
                bitmap: Vec::new(),
                width: 0,
                height: 0,
                bearing_x: 0,
                bearing_y: 0,
                advance,
            };
        };

        let px_min_x = (bbox.x_min as f32 * scale).floor() as i32 - self.padding as i32;
        let px_max_x = (bbox.x_max as f32 * scale).ceil() as i32 + self.padding as i32;
        let px_min_y = (bbox.y_min as f32 * scale).floor() as i32 - self.padding as i32;
        let px_max_y = (bbox.y_max as f32 * scale).ceil() as i32 + self.padding as i32;

        let width = (px_max_x - px_min_x).max(0) as u32;
        let height = (px_max_y - px_min_y).max(0) as u32;

        if width == 0 || height == 0 || width > MAX_GLYPH_DIMENSION || height > MAX_GLYPH_DIMENSION {
            return RasterizedGlyph {
                bitmap: Vec::new(),
                width: 0,
                height: 0,
                bearing_x: 0,
                bearing_y: 0,
                advance,
            };
        }

        let mut builder = PathBuilder {
            rasterizer: Rasterizer::new(width as usize, height as usize),
            scale,
            offset_x: -px_min_x as f32,
            offset_y: px_max_y as f32,
            current: Point { x: 0.0, y: 0.0 },
        };
        face.outline_glyph(gid, &mut builder);

        let mut bitmap = vec![0u8; (width * height) as usize];
        builder.rasterizer.for_each_pixel_2d(|x, y, coverage| {
            let idx = (y as usize) * (width as usize) + (x as usize);
            if idx < bitmap.len() {
                bitmap[idx] = (coverage.clamp(0.0, 1.0) * 255.0) as u8;
            }
        });

        RasterizedGlyph {
            bitmap,
            width,
            height,
            bearing_x: px_min_x,
            bearing_y: px_max_y,
            advance,
        }
    }
}

impl Default for GlyphRasterizer {
    fn default() -> Self {
        GlyphRasterizer::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rasterizer_creation() {
        let r = GlyphRasterizer::new();
        assert_eq!(r.padding, 1);
        let r2 = GlyphRasterizer::with_padding(3);
        assert_eq!(r2.padding, 3);
    }
}
