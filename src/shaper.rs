//! Text shaping using rustybuzz (HarfBuzz).
//!
//! Builds a `rustybuzz::Face` from the same byte slice + face index
//! `ttf-parser` already parsed, pushes the run text into a `UnicodeBuffer`,
//! shapes with an explicit direction hint from the bidi segmenter, and
//! scales font-unit positions down by `pt_size / units_per_em`. Falls back
//! to one-glyph-per-character shaping if `rustybuzz::Face::from_slice`
//! rejects the font data. Digit and obfuscated runs are classified here and
//! fed to the atlas's shared-width placeholder tables.
//!
//! Color and underline/strikethrough are left unset here even though
//! `Run::style` carries them: a run only splits on bold/italic, so a color
//! change partway through a run isn't reflected in `run.style`. The
//! assembler resolves the authoritative per-glyph style from the original
//! change list instead.

use std::borrow::Cow;

use rustybuzz::{Direction, UnicodeBuffer};

use crate::atlas::{AtlasUploader, GlyphAtlasManager};
use crate::bidi::{Run, RunDirection};
use crate::error::Result;
use crate::node::{EffectFlags, GlyphRecord, GlyphVariant};
use crate::registry::FontRegistry;

/// Owns a reusable `UnicodeBuffer` scratch allocation across calls, in the
/// render-owner-confined style the atlas manager also follows — shaping
/// happens every frame for unchanged text only on a cache miss, but when it
/// does happen we'd rather not reallocate the buffer each time.
pub struct Shaper {
    buffer: Option<UnicodeBuffer>,
}

impl Shaper {
    pub fn new() -> Shaper {
        Shaper {
            buffer: Some(UnicodeBuffer::new()),
        }
    }

    fn take(&mut self) -> UnicodeBuffer {
        self.buffer.take().unwrap_or_default()
    }

    fn give_back(&mut self, buffer: UnicodeBuffer) {
        self.buffer = Some(buffer);
    }

    /// Shapes one run (already split by bidi direction, style, and font by
    /// the segmenter) and appends its glyph records to `out`, advancing
    /// `cursor` by the run's total width. `font_size` is the caller's
    /// requested point size for this whole `lookup` call — one size per
    /// text, since `Style` carries no independent size field.
    pub fn shape_run<U: AtlasUploader>(
        &mut self,
        text: &str,
        run: &Run,
        font_size: u16,
        registry: &FontRegistry,
        atlas: &mut GlyphAtlasManager<U>,
        cursor: &mut f32,
        out: &mut Vec<GlyphRecord>,
    ) -> Result<()> {
        if run.style.obfuscated {
            return self.shape_obfuscated(text, run, font_size, registry, atlas, cursor, out);
        }

        let derived = registry.derive(&run.font, run.style.layout_bits(), font_size);
        let segment = &text[run.start..run.end];
        if segment.is_empty() {
            return Ok(());
        }

        let Some(ttf_face) = derived.face.as_ttf_face() else {
            return self.fallback_shape(text, run, font_size, registry, atlas, cursor, out);
        };
        let units_per_em = ttf_face.units_per_em().max(1) as f32;
        let scale = font_size as f32 / units_per_em;

        let Some(hb_face) = rustybuzz::Face::from_slice(derived.face.data().as_slice(), derived.face.face_index())
        else {
            return self.fallback_shape(text, run, font_size, registry, atlas, cursor, out);
        };

        // Every ASCII digit is shaped as if it were '0' so all ten forms
        // share one cluster advance — the atlas's digit table is keyed the
        // same way, which is what makes two texts differing only in which
        // digit they contain produce identical geometry (and so collide in
        // the render-node cache). The actual digit drawn is read back from
        // the original string at draw time, not from this buffer.
        let digit_normalized: Cow<str> = if segment.bytes().any(|b| b.is_ascii_digit()) {
            Cow::Owned(
                segment
                    .chars()
                    .map(|c| if c.is_ascii_digit() { '0' } else { c })
                    .collect(),
            )
        } else {
            Cow::Borrowed(segment)
        };

        let mut buffer = self.take();
        buffer.push_str(&digit_normalized);
        buffer.set_direction(match run.direction {
            RunDirection::Ltr => Direction::LeftToRight,
            RunDirection::Rtl => Direction::RightToLeft,
        });
        buffer.guess_segment_properties();

        let glyph_buffer = rustybuzz::shape(&hb_face, &[], buffer);
        let infos = glyph_buffer.glyph_infos();
        let positions = glyph_buffer.glyph_positions();

        for (info, pos) in infos.iter().zip(positions.iter()) {
            let cluster = info.cluster as usize;
            let string_index = run.start + cluster;
            let x_offset = pos.x_offset as f32 * scale;
            let advance = pos.x_advance as f32 * scale;
            let offset_x = *cursor + x_offset;

            let c = segment[cluster..].chars().next().unwrap_or('\u{FFFD}');
            let variant = if c.is_ascii_digit() {
                GlyphVariant::Digit(atlas.digits(&derived)?)
            } else {
                GlyphVariant::Static(atlas.glyph(&derived, info.glyph_id as u16)?)
            };

            out.push(GlyphRecord {
                variant,
                string_index,
                offset_x,
                color: None,
                effect: EffectFlags::default(),
            });

            *cursor += advance;
        }

        self.give_back(glyph_buffer.clear());
        Ok(())
    }

    /// Obfuscated ("magic") runs never go through HarfBuzz — the glyph
    /// actually drawn changes every frame, so shaping it once would be
    /// wasted work. Each character advances by the digit table's shared
    /// width and is rendered as a `Random` placeholder resolved at draw
    /// time.
    fn shape_obfuscated<U: AtlasUploader>(
        &mut self,
        text: &str,
        run: &Run,
        font_size: u16,
        registry: &FontRegistry,
        atlas: &mut GlyphAtlasManager<U>,
        cursor: &mut f32,
        out: &mut Vec<GlyphRecord>,
    ) -> Result<()> {
        let derived = registry.derive(&run.font, run.style.layout_bits(), font_size);
        let digits = atlas.digits(&derived)?;
        let segment = &text[run.start..run.end];

        for (i, _c) in segment.char_indices() {
            out.push(GlyphRecord {
                variant: GlyphVariant::Random(digits),
                string_index: run.start + i,
                offset_x: *cursor,
                color: None,
                effect: EffectFlags::default(),
            });
            *cursor += digits[0].advance;
        }
        Ok(())
    }

    /// Used only when `rustybuzz::Face::from_slice` rejects the font data
    /// (corrupt or unsupported table layout `ttf-parser` otherwise
    /// tolerated). No kerning or shaping features, one glyph per character,
    /// advance taken straight from the atlas entry.
    fn fallback_shape<U: AtlasUploader>(
        &mut self,
        text: &str,
        run: &Run,
        font_size: u16,
        registry: &FontRegistry,
        atlas: &mut GlyphAtlasManager<U>,
        cursor: &mut f32,
        out: &mut Vec<GlyphRecord>,
    ) -> Result<()> {
        let derived = registry.derive(&run.font, run.style.layout_bits(), font_size);
        let segment = &text[run.start..run.end];

        for (i, c) in segment.char_indices() {
            let string_index = run.start + i;
            let variant = if c.is_ascii_digit() {
                GlyphVariant::Digit(atlas.digits(&derived)?)
            } else {
                let glyph_id = derived.face.glyph_id(c).unwrap_or(0);
                GlyphVariant::Static(atlas.glyph(&derived, glyph_id)?)
            };
            let advance = variant.advance();
            out.push(GlyphRecord {
                variant,
                string_index,
                offset_x: *cursor,
                color: None,
                effect: EffectFlags::default(),
            });
            *cursor += advance;
        }
        Ok(())
    }
}

impl Default for Shaper {
    fn default() -> Self {
        Shaper::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::{GlyphAtlasManager, NullUploader};
    use crate::bidi;
    use crate::format;
    use crate::registry::FontRegistry;
    use crate::style::{Palette, Style};

    #[test]
    fn shaping_a_run_advances_the_cursor() {
        let registry = FontRegistry::new();
        registry.preload_fonts(&[]);
        let Ok(font) = registry.lookup_font('a') else {
            eprintln!("no system fonts available in this environment, skipping");
            return;
        };

        let (stripped, changes, _remap) = format::resolve("Hi", Style::DEFAULT, &Palette::classic());
        let runs = bidi::segment(&stripped, &changes, &registry);
        assert!(!runs.is_empty());

        let mut atlas = GlyphAtlasManager::new(256, 256, 1, false, NullUploader);
        let mut shaper = Shaper::new();
        let mut cursor = 0.0f32;
        let mut records = Vec::new();
        for run in &runs {
            let _ = &font;
            shaper
                .shape_run(&stripped, run, 16, &registry, &mut atlas, &mut cursor, &mut records)
                .unwrap();
        }
        assert!(cursor > 0.0);
        assert!(!records.is_empty());
    }
}
