//! Assembles shaped run records into one finished `RenderNode`.
//!
//! A single pass over the flat glyph list handles two jobs: per-glyph
//! style tagging and underline/strikethrough span coalescing.
//!
//! This is the only place a glyph's actual color/underline/strikethrough
//! are decided. `bidi::Run::style` is too coarse for that — a run only
//! splits on bold/italic (since those alone affect the derived font), so a
//! color or effect change partway through a run isn't reflected in
//! `run.style`. Re-deriving from the original change list here, keyed on
//! each glyph's still-stripped `string_index`, is what makes `"§cRed§9Blue"`
//! — a single shaped run — come out two-colored.

use crate::format::{style_at, IndexRemap, StyleChange};
use crate::node::{EffectFlags, EffectKind, EffectSpan, GlyphRecord, RenderNode};
use crate::style::{Color, ColorValue};

/// Builds the final `RenderNode` from every run's glyph records (already in
/// final visual order with correct `offset_x` and stripped-text
/// `string_index` values) plus the style-change list and index remap the C
/// component produced.
pub fn assemble(mut records: Vec<GlyphRecord>, changes: &[StyleChange], remap: &IndexRemap, advance: f32) -> RenderNode {
    for record in &mut records {
        let style = style_at(changes, record.string_index);
        record.color = match style.color {
            ColorValue::Explicit(c) => Some(c),
            ColorValue::Inherit => None,
        };
        record.effect = EffectFlags {
            underline: style.underline,
            strikethrough: style.strikethrough,
        };
        record.string_index = remap.to_original(record.string_index);
    }

    records.sort_by_key(|r| r.string_index);

    let effects = build_effect_spans(&records);
    let has_effects = !effects.is_empty();

    RenderNode {
        glyphs: records,
        effects,
        advance,
        has_effects,
    }
}

/// Coalesces contiguous runs of identically-colored, identically-flagged
/// glyphs into minimal-count rectangles, independently for underline and
/// strikethrough — a glyph can carry both flags and contributes to both
/// tracks.
fn build_effect_spans(records: &[GlyphRecord]) -> Vec<EffectSpan> {
    let mut spans = Vec::new();
    coalesce_track(records, EffectKind::Underline, &mut spans);
    coalesce_track(records, EffectKind::Strikethrough, &mut spans);
    spans
}

fn coalesce_track(records: &[GlyphRecord], kind: EffectKind, out: &mut Vec<EffectSpan>) {
    // Effects are drawn in *visual* order, so iterate by offset_x rather
    // than by the (now original-text-ordered) `string_index`.
    let mut ordered: Vec<&GlyphRecord> = records
        .iter()
        .filter(|r| match kind {
            EffectKind::Underline => r.effect.underline,
            EffectKind::Strikethrough => r.effect.strikethrough,
        })
        .collect();
    ordered.sort_by(|a, b| a.offset_x.partial_cmp(&b.offset_x).unwrap());

    let mut current: Option<(f32, f32, Option<Color>)> = None;
    for record in ordered {
        let x0 = record.offset_x;
        let x1 = record.offset_x + record.variant.advance();
        match &mut current {
            Some((_, end, span_color)) if *span_color == record.color && (x0 - *end).abs() < 0.01 => {
                *end = x1;
            }
            Some((start, end, span_color)) => {
                out.push(EffectSpan { x0: *start, x1: *end, color: *span_color, kind });
                current = Some((x0, x1, record.color));
            }
            None => current = Some((x0, x1, record.color)),
        }
    }
    if let Some((start, end, color)) = current {
        out.push(EffectSpan { x0: start, x1: end, color, kind });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::TexturedGlyph;
    use crate::node::GlyphVariant;
    use crate::style::{Palette, Style};

    fn glyph(string_index: usize, offset_x: f32, advance: f32) -> GlyphRecord {
        GlyphRecord {
            variant: GlyphVariant::Static(TexturedGlyph {
                atlas_id: 1,
                u0: 0.0,
                v0: 0.0,
                u1: 1.0,
                v1: 1.0,
                advance,
                bearing_x: 0.0,
                bearing_y: 0.0,
                width: advance,
                height: 10.0,
            }),
            string_index,
            offset_x,
            color: None,
            effect: EffectFlags::default(),
        }
    }

    #[test]
    fn underline_and_strikethrough_coexist_on_same_glyph() {
        let (stripped, changes, remap) = crate::format::resolve("\u{00A7}n\u{00A7}mAB", Style::DEFAULT, &Palette::classic());
        assert_eq!(stripped, "AB");
        let records = vec![glyph(0, 0.0, 10.0), glyph(1, 10.0, 10.0)];
        let node = assemble(records, &changes, &remap, 20.0);
        assert!(node.has_effects());
        let kinds: Vec<EffectKind> = node.effects().map(|e| e.kind).collect();
        assert!(kinds.contains(&EffectKind::Underline));
        assert!(kinds.contains(&EffectKind::Strikethrough));
        // Each track coalesces the two adjacent glyphs into a single span.
        assert_eq!(node.effects().filter(|e| e.kind == EffectKind::Underline).count(), 1);
    }

    #[test]
    fn different_colors_break_the_coalesced_span() {
        let (stripped, changes, remap) =
            crate::format::resolve("\u{00A7}nA\u{00A7}9\u{00A7}nB", Style::DEFAULT, &Palette::classic());
        assert_eq!(stripped, "AB");
        let records = vec![glyph(0, 0.0, 10.0), glyph(1, 10.0, 10.0)];
        let node = assemble(records, &changes, &remap, 20.0);
        assert_eq!(node.effects().count(), 2);
    }

    #[test]
    fn mid_run_color_change_is_not_masked_by_the_coarser_run_style() {
        let (stripped, changes, remap) =
            crate::format::resolve("\u{00A7}cRed\u{00A7}9Blue", Style::DEFAULT, &Palette::classic());
        assert_eq!(stripped, "RedBlue");
        let records: Vec<GlyphRecord> = stripped
            .char_indices()
            .map(|(i, _)| glyph(i, i as f32 * 10.0, 10.0))
            .collect();
        let node = assemble(records, &changes, &remap, 70.0);
        let colors: Vec<Option<Color>> = node.glyphs().map(|g| g.color).collect();
        assert_eq!(colors[0], Some(Palette::classic().get(0xc)));
        assert_eq!(colors[3], Some(Palette::classic().get(0x9)));
    }

    #[test]
    fn inherited_color_stays_unresolved_for_draw_time() {
        let (_stripped, changes, remap) = crate::format::resolve("A", Style::DEFAULT, &Palette::classic());
        let records = vec![glyph(0, 0.0, 10.0)];
        let node = assemble(records, &changes, &remap, 10.0);
        assert_eq!(node.glyphs().next().unwrap().color, None);
    }

    #[test]
    fn glyphs_end_up_sorted_by_original_string_index() {
        let (_stripped, changes, remap) = crate::format::resolve("AB", Style::DEFAULT, &Palette::classic());
        // Visual order reversed relative to logical order (as an RTL run
        // would produce), assembly must still sort back to original order.
        let records = vec![glyph(1, 0.0, 10.0), glyph(0, 10.0, 10.0)];
        let node = assemble(records, &changes, &remap, 20.0);
        let indices: Vec<usize> = node.glyphs().map(|g| g.string_index).collect();
        assert_eq!(indices, vec![0, 1]);
    }
}
