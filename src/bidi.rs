//! Bidirectional reordering and run segmentation.
//!
//! Built on `unicode-bidi` for Unicode Bidirectional Algorithm reordering,
//! then further split by layout-relevant style bits and resolved font.

use std::sync::Arc;

use unicode_bidi::{BidiClass, BidiInfo, Level};

use crate::format::{style_at, StyleChange};
use crate::registry::{FontRegistry, PhysicalFont};
use crate::style::Style;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunDirection {
    Ltr,
    Rtl,
}

/// One (start, limit, direction, style, font) segment of the stripped text,
/// visually ordered and already split by bidi level, layout-relevant style
/// bits (bold/italic), and resolved font.
pub struct Run {
    pub start: usize,
    pub end: usize,
    pub direction: RunDirection,
    pub style: Style,
    pub font: Arc<PhysicalFont>,
}

/// Characters that never force a font split even if their own resolved font
/// would differ from the run's: plain space and the handful of invisible
/// joiners/format characters. A full Unicode general-category lookup would
/// be more faithful to "zero-advance, zero-bounds character" but that
/// information only exists after rasterization, one layer below this
/// component — approximated here with a fixed table.
fn is_format_or_space(c: char) -> bool {
    matches!(
        c,
        ' ' | '\u{00AD}' // soft hyphen
            | '\u{200B}'..='\u{200F}' // ZWSP, ZWNJ, ZWJ, LRM/RLM etc.
            | '\u{2060}'..='\u{2064}'
            | '\u{FEFF}' // BOM / ZWNBSP
    )
}

fn has_strong_rtl(classes: &[BidiClass]) -> bool {
    classes
        .iter()
        .any(|c| matches!(c, BidiClass::R | BidiClass::AL))
}

/// Step 1+2: paragraph direction defaults to LTR; if no strong RTL
/// character exists the whole text is a single LTR visual run, otherwise
/// the Unicode Bidirectional Algorithm reorders same-level spans.
fn visual_runs(text: &str) -> Vec<(usize, usize, RunDirection)> {
    if text.is_empty() {
        return Vec::new();
    }

    let bidi_info = BidiInfo::new(text, Some(Level::ltr()));
    if !has_strong_rtl(&bidi_info.original_classes) {
        return vec![(0, text.len(), RunDirection::Ltr)];
    }

    let mut out = Vec::new();
    for para in &bidi_info.paragraphs {
        let (levels, ranges) = bidi_info.visual_runs(para, para.range.clone());
        for range in ranges {
            if range.is_empty() {
                continue;
            }
            let level = levels[range.start];
            let direction = if level.is_rtl() { RunDirection::Rtl } else { RunDirection::Ltr };
            out.push((range.start, range.end, direction));
        }
    }
    out
}

/// Step 3: split a bidi run at every stripped-text offset where the
/// style's layout-relevant bits (bold/italic) change.
fn split_by_style(text: &str, changes: &[StyleChange], start: usize, end: usize) -> Vec<(usize, usize, Style)> {
    let mut out = Vec::new();
    let mut run_start = start;
    let mut run_style = style_at(changes, start);
    for (i, _c) in text[start..end].char_indices() {
        let idx = start + i;
        let style = style_at(changes, idx);
        if style.layout_bits() != run_style.layout_bits() && idx != run_start {
            out.push((run_start, idx, run_style));
            run_start = idx;
            run_style = style;
        } else {
            run_style = style;
        }
    }
    out.push((run_start, end, run_style));
    out
}

/// Step 4: within a style-homogeneous sub-run, split again whenever the
/// resolved font changes. Spaces and zero-width format characters never
/// trigger a split.
fn split_by_font(text: &str, start: usize, end: usize, registry: &FontRegistry) -> Vec<(usize, usize, Arc<PhysicalFont>)> {
    let mut out = Vec::new();
    let mut run_start = start;
    let mut run_font: Option<Arc<PhysicalFont>> = None;

    for (i, c) in text[start..end].char_indices() {
        let idx = start + i;
        let resolved = registry.lookup_font(c).ok();
        match (&run_font, &resolved) {
            (None, _) => run_font = resolved,
            (Some(cur), Some(next)) => {
                if !is_format_or_space(c) && cur.key != next.key {
                    out.push((run_start, idx, cur.clone()));
                    run_start = idx;
                    run_font = Some(next.clone());
                }
            }
            _ => {}
        }
    }

    if let Some(font) = run_font {
        out.push((run_start, end, font));
    }
    out
}

/// Runs the whole D-component pipeline: bidi reordering, then style split,
/// then font split, over the stripped text.
pub fn segment(text: &str, changes: &[StyleChange], registry: &FontRegistry) -> Vec<Run> {
    let mut out = Vec::new();
    for (b_start, b_end, direction) in visual_runs(text) {
        for (s_start, s_end, style) in split_by_style(text, changes, b_start, b_end) {
            for (f_start, f_end, font) in split_by_font(text, s_start, s_end, registry) {
                out.push(Run {
                    start: f_start,
                    end: f_end,
                    direction,
                    style,
                    font,
                });
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pure_ltr_text_is_a_single_visual_run() {
        let runs = visual_runs("Hello, world");
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0], (0, "Hello, world".len(), RunDirection::Ltr));
    }

    #[test]
    fn mixed_bidi_text_produces_multiple_runs() {
        // Latin, Hebrew (RTL), Latin.
        let text = "a\u{05D0}\u{05D1}b";
        let runs = visual_runs(text);
        assert!(runs.len() >= 2, "expected at least 2 runs, got {}", runs.len());
        assert!(runs.iter().any(|r| r.2 == RunDirection::Rtl));
    }

    #[test]
    fn style_split_breaks_on_bold_change_only() {
        let default = Style::DEFAULT;
        let bold = Style { bold: true, ..Style::DEFAULT };
        let changes = vec![
            StyleChange { original_index: 0, stripped_index: 0, style: default },
            StyleChange { original_index: 2, stripped_index: 2, style: bold },
        ];
        let splits = split_by_style("ABCD", &changes, 0, 4);
        assert_eq!(splits.len(), 2);
        assert_eq!(splits[0].0, 0);
        assert_eq!(splits[0].1, 2);
        assert_eq!(splits[1].0, 2);
        assert_eq!(splits[1].1, 4);
    }
}
