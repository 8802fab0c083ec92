//! Formatting-code resolution: `§`-prefixed escapes → stripped text + style
//! changes.

use crate::style::{ColorValue, Palette, Style};

pub(crate) const SECTION: char = '\u{00A7}';

/// `(original_index, stripped_index, effective_style)`, sorted by
/// `stripped_index`. Index 0 always holds the style in effect at offset 0,
/// via a leading sentinel even when the raw text has no leading escape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StyleChange {
    pub original_index: usize,
    pub stripped_index: usize,
    pub style: Style,
}

/// Maps a byte offset into the stripped text back to the corresponding byte
/// offset in the raw (unstripped) text.
///
/// Built alongside the style-change list during [`resolve`]. A plain
/// breakpoint table rather than reconstructed index arithmetic: every time
/// bytes are dropped (a recognized escape consumes them, or an unrecognized
/// one is stripped) we record where the next verbatim run resumes in both
/// texts, so `to_original` is a direct lookup instead of replaying the
/// removal count.
#[derive(Debug, Clone)]
pub struct IndexRemap {
    // Ascending by `.0` (stripped offset); first entry is always (0, 0).
    breakpoints: Vec<(usize, usize)>,
}

impl IndexRemap {
    pub fn to_original(&self, stripped_offset: usize) -> usize {
        let i = self
            .breakpoints
            .partition_point(|&(s, _)| s <= stripped_offset);
        let (s, o) = self.breakpoints[i - 1];
        stripped_offset - s + o
    }
}

/// Scans `raw` once, stripping `§`-escapes and recording the style that
/// takes effect at each stripped-text position. Unknown classifiers are
/// dropped silently (both characters removed, no style change emitted).
pub fn resolve(raw: &str, default_style: Style, palette: &Palette) -> (String, Vec<StyleChange>, IndexRemap) {
    let mut stripped = String::with_capacity(raw.len());
    let mut changes = vec![StyleChange {
        original_index: 0,
        stripped_index: 0,
        style: default_style,
    }];
    let mut breakpoints = vec![(0usize, 0usize)];
    let mut current = default_style;

    let mut chars = raw.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == SECTION {
            if let Some(&(j, classifier)) = chars.peek() {
                let after = j + classifier.len_utf8();
                if let Some(new_style) = apply_classifier(current, default_style, classifier, palette) {
                    chars.next();
                    current = new_style;
                    changes.push(StyleChange {
                        original_index: i,
                        stripped_index: stripped.len(),
                        style: current,
                    });
                    breakpoints.push((stripped.len(), after));
                } else {
                    chars.next();
                    breakpoints.push((stripped.len(), after));
                }
                continue;
            }
            // Trailing `§` with nothing after it: not a valid escape pair
            // (`i+1 < len` guard), copy verbatim.
        }
        stripped.push(c);
    }

    (stripped, changes, IndexRemap { breakpoints })
}

/// Resolves a single classifier character against the currently accumulated
/// style, returning `None` if it isn't one of the 22 recognized codes.
fn apply_classifier(current: Style, default_style: Style, classifier: char, palette: &Palette) -> Option<Style> {
    let lower = classifier.to_ascii_lowercase();
    if let Some(index) = lower.to_digit(16) {
        // Color classifier: resets the non-color flags to the enclosing
        // style's defaults and sets the palette color.
        return Some(Style {
            color: ColorValue::Explicit(palette.get(index as u8)),
            bold: default_style.bold,
            italic: default_style.italic,
            underline: default_style.underline,
            strikethrough: default_style.strikethrough,
            obfuscated: default_style.obfuscated,
        });
    }
    match lower {
        'k' => Some(Style { obfuscated: true, ..current }),
        'l' => Some(Style { bold: true, ..current }),
        'm' => Some(Style { strikethrough: true, ..current }),
        'n' => Some(Style { underline: true, ..current }),
        'o' => Some(Style { italic: true, ..current }),
        'r' => Some(default_style),
        _ => None,
    }
}

/// Resolves the style in effect at a given stripped-text byte offset by
/// finding the last style change at or before it.
pub fn style_at(changes: &[StyleChange], stripped_offset: usize) -> Style {
    let i = changes.partition_point(|c| c.stripped_index <= stripped_offset);
    changes[i - 1].style
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::Color;

    fn palette() -> Palette {
        Palette::classic()
    }

    #[test]
    fn plain_text_has_no_changes_beyond_sentinel() {
        let (stripped, changes, _) = resolve("Hello", Style::DEFAULT, &palette());
        assert_eq!(stripped, "Hello");
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].style, Style::DEFAULT);
    }

    #[test]
    fn color_code_strips_and_resets_flags() {
        let default = Style {
            color: ColorValue::Explicit(Color::WHITE),
            ..Style::DEFAULT
        };
        let (stripped, changes, _) = resolve("§cRed§r and black", default, &palette());
        assert_eq!(stripped, "Red and black");
        // sentinel + §c + §r
        assert_eq!(changes.len(), 3);
        assert_eq!(changes[1].style.color, ColorValue::Explicit(palette().get(0xc)));
        assert_eq!(changes[2].style, default);
    }

    #[test]
    fn unknown_classifier_is_dropped_without_a_style_change() {
        let (stripped, changes, _) = resolve("a§zb", Style::DEFAULT, &palette());
        assert_eq!(stripped, "ab");
        assert_eq!(changes.len(), 1);
    }

    #[test]
    fn bold_and_italic_are_additive_not_resetting() {
        let (stripped, changes, _) = resolve("§l§oBoth", Style::DEFAULT, &palette());
        assert_eq!(stripped, "Both");
        let last = changes.last().unwrap().style;
        assert!(last.bold && last.italic);
    }

    #[test]
    fn index_remap_accounts_for_dropped_escapes() {
        let (stripped, _changes, remap) = resolve("§cRed§r and black", Style::DEFAULT, &palette());
        assert_eq!(&stripped[0..3], "Red");
        // "Red" starts right after the first escape (3 raw bytes: § + c).
        assert_eq!(remap.to_original(0), 3);
        // " and black" starts after both escapes.
        let and_pos = stripped.find(" and").unwrap();
        assert_eq!(&stripped[and_pos..and_pos + 4], " and");
        assert_eq!(remap.to_original(and_pos), and_pos + 6);
    }

    #[test]
    fn trailing_lone_section_is_kept_verbatim() {
        let (stripped, changes, _) = resolve("abc§", Style::DEFAULT, &palette());
        assert_eq!(stripped, "abc§");
        assert_eq!(changes.len(), 1);
    }

    #[test]
    fn style_at_finds_the_change_in_effect() {
        let (_stripped, changes, _) = resolve("§lBold§rPlain", Style::DEFAULT, &palette());
        let bold_pos = 0;
        let plain_pos = "Bold".len();
        assert!(style_at(&changes, bold_pos).bold);
        assert!(!style_at(&changes, plain_pos).bold);
    }
}
