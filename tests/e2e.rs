//! End-to-end scenarios against the public `TextEngine` facade.
//!
//! These exercise the whole pipeline (format resolution, bidi/style/font
//! segmentation, shaping, atlas packing, assembly, caching) the way a host
//! toolkit actually would, rather than any one component in isolation.
//! Several scenarios need real glyph outlines to assert anything useful;
//! where no system font is available in the sandbox they skip past the
//! glyph-level assertions, same as the in-module tests do.

use std::sync::Arc;
use std::time::Duration;

use glyphcraft::{Color, ColorValue, EffectKind, GlyphVariant, NullUploader, Palette, Style, TextConfig, TextEngine};

fn engine() -> TextEngine<NullUploader> {
    TextEngine::new(TextConfig::default(), Palette::classic(), NullUploader).unwrap()
}

/// True once we've confirmed this sandbox has at least one usable system
/// font; several scenarios are meaningless (zero glyphs, zero advance)
/// without one.
fn has_fonts(engine: &mut TextEngine<NullUploader>) -> bool {
    let probe = engine.lookup("a", Style::DEFAULT);
    probe.glyph_count() > 0
}

#[test]
fn plain_ascii_ltr_lays_out_left_to_right() {
    let mut engine = engine();
    if !has_fonts(&mut engine) {
        eprintln!("no system fonts available, skipping");
        return;
    }

    let node = engine.lookup("Hello", Style::DEFAULT);
    assert_eq!(node.glyph_count(), 5);
    assert!(node.advance() > 0.0);

    let offsets: Vec<f32> = node.glyphs().map(|g| g.offset_x).collect();
    for pair in offsets.windows(2) {
        assert!(pair[1] >= pair[0], "glyphs should be left-to-right: {:?}", offsets);
    }
}

#[test]
fn formatting_codes_are_stripped_but_still_drive_color() {
    let mut engine = engine();
    if !has_fonts(&mut engine) {
        eprintln!("no system fonts available, skipping");
        return;
    }

    let node = engine.lookup("\u{00A7}cRed\u{00A7}9Blue", Style::DEFAULT);
    assert_eq!(node.glyph_count(), 7); // "Red" + "Blue", no escape bytes survive

    let colors: Vec<Option<Color>> = node.glyphs().map(|g| g.color).collect();
    let palette = Palette::classic();
    assert_eq!(colors[0], Some(palette.get(0xc)));
    assert_eq!(colors[6], Some(palette.get(0x9)));
}

#[test]
fn digit_sharing_keeps_the_same_cache_entry_across_different_digits() {
    let mut engine = engine();
    if !has_fonts(&mut engine) {
        eprintln!("no system fonts available, skipping");
        return;
    }

    let a = engine.lookup("Score: 5", Style::DEFAULT);
    let b = engine.lookup("Score: 9", Style::DEFAULT);
    assert!(Arc::ptr_eq(&a, &b), "digit-only difference should hit the same cache entry");

    // Drawing the cached node against each original string must still
    // recover the right digit.
    let digit_record = a.glyphs().last().unwrap();
    assert!(matches!(digit_record.variant, GlyphVariant::Digit(_)));
}

#[test]
fn mixed_bidi_text_lays_out_without_panicking() {
    let mut engine = engine();
    // Latin, Hebrew (RTL), Latin — exercises visual reordering regardless
    // of whether Hebrew glyphs are actually available.
    let text = "a\u{05D0}\u{05D1}b";
    let node = engine.lookup(text, Style::DEFAULT);
    let indices: Vec<usize> = node.glyphs().map(|g| g.string_index).collect();
    let mut sorted = indices.clone();
    sorted.sort_unstable();
    assert_eq!(indices, sorted, "assembly must restore original string order");
}

#[test]
fn obfuscated_run_produces_random_glyph_variants() {
    let mut engine = engine();
    if !has_fonts(&mut engine) {
        eprintln!("no system fonts available, skipping");
        return;
    }

    let node = engine.lookup("\u{00A7}k12345", Style::DEFAULT);
    assert_eq!(node.glyph_count(), 5);
    assert!(node.glyphs().all(|g| matches!(g.variant, GlyphVariant::Random(_))));
}

#[test]
fn underline_and_strikethrough_spans_coalesce() {
    let mut engine = engine();
    if !has_fonts(&mut engine) {
        eprintln!("no system fonts available, skipping");
        return;
    }

    let node = engine.lookup("\u{00A7}n\u{00A7}mABC", Style::DEFAULT);
    assert!(node.has_effects());
    let kinds: Vec<EffectKind> = node.effects().map(|e| e.kind).collect();
    assert!(kinds.contains(&EffectKind::Underline));
    assert!(kinds.contains(&EffectKind::Strikethrough));
    // Three contiguous same-style glyphs coalesce to one span per track.
    assert_eq!(node.effects().filter(|e| e.kind == EffectKind::Underline).count(), 1);
    assert_eq!(node.effects().filter(|e| e.kind == EffectKind::Strikethrough).count(), 1);
}

#[test]
fn repeated_lookup_of_the_same_text_and_style_is_a_cache_hit() {
    let mut engine = engine();
    let a = engine.lookup("Cached text", Style::DEFAULT);
    let b = engine.lookup("Cached text", Style::DEFAULT);
    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn explicit_color_changes_the_cache_key() {
    let mut engine = engine();
    let plain = engine.lookup("Styled", Style::DEFAULT);
    let colored = engine.lookup(
        "Styled",
        Style {
            color: ColorValue::Explicit(Color::rgb(255, 0, 0)),
            ..Style::DEFAULT
        },
    );
    assert!(!Arc::ptr_eq(&plain, &colored));
}

#[test]
fn off_owner_lookup_sees_what_the_owner_already_built() {
    let mut engine = engine();
    let built = engine.lookup("Shared text", Style::DEFAULT);
    let seen = engine.lookup_off_owner("Shared text", Style::DEFAULT, Duration::from_millis(50));
    assert!(Arc::ptr_eq(&built, &seen.unwrap()));
}

#[test]
fn off_owner_lookup_times_out_on_an_unbuilt_key() {
    let engine = engine();
    let seen = engine.lookup_off_owner("Never built", Style::DEFAULT, Duration::from_millis(20));
    assert!(seen.is_none());
}

#[test]
fn empty_string_lays_out_to_an_empty_node() {
    let mut engine = engine();
    let node = engine.lookup("", Style::DEFAULT);
    assert_eq!(node.glyph_count(), 0);
    assert_eq!(node.advance(), 0.0);
}
