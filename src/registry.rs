//! Font discovery, fallback ordering, and stable `FontKey` assignment.
//!
//! Uses a `fontdb::Database` for system discovery, a cache-or-miss
//! `FxHashMap` keyed by family name, and a "warn once on failure" fallback
//! chain, plus an ordered `preferred` list and `derive`, which hands out a
//! monotonically increasing `FontKey` the first time a (font, style, size)
//! variant is used.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::error::{Result, TextError};
use crate::font::{FontData, FontFace};

/// A stable identity assigned the first time a font (physical or a derived
/// style/size variant) is used. Render nodes and the glyph atlas cache key
/// on this rather than on font names, so renames/reloads don't invalidate
/// anything already drawn with the old key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontKey(pub u32);

/// A physical font face as discovered from the system or loaded from bytes.
pub struct PhysicalFont {
    pub key: FontKey,
    pub face: Arc<FontFace>,
}

/// A (physical font, style bits, point size) variant. `ttf-parser` faces
/// have no synthetic bold/italic outlines, so "deriving" doesn't change the
/// glyph outlines themselves — it tags the parameters that do affect
/// shaping, rasterization scale, and the glyph-atlas/cache keys that are
/// downstream of font identity.
pub struct DerivedFont {
    pub key: FontKey,
    pub base: FontKey,
    pub face: Arc<FontFace>,
    pub style_bits: u8,
    pub pt_size: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum GenericFont {
    System,
    Monospace,
    Serif,
    SansSerif,
}

struct Inner {
    db: fontdb::Database,
    faces_by_id: FxHashMap<fontdb::ID, Arc<PhysicalFont>>,
    by_family: FxHashMap<String, Option<Arc<PhysicalFont>>>,
    generic: FxHashMap<GenericFont, Option<Arc<PhysicalFont>>>,
    preferred: Vec<Arc<PhysicalFont>>,
    variants: FxHashMap<(FontKey, u8, u16), Arc<DerivedFont>>,
    already_warned: std::collections::HashSet<String>,
}

/// Discovers system fonts, tracks an ordered preferred-font list, and hands
/// out stable `FontKey`s for both physical fonts and their derived
/// (style, size) variants.
pub struct FontRegistry {
    inner: Mutex<Inner>,
    next_key: AtomicU32,
}

impl FontRegistry {
    pub fn new() -> FontRegistry {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        FontRegistry {
            inner: Mutex::new(Inner {
                db,
                faces_by_id: FxHashMap::default(),
                by_family: FxHashMap::default(),
                generic: FxHashMap::default(),
                preferred: Vec::new(),
                variants: FxHashMap::default(),
                already_warned: std::collections::HashSet::new(),
            }),
            next_key: AtomicU32::new(1),
        }
    }

    fn alloc_key(&self) -> FontKey {
        FontKey(self.next_key.fetch_add(1, Ordering::Relaxed))
    }

    fn load_face_by_id(&self, inner: &mut Inner, id: fontdb::ID) -> Result<Arc<PhysicalFont>> {
        if let Some(existing) = inner.faces_by_id.get(&id) {
            return Ok(existing.clone());
        }
        let face_data = inner
            .db
            .with_face_data(id, |bytes, index| {
                FontFace::from_data_with_index(FontData::Owned(Arc::new(bytes.to_vec())), index)
            })
            .ok_or_else(|| TextError::FontLoadError("font source unavailable".to_string()))??;

        let key = self.alloc_key();
        let physical = Arc::new(PhysicalFont {
            key,
            face: Arc::new(face_data),
        });
        inner.faces_by_id.insert(id, physical.clone());
        Ok(physical)
    }

    /// Loads a font by family name, trying the system database. Caches
    /// both hits and misses so repeated misses don't re-query fontdb.
    pub fn load_font(&self, family: &str) -> Result<Arc<PhysicalFont>> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(cached) = inner.by_family.get(family) {
            return cached
                .clone()
                .ok_or_else(|| TextError::FontLoadError(family.to_string()));
        }

        let query = fontdb::Query {
            families: &[fontdb::Family::Name(family)],
            weight: fontdb::Weight::NORMAL,
            stretch: fontdb::Stretch::Normal,
            style: fontdb::Style::Normal,
        };
        let id = inner.db.query(&query);
        let result = match id {
            Some(id) => self.load_face_by_id(&mut inner, id).ok(),
            None => None,
        };
        inner.by_family.insert(family.to_string(), result.clone());
        result.ok_or_else(|| TextError::FontLoadError(family.to_string()))
    }

    fn load_generic_locked(&self, inner: &mut Inner, generic: GenericFont) -> Option<Arc<PhysicalFont>> {
        if let Some(cached) = inner.generic.get(&generic) {
            return cached.clone();
        }
        let family = match generic {
            GenericFont::System | GenericFont::SansSerif => fontdb::Family::SansSerif,
            GenericFont::Monospace => fontdb::Family::Monospace,
            GenericFont::Serif => fontdb::Family::Serif,
        };
        let query = fontdb::Query {
            families: &[family],
            weight: fontdb::Weight::NORMAL,
            stretch: fontdb::Stretch::Normal,
            style: fontdb::Style::Normal,
        };
        let id = inner.db.query(&query);
        let result = id.and_then(|id| self.load_face_by_id(inner, id).ok());
        inner.generic.insert(generic, result.clone());
        result
    }

    /// Preloads preferred fonts from a list of family names, in order.
    /// Fonts that don't resolve are warned about once and skipped.
    pub fn preload_fonts(&self, names: &[String]) {
        for name in names {
            match self.load_font(name) {
                Ok(font) => {
                    let mut inner = self.inner.lock().unwrap();
                    inner.preferred.push(font);
                }
                Err(_) => {
                    let mut inner = self.inner.lock().unwrap();
                    if inner.already_warned.insert(name.clone()) {
                        warn!(font = %name, "preferred font not found, skipping");
                    }
                }
            }
        }
        let mut inner = self.inner.lock().unwrap();
        for generic in [
            GenericFont::System,
            GenericFont::SansSerif,
            GenericFont::Serif,
            GenericFont::Monospace,
        ] {
            if let Some(font) = self.load_generic_locked(&mut inner, generic) {
                if !inner.preferred.iter().any(|p| p.key == font.key) {
                    inner.preferred.push(font);
                }
            }
        }
    }

    /// `lookup_font(cp)`: first preferred font supporting the code point,
    /// else the first system font supporting it (appended to the preferred
    /// list so subsequent lookups hit immediately), else the first
    /// preferred font as a last-resort fallback.
    pub fn lookup_font(&self, cp: char) -> Result<Arc<PhysicalFont>> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(found) = inner.preferred.iter().find(|f| f.face.has_glyph(cp)) {
            return Ok(found.clone());
        }

        let ids: Vec<fontdb::ID> = inner.db.faces().map(|f| f.id).collect();
        for id in ids {
            if let Ok(physical) = self.load_face_by_id(&mut inner, id) {
                if physical.face.has_glyph(cp) {
                    debug!(codepoint = ?cp, "appending newly discovered font to preferred list");
                    inner.preferred.push(physical.clone());
                    return Ok(physical);
                }
            }
        }

        if let Some(fallback) = inner.preferred.first() {
            return Ok(fallback.clone());
        }
        Err(TextError::NoFontsAvailable)
    }

    /// Assigns (or returns the existing) `FontKey` for a `(physical, style,
    /// size)` variant.
    pub fn derive(&self, physical: &Arc<PhysicalFont>, style_bits: u8, pt_size: u16) -> Arc<DerivedFont> {
        let mut inner = self.inner.lock().unwrap();
        let cache_key = (physical.key, style_bits, pt_size);
        if let Some(existing) = inner.variants.get(&cache_key) {
            return existing.clone();
        }
        let key = self.alloc_key();
        let derived = Arc::new(DerivedFont {
            key,
            base: physical.key,
            face: physical.face.clone(),
            style_bits,
            pt_size,
        });
        inner.variants.insert(cache_key, derived.clone());
        derived
    }

    pub fn list_families(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        inner
            .db
            .faces()
            .flat_map(|f| f.families.iter().map(|(name, _)| name.clone()))
            .collect()
    }

    pub fn has_font(&self, family: &str) -> bool {
        self.load_font(family).is_ok()
    }
}

impl Default for FontRegistry {
    fn default() -> Self {
        FontRegistry::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_is_memoized() {
        let registry = FontRegistry::new();
        registry.preload_fonts(&[]);
        let Ok(font) = registry.lookup_font('a') else {
            eprintln!("no system fonts available in this environment, skipping");
            return;
        };
        let a = registry.derive(&font, 0, 16);
        let b = registry.derive(&font, 0, 16);
        assert_eq!(a.key, b.key);
        let c = registry.derive(&font, 1, 16);
        assert_ne!(a.key, c.key);
    }

    #[test]
    fn lookup_font_falls_back_gracefully() {
        let registry = FontRegistry::new();
        registry.preload_fonts(&[]);
        match registry.lookup_font('\u{1F600}') {
            Ok(_) => {}
            Err(TextError::NoFontsAvailable) => {
                eprintln!("no system fonts available in this environment, skipping");
            }
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
}
