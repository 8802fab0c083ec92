//! The render-node cache: capacity- and TTL-bounded, digit-insensitive,
//! single-flight across concurrent callers.
//!
//! Uses the `lru` crate (`LruCache::new`/`get`/`put`/`pop_lru`) for
//! capacity+TTL eviction, and an `mpsc::channel`-based oneshot handoff for
//! the off-owner wait path: builds only ever happen on the render-owner
//! thread, while other threads can still read a hit or block for a build
//! in flight.

use std::num::NonZeroUsize;
use std::sync::{mpsc, Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use lru::LruCache;
use rustc_hash::FxHashMap;

use crate::format::SECTION;
use crate::node::{EffectSpan, GlyphRecord, RenderNode};

/// Walks `s` yielding each character, except that an ASCII digit not
/// immediately preceded by an unescaped `§` is folded to `'0'`. This is
/// what makes "Score: 5" and "Score: 9" hash and compare equal — both
/// resolve to a `RenderNode` whose digit glyphs are shared-width
/// placeholders anyway, so two texts differing only in which digit they
/// contain produce the identical node. A digit immediately following `§`
/// is a color classifier, not content, and is never folded.
fn normalized_chars(s: &str) -> impl Iterator<Item = char> + '_ {
    let mut prev_was_section = false;
    s.chars().map(move |c| {
        let out = if c.is_ascii_digit() && !prev_was_section { '0' } else { c };
        prev_was_section = c == SECTION;
        out
    })
}

fn digit_insensitive_eq(a: &str, b: &str) -> bool {
    normalized_chars(a).eq(normalized_chars(b))
}

fn digit_insensitive_hash<H: std::hash::Hasher>(s: &str, state: &mut H) {
    for c in normalized_chars(s) {
        c.hash(state);
    }
}

/// Cache key: raw text plus the style's packed geometry bits. Equality and
/// hashing are digit-insensitive over the text.
#[derive(Debug, Clone)]
pub struct CacheKey {
    text: Arc<str>,
    style_bits: u32,
}

impl CacheKey {
    pub fn new(text: &str, style_bits: u32) -> CacheKey {
        CacheKey {
            text: Arc::from(text),
            style_bits,
        }
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.style_bits == other.style_bits && digit_insensitive_eq(&self.text, &other.text)
    }
}

impl Eq for CacheKey {}

impl std::hash::Hash for CacheKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.style_bits.hash(state);
        digit_insensitive_hash(&self.text, state);
    }
}

struct CacheEntry {
    node: Arc<RenderNode>,
    inserted_at: Instant,
}

/// Capacity- and TTL-bounded cache of finished `RenderNode`s, safe to read
/// from any thread while only the render-owner thread ever calls
/// [`RenderNodeCache::lookup`] (the path that actually runs the shaping
/// pipeline against the owner-confined atlas and font registry).
pub struct RenderNodeCache {
    entries: RwLock<LruCache<CacheKey, CacheEntry>>,
    ttl: Duration,
    pending: Mutex<FxHashMap<CacheKey, Vec<mpsc::Sender<Arc<RenderNode>>>>>,
}

impl RenderNodeCache {
    pub fn new(capacity: usize, ttl: Duration) -> RenderNodeCache {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        RenderNodeCache {
            entries: RwLock::new(LruCache::new(capacity)),
            ttl,
            pending: Mutex::new(FxHashMap::default()),
        }
    }

    /// Owner-thread entry point. Returns the cached node if present and not
    /// expired; otherwise runs `build`, caches the result, and wakes any
    /// threads blocked in [`lookup_off_owner`] on the same key.
    pub fn lookup(&self, key: CacheKey, build: impl FnOnce() -> RenderNode) -> Arc<RenderNode> {
        if let Some(hit) = self.get_fresh(&key) {
            return hit;
        }
        let node = Arc::new(build());
        self.insert(key.clone(), node.clone());
        self.notify_waiters(&key, &node);
        node
    }

    /// Non-owner entry point. Reads without disturbing LRU order; on a
    /// miss, registers interest and blocks until the owner thread builds
    /// the same key (via `lookup`) or `timeout` elapses. Since only the
    /// owner thread may actually run the build pipeline, a caller that
    /// times out must ask the owner directly rather than retry here.
    pub fn lookup_off_owner(&self, key: CacheKey, timeout: Duration) -> Option<Arc<RenderNode>> {
        if let Some(hit) = self.peek_fresh(&key) {
            return Some(hit);
        }

        let (tx, rx) = mpsc::channel();
        self.pending.lock().unwrap().entry(key).or_default().push(tx);
        rx.recv_timeout(timeout).ok()
    }

    fn get_fresh(&self, key: &CacheKey) -> Option<Arc<RenderNode>> {
        let mut entries = self.entries.write().unwrap();
        match entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => Some(entry.node.clone()),
            Some(_) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    fn peek_fresh(&self, key: &CacheKey) -> Option<Arc<RenderNode>> {
        let entries = self.entries.read().unwrap();
        match entries.peek(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => Some(entry.node.clone()),
            _ => None,
        }
    }

    fn insert(&self, key: CacheKey, node: Arc<RenderNode>) {
        let mut entries = self.entries.write().unwrap();
        entries.put(
            key,
            CacheEntry {
                node,
                inserted_at: Instant::now(),
            },
        );
    }

    fn notify_waiters(&self, key: &CacheKey, node: &Arc<RenderNode>) {
        if let Some(waiters) = self.pending.lock().unwrap().remove(key) {
            for tx in waiters {
                let _ = tx.send(node.clone());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
        self.pending.lock().unwrap().clear();
    }

    /// Best-effort estimate of the cache's total resident size, in bytes:
    /// the interned key text plus each entry's glyph/effect vector backing
    /// storage. Doesn't account for allocator overhead, `Arc` control
    /// blocks, or the atlas pixel data glyphs reference by value.
    pub fn memory_usage(&self) -> usize {
        let entries = self.entries.read().unwrap();
        entries
            .iter()
            .map(|(key, entry)| {
                std::mem::size_of::<CacheKey>()
                    + key.text.len()
                    + std::mem::size_of::<RenderNode>()
                    + entry.node.glyphs.len() * std::mem::size_of::<GlyphRecord>()
                    + entry.node.effects.len() * std::mem::size_of::<EffectSpan>()
            })
            .sum()
    }
}
