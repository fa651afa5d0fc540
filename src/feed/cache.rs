use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use sha2::{Digest, Sha256};

use super::model::ParsedFeed;
use super::parser::{parse_feed, ParseError};

const DEFAULT_ENTRIES: usize = 256;

/// LRU of parse results keyed by the SHA-256 of the document bytes.
///
/// Only successful parses are cached. Cloning shares the underlying cache.
#[derive(Clone)]
pub struct ParseCache {
    inner: Arc<Mutex<LruCache<[u8; 32], ParsedFeed>>>,
}

impl ParseCache {
    /// A capacity of 0 falls back to the default of 256 entries.
    pub fn new(entries: usize) -> Self {
        let capacity = NonZeroUsize::new(entries)
            .or(NonZeroUsize::new(DEFAULT_ENTRIES))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    /// Parse `bytes`, reusing the previous result for identical documents.
    pub fn parse(&self, bytes: &[u8]) -> Result<ParsedFeed, ParseError> {
        let key: [u8; 32] = Sha256::digest(bytes).into();

        if let Some(hit) = self.lock().get(&key) {
            return Ok(hit.clone());
        }

        // Parse outside the lock; a concurrent miss on the same key just parses twice
        let parsed = parse_feed(bytes)?;
        self.lock().put(key, parsed.clone());
        Ok(parsed)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<[u8; 32], ParsedFeed>> {
        // A panic while holding the lock cannot leave the LRU half-updated
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ParseCache {
    fn default() -> Self {
        Self::new(DEFAULT_ENTRIES)
    }
}
