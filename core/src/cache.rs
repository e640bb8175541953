use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use tracing::debug;

use crate::client::{CompletionBackend, CompletionOptions};
use crate::errors::CallError;

/// Exact (prompt, options) identity. Temperature is keyed by its bit pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    prompt: String,
    temperature_bits: u32,
    max_output_tokens: u32,
}

impl CacheKey {
    fn new(prompt: &str, options: &CompletionOptions) -> Self {
        Self {
            prompt: prompt.to_string(),
            temperature_bits: options.temperature().to_bits(),
            max_output_tokens: options.max_output_tokens(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Wraps a backend and replays earlier successful completions.
///
/// Bounded by an LRU capacity. Errors are never stored.
pub struct MemoizedBackend<B> {
    inner: B,
    cache: Mutex<LruCache<CacheKey, String>>,
    stats: Mutex<CacheStats>,
}

impl<B: CompletionBackend> MemoizedBackend<B> {
    pub fn new(inner: B, capacity: NonZeroUsize) -> Self {
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
            stats: Mutex::new(CacheStats::default()),
        }
    }

    pub fn stats(&self) -> CacheStats {
        *self.stats.lock()
    }

    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    fn record(&self, hit: bool) -> CacheStats {
        let mut stats = self.stats.lock();
        if hit {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
        *stats
    }
}

#[async_trait]
impl<B: CompletionBackend> CompletionBackend for MemoizedBackend<B> {
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String, CallError> {
        let key = CacheKey::new(prompt, options);

        // The lock is released before the network call.
        let cached = self.cache.lock().get(&key).cloned();
        let stats = self.record(cached.is_some());
        debug!(
            prompt_len = prompt.len(),
            hit = cached.is_some(),
            hits = stats.hits,
            misses = stats.misses,
            "Completion cache lookup"
        );
        if let Some(text) = cached {
            return Ok(text);
        }

        let text = self.inner.complete(prompt, options).await?;
        self.cache.lock().put(key, text.clone());
        Ok(text)
    }

    fn provider_name(&self) -> &'static str {
        self.inner.provider_name()
    }

    fn model_name(&self) -> String {
        self.inner.model_name()
    }
}
