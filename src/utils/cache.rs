//! Local caching for deep search results.
//!
//! Deep searches are slow and spend API quota, so finished results can be
//! kept on disk and reused for identical requests.
//!
//! # Cache Structure
//!
//! ```text
//! ~/.cache/deepsearch-mcp/
//!   searches/
//!     <hash>.json
//! ```
//!
//! Each cached item is a JSON file containing the result plus metadata. The
//! hash covers the query, the effort level and the configured models, so a
//! model change never serves stale answers.

use crate::config::CacheConfig;
use crate::models::{DeepSearchResult, Effort};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Cache metadata stored with each cached item
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheMetadata {
    /// When the item was cached (Unix timestamp)
    cached_at: u64,

    /// When the item expires (Unix timestamp)
    expires_at: u64,

    /// Effort level of the search
    effort: Effort,

    /// Query that was executed
    query: String,
}

/// Wrapper for a cached deep search result
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedResult {
    metadata: CacheMetadata,
    result: DeepSearchResult,
}

/// Result of a cache lookup
#[derive(Debug, PartialEq)]
pub enum CacheResult<T> {
    /// Item was found and is valid
    Hit(T),

    /// Item was not found
    Miss,

    /// Item was found but has expired
    Expired,
}

/// Cache service for storing and retrieving deep search results
#[derive(Debug, Clone)]
pub struct CacheService {
    /// Base cache directory
    base_dir: PathBuf,

    /// Search cache directory
    search_dir: PathBuf,

    /// Extra key material, typically the configured model names
    namespace: String,

    /// Configuration
    config: CacheConfig,
}

impl CacheService {
    /// Create a new cache service with the given config
    pub fn from_config(config: CacheConfig) -> Self {
        let base_dir = config
            .directory
            .clone()
            .unwrap_or_else(crate::config::default_cache_dir);
        let search_dir = base_dir.join("searches");

        Self {
            base_dir,
            search_dir,
            namespace: String::new(),
            config,
        }
    }

    /// Mix extra key material into every cache key
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Initialize the cache directories
    pub fn initialize(&self) -> std::io::Result<()> {
        if self.config.enabled {
            fs::create_dir_all(&self.search_dir)?;
            tracing::info!("Cache initialized at: {}", self.base_dir.display());
        } else {
            tracing::debug!("Cache is disabled");
        }
        Ok(())
    }

    /// Check if caching is enabled
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Get the cache directory
    pub fn cache_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Generate a cache key for a deep search
    fn cache_key(&self, query: &str, effort: Effort) -> String {
        let input = format!("{}|{}|{}", query.trim(), effort, self.namespace);
        let digest = md5::compute(input.as_bytes());
        format!("{:x}.json", digest)
    }

    fn now() -> u64 {
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }

    /// Read a cached deep search result
    pub fn get(&self, query: &str, effort: Effort) -> CacheResult<DeepSearchResult> {
        if !self.is_enabled() {
            return CacheResult::Miss;
        }

        let key = self.cache_key(query, effort);
        let cache_path = self.search_dir.join(&key);

        match self.read_cache_file::<CachedResult>(&cache_path) {
            Ok(cached) => {
                if Self::now() >= cached.metadata.expires_at {
                    tracing::debug!("Cache expired for search: {}", key);
                    if let Err(e) = fs::remove_file(&cache_path) {
                        tracing::warn!("Failed to remove expired cache entry {}: {}", key, e);
                    }
                    CacheResult::Expired
                } else {
                    tracing::debug!("Cache HIT for search: {}", key);
                    CacheResult::Hit(cached.result)
                }
            }
            Err(_) => {
                tracing::debug!("Cache MISS for search: {}", key);
                CacheResult::Miss
            }
        }
    }

    /// Cache a deep search result
    pub fn set(&self, query: &str, effort: Effort, result: &DeepSearchResult) {
        if !self.is_enabled() {
            return;
        }

        let key = self.cache_key(query, effort);
        let cache_path = self.search_dir.join(&key);

        let now = Self::now();
        let cached = CachedResult {
            metadata: CacheMetadata {
                cached_at: now,
                expires_at: now + self.config.ttl_seconds,
                effort,
                query: query.to_string(),
            },
            result: result.clone(),
        };

        if let Err(e) = self.write_cache_file(&cache_path, &cached) {
            tracing::warn!("Failed to cache search result: {}", e);
        } else {
            tracing::debug!("Cached search result: {}", key);
        }
    }

    /// Read a cached file and deserialize it
    fn read_cache_file<T: for<'de> Deserialize<'de>>(
        &self,
        path: &Path,
    ) -> Result<T, std::io::Error> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }

    /// Serialize and write a cached file
    fn write_cache_file<T: Serialize>(&self, path: &Path, data: &T) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(data)?;
        fs::write(path, content)
    }

    /// Clear all cached data
    ///
    /// Returns `false` without touching the disk when caching is disabled.
    pub fn clear(&self) -> std::io::Result<bool> {
        if !self.is_enabled() {
            return Ok(false);
        }

        let _ = fs::remove_dir_all(&self.search_dir);
        self.initialize()?;
        tracing::info!("Cache cleared");
        Ok(true)
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        if !self.is_enabled() {
            return CacheStats::disabled();
        }

        let entries = self.search_dir.read_dir().map(|e| e.count()).unwrap_or(0);
        let size_kb = dir_size(&self.search_dir) / 1024;

        CacheStats {
            enabled: true,
            cache_dir: self.base_dir.clone(),
            entries,
            size_kb,
            ttl: Duration::from_secs(self.config.ttl_seconds),
        }
    }
}

/// Calculate the total size of a directory
fn dir_size(path: &Path) -> u64 {
    let mut size = 0;
    if let Ok(entries) = path.read_dir() {
        for entry in entries.flatten() {
            size += if entry.path().is_dir() {
                dir_size(&entry.path())
            } else {
                entry.metadata().map(|m| m.len()).unwrap_or(0)
            };
        }
    }
    size
}

/// Statistics about the cache
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Whether caching is enabled
    pub enabled: bool,

    /// Cache directory path
    pub cache_dir: PathBuf,

    /// Number of cached results
    pub entries: usize,

    /// Size of the cache in KB
    pub size_kb: u64,

    /// TTL for cached results
    pub ttl: Duration,
}

impl CacheStats {
    /// Return stats indicating cache is disabled
    fn disabled() -> Self {
        Self {
            enabled: false,
            cache_dir: PathBuf::new(),
            entries: 0,
            size_kb: 0,
            ttl: Duration::ZERO,
        }
    }
}
