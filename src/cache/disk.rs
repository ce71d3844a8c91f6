//! Disk-backed, size-bounded keyed cache with singleflight generation.
//!
//! Entries live as files in a single directory, named by the SHA-256 of their
//! key. An in-memory LRU index tracks recency and total size and is rebuilt
//! from the directory when the cache is opened.
//!
//! # Generation
//!
//! On a miss the cache runs its [`Generator`] in a spawned task. Concurrent
//! callers for the same key share that one task through a `watch` channel and
//! all receive the same outcome. Callers for different keys never wait on each
//! other.
//!
//! Dropping a caller's future only stops that caller from waiting. The task
//! keeps running and stores its result for everyone else.
//!
//! # Eviction
//!
//! After every insert, least-recently-used entries are removed until both the
//! byte capacity and the entry limit hold again. Entries still being
//! generated are not in the index and cannot be evicted.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, info, warn};

use super::entry::{self, Entry};
use crate::error::CacheError;

/// Default cache capacity: 100MB
pub const DEFAULT_CACHE_CAPACITY: u64 = 100 * 1024 * 1024;

/// Default maximum number of entries
pub const DEFAULT_MAX_ENTRIES: usize = 200_000;

/// Suffix of files being written; leftovers are removed on open.
const TEMP_SUFFIX: &str = ".tmp";

// =============================================================================
// Configuration
// =============================================================================

/// Location and bounds of a disk cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskCacheConfig {
    /// Name used in log output
    pub name: String,

    /// Directory holding the entry files
    pub dir: PathBuf,

    /// Maximum total size of stored entries in bytes
    pub capacity: u64,

    /// Maximum number of stored entries
    pub max_entries: usize,
}

impl DiskCacheConfig {
    /// Create a config with default bounds.
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
            capacity: DEFAULT_CACHE_CAPACITY,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }

    /// Set the byte capacity.
    pub fn with_capacity(mut self, capacity: u64) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the maximum entry count.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }
}

// =============================================================================
// Generator
// =============================================================================

/// Value produced by a [`Generator`] on a cache miss.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    /// Bytes to store and serve
    pub data: Bytes,

    /// Optional description of how the bytes were produced, stored alongside them
    pub label: Option<String>,
}

impl Generated {
    /// Create an unlabelled value.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            label: None,
        }
    }

    /// Attach a label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Produces the value for a missing key.
///
/// The generator is fixed when the cache is opened. Each call receives the
/// input of the caller that triggered the miss; inputs of callers that joined
/// an in-flight generation are dropped.
#[async_trait]
pub trait Generator: Send + Sync + 'static {
    /// Per-request data needed to build a value.
    type Input: Send + 'static;

    /// Failure type, cloned to every waiter.
    type Error: Clone + Send + Sync + 'static;

    /// Build the value for one key.
    async fn generate(&self, input: Self::Input) -> Result<Generated, Self::Error>;
}

// =============================================================================
// Lookup Results
// =============================================================================

/// Where the bytes of a [`Lookup`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Read from a stored entry
    Hit,
    /// Generated and stored
    Generated,
    /// Generated but not stored (write failed or entry larger than capacity)
    Unstored,
}

/// Result of [`DiskCache::get`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    pub data: Bytes,
    pub label: Option<String>,
    pub origin: Origin,
}

/// Snapshot of cache occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub size: u64,
    pub capacity: u64,
    pub max_entries: usize,
}

/// Published result of one generation; `None` until it completes.
type Outcome<E> = Option<Result<Lookup, CacheError<E>>>;

// =============================================================================
// Disk Cache
// =============================================================================

/// Disk-backed LRU cache populated on demand by a [`Generator`].
///
/// Cloning is cheap and every clone shares the same index and in-flight state.
pub struct DiskCache<G: Generator> {
    shared: Arc<Shared<G>>,
}

impl<G: Generator> Clone for DiskCache<G> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

struct Shared<G: Generator> {
    name: String,
    dir: PathBuf,
    capacity: u64,
    max_entries: usize,
    generator: G,

    /// Stored entries indexed by entry id
    index: RwLock<Index>,

    /// In-flight generations for the singleflight pattern
    in_flight: Mutex<HashMap<String, watch::Receiver<Outcome<G::Error>>>>,
}

/// LRU index of stored entries with their on-disk sizes.
struct Index {
    entries: LruCache<String, u64>,
    size: u64,
}

impl Index {
    fn new() -> Self {
        Self {
            entries: LruCache::unbounded(),
            size: 0,
        }
    }

    fn insert(&mut self, id: String, size: u64) {
        if let Some(old) = self.entries.put(id, size) {
            self.size = self.size.saturating_sub(old);
        }
        self.size += size;
    }

    fn remove(&mut self, id: &str) -> Option<u64> {
        let size = self.entries.pop(id)?;
        self.size = self.size.saturating_sub(size);
        Some(size)
    }

    /// Pop least-recently-used ids until both bounds hold.
    fn evict_over(&mut self, capacity: u64, max_entries: usize) -> Vec<String> {
        let mut evicted = Vec::new();
        while self.size > capacity || self.entries.len() > max_entries {
            match self.entries.pop_lru() {
                Some((id, size)) => {
                    self.size = self.size.saturating_sub(size);
                    evicted.push(id);
                }
                None => break,
            }
        }
        evicted
    }
}

impl<G: Generator> DiskCache<G> {
    /// Open (or create) a cache directory and rebuild its index.
    ///
    /// Existing entries are ordered by file modification time, oldest first,
    /// then trimmed to the configured bounds.
    pub async fn open(config: DiskCacheConfig, generator: G) -> Result<Self, CacheError<G::Error>> {
        fs::create_dir_all(&config.dir)
            .await
            .map_err(|e| storage_error::<G::Error>(&config.dir, e))?;

        let mut found = Vec::new();
        let mut dir = fs::read_dir(&config.dir)
            .await
            .map_err(|e| storage_error::<G::Error>(&config.dir, e))?;

        while let Some(item) = dir
            .next_entry()
            .await
            .map_err(|e| storage_error::<G::Error>(&config.dir, e))?
        {
            let path = item.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_owned) else {
                continue;
            };

            if name.ends_with(TEMP_SUFFIX) {
                let _ = fs::remove_file(&path).await;
                continue;
            }
            if !is_entry_id(&name) {
                continue;
            }

            let meta = match item.metadata().await {
                Ok(meta) if meta.is_file() => meta,
                _ => continue,
            };
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            found.push((modified, name, meta.len()));
        }

        found.sort();

        let mut index = Index::new();
        for (_, id, size) in found {
            index.insert(id, size);
        }
        let evicted = index.evict_over(config.capacity, config.max_entries);

        info!(
            cache = %config.name,
            dir = %config.dir.display(),
            entries = index.entries.len(),
            size = index.size,
            trimmed = evicted.len(),
            "Opened disk cache"
        );

        let shared = Shared {
            name: config.name,
            dir: config.dir,
            capacity: config.capacity,
            max_entries: config.max_entries,
            generator,
            index: RwLock::new(index),
            in_flight: Mutex::new(HashMap::new()),
        };
        shared.remove_files(&evicted).await;

        Ok(Self {
            shared: Arc::new(shared),
        })
    }

    /// Get the value for `key`, generating it from `input` on a miss.
    ///
    /// Only one generation runs per key at a time; concurrent callers wait for
    /// it and share its outcome. Failures are not stored, so the next call
    /// retries.
    pub async fn get(&self, key: &str, input: G::Input) -> Result<Lookup, CacheError<G::Error>> {
        let id = entry_id(key);

        let mut rx = loop {
            // Fast path: stored entry
            if let Some(entry) = self.shared.read_resident(&id).await {
                debug!(cache = %self.shared.name, key, "Cache hit");
                return Ok(Lookup {
                    data: entry.data,
                    label: entry.label,
                    origin: Origin::Hit,
                });
            }

            // Slow path: join the in-flight generation or become leader
            let mut in_flight = self.shared.in_flight.lock().await;

            if let Some(rx) = in_flight.get(&id) {
                debug!(cache = %self.shared.name, key, "Joining in-flight generation");
                break rx.clone();
            }

            // A generation may have finished between the fast path and the lock
            if self.shared.index.read().await.entries.contains(&id) {
                continue;
            }

            let (tx, rx) = watch::channel(None);
            in_flight.insert(id.clone(), rx.clone());
            drop(in_flight);

            debug!(cache = %self.shared.name, key, "Cache miss, generating");
            tokio::spawn(run_generation(self.shared.clone(), id.clone(), input, tx));
            break rx;
        };

        let outcome = match rx.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone(),
            Err(_) => None,
        };

        match outcome {
            Some(result) => result,
            None => {
                warn!(cache = %self.shared.name, key, "Generation ended without a result");
                self.shared.forget_flight(&id, &rx).await;
                Err(CacheError::Aborted)
            }
        }
    }

    /// Check whether `key` is stored, without updating recency.
    pub async fn contains(&self, key: &str) -> bool {
        let index = self.shared.index.read().await;
        index.entries.contains(&entry_id(key))
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.shared.index.read().await.entries.len()
    }

    /// Check whether the cache has no stored entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Current occupancy and bounds.
    pub async fn stats(&self) -> CacheStats {
        let index = self.shared.index.read().await;
        CacheStats {
            entries: index.entries.len(),
            size: index.size,
            capacity: self.shared.capacity,
            max_entries: self.shared.max_entries,
        }
    }

    /// Path of the file that stores `key`.
    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.shared.path_for(&entry_id(key))
    }
}

impl<G: Generator> Shared<G> {
    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(id)
    }

    /// Read a stored entry, marking it recently used.
    ///
    /// Missing or undecodable files are dropped from the index and reported
    /// as a miss.
    async fn read_resident(&self, id: &str) -> Option<Entry> {
        {
            let mut index = self.index.write().await;
            index.entries.get(id)?;
        }

        let path = self.path_for(id);
        let failure = match fs::read(&path).await {
            Ok(raw) => match entry::decode(Bytes::from(raw)) {
                Ok(entry) => return Some(entry),
                Err(e) => e.to_string(),
            },
            Err(e) => e.to_string(),
        };

        warn!(
            cache = %self.name,
            path = %path.display(),
            error = %failure,
            "Discarding unreadable cache entry"
        );
        self.discard(id).await;
        None
    }

    /// Persist a generated value and evict down to the bounds.
    async fn store(&self, id: &str, generated: &Generated) -> Origin {
        let raw = entry::encode(generated.label.as_deref(), &generated.data);
        let size = raw.len() as u64;

        if size > self.capacity {
            debug!(
                cache = %self.name,
                size,
                capacity = self.capacity,
                "Entry larger than cache capacity, not storing"
            );
            return Origin::Unstored;
        }

        let path = self.path_for(id);
        if let Err(e) = write_atomically(&path, &raw).await {
            warn!(
                cache = %self.name,
                path = %path.display(),
                error = %e,
                "Failed to persist cache entry, serving uncached"
            );
            return Origin::Unstored;
        }

        let evicted = {
            let mut index = self.index.write().await;
            index.insert(id.to_string(), size);
            index.evict_over(self.capacity, self.max_entries)
        };

        // Deleted outside the lock. If an evicted id is stored again before
        // its old file goes, the fresh file is lost and the next read misses.
        if !evicted.is_empty() {
            debug!(cache = %self.name, count = evicted.len(), "Evicted entries");
            self.remove_files(&evicted).await;
        }

        Origin::Generated
    }

    async fn discard(&self, id: &str) {
        self.index.write().await.remove(id);
        let _ = fs::remove_file(self.path_for(id)).await;
    }

    async fn remove_files(&self, ids: &[String]) {
        for id in ids {
            if let Err(e) = fs::remove_file(self.path_for(id)).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(cache = %self.name, id, error = %e, "Failed to remove evicted entry");
                }
            }
        }
    }

    /// Drop an in-flight record whose task died without publishing.
    async fn forget_flight(&self, id: &str, rx: &watch::Receiver<Outcome<G::Error>>) {
        let mut in_flight = self.in_flight.lock().await;
        if in_flight
            .get(id)
            .is_some_and(|current| current.same_channel(rx))
        {
            in_flight.remove(id);
        }
    }
}

/// Generation task: run the generator, persist on success, publish the outcome.
async fn run_generation<G: Generator>(
    shared: Arc<Shared<G>>,
    id: String,
    input: G::Input,
    tx: watch::Sender<Outcome<G::Error>>,
) {
    // The generator runs in its own task so a panic is observed here as a
    // JoinError instead of unwinding past the in-flight cleanup below
    let worker = shared.clone();
    let generated = tokio::spawn(async move { worker.generator.generate(input).await }).await;

    let outcome = match generated {
        Ok(Ok(generated)) => {
            let origin = shared.store(&id, &generated).await;
            Ok(Lookup {
                data: generated.data,
                label: generated.label,
                origin,
            })
        }
        Ok(Err(e)) => {
            debug!(cache = %shared.name, id, "Generation failed, nothing stored");
            Err(CacheError::Generation(e))
        }
        Err(e) => {
            warn!(cache = %shared.name, id, error = %e, "Generation task aborted");
            Err(CacheError::Aborted)
        }
    };

    // Stored entries are already indexed, so callers arriving after this
    // removal take the fast path
    shared.in_flight.lock().await.remove(&id);

    // All waiters may be gone; the entry is stored either way
    let _ = tx.send(Some(outcome));
}

/// Filesystem-safe entry id for a key.
fn entry_id(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

fn is_entry_id(name: &str) -> bool {
    name.len() == 64 && name.bytes().all(|b| b.is_ascii_hexdigit())
}

async fn write_atomically(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(TEMP_SUFFIX);
    let tmp = PathBuf::from(tmp);

    if let Err(e) = fs::write(&tmp, data).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e);
    }
    fs::rename(&tmp, path).await
}

fn storage_error<E>(path: &Path, err: std::io::Error) -> CacheError<E> {
    CacheError::Storage {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

// =============================================================================
// Tests
// =============================================================================
