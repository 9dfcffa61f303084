//! Content-addressed cache of evaluated programs.
//!
//! Keys are SHA-256 fingerprints of the exact program text. For each
//! fingerprint the cache holds the best solution seen in this process; ties
//! keep the first. The cache is shared by every solver, and can be
//! snapshotted to a JSON file and hydrated from it on startup.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender, bounded};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::schema::{CacheConfig, Solution};

/// SHA-256 digest of program text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Fingerprint of a program.
    pub fn of(program: &str) -> Self {
        Self(Sha256::digest(program.as_bytes()).into())
    }

    /// Lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a hex rendering.
    pub fn from_hex(text: &str) -> Option<Self> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(text, &mut bytes).ok()?;
        Some(Self(bytes))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Snapshot errors.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Snapshot I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("Snapshot encoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("No snapshot path configured")]
    NoSnapshotPath,
}

/// On-disk snapshot format.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    entries: Vec<SnapshotEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEntry {
    fingerprint: String,
    reward: i64,
    program: String,
}

/// Cache hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Fingerprint to best-known solution map, safe to share across threads.
#[derive(Debug, Default)]
pub struct SolutionCache {
    entries: RwLock<HashMap<Fingerprint, Solution>>,
    snapshot_path: Option<PathBuf>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SolutionCache {
    /// Create an empty in-memory cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty cache that snapshots to `path`.
    pub fn with_snapshot_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            snapshot_path: Some(path.as_ref().to_path_buf()),
            ..Self::default()
        }
    }

    /// Create a cache from configuration, hydrating from the snapshot when
    /// one exists. A missing or unreadable snapshot starts the cache cold.
    pub fn open(config: &CacheConfig) -> Self {
        let Some(path) = &config.snapshot_path else {
            return Self::new();
        };

        let cache = Self::with_snapshot_path(path);
        if !path.exists() {
            log::debug!("No solution cache snapshot at {}", path.display());
            return cache;
        }
        match cache.hydrate(path) {
            Ok(count) => log::info!("Loaded {} cached solutions from {}", count, path.display()),
            Err(e) => log::warn!("Ignoring solution cache snapshot {}: {}", path.display(), e),
        }
        cache
    }

    /// Load a snapshot file into this cache. Entries whose fingerprint does
    /// not match their program are skipped.
    pub fn hydrate<P: AsRef<Path>>(&self, path: P) -> Result<usize, CacheError> {
        let content = fs::read_to_string(path)?;
        let snapshot: Snapshot = serde_json::from_str(&content)?;

        let mut loaded = 0;
        for entry in snapshot.entries {
            let fingerprint = Fingerprint::of(&entry.program);
            if Fingerprint::from_hex(&entry.fingerprint) != Some(fingerprint) {
                log::debug!("Skipping snapshot entry with stale fingerprint {}", entry.fingerprint);
                continue;
            }
            self.offer(fingerprint, Solution::new(entry.reward, entry.program));
            loaded += 1;
        }
        Ok(loaded)
    }

    /// Look up a fingerprint, counting the hit or miss.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<Solution> {
        let found = self.entries.read().get(fingerprint).cloned();
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Store `solution` if the fingerprint is absent or the reward improves
    /// on the cached one. Returns the solution now cached.
    pub fn offer(&self, fingerprint: Fingerprint, solution: Solution) -> Solution {
        let mut entries = self.entries.write();
        match entries.get(&fingerprint) {
            Some(existing) if existing.reward >= solution.reward => existing.clone(),
            _ => {
                entries.insert(fingerprint, solution.clone());
                solution
            }
        }
    }

    /// Number of cached programs.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// The `n` highest-rewarded solutions, best first.
    pub fn best(&self, n: usize) -> Vec<Solution> {
        let mut solutions: Vec<Solution> = self.entries.read().values().cloned().collect();
        solutions.sort_by(Solution::best_first);
        solutions.truncate(n);
        solutions
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Configured snapshot path.
    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    /// Write a snapshot to the configured path.
    pub fn save(&self) -> Result<usize, CacheError> {
        let path = self.snapshot_path.as_ref().ok_or(CacheError::NoSnapshotPath)?;
        self.save_to(path)
    }

    /// Write a snapshot to `path`, replacing it atomically.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<usize, CacheError> {
        let snapshot = {
            let entries = self.entries.read();
            Snapshot {
                entries: entries
                    .iter()
                    .map(|(fingerprint, solution)| SnapshotEntry {
                        fingerprint: fingerprint.to_hex(),
                        reward: solution.reward,
                        program: solution.program.clone(),
                    })
                    .collect(),
            }
        };

        let json = serde_json::to_vec(&snapshot)?;
        write_atomically(path.as_ref(), &json)?;
        Ok(snapshot.entries.len())
    }

    /// Snapshot to `path`, logging the outcome.
    fn flush(&self, path: &Path) {
        match self.save_to(path) {
            Ok(count) => log::debug!("Snapshotted {} cached solutions to {}", count, path.display()),
            Err(e) => log::warn!("Solution cache snapshot to {} failed: {}", path.display(), e),
        }
    }
}

/// Replace `path` with `contents` through a temporary file in the same
/// directory.
pub(crate) fn write_atomically(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(contents)?;
    file.flush()?;
    file.persist(path)?;
    Ok(())
}

/// Background thread that snapshots a cache periodically and once more when
/// stopped.
pub struct CacheSnapshotter {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl CacheSnapshotter {
    /// Start snapshotting `cache` to `path` every `interval`.
    pub fn spawn<P: Into<PathBuf>>(
        cache: Arc<SolutionCache>,
        path: P,
        interval: Duration,
    ) -> io::Result<Self> {
        let path = path.into();
        let (stop, stopped) = bounded::<()>(1);
        let handle = thread::Builder::new()
            .name("cache-snapshot".to_string())
            .spawn(move || {
                loop {
                    match stopped.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => cache.flush(&path),
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                            cache.flush(&path);
                            break;
                        }
                    }
                }
            })?;

        Ok(Self {
            stop: Some(stop),
            handle: Some(handle),
        })
    }

    /// Flush a final snapshot and wait for the thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.try_send(());
        }
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            log::warn!("Cache snapshot thread panicked");
        }
    }
}

impl Drop for CacheSnapshotter {
    fn drop(&mut self) {
        self.shutdown();
    }
}
