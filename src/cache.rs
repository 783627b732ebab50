//! Content-addressed cache of processed variants.
//!
//! Encoding dominates the cost of a request, so each variant's encoded bytes
//! are kept on disk and reused whenever the same config is applied to the
//! same source bytes again.
//!
//! ## Cache keys
//!
//! A key is the SHA-256 of the variant's [`ResolvedConfig`] serialized as JSON
//! with sorted keys, a NUL separator, and the hex SHA-256 of the source file.
//! Keys therefore depend only on content: renaming or moving a source does
//! not invalidate anything, and changing one directive only misses the
//! variants that directive touches.
//!
//! ## Storage
//!
//! The cache directory is flat:
//!
//! ```text
//! <dir>/<key>        encoded bytes
//! <dir>/<key>.json   metadata record (annotations)
//! ```
//!
//! Both files are written to a temporary name and renamed into place, so a
//! crashed or concurrent write is never seen as a hit. A hit needs a non-empty
//! bytes file. Width, height and format are re-read from the bytes through the
//! backend; the sidecar only contributes annotations.
//!
//! ## Sweeping
//!
//! Every key looked up or stored is remembered as touched. [`VariantCache::sweep`]
//! deletes untouched entries older than the retention window. It runs once
//! at the end of a build and never on the read path.

use crate::imaging::ImageBackend;
use crate::metadata::ImageMetadata;
use crate::resolve::ResolvedConfig;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

const SIDECAR_EXTENSION: &str = "json";

/// SHA-256 of `bytes` as lowercase hex.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Cache key of one variant of one source.
pub fn cache_key(config: &ResolvedConfig, source_hash: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(config.canonical_json().as_bytes());
    hasher.update(b"\0");
    hasher.update(source_hash.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Some decoders report AVIF files as HEIF. When AVIF was requested, trust
/// the request.
fn normalize_format(meta: &mut ImageMetadata, config: &ResolvedConfig) {
    if meta.format == "heif" && config.get("format") == Some("avif") {
        meta.format = "avif".to_string();
    }
}

/// A cache hit.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedVariant {
    pub bytes: Vec<u8>,
    pub metadata: ImageMetadata,
}

/// Hit / miss counters for one engine.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    pub fn miss(&mut self) {
        self.misses += 1;
    }

    pub fn total(&self) -> u32 {
        self.hits + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} encoded ({} total)",
                self.hits,
                self.misses,
                self.total()
            )
        } else {
            write!(f, "{} encoded", self.misses)
        }
    }
}

#[derive(Debug)]
pub struct VariantCache {
    dir: PathBuf,
    enabled: bool,
    retention: Option<Duration>,
    touched: Mutex<HashSet<String>>,
    stats: Mutex<CacheStats>,
    temp_counter: AtomicU64,
}

impl VariantCache {
    pub fn new(dir: impl Into<PathBuf>, retention: Option<Duration>) -> Self {
        Self {
            dir: dir.into(),
            enabled: true,
            retention,
            touched: Mutex::new(HashSet::new()),
            stats: Mutex::new(CacheStats::default()),
            temp_counter: AtomicU64::new(0),
        }
    }

    /// A cache that never hits and never writes.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new(PathBuf::new(), None)
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn stats(&self) -> CacheStats {
        *self.stats.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn touch(&self, key: &str) {
        self.touched
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string());
    }

    pub fn is_touched(&self, key: &str) -> bool {
        self.touched
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(key)
    }

    fn bytes_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    fn sidecar_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.{SIDECAR_EXTENSION}"))
    }

    /// Encoded bytes stored under `key`, if any.
    pub fn read(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        if !self.enabled {
            return Ok(None);
        }
        match fs::read(self.bytes_path(key)) {
            Ok(bytes) if !bytes.is_empty() => Ok(Some(bytes)),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Look up a variant and count the hit or miss.
    ///
    /// Bytes the backend cannot identify are treated as a miss, so the
    /// variant is re-encoded and the entry overwritten.
    pub fn lookup(
        &self,
        key: &str,
        config: &ResolvedConfig,
        backend: &dyn ImageBackend,
    ) -> io::Result<Option<CachedVariant>> {
        let found = self.lookup_uncounted(key, config, backend)?;
        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        match found {
            Some(_) => stats.hit(),
            None => stats.miss(),
        }
        Ok(found)
    }

    fn lookup_uncounted(
        &self,
        key: &str,
        config: &ResolvedConfig,
        backend: &dyn ImageBackend,
    ) -> io::Result<Option<CachedVariant>> {
        if !self.enabled {
            return Ok(None);
        }
        self.touch(key);

        let Some(bytes) = self.read(key)? else {
            return Ok(None);
        };
        let Ok(intrinsic) = backend.identify(&bytes) else {
            return Ok(None);
        };

        let mut metadata = fs::read(self.sidecar_path(key))
            .ok()
            .and_then(|text| serde_json::from_slice::<ImageMetadata>(&text).ok())
            .unwrap_or_default();
        metadata.sync_intrinsic(&intrinsic);
        normalize_format(&mut metadata, config);

        Ok(Some(CachedVariant { bytes, metadata }))
    }

    /// Store a freshly encoded variant. The record's `src` is not stored; it
    /// depends on how the variant is delivered.
    pub fn store(&self, key: &str, bytes: &[u8], metadata: &ImageMetadata) -> io::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        self.touch(key);
        fs::create_dir_all(&self.dir)?;

        let record = ImageMetadata {
            src: String::new(),
            ..metadata.clone()
        };
        let sidecar = serde_json::to_vec(&record)?;
        self.write_atomic(&self.sidecar_path(key), &sidecar)?;
        self.write_atomic(&self.bytes_path(key), bytes)
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let n = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp = self
            .dir
            .join(format!(".{name}.{}.{n}.tmp", std::process::id()));
        fs::write(&temp, contents)?;
        fs::rename(&temp, path).inspect_err(|_| {
            let _ = fs::remove_file(&temp);
        })
    }

    /// Delete entries older than the retention window that were not touched
    /// by this engine. Returns the number of entries removed.
    pub fn sweep(&self) -> io::Result<usize> {
        let Some(retention) = self.retention else {
            return Ok(0);
        };
        if !self.enabled {
            return Ok(0);
        }
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        // key → (newest mtime, files)
        let mut groups: BTreeMap<String, (SystemTime, Vec<PathBuf>)> = BTreeMap::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let key = name
                .strip_suffix(&format!(".{SIDECAR_EXTENSION}"))
                .unwrap_or(&name)
                .to_string();
            let modified = entry.metadata()?.modified()?;
            let group = groups
                .entry(key)
                .or_insert((SystemTime::UNIX_EPOCH, Vec::new()));
            group.0 = group.0.max(modified);
            group.1.push(entry.path());
        }

        let now = SystemTime::now();
        let mut removed = 0;
        for (key, (modified, files)) in groups {
            if self.is_touched(&key) {
                continue;
            }
            let age = now.duration_since(modified).unwrap_or_default();
            if age <= retention {
                continue;
            }
            for file in files {
                match fs::remove_file(&file) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e),
                }
            }
            removed += 1;
        }
        Ok(removed)
    }
}
