//! Binding Cache
//!
//! Process-wide memo of loaded bindings.
//!
//! Two levels, each a map of once-cells behind a mutex:
//!
//! ```text
//! BindingRequest (absolute root) ──► CacheEntry { resolved path, Arc<binding> }
//!                                          │
//! canonical resolved path ─────────────────┘──► Arc<binding>
//! ```
//!
//! The map lock is only held to fetch or insert a slot. Initializing a slot
//! is the critical section: concurrent callers for the same request block on
//! the slot and observe the single load. A hit on the request level never
//! touches the filesystem. A failed load drops its request slot, so the next
//! call searches again.

use std::collections::HashMap;
use std::future::{ready, Ready};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;
use once_cell::sync::{Lazy, OnceCell};
use parking_lot::Mutex;

use crate::config::{ConfigResult, LoaderConfig};
use crate::error::{BindingError, BindingResult, CandidateFailure};
use crate::loader::{load_with, DylibOpener, Opener};
use crate::platform::PlatformKey;
use crate::request::BindingRequest;
use crate::resolve::resolve;

type Slot<T> = Arc<OnceCell<T>>;

/// A cached binding together with the path it was loaded from.
#[derive(Debug)]
pub struct CacheEntry<B> {
    /// Canonical absolute path that was loaded
    pub path: PathBuf,
    pub binding: Arc<B>,
}

impl<B> Clone for CacheEntry<B> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            binding: Arc::clone(&self.binding),
        }
    }
}

/// Resolves, loads and memoizes bindings.
pub struct BindingCache<O: Opener> {
    opener: O,
    config: LoaderConfig,
    /// Fixed key instead of host detection
    platform: Option<PlatformKey>,
    by_request: Mutex<HashMap<BindingRequest, Slot<CacheEntry<O::Binding>>>>,
    by_path: Mutex<HashMap<PathBuf, Slot<Arc<O::Binding>>>>,
}

impl<O: Opener> BindingCache<O> {
    /// Create an empty cache
    pub fn new(opener: O, config: LoaderConfig) -> Self {
        Self {
            opener,
            config,
            platform: None,
            by_request: Mutex::new(HashMap::new()),
            by_path: Mutex::new(HashMap::new()),
        }
    }

    /// Use `key` instead of detecting the host.
    pub fn with_platform(mut self, key: PlatformKey) -> Self {
        self.platform = Some(key);
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Platform key candidates are generated for, config overrides applied.
    pub fn platform_key(&self) -> BindingResult<PlatformKey> {
        let key = match self.platform {
            Some(key) => key,
            None => PlatformKey::detect()?,
        };
        Ok(match self.config.platform.libc_override()? {
            Some(libc) => key.with_libc(libc),
            None => key,
        })
    }

    /// Ordered candidates for `request` on this cache's platform.
    pub fn candidates(&self, request: &BindingRequest) -> BindingResult<Vec<PathBuf>> {
        let request = request.absolute()?;
        resolve(&request, &self.platform_key()?, &self.config.resolve)
    }

    /// Return the cached binding for `request`, loading it on first use.
    pub fn get_or_load(&self, request: &BindingRequest) -> BindingResult<Arc<O::Binding>> {
        self.get_or_load_entry(request).map(|entry| entry.binding)
    }

    /// [`get_or_load`](Self::get_or_load) as an already-resolved future.
    ///
    /// For async callers; yields the same `Arc` as the synchronous form.
    pub fn get_or_load_ready(
        &self,
        request: &BindingRequest,
    ) -> Ready<BindingResult<Arc<O::Binding>>> {
        ready(self.get_or_load(request))
    }

    /// Like [`get_or_load`](Self::get_or_load), also reporting the resolved path.
    pub fn get_or_load_entry(
        &self,
        request: &BindingRequest,
    ) -> BindingResult<CacheEntry<O::Binding>> {
        request.validate()?;
        let request = request.absolute()?;

        let slot = {
            let mut map = self.by_request.lock();
            Arc::clone(map.entry(request.clone()).or_default())
        };

        if let Some(entry) = slot.get() {
            debug!("Cache hit for '{}'", request.package_name);
            return Ok(entry.clone());
        }

        let result = slot.get_or_try_init(|| self.search(&request)).cloned();
        if result.is_err() {
            let mut map = self.by_request.lock();
            // Another caller may have replaced or filled the slot meanwhile.
            let stale = map.get(&request).map_or(false, |current| {
                Arc::ptr_eq(current, &slot) && current.get().is_none()
            });
            if stale {
                map.remove(&request);
            }
        }
        result
    }

    fn search(&self, request: &BindingRequest) -> BindingResult<CacheEntry<O::Binding>> {
        let key = self.platform_key()?;
        let candidates = resolve(request, &key, &self.config.resolve)?;
        debug!(
            "Resolving '{}' for {}: {} candidate(s)",
            request.package_name,
            key,
            candidates.len()
        );

        let loaded = load_with(&request.package_name, &candidates, |path| {
            self.open_path(path)
        })?;

        Ok(CacheEntry {
            path: canonical(&loaded.path),
            binding: loaded.binding,
        })
    }

    /// Open `path` at most once per process, keyed by its canonical path.
    fn open_path(&self, path: &Path) -> Result<Arc<O::Binding>, CandidateFailure> {
        let slot = {
            let mut map = self.by_path.lock();
            Arc::clone(map.entry(canonical(path)).or_default())
        };
        slot.get_or_try_init(|| self.opener.open(path).map(Arc::new))
            .cloned()
    }

    /// Number of distinct paths loaded so far.
    pub fn len(&self) -> usize {
        self.by_path
            .lock()
            .values()
            .filter(|slot| slot.get().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Canonical paths loaded so far, sorted.
    pub fn loaded_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .by_path
            .lock()
            .iter()
            .filter(|(_, slot)| slot.get().is_some())
            .map(|(path, _)| path.clone())
            .collect();
        paths.sort();
        paths
    }
}

impl BindingCache<DylibOpener> {
    /// Cache backed by the dynamic loader, honouring `[load] entry_symbol`.
    pub fn from_config(config: LoaderConfig) -> Self {
        let opener = match &config.load.entry_symbol {
            Some(symbol) => DylibOpener::new().with_entry_symbol(symbol.clone()),
            None => DylibOpener::new(),
        };
        Self::new(opener, config)
    }
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn build_global(config: ConfigResult<LoaderConfig>) -> BindingResult<BindingCache<DylibOpener>> {
    Ok(BindingCache::from_config(config?))
}

static GLOBAL: Lazy<BindingResult<BindingCache<DylibOpener>>> =
    Lazy::new(|| build_global(LoaderConfig::load_from_cwd()));

/// The process-wide cache. Created empty on first use, never evicted.
///
/// Configured from the `bindload.toml` found from the working directory at
/// first use. A broken file is reported on every call instead of ignored.
pub fn global() -> BindingResult<&'static BindingCache<DylibOpener>> {
    GLOBAL.as_ref().map_err(BindingError::clone)
}
