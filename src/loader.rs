//! Binding Loader
//!
//! Probes candidates in order and opens the first one that loads.
//!
//! A candidate that exists but fails to open does not end the search: its
//! error is recorded and the next candidate is tried, so a partially
//! installed tree (say, a stale musl binary next to a good glibc one) still
//! loads. The per-candidate outcome is an [`Attempt`]; the fold over all of
//! them is either a [`Loaded`] binding or an aggregated error.

use std::collections::HashMap;
use std::ffi::CString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::{Library, Symbol};
use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::error::{BindingError, BindingResult, CandidateFailure, FailureKind};

/// Turns a path into an opened binding.
///
/// The dynamic loader in production; tests substitute fakes.
pub trait Opener: Send + Sync {
    type Binding: Send + Sync + 'static;

    fn open(&self, path: &Path) -> Result<Self::Binding, CandidateFailure>;
}

/// Outcome of probing one candidate.
#[derive(Debug)]
pub enum Attempt<B> {
    Loaded(Arc<B>),
    Missing,
    Failed(CandidateFailure),
}

/// A successfully opened candidate.
#[derive(Debug)]
pub struct Loaded<B> {
    /// Path as probed
    pub path: PathBuf,
    pub binding: Arc<B>,
}

/// Try each candidate with `opener`, first success wins.
pub fn load<O: Opener>(
    package: &str,
    candidates: &[PathBuf],
    opener: &O,
) -> BindingResult<Loaded<O::Binding>> {
    load_with(package, candidates, |path| opener.open(path).map(Arc::new))
}

/// Same as [`load`], with the open step supplied by the caller.
pub(crate) fn load_with<B, F>(
    package: &str,
    candidates: &[PathBuf],
    mut open: F,
) -> BindingResult<Loaded<B>>
where
    F: FnMut(&Path) -> Result<Arc<B>, CandidateFailure>,
{
    let mut failures = Vec::new();

    for path in candidates {
        match probe(path, &mut open) {
            Attempt::Loaded(binding) => {
                info!("Loaded native binding for '{}' from {}", package, path.display());
                return Ok(Loaded {
                    path: path.clone(),
                    binding,
                });
            }
            Attempt::Missing => debug!("Candidate {} does not exist", path.display()),
            Attempt::Failed(failure) => {
                warn!("Candidate {} failed to load: {}", path.display(), failure.message);
                failures.push(failure);
            }
        }
    }

    if failures.is_empty() {
        Err(BindingError::BindingNotFound {
            package: package.to_string(),
            searched: candidates.to_vec(),
        })
    } else {
        Err(BindingError::AllCandidatesFailed {
            package: package.to_string(),
            searched: candidates.to_vec(),
            failures,
        })
    }
}

fn probe<B, F>(path: &Path, open: &mut F) -> Attempt<B>
where
    F: FnMut(&Path) -> Result<Arc<B>, CandidateFailure>,
{
    if !path.is_file() {
        return Attempt::Missing;
    }
    match open(path) {
        Ok(binding) => Attempt::Loaded(binding),
        Err(failure) => Attempt::Failed(failure),
    }
}

/// Sort a dynamic loader message into a [`FailureKind`].
pub fn classify_load_error(message: &str) -> FailureKind {
    const INCOMPATIBLE: &[&str] = &[
        "invalid elf header",
        "wrong elf class",
        "file too short",
        "exec format error",
        "not a valid win32 application",
        "incompatible architecture",
        "bad cpu type",
        "not a mach-o file",
        "mach-o, but wrong architecture",
        "slice is not valid mach-o file",
        "machine type",
    ];
    let lower = message.to_ascii_lowercase();
    if INCOMPATIBLE.iter().any(|needle| lower.contains(needle)) {
        FailureKind::Incompatible
    } else {
        FailureKind::Link
    }
}

/// A native binding opened through the platform dynamic loader.
pub struct NativeBinding {
    /// Path the library was opened from
    path: PathBuf,
    /// The loaded library handle
    library: Library,
    /// Cached symbol addresses
    symbols: Mutex<HashMap<String, usize>>,
}

impl NativeBinding {
    /// Open a library from the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CandidateFailure> {
        let path = path.as_ref().to_path_buf();

        // Safety: opening a library runs its initializers. The path comes from
        // the package's own install tree.
        let library = unsafe {
            Library::new(&path).map_err(|e| {
                let message = e.to_string();
                CandidateFailure::new(&path, classify_load_error(&message), message)
            })?
        };

        Ok(Self {
            path,
            library,
            symbols: Mutex::new(HashMap::new()),
        })
    }

    /// Get the path this binding was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up a typed symbol.
    ///
    /// # Safety
    ///
    /// `T` must match the actual type of the exported symbol.
    pub unsafe fn symbol<T>(&self, name: &str) -> BindingResult<Symbol<'_, T>> {
        let c_name = symbol_name(name, &self.path)?;
        self.library
            .get::<T>(c_name.as_bytes_with_nul())
            .map_err(|e| BindingError::SymbolNotFound {
                symbol: name.to_string(),
                path: self.path.clone(),
                message: e.to_string(),
            })
    }

    /// Address of an exported symbol, cached per name.
    pub fn symbol_address(&self, name: &str) -> BindingResult<usize> {
        if let Some(&addr) = self.symbols.lock().get(name) {
            return Ok(addr);
        }

        // Safety: only the address is read; nothing is called through it.
        let addr = unsafe {
            let symbol = self.symbol::<*const ()>(name)?;
            *symbol as usize
        };
        self.symbols.lock().insert(name.to_string(), addr);
        Ok(addr)
    }

    /// Whether the binding exports `name`.
    pub fn has_symbol(&self, name: &str) -> bool {
        self.symbol_address(name).is_ok()
    }
}

impl std::fmt::Debug for NativeBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeBinding")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

fn symbol_name(name: &str, path: &Path) -> BindingResult<CString> {
    CString::new(name).map_err(|_| BindingError::SymbolNotFound {
        symbol: name.to_string(),
        path: path.to_path_buf(),
        message: "symbol name contains a NUL byte".to_string(),
    })
}

/// Opens candidates with the platform dynamic loader.
#[derive(Debug, Clone, Default)]
pub struct DylibOpener {
    /// Symbol a candidate must export to count as loaded
    entry_symbol: Option<String>,
}

impl DylibOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `symbol` to resolve in every opened candidate.
    pub fn with_entry_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.entry_symbol = Some(symbol.into());
        self
    }
}

impl Opener for DylibOpener {
    type Binding = NativeBinding;

    fn open(&self, path: &Path) -> Result<NativeBinding, CandidateFailure> {
        let binding = NativeBinding::open(path)?;
        if let Some(entry) = &self.entry_symbol {
            binding
                .symbol_address(entry)
                .map_err(|e| CandidateFailure::new(path, FailureKind::Link, e.to_string()))?;
        }
        Ok(binding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Loads files whose contents start with "ok", fails the rest.
    struct ContentOpener {
        calls: AtomicUsize,
    }

    impl ContentOpener {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Opener for ContentOpener {
        type Binding = String;

        fn open(&self, path: &Path) -> Result<String, CandidateFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let content = fs::read_to_string(path)
                .map_err(|e| CandidateFailure::new(path, FailureKind::Link, e.to_string()))?;
            if content.starts_with("ok") {
                Ok(content)
            } else {
                Err(CandidateFailure::new(path, FailureKind::Incompatible, "bad magic"))
            }
        }
    }

    #[test]
    fn test_first_loadable_wins() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.node");
        let b = dir.path().join("b.node");
        let c = dir.path().join("c.node");
        fs::write(&b, "broken").unwrap();
        fs::write(&c, "ok-c").unwrap();

        let opener = ContentOpener::new();
        let loaded = load("pkg", &[a, b, c.clone()], &opener).unwrap();
        assert_eq!(loaded.path, c);
        assert_eq!(loaded.binding.as_str(), "ok-c");
        assert_eq!(opener.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_stops_at_first_success() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.node");
        let b = dir.path().join("b.node");
        fs::write(&a, "ok-a").unwrap();
        fs::write(&b, "ok-b").unwrap();

        let opener = ContentOpener::new();
        let loaded = load("pkg", &[a.clone(), b], &opener).unwrap();
        assert_eq!(loaded.path, a);
        assert_eq!(opener.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_nothing_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let candidates = vec![dir.path().join("x.node"), dir.path().join("y.node")];
        let err = load("pkg", &candidates, &ContentOpener::new()).unwrap_err();
        match err {
            BindingError::BindingNotFound { package, searched } => {
                assert_eq!(package, "pkg");
                assert_eq!(searched, candidates);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_directories_are_not_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("x.node");
        fs::create_dir(&sub).unwrap();
        let err = load("pkg", &[sub], &ContentOpener::new()).unwrap_err();
        assert!(matches!(err, BindingError::BindingNotFound { .. }));
    }

    #[test]
    fn test_all_present_all_fail() {
        let dir = tempfile::tempdir().unwrap();
        let candidates: Vec<PathBuf> = (0..3)
            .map(|i| {
                let p = dir.path().join(format!("{}.node", i));
                fs::write(&p, "garbage").unwrap();
                p
            })
            .collect();
        let err = load("pkg", &candidates, &ContentOpener::new()).unwrap_err();
        match err {
            BindingError::AllCandidatesFailed { failures, .. } => {
                assert_eq!(failures.len(), candidates.len());
                let paths: Vec<_> = failures.iter().map(|f| f.path.clone()).collect();
                assert_eq!(paths, candidates);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_mixed_outcome_keeps_missing_paths() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("a.node");
        let broken = dir.path().join("b.node");
        let also_missing = dir.path().join("c.node");
        fs::write(&broken, "garbage").unwrap();

        let candidates = vec![missing, broken.clone(), also_missing];
        let err = load("pkg", &candidates, &ContentOpener::new()).unwrap_err();
        assert_eq!(err.searched_paths().len(), 3);
        match err {
            BindingError::AllCandidatesFailed {
                searched, failures, ..
            } => {
                assert_eq!(searched, candidates);
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].path, broken);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_classify_messages() {
        assert_eq!(
            classify_load_error("/x/a.node: invalid ELF header"),
            FailureKind::Incompatible
        );
        assert_eq!(
            classify_load_error("/x/a.node: wrong ELF class: ELFCLASS32"),
            FailureKind::Incompatible
        );
        assert_eq!(
            classify_load_error("%1 is not a valid Win32 application."),
            FailureKind::Incompatible
        );
        assert_eq!(
            classify_load_error("libfoo.so.1: cannot open shared object file"),
            FailureKind::Link
        );
        assert_eq!(
            classify_load_error("undefined symbol: napi_create_object"),
            FailureKind::Link
        );
    }

    #[test]
    fn test_dylib_opener_rejects_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("core.node");
        fs::write(&path, b"not a shared library").unwrap();

        let failure = DylibOpener::new().open(&path).unwrap_err();
        assert_eq!(failure.path, path);
        assert!(!failure.message.is_empty());
    }
}
