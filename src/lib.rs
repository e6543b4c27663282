//! bindload - Native Binding Resolver and Loader
//!
//! Locates, loads and caches the precompiled native binary that matches the
//! running host, out of the several platform/architecture variants a package
//! ships.
//!
//! # Features
//!
//! - **Explicit platform keys**: OS, CPU architecture and libc variant as enums
//! - **Ordered fallback**: most specific binary first, broken candidates skipped
//! - **Process-wide cache**: one load per resolved path, shared `Arc` afterwards
//! - **Actionable errors**: every probed path and every per-file loader error
//!
//! # Example
//!
//! ```rust,ignore
//! use bindload::{load_binding, load_package};
//!
//! // Equivalent of loadBinding(__dirname, "fast-hash", "@scope/fast-hash")
//! let binding = load_binding("/opt/app/fast-hash", "fast-hash", "@scope/fast-hash")?;
//! let init = binding.symbol_address("napi_register_module_v1")?;
//!
//! // Or read name, binding name and releaseBinary from package.json
//! let same = load_package("/opt/app/fast-hash")?;
//! ```
//!
//! # Resolution
//!
//! ```text
//! ┌──────────────────┐     ┌─────────────┐
//! │  BindingRequest  │     │ PlatformKey │  linux-x64-gnu
//! └────────┬─────────┘     └──────┬──────┘
//!          └──────────┬───────────┘
//!                     ▼
//!            resolve (pure, ordered)
//!                     │
//!                     ▼
//!  ┌──────────────────────────────────────┐
//!  │ BindingCache: request → path → Arc   │
//!  └──────────────────┬───────────────────┘
//!                     ▼
//!           load (first success wins)
//!                     │
//!                     ▼
//!             libloading::Library
//! ```

#![warn(clippy::all)]

pub mod cache;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod loader;
pub mod platform;
pub mod request;
pub mod resolve;

use std::future::{ready, Ready};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use cache::{global, BindingCache, CacheEntry};
pub use config::{ConfigError, ConfigResult, LoaderConfig};
pub use descriptor::PackageDescriptor;
pub use error::{BindingError, BindingResult, CandidateFailure, FailureKind};
pub use loader::{load, Attempt, DylibOpener, Loaded, NativeBinding, Opener};
pub use platform::{Arch, HostFacts, Libc, Os, PlatformError, PlatformKey};
pub use request::BindingRequest;
pub use resolve::{candidate_file_name, resolve};

/// Load a binding through the process-wide cache.
pub fn get_or_load(request: &BindingRequest) -> BindingResult<Arc<NativeBinding>> {
    global()?.get_or_load(request)
}

/// Async-import form of [`get_or_load`]; the future is already resolved.
pub fn get_or_load_ready(request: &BindingRequest) -> Ready<BindingResult<Arc<NativeBinding>>> {
    match global() {
        Ok(cache) => cache.get_or_load_ready(request),
        Err(e) => ready(Err(e)),
    }
}

/// Load `binding_name` for `package_name` from binaries next to `root_dir`.
pub fn load_binding(
    root_dir: impl Into<PathBuf>,
    binding_name: &str,
    package_name: &str,
) -> BindingResult<Arc<NativeBinding>> {
    get_or_load(&BindingRequest::new(root_dir, binding_name, package_name))
}

/// Load the binding described by `package_dir/package.json`.
///
/// A `releaseBinary` field in the descriptor is loaded directly, skipping
/// platform detection.
pub fn load_package(package_dir: impl AsRef<Path>) -> BindingResult<Arc<NativeBinding>> {
    let package_dir = package_dir.as_ref();
    let descriptor = PackageDescriptor::load_dir(package_dir)?;
    get_or_load(&descriptor.to_request(package_dir))
}
