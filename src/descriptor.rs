//! Package Descriptor (package.json)
//!
//! The metadata that names a package's native binding:
//!
//! ```json
//! {
//!   "name": "@scope/fast-hash",
//!   "releaseBinary": "target/release/fast_hash.node",
//!   "napi": { "name": "fast-hash" }
//! }
//! ```
//!
//! Only the fields the loader needs are interpreted; everything else is kept
//! in `extra` untouched.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::error::{BindingError, BindingResult};
use crate::request::BindingRequest;

/// File name of the descriptor inside a package directory.
pub const DESCRIPTOR_FILE: &str = "package.json";

/// Package descriptor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageDescriptor {
    /// Package name (may be scoped, e.g. `@scope/pkg`)
    pub name: String,

    /// Package version
    #[serde(default)]
    pub version: Option<String>,

    /// Explicit binary path; bypasses platform detection when present
    #[serde(default)]
    pub release_binary: Option<String>,

    /// Native binding settings
    #[serde(default)]
    pub napi: Option<NapiSection>,

    /// Every other field
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// The `napi` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NapiSection {
    /// Logical binding name
    #[serde(default)]
    pub name: Option<String>,

    /// Newer spelling of `name`; wins when both are present
    #[serde(default)]
    pub binary_name: Option<String>,

    /// Package name prefix for per-platform packages, when it differs from `name`
    #[serde(default)]
    pub package_name: Option<String>,
}

impl PackageDescriptor {
    /// Load a descriptor from a file
    pub fn load(path: impl AsRef<Path>) -> BindingResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| descriptor_error(path, e))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| descriptor_error(path, e))
    }

    /// Load `package.json` from a package directory
    pub fn load_dir(dir: impl AsRef<Path>) -> BindingResult<Self> {
        Self::load(dir.as_ref().join(DESCRIPTOR_FILE))
    }

    /// Parse from JSON string
    pub fn from_json(json: &str) -> BindingResult<Self> {
        serde_json::from_str(json).map_err(|e| descriptor_error(Path::new(DESCRIPTOR_FILE), e))
    }

    /// Binding name, falling back to the unscoped package name.
    pub fn binding_name(&self) -> String {
        self.napi
            .as_ref()
            .and_then(|n| n.binary_name.clone().or_else(|| n.name.clone()))
            .unwrap_or_else(|| unscoped(&self.name).to_string())
    }

    /// Name used for per-platform package directories.
    pub fn platform_package_name(&self) -> &str {
        self.napi
            .as_ref()
            .and_then(|n| n.package_name.as_deref())
            .unwrap_or(&self.name)
    }

    /// Build the request for a package rooted at `root_dir`.
    pub fn to_request(&self, root_dir: impl Into<PathBuf>) -> BindingRequest {
        let request = BindingRequest::new(
            root_dir,
            self.binding_name(),
            self.platform_package_name(),
        );
        match self.release_binary.as_deref().map(str::trim) {
            Some(release) if !release.is_empty() => request.with_release_binary(release),
            _ => request,
        }
    }
}

fn unscoped(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

fn descriptor_error(path: &Path, e: impl std::fmt::Display) -> BindingError {
    BindingError::Descriptor {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}
