//! Binding Requests

use std::path::{Path, PathBuf};

use crate::error::{BindingError, BindingResult};

/// What to load: a package root plus the names identifying its binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BindingRequest {
    /// Directory the binaries live next to
    pub root_dir: PathBuf,
    /// Logical binding name (`napi.name` in the descriptor)
    pub binding_name: String,
    /// Package identity (`name` in the descriptor)
    pub package_name: String,
    /// Explicit binary path, relative to `root_dir` unless absolute.
    /// Bypasses platform detection entirely.
    pub release_binary: Option<PathBuf>,
}

impl BindingRequest {
    pub fn new(
        root_dir: impl Into<PathBuf>,
        binding_name: impl Into<String>,
        package_name: impl Into<String>,
    ) -> Self {
        Self {
            root_dir: root_dir.into(),
            binding_name: binding_name.into(),
            package_name: package_name.into(),
            release_binary: None,
        }
    }

    /// Set the explicit release binary override
    pub fn with_release_binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.release_binary = Some(path.into());
        self
    }

    /// Check the request shape.
    pub fn validate(&self) -> BindingResult<()> {
        if self.binding_name.trim().is_empty() {
            return Err(BindingError::InvalidRequest(
                "binding name must not be empty".to_string(),
            ));
        }
        if self.package_name.trim().is_empty() {
            return Err(BindingError::InvalidRequest(
                "package name must not be empty".to_string(),
            ));
        }
        if self.binding_name.contains(['/', '\\']) {
            return Err(BindingError::InvalidRequest(format!(
                "binding name '{}' must not contain path separators",
                self.binding_name
            )));
        }
        if let Some(release) = &self.release_binary {
            if release.as_os_str().is_empty() {
                return Err(BindingError::InvalidRequest(
                    "release binary path must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// The request with `root_dir` made absolute against the working directory.
    ///
    /// Used as the cache identity; does not touch the filesystem beyond
    /// reading the working directory for relative roots.
    pub fn absolute(&self) -> BindingResult<Self> {
        let mut out = self.clone();
        out.root_dir = absolute_path(&self.root_dir)?;
        Ok(out)
    }
}

pub(crate) fn absolute_path(path: &Path) -> BindingResult<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|e| {
        BindingError::InvalidRequest(format!(
            "cannot resolve relative root '{}': {}",
            path.display(),
            e
        ))
    })?;
    Ok(cwd.join(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_empty_names() {
        let req = BindingRequest::new("/pkg", "", "pkg");
        assert!(matches!(req.validate(), Err(BindingError::InvalidRequest(_))));

        let req = BindingRequest::new("/pkg", "binding", "   ");
        assert!(matches!(req.validate(), Err(BindingError::InvalidRequest(_))));
    }

    #[test]
    fn test_validate_rejects_separators() {
        let req = BindingRequest::new("/pkg", "../evil", "pkg");
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_scoped_package_is_valid() {
        let req = BindingRequest::new("/pkg", "binding", "@scope/pkg");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_absolute_keeps_absolute_roots() {
        let root = std::env::temp_dir();
        let req = BindingRequest::new(&root, "b", "p");
        assert_eq!(req.absolute().unwrap().root_dir, root);

        let rel = BindingRequest::new("some/dir", "b", "p").absolute().unwrap();
        assert!(rel.root_dir.is_absolute());
        assert!(rel.root_dir.ends_with("some/dir"));
    }
}
