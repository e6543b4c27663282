//! Candidate Resolution
//!
//! Turns a [`BindingRequest`] and a [`PlatformKey`] into the ordered list of
//! paths the loader will probe. Nothing here touches the filesystem.
//!
//! For `binding = "core"`, `package = "@acme/core"` on `linux-x64-gnu`:
//!
//! ```text
//! <root>/core.linux-x64-gnu.node
//! <root>/node_modules/@acme/core-linux-x64-gnu/core.linux-x64-gnu.node
//! <root>/core.linux-x64.node
//! <root>/node_modules/@acme/core-linux-x64/core.linux-x64.node
//! <root>/core.node
//! ```

use std::collections::HashSet;
use std::path::PathBuf;

use crate::config::ResolveConfig;
use crate::error::BindingResult;
use crate::platform::PlatformKey;
use crate::request::BindingRequest;

/// `<binding>.<suffix>.<ext>`
pub fn candidate_file_name(binding: &str, suffix: &str, extension: &str) -> String {
    format!("{}.{}.{}", binding, suffix, extension)
}

/// `<package>-<suffix>`
pub fn platform_package_dir(package: &str, suffix: &str) -> String {
    format!("{}-{}", package, suffix)
}

/// Build the ordered candidate list, most specific first.
///
/// An explicit release binary is the only candidate when present.
pub fn resolve(
    request: &BindingRequest,
    key: &PlatformKey,
    config: &ResolveConfig,
) -> BindingResult<Vec<PathBuf>> {
    request.validate()?;

    if let Some(release) = &request.release_binary {
        return Ok(vec![request.root_dir.join(release)]);
    }

    let mut candidates = Vec::new();
    for suffix in key.suffixes() {
        let file_name = candidate_file_name(&request.binding_name, &suffix, &config.extension);
        candidates.push(request.root_dir.join(&file_name));
        if config.package_dirs {
            candidates.push(
                request
                    .root_dir
                    .join(&config.modules_dir)
                    .join(platform_package_dir(&request.package_name, &suffix))
                    .join(&file_name),
            );
        }
    }

    if config.generic_fallback {
        let fallback = config
            .fallback_filename
            .clone()
            .unwrap_or_else(|| format!("{}.{}", request.binding_name, config.extension));
        candidates.push(request.root_dir.join(fallback));
    }

    let mut seen = HashSet::new();
    candidates.retain(|path| seen.insert(path.clone()));
    Ok(candidates)
}
