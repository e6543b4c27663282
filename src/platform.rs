//! Platform Keys
//!
//! Maps the facts of the running host (OS, CPU architecture, C library) to
//! the explicit [`PlatformKey`] used to name precompiled binaries.
//!
//! Names follow the Node.js conventions used by prebuilt binding packages:
//!
//! ```text
//! linux-x64-gnu     linux-arm64-musl     linux-arm-gnueabihf
//! darwin-arm64      darwin-x64
//! win32-x64-msvc    win32-ia32-msvc      win32-arm64-msvc
//! freebsd-x64       android-arm64
//! ```

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use thiserror::Error;

/// Environment variable that overrides libc detection (`gnu`, `musl`, ... or `none`).
pub const LIBC_ENV: &str = "BINDLOAD_LIBC";

/// Platform detection errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    #[error("Unsupported operating system: {0}")]
    UnsupportedOs(String),

    #[error("Unsupported CPU architecture: {0}")]
    UnsupportedArch(String),

    #[error("Unknown libc variant: {0}")]
    UnknownLibc(String),
}

/// Operating system component of a platform key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
    Linux,
    Darwin,
    Win32,
    FreeBsd,
    Android,
}

impl Os {
    /// Map a Rust `target_os` value (`std::env::consts::OS`).
    pub fn from_rust(os: &str) -> Result<Self, PlatformError> {
        match os {
            "linux" => Ok(Os::Linux),
            "macos" | "darwin" => Ok(Os::Darwin),
            "windows" | "win32" => Ok(Os::Win32),
            "freebsd" => Ok(Os::FreeBsd),
            "android" => Ok(Os::Android),
            other => Err(PlatformError::UnsupportedOs(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Os::Linux => "linux",
            Os::Darwin => "darwin",
            Os::Win32 => "win32",
            Os::FreeBsd => "freebsd",
            Os::Android => "android",
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CPU architecture component of a platform key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    X64,
    Ia32,
    Arm64,
    Arm,
    Riscv64,
    S390x,
    Ppc64,
    Loong64,
}

impl Arch {
    /// Map a Rust `target_arch` value (`std::env::consts::ARCH`).
    pub fn from_rust(arch: &str) -> Result<Self, PlatformError> {
        match arch {
            "x86_64" | "x64" => Ok(Arch::X64),
            "x86" | "ia32" => Ok(Arch::Ia32),
            "aarch64" | "arm64" => Ok(Arch::Arm64),
            "arm" => Ok(Arch::Arm),
            "riscv64" => Ok(Arch::Riscv64),
            "s390x" => Ok(Arch::S390x),
            "powerpc64" | "ppc64" => Ok(Arch::Ppc64),
            "loongarch64" | "loong64" => Ok(Arch::Loong64),
            other => Err(PlatformError::UnsupportedArch(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::X64 => "x64",
            Arch::Ia32 => "ia32",
            Arch::Arm64 => "arm64",
            Arch::Arm => "arm",
            Arch::Riscv64 => "riscv64",
            Arch::S390x => "s390x",
            Arch::Ppc64 => "ppc64",
            Arch::Loong64 => "loong64",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// C library variant component of a platform key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Libc {
    Gnu,
    Musl,
    Msvc,
    Gnueabihf,
    Eabi,
}

impl Libc {
    pub fn as_str(&self) -> &'static str {
        match self {
            Libc::Gnu => "gnu",
            Libc::Musl => "musl",
            Libc::Msvc => "msvc",
            Libc::Gnueabihf => "gnueabihf",
            Libc::Eabi => "eabi",
        }
    }
}

impl FromStr for Libc {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gnu" | "glibc" => Ok(Libc::Gnu),
            "musl" => Ok(Libc::Musl),
            "msvc" => Ok(Libc::Msvc),
            "gnueabihf" => Ok(Libc::Gnueabihf),
            "eabi" => Ok(Libc::Eabi),
            other => Err(PlatformError::UnknownLibc(other.to_string())),
        }
    }
}

impl fmt::Display for Libc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw facts about a host, before interpretation.
///
/// Kept separate from [`PlatformKey`] so tests can describe a fake host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostFacts {
    /// Rust-style OS name (`linux`, `macos`, `windows`, ...)
    pub os: String,
    /// Rust-style architecture name (`x86_64`, `aarch64`, ...)
    pub arch: String,
    /// Libc indicator, if the host reports one
    pub libc: Option<String>,
}

impl HostFacts {
    pub fn new(os: impl Into<String>, arch: impl Into<String>, libc: Option<&str>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
            libc: libc.map(str::to_string),
        }
    }

    /// Facts for the running process.
    ///
    /// The libc indicator comes from [`LIBC_ENV`] when set, otherwise from the
    /// target environment this crate was compiled for.
    pub fn current() -> Self {
        let libc = match std::env::var(LIBC_ENV) {
            Ok(value) if !value.trim().is_empty() => Some(value),
            _ => compiled_libc().map(str::to_string),
        };
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            libc,
        }
    }
}

fn compiled_libc() -> Option<&'static str> {
    if cfg!(target_env = "musl") {
        Some("musl")
    } else if cfg!(target_env = "msvc") {
        Some("msvc")
    } else if cfg!(all(target_env = "gnu", target_arch = "arm")) {
        Some("gnueabihf")
    } else if cfg!(all(target_env = "gnu", target_os = "linux")) {
        Some("gnu")
    } else {
        None
    }
}

/// The tuple identifying which precompiled binary fits a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlatformKey {
    pub os: Os,
    pub arch: Arch,
    pub libc: Option<Libc>,
}

impl PlatformKey {
    pub fn new(os: Os, arch: Arch, libc: Option<Libc>) -> Self {
        Self { os, arch, libc }
    }

    /// Interpret host facts. Pure.
    ///
    /// A libc indicator of `none` (or empty) means no variant. macOS and
    /// FreeBSD binaries never carry a libc suffix.
    pub fn from_facts(facts: &HostFacts) -> Result<Self, PlatformError> {
        let os = Os::from_rust(&facts.os)?;
        let arch = Arch::from_rust(&facts.arch)?;
        let libc = match facts.libc.as_deref().map(str::trim) {
            None | Some("") | Some("none") => None,
            Some(value) => Some(value.parse::<Libc>()?),
        };
        let libc = match os {
            Os::Darwin | Os::FreeBsd => None,
            _ => libc,
        };
        Ok(Self { os, arch, libc })
    }

    /// Key for the running process, computed once.
    pub fn detect() -> Result<Self, PlatformError> {
        static DETECTED: Lazy<Result<PlatformKey, PlatformError>> =
            Lazy::new(|| PlatformKey::from_facts(&HostFacts::current()));
        (*DETECTED).clone()
    }

    /// Same key with a different libc variant.
    pub fn with_libc(mut self, libc: Option<Libc>) -> Self {
        self.libc = libc;
        self
    }

    /// `<os>-<arch>-<libc>`, present only when a libc variant is known.
    pub fn specific_suffix(&self) -> Option<String> {
        self.libc
            .map(|libc| format!("{}-{}-{}", self.os, self.arch, libc))
    }

    /// `<os>-<arch>`
    pub fn generic_suffix(&self) -> String {
        format!("{}-{}", self.os, self.arch)
    }

    /// Suffixes most-specific-first.
    pub fn suffixes(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(2);
        if let Some(specific) = self.specific_suffix() {
            out.push(specific);
        }
        out.push(self.generic_suffix());
        out
    }
}

impl fmt::Display for PlatformKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.specific_suffix() {
            Some(s) => f.write_str(&s),
            None => f.write_str(&self.generic_suffix()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_names_map_to_node_names() {
        let key = PlatformKey::from_facts(&HostFacts::new("linux", "x86_64", Some("gnu"))).unwrap();
        assert_eq!(key.to_string(), "linux-x64-gnu");

        let key = PlatformKey::from_facts(&HostFacts::new("windows", "aarch64", Some("msvc"))).unwrap();
        assert_eq!(key.to_string(), "win32-arm64-msvc");

        let key = PlatformKey::from_facts(&HostFacts::new("linux", "arm", Some("gnueabihf"))).unwrap();
        assert_eq!(key.to_string(), "linux-arm-gnueabihf");
    }

    #[test]
    fn test_darwin_drops_libc() {
        let key = PlatformKey::from_facts(&HostFacts::new("macos", "aarch64", Some("gnu"))).unwrap();
        assert_eq!(key.libc, None);
        assert_eq!(key.to_string(), "darwin-arm64");
        assert_eq!(key.suffixes(), vec!["darwin-arm64".to_string()]);
    }

    #[test]
    fn test_libc_none_and_aliases() {
        let key = PlatformKey::from_facts(&HostFacts::new("linux", "x86_64", Some("none"))).unwrap();
        assert_eq!(key.libc, None);

        let key = PlatformKey::from_facts(&HostFacts::new("linux", "x86_64", Some(" GLIBC "))).unwrap();
        assert_eq!(key.libc, Some(Libc::Gnu));
    }

    #[test]
    fn test_unsupported_facts() {
        assert_eq!(
            PlatformKey::from_facts(&HostFacts::new("haiku", "x86_64", None)),
            Err(PlatformError::UnsupportedOs("haiku".to_string()))
        );
        assert_eq!(
            PlatformKey::from_facts(&HostFacts::new("linux", "mips", None)),
            Err(PlatformError::UnsupportedArch("mips".to_string()))
        );
        assert!(matches!(
            PlatformKey::from_facts(&HostFacts::new("linux", "x86_64", Some("uclibc"))),
            Err(PlatformError::UnknownLibc(_))
        ));
    }

    #[test]
    fn test_suffix_order() {
        let key = PlatformKey::new(Os::Linux, Arch::Arm64, Some(Libc::Musl));
        assert_eq!(
            key.suffixes(),
            vec!["linux-arm64-musl".to_string(), "linux-arm64".to_string()]
        );
    }

    #[test]
    fn test_detect_is_stable() {
        // Supported CI hosts all have a key.
        if let Ok(first) = PlatformKey::detect() {
            assert_eq!(PlatformKey::detect().unwrap(), first);
        }
    }
}
