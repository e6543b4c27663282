//! bindload - Native Binding Resolver and Loader
//!
//! CLI for diagnosing which native binary a package would load on this host.

use anyhow::{Context, Result};
use bindload::{BindingCache, BindingRequest, HostFacts, LoaderConfig, PackageDescriptor};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "bindload")]
#[command(version)]
#[command(about = "Resolve and load platform-specific native bindings", long_about = None)]
struct Cli {
    /// Config file (default: search for bindload.toml upward from the package)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the platform key of this host
    Platform,

    /// List candidate paths for a package, in probe order
    Candidates {
        #[command(flatten)]
        target: Target,
    },

    /// Load a package's binding and report the resolved path
    Load {
        #[command(flatten)]
        target: Target,

        /// Symbols that must resolve in the loaded binding
        #[arg(short, long = "symbol")]
        symbols: Vec<String>,
    },
}

#[derive(clap::Args)]
struct Target {
    /// Package directory (contains package.json unless --binding is given)
    #[arg(default_value = ".")]
    dir: PathBuf,

    /// Binding name (skips package.json)
    #[arg(long, requires = "package")]
    binding: Option<String>,

    /// Package name (skips package.json)
    #[arg(long, requires = "binding")]
    package: Option<String>,
}

impl Target {
    fn request(&self) -> Result<BindingRequest> {
        match (&self.binding, &self.package) {
            (Some(binding), Some(package)) => {
                Ok(BindingRequest::new(&self.dir, binding.as_str(), package.as_str()))
            }
            _ => {
                let descriptor = PackageDescriptor::load_dir(&self.dir)
                    .with_context(|| format!("Reading descriptor in {}", self.dir.display()))?;
                Ok(descriptor.to_request(&self.dir))
            }
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Platform => cmd_platform(cli.config.as_deref()),
        Commands::Candidates { target } => cmd_candidates(cli.config.as_deref(), target),
        Commands::Load { target, symbols } => cmd_load(cli.config.as_deref(), target, symbols),
    }
}

fn load_config(explicit: Option<&Path>, dir: &Path) -> Result<LoaderConfig> {
    match explicit {
        Some(path) => LoaderConfig::load(path)
            .with_context(|| format!("Loading config {}", path.display())),
        None => LoaderConfig::find_and_load(dir).context("Loading bindload.toml"),
    }
}

fn cmd_platform(config: Option<&Path>) -> Result<()> {
    let facts = HostFacts::current();
    let config = load_config(config, &std::env::current_dir()?)?;
    let cache = BindingCache::from_config(config);
    let key = cache.platform_key()?;

    println!("os:       {} ({})", key.os, facts.os);
    println!("arch:     {} ({})", key.arch, facts.arch);
    match key.libc {
        Some(libc) => println!("libc:     {}", libc),
        None => println!("libc:     -"),
    }
    println!("suffixes: {}", key.suffixes().join(", "));
    Ok(())
}

fn cmd_candidates(config: Option<&Path>, target: &Target) -> Result<()> {
    let config = load_config(config, &target.dir)?;
    let cache = BindingCache::from_config(config);
    let request = target.request()?;

    for (i, path) in cache.candidates(&request)?.iter().enumerate() {
        let marker = if path.is_file() { "found" } else { "-" };
        println!("{:>2}. [{:>5}] {}", i + 1, marker, path.display());
    }
    Ok(())
}

fn cmd_load(config: Option<&Path>, target: &Target, symbols: &[String]) -> Result<()> {
    let config = load_config(config, &target.dir)?;
    let cache = BindingCache::from_config(config);
    let request = target.request()?;

    let entry = cache.get_or_load_entry(&request)?;
    println!("Loaded {} from {}", request.package_name, entry.path.display());

    for symbol in symbols {
        let addr = entry.binding.symbol_address(symbol)?;
        println!("  {} @ {:#x}", symbol, addr);
    }
    Ok(())
}
