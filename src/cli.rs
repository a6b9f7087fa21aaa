use anyhow::{Context as AnyhowContext, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

use crate::config::{load_options, CollectionBehavior, DiscoveryOptions, MethodDisplay};

#[derive(Parser, Debug)]
#[command(name = "casefinder")]
#[command(about = "Test case discoverer - enumerate and identify the tests of a unit description", long_about = None)]
pub struct Args {
    /// Unit description file, or a directory of *.unit.{yaml,yml,json} files
    #[arg(long, value_name = "PATH")]
    pub path: PathBuf,

    /// Only discover tests on this type (includes non-public methods)
    #[arg(long = "type", value_name = "TYPE")]
    pub type_name: Option<String>,

    /// Discovery options file (YAML or JSON); flags override its values
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Attach source file and line to discovered cases
    #[arg(long, conflicts_with = "no_source")]
    pub include_source: bool,

    /// Do not attach source information
    #[arg(long)]
    pub no_source: bool,

    /// Include each case's serialized record in the output
    #[arg(long)]
    pub include_payload: bool,

    /// Report each theory as a single case instead of enumerating its data
    #[arg(long)]
    pub no_pre_enumerate: bool,

    /// How classes without an explicit collection are grouped
    #[arg(long, value_name = "BEHAVIOR")]
    pub collection_behavior: Option<CollectionBehavior>,

    /// Display name style for test cases
    #[arg(long, value_name = "STYLE")]
    pub method_display: Option<MethodDisplay>,

    /// Worker threads (0 uses all available cores)
    #[arg(long, value_name = "N")]
    pub parallel: Option<usize>,

    /// Stop after this many cases have been reported
    #[arg(long, value_name = "N")]
    pub stop_after: Option<usize>,

    /// Source locations for methods without them (YAML or JSON)
    #[arg(long, value_name = "FILE")]
    pub source_map: Option<PathBuf>,

    /// Output file path (prints to stdout if not specified)
    #[arg(short = 'O', long, value_name = "FILE")]
    pub output_file: Option<PathBuf>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    pub fn validate(&self) -> Result<()> {
        validate_path(&self.path)?;
        if let Some(ref config) = self.config {
            if !config.is_file() {
                anyhow::bail!("Config file does not exist: {}", config.display());
            }
        }
        if let Some(ref source_map) = self.source_map {
            if !source_map.is_file() {
                anyhow::bail!("Source map does not exist: {}", source_map.display());
            }
        }
        if self.stop_after == Some(0) {
            anyhow::bail!("--stop-after must be at least 1");
        }
        Ok(())
    }

    /// Discovery options from the config file, if any, with flags applied
    /// on top.
    pub fn options(&self) -> Result<DiscoveryOptions> {
        let mut options = match &self.config {
            Some(path) => load_options(path)
                .with_context(|| format!("Failed to load config: {}", path.display()))?,
            None => DiscoveryOptions::default(),
        };

        if self.include_source {
            options.include_source_info = true;
        }
        if self.no_source {
            options.include_source_info = false;
        }
        if self.include_payload {
            options.include_serialized_payload = true;
        }
        if self.no_pre_enumerate {
            options.pre_enumerate_theories = false;
        }
        if let Some(behavior) = self.collection_behavior {
            options.collection_behavior = behavior;
        }
        if let Some(display) = self.method_display {
            options.method_display = display;
        }
        if let Some(threads) = self.parallel {
            options.max_parallel_threads = threads;
        }
        Ok(options)
    }
}

pub fn validate_path(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("Path does not exist: {}", path.display());
    }

    if path.is_file() {
        std::fs::metadata(path).with_context(|| format!("Cannot read file: {}", path.display()))?;
    } else if path.is_dir() {
        std::fs::metadata(path)
            .with_context(|| format!("Cannot read directory: {}", path.display()))?;
    } else {
        anyhow::bail!("Path is neither a file nor a directory: {}", path.display());
    }

    Ok(())
}
