use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How classes without an explicit collection are grouped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CollectionBehavior {
    /// One collection per class.
    #[default]
    PerClass,
    /// One collection for the whole unit under test.
    PerAssembly,
}

impl CollectionBehavior {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PerClass => "per-class",
            Self::PerAssembly => "per-assembly",
        }
    }
}

/// Base used for case display names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum MethodDisplay {
    #[default]
    ClassAndMethod,
    Method,
}

impl MethodDisplay {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClassAndMethod => "class-and-method",
            Self::Method => "method",
        }
    }

    pub fn base(&self, type_name: &str, method_name: &str) -> String {
        match self {
            Self::ClassAndMethod => format!("{type_name}.{method_name}"),
            Self::Method => method_name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryOptions {
    pub include_source_info: bool,
    pub include_serialized_payload: bool,
    pub pre_enumerate_theories: bool,
    pub collection_behavior: CollectionBehavior,
    pub method_display: MethodDisplay,
    /// Worker threads; 0 means the available parallelism.
    pub max_parallel_threads: usize,
    /// Bound of the queue between workers and the bus.
    pub channel_capacity: usize,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            include_source_info: true,
            include_serialized_payload: false,
            pre_enumerate_theories: true,
            collection_behavior: CollectionBehavior::default(),
            method_display: MethodDisplay::default(),
            max_parallel_threads: 0,
            channel_capacity: 64,
        }
    }
}

impl DiscoveryOptions {
    pub fn worker_threads(&self) -> usize {
        match self.max_parallel_threads {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            n => n,
        }
    }
}

/// Loads options from a YAML or JSON file, chosen by extension.
pub fn load_options(path: &Path) -> Result<DiscoveryOptions> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read options file: {}", path.display()))?;

    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse options file: {}", path.display())),
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse options file: {}", path.display())),
        _ => anyhow::bail!(
            "Unsupported options file format (expected .json, .yaml or .yml): {}",
            path.display()
        ),
    }
}
