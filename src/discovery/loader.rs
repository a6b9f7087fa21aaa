use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::LoadError;
use crate::metadata::{AssemblyDescription, TestAssembly};

const UNIT_SUFFIXES: &[&str] = &[".unit.yaml", ".unit.yml", ".unit.json"];

/// Loads unit-under-test descriptions from files or directories.
#[derive(Debug, Clone)]
pub struct UnitLoader {
    exclude_hidden: bool,
}

impl Default for UnitLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitLoader {
    pub fn new() -> Self {
        Self {
            exclude_hidden: true,
        }
    }

    pub fn include_hidden(mut self) -> Self {
        self.exclude_hidden = false;
        self
    }

    /// Loads one description file, or every `*.unit.{yaml,yml,json}` file
    /// below a directory in path order.
    pub fn load(&self, path: &Path) -> Result<Vec<TestAssembly>, LoadError> {
        if !path.exists() {
            return Err(LoadError::file_not_found(path));
        }
        if path.is_file() {
            return Ok(vec![self.load_file(path)?]);
        }

        let files = self.walk_unit_files(path)?;
        info!(root = %path.display(), files = files.len(), "found unit descriptions");
        files.iter().map(|file| self.load_file(file)).collect()
    }

    pub fn load_file(&self, path: &Path) -> Result<TestAssembly, LoadError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| LoadError::read_error(path, e))?;
        let description: AssemblyDescription = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| LoadError::parse_error(path, e.to_string()))?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
                .map_err(|e| LoadError::parse_error(path, e.to_string()))?,
            _ => return Err(LoadError::unsupported_format(path)),
        };
        debug!(path = %path.display(), assembly = %description.name, "loaded unit description");
        TestAssembly::new(description)
    }

    fn walk_unit_files(&self, root: &Path) -> Result<Vec<PathBuf>, LoadError> {
        let exclude_hidden = self.exclude_hidden;
        let mut files = Vec::new();

        for entry in WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0
                    || !(exclude_hidden && e.file_name().to_string_lossy().starts_with('.'))
            })
        {
            let entry = entry.map_err(|e| LoadError::DirectoryScanError {
                path: root.to_path_buf(),
                source: e,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if UNIT_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)) {
                files.push(entry.path().to_path_buf());
            }
        }

        files.sort();
        Ok(files)
    }
}
