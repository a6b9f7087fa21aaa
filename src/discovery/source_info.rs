use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::error::LoadError;
use crate::metadata::SourceLocation;

/// Resolves source locations for test methods on demand.
pub trait SourceInformationProvider: Send + Sync {
    fn lookup(&self, type_name: &str, method_name: &str) -> Option<SourceLocation>;
}

#[derive(Debug, Clone, Deserialize)]
struct SourceMapEntry {
    #[serde(rename = "type")]
    type_name: String,
    method: String,
    file: String,
    line: u32,
}

/// Static source locations keyed by type and method name, loadable from a
/// YAML or JSON list of `{type, method, file, line}` entries.
#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    entries: HashMap<(String, String), SourceLocation>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        type_name: impl Into<String>,
        method_name: impl Into<String>,
        location: SourceLocation,
    ) {
        self.entries
            .insert((type_name.into(), method_name.into()), location);
    }

    pub fn load(path: &Path) -> Result<Self, LoadError> {
        if !path.exists() {
            return Err(LoadError::file_not_found(path));
        }
        let content =
            std::fs::read_to_string(path).map_err(|e| LoadError::read_error(path, e))?;
        let entries: Vec<SourceMapEntry> = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| LoadError::parse_error(path, e.to_string()))?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
                .map_err(|e| LoadError::parse_error(path, e.to_string()))?,
            _ => return Err(LoadError::unsupported_format(path)),
        };

        let mut map = Self::new();
        for entry in entries {
            map.insert(
                entry.type_name,
                entry.method,
                SourceLocation::new(entry.file, entry.line),
            );
        }
        Ok(map)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SourceInformationProvider for SourceMap {
    fn lookup(&self, type_name: &str, method_name: &str) -> Option<SourceLocation> {
        self.entries
            .get(&(type_name.to_string(), method_name.to_string()))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_yaml_source_map() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sources.yaml");
        fs::write(
            &path,
            "- type: Tests.Math\n  method: Adds\n  file: tests/math.cs\n  line: 14\n",
        )
        .unwrap();

        let map = SourceMap::load(&path).unwrap();
        assert_eq!(
            map.lookup("Tests.Math", "Adds"),
            Some(SourceLocation::new("tests/math.cs", 14))
        );
        assert_eq!(map.lookup("Tests.Math", "Other"), None);
    }

    #[test]
    fn test_missing_source_map() {
        let temp_dir = TempDir::new().unwrap();
        let err = SourceMap::load(&temp_dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, LoadError::FileNotFound { .. }));
    }
}
