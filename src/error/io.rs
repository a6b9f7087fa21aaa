use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to read file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse unit description '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("unsupported unit description format: {path} (expected yaml or json)")]
    UnsupportedFormat { path: PathBuf },

    #[error("failed to scan directory at {path}: {source}")]
    DirectoryScanError {
        path: PathBuf,
        source: walkdir::Error,
    },

    #[error("type '{type_name}' is declared more than once")]
    DuplicateType { type_name: String },

    #[error("type '{type_name}' derives from unknown type '{base}'")]
    UnknownBaseType { type_name: String, base: String },

    #[error("inheritance cycle detected at type '{type_name}'")]
    InheritanceCycle { type_name: String },
}

impl LoadError {
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    pub fn read_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadError {
            path: path.into(),
            source,
        }
    }

    pub fn parse_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn unsupported_format(path: impl Into<PathBuf>) -> Self {
        Self::UnsupportedFormat { path: path.into() }
    }

    pub fn duplicate_type(type_name: impl Into<String>) -> Self {
        Self::DuplicateType {
            type_name: type_name.into(),
        }
    }

    pub fn unknown_base_type(type_name: impl Into<String>, base: impl Into<String>) -> Self {
        Self::UnknownBaseType {
            type_name: type_name.into(),
            base: base.into(),
        }
    }

    pub fn inheritance_cycle(type_name: impl Into<String>) -> Self {
        Self::InheritanceCycle {
            type_name: type_name.into(),
        }
    }
}
