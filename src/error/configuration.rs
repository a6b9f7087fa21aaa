use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("unknown marker kind: {kind}")]
    UnknownMarkerKind { kind: String },

    #[error("marker kind '{kind}' extends unknown kind '{parent}'")]
    UnknownParentKind { kind: String, parent: String },

    #[error("marker kind '{kind}' is already registered")]
    DuplicateMarkerKind { kind: String },

    #[error("marker '{kind}' is missing required argument '{field}'")]
    MissingArgument { kind: String, field: String },
}

impl ConfigurationError {
    pub fn unknown_marker_kind(kind: impl Into<String>) -> Self {
        Self::UnknownMarkerKind { kind: kind.into() }
    }

    pub fn unknown_parent_kind(kind: impl Into<String>, parent: impl Into<String>) -> Self {
        Self::UnknownParentKind {
            kind: kind.into(),
            parent: parent.into(),
        }
    }

    pub fn duplicate_marker_kind(kind: impl Into<String>) -> Self {
        Self::DuplicateMarkerKind { kind: kind.into() }
    }

    pub fn missing_argument(kind: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingArgument {
            kind: kind.into(),
            field: field.into(),
        }
    }
}
