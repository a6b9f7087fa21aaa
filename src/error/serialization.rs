use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SerializationError {
    #[error("value of type '{type_name}' cannot be serialized")]
    Unsupported { type_name: String },

    #[error("malformed payload at offset {offset}: {message}")]
    MalformedPayload { offset: usize, message: String },

    #[error("malformed case record: {message}")]
    MalformedRecord { message: String },

    #[error("unsupported {what} version: {found}")]
    UnsupportedVersion { what: &'static str, found: String },

    #[error("unknown case kind: {kind}")]
    UnknownCaseKind { kind: String },
}

impl SerializationError {
    pub fn unsupported(type_name: impl Into<String>) -> Self {
        Self::Unsupported {
            type_name: type_name.into(),
        }
    }

    pub fn malformed_payload(offset: usize, message: impl Into<String>) -> Self {
        Self::MalformedPayload {
            offset,
            message: message.into(),
        }
    }

    pub fn malformed_record(message: impl Into<String>) -> Self {
        Self::MalformedRecord {
            message: message.into(),
        }
    }

    pub fn unsupported_version(what: &'static str, found: impl Into<String>) -> Self {
        Self::UnsupportedVersion {
            what,
            found: found.into(),
        }
    }

    pub fn unknown_case_kind(kind: impl Into<String>) -> Self {
        Self::UnknownCaseKind { kind: kind.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_display() {
        let err = SerializationError::unsupported("Tests.Widget");
        assert_eq!(
            err.to_string(),
            "value of type 'Tests.Widget' cannot be serialized"
        );
    }

    #[test]
    fn test_unsupported_version_display() {
        let err = SerializationError::unsupported_version("format", "7");
        assert_eq!(err.to_string(), "unsupported format version: 7");
    }
}
