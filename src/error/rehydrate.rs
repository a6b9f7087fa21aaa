use thiserror::Error;

use super::{ConfigurationError, SerializationError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RehydrateError {
    #[error("type '{type_name}' not found in assembly '{assembly}'")]
    TypeNotFound { assembly: String, type_name: String },

    #[error("method '{method}' not found on type '{type_name}'")]
    MethodNotFound { type_name: String, method: String },

    #[error(transparent)]
    Serialization(#[from] SerializationError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl RehydrateError {
    pub fn type_not_found(assembly: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::TypeNotFound {
            assembly: assembly.into(),
            type_name: type_name.into(),
        }
    }

    pub fn method_not_found(type_name: impl Into<String>, method: impl Into<String>) -> Self {
        Self::MethodNotFound {
            type_name: type_name.into(),
            method: method.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_not_found_display() {
        let err = RehydrateError::method_not_found("Tests.MathTests", "Adds");
        assert_eq!(
            err.to_string(),
            "method 'Adds' not found on type 'Tests.MathTests'"
        );
    }
}
