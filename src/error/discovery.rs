use thiserror::Error;

/// Failure raised while enumerating theory data. Never aborts a session: the
/// expander turns it into an error case for the affected method.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("could not find static data member '{member}' on type '{type_name}'")]
    MemberNotFound { type_name: String, member: String },

    #[error("data member '{type_name}.{member}' must be static")]
    MemberNotStatic { type_name: String, member: String },

    #[error("no data provider registered for class data type '{type_name}'")]
    ClassDataNotFound { type_name: String },

    #[error("data source '{source_name}' failed: {message}")]
    DataSource {
        source_name: String,
        message: String,
    },

    #[error("data source '{source_name}' panicked: {message}")]
    Panicked {
        source_name: String,
        message: String,
    },
}

impl DiscoveryError {
    pub fn member_not_found(type_name: impl Into<String>, member: impl Into<String>) -> Self {
        Self::MemberNotFound {
            type_name: type_name.into(),
            member: member.into(),
        }
    }

    pub fn member_not_static(type_name: impl Into<String>, member: impl Into<String>) -> Self {
        Self::MemberNotStatic {
            type_name: type_name.into(),
            member: member.into(),
        }
    }

    pub fn class_data_not_found(type_name: impl Into<String>) -> Self {
        Self::ClassDataNotFound {
            type_name: type_name.into(),
        }
    }

    pub fn data_source(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DataSource {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn panicked(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Panicked {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}
