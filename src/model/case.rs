use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

use super::TestMethod;
use crate::error::SerializationError;
use crate::identity::{self, UniqueId};
use crate::metadata::{ArgValue, SourceLocation};
use crate::serialization::CaseRecord;

/// Trait name to values, in resolution order.
pub type Traits = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseKind {
    /// Parameterless test.
    Fact,
    /// Parameterized test whose data is enumerated at execution time.
    Theory,
    /// One pre-enumerated, serialized data row of a theory.
    Row,
    /// Pseudo-case reporting a discovery failure.
    Error,
}

impl CaseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fact => "fact",
            Self::Theory => "theory",
            Self::Row => "row",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for CaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaseKind {
    type Err = SerializationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fact" => Ok(Self::Fact),
            "theory" => Ok(Self::Theory),
            "row" => Ok(Self::Row),
            "error" => Ok(Self::Error),
            other => Err(SerializationError::unknown_case_kind(other)),
        }
    }
}

/// One concrete, independently addressable test invocation.
///
/// Two cases are equal when their unique IDs are equal.
#[derive(Debug, Clone)]
pub struct TestCase {
    method: Arc<TestMethod>,
    kind: CaseKind,
    display_name: String,
    unique_id: UniqueId,
    discriminant: String,
    skip_reason: Option<String>,
    source: Option<SourceLocation>,
    arguments: Vec<ArgValue>,
    error_message: Option<String>,
    traits: Traits,
}

impl TestCase {
    fn build(
        method: Arc<TestMethod>,
        kind: CaseKind,
        display_name: String,
        discriminant: String,
        skip_reason: Option<String>,
    ) -> Self {
        let unique_id = identity::case_id(
            method.unique_id(),
            kind.as_str(),
            &discriminant,
            skip_reason.is_some(),
        );
        Self {
            method,
            kind,
            display_name,
            unique_id,
            discriminant,
            skip_reason,
            source: None,
            arguments: Vec::new(),
            error_message: None,
            traits: Traits::new(),
        }
    }

    pub fn fact(
        method: Arc<TestMethod>,
        display_name: impl Into<String>,
        skip_reason: Option<String>,
    ) -> Self {
        Self::build(
            method,
            CaseKind::Fact,
            display_name.into(),
            String::new(),
            skip_reason,
        )
    }

    /// A serialized data row. `payload` is the encoded form of `arguments`.
    pub fn row(
        method: Arc<TestMethod>,
        display_name: impl Into<String>,
        arguments: Vec<ArgValue>,
        payload: String,
        skip_reason: Option<String>,
    ) -> Self {
        let mut case = Self::build(
            method,
            CaseKind::Row,
            display_name.into(),
            payload,
            skip_reason,
        );
        case.arguments = arguments;
        case
    }

    /// A theory deferred to execution time, either whole (`source_index` is
    /// `None`) or for a single data source.
    pub fn deferred(
        method: Arc<TestMethod>,
        display_name: impl Into<String>,
        source_index: Option<usize>,
        skip_reason: Option<String>,
    ) -> Self {
        let discriminant = source_index
            .map(|i| format!("@{i}"))
            .unwrap_or_default();
        Self::build(
            method,
            CaseKind::Theory,
            display_name.into(),
            discriminant,
            skip_reason,
        )
    }

    pub fn error(
        method: Arc<TestMethod>,
        display_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let mut case = Self::build(
            method,
            CaseKind::Error,
            display_name.into(),
            String::new(),
            None,
        );
        case.error_message = Some(message.into());
        case
    }

    pub fn with_source(mut self, source: Option<SourceLocation>) -> Self {
        self.source = source;
        self
    }

    pub fn with_traits(mut self, traits: Traits) -> Self {
        self.traits = traits;
        self
    }

    pub fn method(&self) -> &Arc<TestMethod> {
        &self.method
    }

    pub fn kind(&self) -> CaseKind {
        self.kind
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn unique_id(&self) -> &UniqueId {
        &self.unique_id
    }

    pub fn discriminant(&self) -> &str {
        &self.discriminant
    }

    pub fn skip_reason(&self) -> Option<&str> {
        self.skip_reason.as_deref()
    }

    pub fn source(&self) -> Option<&SourceLocation> {
        self.source.as_ref()
    }

    pub fn arguments(&self) -> &[ArgValue] {
        &self.arguments
    }

    /// Encoded argument row; present only for serialized data rows.
    pub fn payload(&self) -> Option<&str> {
        match self.kind {
            CaseKind::Row => Some(&self.discriminant),
            _ => None,
        }
    }

    /// Data source index of a per-source deferred theory.
    pub fn source_index(&self) -> Option<usize> {
        match self.kind {
            CaseKind::Theory => self.discriminant.strip_prefix('@')?.parse().ok(),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn traits(&self) -> &Traits {
        &self.traits
    }

    pub fn type_name(&self) -> &str {
        self.method.class().type_name()
    }

    pub fn method_name(&self) -> &str {
        self.method.name()
    }

    pub fn to_record(&self) -> CaseRecord {
        CaseRecord::from_case(self)
    }

    /// The versioned, colon-delimited record form of this case.
    pub fn serialize(&self) -> String {
        self.to_record().to_string()
    }
}

impl PartialEq for TestCase {
    fn eq(&self, other: &Self) -> bool {
        self.unique_id == other.unique_id
    }
}

impl Eq for TestCase {}

impl Hash for TestCase {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.unique_id.hash(state);
    }
}
