use serde::{Serialize, Serializer};

use crate::identity::UniqueId;
use crate::model::{CaseKind, TestCase, Traits};

/// Events a discovery session reports through the bus.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DiscoveryEvent {
    DiscoveryStarting {
        assembly: String,
        assembly_id: UniqueId,
    },
    TestCaseDiscovered(DiscoveredCase),
    Diagnostic {
        message: String,
    },
    DiscoveryComplete {
        assembly_id: UniqueId,
        case_count: usize,
        cancelled: bool,
    },
}

impl DiscoveryEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DiscoveryStarting { .. } => "discovery_starting",
            Self::TestCaseDiscovered(_) => "test_case_discovered",
            Self::Diagnostic { .. } => "diagnostic",
            Self::DiscoveryComplete { .. } => "discovery_complete",
        }
    }

    pub fn test_case(&self) -> Option<&TestCase> {
        match self {
            Self::TestCaseDiscovered(discovered) => Some(&discovered.test_case),
            _ => None,
        }
    }
}

/// A discovered case plus its record form when payloads were requested.
#[derive(Debug, Clone)]
pub struct DiscoveredCase {
    pub test_case: TestCase,
    pub serialization: Option<String>,
}

impl DiscoveredCase {
    pub fn new(test_case: TestCase, include_serialization: bool) -> Self {
        let serialization = include_serialization.then(|| test_case.serialize());
        Self {
            test_case,
            serialization,
        }
    }
}

fn no_traits(traits: &&Traits) -> bool {
    traits.is_empty()
}

#[derive(Serialize)]
struct CaseView<'a> {
    unique_id: &'a UniqueId,
    display_name: &'a str,
    kind: CaseKind,
    type_name: &'a str,
    method_name: &'a str,
    collection: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    skip_reason: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_file: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_line: Option<u32>,
    #[serde(skip_serializing_if = "no_traits")]
    traits: &'a Traits,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    serialization: Option<&'a str>,
}

impl<'a> From<&'a DiscoveredCase> for CaseView<'a> {
    fn from(discovered: &'a DiscoveredCase) -> Self {
        let case = &discovered.test_case;
        Self {
            unique_id: case.unique_id(),
            display_name: case.display_name(),
            kind: case.kind(),
            type_name: case.type_name(),
            method_name: case.method_name(),
            collection: case.method().class().collection().display_name(),
            skip_reason: case.skip_reason(),
            source_file: case.source().map(|s| s.file.as_str()),
            source_line: case.source().map(|s| s.line),
            traits: case.traits(),
            error_message: case.error_message(),
            serialization: discovered.serialization.as_deref(),
        }
    }
}

impl Serialize for DiscoveredCase {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        CaseView::from(self).serialize(serializer)
    }
}
