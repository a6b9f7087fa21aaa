//! Test entities produced by discovery.
//!
//! Collections, classes and methods are shared, read-only descriptors behind
//! `Arc`. Equality is by value so that entities rebuilt independently (for
//! example after a case record crossed a process boundary) compare equal to
//! the originals.
mod case;

pub use case::{CaseKind, TestCase, Traits};

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::identity::{self, UniqueId};

/// A marker type carrying shared-fixture metadata for a named collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionDefinition {
    pub type_name: String,
    pub name: String,
    pub fixtures: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TestCollection {
    display_name: String,
    unique_id: UniqueId,
    definition: Option<CollectionDefinition>,
}

impl TestCollection {
    pub fn new(display_name: impl Into<String>, definition: Option<CollectionDefinition>) -> Self {
        let display_name = display_name.into();
        let unique_id = identity::collection_id(
            &display_name,
            definition.as_ref().map(|d| d.type_name.as_str()),
        );
        Self {
            display_name,
            unique_id,
            definition,
        }
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn unique_id(&self) -> &UniqueId {
        &self.unique_id
    }

    pub fn definition(&self) -> Option<&CollectionDefinition> {
        self.definition.as_ref()
    }

    fn definition_type(&self) -> Option<&str> {
        self.definition.as_ref().map(|d| d.type_name.as_str())
    }
}

impl PartialEq for TestCollection {
    fn eq(&self, other: &Self) -> bool {
        self.display_name == other.display_name && self.definition_type() == other.definition_type()
    }
}

impl Eq for TestCollection {}

impl Hash for TestCollection {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.display_name.hash(state);
        self.definition_type().hash(state);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TestClass {
    type_name: String,
    collection: Arc<TestCollection>,
    unique_id: UniqueId,
}

impl TestClass {
    pub fn new(type_name: impl Into<String>, collection: Arc<TestCollection>) -> Self {
        let type_name = type_name.into();
        let unique_id = identity::class_id(collection.unique_id(), &type_name);
        Self {
            type_name,
            collection,
            unique_id,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn collection(&self) -> &Arc<TestCollection> {
        &self.collection
    }

    pub fn unique_id(&self) -> &UniqueId {
        &self.unique_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TestMethod {
    name: String,
    class: Arc<TestClass>,
    unique_id: UniqueId,
}

impl TestMethod {
    pub fn new(name: impl Into<String>, class: Arc<TestClass>) -> Self {
        let name = name.into();
        let unique_id = identity::method_id(class.unique_id(), &name);
        Self {
            name,
            class,
            unique_id,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn class(&self) -> &Arc<TestClass> {
        &self.class
    }

    pub fn unique_id(&self) -> &UniqueId {
        &self.unique_id
    }
}
