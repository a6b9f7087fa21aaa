use std::collections::HashMap;

use crate::error::ConfigurationError;
use crate::metadata::{ArgValue, MarkerArgs};

/// Keys of the built-in marker kinds.
pub mod kinds {
    pub const FACT: &str = "Fact";
    pub const THEORY: &str = "Theory";
    pub const DATA: &str = "Data";
    pub const INLINE_DATA: &str = "InlineData";
    pub const MEMBER_DATA: &str = "MemberData";
    pub const CLASS_DATA: &str = "ClassData";
    pub const COLLECTION: &str = "Collection";
    pub const COLLECTION_DEFINITION: &str = "CollectionDefinition";
    pub const TRAIT: &str = "Trait";
}

/// Shape of the arguments a marker kind carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSchema {
    Test,
    InlineData,
    MemberData,
    ClassData,
    Collection,
    CollectionDefinition,
    Trait,
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MarkerPayload {
    Test {
        skip: Option<String>,
        display_name: Option<String>,
    },
    InlineData {
        values: Vec<ArgValue>,
        skip: Option<String>,
    },
    MemberData {
        member: String,
        declaring_type: Option<String>,
        arguments: Vec<ArgValue>,
    },
    ClassData {
        type_name: String,
    },
    Collection {
        name: String,
    },
    CollectionDefinition {
        name: String,
        fixtures: Vec<String>,
    },
    Trait {
        name: String,
        value: String,
    },
    Empty,
}

impl PayloadSchema {
    pub fn bind(self, kind: &str, args: &MarkerArgs) -> Result<MarkerPayload, ConfigurationError> {
        let required = |field: &'static str, value: &Option<String>| {
            value
                .clone()
                .ok_or_else(|| ConfigurationError::missing_argument(kind, field))
        };
        let payload = match self {
            Self::Test => MarkerPayload::Test {
                skip: args.skip.clone(),
                display_name: args.display_name.clone(),
            },
            Self::InlineData => MarkerPayload::InlineData {
                values: args.values.clone(),
                skip: args.skip.clone(),
            },
            Self::MemberData => MarkerPayload::MemberData {
                member: required("member", &args.member)?,
                declaring_type: args.declaring_type.clone(),
                arguments: args.arguments.clone(),
            },
            Self::ClassData => MarkerPayload::ClassData {
                type_name: required("type_name", &args.type_name)?,
            },
            Self::Collection => MarkerPayload::Collection {
                name: required("name", &args.name)?,
            },
            Self::CollectionDefinition => MarkerPayload::CollectionDefinition {
                name: required("name", &args.name)?,
                fixtures: args.fixtures.clone(),
            },
            Self::Trait => MarkerPayload::Trait {
                name: required("name", &args.name)?,
                value: required("value", &args.value)?,
            },
            Self::Empty => MarkerPayload::Empty,
        };
        Ok(payload)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerDescriptor {
    pub key: String,
    pub inherited: bool,
    pub allow_multiple: bool,
    pub extends: Option<String>,
    pub schema: PayloadSchema,
}

impl MarkerDescriptor {
    /// Inherited, single-instance, no parent.
    pub fn new(key: impl Into<String>, schema: PayloadSchema) -> Self {
        Self {
            key: key.into(),
            inherited: true,
            allow_multiple: false,
            extends: None,
            schema,
        }
    }

    pub fn inherited(mut self, inherited: bool) -> Self {
        self.inherited = inherited;
        self
    }

    pub fn allow_multiple(mut self, allow_multiple: bool) -> Self {
        self.allow_multiple = allow_multiple;
        self
    }

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.extends = Some(parent.into());
        self
    }
}

/// A resolved marker instance with a typed payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub kind: String,
    pub payload: MarkerPayload,
}

/// Maps marker kind keys to their descriptors. Built once at startup.
///
/// A parent kind has to be registered before its children, which keeps the
/// `extends` relation acyclic.
#[derive(Debug, Clone)]
pub struct MarkerRegistry {
    descriptors: HashMap<String, MarkerDescriptor>,
}

impl MarkerRegistry {
    pub fn empty() -> Self {
        Self {
            descriptors: HashMap::new(),
        }
    }

    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for descriptor in builtin_descriptors() {
            registry.insert(descriptor);
        }
        registry
    }

    fn insert(&mut self, descriptor: MarkerDescriptor) {
        self.descriptors.insert(descriptor.key.clone(), descriptor);
    }

    pub fn register(&mut self, descriptor: MarkerDescriptor) -> Result<(), ConfigurationError> {
        if self.descriptors.contains_key(&descriptor.key) {
            return Err(ConfigurationError::duplicate_marker_kind(&descriptor.key));
        }
        if let Some(parent) = &descriptor.extends {
            if !self.descriptors.contains_key(parent) {
                return Err(ConfigurationError::unknown_parent_kind(
                    &descriptor.key,
                    parent,
                ));
            }
        }
        self.insert(descriptor);
        Ok(())
    }

    pub fn get(&self, kind: &str) -> Result<&MarkerDescriptor, ConfigurationError> {
        self.descriptors
            .get(kind)
            .ok_or_else(|| ConfigurationError::unknown_marker_kind(kind))
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.descriptors.contains_key(kind)
    }

    /// True when `kind` is `ancestor` or transitively extends it.
    pub fn is_kind_of(&self, kind: &str, ancestor: &str) -> bool {
        let mut current = Some(kind);
        for _ in 0..=self.descriptors.len() {
            match current {
                Some(k) if k == ancestor => return true,
                Some(k) => {
                    current = self
                        .descriptors
                        .get(k)
                        .and_then(|d| d.extends.as_deref());
                }
                None => return false,
            }
        }
        false
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl Default for MarkerRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn builtin_descriptors() -> Vec<MarkerDescriptor> {
    vec![
        MarkerDescriptor::new(kinds::FACT, PayloadSchema::Test),
        MarkerDescriptor::new(kinds::THEORY, PayloadSchema::Test).extends(kinds::FACT),
        MarkerDescriptor::new(kinds::DATA, PayloadSchema::Empty).allow_multiple(true),
        MarkerDescriptor::new(kinds::INLINE_DATA, PayloadSchema::InlineData)
            .allow_multiple(true)
            .extends(kinds::DATA),
        MarkerDescriptor::new(kinds::MEMBER_DATA, PayloadSchema::MemberData)
            .allow_multiple(true)
            .extends(kinds::DATA),
        MarkerDescriptor::new(kinds::CLASS_DATA, PayloadSchema::ClassData)
            .allow_multiple(true)
            .extends(kinds::DATA),
        MarkerDescriptor::new(kinds::COLLECTION, PayloadSchema::Collection),
        MarkerDescriptor::new(
            kinds::COLLECTION_DEFINITION,
            PayloadSchema::CollectionDefinition,
        )
        .inherited(false),
        MarkerDescriptor::new(kinds::TRAIT, PayloadSchema::Trait).allow_multiple(true),
    ]
}
