use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::CollectionBehavior;
use crate::error::ConfigurationError;
use crate::markers::{kinds, AttributeResolver, MarkerPayload};
use crate::metadata::TestAssembly;
use crate::model::{CollectionDefinition, TestCollection};

/// Looks up collection definition types declared in a unit under test.
pub trait CollectionDefinitionLookup {
    fn find_definition(&self, name: &str) -> Option<CollectionDefinition>;
}

impl CollectionDefinitionLookup for TestAssembly {
    fn find_definition(&self, name: &str) -> Option<CollectionDefinition> {
        let mut matches = self.collection_definitions(name);
        let first = matches.next()?;
        let others: Vec<&str> = matches.map(|t| t.name.as_str()).collect();
        if !others.is_empty() {
            warn!(
                collection = name,
                chosen = %first.name,
                ignored = ?others,
                "multiple collection definitions share a name"
            );
        }

        let fixtures = first
            .markers
            .iter()
            .filter(|m| m.kind == kinds::COLLECTION_DEFINITION && m.args.name.as_deref() == Some(name))
            .flat_map(|m| m.args.fixtures.iter().cloned())
            .collect();

        Some(CollectionDefinition {
            type_name: first.name.clone(),
            name: name.to_string(),
            fixtures,
        })
    }
}

/// Display name of the collection a class gets when it declares none.
pub fn default_collection_name(scope: &str) -> String {
    format!("Test collection for {scope}")
}

/// Maps test classes onto the collection that owns them.
#[derive(Debug, Clone)]
pub struct CollectionResolver {
    attributes: AttributeResolver,
    behavior: CollectionBehavior,
}

impl CollectionResolver {
    pub fn new(attributes: AttributeResolver, behavior: CollectionBehavior) -> Self {
        Self {
            attributes,
            behavior,
        }
    }

    pub fn behavior(&self) -> CollectionBehavior {
        self.behavior
    }

    /// Resolves the collection of the type at `type_index`.
    ///
    /// An explicit `Collection` marker on the class or one of its bases
    /// names the collection; its definition is looked up in the assembly. A
    /// missing definition only produces a warning.
    pub fn resolve(
        &self,
        assembly: &TestAssembly,
        type_index: usize,
    ) -> Result<Arc<TestCollection>, ConfigurationError> {
        let type_info = assembly.type_at(type_index);
        let explicit = self
            .attributes
            .resolve_type(assembly, type_index, kinds::COLLECTION)?
            .into_iter()
            .find_map(|marker| match marker.payload {
                MarkerPayload::Collection { name } => Some(name),
                _ => None,
            });

        let collection = match explicit {
            Some(name) => {
                let definition = assembly.find_definition(&name);
                if definition.is_none() {
                    warn!(
                        class = %type_info.name,
                        collection = %name,
                        "no collection definition found; using an undefined collection"
                    );
                }
                TestCollection::new(name, definition)
            }
            None => {
                let scope = match self.behavior {
                    CollectionBehavior::PerClass => type_info.name.as_str(),
                    CollectionBehavior::PerAssembly => assembly.name(),
                };
                TestCollection::new(default_collection_name(scope), None)
            }
        };

        debug!(
            class = %type_info.name,
            collection = %collection.display_name(),
            behavior = self.behavior.as_str(),
            "resolved collection"
        );
        Ok(Arc::new(collection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markers::MarkerRegistry;
    use crate::metadata::{AssemblyDescription, MarkerUsage, TypeInfo};

    fn resolver(behavior: CollectionBehavior) -> CollectionResolver {
        let attributes = AttributeResolver::new(Arc::new(MarkerRegistry::builtin()));
        CollectionResolver::new(attributes, behavior)
    }

    fn collection_marker(name: &str) -> MarkerUsage {
        MarkerUsage::new(kinds::COLLECTION).with_name(name)
    }

    fn assembly() -> TestAssembly {
        let description = AssemblyDescription::new("Tests")
            .with_type(TypeInfo::new("Tests.Alpha"))
            .with_type(TypeInfo::new("Tests.Beta"))
            .with_type(TypeInfo::new("Tests.Db1").with_marker(collection_marker("Database")))
            .with_type(TypeInfo::new("Tests.Db2").with_marker(collection_marker("Database")))
            .with_type(TypeInfo::new("Tests.Orphan").with_marker(collection_marker("Nowhere")))
            .with_type(
                TypeInfo::new("Tests.DatabaseCollection").with_marker(
                    MarkerUsage::new(kinds::COLLECTION_DEFINITION)
                        .with_name("Database")
                        .with_fixture("Tests.DatabaseFixture"),
                ),
            );
        TestAssembly::new(description).unwrap()
    }

    fn resolve(resolver: &CollectionResolver, assembly: &TestAssembly, name: &str) -> Arc<TestCollection> {
        let index = assembly.type_index_of(name).unwrap();
        resolver.resolve(assembly, index).unwrap()
    }

    #[test]
    fn test_default_collections_are_isolated() {
        let assembly = assembly();
        let resolver = resolver(CollectionBehavior::PerClass);
        let alpha = resolve(&resolver, &assembly, "Tests.Alpha");
        let beta = resolve(&resolver, &assembly, "Tests.Beta");
        assert_ne!(alpha, beta);
        assert_eq!(alpha.display_name(), "Test collection for Tests.Alpha");
        assert!(alpha.definition().is_none());
    }

    #[test]
    fn test_per_assembly_default_collection_is_shared() {
        let assembly = assembly();
        let resolver = resolver(CollectionBehavior::PerAssembly);
        let alpha = resolve(&resolver, &assembly, "Tests.Alpha");
        let beta = resolve(&resolver, &assembly, "Tests.Beta");
        assert_eq!(alpha, beta);
        assert_eq!(alpha.display_name(), "Test collection for Tests");
    }

    #[test]
    fn test_explicit_collection_shared_across_calls() {
        let assembly = assembly();
        let resolver = resolver(CollectionBehavior::PerClass);
        let first = resolve(&resolver, &assembly, "Tests.Db1");
        let second = resolve(&resolver, &assembly, "Tests.Db2");
        assert_eq!(first, second);
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first.unique_id(), second.unique_id());
    }

    #[test]
    fn test_explicit_collection_carries_definition() {
        let assembly = assembly();
        let collection = resolve(&resolver(CollectionBehavior::PerClass), &assembly, "Tests.Db1");
        let definition = collection.definition().unwrap();
        assert_eq!(definition.type_name, "Tests.DatabaseCollection");
        assert_eq!(definition.fixtures, vec!["Tests.DatabaseFixture".to_string()]);
    }

    #[test]
    fn test_missing_definition_still_named() {
        let assembly = assembly();
        let collection = resolve(&resolver(CollectionBehavior::PerClass), &assembly, "Tests.Orphan");
        assert_eq!(collection.display_name(), "Nowhere");
        assert!(collection.definition().is_none());
    }

    #[test]
    fn test_first_definition_by_type_name_wins() {
        let definition = |type_name: &str| {
            TypeInfo::new(type_name)
                .with_marker(MarkerUsage::new(kinds::COLLECTION_DEFINITION).with_name("Shared"))
        };
        let description = AssemblyDescription::new("Tests")
            .with_type(definition("Tests.Zulu"))
            .with_type(definition("Tests.Alpha"));
        let assembly = TestAssembly::new(description).unwrap();
        let found = assembly.find_definition("Shared").unwrap();
        assert_eq!(found.type_name, "Tests.Alpha");
    }

    #[test]
    fn test_collection_marker_inherited_from_base() {
        let description = AssemblyDescription::new("Tests")
            .with_type(
                TypeInfo::new("Tests.Base")
                    .abstract_type()
                    .with_marker(collection_marker("Database")),
            )
            .with_type(TypeInfo::new("Tests.Derived").with_base("Tests.Base"));
        let assembly = TestAssembly::new(description).unwrap();
        let collection = resolve(&resolver(CollectionBehavior::PerClass), &assembly, "Tests.Derived");
        assert_eq!(collection.display_name(), "Database");
    }
}
