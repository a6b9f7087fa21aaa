use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use super::{MethodInfo, TypeInfo, Visibility};
use crate::error::LoadError;
use crate::identity::{self, UniqueId};
use crate::markers::kinds;

/// Serialized form of a unit under test.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssemblyDescription {
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub config: Option<String>,
    #[serde(default)]
    pub types: Vec<TypeInfo>,
}

impl AssemblyDescription {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_config(mut self, config: impl Into<String>) -> Self {
        self.config = Some(config.into());
        self
    }

    pub fn with_type(mut self, type_info: TypeInfo) -> Self {
        self.types.push(type_info);
        self
    }
}

/// Addresses one method by position: `types[type_index].methods[method_index]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodRef {
    pub type_index: usize,
    pub method_index: usize,
}

/// A validated, indexed unit under test.
///
/// The inheritance graph is checked for unknown bases and cycles once, here,
/// so every later walk over base types terminates within `types.len()` steps.
/// The override graph maps each overridable method to the nearest ancestor
/// method it overrides, skipping ancestors that do not redeclare it.
#[derive(Debug)]
pub struct TestAssembly {
    name: String,
    path: String,
    config: Option<String>,
    unique_id: UniqueId,
    types: Vec<TypeInfo>,
    type_index: HashMap<String, usize>,
    bases: Vec<Option<usize>>,
    overrides: Vec<Vec<Option<MethodRef>>>,
    definitions: HashMap<String, Vec<usize>>,
}

impl TestAssembly {
    pub fn new(description: AssemblyDescription) -> Result<Self, LoadError> {
        let AssemblyDescription {
            name,
            path,
            config,
            types,
        } = description;
        let path = path.unwrap_or_default();

        let mut type_index = HashMap::with_capacity(types.len());
        for (index, type_info) in types.iter().enumerate() {
            if type_index.insert(type_info.name.clone(), index).is_some() {
                return Err(LoadError::duplicate_type(&type_info.name));
            }
        }

        let bases = types
            .iter()
            .map(|t| match &t.base {
                None => Ok(None),
                Some(base) => type_index
                    .get(base)
                    .copied()
                    .map(Some)
                    .ok_or_else(|| LoadError::unknown_base_type(&t.name, base)),
            })
            .collect::<Result<Vec<_>, _>>()?;

        check_acyclic(&types, &bases)?;

        let overrides = build_override_graph(&types, &bases);
        let definitions = index_definitions(&types);
        let unique_id = identity::assembly_id(&name, &path, config.as_deref());

        debug!(
            assembly = %name,
            types = types.len(),
            definitions = definitions.len(),
            "indexed unit under test"
        );

        Ok(Self {
            name,
            path,
            config,
            unique_id,
            types,
            type_index,
            bases,
            overrides,
            definitions,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn config(&self) -> Option<&str> {
        self.config.as_deref()
    }

    pub fn unique_id(&self) -> &UniqueId {
        &self.unique_id
    }

    pub fn types(&self) -> &[TypeInfo] {
        &self.types
    }

    pub fn type_at(&self, index: usize) -> &TypeInfo {
        &self.types[index]
    }

    pub fn type_index_of(&self, name: &str) -> Option<usize> {
        self.type_index.get(name).copied()
    }

    pub fn find_type(&self, name: &str) -> Option<&TypeInfo> {
        self.type_index_of(name).map(|i| &self.types[i])
    }

    pub fn method(&self, method: MethodRef) -> &MethodInfo {
        &self.types[method.type_index].methods[method.method_index]
    }

    pub fn declaring_type(&self, method: MethodRef) -> &TypeInfo {
        &self.types[method.type_index]
    }

    pub fn base_index(&self, type_index: usize) -> Option<usize> {
        self.bases[type_index]
    }

    /// Base types from nearest to root.
    pub fn ancestors(&self, type_index: usize) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(self.bases[type_index], move |&i| self.bases[i])
    }

    /// The nearest overridable ancestor method `method` overrides, if any.
    pub fn overridden(&self, method: MethodRef) -> Option<MethodRef> {
        self.overrides[method.type_index][method.method_index]
    }

    /// Methods visible on a type: its own methods followed by inherited public
    /// methods that no nearer type redeclares. Private methods of the type
    /// itself are included only when `include_private` is set.
    pub fn candidate_methods(&self, type_index: usize, include_private: bool) -> Vec<MethodRef> {
        let own = &self.types[type_index];
        let mut selected: Vec<MethodRef> = own
            .methods
            .iter()
            .enumerate()
            .filter(|(_, m)| include_private || m.visibility == Visibility::Public)
            .map(|(method_index, _)| MethodRef {
                type_index,
                method_index,
            })
            .collect();

        let mut seen: Vec<&MethodInfo> = own.methods.iter().collect();
        for ancestor in self.ancestors(type_index) {
            let ancestor_methods = &self.types[ancestor].methods;
            for (method_index, method) in ancestor_methods.iter().enumerate() {
                if method.visibility != Visibility::Public {
                    continue;
                }
                if seen.iter().any(|s| s.same_signature(method)) {
                    continue;
                }
                selected.push(MethodRef {
                    type_index: ancestor,
                    method_index,
                });
            }
            seen.extend(ancestor_methods.iter());
        }

        selected
    }

    pub fn find_method(&self, type_index: usize, name: &str) -> Option<MethodRef> {
        self.candidate_methods(type_index, true)
            .into_iter()
            .find(|r| self.method(*r).name == name)
    }

    /// Types declaring a collection definition with the given name, ordered by
    /// type name.
    pub fn collection_definitions<'a>(
        &'a self,
        name: &str,
    ) -> impl Iterator<Item = &'a TypeInfo> + 'a {
        self.definitions
            .get(name)
            .map(|indices| indices.as_slice())
            .unwrap_or_default()
            .iter()
            .map(move |&i| &self.types[i])
    }
}

fn check_acyclic(types: &[TypeInfo], bases: &[Option<usize>]) -> Result<(), LoadError> {
    for (start, type_info) in types.iter().enumerate() {
        let mut steps = 0;
        let mut current = bases[start];
        while let Some(index) = current {
            steps += 1;
            if steps > types.len() {
                return Err(LoadError::inheritance_cycle(&type_info.name));
            }
            current = bases[index];
        }
    }
    Ok(())
}

fn build_override_graph(types: &[TypeInfo], bases: &[Option<usize>]) -> Vec<Vec<Option<MethodRef>>> {
    types
        .iter()
        .enumerate()
        .map(|(type_index, type_info)| {
            type_info
                .methods
                .iter()
                .map(|method| {
                    if !method.is_overridable {
                        return None;
                    }
                    let mut current = bases[type_index];
                    while let Some(ancestor) = current {
                        let found = types[ancestor]
                            .methods
                            .iter()
                            .position(|m| m.is_overridable && m.same_signature(method));
                        if let Some(method_index) = found {
                            return Some(MethodRef {
                                type_index: ancestor,
                                method_index,
                            });
                        }
                        current = bases[ancestor];
                    }
                    None
                })
                .collect()
        })
        .collect()
}

fn index_definitions(types: &[TypeInfo]) -> HashMap<String, Vec<usize>> {
    let mut definitions: HashMap<String, Vec<usize>> = HashMap::new();
    for (index, type_info) in types.iter().enumerate() {
        for usage in &type_info.markers {
            if usage.kind != kinds::COLLECTION_DEFINITION {
                continue;
            }
            if let Some(name) = &usage.args.name {
                definitions.entry(name.clone()).or_default().push(index);
            }
        }
    }
    for indices in definitions.values_mut() {
        indices.sort_by(|a, b| types[*a].name.cmp(&types[*b].name));
        indices.dedup();
    }
    definitions
}
