use std::sync::Arc;
use tracing::trace;

use super::{Marker, MarkerRegistry};
use crate::error::ConfigurationError;
use crate::metadata::{MarkerUsage, MethodRef, TestAssembly};

/// Resolves the markers that apply to a method or type, honoring the
/// inheritance and multiplicity flags of the requested kind.
#[derive(Debug, Clone)]
pub struct AttributeResolver {
    registry: Arc<MarkerRegistry>,
}

impl AttributeResolver {
    pub fn new(registry: Arc<MarkerRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &MarkerRegistry {
        &self.registry
    }

    /// Markers of `kind` on `method`, followed by those inherited through the
    /// override chain.
    ///
    /// Walking continues only while the kind is inherited and either allows
    /// multiple instances or nothing has been found at the current level. The
    /// walk follows the precomputed override graph, so it visits at most one
    /// method per ancestor type.
    pub fn resolve_method(
        &self,
        assembly: &TestAssembly,
        method: MethodRef,
        kind: &str,
    ) -> Result<Vec<Marker>, ConfigurationError> {
        let descriptor = self.registry.get(kind)?;
        let mut results = Vec::new();
        let mut current = method;

        for _ in 0..=assembly.types().len() {
            let info = assembly.method(current);
            let direct = self.direct_markers(&info.markers, kind)?;
            let found = !direct.is_empty();
            results.extend(direct);

            if !descriptor.inherited || (found && !descriptor.allow_multiple) {
                break;
            }
            if !info.is_overridable {
                break;
            }
            match assembly.overridden(current) {
                Some(ancestor) => {
                    trace!(
                        kind,
                        method = %info.name,
                        from = %assembly.declaring_type(current).name,
                        to = %assembly.declaring_type(ancestor).name,
                        "walking override chain"
                    );
                    current = ancestor;
                }
                None => break,
            }
        }

        Ok(results)
    }

    /// Markers of `kind` on a type, followed by those inherited from base
    /// types under the same rules as [`Self::resolve_method`].
    pub fn resolve_type(
        &self,
        assembly: &TestAssembly,
        type_index: usize,
        kind: &str,
    ) -> Result<Vec<Marker>, ConfigurationError> {
        let descriptor = self.registry.get(kind)?;
        let mut results = Vec::new();

        let chain = std::iter::once(type_index).chain(assembly.ancestors(type_index));
        for index in chain {
            let direct = self.direct_markers(&assembly.type_at(index).markers, kind)?;
            let found = !direct.is_empty();
            results.extend(direct);

            if !descriptor.inherited || (found && !descriptor.allow_multiple) {
                break;
            }
        }

        Ok(results)
    }

    /// Markers declared directly in `usages` whose kind is, or extends,
    /// `kind`. Several matches are ordered by kind name; matches of the same
    /// kind keep declaration order.
    fn direct_markers(
        &self,
        usages: &[MarkerUsage],
        kind: &str,
    ) -> Result<Vec<Marker>, ConfigurationError> {
        let mut markers = Vec::new();
        for usage in usages {
            let Ok(descriptor) = self.registry.get(&usage.kind) else {
                trace!(kind = %usage.kind, "ignoring unregistered marker");
                continue;
            };
            if !self.registry.is_kind_of(&usage.kind, kind) {
                continue;
            }
            markers.push(Marker {
                kind: usage.kind.clone(),
                payload: descriptor.schema.bind(&usage.kind, &usage.args)?,
            });
        }
        if markers.len() > 1 {
            markers.sort_by(|a, b| a.kind.cmp(&b.kind));
        }
        Ok(markers)
    }
}
