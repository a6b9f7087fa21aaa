use std::sync::Arc;
use tracing::debug;

use super::Discoverer;
use crate::config::DiscoveryOptions;
use crate::error::RehydrateError;
use crate::metadata::TestAssembly;
use crate::model::{CaseKind, TestCase, TestClass, TestMethod};
use crate::serialization::CaseRecord;
use crate::theory::{format_arguments, Declaration};

impl Discoverer {
    /// Rebuilds a case from its serialized record against `assembly`.
    ///
    /// Collection, class and method are resolved again through the same
    /// resolvers discovery uses, so the rebuilt case has the same unique ID
    /// and its entities compare equal to the originals.
    pub fn rehydrate(
        &self,
        assembly: &TestAssembly,
        record: &str,
        options: &DiscoveryOptions,
    ) -> Result<TestCase, RehydrateError> {
        let record = CaseRecord::parse(record)?;
        let type_index = assembly
            .type_index_of(&record.type_name)
            .ok_or_else(|| RehydrateError::type_not_found(assembly.name(), &record.type_name))?;
        let method_ref = assembly
            .find_method(type_index, &record.method_name)
            .ok_or_else(|| RehydrateError::method_not_found(&record.type_name, &record.method_name))?;

        let collection = self.collections(options).resolve(assembly, type_index)?;
        let class = Arc::new(TestClass::new(record.type_name.clone(), collection));
        let method = Arc::new(TestMethod::new(record.method_name.clone(), class));

        let declaration =
            self.expander()
                .declaration(assembly, method_ref, &record.type_name, options)?;
        let (display_base, skip) = match declaration {
            Declaration::Test(test) => (test.display_base, test.skip),
            Declaration::Invalid { display_base, .. } => (display_base, None),
            Declaration::NotATest => (
                options
                    .method_display
                    .base(&record.type_name, &record.method_name),
                None,
            ),
        };

        let case = match record.kind {
            CaseKind::Fact => TestCase::fact(method, display_base, skip),
            CaseKind::Theory => {
                let source_index = record.source_index()?;
                let skip = if source_index.is_none() { skip } else { None };
                TestCase::deferred(method, display_base, source_index, skip)
            }
            CaseKind::Row => {
                let row = record.row()?;
                let parameters = &assembly.method(method_ref).parameters;
                let display = format_arguments(&display_base, parameters, &row.arguments);
                TestCase::row(method, display, row.arguments, row.payload, row.skip_reason)
            }
            CaseKind::Error => TestCase::error(method, display_base, record.discriminant.clone()),
        };

        let class_traits = self.inner.type_traits(assembly, type_index)?;
        let traits = self
            .inner
            .method_traits(assembly, method_ref, &class_traits)?;
        let mut provider_source = None;
        let case = self
            .inner
            .enrich(case, assembly, method_ref, options, &traits, &mut provider_source);
        debug!(unique_id = %case.unique_id(), kind = case.kind().as_str(), "rehydrated case");
        Ok(case)
    }
}
