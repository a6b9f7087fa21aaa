use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use super::data::{CursorStep, DataCursor, DataSource, DataSourceRegistry};
use super::format::format_arguments;
use crate::cancel::CancellationToken;
use crate::config::DiscoveryOptions;
use crate::error::{ConfigurationError, DiscoveryError};
use crate::markers::{kinds, AttributeResolver, Marker, MarkerPayload};
use crate::metadata::{MethodRef, TestAssembly};
use crate::model::{TestCase, TestMethod};
use crate::serialization::encode_row;

/// What the test markers on a method declare.
#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    /// No Fact-derived marker.
    NotATest,
    /// A declaration that cannot run; reported as an error case.
    Invalid { display_base: String, message: String },
    Test(TestDeclaration),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestDeclaration {
    pub marker: Marker,
    pub is_theory: bool,
    pub skip: Option<String>,
    pub display_base: String,
}

/// Result of expanding one method.
#[derive(Debug)]
pub enum Expansion {
    Cases(Vec<TestCase>),
    Cancelled,
}

/// Turns test methods into concrete cases, enumerating theory data lazily.
#[derive(Debug, Clone)]
pub struct TheoryExpander {
    attributes: AttributeResolver,
    data: Arc<DataSourceRegistry>,
}

impl TheoryExpander {
    pub fn new(attributes: AttributeResolver, data: Arc<DataSourceRegistry>) -> Self {
        Self { attributes, data }
    }

    /// Classifies the Fact-derived markers on a method.
    pub fn declaration(
        &self,
        assembly: &TestAssembly,
        method_ref: MethodRef,
        type_name: &str,
        options: &DiscoveryOptions,
    ) -> Result<Declaration, ConfigurationError> {
        let info = assembly.method(method_ref);
        let mut markers = self
            .attributes
            .resolve_method(assembly, method_ref, kinds::FACT)?;
        let default_base = options.method_display.base(type_name, &info.name);

        if markers.len() > 1 {
            let names: Vec<&str> = markers.iter().map(|m| m.kind.as_str()).collect();
            return Ok(Declaration::Invalid {
                display_base: default_base,
                message: format!(
                    "Test method '{type_name}.{}' has multiple test markers: {}",
                    info.name,
                    names.join(", ")
                ),
            });
        }
        let Some(marker) = markers.pop() else {
            return Ok(Declaration::NotATest);
        };

        let (skip, display_name) = match &marker.payload {
            MarkerPayload::Test { skip, display_name } => (skip.clone(), display_name.clone()),
            _ => (None, None),
        };
        let display_base = display_name.unwrap_or(default_base);
        let is_theory = self
            .attributes
            .registry()
            .is_kind_of(&marker.kind, kinds::THEORY);

        if !is_theory && !info.parameters.is_empty() {
            return Ok(Declaration::Invalid {
                display_base,
                message: format!(
                    "Fact method '{type_name}.{}' cannot have parameters; declare it as a Theory",
                    info.name
                ),
            });
        }

        Ok(Declaration::Test(TestDeclaration {
            marker,
            is_theory,
            skip,
            display_base,
        }))
    }

    /// Expands a method into its cases. Returns no cases for methods that
    /// are not tests.
    pub fn expand(
        &self,
        assembly: &TestAssembly,
        method_ref: MethodRef,
        method: &Arc<TestMethod>,
        options: &DiscoveryOptions,
        cancel: &CancellationToken,
    ) -> Result<Expansion, ConfigurationError> {
        let type_name = method.class().type_name();
        let declaration = match self.declaration(assembly, method_ref, type_name, options)? {
            Declaration::NotATest => return Ok(Expansion::Cases(Vec::new())),
            Declaration::Invalid {
                display_base,
                message,
            } => {
                debug!(method = %method.name(), %message, "invalid test declaration");
                return Ok(Expansion::Cases(vec![TestCase::error(
                    method.clone(),
                    display_base,
                    message,
                )]));
            }
            Declaration::Test(declaration) => declaration,
        };

        if !declaration.is_theory {
            return Ok(Expansion::Cases(vec![TestCase::fact(
                method.clone(),
                declaration.display_base,
                declaration.skip,
            )]));
        }

        let whole = |skip: Option<String>| {
            Ok(Expansion::Cases(vec![TestCase::deferred(
                method.clone(),
                declaration.display_base.clone(),
                None,
                skip,
            )]))
        };
        if declaration.skip.is_some() || !options.pre_enumerate_theories {
            return whole(declaration.skip.clone());
        }

        let data_markers = self
            .attributes
            .resolve_method(assembly, method_ref, kinds::DATA)?;
        if data_markers.is_empty() {
            trace!(method = %method.name(), "theory has no data markers");
            return whole(None);
        }

        let parameters = &assembly.method(method_ref).parameters;
        let mut cases = Vec::new();
        let mut seen = HashSet::new();

        for (index, marker) in data_markers.iter().enumerate() {
            let Some(source) = DataSource::from_payload(&marker.payload, type_name) else {
                trace!(kind = %marker.kind, "data marker carries no rows");
                continue;
            };
            let mut cursor = match DataCursor::open(&source, assembly, &self.data, cancel) {
                Ok(cursor) => cursor,
                Err(err) => return Ok(Expansion::Cases(vec![self.failure(method, &declaration, err)])),
            };

            let mut rows = Vec::new();
            let mut degraded = false;
            loop {
                match cursor.next_row() {
                    CursorStep::Row(row) => match encode_row(&row.values) {
                        Ok(payload) => {
                            let display =
                                format_arguments(&declaration.display_base, parameters, &row.values);
                            rows.push(TestCase::row(
                                method.clone(),
                                display,
                                row.values,
                                payload,
                                row.skip,
                            ));
                        }
                        Err(err) => {
                            debug!(
                                method = %method.name(),
                                source = %cursor.name(),
                                error = %err,
                                "data source is not serializable; deferring it to execution"
                            );
                            degraded = true;
                            break;
                        }
                    },
                    CursorStep::Failed(err) => {
                        return Ok(Expansion::Cases(vec![self.failure(method, &declaration, err)]))
                    }
                    CursorStep::Cancelled => return Ok(Expansion::Cancelled),
                    CursorStep::Exhausted => break,
                }
            }

            if degraded {
                cases.push(TestCase::deferred(
                    method.clone(),
                    declaration.display_base.clone(),
                    Some(index),
                    None,
                ));
                continue;
            }
            for case in rows {
                if seen.insert(case.unique_id().clone()) {
                    cases.push(case);
                } else {
                    warn!(
                        method = %method.name(),
                        display_name = %case.display_name(),
                        "skipping duplicate theory data row"
                    );
                }
            }
        }

        if cases.is_empty() {
            trace!(method = %method.name(), "theory produced no rows");
            return whole(None);
        }
        Ok(Expansion::Cases(cases))
    }

    fn failure(
        &self,
        method: &Arc<TestMethod>,
        declaration: &TestDeclaration,
        err: DiscoveryError,
    ) -> TestCase {
        warn!(method = %method.name(), error = %err, "theory data enumeration failed");
        TestCase::error(
            method.clone(),
            declaration.display_base.clone(),
            format!("Exception during discovery:\n{err}"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MethodDisplay;
    use crate::markers::MarkerRegistry;
    use crate::metadata::{
        ArgValue, AssemblyDescription, MarkerUsage, MemberInfo, MethodInfo, TypeInfo, TypeRef,
    };
    use crate::model::{CaseKind, TestClass, TestCollection};
    use crate::theory::{DataRow, DataRows};
    use pretty_assertions::assert_eq;

    fn expander(data: DataSourceRegistry) -> TheoryExpander {
        TheoryExpander::new(
            AttributeResolver::new(Arc::new(MarkerRegistry::builtin())),
            Arc::new(data),
        )
    }

    fn inline(values: Vec<ArgValue>) -> MarkerUsage {
        MarkerUsage::new(kinds::INLINE_DATA).with_values(values)
    }

    fn expand_with(
        method: MethodInfo,
        data: DataSourceRegistry,
        options: &DiscoveryOptions,
        cancel: &CancellationToken,
    ) -> Expansion {
        let description = AssemblyDescription::new("Tests").with_type(
            TypeInfo::new("Tests.Math")
                .with_method(method)
                .with_member(MemberInfo::new("Numbers", vec![vec![1.into()], vec![2.into()]]))
                .with_member(MemberInfo::new(
                    "Widgets",
                    vec![vec![1.into()], vec![ArgValue::object("Tests.Widget")]],
                )),
        );
        let assembly = TestAssembly::new(description).unwrap();
        let collection = Arc::new(TestCollection::new("Test collection for Tests.Math", None));
        let class = Arc::new(TestClass::new("Tests.Math", collection));
        let method_ref = MethodRef {
            type_index: 0,
            method_index: 0,
        };
        let method = Arc::new(TestMethod::new(
            assembly.method(method_ref).name.clone(),
            class,
        ));
        expander(data)
            .expand(&assembly, method_ref, &method, options, cancel)
            .unwrap()
    }

    fn expand(method: MethodInfo) -> Vec<TestCase> {
        match expand_with(
            method,
            DataSourceRegistry::new(),
            &DiscoveryOptions::default(),
            &CancellationToken::new(),
        ) {
            Expansion::Cases(cases) => cases,
            Expansion::Cancelled => panic!("unexpected cancellation"),
        }
    }

    fn theory(name: &str) -> MethodInfo {
        MethodInfo::new(name)
            .with_parameter("value", TypeRef::named("int"))
            .with_marker(MarkerUsage::new(kinds::THEORY))
    }

    #[test]
    fn test_plain_method_is_not_a_test() {
        assert!(expand(MethodInfo::new("Helper")).is_empty());
    }

    #[test]
    fn test_fact_yields_single_case() {
        let cases = expand(MethodInfo::new("Adds").with_marker(MarkerUsage::new(kinds::FACT)));
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].kind(), CaseKind::Fact);
        assert_eq!(cases[0].display_name(), "Tests.Math.Adds");
        assert_eq!(cases[0].payload(), None);
    }

    #[test]
    fn test_fact_display_name_override_and_skip() {
        let cases = expand(
            MethodInfo::new("Adds").with_marker(
                MarkerUsage::new(kinds::FACT)
                    .with_display_name("Adding works")
                    .with_skip("not today"),
            ),
        );
        assert_eq!(cases[0].display_name(), "Adding works");
        assert_eq!(cases[0].skip_reason(), Some("not today"));
    }

    #[test]
    fn test_two_inline_rows_with_method_display() {
        let method = theory("Test")
            .with_marker(inline(vec![42.into()]))
            .with_marker(inline(vec![7.into()]));
        let options = DiscoveryOptions {
            method_display: MethodDisplay::Method,
            ..DiscoveryOptions::default()
        };
        let cases = match expand_with(
            method,
            DataSourceRegistry::new(),
            &options,
            &CancellationToken::new(),
        ) {
            Expansion::Cases(cases) => cases,
            Expansion::Cancelled => panic!("unexpected cancellation"),
        };
        let names: Vec<_> = cases.iter().map(|c| c.display_name()).collect();
        assert_eq!(names, vec!["Test(value: 42)", "Test(value: 7)"]);
        assert_ne!(cases[0].unique_id(), cases[1].unique_id());
        assert!(cases.iter().all(|c| c.payload().is_some()));
    }

    #[test]
    fn test_duplicate_rows_dropped() {
        let method = theory("Test")
            .with_marker(inline(vec![1.into()]))
            .with_marker(inline(vec![1.into()]));
        assert_eq!(expand(method).len(), 1);
    }

    #[test]
    fn test_object_rows_degrade_whole_source() {
        let method = theory("Test")
            .with_marker(MarkerUsage::new(kinds::MEMBER_DATA).with_member("Widgets"));
        let cases = expand(method);
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].kind(), CaseKind::Theory);
        assert_eq!(cases[0].display_name(), "Tests.Math.Test");
        assert_eq!(cases[0].payload(), None);
        assert_eq!(cases[0].source_index(), Some(0));
    }

    #[test]
    fn test_degradation_keeps_other_sources() {
        let method = theory("Test")
            .with_marker(MarkerUsage::new(kinds::MEMBER_DATA).with_member("Widgets"))
            .with_marker(MarkerUsage::new(kinds::MEMBER_DATA).with_member("Numbers"));
        let kinds: Vec<_> = expand(method).iter().map(|c| c.kind()).collect();
        assert_eq!(kinds, vec![CaseKind::Theory, CaseKind::Row, CaseKind::Row]);
    }

    #[test]
    fn test_missing_member_becomes_error_case() {
        let method = theory("Test")
            .with_marker(inline(vec![1.into()]))
            .with_marker(MarkerUsage::new(kinds::MEMBER_DATA).with_member("Missing"));
        let cases = expand(method);
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].kind(), CaseKind::Error);
        assert!(cases[0]
            .error_message()
            .unwrap()
            .starts_with("Exception during discovery:\n"));
    }

    #[test]
    fn test_theory_without_data_is_deferred() {
        let cases = expand(theory("Test"));
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].kind(), CaseKind::Theory);
        assert_eq!(cases[0].source_index(), None);
    }

    #[test]
    fn test_skipped_theory_not_enumerated() {
        let method = MethodInfo::new("Test")
            .with_parameter("value", TypeRef::named("int"))
            .with_marker(MarkerUsage::new(kinds::THEORY).with_skip("slow"))
            .with_marker(inline(vec![1.into()]));
        let cases = expand(method);
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].kind(), CaseKind::Theory);
        assert_eq!(cases[0].skip_reason(), Some("slow"));
    }

    #[test]
    fn test_skipped_row_keeps_its_case() {
        let method = theory("Test")
            .with_marker(inline(vec![1.into()]).with_skip("broken"))
            .with_marker(inline(vec![2.into()]));
        let cases = expand(method);
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].skip_reason(), Some("broken"));
        assert_eq!(cases[1].skip_reason(), None);
    }

    #[test]
    fn test_fact_with_parameters_is_invalid() {
        let method = MethodInfo::new("Adds")
            .with_parameter("x", TypeRef::named("int"))
            .with_marker(MarkerUsage::new(kinds::FACT));
        let cases = expand(method);
        assert_eq!(cases[0].kind(), CaseKind::Error);
    }

    #[test]
    fn test_multiple_test_markers_is_invalid() {
        let method = theory("Test").with_marker(MarkerUsage::new(kinds::FACT));
        let cases = expand(method);
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].kind(), CaseKind::Error);
        assert!(cases[0].error_message().unwrap().contains("Fact, Theory"));
    }

    #[test]
    fn test_pre_enumeration_disabled() {
        let method = theory("Test").with_marker(inline(vec![1.into()]));
        let options = DiscoveryOptions {
            pre_enumerate_theories: false,
            ..DiscoveryOptions::default()
        };
        match expand_with(method, DataSourceRegistry::new(), &options, &CancellationToken::new()) {
            Expansion::Cases(cases) => {
                assert_eq!(cases.len(), 1);
                assert_eq!(cases[0].kind(), CaseKind::Theory);
            }
            Expansion::Cancelled => panic!("unexpected cancellation"),
        }
    }

    #[test]
    fn test_cancelled_enumeration() {
        let mut data = DataSourceRegistry::new();
        data.register_class(
            "Tests.Endless",
            |_: &[ArgValue], _: &CancellationToken| -> Result<DataRows, DiscoveryError> {
                Ok(Box::new((0i64..).map(|i| Ok(DataRow::new(vec![i.into()])))))
            },
        );
        let method = theory("Test")
            .with_marker(MarkerUsage::new(kinds::CLASS_DATA).with_type_name("Tests.Endless"));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let expansion = expand_with(method, data, &DiscoveryOptions::default(), &cancel);
        assert!(matches!(expansion, Expansion::Cancelled));
    }
}
