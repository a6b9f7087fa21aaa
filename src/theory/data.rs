use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::trace;

use crate::cancel::CancellationToken;
use crate::error::DiscoveryError;
use crate::markers::MarkerPayload;
use crate::metadata::{ArgValue, TestAssembly};

/// One argument tuple produced by a data source.
#[derive(Debug, Clone, PartialEq)]
pub struct DataRow {
    pub values: Vec<ArgValue>,
    pub skip: Option<String>,
}

impl DataRow {
    pub fn new(values: Vec<ArgValue>) -> Self {
        Self { values, skip: None }
    }

    pub fn skipped(values: Vec<ArgValue>, reason: impl Into<String>) -> Self {
        Self {
            values,
            skip: Some(reason.into()),
        }
    }
}

/// Lazy sequence of rows. May be unbounded; it is pulled one row at a time.
pub type DataRows = Box<dyn Iterator<Item = Result<DataRow, DiscoveryError>> + Send>;

/// Computes rows for a `MemberData` or `ClassData` source.
///
/// Providers receive the marker's arguments and the session's cancellation
/// token, which long-running providers should poll.
pub trait DataProvider: Send + Sync {
    fn rows(
        &self,
        arguments: &[ArgValue],
        cancel: &CancellationToken,
    ) -> Result<DataRows, DiscoveryError>;
}

impl<F> DataProvider for F
where
    F: Fn(&[ArgValue], &CancellationToken) -> Result<DataRows, DiscoveryError> + Send + Sync,
{
    fn rows(
        &self,
        arguments: &[ArgValue],
        cancel: &CancellationToken,
    ) -> Result<DataRows, DiscoveryError> {
        self(arguments, cancel)
    }
}

/// Programmatic data providers, consulted before metadata members.
#[derive(Default, Clone)]
pub struct DataSourceRegistry {
    members: HashMap<(String, String), Arc<dyn DataProvider>>,
    classes: HashMap<String, Arc<dyn DataProvider>>,
}

impl DataSourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_member(
        &mut self,
        type_name: impl Into<String>,
        member: impl Into<String>,
        provider: impl DataProvider + 'static,
    ) {
        self.members
            .insert((type_name.into(), member.into()), Arc::new(provider));
    }

    pub fn register_class(&mut self, type_name: impl Into<String>, provider: impl DataProvider + 'static) {
        self.classes.insert(type_name.into(), Arc::new(provider));
    }

    fn member(&self, type_name: &str, member: &str) -> Option<&Arc<dyn DataProvider>> {
        self.members.get(&(type_name.to_string(), member.to_string()))
    }

    fn class(&self, type_name: &str) -> Option<&Arc<dyn DataProvider>> {
        self.classes.get(type_name)
    }
}

impl fmt::Debug for DataSourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSourceRegistry")
            .field("members", &self.members.keys().collect::<Vec<_>>())
            .field("classes", &self.classes.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A declared data source of a theory.
#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    Inline {
        values: Vec<ArgValue>,
        skip: Option<String>,
    },
    Member {
        declaring_type: String,
        member: String,
        arguments: Vec<ArgValue>,
    },
    Class {
        type_name: String,
    },
}

impl DataSource {
    /// Builds a source from a data marker payload. Members default to the test
    /// class as declaring type. Returns `None` for payloads that carry no data.
    pub fn from_payload(payload: &MarkerPayload, test_class: &str) -> Option<Self> {
        match payload {
            MarkerPayload::InlineData { values, skip } => Some(Self::Inline {
                values: values.clone(),
                skip: skip.clone(),
            }),
            MarkerPayload::MemberData {
                member,
                declaring_type,
                arguments,
            } => Some(Self::Member {
                declaring_type: declaring_type
                    .clone()
                    .unwrap_or_else(|| test_class.to_string()),
                member: member.clone(),
                arguments: arguments.clone(),
            }),
            MarkerPayload::ClassData { type_name } => Some(Self::Class {
                type_name: type_name.clone(),
            }),
            _ => None,
        }
    }

    pub fn name(&self) -> String {
        match self {
            Self::Inline { .. } => "inline data".to_string(),
            Self::Member {
                declaring_type,
                member,
                ..
            } => format!("{declaring_type}.{member}"),
            Self::Class { type_name } => type_name.clone(),
        }
    }
}

enum CursorRows<'a> {
    Inline(Option<DataRow>),
    Metadata(std::slice::Iter<'a, Vec<ArgValue>>),
    Provided(DataRows),
}

/// Outcome of pulling one row from a cursor.
#[derive(Debug)]
pub enum CursorStep {
    Row(DataRow),
    Failed(DiscoveryError),
    Cancelled,
    Exhausted,
}

/// Pull-based cursor over one data source. Checks cancellation before each
/// pull and isolates provider panics.
pub struct DataCursor<'a> {
    name: String,
    rows: CursorRows<'a>,
    cancel: CancellationToken,
}

impl<'a> DataCursor<'a> {
    pub fn open(
        source: &DataSource,
        assembly: &'a TestAssembly,
        registry: &DataSourceRegistry,
        cancel: &CancellationToken,
    ) -> Result<Self, DiscoveryError> {
        let name = source.name();
        let rows = match source {
            DataSource::Inline { values, skip } => CursorRows::Inline(Some(DataRow {
                values: values.clone(),
                skip: skip.clone(),
            })),
            DataSource::Member {
                declaring_type,
                member,
                arguments,
            } => match registry.member(declaring_type, member) {
                Some(provider) => {
                    trace!(source = %name, "using registered member provider");
                    CursorRows::Provided(call_provider(&name, provider, arguments, cancel)?)
                }
                None => {
                    let info = assembly
                        .find_type(declaring_type)
                        .and_then(|t| t.find_member(member))
                        .ok_or_else(|| DiscoveryError::member_not_found(declaring_type, member))?;
                    if !info.is_static {
                        return Err(DiscoveryError::member_not_static(declaring_type, member));
                    }
                    CursorRows::Metadata(info.rows.iter())
                }
            },
            DataSource::Class { type_name } => {
                let provider = registry
                    .class(type_name)
                    .ok_or_else(|| DiscoveryError::class_data_not_found(type_name))?;
                CursorRows::Provided(call_provider(&name, provider, &[], cancel)?)
            }
        };

        Ok(Self {
            name,
            rows,
            cancel: cancel.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn next_row(&mut self) -> CursorStep {
        if self.cancel.is_cancelled() {
            return CursorStep::Cancelled;
        }
        match &mut self.rows {
            CursorRows::Inline(row) => row.take().map_or(CursorStep::Exhausted, CursorStep::Row),
            CursorRows::Metadata(rows) => rows
                .next()
                .map_or(CursorStep::Exhausted, |values| {
                    CursorStep::Row(DataRow::new(values.clone()))
                }),
            CursorRows::Provided(rows) => match catch_unwind(AssertUnwindSafe(|| rows.next())) {
                Ok(Some(Ok(row))) => CursorStep::Row(row),
                Ok(Some(Err(err))) => CursorStep::Failed(err),
                Ok(None) => CursorStep::Exhausted,
                Err(panic) => CursorStep::Failed(DiscoveryError::panicked(
                    &self.name,
                    panic_message(&*panic),
                )),
            },
        }
    }
}

fn call_provider(
    name: &str,
    provider: &Arc<dyn DataProvider>,
    arguments: &[ArgValue],
    cancel: &CancellationToken,
) -> Result<DataRows, DiscoveryError> {
    catch_unwind(AssertUnwindSafe(|| provider.rows(arguments, cancel)))
        .map_err(|panic| DiscoveryError::panicked(name, panic_message(&*panic)))?
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{AssemblyDescription, MemberInfo, TypeInfo};

    fn assembly() -> TestAssembly {
        let description = AssemblyDescription::new("Tests").with_type(
            TypeInfo::new("Tests.Math")
                .with_member(MemberInfo::new(
                    "Pairs",
                    vec![vec![1.into(), 2.into()], vec![3.into(), 4.into()]],
                ))
                .with_member(MemberInfo::new("Instance", vec![]).instance()),
        );
        TestAssembly::new(description).unwrap()
    }

    fn member(name: &str) -> DataSource {
        DataSource::Member {
            declaring_type: "Tests.Math".into(),
            member: name.into(),
            arguments: vec![],
        }
    }

    fn drain(cursor: &mut DataCursor<'_>) -> Vec<DataRow> {
        let mut rows = Vec::new();
        while let CursorStep::Row(row) = cursor.next_row() {
            rows.push(row);
        }
        rows
    }

    #[test]
    fn test_inline_source_yields_one_row() {
        let assembly = assembly();
        let source = DataSource::Inline {
            values: vec![42.into()],
            skip: Some("flaky".into()),
        };
        let token = CancellationToken::new();
        let mut cursor = DataCursor::open(&source, &assembly, &DataSourceRegistry::new(), &token).unwrap();
        let rows = drain(&mut cursor);
        assert_eq!(rows, vec![DataRow::skipped(vec![42.into()], "flaky")]);
    }

    #[test]
    fn test_metadata_member_rows() {
        let assembly = assembly();
        let token = CancellationToken::new();
        let mut cursor =
            DataCursor::open(&member("Pairs"), &assembly, &DataSourceRegistry::new(), &token).unwrap();
        assert_eq!(drain(&mut cursor).len(), 2);
    }

    #[test]
    fn test_missing_and_instance_members_rejected() {
        let assembly = assembly();
        let registry = DataSourceRegistry::new();
        let token = CancellationToken::new();
        assert!(matches!(
            DataCursor::open(&member("Missing"), &assembly, &registry, &token),
            Err(DiscoveryError::MemberNotFound { .. })
        ));
        assert!(matches!(
            DataCursor::open(&member("Instance"), &assembly, &registry, &token),
            Err(DiscoveryError::MemberNotStatic { .. })
        ));
    }

    #[test]
    fn test_registered_provider_takes_precedence() {
        let assembly = assembly();
        let mut registry = DataSourceRegistry::new();
        registry.register_member(
            "Tests.Math",
            "Pairs",
            |_: &[ArgValue], _: &CancellationToken| -> Result<DataRows, DiscoveryError> {
                Ok(Box::new(std::iter::once(Ok(DataRow::new(vec![9.into()])))))
            },
        );
        let token = CancellationToken::new();
        let mut cursor = DataCursor::open(&member("Pairs"), &assembly, &registry, &token).unwrap();
        assert_eq!(drain(&mut cursor), vec![DataRow::new(vec![9.into()])]);
    }

    #[test]
    fn test_unbounded_provider_stops_on_cancel() {
        let assembly = assembly();
        let mut registry = DataSourceRegistry::new();
        registry.register_class(
            "Tests.Endless",
            |_: &[ArgValue], _: &CancellationToken| -> Result<DataRows, DiscoveryError> {
                Ok(Box::new((0i64..).map(|i| Ok(DataRow::new(vec![i.into()])))))
            },
        );
        let token = CancellationToken::new();
        let source = DataSource::Class {
            type_name: "Tests.Endless".into(),
        };
        let mut cursor = DataCursor::open(&source, &assembly, &registry, &token).unwrap();
        for _ in 0..3 {
            assert!(matches!(cursor.next_row(), CursorStep::Row(_)));
        }
        token.cancel();
        assert!(matches!(cursor.next_row(), CursorStep::Cancelled));
    }

    #[test]
    fn test_panicking_provider_becomes_error() {
        let assembly = assembly();
        let mut registry = DataSourceRegistry::new();
        registry.register_class(
            "Tests.Broken",
            |_: &[ArgValue], _: &CancellationToken| -> Result<DataRows, DiscoveryError> {
                Ok(Box::new((0..).map(|i| {
                    if i == 1 {
                        panic!("database unavailable");
                    }
                    Ok(DataRow::new(vec![]))
                })))
            },
        );
        let token = CancellationToken::new();
        let source = DataSource::Class {
            type_name: "Tests.Broken".into(),
        };
        let mut cursor = DataCursor::open(&source, &assembly, &registry, &token).unwrap();
        assert!(matches!(cursor.next_row(), CursorStep::Row(_)));
        match cursor.next_row() {
            CursorStep::Failed(DiscoveryError::Panicked { message, .. }) => {
                assert_eq!(message, "database unavailable")
            }
            other => panic!("unexpected step: {other:?}"),
        }
    }

    #[test]
    fn test_unregistered_class_data() {
        let assembly = assembly();
        let source = DataSource::Class {
            type_name: "Tests.Nope".into(),
        };
        let token = CancellationToken::new();
        assert!(matches!(
            DataCursor::open(&source, &assembly, &DataSourceRegistry::new(), &token),
            Err(DiscoveryError::ClassDataNotFound { .. })
        ));
    }
}
