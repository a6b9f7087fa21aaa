use std::fmt;

use super::payload::{self, ARG_SIGNATURE_VERSION};
use crate::error::SerializationError;
use crate::metadata::ArgValue;
use crate::model::{CaseKind, TestCase};
use crate::utils::{escape_field, unescape_field};

/// Version of the record layout.
pub const FORMAT_VERSION: u32 = 1;

const FIELD_COUNT: usize = 6;
const SKIP_SEPARATOR: char = '!';

/// Parsed form of
/// `<formatVersion>:<kind>:<typeName>:<methodName>:<argSignatureVersion>:<discriminant>`.
///
/// Parsing only extracts string fields; nothing is looked up or instantiated
/// until the record is rehydrated against a loaded assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseRecord {
    pub kind: CaseKind,
    pub type_name: String,
    pub method_name: String,
    pub discriminant: String,
}

/// Decoded discriminant of a `row` record.
#[derive(Debug, Clone, PartialEq)]
pub struct RowDiscriminant {
    pub arguments: Vec<ArgValue>,
    pub payload: String,
    pub skip_reason: Option<String>,
}

impl CaseRecord {
    pub fn from_case(case: &TestCase) -> Self {
        let discriminant = match case.kind() {
            CaseKind::Row => match case.skip_reason() {
                Some(reason) => format!(
                    "{}{SKIP_SEPARATOR}{}",
                    case.discriminant(),
                    payload::encode_string(reason)
                ),
                None => case.discriminant().to_string(),
            },
            CaseKind::Error => case.error_message().unwrap_or_default().to_string(),
            CaseKind::Fact | CaseKind::Theory => case.discriminant().to_string(),
        };
        Self {
            kind: case.kind(),
            type_name: case.type_name().to_string(),
            method_name: case.method_name().to_string(),
            discriminant,
        }
    }

    pub fn parse(text: &str) -> Result<Self, SerializationError> {
        let fields: Vec<&str> = text.split(':').collect();
        if fields.len() < FIELD_COUNT {
            return Err(SerializationError::malformed_record(format!(
                "expected {FIELD_COUNT} fields, found {}",
                fields.len()
            )));
        }

        check_version("format", fields[0], FORMAT_VERSION)?;
        let kind: CaseKind = fields[1].parse()?;
        let type_name = unescape(fields[2], "type name")?;
        let method_name = unescape(fields[3], "method name")?;
        check_version("argument signature", fields[4], ARG_SIGNATURE_VERSION)?;
        let discriminant = unescape(fields[5], "discriminant")?;

        if type_name.is_empty() || method_name.is_empty() {
            return Err(SerializationError::malformed_record(
                "type and method name are required",
            ));
        }

        Ok(Self {
            kind,
            type_name,
            method_name,
            discriminant,
        })
    }

    /// Splits a `row` discriminant into its arguments and optional skip reason.
    /// The payload is re-encoded, so equivalent spellings yield the same text.
    pub fn row(&self) -> Result<RowDiscriminant, SerializationError> {
        let (arguments, consumed) = payload::decode_row_prefix(&self.discriminant)?;
        let rest = &self.discriminant[consumed..];
        let skip_reason = match rest.strip_prefix(SKIP_SEPARATOR) {
            Some(encoded) => Some(payload::decode_string(encoded)?),
            None if rest.is_empty() => None,
            None => {
                return Err(SerializationError::malformed_payload(
                    consumed,
                    "unexpected data after row",
                ))
            }
        };
        Ok(RowDiscriminant {
            payload: payload::encode_row(&arguments)?,
            arguments,
            skip_reason,
        })
    }

    /// Source index of a per-source deferred theory; `None` for a whole
    /// theory.
    pub fn source_index(&self) -> Result<Option<usize>, SerializationError> {
        if self.discriminant.is_empty() {
            return Ok(None);
        }
        self.discriminant
            .strip_prefix('@')
            .and_then(|index| index.parse().ok())
            .map(Some)
            .ok_or_else(|| {
                SerializationError::malformed_record(format!(
                    "invalid theory discriminant '{}'",
                    self.discriminant
                ))
            })
    }
}

impl fmt::Display for CaseRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{FORMAT_VERSION}:{}:{}:{}:{ARG_SIGNATURE_VERSION}:{}",
            self.kind,
            escape_field(&self.type_name),
            escape_field(&self.method_name),
            escape_field(&self.discriminant)
        )
    }
}

fn check_version(what: &'static str, field: &str, expected: u32) -> Result<(), SerializationError> {
    let version: u32 = field.parse().map_err(|_| {
        SerializationError::malformed_record(format!("invalid {what} version '{field}'"))
    })?;
    if version != expected {
        return Err(SerializationError::unsupported_version(what, field));
    }
    Ok(())
}

fn unescape(field: &str, what: &str) -> Result<String, SerializationError> {
    unescape_field(field)
        .ok_or_else(|| SerializationError::malformed_record(format!("invalid escape in {what}")))
}
