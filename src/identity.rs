//! Deterministic identifiers for assemblies, collections, classes, methods
//! and cases.
//!
//! Every identifier is a SHA-256 digest over a canonical encoding of its key
//! parts. Each part is written as a one-byte type tag, its byte length in
//! decimal, a `:` separator and the raw bytes, so `("3", "0abc")` and
//! `("30", "abc")` can never encode to the same input.
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UniqueId(String);

impl UniqueId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKind {
    Assembly,
    Collection,
    Class,
    Method,
    Case,
}

impl IdentityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assembly => "assembly",
            Self::Collection => "collection",
            Self::Class => "class",
            Self::Method => "method",
            Self::Case => "case",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPart<'a> {
    Str(&'a str),
    Int(u64),
    Flag(bool),
    Absent,
}

impl<'a> From<&'a str> for KeyPart<'a> {
    fn from(value: &'a str) -> Self {
        Self::Str(value)
    }
}

impl<'a> From<Option<&'a str>> for KeyPart<'a> {
    fn from(value: Option<&'a str>) -> Self {
        value.map_or(Self::Absent, Self::Str)
    }
}

impl From<bool> for KeyPart<'_> {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<u64> for KeyPart<'_> {
    fn from(value: u64) -> Self {
        Self::Int(value)
    }
}

pub struct UniqueIdBuilder {
    hasher: Sha256,
}

impl UniqueIdBuilder {
    pub fn new(kind: IdentityKind) -> Self {
        let mut builder = Self {
            hasher: Sha256::new(),
        };
        builder.write(b'k', kind.as_str().as_bytes());
        builder
    }

    pub fn add<'a>(mut self, part: impl Into<KeyPart<'a>>) -> Self {
        match part.into() {
            KeyPart::Str(value) => self.write(b's', value.as_bytes()),
            KeyPart::Int(value) => self.write(b'i', value.to_string().as_bytes()),
            KeyPart::Flag(value) => self.write(b'b', if value { b"1" } else { b"0" }),
            KeyPart::Absent => self.write(b'n', b""),
        }
        self
    }

    fn write(&mut self, tag: u8, bytes: &[u8]) {
        self.hasher.update([tag]);
        self.hasher.update(bytes.len().to_string().as_bytes());
        self.hasher.update(b":");
        self.hasher.update(bytes);
    }

    pub fn build(self) -> UniqueId {
        UniqueId(hex::encode(self.hasher.finalize()))
    }
}

/// Identifier for `kind` over ordered key parts.
pub fn generate(kind: IdentityKind, parts: &[KeyPart<'_>]) -> UniqueId {
    parts
        .iter()
        .fold(UniqueIdBuilder::new(kind), |builder, part| builder.add(*part))
        .build()
}

pub fn assembly_id(name: &str, path: &str, config: Option<&str>) -> UniqueId {
    generate(
        IdentityKind::Assembly,
        &[name.into(), path.into(), config.into()],
    )
}

/// Definition-backed collections are keyed by the definition type, all
/// others by display name.
pub fn collection_id(display_name: &str, definition_type: Option<&str>) -> UniqueId {
    match definition_type {
        Some(type_name) => generate(
            IdentityKind::Collection,
            &[KeyPart::Flag(true), type_name.into()],
        ),
        None => generate(
            IdentityKind::Collection,
            &[KeyPart::Flag(false), display_name.into()],
        ),
    }
}

pub fn class_id(collection_id: &UniqueId, type_name: &str) -> UniqueId {
    generate(
        IdentityKind::Class,
        &[collection_id.as_str().into(), type_name.into()],
    )
}

pub fn method_id(class_id: &UniqueId, method_name: &str) -> UniqueId {
    generate(
        IdentityKind::Method,
        &[class_id.as_str().into(), method_name.into()],
    )
}

pub fn case_id(
    method_id: &UniqueId,
    case_kind: &str,
    discriminant: &str,
    has_skip_reason: bool,
) -> UniqueId {
    generate(
        IdentityKind::Case,
        &[
            method_id.as_str().into(),
            case_kind.into(),
            discriminant.into(),
            has_skip_reason.into(),
        ],
    )
}
