use serde::{Deserialize, Serialize};
use std::fmt;

use super::ArgValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

/// A parameter or argument type as it appears in a method signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeRef {
    Simple(String),
    Generic {
        generic: usize,
        #[serde(default)]
        name: Option<String>,
    },
    Array {
        array: Box<TypeRef>,
    },
    Constructed {
        name: String,
        #[serde(default)]
        args: Vec<TypeRef>,
    },
}

enum Shape<'a> {
    Named(&'a str, &'a [TypeRef]),
    Array(&'a TypeRef),
    Generic(usize),
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Simple(name.into())
    }

    pub fn generic(position: usize, name: impl Into<String>) -> Self {
        Self::Generic {
            generic: position,
            name: Some(name.into()),
        }
    }

    pub fn array_of(element: TypeRef) -> Self {
        Self::Array {
            array: Box::new(element),
        }
    }

    pub fn constructed(name: impl Into<String>, args: Vec<TypeRef>) -> Self {
        Self::Constructed {
            name: name.into(),
            args,
        }
    }

    fn shape(&self) -> Shape<'_> {
        match self {
            Self::Simple(name) => Shape::Named(name, &[]),
            Self::Constructed { name, args } => Shape::Named(name, args),
            Self::Array { array } => Shape::Array(array),
            Self::Generic { generic, .. } => Shape::Generic(*generic),
        }
    }

    /// Signature equality: generic parameters compare by declared position,
    /// never by name.
    pub fn signature_eq(&self, other: &TypeRef) -> bool {
        match (self.shape(), other.shape()) {
            (Shape::Named(a, a_args), Shape::Named(b, b_args)) => {
                a == b
                    && a_args.len() == b_args.len()
                    && a_args.iter().zip(b_args).all(|(x, y)| x.signature_eq(y))
            }
            (Shape::Array(a), Shape::Array(b)) => a.signature_eq(b),
            (Shape::Generic(a), Shape::Generic(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple(name) => write!(f, "{name}"),
            Self::Constructed { name, args } => {
                write!(f, "{name}<")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ">")
            }
            Self::Array { array } => write!(f, "{array}[]"),
            Self::Generic {
                name: Some(name), ..
            } => write!(f, "{name}"),
            Self::Generic { generic, .. } => write!(f, "!{generic}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
}

impl ParameterInfo {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Loosely-typed marker arguments as written in a unit description. Binding
/// against the marker registry turns them into a typed payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerArgs {
    pub skip: Option<String>,
    pub display_name: Option<String>,
    pub values: Vec<ArgValue>,
    pub member: Option<String>,
    pub declaring_type: Option<String>,
    pub arguments: Vec<ArgValue>,
    pub type_name: Option<String>,
    pub name: Option<String>,
    pub value: Option<String>,
    pub fixtures: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerUsage {
    pub kind: String,
    #[serde(flatten)]
    pub args: MarkerArgs,
}

impl MarkerUsage {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            args: MarkerArgs::default(),
        }
    }

    pub fn with_skip(mut self, reason: impl Into<String>) -> Self {
        self.args.skip = Some(reason.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.args.display_name = Some(name.into());
        self
    }

    pub fn with_values(mut self, values: Vec<ArgValue>) -> Self {
        self.args.values = values;
        self
    }

    pub fn with_member(mut self, member: impl Into<String>) -> Self {
        self.args.member = Some(member.into());
        self
    }

    pub fn with_declaring_type(mut self, type_name: impl Into<String>) -> Self {
        self.args.declaring_type = Some(type_name.into());
        self
    }

    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.args.type_name = Some(type_name.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.args.name = Some(name.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.args.value = Some(value.into());
        self
    }

    pub fn with_fixture(mut self, fixture: impl Into<String>) -> Self {
        self.args.fixtures.push(fixture.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberKind {
    Field,
    #[default]
    Property,
    Method,
}

/// A data member whose rows are known from metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberInfo {
    pub name: String,
    #[serde(default)]
    pub kind: MemberKind,
    #[serde(default = "default_true")]
    pub is_static: bool,
    #[serde(default)]
    pub rows: Vec<Vec<ArgValue>>,
}

fn default_true() -> bool {
    true
}

impl MemberInfo {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<ArgValue>>) -> Self {
        Self {
            name: name.into(),
            kind: MemberKind::default(),
            is_static: true,
            rows,
        }
    }

    pub fn instance(mut self) -> Self {
        self.is_static = false;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodInfo {
    pub name: String,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_overridable: bool,
    #[serde(default)]
    pub generic_param_count: usize,
    #[serde(default)]
    pub parameters: Vec<ParameterInfo>,
    #[serde(default)]
    pub markers: Vec<MarkerUsage>,
    #[serde(default)]
    pub source: Option<SourceLocation>,
}

impl MethodInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visibility: Visibility::Public,
            is_static: false,
            is_overridable: false,
            generic_param_count: 0,
            parameters: Vec::new(),
            markers: Vec::new(),
            source: None,
        }
    }

    pub fn overridable(mut self) -> Self {
        self.is_overridable = true;
        self
    }

    pub fn private(mut self) -> Self {
        self.visibility = Visibility::Private;
        self
    }

    pub fn with_generic_params(mut self, count: usize) -> Self {
        self.generic_param_count = count;
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.parameters.push(ParameterInfo::new(name, ty));
        self
    }

    pub fn with_marker(mut self, marker: MarkerUsage) -> Self {
        self.markers.push(marker);
        self
    }

    pub fn with_source(mut self, source: SourceLocation) -> Self {
        self.source = Some(source);
        self
    }

    /// Same name, generic arity and position-aware parameter types.
    pub fn same_signature(&self, other: &MethodInfo) -> bool {
        self.name == other.name
            && self.generic_param_count == other.generic_param_count
            && self.parameters.len() == other.parameters.len()
            && self
                .parameters
                .iter()
                .zip(&other.parameters)
                .all(|(a, b)| a.ty.signature_eq(&b.ty))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeInfo {
    pub name: String,
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub is_interface: bool,
    #[serde(default)]
    pub generic_param_count: usize,
    #[serde(default)]
    pub markers: Vec<MarkerUsage>,
    #[serde(default)]
    pub methods: Vec<MethodInfo>,
    #[serde(default)]
    pub members: Vec<MemberInfo>,
}

impl TypeInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base: None,
            is_abstract: false,
            is_interface: false,
            generic_param_count: 0,
            markers: Vec::new(),
            methods: Vec::new(),
            members: Vec::new(),
        }
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn with_marker(mut self, marker: MarkerUsage) -> Self {
        self.markers.push(marker);
        self
    }

    pub fn with_method(mut self, method: MethodInfo) -> Self {
        self.methods.push(method);
        self
    }

    pub fn with_member(mut self, member: MemberInfo) -> Self {
        self.members.push(member);
        self
    }

    /// Abstract types, interfaces and open generic types cannot hold tests.
    pub fn is_instantiable(&self) -> bool {
        !self.is_abstract && !self.is_interface && self.generic_param_count == 0
    }

    pub fn find_member(&self, name: &str) -> Option<&MemberInfo> {
        self.members.iter().find(|m| m.name == name)
    }
}
