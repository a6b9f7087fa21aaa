//! Metadata model of a unit under test.
//!
//! Types, methods and markers are described as plain data (loadable from YAML
//! or JSON) and validated into a [`TestAssembly`] that owns the inheritance
//! and override indexes every resolver walks.
mod assembly;
mod types;
mod value;

pub use assembly::{AssemblyDescription, MethodRef, TestAssembly};
pub use types::{
    MarkerArgs, MarkerUsage, MemberInfo, MemberKind, MethodInfo, ParameterInfo, SourceLocation,
    TypeInfo, TypeRef, Visibility,
};
pub use value::ArgValue;
