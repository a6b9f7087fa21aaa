//! Expansion of test methods into concrete cases.
pub mod data;
pub mod format;
mod expander;

pub use data::{
    CursorStep, DataCursor, DataProvider, DataRow, DataRows, DataSource, DataSourceRegistry,
};
pub use expander::{Declaration, Expansion, TestDeclaration, TheoryExpander};
pub use format::{format_arguments, format_value};
