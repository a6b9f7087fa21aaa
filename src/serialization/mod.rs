//! Cross-process forms of a test case: the argument payload codec and the
//! versioned case record.
pub mod payload;
mod record;

pub use payload::{decode_row, encode_row, ARG_SIGNATURE_VERSION};
pub use record::{CaseRecord, RowDiscriminant, FORMAT_VERSION};
