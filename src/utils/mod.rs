mod string;

pub use string::{escape_field, escape_literal, extract_last_segment, truncate_chars, unescape_field};
