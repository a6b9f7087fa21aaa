//! Marker kinds and their resolution across inheritance chains.
mod registry;
mod resolver;

pub use registry::{kinds, Marker, MarkerDescriptor, MarkerPayload, MarkerRegistry, PayloadSchema};
pub use resolver::AttributeResolver;
