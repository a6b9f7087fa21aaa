/// Casefinder
///
/// Test discovery and identity engine. Resolves test markers across
/// inheritance chains, groups classes into collections, expands theories
/// into data-driven cases and gives every case a stable, serializable
/// identity.
pub mod bus;
pub mod cancel;
pub mod cli;
pub mod collection;
pub mod config;
pub mod discovery;
pub mod error;
pub mod identity;
pub mod logging;
pub mod markers;
pub mod metadata;
pub mod model;
pub mod serialization;
pub mod theory;
pub mod utils;

pub use bus::{DiscoveryEvent, DiscoverySink, ResultBus};
pub use cancel::CancellationToken;
pub use config::DiscoveryOptions;
pub use discovery::{Discoverer, DiscoveryRequest, DiscoverySummary};
pub use error::{Error, Result};
pub use model::{TestCase, TestClass, TestCollection, TestMethod};
