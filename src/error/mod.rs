mod configuration;
mod discovery;
mod io;
mod rehydrate;
mod serialization;

pub use configuration::ConfigurationError;
pub use discovery::DiscoveryError;
pub use io::LoadError;
pub use rehydrate::RehydrateError;
pub use serialization::SerializationError;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Serialization(#[from] SerializationError),

    #[error(transparent)]
    Rehydrate(#[from] RehydrateError),
}

pub type Result<T> = std::result::Result<T, Error>;
