pub mod db;
pub mod error;
pub mod registry;
pub mod types;

pub use error::{RegistryError, Result};
pub use registry::{ConnectionRegistry, SqliteConnectionRegistry};
pub use types::Connection;
