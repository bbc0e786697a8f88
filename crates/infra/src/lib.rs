//! Infrastructure layer: database access, configuration, model storage.

pub mod config;
pub mod model_store;
pub mod registry;
pub mod source;

pub use config::{Config, ConfigError, DatabaseConfig};
pub use model_store::{FileModelStore, InMemoryModelStore, ModelSnapshot, ModelStore, ModelStoreError};
pub use registry::{ModelRegistry, TrainingPermit};
pub use source::{InMemoryTicketSource, MySqlTicketSource, SourceError, TicketSource};
