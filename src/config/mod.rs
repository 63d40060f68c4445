//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (read & deserialize)
//!     → validation.rs (semantic checks)
//!     → EtcdBindConfig (validated, immutable)
//!     → Client::connect / EtcdClient::new, logging and metrics setup
//! ```
//!
//! # Design Decisions
//! - All fields have defaults, so an empty file is a valid local setup
//! - Validation separates syntactic (serde) from semantic checks
//! - This is the crate's own settings file; bound configuration values
//!   live in the store, not here

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{EtcdBindConfig, ObservabilityConfig, RetryConfig, StoreConfig};
pub use validation::{validate_config, ValidationError};
