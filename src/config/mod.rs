//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ClientConfig (validated, immutable)
//!     → defaults.rs (request timeouts installed process-wide)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of the request defaults
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Pool capacity and target are read once at pool construction; only
//!   request defaults are hot-swappable

pub mod defaults;
pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use defaults::RequestDefaults;
pub use schema::{ClientConfig, ObservabilityConfig, PoolConfig, RequestConfig};
