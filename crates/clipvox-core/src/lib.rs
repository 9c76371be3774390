pub mod config;
pub mod constants;
pub mod error;
pub mod math;
pub mod types;

pub use config::StorageConfig;
pub use error::{ClipvoxError, ConfigError};
pub use types::{AttributeRole, StorageContext, UpdatePolicy, VoxelAttribute};
