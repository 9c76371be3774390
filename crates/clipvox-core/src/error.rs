use thiserror::Error;

/// Errors that can occur while bringing up a clipvox backend.
///
/// Per-frame storage operations never fail; degenerate frames are no-ops.
#[derive(Debug, Error)]
pub enum ClipvoxError {
    #[error("GPU adapter not found: {0}")]
    AdapterNotFound(String),

    #[error("Failed to request GPU device: {0}")]
    DeviceRequestFailed(String),

    #[error("Compaction shader compilation failed: {0}")]
    ShaderCompilationFailed(String),

    #[error("Invalid storage configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Errors produced while loading or validating a [`crate::StorageConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse storage config RON: {0}")]
    ParseError(String),
    #[error("Base resolution {0} is not a non-zero power of two")]
    BaseResolutionNotPowerOfTwo(u32),
    #[error("Minimum compaction resolution must be non-zero")]
    ZeroCompactionResolution,
}
