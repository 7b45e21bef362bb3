use thiserror::Error;

// === StorageError ===

/// Errors related to persona and settings persistence.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Persona with the given ID was not found.
    #[error("Persona {0} not found")]
    NotFound(String),
    /// The reserved default persona cannot be removed.
    #[error("Cannot delete default persona")]
    DefaultPersona,
    /// Database operation failed.
    #[error("Storage database error: {0}")]
    DatabaseError(String),
    /// A stored record could not be encoded or decoded.
    #[error("Storage serialization error: {0}")]
    SerializationError(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        StorageError::DatabaseError(e.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::SerializationError(e.to_string())
    }
}

// === ConfigError ===

/// Errors related to host configuration management.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An I/O error occurred reading or writing the config file.
    #[error("Config I/O error: {0}")]
    IoError(String),
    /// Failed to serialize or deserialize the config.
    #[error("Config serialization error: {0}")]
    SerializationError(String),
    /// The provided config key is invalid.
    #[error("Invalid config key: {0}")]
    InvalidKey(String),
    /// The provided config value is invalid.
    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}

// === ProviderError ===

/// Errors raised while setting up a provider client.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

// === ChannelError ===

/// Errors related to port delivery.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChannelError {
    /// The port was disconnected by either side.
    #[error("Port disconnected")]
    Disconnected,
}

// === HostError ===

/// Errors that stop the host transport.
#[derive(Debug, Error)]
pub enum HostError {
    /// Reading from or writing to the host streams failed.
    #[error("Host I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// An outbound frame could not be encoded.
    #[error("Host encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
    /// Startup failed before the transport could run.
    #[error("Host startup failed: {0}")]
    Startup(String),
}

impl From<StorageError> for HostError {
    fn from(e: StorageError) -> Self {
        HostError::Startup(e.to_string())
    }
}

impl From<ConfigError> for HostError {
    fn from(e: ConfigError) -> Self {
        HostError::Startup(e.to_string())
    }
}

impl From<ProviderError> for HostError {
    fn from(e: ProviderError) -> Self {
        HostError::Startup(e.to_string())
    }
}
