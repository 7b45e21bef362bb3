use unslop::types::errors::*;

// === StorageError Tests ===

#[test]
fn storage_error_not_found_display() {
    let err = StorageError::NotFound("p-123".to_string());
    assert_eq!(err.to_string(), "Persona p-123 not found");
}

#[test]
fn storage_error_default_persona_display() {
    assert_eq!(
        StorageError::DefaultPersona.to_string(),
        "Cannot delete default persona"
    );
}

#[test]
fn storage_error_from_rusqlite() {
    let err: StorageError = rusqlite::Error::QueryReturnedNoRows.into();
    assert!(matches!(err, StorageError::DatabaseError(_)));
    assert!(err.to_string().starts_with("Storage database error:"));
}

#[test]
fn storage_error_from_serde_json() {
    let parse = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
    let err: StorageError = parse.into();
    assert!(matches!(err, StorageError::SerializationError(_)));
}

#[test]
fn storage_error_implements_error_trait() {
    let err: Box<dyn std::error::Error> = Box::new(StorageError::NotFound("id".to_string()));
    assert!(err.source().is_none());
}

// === ConfigError Tests ===

#[test]
fn config_error_display_variants() {
    assert_eq!(
        ConfigError::IoError("disk full".to_string()).to_string(),
        "Config I/O error: disk full"
    );
    assert_eq!(
        ConfigError::InvalidKey("gemini.nope".to_string()).to_string(),
        "Invalid config key: gemini.nope"
    );
    assert_eq!(
        ConfigError::InvalidValue("expected number".to_string()).to_string(),
        "Invalid config value: expected number"
    );
}

// === ChannelError Tests ===

#[test]
fn channel_error_disconnected_display() {
    assert_eq!(ChannelError::Disconnected.to_string(), "Port disconnected");
}

// === HostError Tests ===

#[test]
fn host_error_wraps_io_with_source() {
    let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
    let err: HostError = io.into();
    assert_eq!(err.to_string(), "Host I/O error: pipe closed");
}

#[test]
fn host_error_from_storage_is_startup() {
    let err: HostError = StorageError::DefaultPersona.into();
    assert!(matches!(err, HostError::Startup(_)));
    assert_eq!(
        err.to_string(),
        "Host startup failed: Cannot delete default persona"
    );
}

#[test]
fn host_error_from_provider_is_startup() {
    let err: HostError = ProviderError::HttpClient("tls".to_string()).into();
    assert_eq!(err.to_string(), "Host startup failed: HTTP client error: tls");
}
