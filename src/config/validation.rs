//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("server.name is required")]
    MissingServerName,
    #[error("tls.cert_path does not exist: {0}")]
    TlsCertNotFound(String),
    #[error("tls.key_path does not exist: {0}")]
    TlsKeyNotFound(String),
    #[error("database.path must not be empty")]
    EmptyDatabasePath,
    #[error("session.outbound_queue must be at least 1")]
    ZeroOutboundQueue,
    #[error("limits.max_content_length must be at least 1")]
    ZeroContentLength,
    #[error("limits.max_frame_bytes ({frame}) must exceed limits.max_content_length ({content})")]
    FrameSmallerThanContent { frame: usize, content: usize },
    #[error("limits.messages_per_second and limits.message_burst must be positive")]
    InvalidRateLimit,
    #[error("user.user_id must not be empty")]
    EmptyUserId,
    #[error("duplicate [[user]] block: {0}")]
    DuplicateUser(String),
    #[error("listen.address and {0} must differ")]
    AddressConflict(&'static str),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.name.trim().is_empty() {
        errors.push(ValidationError::MissingServerName);
    }

    if let Some(ref tls) = config.tls {
        if !Path::new(&tls.cert_path).exists() {
            errors.push(ValidationError::TlsCertNotFound(tls.cert_path.clone()));
        }
        if !Path::new(&tls.key_path).exists() {
            errors.push(ValidationError::TlsKeyNotFound(tls.key_path.clone()));
        }
        if tls.address == config.listen.address {
            errors.push(ValidationError::AddressConflict("tls.address"));
        }
    }

    if let Some(ref http) = config.http
        && http.address == config.listen.address
    {
        errors.push(ValidationError::AddressConflict("http.address"));
    }

    if config.database.path.trim().is_empty() {
        errors.push(ValidationError::EmptyDatabasePath);
    }

    if config.session.outbound_queue == 0 {
        errors.push(ValidationError::ZeroOutboundQueue);
    }

    let limits = &config.limits;
    if limits.max_content_length == 0 {
        errors.push(ValidationError::ZeroContentLength);
    }
    // A character can take up to 4 bytes; only the trivial case is checked here.
    if limits.max_frame_bytes <= limits.max_content_length {
        errors.push(ValidationError::FrameSmallerThanContent {
            frame: limits.max_frame_bytes,
            content: limits.max_content_length,
        });
    }
    if limits.messages_per_second <= 0.0 || limits.message_burst < 1.0 {
        errors.push(ValidationError::InvalidRateLimit);
    }

    let mut seen = HashSet::new();
    for user in &config.users {
        if user.user_id.trim().is_empty() {
            errors.push(ValidationError::EmptyUserId);
        } else if !seen.insert(user.user_id.as_str()) {
            errors.push(ValidationError::DuplicateUser(user.user_id.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_valid_config() -> String {
        r#"
[server]
name = "cipher.test"

[listen]
address = "127.0.0.1:8001"
"#
        .to_string()
    }

    #[test]
    fn test_valid_config_passes() {
        let config: Config = toml::from_str(&minimal_valid_config()).unwrap();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_empty_server_name_fails() {
        let toml = r#"
[server]
name = ""

[listen]
address = "127.0.0.1:8001"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ValidationError::MissingServerName)));
    }

    #[test]
    fn test_missing_tls_cert_fails() {
        let toml = r#"
[server]
name = "cipher.test"

[listen]
address = "127.0.0.1:8001"

[tls]
address = "127.0.0.1:8443"
cert_path = "/nonexistent/cert.pem"
key_path = "/nonexistent/key.pem"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ValidationError::TlsCertNotFound(_))));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::TlsKeyNotFound(_))));
    }

    #[test]
    fn test_http_on_websocket_address_fails() {
        let toml = r#"
[server]
name = "cipher.test"

[listen]
address = "127.0.0.1:8001"

[http]
address = "127.0.0.1:8001"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let errors = validate(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::AddressConflict("http.address"))));
    }

    #[test]
    fn test_duplicate_users_fail() {
        let toml = r#"
[server]
name = "cipher.test"

[listen]
address = "127.0.0.1:8001"

[[user]]
user_id = "alice"
display_name = "Alice Johnson"

[[user]]
user_id = "alice"
display_name = "Alice Again"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let errors = validate(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::DuplicateUser(id) if id == "alice")));
    }

    #[test]
    fn test_all_errors_are_collected() {
        let toml = r#"
[server]
name = " "

[listen]
address = "127.0.0.1:8001"

[session]
outbound_queue = 0

[limits]
max_content_length = 0
messages_per_second = 0.0
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let errors = validate(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
    }
}
