use super::*;
use std::path::PathBuf;
use tempfile::tempdir;

fn valid_settings() -> Settings {
    let mut settings = Settings::default();
    settings.jwt.secret = "x".repeat(MIN_SECRET_LENGTH);
    settings
}

#[test]
fn test_settings_validation() {
    let settings = valid_settings();
    assert!(settings.validate().is_ok());

    // Test invalid log level
    let mut invalid_settings = settings.clone();
    invalid_settings.log_level = "invalid".to_string();
    assert!(invalid_settings.validate().is_err());

    // Test short signing secret
    let mut invalid_settings = settings.clone();
    invalid_settings.jwt.secret = "short".to_string();
    assert!(invalid_settings.validate().is_err());

    // Test refresh TTL not longer than access TTL
    let mut invalid_settings = settings.clone();
    invalid_settings.refresh.ttl_secs = invalid_settings.jwt.access_ttl_secs;
    assert!(invalid_settings.validate().is_err());

    // Test invalid password requirements
    let mut invalid_settings = settings.clone();
    invalid_settings.password.min_length = 4;
    assert!(invalid_settings.validate().is_err());

    // Test invalid guard settings
    let mut invalid_settings = settings.clone();
    invalid_settings.guard.max_attempts = 0;
    assert!(invalid_settings.validate().is_err());

    // Test admin listener sharing the public address
    let mut invalid_settings = settings.clone();
    invalid_settings.admin_bind_addr = invalid_settings.bind_addr;
    assert!(invalid_settings.validate().is_err());

    // Test invalid rate limit settings
    let mut invalid_settings = settings;
    invalid_settings.rate_limit.max_requests = 0;
    assert!(invalid_settings.validate().is_err());
}

#[test]
fn test_previous_key_must_not_reuse_active_id() {
    let mut settings = valid_settings();
    settings.jwt.previous_keys.push(PreviousKey {
        key_id: settings.jwt.key_id.clone(),
        secret: "y".repeat(MIN_SECRET_LENGTH),
    });
    assert_eq!(
        settings.validate(),
        Err(ConfigError::Invalid {
            field: "jwt.previous_keys",
            reason: "key id collides with the active key".to_string(),
        })
    );
}

#[test]
fn test_defaults_follow_policy() {
    let settings = Settings::default();
    assert_eq!(settings.jwt.access_ttl(), Duration::from_secs(900));
    assert!(settings.refresh.ttl() > settings.jwt.access_ttl() * 7);
    assert_eq!(settings.guard.max_attempts, 5);
    assert_eq!(settings.session.max_age(), Duration::from_secs(86_400));
    assert_eq!(settings.timeouts.store(), Duration::from_millis(50));
    assert_eq!(settings.storage.backend, StorageBackend::Memory);
}

#[test]
fn test_load_settings_from_file() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("gameauth.toml");

    std::fs::write(
        &config_path,
        r#"
        bind_addr = "127.0.0.1:3000"
        log_level = "debug"
        log_format = "json"

        [jwt]
        secret = "0123456789abcdef0123456789abcdef"
        access_ttl_secs = 600

        [storage]
        backend = "flat_file"
        data_dir = "test_data"
        "#,
    )
    .unwrap();

    let settings = Settings::load_from(&config_path).unwrap();
    assert_eq!(settings.bind_addr.to_string(), "127.0.0.1:3000");
    assert_eq!(settings.admin_bind_addr.to_string(), "127.0.0.1:9090");
    assert_eq!(settings.log_level, "debug");
    assert_eq!(settings.log_format, LogFormat::Json);
    assert_eq!(settings.jwt.access_ttl_secs, 600);
    assert_eq!(settings.storage.backend, StorageBackend::FlatFile);
    assert_eq!(settings.storage.data_dir, PathBuf::from("test_data"));
    // Sections absent from the file keep their defaults
    assert_eq!(settings.guard.max_attempts, 5);
}

#[test]
fn test_load_rejects_missing_secret() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("gameauth.toml");
    std::fs::write(&config_path, "log_level = \"info\"\n").unwrap();

    assert!(Settings::load_from(&config_path).is_err());
}

#[test]
fn test_example_config_is_valid() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../config/gameauth.example.toml");
    let settings = Settings::load_from(&path).unwrap();
    assert_eq!(settings.jwt.key_id, "2026-10");
    assert_eq!(settings.storage.backend, StorageBackend::FlatFile);
    assert_eq!(settings.session.sweep_interval_secs, 60);
}
