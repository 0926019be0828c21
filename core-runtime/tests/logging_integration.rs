//! Integration tests for the logging helpers

use bridge_traits::time::LogLevel;
use core_runtime::logging::{redact_if_sensitive, strip_path, LogFormat, LoggingConfig};

#[test]
fn test_config_builder() {
    // Logging can only be initialized once per process; only the builder is checked
    let config = LoggingConfig::default()
        .with_format(LogFormat::Json)
        .with_level(LogLevel::Debug)
        .with_spans(false);

    assert_eq!(config.format, LogFormat::Json);
    assert_eq!(config.level, LogLevel::Debug);
    assert!(!config.enable_spans);
    assert!(config.logger_sink.is_none());
}

#[test]
fn test_key_material_is_redacted() {
    assert_eq!(
        redact_if_sensitive("master_keys", r#"["a1b2c3"]"#),
        "[REDACTED]"
    );
    assert_eq!(redact_if_sensitive("api_key", "k-123"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("auth_token", "t"), "[REDACTED]");
}

#[test]
fn test_email_is_masked() {
    let redacted = redact_if_sensitive("account", "user@example.com");

    assert!(redacted.starts_with('u'));
    assert!(redacted.contains("[REDACTED]"));
    assert!(!redacted.contains("example.com"));
}

#[test]
fn test_upload_fields_pass_through() {
    assert_eq!(redact_if_sensitive("asset_id", "ABC-123/L0/001"), "ABC-123/L0/001");
    assert_eq!(redact_if_sensitive("folder_uuid", "6a0f3c9e"), "6a0f3c9e");
    assert_eq!(redact_if_sensitive("name", "IMG_0001.JPG"), "IMG_0001.JPG");
}

#[test]
fn test_path_stripping() {
    assert_eq!(
        strip_path("/var/mobile/Containers/tmp/ab12_IMG_0001.JPG"),
        "ab12_IMG_0001.JPG"
    );
    assert_eq!(strip_path("C:\\Users\\Kim\\Pictures\\IMG_0002.HEIC"), "IMG_0002.HEIC");
    assert_eq!(strip_path("IMG_0003.MOV"), "IMG_0003.MOV");
    assert_eq!(strip_path("/cache/"), "");
    assert_eq!(strip_path(""), "");
}

#[test]
fn test_default_format_follows_build_profile() {
    #[cfg(debug_assertions)]
    assert_eq!(LoggingConfig::default().format, LogFormat::Pretty);

    #[cfg(not(debug_assertions))]
    assert_eq!(LoggingConfig::default().format, LogFormat::Json);
}

#[test]
fn test_filter_configuration() {
    let config = LoggingConfig::default().with_filter("core_camera_upload=trace,sqlx=warn");

    assert_eq!(
        config.filter.as_deref(),
        Some("core_camera_upload=trace,sqlx=warn")
    );
}
