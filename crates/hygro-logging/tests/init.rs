use hygro_logging::{build_filter, init_logging, LogFormat, LoggingConfig, LoggingError};

#[test]
fn test_invalid_level_is_rejected() {
    if std::env::var("RUST_LOG").is_ok() {
        return;
    }
    let config = LoggingConfig::default().with_level("info,hygro=loud");
    let err = build_filter(&config).unwrap_err();
    assert!(matches!(err, LoggingError::InvalidFilter(..)));
}

#[test]
fn test_second_init_fails_cleanly() {
    let config = LoggingConfig::default()
        .with_level("hygro=debug")
        .with_format(LogFormat::Json);

    init_logging(&config).unwrap();
    tracing::info!(component = "test", "Logging initialized");

    let err = init_logging(&config).unwrap_err();
    assert!(matches!(err, LoggingError::InitError(_)));
}
