//! Global subscriber installation
//!
//! Kept to a single test: the global dispatcher can only be set once per
//! process.

use warden_log::{Config, Fields, Format, LogError, LoggerBuilder};

#[test]
fn installs_once_then_reports_already_initialized() {
    let err = LoggerBuilder::from_config(Config::test().with_level("warden_lock=loud"))
        .build()
        .unwrap_err();
    assert!(matches!(err, LogError::Filter { .. }));
    assert!(!tracing::dispatcher::has_been_set());

    let config = Config {
        fields: Fields {
            service: Some("warden-tests".into()),
            ..Fields::default()
        },
        ..Config::test().with_format(Format::Json)
    };
    let _guard = warden_log::init_with(config).unwrap();
    assert!(tracing::dispatcher::has_been_set());
    tracing::info!(key = "job:42", "logged through the installed subscriber");

    let err = warden_log::init().unwrap_err();
    assert!(matches!(err, LogError::AlreadyInitialized(_)));

    let _noop = warden_log::init_test();
}
