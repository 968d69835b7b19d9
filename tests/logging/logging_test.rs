//! Tests for `src/logging.rs`.

use ragcall::logging::{default_directive, LoggingGuard};

#[test]
fn logging_guard_is_send() {
    fn assert_send<T: Send>() {}
    assert_send::<LoggingGuard>();
}

#[test]
fn debug_flag_raises_default_level() {
    assert_eq!(default_directive(false), "info");
    assert!(default_directive(true).starts_with("debug"));
}

#[test]
fn init_production_creates_logs_dir() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let logs_dir = tmp.path().join("logs");
    assert!(!logs_dir.exists());

    // The global subscriber can only be installed once per process; the
    // directory is created either way.
    let _result = ragcall::logging::init_production(&logs_dir, false);
    assert!(logs_dir.exists(), "logs directory should be created");
}

#[test]
fn init_cli_tolerates_repeated_calls() {
    ragcall::logging::init_cli(false);
    ragcall::logging::init_cli(true);
}
