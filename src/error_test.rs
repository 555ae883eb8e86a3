use super::*;

#[test]
fn not_found_is_detected() {
    assert!(SyncError::NotFound.is_not_found());
    assert!(!SyncError::Stream("eof".into()).is_not_found());
}

#[test]
fn server_errors_and_rate_limits_are_retryable() {
    assert!(SyncError::Status { status: 503, body: String::new() }.retryable());
    assert!(SyncError::Status { status: 429, body: String::new() }.retryable());
    assert!(!SyncError::Status { status: 400, body: String::new() }.retryable());
}

#[test]
fn config_and_not_found_are_not_retryable() {
    assert!(!SyncError::Config("bad".into()).retryable());
    assert!(!SyncError::NotFound.retryable());
}

#[test]
fn status_message_includes_code() {
    let err = SyncError::Status { status: 500, body: "boom".into() };
    assert_eq!(err.to_string(), "server returned status 500");
}

#[test]
fn decode_error_converts_from_serde() {
    let err: SyncError = serde_json::from_str::<u32>("nope").unwrap_err().into();
    assert!(err.to_string().starts_with("response parse failed"));
}
