//! Normalization of provider wire formats (RF-21).
//!
//! The provider's task-status payload has drifted across API revisions:
//! string states vs. numeric codes, result URLs as nested objects vs.
//! JSON-string-wrapped arrays. This module is the single adapter mapping
//! every known variant onto [`TaskStatus`]; nothing outside it inspects
//! raw provider JSON. Known variants are pinned as fixtures in the tests.

use serde_json::Value;

// ---------------------------------------------------------------------------
// Internal result type
// ---------------------------------------------------------------------------

/// Normalized status of a dispatched provider task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// Still rendering (includes queued).
    Processing,
    /// Finished; `result_url` points at the rendered video.
    Succeeded { result_url: String },
    /// Terminal provider-side failure.
    Failed { error: String },
}

/// Errors from the normalization adapter.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The payload is not valid JSON.
    #[error("Malformed JSON from provider: {0}")]
    Json(#[from] serde_json::Error),

    /// No recognizable state field in any known shape.
    #[error("Unrecognized provider payload: {0}")]
    UnknownShape(String),

    /// A success state without a extractable result URL.
    #[error("Success payload missing result url")]
    MissingResult,
}

// ---------------------------------------------------------------------------
// State normalization
// ---------------------------------------------------------------------------

/// Normalize a raw status payload string into a [`TaskStatus`].
pub fn normalize_status(raw: &str) -> Result<TaskStatus, WireError> {
    let value: Value = serde_json::from_str(raw)?;
    normalize_status_value(&value)
}

/// Normalize an already-parsed status payload.
pub fn normalize_status_value(value: &Value) -> Result<TaskStatus, WireError> {
    match raw_state(value)? {
        RawState::Processing => Ok(TaskStatus::Processing),
        RawState::Success => {
            let result_url = extract_result_url(value).ok_or(WireError::MissingResult)?;
            Ok(TaskStatus::Succeeded { result_url })
        }
        RawState::Failed => Ok(TaskStatus::Failed {
            error: extract_error(value),
        }),
    }
}

enum RawState {
    Processing,
    Success,
    Failed,
}

/// Pull the task state out of whichever field this payload revision uses.
///
/// Current revision: `"status": "processing" | "success" | "failed"`.
/// Legacy revision: `"code"` (or `"state"`) as `0 | 1 | 2`.
fn raw_state(value: &Value) -> Result<RawState, WireError> {
    if let Some(s) = value.get("status").and_then(Value::as_str) {
        return match s {
            "queued" | "pending" | "processing" | "running" => Ok(RawState::Processing),
            "success" | "succeeded" | "completed" => Ok(RawState::Success),
            "failed" | "error" => Ok(RawState::Failed),
            other => Err(WireError::UnknownShape(format!("status '{other}'"))),
        };
    }

    let code = value
        .get("code")
        .or_else(|| value.get("state"))
        .and_then(Value::as_i64);
    match code {
        Some(0) => Ok(RawState::Processing),
        Some(1) => Ok(RawState::Success),
        Some(2) => Ok(RawState::Failed),
        Some(other) => Err(WireError::UnknownShape(format!("numeric state {other}"))),
        None => Err(WireError::UnknownShape(
            "no status or code field".to_string(),
        )),
    }
}

// ---------------------------------------------------------------------------
// Result extraction
// ---------------------------------------------------------------------------

/// Extract the rendered video URL from any known success shape:
///
/// 1. `{"result": {"video": {"url": "..."}}}` (current)
/// 2. `{"result": "[{\"url\": \"...\"}]"}` (legacy JSON-string array)
/// 3. `{"video_url": "..."}` (oldest flat shape)
fn extract_result_url(value: &Value) -> Option<String> {
    if let Some(url) = value
        .get("result")
        .and_then(|r| r.get("video"))
        .and_then(|v| v.get("url"))
        .and_then(Value::as_str)
    {
        return Some(url.to_string());
    }

    if let Some(encoded) = value.get("result").and_then(Value::as_str) {
        if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(encoded) {
            if let Some(url) = items
                .first()
                .and_then(|i| i.get("url"))
                .and_then(Value::as_str)
            {
                return Some(url.to_string());
            }
        }
    }

    value
        .get("video_url")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Extract a failure message from any known error shape, with a generic
/// fallback so a failure is never silently empty.
fn extract_error(value: &Value) -> String {
    if let Some(msg) = value.get("error").and_then(Value::as_str) {
        return msg.to_string();
    }
    if let Some(msg) = value
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
    {
        return msg.to_string();
    }
    if let Some(msg) = value.get("failure_reason").and_then(Value::as_str) {
        return msg.to_string();
    }
    "Provider reported failure without details".to_string()
}

// ---------------------------------------------------------------------------
// Dispatch-response normalization
// ---------------------------------------------------------------------------

/// Extract the task handle from a dispatch response.
///
/// Current shape: `{"task_id": "..."}`. Legacy shape:
/// `{"data": {"id": "..."}}`.
pub fn extract_task_handle(raw: &str) -> Result<String, WireError> {
    let value: Value = serde_json::from_str(raw)?;

    if let Some(id) = value.get("task_id").and_then(Value::as_str) {
        return Ok(id.to_string());
    }
    if let Some(id) = value
        .get("data")
        .and_then(|d| d.get("id"))
        .and_then(Value::as_str)
    {
        return Ok(id.to_string());
    }
    Err(WireError::UnknownShape(
        "dispatch response has no task handle".to_string(),
    ))
}

// ---------------------------------------------------------------------------
// Tests — one fixture per known wire revision
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // v3 (current): string status, nested result object.
    const FIXTURE_V3_PROCESSING: &str = r#"{"status": "processing", "progress": 41}"#;
    const FIXTURE_V3_SUCCESS: &str =
        r#"{"status": "success", "result": {"video": {"url": "https://cdn.example/v3.mp4"}}}"#;
    const FIXTURE_V3_FAILED: &str =
        r#"{"status": "failed", "error": "content policy rejection"}"#;

    // v2 (legacy): string status, JSON-string-wrapped result array.
    const FIXTURE_V2_SUCCESS: &str =
        r#"{"status": "succeeded", "result": "[{\"url\": \"https://cdn.example/v2.mp4\"}]"}"#;
    const FIXTURE_V2_FAILED: &str =
        r#"{"status": "error", "error": {"message": "render node crashed"}}"#;

    // v1 (oldest): numeric state codes, flat video_url.
    const FIXTURE_V1_PROCESSING: &str = r#"{"code": 0}"#;
    const FIXTURE_V1_SUCCESS: &str =
        r#"{"code": 1, "video_url": "https://cdn.example/v1.mp4"}"#;
    const FIXTURE_V1_FAILED: &str = r#"{"state": 2, "failure_reason": "timeout upstream"}"#;

    #[test]
    fn v3_processing() {
        assert_eq!(
            normalize_status(FIXTURE_V3_PROCESSING).unwrap(),
            TaskStatus::Processing,
        );
    }

    #[test]
    fn v3_success_nested_result() {
        assert_eq!(
            normalize_status(FIXTURE_V3_SUCCESS).unwrap(),
            TaskStatus::Succeeded {
                result_url: "https://cdn.example/v3.mp4".into()
            },
        );
    }

    #[test]
    fn v3_failed_flat_error() {
        assert_eq!(
            normalize_status(FIXTURE_V3_FAILED).unwrap(),
            TaskStatus::Failed {
                error: "content policy rejection".into()
            },
        );
    }

    #[test]
    fn v2_success_string_wrapped_array() {
        assert_eq!(
            normalize_status(FIXTURE_V2_SUCCESS).unwrap(),
            TaskStatus::Succeeded {
                result_url: "https://cdn.example/v2.mp4".into()
            },
        );
    }

    #[test]
    fn v2_failed_nested_error_message() {
        assert_eq!(
            normalize_status(FIXTURE_V2_FAILED).unwrap(),
            TaskStatus::Failed {
                error: "render node crashed".into()
            },
        );
    }

    #[test]
    fn v1_numeric_processing() {
        assert_eq!(
            normalize_status(FIXTURE_V1_PROCESSING).unwrap(),
            TaskStatus::Processing,
        );
    }

    #[test]
    fn v1_numeric_success_flat_url() {
        assert_eq!(
            normalize_status(FIXTURE_V1_SUCCESS).unwrap(),
            TaskStatus::Succeeded {
                result_url: "https://cdn.example/v1.mp4".into()
            },
        );
    }

    #[test]
    fn v1_numeric_failure_with_reason() {
        assert_eq!(
            normalize_status(FIXTURE_V1_FAILED).unwrap(),
            TaskStatus::Failed {
                error: "timeout upstream".into()
            },
        );
    }

    #[test]
    fn failure_without_details_gets_fallback_message() {
        let status = normalize_status(r#"{"status": "failed"}"#).unwrap();
        match status {
            TaskStatus::Failed { error } => assert!(!error.is_empty()),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn success_without_result_is_an_error() {
        let err = normalize_status(r#"{"status": "success"}"#).unwrap_err();
        assert!(matches!(err, WireError::MissingResult));
    }

    #[test]
    fn unknown_status_string_rejected() {
        assert!(normalize_status(r#"{"status": "limbo"}"#).is_err());
    }

    #[test]
    fn unknown_numeric_code_rejected() {
        assert!(normalize_status(r#"{"code": 7}"#).is_err());
    }

    #[test]
    fn empty_object_rejected() {
        assert!(normalize_status("{}").is_err());
    }

    #[test]
    fn malformed_json_rejected() {
        assert!(matches!(
            normalize_status("not json").unwrap_err(),
            WireError::Json(_),
        ));
    }

    // -- dispatch handle extraction -------------------------------------------

    #[test]
    fn current_dispatch_shape() {
        assert_eq!(
            extract_task_handle(r#"{"task_id": "task-abc123"}"#).unwrap(),
            "task-abc123",
        );
    }

    #[test]
    fn legacy_dispatch_shape() {
        assert_eq!(
            extract_task_handle(r#"{"data": {"id": "task-legacy"}}"#).unwrap(),
            "task-legacy",
        );
    }

    #[test]
    fn dispatch_without_handle_rejected() {
        assert!(extract_task_handle(r#"{"ok": true}"#).is_err());
    }
}
