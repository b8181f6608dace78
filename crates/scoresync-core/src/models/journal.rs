use serde::{Deserialize, Serialize};

/// One line of `logs/requests.jsonl`, written once per reconcile cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestLogEntry {
    pub request_id: String,
    pub operation: String,
    /// Run status of a finished cycle, or `error` when the cycle aborted.
    pub status: String,
    pub elapsed_ms: u64,
    pub recorded_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Per-category counts for finished cycles; the trigger for failed ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}
