//! HTTP request types

use serde::Deserialize;

/// Body of `POST /debate/stream`.
#[derive(Debug, Deserialize)]
pub struct DebateRequest {
    pub user_id: String,
    pub session_id: String,
    pub topic: String,
    /// Optional per-request model overrides; blank falls back to the
    /// configured default for the role.
    #[serde(default)]
    pub pro_model: Option<String>,
    #[serde(default)]
    pub con_model: Option<String>,
    #[serde(default)]
    pub judge_model: Option<String>,
}

/// Identifies a stored debate session for history queries.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub user_id: String,
    pub session_id: String,
}
