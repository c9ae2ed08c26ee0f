use serde::{Deserialize, Serialize};

/// Push-triggered request to temper one node.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDto {
    pub node: String,
    /// Bundles to run; the scheduler's default bundles when empty.
    #[serde(default)]
    pub bundles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EventReplyDto {
    pub node: String,
    /// `dispatched`, `already-running` or `rejected`.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HealthDto {
    pub status: String,
    pub in_progress: usize,
}
