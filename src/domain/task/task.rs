use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::domain::node::node::Node;
use crate::domain::services::Services;

/// Result of one task. `AlreadyProvisioned` is the benign sentinel that ends a
/// run early without failing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    AlreadyProvisioned,
    Failed(String),
}

impl TaskOutcome {
    pub fn from_result<E: fmt::Display>(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => TaskOutcome::Success,
            Err(e) => TaskOutcome::Failed(e.to_string()),
        }
    }
}

/// The operation behind a task label.
#[async_trait]
pub trait TaskAction: Send + Sync {
    async fn run(&self, node: &mut Node, services: &Services) -> TaskOutcome;
}

/// One named step of a node's run. The label never changes; only the error is
/// attached once the task has run.
#[derive(Clone)]
pub struct Task {
    pub label: String,
    pub action: Arc<dyn TaskAction>,
    pub error: Option<String>,
}

impl Task {
    pub fn new(label: impl Into<String>, action: Arc<dyn TaskAction>) -> Self {
        Task { label: label.into(), action, error: None }
    }

    /// `"<label> failed: <message>"`, or `None` if the task did not fail.
    pub fn failure_note(&self) -> Option<String> {
        self.error.as_ref().map(|error| format!("{} failed: {}", self.label, error))
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("label", &self.label).field("error", &self.error).finish()
    }
}
