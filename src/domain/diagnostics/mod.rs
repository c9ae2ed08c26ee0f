//! Vendor hardware self-tests, selected by system model.

pub mod dell;
pub mod dispatcher;
pub mod report;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::node::node::Node;
use crate::domain::poll::PollError;
use crate::domain::utils::id::JobId;
use crate::error::ClientError;

#[derive(Debug, Error)]
pub enum DiagnosticsError {
    #[error("node has no BMC address")]
    NoBmc,

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("self-test timed out: {0}")]
    Timeout(#[from] PollError),

    #[error("self-test was accepted but no job id could be determined")]
    NoJobId,

    #[error("self-test job {0} did not start after a restart")]
    FailedStart(JobId),

    #[error("self-test job {job} failed: {message}")]
    JobFailed { job: JobId, message: String },

    #[error("self-test report contains no test results")]
    EmptyReport,

    #[error("self-test failed: {}", .0.join(", "))]
    TestsFailed(Vec<String>),
}

/// A vendor self-test that runs to a verdict.
#[async_trait]
pub trait Diagnostics: Send + Sync {
    async fn run(&self, node: &Node) -> Result<(), DiagnosticsError>;
}
