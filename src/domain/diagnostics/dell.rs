//! ePSA self-test on Dell PowerEdge servers through the iDRAC Redfish API.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::domain::config::DiagnosticsConfig;
use crate::domain::diagnostics::report::{check_scores, parse_report};
use crate::domain::diagnostics::{Diagnostics, DiagnosticsError};
use crate::domain::node::node::Node;
use crate::domain::poll::poll_for;
use crate::domain::services::{BmcClient, BmcReply, BmcSession};
use crate::domain::utils::id::JobId;
use crate::error::ClientError;

const LC_SERVICE: &str = "/redfish/v1/Dell/Managers/iDRAC.Embedded.1/DellLCService/Actions";
const JOBS: &str = "/redfish/v1/Managers/iDRAC.Embedded.1/Oem/Dell/Jobs";
const DIAGNOSTICS_JOB_TYPE: &str = "RemoteDiagnostics";

/// How a polled job ended, short of a hard failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobEnd {
    Completed,
    /// The job reported no state at all: iDRAC dropped it before it ran.
    FailedStart,
}

pub struct DellDiagnostics {
    bmc: Arc<dyn BmcClient>,
    config: DiagnosticsConfig,
}

impl DellDiagnostics {
    pub fn new(bmc: Arc<dyn BmcClient>, config: DiagnosticsConfig) -> Self {
        DellDiagnostics { bmc, config }
    }

    /// Requests an extended run, or adopts the diagnostics job iDRAC is already running.
    async fn start(&self, session: &dyn BmcSession) -> Result<JobId, DiagnosticsError> {
        let reply = session
            .post(
                &format!("{}/DellLCService.RunePSADiagnostics", LC_SERVICE),
                json!({ "RebootJobType": "GracefulRebootWithForcedShutdown", "RunMode": "Extended" }),
            )
            .await?;

        if reply.is_success() {
            return job_from_location(&reply).ok_or(DiagnosticsError::NoJobId);
        }

        if is_already_running(&reply) {
            log::info!("A diagnostics job is already running, attaching to it.");
            let jobs = session.get_json(&format!("{}?$expand=*($levels=1)", JOBS)).await?;
            return running_diagnostics_job(&jobs).ok_or(DiagnosticsError::NoJobId);
        }

        Err(ClientError::Status { status: reply.status, body: reply.body }.into())
    }

    async fn wait(&self, session: &dyn BmcSession, job: &JobId) -> Result<JobEnd, DiagnosticsError> {
        let path = format!("{}/{}", JOBS, job);
        let path = path.as_str();

        poll_for(self.config.job_poll_interval, self.config.job_timeout, || async move {
            let status = session.get_json(path).await?;
            let state = status["JobState"].as_str().unwrap_or_default();

            match state {
                "Completed" => Ok(Some(JobEnd::Completed)),
                "" | "Unknown" => Ok(Some(JobEnd::FailedStart)),
                "Failed" => Err(DiagnosticsError::JobFailed {
                    job: job.clone(),
                    message: status["Message"].as_str().unwrap_or("no message").to_string(),
                }),
                other => {
                    log::debug!("Diagnostics job {} is {}.", job, other);
                    Ok(None)
                }
            }
        })
        .await
    }

    async fn fetch_report(&self, session: &dyn BmcSession) -> Result<String, DiagnosticsError> {
        let reply = session
            .post(&format!("{}/DellLCService.ExportePSADiagnosticsResult", LC_SERVICE), json!({ "ShareType": "Local" }))
            .await?;

        if !reply.is_success() {
            return Err(ClientError::Status { status: reply.status, body: reply.body }.into());
        }
        Ok(reply.body)
    }
}

#[async_trait]
impl Diagnostics for DellDiagnostics {
    async fn run(&self, node: &Node) -> Result<(), DiagnosticsError> {
        let bmc = node.bmc().ok_or(DiagnosticsError::NoBmc)?;
        let session = self.bmc.session(bmc);
        let session = session.as_ref();

        let mut restarted = false;
        loop {
            let job = self.start(session).await?;
            log::info!("Node {}: diagnostics job {} started.", node.name, job);

            match self.wait(session, &job).await? {
                JobEnd::Completed => break,
                JobEnd::FailedStart if restarted => return Err(DiagnosticsError::FailedStart(job)),
                JobEnd::FailedStart => {
                    log::warn!("Node {}: diagnostics job {} lost its state, restarting once.", node.name, job);
                    restarted = true;
                }
            }
        }

        let scores = parse_report(&self.fetch_report(session).await?);
        log::info!("Node {}: {} diagnostics test(s) reported.", node.name, scores.len());
        check_scores(&scores)
    }
}

fn job_from_location(reply: &BmcReply) -> Option<JobId> {
    let location = reply.location.as_deref()?;
    location.trim_end_matches('/').rsplit('/').next().filter(|id| !id.is_empty()).map(JobId::from)
}

fn is_already_running(reply: &BmcReply) -> bool {
    matches!(reply.status, 400 | 409) && reply.body.to_ascii_lowercase().contains("already")
}

fn running_diagnostics_job(jobs: &Value) -> Option<JobId> {
    jobs["Members"]
        .as_array()?
        .iter()
        .find(|job| {
            job["JobType"].as_str() == Some(DIAGNOSTICS_JOB_TYPE)
                && !matches!(job["JobState"].as_str(), Some("Completed") | Some("Failed") | Some("CompletedWithErrors"))
        })
        .and_then(|job| job["Id"].as_str())
        .map(JobId::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_id_is_last_location_segment() {
        let reply = BmcReply { status: 202, location: Some("/redfish/v1/Managers/iDRAC.Embedded.1/Jobs/JID_123/".to_string()), body: String::new() };
        assert_eq!(job_from_location(&reply), Some(JobId::new("JID_123")));
    }

    #[test]
    fn running_job_is_found_in_job_list() {
        let jobs = json!({ "Members": [
            { "Id": "JID_1", "JobType": "RemoteDiagnostics", "JobState": "Completed" },
            { "Id": "JID_2", "JobType": "BIOSConfiguration", "JobState": "Running" },
            { "Id": "JID_3", "JobType": "RemoteDiagnostics", "JobState": "Running" }
        ]});
        assert_eq!(running_diagnostics_job(&jobs), Some(JobId::new("JID_3")));
    }

    #[test]
    fn only_conflicts_mentioning_a_running_job_are_adopted() {
        let busy = BmcReply { status: 409, location: None, body: "SYS098: diagnostics job already running".to_string() };
        let denied = BmcReply { status: 409, location: None, body: "insufficient privilege".to_string() };
        assert!(is_already_running(&busy));
        assert!(!is_already_running(&denied));
    }
}
