use serde::Serialize;
use std::sync::Arc;

use crate::domain::config::CleanupPolicy;
use crate::domain::node::node::{Node, NodeStatus};
use crate::domain::services::Services;
use crate::domain::task::registry::TaskRegistry;
use crate::domain::task::task::TaskOutcome;
use crate::domain::utils::id::NodeName;
use crate::error::{Error, Result};

pub const ALREADY_PROVISIONED_NOTE: &str = "already provisioned";
pub const SUCCESS_NOTE: &str = "tempering passed";

/// How the task loop of a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum RunOutcome {
    /// Every task was attempted.
    Completed,
    /// A task hit the sentinel and the remaining tasks were skipped.
    AlreadyProvisioned { label: String },
    /// Inventory could not be refreshed, no task ran.
    RefreshFailed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskReport {
    pub label: String,
    pub error: Option<String>,
}

/// Summary of one attempt, returned to the CLI and the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub node: NodeName,
    pub status: NodeStatus,
    pub outcome: RunOutcome,
    pub tasks: Vec<TaskReport>,
    /// Comment pushed (or that would have been pushed) to the inventory system.
    pub note: String,
}

impl RunReport {
    pub fn passed(&self) -> bool {
        self.status == NodeStatus::Staged
    }
}

/// Drives one node through its tasks and always cleans up afterwards.
pub struct LifecycleEngine {
    services: Arc<Services>,
    registry: Arc<TaskRegistry>,
    cleanup: CleanupPolicy,
}

impl LifecycleEngine {
    pub fn new(services: Arc<Services>, registry: Arc<TaskRegistry>, cleanup: CleanupPolicy) -> Self {
        LifecycleEngine { services, registry, cleanup }
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Resolves `bundles` and runs them on a fresh node. An unknown bundle is
    /// returned as an error before the node is touched.
    pub async fn temper<S: AsRef<str>>(&self, name: NodeName, bundles: &[S]) -> Result<RunReport> {
        let tasks = self.registry.resolve_all(bundles)?;

        let mut node = Node::new(name);
        node.add_tasks(tasks);

        Ok(self.run(node).await)
    }

    /// Runs the node's tasks in order, then cleans up exactly once.
    pub async fn run(&self, mut node: Node) -> RunReport {
        node.status = NodeStatus::Progress;

        let outcome = match self.refresh(&mut node).await {
            Ok(()) => self.run_tasks(&mut node).await,
            Err(e) => {
                log::error!("Node {}: {}", node.name, e);
                node.status = NodeStatus::Failed;
                RunOutcome::RefreshFailed { reason: e.to_string() }
            }
        };

        if node.status == NodeStatus::Progress {
            node.status = NodeStatus::Staged;
        }

        let note = verdict_note(&node, &outcome);
        self.cleanup(&mut node, &note).await;

        let report = RunReport {
            node: node.name.clone(),
            status: node.status,
            outcome,
            tasks: node.tasks.iter().map(|task| TaskReport { label: task.label.clone(), error: task.error.clone() }).collect(),
            note,
        };

        match report.status {
            NodeStatus::Failed => log::warn!("Node {}: {} ({}).", report.node, report.status, report.note),
            _ => log::info!("Node {}: {} ({}).", report.node, report.status, report.note),
        }
        report
    }

    /// Reads the inventory record and the BMC hardware snapshot into the node.
    async fn refresh(&self, node: &mut Node) -> Result<()> {
        let refresh_error = |reason: String| Error::InventoryRefresh { node: node.name.to_string(), reason };

        let record = self.services.inventory.fetch_node(&node.name).await.map_err(|e| refresh_error(e.to_string()))?;
        let bmc = record.bmc_address.clone().ok_or_else(|| refresh_error("no BMC address recorded".to_string()))?;
        let hardware = self.services.bmc.hardware_inventory(&bmc).await.map_err(|e| refresh_error(e.to_string()))?;

        tracing::debug!(node = %node.name, model = %hardware.model, interfaces = record.interfaces.len(), "inventory refreshed");
        node.apply_inventory(record, hardware);
        Ok(())
    }

    async fn run_tasks(&self, node: &mut Node) -> RunOutcome {
        // Tasks are taken out so the action can borrow the node mutably.
        let mut tasks = std::mem::take(&mut node.tasks);
        let mut outcome = RunOutcome::Completed;

        for task in tasks.iter_mut() {
            log::info!("Node {}: running {}.", node.name, task.label);

            match task.action.run(node, &self.services).await {
                TaskOutcome::Success => {}
                TaskOutcome::AlreadyProvisioned => {
                    log::info!("Node {}: {} reports the node as already provisioned.", node.name, task.label);
                    outcome = RunOutcome::AlreadyProvisioned { label: task.label.clone() };
                    break;
                }
                TaskOutcome::Failed(message) => {
                    log::warn!("Node {}: {} failed: {}", node.name, task.label, message);
                    task.error = Some(message);
                    node.status = NodeStatus::Failed;
                }
            }
        }

        node.tasks = tasks;
        outcome
    }

    /// Tears down whatever the run created and pushes the verdict. Errors are
    /// logged and never change the status.
    async fn cleanup(&self, node: &mut Node, note: &str) {
        let baremetal = &self.services.baremetal;

        if let (Some(id), Some(instance)) = (&node.baremetal_id, node.instance_id.take()) {
            match baremetal.delete_instance(id, &instance).await {
                Ok(()) => log::info!("Node {}: test instance {} removed.", node.name, instance),
                Err(e) => log::error!("Node {}: failed to remove test instance {}: {}", node.name, instance, e),
            }
        }

        if node.created_baremetal && self.cleanup.delete_baremetal_node {
            if let Some(id) = node.baremetal_id.take() {
                match baremetal.delete_node(&id).await {
                    Ok(()) => log::info!("Node {}: bare-metal record {} deleted.", node.name, id),
                    Err(e) => log::error!("Node {}: failed to delete bare-metal record {}: {}", node.name, id, e),
                }
            }
            node.created_baremetal = false;
        }

        if self.cleanup.report_status {
            if let Err(e) = self.services.inventory.set_status(&node.name, node.status, note).await {
                log::error!("Node {}: failed to report status {}: {}", node.name, node.status, e);
            }
        }
    }
}

/// Comment for the inventory system: the failing tasks, the refresh error or a
/// success note.
fn verdict_note(node: &Node, outcome: &RunOutcome) -> String {
    if let RunOutcome::RefreshFailed { reason } = outcome {
        return reason.clone();
    }

    let failures: Vec<String> = node.failed_tasks().filter_map(|task| task.failure_note()).collect();
    if !failures.is_empty() {
        return failures.join("; ");
    }

    match outcome {
        RunOutcome::AlreadyProvisioned { .. } => ALREADY_PROVISIONED_NOTE.to_string(),
        _ => SUCCESS_NOTE.to_string(),
    }
}
