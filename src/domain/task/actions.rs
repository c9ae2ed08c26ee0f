//! The operations behind the standard task labels.

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

use crate::domain::node::inventory::PowerState;
use crate::domain::node::node::Node;
use crate::domain::poll::{poll_for, poll_until, retry_on_conflict};
use crate::domain::services::{BaremetalNodeSpec, NodePatch, PowerAction, ProvisionTarget, Services};
use crate::domain::task::task::{TaskAction, TaskOutcome};
use crate::domain::utils::id::BaremetalNodeId;
use crate::error::ClientError;

/// Validation interfaces that must pass before a node can be deployed.
const REQUIRED_INTERFACES: [&str; 4] = ["boot", "deploy", "management", "power"];

fn skipped(node: &Node, what: &str, why: &str) -> TaskOutcome {
    log::info!("Node {}: skipping {} ({}).", node.name, what, why);
    TaskOutcome::Success
}

/// The node's bare-metal id. A record enrolled before this run is looked up
/// by name and remembered, but never marked as created by this run.
async fn enrolled(node: &mut Node, services: &Services) -> Result<BaremetalNodeId, String> {
    if let Some(id) = &node.baremetal_id {
        return Ok(id.clone());
    }

    match services.baremetal.find_node(&node.name).await {
        Ok(Some(existing)) => {
            log::debug!("Node {} found enrolled as {}.", node.name, existing.id);
            node.baremetal_id = Some(existing.id.clone());
            Ok(existing.id)
        }
        Ok(None) => Err("node is not enrolled in the bare-metal service".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

fn bmc_address(node: &Node) -> Result<String, String> {
    node.bmc_address.clone().ok_or_else(|| "node has no BMC address in inventory".to_string())
}

/// Waits until the bare-metal node reaches `target`. A `... failed` state is
/// terminal; a record that is not visible yet is retried.
async fn wait_for_provision_state(services: &Services, id: &BaremetalNodeId, target: &str, timeout: Duration) -> Result<(), ClientError> {
    let baremetal = &services.baremetal;

    poll_until(services.settings.timeouts.poll_interval, timeout, || async move {
        match baremetal.get_node(id).await {
            Ok(current) if current.provision_state == target => Ok(true),
            Ok(current) if current.provision_state.ends_with("failed") => Err(ClientError::BrokenState(format!(
                "{} while waiting for {}: {}",
                current.provision_state,
                target,
                current.last_error.unwrap_or_default()
            ))),
            Ok(current) => {
                log::debug!("Bare-metal node {} is {}, waiting for {}.", id, current.provision_state, target);
                Ok(false)
            }
            Err(ClientError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    })
    .await
}

async fn transition(services: &Services, id: &BaremetalNodeId, target: ProvisionTarget) -> Result<(), ClientError> {
    let timeouts = &services.settings.timeouts;
    retry_on_conflict(timeouts.poll_interval, timeouts.lock_retry, || services.baremetal.set_provision_state(id, target)).await
}

/// Enrolls the node in the bare-metal service. An existing record is the
/// "already provisioned" sentinel.
pub struct CreateBaremetalNode;

#[async_trait]
impl TaskAction for CreateBaremetalNode {
    async fn run(&self, node: &mut Node, services: &Services) -> TaskOutcome {
        let settings = &services.settings;
        if !settings.toggles.baremetal {
            return skipped(node, "enrollment", "bare-metal provisioning disabled");
        }

        match services.baremetal.find_node(&node.name).await {
            Ok(Some(existing)) => {
                log::info!("Node {} is already enrolled as {}.", node.name, existing.id);
                node.baremetal_id = Some(existing.id);
                return TaskOutcome::AlreadyProvisioned;
            }
            Ok(None) => {}
            Err(e) => return TaskOutcome::Failed(e.to_string()),
        }

        let bmc = match bmc_address(node) {
            Ok(bmc) => bmc,
            Err(e) => return TaskOutcome::Failed(e),
        };

        let spec = BaremetalNodeSpec {
            name: node.name.clone(),
            driver: settings.driver.clone(),
            bmc_address: bmc,
            resource_class: settings.resource_class.clone(),
            macs: node.interfaces.values().filter_map(|iface| iface.mac.clone()).collect(),
        };

        let created =
            retry_on_conflict(settings.timeouts.poll_interval, settings.timeouts.lock_retry, || services.baremetal.create_node(&spec)).await;

        match created {
            Ok(id) => {
                log::info!("Node {} enrolled as bare-metal node {}.", node.name, id);
                node.baremetal_id = Some(id);
                node.created_baremetal = true;
                TaskOutcome::Success
            }
            Err(ClientError::AlreadyExists(_)) => TaskOutcome::AlreadyProvisioned,
            Err(e) => TaskOutcome::Failed(e.to_string()),
        }
    }
}

/// Waits for the new record to become visible, then moves it to `manageable`.
pub struct VerifyCreated;

#[async_trait]
impl TaskAction for VerifyCreated {
    async fn run(&self, node: &mut Node, services: &Services) -> TaskOutcome {
        if !services.settings.toggles.baremetal {
            return skipped(node, "enrollment check", "bare-metal provisioning disabled");
        }
        let id = match enrolled(node, services).await {
            Ok(id) => id,
            Err(e) => return TaskOutcome::Failed(e),
        };
        let timeout = services.settings.timeouts.provision;

        let baremetal = &services.baremetal;
        let id = &id;

        let result: Result<(), ClientError> = async {
            let state = poll_for(services.settings.timeouts.poll_interval, timeout, || async move {
                match baremetal.get_node(id).await {
                    Ok(current) if current.provision_state == "enroll" || current.provision_state == "manageable" => {
                        Ok(Some(current.provision_state))
                    }
                    Ok(_) | Err(ClientError::NotFound(_)) => Ok(None),
                    Err(e) => Err(e),
                }
            })
            .await?;

            if state == "enroll" {
                transition(services, id, ProvisionTarget::Manage).await?;
                wait_for_provision_state(services, id, "manageable", timeout).await?;
            }
            Ok(())
        }
        .await;

        TaskOutcome::from_result(result)
    }
}

/// Sets scheduling properties derived from the hardware snapshot.
pub struct ApplyRules;

impl ApplyRules {
    fn patches(node: &Node, services: &Services) -> Vec<NodePatch> {
        let hardware = &node.hardware;
        let mut patches = vec![
            NodePatch { path: "/resource_class".to_string(), value: json!(services.settings.resource_class) },
            NodePatch { path: "/properties/capabilities".to_string(), value: json!(services.settings.capabilities) },
        ];

        if hardware.cpu_count > 0 {
            patches.push(NodePatch { path: "/properties/cpus".to_string(), value: json!(hardware.cpu_count) });
        }
        if hardware.memory_gib > 0.0 {
            patches.push(NodePatch { path: "/properties/memory_mb".to_string(), value: json!((hardware.memory_gib * 1024.0) as u64) });
        }
        // Root device size in GiB, one GiB short for the partition table.
        if let Some(largest) = hardware.disks.iter().map(|disk| disk.size_bytes).max() {
            let local_gb = (largest / (1 << 30)).saturating_sub(1);
            patches.push(NodePatch { path: "/properties/local_gb".to_string(), value: json!(local_gb) });
        }
        patches
    }
}

#[async_trait]
impl TaskAction for ApplyRules {
    async fn run(&self, node: &mut Node, services: &Services) -> TaskOutcome {
        if !services.settings.toggles.baremetal {
            return skipped(node, "bare-metal properties", "bare-metal provisioning disabled");
        }
        let id = match enrolled(node, services).await {
            Ok(id) => id,
            Err(e) => return TaskOutcome::Failed(e),
        };

        let patches = Self::patches(node, services);
        let timeouts = &services.settings.timeouts;
        let result = retry_on_conflict(timeouts.poll_interval, timeouts.lock_retry, || services.baremetal.patch_node(&id, &patches)).await;

        TaskOutcome::from_result(result)
    }
}

/// Fails when any of the deploy-relevant driver interfaces does not validate.
pub struct ValidateBaremetalNode;

#[async_trait]
impl TaskAction for ValidateBaremetalNode {
    async fn run(&self, node: &mut Node, services: &Services) -> TaskOutcome {
        if !services.settings.toggles.baremetal {
            return skipped(node, "validation", "bare-metal provisioning disabled");
        }
        let id = match enrolled(node, services).await {
            Ok(id) => id,
            Err(e) => return TaskOutcome::Failed(e),
        };

        let report = match services.baremetal.validate(&id).await {
            Ok(report) => report,
            Err(e) => return TaskOutcome::Failed(e.to_string()),
        };

        let problems: Vec<String> = REQUIRED_INTERFACES
            .iter()
            .filter_map(|interface| match report.get(*interface) {
                Some(None) => None,
                Some(Some(reason)) => Some(format!("{}: {}", interface, reason)),
                None => Some(format!("{}: not reported", interface)),
            })
            .collect();

        if problems.is_empty() { TaskOutcome::Success } else { TaskOutcome::Failed(problems.join("; ")) }
    }
}

pub struct PowerOn;

#[async_trait]
impl TaskAction for PowerOn {
    async fn run(&self, node: &mut Node, services: &Services) -> TaskOutcome {
        let bmc = match bmc_address(node) {
            Ok(bmc) => bmc,
            Err(e) => return TaskOutcome::Failed(e),
        };
        let timeouts = &services.settings.timeouts;
        let client = &services.bmc;
        let bmc = bmc.as_str();

        let result: Result<(), ClientError> = async {
            if client.power_state(bmc).await? == PowerState::On {
                return Ok(());
            }
            retry_on_conflict(timeouts.poll_interval, timeouts.lock_retry, || client.set_power(bmc, PowerAction::On)).await?;
            poll_until(timeouts.poll_interval, timeouts.power, || async move { Ok(client.power_state(bmc).await? == PowerState::On) }).await
        }
        .await;

        TaskOutcome::from_result(result)
    }
}

/// Moves the node to `available` so it can be allocated.
pub struct MakeAvailable;

#[async_trait]
impl TaskAction for MakeAvailable {
    async fn run(&self, node: &mut Node, services: &Services) -> TaskOutcome {
        if !services.settings.toggles.baremetal {
            return skipped(node, "make-available", "bare-metal provisioning disabled");
        }
        let id = match enrolled(node, services).await {
            Ok(id) => id,
            Err(e) => return TaskOutcome::Failed(e),
        };

        let result: Result<(), ClientError> = async {
            transition(services, &id, ProvisionTarget::Provide).await?;
            wait_for_provision_state(services, &id, "available", services.settings.timeouts.provision).await
        }
        .await;

        TaskOutcome::from_result(result)
    }
}

/// Deploys the test image so the node announces itself over LLDP.
pub struct BootFromImage;

#[async_trait]
impl TaskAction for BootFromImage {
    async fn run(&self, node: &mut Node, services: &Services) -> TaskOutcome {
        let settings = &services.settings;
        if !settings.toggles.use_boot_image || !settings.toggles.baremetal {
            return skipped(node, "image boot", "boot image disabled");
        }
        if settings.boot_image.is_empty() {
            return TaskOutcome::Failed("no boot image configured".to_string());
        }
        let id = match enrolled(node, services).await {
            Ok(id) => id,
            Err(e) => return TaskOutcome::Failed(e),
        };

        let image = settings.boot_image.as_str();
        let deployed =
            retry_on_conflict(settings.timeouts.poll_interval, settings.timeouts.lock_retry, || services.baremetal.deploy_instance(&id, image)).await;

        match deployed {
            Ok(instance) => {
                log::info!("Node {}: test instance {} deploying {}.", node.name, instance, image);
                node.instance_id = Some(instance);
                TaskOutcome::Success
            }
            Err(e) => TaskOutcome::Failed(e.to_string()),
        }
    }
}

/// Waits for the test instance to become active and for LLDP to settle.
pub struct WaitForBoot;

#[async_trait]
impl TaskAction for WaitForBoot {
    async fn run(&self, node: &mut Node, services: &Services) -> TaskOutcome {
        let settings = &services.settings;
        if !settings.toggles.use_boot_image || !settings.toggles.baremetal {
            return skipped(node, "boot wait", "boot image disabled");
        }
        let id = match enrolled(node, services).await {
            Ok(id) => id,
            Err(e) => return TaskOutcome::Failed(e),
        };
        if node.instance_id.is_none() {
            return TaskOutcome::Failed("no test instance was deployed".to_string());
        }

        if let Err(e) = wait_for_provision_state(services, &id, "active", settings.timeouts.deploy).await {
            return TaskOutcome::Failed(e.to_string());
        }

        tokio::time::sleep(settings.timeouts.lldp_settle).await;
        TaskOutcome::Success
    }
}

pub struct VerifyCabling;

#[async_trait]
impl TaskAction for VerifyCabling {
    async fn run(&self, node: &mut Node, services: &Services) -> TaskOutcome {
        TaskOutcome::from_result(services.cabling.verify(node).await)
    }
}

/// Runs the vendor self-test. Models without a driver are skipped.
pub struct RunDiagnostics;

#[async_trait]
impl TaskAction for RunDiagnostics {
    async fn run(&self, node: &mut Node, services: &Services) -> TaskOutcome {
        if !services.settings.toggles.diagnostics {
            return skipped(node, "diagnostics", "diagnostics disabled");
        }

        match services.diagnostics.select(&node.hardware.model) {
            Some(driver) => TaskOutcome::from_result(driver.run(node).await),
            None => skipped(node, "diagnostics", &format!("no self-test driver for model '{}'", node.hardware.model)),
        }
    }
}

/// Pushes the refreshed hardware snapshot to the inventory system.
pub struct SyncInventory;

#[async_trait]
impl TaskAction for SyncInventory {
    async fn run(&self, node: &mut Node, services: &Services) -> TaskOutcome {
        TaskOutcome::from_result(services.inventory.sync_hardware(&node.name, &node.hardware).await)
    }
}

pub struct CreateDnsRecord;

#[async_trait]
impl TaskAction for CreateDnsRecord {
    async fn run(&self, node: &mut Node, services: &Services) -> TaskOutcome {
        let (Some(dns), Some(zone)) = (&services.dns, &services.settings.dns_zone) else {
            return TaskOutcome::Failed("DNS is not configured".to_string());
        };
        let Some(address) = node.primary_ip.as_deref() else {
            return TaskOutcome::Failed("node has no primary IP in inventory".to_string());
        };

        let fqdn = format!("{}.{}", node.name, zone);
        TaskOutcome::from_result(dns.upsert_a_record(&fqdn, address).await)
    }
}
