//! Interfaces of the external systems a tempering run talks to, and the
//! bundle of handles injected into the engine.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::cabling::aggregator::CableChecker;
use crate::domain::config::{Timeouts, Toggles};
use crate::domain::diagnostics::dispatcher::DiagnosticsDispatcher;
use crate::domain::node::inventory::{HardwareInventory, InventoryRecord, PowerState};
use crate::domain::node::node::NodeStatus;
use crate::domain::utils::id::{BaremetalNodeId, InstanceId, NodeName, SwitchName};
use crate::error::ClientError;

/// System of record for nodes, their status and cabling expectations.
#[async_trait]
pub trait InventorySystem: Send + Sync {
    async fn fetch_node(&self, name: &NodeName) -> Result<InventoryRecord, ClientError>;

    async fn nodes_with_status(&self, status: &str) -> Result<Vec<NodeName>, ClientError>;

    async fn set_status(&self, name: &NodeName, status: NodeStatus, comment: &str) -> Result<(), ClientError>;

    /// Writes the refreshed hardware facts back to the node record.
    async fn sync_hardware(&self, name: &NodeName, hardware: &HardwareInventory) -> Result<(), ClientError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    On,
    ForceOff,
}

/// Out-of-band management of a node.
#[async_trait]
pub trait BmcClient: Send + Sync {
    async fn hardware_inventory(&self, bmc: &str) -> Result<HardwareInventory, ClientError>;

    async fn power_state(&self, bmc: &str) -> Result<PowerState, ClientError>;

    async fn set_power(&self, bmc: &str, action: PowerAction) -> Result<(), ClientError>;

    /// Raw session for vendor specific endpoints (self-test jobs and reports).
    fn session(&self, bmc: &str) -> Arc<dyn BmcSession>;
}

/// Reply of a mutating BMC call. Non-2xx statuses are returned, not raised,
/// because vendor drivers need to inspect conflict bodies.
#[derive(Debug, Clone, PartialEq)]
pub struct BmcReply {
    pub status: u16,
    pub location: Option<String>,
    pub body: String,
}

impl BmcReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait BmcSession: Send + Sync {
    async fn post(&self, path: &str, body: Value) -> Result<BmcReply, ClientError>;

    async fn get_json(&self, path: &str) -> Result<Value, ClientError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct BaremetalNodeSpec {
    pub name: NodeName,
    pub driver: String,
    pub bmc_address: String,
    pub resource_class: String,
    pub macs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BaremetalNode {
    pub id: BaremetalNodeId,
    pub name: String,
    pub provision_state: String,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionTarget {
    Manage,
    Provide,
    Deleted,
}

impl ProvisionTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProvisionTarget::Manage => "manage",
            ProvisionTarget::Provide => "provide",
            ProvisionTarget::Deleted => "deleted",
        }
    }
}

/// One JSON-patch style update of a bare-metal node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodePatch {
    pub path: String,
    pub value: Value,
}

/// Per-interface validation result; `None` entries passed.
pub type ValidationReport = BTreeMap<String, Option<String>>;

/// The bare-metal provisioning service.
#[async_trait]
pub trait BaremetalService: Send + Sync {
    /// Fails with `ClientError::AlreadyExists` when a record with that name exists.
    async fn create_node(&self, spec: &BaremetalNodeSpec) -> Result<BaremetalNodeId, ClientError>;

    async fn find_node(&self, name: &NodeName) -> Result<Option<BaremetalNode>, ClientError>;

    async fn get_node(&self, id: &BaremetalNodeId) -> Result<BaremetalNode, ClientError>;

    /// Fails with `ClientError::Conflict` while the node is locked.
    async fn set_provision_state(&self, id: &BaremetalNodeId, target: ProvisionTarget) -> Result<(), ClientError>;

    async fn patch_node(&self, id: &BaremetalNodeId, patch: &[NodePatch]) -> Result<(), ClientError>;

    async fn validate(&self, id: &BaremetalNodeId) -> Result<ValidationReport, ClientError>;

    async fn delete_node(&self, id: &BaremetalNodeId) -> Result<(), ClientError>;

    /// Deploys `image` on the node as a throw-away test instance.
    async fn deploy_instance(&self, id: &BaremetalNodeId, image: &str) -> Result<InstanceId, ClientError>;

    async fn delete_instance(&self, id: &BaremetalNodeId, instance: &InstanceId) -> Result<(), ClientError>;
}

#[async_trait]
pub trait DnsRegistrar: Send + Sync {
    async fn upsert_a_record(&self, fqdn: &str, address: &str) -> Result<(), ClientError>;
}

/// One row of a switch LLDP neighbor table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LldpNeighbor {
    /// Switch port the neighbor was seen on.
    pub local_port: String,
    /// Chassis or port id advertised by the neighbor, usually its MAC.
    pub remote_id: String,
}

#[async_trait]
pub trait LldpClient: Send + Sync {
    async fn neighbors(&self, switch: &SwitchName) -> Result<Vec<LldpNeighbor>, ClientError>;
}

/// Settings the task actions read at run time.
#[derive(Debug, Clone, Default)]
pub struct RunSettings {
    pub toggles: Toggles,
    pub timeouts: Timeouts,
    pub driver: String,
    pub resource_class: String,
    pub capabilities: String,
    pub boot_image: String,
    pub dns_zone: Option<String>,
}

/// Every collaborator of a run, built once at startup and shared by all runs.
pub struct Services {
    pub inventory: Arc<dyn InventorySystem>,
    pub bmc: Arc<dyn BmcClient>,
    pub baremetal: Arc<dyn BaremetalService>,
    pub dns: Option<Arc<dyn DnsRegistrar>>,
    pub cabling: CableChecker,
    pub diagnostics: DiagnosticsDispatcher,
    pub settings: RunSettings,
}
