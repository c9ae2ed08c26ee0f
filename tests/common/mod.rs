#![allow(dead_code)]

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

use node_tempering::domain::cabling::aggregator::{CableChecker, Fabric};
use node_tempering::domain::config::{CleanupPolicy, DiagnosticsConfig, SchedulerConfig, Timeouts, Toggles};
use node_tempering::domain::diagnostics::dispatcher::DiagnosticsDispatcher;
use node_tempering::domain::engine::lifecycle::LifecycleEngine;
use node_tempering::domain::node::inventory::{Disk, ExpectedInterface, HardwareInventory, InventoryRecord, Nic, PowerState};
use node_tempering::domain::node::node::{Node, NodeStatus};
use node_tempering::domain::services::{
    BaremetalNode, BaremetalNodeSpec, BaremetalService, BmcClient, BmcReply, BmcSession, DnsRegistrar, InventorySystem, LldpClient,
    LldpNeighbor, NodePatch, PowerAction, ProvisionTarget, RunSettings, Services, ValidationReport,
};
use node_tempering::domain::task::registry::TaskRegistry;
use node_tempering::domain::task::task::{TaskAction, TaskOutcome};
use node_tempering::domain::utils::id::{BaremetalNodeId, InstanceId, NodeName, SwitchName};
use node_tempering::error::ClientError;

pub const NODE_MAC: &str = "24:4a:97:9a:b7:6b";

/// Ordered record of every call the fakes and scripted tasks receive.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn starting_with(&self, prefix: &str) -> Vec<String> {
        self.entries().into_iter().filter(|entry| entry.starts_with(prefix)).collect()
    }
}

pub fn default_record() -> InventoryRecord {
    InventoryRecord {
        bmc_address: Some("10.0.0.11".to_string()),
        primary_ip: Some("10.1.0.11".to_string()),
        serial: Some("7XK2H53".to_string()),
        interfaces: vec![ExpectedInterface {
            name: "eth0".to_string(),
            mac: Some(NODE_MAC.to_string()),
            upstream_switch: Some(SwitchName::new("leaf-01")),
            upstream_port: Some("swp1".to_string()),
        }],
    }
}

pub fn default_hardware() -> HardwareInventory {
    HardwareInventory {
        vendor: "Dell Inc.".to_string(),
        model: "PowerEdge R650".to_string(),
        serial: "7XK2H53".to_string(),
        cpu_count: 2,
        memory_gib: 256.0,
        disks: vec![Disk { name: "Disk 0".to_string(), size_bytes: 960_197_124_096 }],
        nics: vec![Nic { name: "NIC.Slot.3-1-1".to_string(), mac: "24:4A:97:9A:B7:6B".to_string(), link_up: Some(true) }],
        ..Default::default()
    }
}

pub struct FakeInventory {
    pub log: CallLog,
    pub records: Mutex<HashMap<NodeName, InventoryRecord>>,
    pub due: Mutex<Vec<NodeName>>,
    pub statuses: Mutex<Vec<(NodeName, NodeStatus, String)>>,
    pub fail_fetch: AtomicBool,
}

impl FakeInventory {
    pub fn statuses_for(&self, name: &str) -> Vec<(NodeStatus, String)> {
        self.statuses.lock().unwrap().iter().filter(|(node, _, _)| node.as_str() == name).map(|(_, s, c)| (*s, c.clone())).collect()
    }
}

#[async_trait]
impl InventorySystem for FakeInventory {
    async fn fetch_node(&self, name: &NodeName) -> Result<InventoryRecord, ClientError> {
        self.log.push(format!("inventory:fetch:{}", name));
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(ClientError::Status { status: 503, body: "inventory unavailable".to_string() });
        }
        Ok(self.records.lock().unwrap().get(name).cloned().unwrap_or_else(default_record))
    }

    async fn nodes_with_status(&self, status: &str) -> Result<Vec<NodeName>, ClientError> {
        self.log.push(format!("inventory:query:{}", status));
        Ok(self.due.lock().unwrap().clone())
    }

    async fn set_status(&self, name: &NodeName, status: NodeStatus, comment: &str) -> Result<(), ClientError> {
        self.log.push(format!("inventory:set_status:{}:{}", name, status));
        self.statuses.lock().unwrap().push((name.clone(), status, comment.to_string()));
        Ok(())
    }

    async fn sync_hardware(&self, name: &NodeName, _: &HardwareInventory) -> Result<(), ClientError> {
        self.log.push(format!("inventory:sync:{}", name));
        Ok(())
    }
}

/// BMC whose diagnostics session replays scripted job states.
pub struct FakeBmc {
    pub log: CallLog,
    pub hardware: Mutex<HardwareInventory>,
    pub power: Mutex<PowerState>,
    pub session: Arc<ScriptedSession>,
}

#[async_trait]
impl BmcClient for FakeBmc {
    async fn hardware_inventory(&self, bmc: &str) -> Result<HardwareInventory, ClientError> {
        self.log.push(format!("bmc:inventory:{}", bmc));
        Ok(self.hardware.lock().unwrap().clone())
    }

    async fn power_state(&self, _: &str) -> Result<PowerState, ClientError> {
        Ok(*self.power.lock().unwrap())
    }

    async fn set_power(&self, _: &str, action: PowerAction) -> Result<(), ClientError> {
        self.log.push(format!("bmc:power:{:?}", action));
        *self.power.lock().unwrap() = match action {
            PowerAction::On => PowerState::On,
            PowerAction::ForceOff => PowerState::Off,
        };
        Ok(())
    }

    fn session(&self, _: &str) -> Arc<dyn BmcSession> {
        self.session.clone()
    }
}

#[derive(Default)]
pub struct ScriptedSession {
    /// Replies to self-test start requests; a 202 with a fresh job id when empty.
    pub start_replies: Mutex<VecDeque<BmcReply>>,
    /// Job states returned by successive job polls; `Completed` when empty.
    pub job_states: Mutex<VecDeque<String>>,
    pub job_list: Mutex<Value>,
    pub report: Mutex<String>,
    pub starts: AtomicUsize,
    pub polled: Mutex<Vec<String>>,
}

impl ScriptedSession {
    pub fn with_states(states: &[&str]) -> Self {
        let session = ScriptedSession::default();
        *session.job_states.lock().unwrap() = states.iter().map(|s| s.to_string()).collect();
        *session.report.lock().unwrap() = passing_report();
        session
    }
}

pub fn passing_report() -> String {
    "[Memory Test]\nTest Results : Pass\n[Processor Test]\nTest Results : Pass\n".to_string()
}

#[async_trait]
impl BmcSession for ScriptedSession {
    async fn post(&self, path: &str, _: Value) -> Result<BmcReply, ClientError> {
        if path.ends_with("RunePSADiagnostics") {
            let n = self.starts.fetch_add(1, Ordering::SeqCst) + 1;
            let scripted = self.start_replies.lock().unwrap().pop_front();
            return Ok(scripted.unwrap_or(BmcReply {
                status: 202,
                location: Some(format!("/redfish/v1/Managers/iDRAC.Embedded.1/Jobs/JID_{}", n)),
                body: String::new(),
            }));
        }
        Ok(BmcReply { status: 200, location: None, body: self.report.lock().unwrap().clone() })
    }

    async fn get_json(&self, path: &str) -> Result<Value, ClientError> {
        if path.contains("$expand") {
            return Ok(self.job_list.lock().unwrap().clone());
        }
        self.polled.lock().unwrap().push(path.to_string());
        let state = self.job_states.lock().unwrap().pop_front().unwrap_or_else(|| "Completed".to_string());
        Ok(json!({ "JobState": state, "Message": "scripted" }))
    }
}

/// Bare-metal service whose state transitions complete immediately.
pub struct FakeBaremetal {
    pub log: CallLog,
    pub existing: Mutex<Option<BaremetalNode>>,
    pub state: Mutex<String>,
    pub validation: Mutex<ValidationReport>,
}

#[async_trait]
impl BaremetalService for FakeBaremetal {
    async fn create_node(&self, spec: &BaremetalNodeSpec) -> Result<BaremetalNodeId, ClientError> {
        self.log.push(format!("baremetal:create:{}", spec.name));
        *self.state.lock().unwrap() = "enroll".to_string();
        Ok(BaremetalNodeId::new(format!("bm-{}", spec.name)))
    }

    async fn find_node(&self, _: &NodeName) -> Result<Option<BaremetalNode>, ClientError> {
        Ok(self.existing.lock().unwrap().clone())
    }

    async fn get_node(&self, id: &BaremetalNodeId) -> Result<BaremetalNode, ClientError> {
        Ok(BaremetalNode { id: id.clone(), name: String::new(), provision_state: self.state.lock().unwrap().clone(), last_error: None })
    }

    async fn set_provision_state(&self, _: &BaremetalNodeId, target: ProvisionTarget) -> Result<(), ClientError> {
        self.log.push(format!("baremetal:provision:{}", target.as_str()));
        let next = match target {
            ProvisionTarget::Manage => "manageable",
            ProvisionTarget::Provide | ProvisionTarget::Deleted => "available",
        };
        *self.state.lock().unwrap() = next.to_string();
        Ok(())
    }

    async fn patch_node(&self, _: &BaremetalNodeId, patch: &[NodePatch]) -> Result<(), ClientError> {
        self.log.push(format!("baremetal:patch:{}", patch.len()));
        Ok(())
    }

    async fn validate(&self, _: &BaremetalNodeId) -> Result<ValidationReport, ClientError> {
        Ok(self.validation.lock().unwrap().clone())
    }

    async fn delete_node(&self, id: &BaremetalNodeId) -> Result<(), ClientError> {
        self.log.push(format!("baremetal:delete_node:{}", id));
        Ok(())
    }

    async fn deploy_instance(&self, _: &BaremetalNodeId, image: &str) -> Result<InstanceId, ClientError> {
        self.log.push(format!("baremetal:deploy:{}", image));
        *self.state.lock().unwrap() = "active".to_string();
        Ok(InstanceId::new("instance-1"))
    }

    async fn delete_instance(&self, _: &BaremetalNodeId, instance: &InstanceId) -> Result<(), ClientError> {
        self.log.push(format!("baremetal:delete_instance:{}", instance));
        Ok(())
    }
}

pub struct FakeDns {
    pub log: CallLog,
}

#[async_trait]
impl DnsRegistrar for FakeDns {
    async fn upsert_a_record(&self, fqdn: &str, address: &str) -> Result<(), ClientError> {
        self.log.push(format!("dns:{}:{}", fqdn, address));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeLldp {
    pub neighbors: Mutex<Vec<LldpNeighbor>>,
    pub unreachable: AtomicBool,
    pub queries: AtomicUsize,
}

impl FakeLldp {
    pub fn with_neighbors(neighbors: Vec<LldpNeighbor>) -> Self {
        let lldp = FakeLldp::default();
        *lldp.neighbors.lock().unwrap() = neighbors;
        lldp
    }
}

#[async_trait]
impl LldpClient for FakeLldp {
    async fn neighbors(&self, _: &SwitchName) -> Result<Vec<LldpNeighbor>, ClientError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(ClientError::Status { status: 502, body: "switch unreachable".to_string() });
        }
        Ok(self.neighbors.lock().unwrap().clone())
    }
}

pub fn neighbor(port: &str, remote: &str) -> LldpNeighbor {
    LldpNeighbor { local_port: port.to_string(), remote_id: remote.to_string() }
}

pub fn leaf_fabric(client: Arc<FakeLldp>) -> Fabric {
    Fabric { name: "leaf".to_string(), pattern: Regex::new("^leaf-").unwrap(), client }
}

pub fn fast_timeouts() -> Timeouts {
    let second = Duration::from_secs(1);
    Timeouts { poll_interval: second, power: 10 * second, provision: 10 * second, deploy: 10 * second, lock_retry: 10 * second, lldp_settle: second }
}

pub fn fast_diagnostics() -> DiagnosticsConfig {
    DiagnosticsConfig { job_poll_interval: Duration::from_secs(1), job_timeout: Duration::from_secs(60) }
}

pub fn settings() -> RunSettings {
    RunSettings {
        toggles: Toggles::default(),
        timeouts: fast_timeouts(),
        driver: "redfish".to_string(),
        resource_class: "baremetal".to_string(),
        capabilities: "boot_mode:uefi".to_string(),
        boot_image: "http://images/ipa.qcow2".to_string(),
        dns_zone: Some("lab.example".to_string()),
    }
}

pub fn scheduler_config(max_concurrent_runs: usize, bundles: &[&str]) -> SchedulerConfig {
    SchedulerConfig {
        interval: Duration::from_secs(30),
        max_concurrent_runs,
        due_status: "pending".to_string(),
        bundles: bundles.iter().map(|b| b.to_string()).collect(),
        listen: None,
    }
}

/// Every fake, wired to one shared call log.
pub struct World {
    pub log: CallLog,
    pub inventory: Arc<FakeInventory>,
    pub bmc: Arc<FakeBmc>,
    pub baremetal: Arc<FakeBaremetal>,
    pub dns: Arc<FakeDns>,
    pub lldp: Arc<FakeLldp>,
}

impl World {
    pub fn new() -> Self {
        let log = CallLog::default();
        World {
            inventory: Arc::new(FakeInventory {
                log: log.clone(),
                records: Mutex::new(HashMap::new()),
                due: Mutex::new(Vec::new()),
                statuses: Mutex::new(Vec::new()),
                fail_fetch: AtomicBool::new(false),
            }),
            bmc: Arc::new(FakeBmc {
                log: log.clone(),
                hardware: Mutex::new(default_hardware()),
                power: Mutex::new(PowerState::Off),
                session: Arc::new(ScriptedSession::with_states(&[])),
            }),
            baremetal: Arc::new(FakeBaremetal {
                log: log.clone(),
                existing: Mutex::new(None),
                state: Mutex::new(String::new()),
                validation: Mutex::new(ValidationReport::from([
                    ("boot".to_string(), None),
                    ("deploy".to_string(), None),
                    ("management".to_string(), None),
                    ("power".to_string(), None),
                ])),
            }),
            dns: Arc::new(FakeDns { log: log.clone() }),
            lldp: Arc::new(FakeLldp::with_neighbors(vec![neighbor("swp1", "244a.979a.b76b")])),
            log,
        }
    }

    pub fn services(&self, settings: RunSettings) -> Services {
        let bmc: Arc<dyn BmcClient> = self.bmc.clone();
        Services {
            inventory: self.inventory.clone(),
            bmc: bmc.clone(),
            baremetal: self.baremetal.clone(),
            dns: Some(self.dns.clone()),
            cabling: CableChecker::new(vec![leaf_fabric(self.lldp.clone())]),
            diagnostics: DiagnosticsDispatcher::new(bmc, fast_diagnostics()),
            settings,
        }
    }

    pub fn engine(&self, registry: TaskRegistry) -> LifecycleEngine {
        self.engine_with(registry, settings(), CleanupPolicy::default())
    }

    pub fn engine_with(&self, registry: TaskRegistry, settings: RunSettings, cleanup: CleanupPolicy) -> LifecycleEngine {
        LifecycleEngine::new(Arc::new(self.services(settings)), Arc::new(registry), cleanup)
    }
}

/// Task with a fixed outcome that records when it runs.
pub struct Scripted {
    pub name: &'static str,
    pub outcome: TaskOutcome,
    pub log: CallLog,
}

#[async_trait]
impl TaskAction for Scripted {
    async fn run(&self, _: &mut Node, _: &Services) -> TaskOutcome {
        self.log.push(format!("task:{}", self.name));
        self.outcome.clone()
    }
}

/// Task that enrolls an ephemeral bare-metal record with a test instance.
pub struct Enroll {
    pub log: CallLog,
}

#[async_trait]
impl TaskAction for Enroll {
    async fn run(&self, node: &mut Node, _: &Services) -> TaskOutcome {
        self.log.push("task:enroll");
        node.baremetal_id = Some(BaremetalNodeId::new("bm-ephemeral"));
        node.created_baremetal = true;
        node.instance_id = Some(InstanceId::new("instance-1"));
        TaskOutcome::Success
    }
}

/// Task that blocks until the test releases the gate.
pub struct Gated {
    pub gate: Arc<Semaphore>,
}

#[async_trait]
impl TaskAction for Gated {
    async fn run(&self, _: &mut Node, _: &Services) -> TaskOutcome {
        if let Ok(permit) = self.gate.acquire().await {
            permit.forget();
        }
        TaskOutcome::Success
    }
}

/// Task that tracks how many runs execute it at the same time.
#[derive(Default)]
pub struct Gauge {
    pub current: AtomicUsize,
    pub peak: AtomicUsize,
    pub finished: AtomicUsize,
}

pub struct Measured(pub Arc<Gauge>);

#[async_trait]
impl TaskAction for Measured {
    async fn run(&self, _: &mut Node, _: &Services) -> TaskOutcome {
        let now = self.0.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.0.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(5)).await;
        self.0.current.fetch_sub(1, Ordering::SeqCst);
        self.0.finished.fetch_add(1, Ordering::SeqCst);
        TaskOutcome::Success
    }
}

pub struct Panics;

#[async_trait]
impl TaskAction for Panics {
    async fn run(&self, _: &mut Node, _: &Services) -> TaskOutcome {
        panic!("task exploded");
    }
}
