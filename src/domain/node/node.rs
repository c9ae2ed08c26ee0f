use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::cabling::mac::macs_match;
use crate::domain::node::inventory::{HardwareInventory, InventoryRecord};
use crate::domain::task::task::Task;
use crate::domain::utils::id::{BaremetalNodeId, InstanceId, NodeName, SwitchName};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Pending,
    Progress,
    Staged,
    Failed,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Pending => "pending",
            NodeStatus::Progress => "progress",
            NodeStatus::Staged => "staged",
            NodeStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observed state of one server port, merged from inventory and BMC data.
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceInfo {
    pub mac: Option<String>,
    /// `None` when the BMC does not report link state for the port.
    pub link_up: Option<bool>,
    pub upstream_switch: Option<SwitchName>,
    pub upstream_port: Option<String>,
}

/// Unit of work of one tempering attempt. Built fresh for every run.
#[derive(Debug)]
pub struct Node {
    pub name: NodeName,
    pub baremetal_id: Option<BaremetalNodeId>,
    /// Set when the bare-metal record was created by this run (and is therefore ours to delete).
    pub created_baremetal: bool,
    pub instance_id: Option<InstanceId>,
    pub bmc_address: Option<String>,
    pub primary_ip: Option<String>,
    pub hardware: HardwareInventory,
    pub interfaces: BTreeMap<String, InterfaceInfo>,
    pub tasks: Vec<Task>,
    pub status: NodeStatus,
}

impl Node {
    pub fn new(name: NodeName) -> Self {
        Node {
            name,
            baremetal_id: None,
            created_baremetal: false,
            instance_id: None,
            bmc_address: None,
            primary_ip: None,
            hardware: HardwareInventory::default(),
            interfaces: BTreeMap::new(),
            tasks: Vec::new(),
            status: NodeStatus::Pending,
        }
    }

    /// Appends resolved tasks. A node can collect several bundles before it runs.
    pub fn add_tasks(&mut self, tasks: impl IntoIterator<Item = Task>) {
        self.tasks.extend(tasks);
    }

    pub fn bmc(&self) -> Option<&str> {
        self.bmc_address.as_deref()
    }

    pub fn failed_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|task| task.error.is_some())
    }

    /// Merges the inventory record and the BMC snapshot into the node.
    pub fn apply_inventory(&mut self, record: InventoryRecord, hardware: HardwareInventory) {
        self.bmc_address = record.bmc_address;
        self.primary_ip = record.primary_ip;

        self.interfaces = record
            .interfaces
            .into_iter()
            .map(|expected| {
                let nic = hardware.nics.iter().find(|nic| match &expected.mac {
                    Some(mac) => macs_match(mac, &nic.mac),
                    None => nic.name == expected.name,
                });

                let info = InterfaceInfo {
                    mac: expected.mac.or_else(|| nic.map(|nic| nic.mac.clone())),
                    link_up: nic.and_then(|nic| nic.link_up),
                    upstream_switch: expected.upstream_switch,
                    upstream_port: expected.upstream_port,
                };
                (expected.name, info)
            })
            .collect();

        self.hardware = hardware;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::node::inventory::{ExpectedInterface, Nic};

    #[test]
    fn inventory_merge_takes_link_state_from_the_bmc() {
        let mut node = Node::new(NodeName::new("r1-n01"));
        let record = InventoryRecord {
            bmc_address: Some("10.0.0.11".to_string()),
            primary_ip: Some("10.1.0.11".to_string()),
            serial: None,
            interfaces: vec![
                ExpectedInterface {
                    name: "eth0".to_string(),
                    mac: Some("24:4A:97:9A:B7:6B".to_string()),
                    upstream_switch: Some(SwitchName::new("tor-r1-a")),
                    upstream_port: Some("swp1".to_string()),
                },
                ExpectedInterface { name: "eth1".to_string(), mac: None, upstream_switch: None, upstream_port: None },
            ],
        };
        let hardware = HardwareInventory {
            nics: vec![
                Nic { name: "NIC.1".to_string(), mac: "24-4a-97-9a-b7-6b".to_string(), link_up: Some(false) },
                Nic { name: "eth1".to_string(), mac: "aa:bb:cc:dd:ee:ff".to_string(), link_up: None },
            ],
            ..Default::default()
        };

        node.apply_inventory(record, hardware);

        assert_eq!(node.bmc(), Some("10.0.0.11"));
        assert_eq!(node.interfaces["eth0"].link_up, Some(false));
        assert_eq!(node.interfaces["eth1"].mac.as_deref(), Some("aa:bb:cc:dd:ee:ff"));
        assert_eq!(node.interfaces["eth1"].link_up, None);
    }
}
