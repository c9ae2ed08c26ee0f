use serde::{Deserialize, Serialize};

use crate::domain::utils::id::SwitchName;

/// What the inventory system knows about a node before any check runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InventoryRecord {
    pub bmc_address: Option<String>,
    pub primary_ip: Option<String>,
    pub serial: Option<String>,
    pub interfaces: Vec<ExpectedInterface>,
}

/// Cabling expectation for one server port.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpectedInterface {
    pub name: String,
    pub mac: Option<String>,
    pub upstream_switch: Option<SwitchName>,
    pub upstream_port: Option<String>,
}

/// Hardware snapshot read from the BMC once per attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HardwareInventory {
    pub vendor: String,
    pub model: String,
    pub serial: String,
    pub cpu_model: String,
    pub cpu_count: u32,
    pub memory_gib: f64,
    pub disks: Vec<Disk>,
    pub nics: Vec<Nic>,
    /// MAC of the interface the node PXE/HTTP-boots from.
    pub boot_mac: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disk {
    pub name: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nic {
    pub name: String,
    pub mac: String,
    pub link_up: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    On,
    Off,
    Unknown,
}

impl PowerState {
    pub fn from_redfish(value: &str) -> Self {
        match value {
            "On" => PowerState::On,
            "Off" => PowerState::Off,
            _ => PowerState::Unknown,
        }
    }
}
