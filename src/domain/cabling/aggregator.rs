use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::cabling::mac::macs_match;
use crate::domain::config::FabricConfig;
use crate::domain::node::node::{InterfaceInfo, Node};
use crate::domain::services::{LldpClient, LldpNeighbor};
use crate::domain::utils::id::SwitchName;
use crate::error::ClientError;

/// Every reason a monitored interface failed, reported together.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{}", .reasons.join("; "))]
pub struct CablingError {
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CablingFault {
    LinkDown,
    FabricUnreachable(String),
    LldpMissing { switch: SwitchName },
    WrongPort { seen: String, expected: String },
}

impl CablingFault {
    pub fn code(&self) -> &'static str {
        match self {
            CablingFault::LinkDown => "link_down",
            CablingFault::FabricUnreachable(_) => "fabric_unreachable",
            CablingFault::LldpMissing { .. } => "lldp_missing",
            CablingFault::WrongPort { .. } => "wrong_port",
        }
    }
}

impl fmt::Display for CablingFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CablingFault::LinkDown => write!(f, "link is down"),
            CablingFault::FabricUnreachable(reason) => write!(f, "neighbor table unavailable: {}", reason),
            CablingFault::LldpMissing { switch } => write!(f, "no LLDP neighbor on {} reports this MAC", switch),
            CablingFault::WrongPort { seen, expected } => write!(f, "seen on {} instead of {}", seen, expected),
        }
    }
}

/// A switch fabric whose LLDP table is consulted for interfaces cabled to a
/// switch matching `pattern`.
pub struct Fabric {
    pub name: String,
    pub pattern: Regex,
    pub client: Arc<dyn LldpClient>,
}

/// Checks every monitored interface of a node against its fabric's LLDP view.
#[derive(Default)]
pub struct CableChecker {
    fabrics: Vec<Fabric>,
}

impl CableChecker {
    pub fn new(fabrics: Vec<Fabric>) -> Self {
        CableChecker { fabrics }
    }

    pub fn from_config(configs: &[FabricConfig]) -> Result<Self, ClientError> {
        let fabrics = configs
            .iter()
            .map(|config| {
                Ok(Fabric {
                    name: config.name.clone(),
                    pattern: config.switch_pattern.clone(),
                    client: crate::domain::cabling::fabric::lldp_client(config)?,
                })
            })
            .collect::<Result<Vec<_>, ClientError>>()?;
        Ok(CableChecker::new(fabrics))
    }

    fn fabric_for(&self, switch: &SwitchName) -> Option<&Fabric> {
        self.fabrics.iter().find(|fabric| fabric.pattern.is_match(switch.as_str()))
    }

    pub async fn verify(&self, node: &Node) -> Result<(), CablingError> {
        let mut tables: HashMap<SwitchName, Result<Vec<LldpNeighbor>, String>> = HashMap::new();
        let mut reasons = Vec::new();
        let mut checked = 0usize;

        for (iface, info) in &node.interfaces {
            let Some(switch) = &info.upstream_switch else { continue };
            let Some(fabric) = self.fabric_for(switch) else {
                log::debug!("Node {}: {} is cabled to unmonitored switch {}.", node.name, iface, switch);
                continue;
            };
            checked += 1;

            if !tables.contains_key(switch) {
                let table = fabric.client.neighbors(switch).await.map_err(|e| e.to_string());
                tables.insert(switch.clone(), table);
            }

            let fault = match &tables[switch] {
                Err(reason) => Some(CablingFault::FabricUnreachable(reason.clone())),
                Ok(neighbors) => check_interface(info, switch, neighbors),
            };

            if let Some(fault) = fault {
                log::warn!("Node {}: {} on {} ({}): {}.", node.name, iface, switch, fabric.name, fault);
                reasons.push(format!("{}: {} ({})", iface, fault, fault.code()));
            }
        }

        log::info!("Node {}: checked {} monitored interface(s), {} problem(s).", node.name, checked, reasons.len());

        if reasons.is_empty() { Ok(()) } else { Err(CablingError { reasons }) }
    }
}

fn check_interface(info: &InterfaceInfo, switch: &SwitchName, neighbors: &[LldpNeighbor]) -> Option<CablingFault> {
    if info.link_up == Some(false) {
        return Some(CablingFault::LinkDown);
    }

    let neighbor = info.mac.as_deref().and_then(|mac| neighbors.iter().find(|neighbor| macs_match(&neighbor.remote_id, mac)));
    let Some(neighbor) = neighbor else {
        return Some(CablingFault::LldpMissing { switch: switch.clone() });
    };

    match &info.upstream_port {
        Some(expected) if !neighbor.local_port.eq_ignore_ascii_case(expected) => {
            Some(CablingFault::WrongPort { seen: neighbor.local_port.clone(), expected: expected.clone() })
        }
        _ => None,
    }
}
