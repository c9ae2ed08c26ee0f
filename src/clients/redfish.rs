//! Redfish access to node BMCs.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::clients::http::{Auth, JsonClient};
use crate::domain::config::BmcConfig;
use crate::domain::node::inventory::{Disk, HardwareInventory, Nic, PowerState};
use crate::domain::services::{BmcClient, BmcReply, BmcSession, PowerAction};
use crate::error::ClientError;

const SYSTEMS: &str = "/redfish/v1/Systems";

pub struct RedfishClient {
    config: BmcConfig,
}

impl RedfishClient {
    pub fn new(config: &BmcConfig) -> Self {
        RedfishClient { config: config.clone() }
    }

    fn connect(&self, bmc: &str) -> Result<RedfishSession, ClientError> {
        let auth = Auth::Basic { username: self.config.username.clone(), password: self.config.password.clone() };
        let client = JsonClient::new(&format!("https://{}", bmc), auth, self.config.verify_tls, &[])?;
        Ok(RedfishSession { client })
    }

    /// Path of the first (on servers: only) computer system.
    async fn system_path(session: &RedfishSession) -> Result<String, ClientError> {
        let systems = session.get_json(SYSTEMS).await?;
        systems["Members"][0]["@odata.id"].as_str().map(str::to_string).ok_or_else(|| ClientError::Decode("no computer system listed".to_string()))
    }

    async fn members(session: &RedfishSession, collection: &str) -> Result<Vec<Value>, ClientError> {
        let listing = match session.get_json(collection).await {
            Ok(listing) => listing,
            Err(ClientError::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut members = Vec::new();
        for link in listing["Members"].as_array().into_iter().flatten() {
            if let Some(path) = link["@odata.id"].as_str() {
                members.push(session.get_json(path).await?);
            }
        }
        Ok(members)
    }
}

#[async_trait]
impl BmcClient for RedfishClient {
    async fn hardware_inventory(&self, bmc: &str) -> Result<HardwareInventory, ClientError> {
        let session = self.connect(bmc)?;
        let path = Self::system_path(&session).await?;
        let system = session.get_json(&path).await?;

        let mut hardware = parse_system(&system);
        hardware.nics = Self::members(&session, &format!("{}/EthernetInterfaces", path)).await?.iter().filter_map(parse_nic).collect();
        hardware.disks = Self::members(&session, &format!("{}/SimpleStorage", path)).await?.iter().flat_map(parse_disks).collect();
        Ok(hardware)
    }

    async fn power_state(&self, bmc: &str) -> Result<PowerState, ClientError> {
        let session = self.connect(bmc)?;
        let path = Self::system_path(&session).await?;
        let system = session.get_json(&path).await?;
        Ok(PowerState::from_redfish(system["PowerState"].as_str().unwrap_or_default()))
    }

    async fn set_power(&self, bmc: &str, action: PowerAction) -> Result<(), ClientError> {
        let session = self.connect(bmc)?;
        let path = Self::system_path(&session).await?;
        let reset_type = match action {
            PowerAction::On => "On",
            PowerAction::ForceOff => "ForceOff",
        };

        session.client.send(Method::POST, &format!("{}/Actions/ComputerSystem.Reset", path), Some(&json!({ "ResetType": reset_type }))).await?;
        Ok(())
    }

    fn session(&self, bmc: &str) -> Arc<dyn BmcSession> {
        match self.connect(bmc) {
            Ok(session) => Arc::new(session),
            Err(e) => Arc::new(BrokenSession(e.to_string())),
        }
    }
}

pub struct RedfishSession {
    client: JsonClient,
}

#[async_trait]
impl BmcSession for RedfishSession {
    async fn post(&self, path: &str, body: Value) -> Result<BmcReply, ClientError> {
        let response = self.client.request(Method::POST, path).json(&body).send().await?;
        let status = response.status().as_u16();
        let location = response.headers().get(reqwest::header::LOCATION).and_then(|value| value.to_str().ok()).map(str::to_string);
        let body = response.text().await?;
        Ok(BmcReply { status, location, body })
    }

    async fn get_json(&self, path: &str) -> Result<Value, ClientError> {
        self.client.get(path).await
    }
}

/// Stands in for a session whose HTTP client could not be built.
struct BrokenSession(String);

#[async_trait]
impl BmcSession for BrokenSession {
    async fn post(&self, _: &str, _: Value) -> Result<BmcReply, ClientError> {
        Err(ClientError::Invalid(self.0.clone()))
    }

    async fn get_json(&self, _: &str) -> Result<Value, ClientError> {
        Err(ClientError::Invalid(self.0.clone()))
    }
}

fn text(value: &Value) -> String {
    value.as_str().unwrap_or_default().trim().to_string()
}

pub fn parse_system(system: &Value) -> HardwareInventory {
    HardwareInventory {
        vendor: text(&system["Manufacturer"]),
        model: text(&system["Model"]),
        serial: text(&system["SerialNumber"]),
        cpu_model: text(&system["ProcessorSummary"]["Model"]),
        cpu_count: system["ProcessorSummary"]["Count"].as_u64().unwrap_or_default() as u32,
        memory_gib: system["MemorySummary"]["TotalSystemMemoryGiB"].as_f64().unwrap_or_default(),
        ..Default::default()
    }
}

pub fn parse_nic(interface: &Value) -> Option<Nic> {
    let mac = interface["MACAddress"].as_str().or_else(|| interface["PermanentMACAddress"].as_str())?;
    let link_up = match interface["LinkStatus"].as_str() {
        Some("LinkUp") => Some(true),
        Some("LinkDown") | Some("NoLink") => Some(false),
        _ => None,
    };
    Some(Nic { name: text(&interface["Id"]), mac: mac.to_string(), link_up })
}

pub fn parse_disks(storage: &Value) -> Vec<Disk> {
    storage["Devices"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|device| Some(Disk { name: text(&device["Name"]), size_bytes: device["CapacityBytes"].as_u64()? }))
        .collect()
}
