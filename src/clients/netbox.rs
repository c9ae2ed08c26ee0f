//! NetBox as the inventory system. Tempering state lives in the custom
//! fields `tempering_status` and `tempering_comment` of the device.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::clients::http::{Auth, JsonClient};
use crate::domain::config::EndpointConfig;
use crate::domain::node::inventory::{ExpectedInterface, HardwareInventory, InventoryRecord};
use crate::domain::node::node::NodeStatus;
use crate::domain::services::InventorySystem;
use crate::domain::utils::id::{NodeName, SwitchName};
use crate::error::ClientError;

#[derive(Debug, Deserialize)]
struct Page<T> {
    next: Option<String>,
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct Device {
    id: u64,
    name: Option<String>,
    #[serde(default)]
    serial: String,
    primary_ip: Option<IpRef>,
    oob_ip: Option<IpRef>,
    #[serde(default)]
    custom_fields: Value,
}

#[derive(Debug, Deserialize)]
struct IpRef {
    address: String,
}

#[derive(Debug, Deserialize)]
struct Interface {
    name: String,
    mac_address: Option<String>,
    #[serde(default)]
    mgmt_only: bool,
    #[serde(default)]
    link_peers: Vec<LinkPeer>,
}

#[derive(Debug, Deserialize)]
struct LinkPeer {
    name: Option<String>,
    device: Option<PeerDevice>,
}

#[derive(Debug, Deserialize)]
struct PeerDevice {
    name: Option<String>,
}

pub struct NetboxClient {
    client: JsonClient,
}

impl NetboxClient {
    pub fn new(config: &EndpointConfig) -> Result<Self, ClientError> {
        let auth = Auth::Header { name: "authorization", value: format!("Token {}", config.token) };
        Ok(NetboxClient { client: JsonClient::new(&config.url, auth, true, &[("accept", "application/json")])? })
    }

    /// Every result of a filtered list. Later pages follow the absolute `next` link.
    async fn all<T: for<'de> Deserialize<'de>>(&self, path: &str, query: &[(&str, &str)]) -> Result<Vec<T>, ClientError> {
        let mut page: Page<T> = self.client.get_query(path, query).await?;
        let mut items = Vec::new();
        loop {
            items.extend(page.results);
            match page.next {
                Some(next) => page = self.client.get(&next).await?,
                None => return Ok(items),
            }
        }
    }

    async fn device(&self, name: &NodeName) -> Result<Device, ClientError> {
        let devices: Vec<Device> = self.all("/api/dcim/devices/", &[("name", name.as_str())]).await?;
        devices.into_iter().next().ok_or_else(|| ClientError::NotFound(format!("device {}", name)))
    }
}

/// Strips the prefix length NetBox keeps on addresses (`10.0.0.5/24`).
fn host_address(ip: &IpRef) -> String {
    ip.address.split('/').next().unwrap_or_default().to_string()
}

fn bmc_address(device: &Device) -> Option<String> {
    device
        .oob_ip
        .as_ref()
        .map(host_address)
        .or_else(|| device.custom_fields["bmc_address"].as_str().map(str::to_string))
}

fn expected_interface(interface: Interface) -> ExpectedInterface {
    let peer = interface.link_peers.into_iter().next();
    ExpectedInterface {
        name: interface.name,
        mac: interface.mac_address,
        upstream_switch: peer.as_ref().and_then(|p| p.device.as_ref()).and_then(|d| d.name.as_deref()).map(SwitchName::from),
        upstream_port: peer.and_then(|p| p.name),
    }
}

#[async_trait]
impl InventorySystem for NetboxClient {
    async fn fetch_node(&self, name: &NodeName) -> Result<InventoryRecord, ClientError> {
        let device = self.device(name).await?;
        let device_id = device.id.to_string();
        let interfaces: Vec<Interface> = self.all("/api/dcim/interfaces/", &[("device_id", device_id.as_str())]).await?;

        Ok(InventoryRecord {
            bmc_address: bmc_address(&device),
            primary_ip: device.primary_ip.as_ref().map(host_address),
            serial: Some(device.serial).filter(|serial| !serial.is_empty()),
            interfaces: interfaces.into_iter().filter(|i| !i.mgmt_only).map(expected_interface).collect(),
        })
    }

    async fn nodes_with_status(&self, status: &str) -> Result<Vec<NodeName>, ClientError> {
        let devices: Vec<Device> = self.all("/api/dcim/devices/", &[("cf_tempering_status", status), ("limit", "200")]).await?;
        Ok(devices.into_iter().filter_map(|device| device.name).map(NodeName::new).collect())
    }

    async fn set_status(&self, name: &NodeName, status: NodeStatus, comment: &str) -> Result<(), ClientError> {
        let device = self.device(name).await?;
        let body = json!({ "custom_fields": { "tempering_status": status.as_str(), "tempering_comment": comment } });
        self.client.patch(&format!("/api/dcim/devices/{}/", device.id), &body).await
    }

    async fn sync_hardware(&self, name: &NodeName, hardware: &HardwareInventory) -> Result<(), ClientError> {
        let device = self.device(name).await?;
        let body = json!({
            "serial": hardware.serial,
            "custom_fields": {
                "cpu_model": hardware.cpu_model,
                "cpu_count": hardware.cpu_count,
                "memory_gib": hardware.memory_gib,
                "disk_count": hardware.disks.len(),
            }
        });
        self.client.patch(&format!("/api/dcim/devices/{}/", device.id), &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interface_takes_switch_and_port_from_link_peer() {
        let interface: Interface = serde_json::from_value(json!({
            "name": "eth0",
            "mac_address": "24:4A:97:9A:B7:6B",
            "mgmt_only": false,
            "link_peers": [ { "name": "swp7", "device": { "name": "leaf-03" } } ]
        }))
        .unwrap();

        let expected = expected_interface(interface);
        assert_eq!(expected.upstream_switch, Some(SwitchName::new("leaf-03")));
        assert_eq!(expected.upstream_port.as_deref(), Some("swp7"));
    }

    #[test]
    fn bmc_address_prefers_oob_ip() {
        let device: Device = serde_json::from_value(json!({
            "id": 4, "name": "r1-n01", "serial": "",
            "primary_ip": { "address": "10.1.0.11/24" },
            "oob_ip": { "address": "10.0.0.11/24" },
            "custom_fields": { "bmc_address": "10.9.9.9" }
        }))
        .unwrap();

        assert_eq!(bmc_address(&device).as_deref(), Some("10.0.0.11"));
        assert_eq!(device.primary_ip.as_ref().map(host_address).as_deref(), Some("10.1.0.11"));
    }
}
