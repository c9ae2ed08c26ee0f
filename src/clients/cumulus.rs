//! LLDP neighbors from Cumulus Linux switches through the NVUE REST API.

use async_trait::async_trait;
use serde_json::Value;

use crate::clients::http::{Auth, JsonClient, expand};
use crate::domain::services::{LldpClient, LldpNeighbor};
use crate::domain::utils::id::SwitchName;
use crate::error::ClientError;

pub struct CumulusClient {
    /// Endpoint template such as `https://{switch}:8765/nvue_v1`.
    url: String,
    auth: Auth,
}

impl CumulusClient {
    pub fn new(url: &str, username: &str, password: &str) -> Result<Self, ClientError> {
        if !url.contains("{switch}") {
            return Err(ClientError::Invalid(format!("cumulus url '{}' has no {{switch}} placeholder", url)));
        }
        Ok(CumulusClient { url: url.to_string(), auth: Auth::Basic { username: username.to_string(), password: password.to_string() } })
    }
}

/// Flattens `interface -> lldp.neighbor -> port.id` of an NVUE interface dump.
pub fn parse_neighbors(interfaces: &Value) -> Vec<LldpNeighbor> {
    let Some(interfaces) = interfaces.as_object() else {
        return Vec::new();
    };

    interfaces
        .iter()
        .flat_map(|(port, interface)| {
            interface["lldp"]["neighbor"]
                .as_object()
                .into_iter()
                .flat_map(|neighbors| neighbors.values())
                .filter_map(move |neighbor| {
                    let remote_id = neighbor["port"]["id"].as_str().or_else(|| neighbor["chassis"]["chassis-id"].as_str())?;
                    Some(LldpNeighbor { local_port: port.clone(), remote_id: remote_id.to_string() })
                })
        })
        .collect()
}

#[async_trait]
impl LldpClient for CumulusClient {
    async fn neighbors(&self, switch: &SwitchName) -> Result<Vec<LldpNeighbor>, ClientError> {
        // Switch certificates are self-signed on most fabrics.
        let client = JsonClient::new(&expand(&self.url, "switch", switch.as_str()), self.auth.clone(), false, &[])?;
        let interfaces: Value = client.get("/interface?rev=operational").await?;
        Ok(parse_neighbors(&interfaces))
    }
}
