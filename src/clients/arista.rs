//! LLDP neighbors from Arista EOS switches through eAPI.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::clients::http::{Auth, JsonClient, expand};
use crate::domain::services::{LldpClient, LldpNeighbor};
use crate::domain::utils::id::SwitchName;
use crate::error::ClientError;

pub struct AristaClient {
    /// Endpoint template such as `https://{switch}/command-api`.
    url: String,
    auth: Auth,
}

impl AristaClient {
    pub fn new(url: &str, username: &str, password: &str) -> Result<Self, ClientError> {
        if !url.contains("{switch}") {
            return Err(ClientError::Invalid(format!("arista url '{}' has no {{switch}} placeholder", url)));
        }
        Ok(AristaClient { url: url.to_string(), auth: Auth::Basic { username: username.to_string(), password: password.to_string() } })
    }
}

/// Reads `show lldp neighbors detail`. EOS wraps MAC port ids in quotes.
pub fn parse_neighbors(reply: &Value) -> Result<Vec<LldpNeighbor>, ClientError> {
    if let Some(message) = reply["error"]["message"].as_str() {
        return Err(ClientError::Invalid(message.to_string()));
    }
    let ports = reply["result"][0]["lldpNeighbors"].as_object().ok_or_else(|| ClientError::Decode("eAPI reply has no lldpNeighbors".to_string()))?;

    let mut neighbors = Vec::new();
    for (port, detail) in ports {
        for info in detail["lldpNeighborInfo"].as_array().into_iter().flatten() {
            let remote_id = info["neighborInterfaceInfo"]["interfaceId"].as_str().or_else(|| info["chassisId"].as_str());
            if let Some(remote_id) = remote_id {
                neighbors.push(LldpNeighbor { local_port: port.clone(), remote_id: remote_id.trim_matches('"').to_string() });
            }
        }
    }
    Ok(neighbors)
}

#[async_trait]
impl LldpClient for AristaClient {
    async fn neighbors(&self, switch: &SwitchName) -> Result<Vec<LldpNeighbor>, ClientError> {
        let client = JsonClient::new(&expand(&self.url, "switch", switch.as_str()), self.auth.clone(), false, &[])?;
        let request = json!({
            "jsonrpc": "2.0",
            "method": "runCmds",
            "params": { "version": 1, "cmds": ["show lldp neighbors detail"], "format": "json" },
            "id": "temper",
        });

        let reply: Value = client.post("", &request).await?;
        parse_neighbors(&reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_interface_ids_are_unwrapped() {
        let reply = json!({ "result": [ { "lldpNeighbors": {
            "Ethernet12": { "lldpNeighborInfo": [ {
                "chassisId": "244a.979a.b760",
                "neighborInterfaceInfo": { "interfaceId": "\"244a.979a.b76b\"", "interfaceIdType": "macAddress" }
            } ] },
            "Ethernet13": { "lldpNeighborInfo": [] }
        } } ] });

        let neighbors = parse_neighbors(&reply).unwrap();
        assert_eq!(neighbors, vec![LldpNeighbor { local_port: "Ethernet12".to_string(), remote_id: "244a.979a.b76b".to_string() }]);
    }

    #[test]
    fn eapi_errors_are_reported() {
        let reply = json!({ "error": { "code": 1002, "message": "invalid command" } });
        assert!(matches!(parse_neighbors(&reply), Err(ClientError::Invalid(_))));
    }
}
