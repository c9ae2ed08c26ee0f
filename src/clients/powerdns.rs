//! A records through the PowerDNS authoritative server API.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::clients::http::{Auth, JsonClient};
use crate::domain::config::DnsConfig;
use crate::domain::services::DnsRegistrar;
use crate::error::ClientError;

const TTL: u32 = 3600;

pub struct PowerDnsClient {
    client: JsonClient,
    zone: String,
}

impl PowerDnsClient {
    pub fn new(config: &DnsConfig) -> Result<Self, ClientError> {
        let auth = Auth::Header { name: "x-api-key", value: config.endpoint.token.clone() };
        Ok(PowerDnsClient { client: JsonClient::new(&config.endpoint.url, auth, true, &[])?, zone: config.zone.clone() })
    }
}

/// PowerDNS wants fully qualified names with the trailing dot.
fn qualified(name: &str) -> String {
    format!("{}.", name.trim_end_matches('.'))
}

pub fn replace_a_record(fqdn: &str, address: &str) -> Value {
    json!({ "rrsets": [ {
        "name": qualified(fqdn),
        "type": "A",
        "ttl": TTL,
        "changetype": "REPLACE",
        "records": [ { "content": address, "disabled": false } ]
    } ] })
}

#[async_trait]
impl DnsRegistrar for PowerDnsClient {
    async fn upsert_a_record(&self, fqdn: &str, address: &str) -> Result<(), ClientError> {
        let path = format!("/api/v1/servers/localhost/zones/{}", qualified(&self.zone));
        self.client.patch(&path, &replace_a_record(fqdn, address)).await?;
        log::info!("DNS: {} -> {}", fqdn, address);
        Ok(())
    }
}
