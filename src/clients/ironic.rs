//! OpenStack Ironic as the bare-metal provisioning service.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;

use crate::clients::http::{Auth, JsonClient};
use crate::domain::config::{BaremetalConfig, BmcConfig};
use crate::domain::services::{BaremetalNode, BaremetalNodeSpec, BaremetalService, NodePatch, ProvisionTarget, ValidationReport};
use crate::domain::utils::id::{BaremetalNodeId, InstanceId, NodeName};
use crate::error::ClientError;

const API_VERSION: &str = "1.78";

#[derive(Debug, Deserialize)]
struct NodeDto {
    uuid: String,
    name: Option<String>,
    #[serde(default)]
    provision_state: String,
    last_error: Option<String>,
}

impl From<NodeDto> for BaremetalNode {
    fn from(dto: NodeDto) -> Self {
        BaremetalNode { id: BaremetalNodeId::new(dto.uuid), name: dto.name.unwrap_or_default(), provision_state: dto.provision_state, last_error: dto.last_error }
    }
}

#[derive(Debug, Deserialize)]
struct InterfaceValidation {
    result: Option<bool>,
    reason: Option<String>,
}

pub struct IronicClient {
    client: JsonClient,
    bmc: BmcConfig,
}

impl IronicClient {
    pub fn new(config: &BaremetalConfig, bmc: &BmcConfig) -> Result<Self, ClientError> {
        let auth = Auth::Header { name: "x-auth-token", value: config.endpoint.token.clone() };
        let client = JsonClient::new(&config.endpoint.url, auth, true, &[("x-openstack-ironic-api-version", API_VERSION)])?;
        Ok(IronicClient { client, bmc: bmc.clone() })
    }

    fn driver_info(&self, spec: &BaremetalNodeSpec) -> Value {
        json!({
            "redfish_address": format!("https://{}", spec.bmc_address),
            "redfish_system_id": "/redfish/v1/Systems/System.Embedded.1",
            "redfish_username": self.bmc.username,
            "redfish_password": self.bmc.password,
            "redfish_verify_ca": self.bmc.verify_tls,
        })
    }

    async fn provision(&self, id: &BaremetalNodeId, target: &str) -> Result<(), ClientError> {
        self.client.put(&format!("/v1/nodes/{}/states/provision", id), &json!({ "target": target })).await
    }
}

fn patch_document(patch: &[NodePatch]) -> Value {
    Value::Array(patch.iter().map(|p| json!({ "op": "add", "path": p.path, "value": p.value })).collect())
}

fn validation_report(raw: BTreeMap<String, InterfaceValidation>) -> ValidationReport {
    raw.into_iter()
        .map(|(interface, validation)| {
            let problem = match validation.result {
                Some(true) => None,
                _ => Some(validation.reason.unwrap_or_else(|| "not supported".to_string())),
            };
            (interface, problem)
        })
        .collect()
}

#[async_trait]
impl BaremetalService for IronicClient {
    async fn create_node(&self, spec: &BaremetalNodeSpec) -> Result<BaremetalNodeId, ClientError> {
        let body = json!({
            "name": spec.name.as_str(),
            "driver": spec.driver,
            "resource_class": spec.resource_class,
            "driver_info": self.driver_info(spec),
        });

        let created: NodeDto = self.client.post("/v1/nodes", &body).await.map_err(|e| match e {
            ClientError::Conflict(_) => ClientError::AlreadyExists(format!("bare-metal node {}", spec.name)),
            other => other,
        })?;

        for mac in &spec.macs {
            let _: Value = self.client.post("/v1/ports", &json!({ "node_uuid": created.uuid, "address": mac })).await?;
        }

        Ok(BaremetalNodeId::new(created.uuid))
    }

    async fn find_node(&self, name: &NodeName) -> Result<Option<BaremetalNode>, ClientError> {
        match self.client.get::<NodeDto>(&format!("/v1/nodes/{}", name)).await {
            Ok(node) => Ok(Some(node.into())),
            Err(ClientError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn get_node(&self, id: &BaremetalNodeId) -> Result<BaremetalNode, ClientError> {
        self.client.get::<NodeDto>(&format!("/v1/nodes/{}", id)).await.map(BaremetalNode::from)
    }

    async fn set_provision_state(&self, id: &BaremetalNodeId, target: ProvisionTarget) -> Result<(), ClientError> {
        self.provision(id, target.as_str()).await
    }

    async fn patch_node(&self, id: &BaremetalNodeId, patch: &[NodePatch]) -> Result<(), ClientError> {
        self.client.patch(&format!("/v1/nodes/{}", id), &patch_document(patch)).await
    }

    async fn validate(&self, id: &BaremetalNodeId) -> Result<ValidationReport, ClientError> {
        let raw: BTreeMap<String, InterfaceValidation> = self.client.get(&format!("/v1/nodes/{}/validate", id)).await?;
        Ok(validation_report(raw))
    }

    async fn delete_node(&self, id: &BaremetalNodeId) -> Result<(), ClientError> {
        self.client.delete(&format!("/v1/nodes/{}", id)).await
    }

    async fn deploy_instance(&self, id: &BaremetalNodeId, image: &str) -> Result<InstanceId, ClientError> {
        let instance = InstanceId::new(uuid::Uuid::new_v4().to_string());
        let patch = [
            NodePatch { path: "/instance_info/image_source".to_string(), value: json!(image) },
            NodePatch { path: "/instance_uuid".to_string(), value: json!(instance.as_str()) },
        ];

        self.client.patch(&format!("/v1/nodes/{}", id), &patch_document(&patch)).await?;
        self.provision(id, "active").await?;
        Ok(instance)
    }

    async fn delete_instance(&self, id: &BaremetalNodeId, instance: &InstanceId) -> Result<(), ClientError> {
        log::debug!("Undeploying instance {} from bare-metal node {}.", instance, id);
        self.provision(id, ProvisionTarget::Deleted.as_str()).await
    }
}
