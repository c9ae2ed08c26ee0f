use std::sync::Arc;

use crate::clients::ironic::IronicClient;
use crate::clients::netbox::NetboxClient;
use crate::clients::powerdns::PowerDnsClient;
use crate::clients::redfish::RedfishClient;
use crate::domain::cabling::aggregator::CableChecker;
use crate::domain::config::Config;
use crate::domain::diagnostics::dispatcher::DiagnosticsDispatcher;
use crate::domain::engine::lifecycle::LifecycleEngine;
use crate::domain::services::{BmcClient, DnsRegistrar, RunSettings, Services};
use crate::domain::task::registry::TaskRegistry;
use crate::error::{Error, Result};

pub mod api;
pub mod clients;
pub mod domain;
pub mod error;
pub mod loader;
pub mod logger;

/// Connects every collaborator named in `config`.
pub fn build_services(config: &Config) -> Result<Services> {
    if config.inventory.url.is_empty() {
        return Err(Error::Config("inventory.url is not set".to_string()));
    }
    if config.toggles.baremetal && config.baremetal.endpoint.url.is_empty() {
        return Err(Error::Config("baremetal.url is not set and bare-metal provisioning is enabled".to_string()));
    }

    let bmc: Arc<dyn BmcClient> = Arc::new(RedfishClient::new(&config.bmc));
    let dns = match &config.dns {
        Some(dns) => Some(Arc::new(PowerDnsClient::new(dns)?) as Arc<dyn DnsRegistrar>),
        None => None,
    };

    Ok(Services {
        inventory: Arc::new(NetboxClient::new(&config.inventory)?),
        bmc: bmc.clone(),
        baremetal: Arc::new(IronicClient::new(&config.baremetal, &config.bmc)?),
        dns,
        cabling: CableChecker::from_config(&config.fabrics)?,
        diagnostics: DiagnosticsDispatcher::new(bmc, config.diagnostics.clone()),
        settings: RunSettings {
            toggles: config.toggles,
            timeouts: config.timeouts,
            driver: config.baremetal.driver.clone(),
            resource_class: config.baremetal.resource_class.clone(),
            capabilities: config.baremetal.capabilities.clone(),
            boot_image: config.baremetal.boot_image.clone(),
            dns_zone: config.dns.as_ref().map(|dns| dns.zone.clone()),
        },
    })
}

/// The engine with the standard bundles, ready to run nodes.
pub fn build_engine(config: &Config) -> Result<LifecycleEngine> {
    let services = build_services(config)?;
    log::info!(
        "Services ready: {} fabric(s), DNS {}, diagnostics {}, bare-metal {}.",
        config.fabrics.len(),
        if config.dns.is_some() { "on" } else { "off" },
        if config.toggles.diagnostics { "on" } else { "off" },
        if config.toggles.baremetal { "on" } else { "off" }
    );

    Ok(LifecycleEngine::new(Arc::new(services), Arc::new(TaskRegistry::standard()), config.cleanup))
}
