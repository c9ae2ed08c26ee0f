use regex::Regex;
use std::sync::{Arc, LazyLock};

use crate::domain::config::DiagnosticsConfig;
use crate::domain::diagnostics::Diagnostics;
use crate::domain::diagnostics::dell::DellDiagnostics;
use crate::domain::services::BmcClient;

static DELL_MODELS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^\s*(dell\s+)?poweredge\b").unwrap());

pub type DriverConstructor = fn(Arc<dyn BmcClient>, DiagnosticsConfig) -> Box<dyn Diagnostics>;

fn dell(bmc: Arc<dyn BmcClient>, config: DiagnosticsConfig) -> Box<dyn Diagnostics> {
    Box::new(DellDiagnostics::new(bmc, config))
}

/// Picks a self-test driver by matching the system model reported by the BMC.
pub struct DiagnosticsDispatcher {
    drivers: Vec<(Regex, DriverConstructor)>,
    bmc: Arc<dyn BmcClient>,
    config: DiagnosticsConfig,
}

impl DiagnosticsDispatcher {
    /// Dispatcher with the drivers shipped in this crate.
    pub fn new(bmc: Arc<dyn BmcClient>, config: DiagnosticsConfig) -> Self {
        DiagnosticsDispatcher { drivers: vec![(DELL_MODELS.clone(), dell as DriverConstructor)], bmc, config }
    }

    /// Dispatcher without any driver; every model is skipped.
    pub fn empty(bmc: Arc<dyn BmcClient>, config: DiagnosticsConfig) -> Self {
        DiagnosticsDispatcher { drivers: Vec::new(), bmc, config }
    }

    /// Adds a driver; earlier entries win on overlapping patterns.
    pub fn register(&mut self, pattern: Regex, constructor: DriverConstructor) {
        self.drivers.push((pattern, constructor));
    }

    pub fn select(&self, model: &str) -> Option<Box<dyn Diagnostics>> {
        self.drivers
            .iter()
            .find(|(pattern, _)| pattern.is_match(model))
            .map(|(_, constructor)| constructor(self.bmc.clone(), self.config.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::diagnostics::DiagnosticsError;
    use crate::domain::node::inventory::{HardwareInventory, PowerState};
    use crate::domain::node::node::Node;
    use crate::domain::services::{BmcSession, PowerAction};
    use crate::error::ClientError;
    use async_trait::async_trait;
    use std::time::Duration;

    struct NoBmc;

    #[async_trait]
    impl BmcClient for NoBmc {
        async fn hardware_inventory(&self, _: &str) -> Result<HardwareInventory, ClientError> {
            Err(ClientError::Invalid("unused".to_string()))
        }
        async fn power_state(&self, _: &str) -> Result<PowerState, ClientError> {
            Ok(PowerState::Unknown)
        }
        async fn set_power(&self, _: &str, _: PowerAction) -> Result<(), ClientError> {
            Ok(())
        }
        fn session(&self, _: &str) -> Arc<dyn BmcSession> {
            unimplemented!()
        }
    }

    fn dispatcher() -> DiagnosticsDispatcher {
        let config = DiagnosticsConfig { job_poll_interval: Duration::from_secs(1), job_timeout: Duration::from_secs(10) };
        DiagnosticsDispatcher::new(Arc::new(NoBmc), config)
    }

    #[test]
    fn poweredge_models_select_a_driver() {
        assert!(dispatcher().select("PowerEdge R650").is_some());
        assert!(dispatcher().select("Dell PowerEdge R7525").is_some());
    }

    struct Vendor;

    #[async_trait]
    impl Diagnostics for Vendor {
        async fn run(&self, _: &Node) -> Result<(), DiagnosticsError> {
            Ok(())
        }
    }

    fn vendor(_: Arc<dyn BmcClient>, _: DiagnosticsConfig) -> Box<dyn Diagnostics> {
        Box::new(Vendor)
    }

    #[test]
    fn registered_drivers_extend_an_empty_table() {
        let config = DiagnosticsConfig { job_poll_interval: Duration::from_secs(1), job_timeout: Duration::from_secs(10) };
        let mut dispatcher = DiagnosticsDispatcher::empty(Arc::new(NoBmc), config);
        assert!(dispatcher.select("PowerEdge R650").is_none());

        dispatcher.register(Regex::new(r"(?i)^thinksystem\b").unwrap(), vendor);

        assert!(dispatcher.select("ThinkSystem SR650").is_some());
        assert!(dispatcher.select("PowerEdge R650").is_none());
    }

    #[test]
    fn unknown_models_are_skipped() {
        assert!(dispatcher().select("ProLiant DL360 Gen10").is_none());
        assert!(dispatcher().select("").is_none());
    }
}
