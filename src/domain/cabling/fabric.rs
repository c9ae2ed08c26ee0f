use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::clients::arista::AristaClient;
use crate::clients::cumulus::CumulusClient;
use crate::domain::config::FabricConfig;
use crate::domain::services::LldpClient;
use crate::error::{ClientError, Error};

/// Switch operating systems an LLDP neighbor table can be read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FabricKind {
    Cumulus,
    Arista,
}

impl FromStr for FabricKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cumulus" | "nvue" => Ok(FabricKind::Cumulus),
            "arista" | "eos" => Ok(FabricKind::Arista),
            other => Err(Error::Config(format!("unknown fabric kind '{}'", other))),
        }
    }
}

impl fmt::Display for FabricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FabricKind::Cumulus => f.write_str("cumulus"),
            FabricKind::Arista => f.write_str("arista"),
        }
    }
}

/// Builds the neighbor-table client matching the fabric's kind.
pub fn lldp_client(config: &FabricConfig) -> Result<Arc<dyn LldpClient>, ClientError> {
    let client: Arc<dyn LldpClient> = match config.kind {
        FabricKind::Cumulus => Arc::new(CumulusClient::new(&config.url, &config.username, &config.password)?),
        FabricKind::Arista => Arc::new(AristaClient::new(&config.url, &config.username, &config.password)?),
    };
    Ok(client)
}
