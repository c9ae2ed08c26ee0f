use regex::Regex;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::api::config_dto::{ConfigDto, FabricDto};
use crate::domain::cabling::fabric::FabricKind;
use crate::error::{Error, Result};
use crate::loader::parser::parse_json_file;

/// Runtime configuration, built from a [`ConfigDto`] plus environment overrides.
#[derive(Debug, Clone)]
pub struct Config {
    pub inventory: EndpointConfig,
    pub baremetal: BaremetalConfig,
    pub bmc: BmcConfig,
    pub fabrics: Vec<FabricConfig>,
    pub dns: Option<DnsConfig>,
    pub diagnostics: DiagnosticsConfig,
    pub scheduler: SchedulerConfig,
    pub cleanup: CleanupPolicy,
    pub toggles: Toggles,
    pub timeouts: Timeouts,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub url: String,
    pub token: String,
}

#[derive(Debug, Clone)]
pub struct BaremetalConfig {
    pub endpoint: EndpointConfig,
    pub driver: String,
    pub resource_class: String,
    pub capabilities: String,
    pub boot_image: String,
}

#[derive(Debug, Clone)]
pub struct BmcConfig {
    pub username: String,
    pub password: String,
    pub verify_tls: bool,
}

#[derive(Debug, Clone)]
pub struct FabricConfig {
    pub name: String,
    pub kind: FabricKind,
    pub switch_pattern: Regex,
    pub url: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct DnsConfig {
    pub endpoint: EndpointConfig,
    pub zone: String,
}

#[derive(Debug, Clone)]
pub struct DiagnosticsConfig {
    pub job_poll_interval: Duration,
    pub job_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub interval: Duration,
    pub max_concurrent_runs: usize,
    pub due_status: String,
    pub bundles: Vec<String>,
    pub listen: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupPolicy {
    /// Delete the bare-metal record created by the run once it is over.
    pub delete_baremetal_node: bool,
    /// Push the verdict to the inventory system.
    pub report_status: bool,
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        Self { delete_baremetal_node: true, report_status: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Toggles {
    pub diagnostics: bool,
    pub baremetal: bool,
    pub use_boot_image: bool,
}

impl Default for Toggles {
    fn default() -> Self {
        Self { diagnostics: true, baremetal: true, use_boot_image: true }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub poll_interval: Duration,
    pub power: Duration,
    pub provision: Duration,
    pub deploy: Duration,
    pub lock_retry: Duration,
    pub lldp_settle: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            power: Duration::from_secs(300),
            provision: Duration::from_secs(900),
            deploy: Duration::from_secs(1800),
            lock_retry: Duration::from_secs(120),
            lldp_settle: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub dir: String,
    pub file: String,
}

impl Config {
    /// Loads the configuration file (defaults when `path` is `None`) and applies
    /// `TEMPER_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut dto = match path {
            Some(path) => parse_json_file::<ConfigDto>(path)?,
            None => ConfigDto::default(),
        };

        apply_env_overrides(&mut dto, |key| std::env::var(key).ok());

        Config::try_from(dto)
    }
}

impl TryFrom<ConfigDto> for Config {
    type Error = Error;

    fn try_from(dto: ConfigDto) -> Result<Self> {
        if dto.scheduler.max_concurrent_runs == 0 {
            return Err(Error::Config("scheduler.maxConcurrentRuns must be at least 1".to_string()));
        }
        if dto.timeouts.poll_interval_secs == 0 || dto.diagnostics.job_poll_interval_secs == 0 {
            return Err(Error::Config("poll intervals must be at least one second".to_string()));
        }

        let fabrics = dto.fabrics.into_iter().map(FabricConfig::try_from).collect::<Result<Vec<_>>>()?;

        let dns = dto.dns.filter(|dns| !dns.url.is_empty()).map(|dns| DnsConfig {
            endpoint: EndpointConfig { url: dns.url, token: dns.token },
            zone: dns.zone.trim_end_matches('.').to_string(),
        });

        let secs = Duration::from_secs;

        Ok(Config {
            inventory: EndpointConfig { url: dto.inventory.url, token: dto.inventory.token },
            baremetal: BaremetalConfig {
                endpoint: EndpointConfig { url: dto.baremetal.url, token: dto.baremetal.token },
                driver: dto.baremetal.driver,
                resource_class: dto.baremetal.resource_class,
                capabilities: dto.baremetal.capabilities,
                boot_image: dto.baremetal.boot_image,
            },
            bmc: BmcConfig { username: dto.bmc.username, password: dto.bmc.password, verify_tls: dto.bmc.verify_tls },
            fabrics,
            dns,
            diagnostics: DiagnosticsConfig {
                job_poll_interval: secs(dto.diagnostics.job_poll_interval_secs),
                job_timeout: secs(dto.diagnostics.job_timeout_secs),
            },
            scheduler: SchedulerConfig {
                interval: secs(dto.scheduler.interval_secs.max(1)),
                max_concurrent_runs: dto.scheduler.max_concurrent_runs,
                due_status: dto.scheduler.due_status,
                bundles: dto.scheduler.bundles,
                listen: dto.scheduler.listen,
            },
            cleanup: CleanupPolicy { delete_baremetal_node: dto.cleanup.delete_baremetal_node, report_status: dto.cleanup.report_status },
            toggles: Toggles { diagnostics: dto.toggles.diagnostics, baremetal: dto.toggles.baremetal, use_boot_image: dto.toggles.use_boot_image },
            timeouts: Timeouts {
                poll_interval: secs(dto.timeouts.poll_interval_secs),
                power: secs(dto.timeouts.power_secs),
                provision: secs(dto.timeouts.provision_secs),
                deploy: secs(dto.timeouts.deploy_secs),
                lock_retry: secs(dto.timeouts.lock_retry_secs),
                lldp_settle: secs(dto.timeouts.lldp_settle_secs),
            },
            logging: LoggingConfig { level: dto.logging.level, dir: dto.logging.dir, file: dto.logging.file },
        })
    }
}

impl TryFrom<FabricDto> for FabricConfig {
    type Error = Error;

    fn try_from(dto: FabricDto) -> Result<Self> {
        let kind = FabricKind::from_str(&dto.kind)?;
        let switch_pattern = Regex::new(&dto.switch_pattern)
            .map_err(|e| Error::Config(format!("fabric {}: invalid switchPattern '{}': {}", dto.name, dto.switch_pattern, e)))?;

        Ok(FabricConfig { name: dto.name, kind, switch_pattern, url: dto.url, username: dto.username, password: dto.password })
    }
}

/// Overrides credentials, endpoints and toggles from the environment. `lookup`
/// is injected so tests do not have to mutate the process environment.
pub fn apply_env_overrides(dto: &mut ConfigDto, lookup: impl Fn(&str) -> Option<String>) {
    let set = |target: &mut String, key: &str| {
        if let Some(value) = lookup(key) {
            *target = value;
        }
    };

    set(&mut dto.inventory.url, "TEMPER_INVENTORY_URL");
    set(&mut dto.inventory.token, "TEMPER_INVENTORY_TOKEN");
    set(&mut dto.baremetal.url, "TEMPER_BAREMETAL_URL");
    set(&mut dto.baremetal.token, "TEMPER_BAREMETAL_TOKEN");
    set(&mut dto.baremetal.boot_image, "TEMPER_BOOT_IMAGE");
    set(&mut dto.bmc.username, "TEMPER_BMC_USERNAME");
    set(&mut dto.bmc.password, "TEMPER_BMC_PASSWORD");

    if lookup("TEMPER_DNS_URL").is_some() || lookup("TEMPER_DNS_TOKEN").is_some() {
        let dns = dto.dns.get_or_insert_with(Default::default);
        set(&mut dns.url, "TEMPER_DNS_URL");
        set(&mut dns.token, "TEMPER_DNS_TOKEN");
    }

    let flag = |target: &mut bool, key: &str| {
        if let Some(value) = lookup(key) {
            match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "on" | "yes" => *target = true,
                "0" | "false" | "off" | "no" => *target = false,
                other => log::warn!("Ignoring {}={}: expected a boolean.", key, other),
            }
        }
    };

    flag(&mut dto.toggles.diagnostics, "TEMPER_DIAGNOSTICS");
    flag(&mut dto.toggles.baremetal, "TEMPER_BAREMETAL");
    flag(&mut dto.toggles.use_boot_image, "TEMPER_USE_BOOT_IMAGE");
}
