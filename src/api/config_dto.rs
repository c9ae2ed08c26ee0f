use serde::Deserialize;

/// On-disk configuration. Every section is optional; missing values fall back
/// to the defaults below and may be overridden from the environment.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigDto {
    pub inventory: InventoryDto,
    pub baremetal: BaremetalDto,
    pub bmc: BmcDto,
    pub fabrics: Vec<FabricDto>,
    pub dns: Option<DnsDto>,
    pub diagnostics: DiagnosticsDto,
    pub scheduler: SchedulerDto,
    pub cleanup: CleanupDto,
    pub toggles: TogglesDto,
    pub timeouts: TimeoutsDto,
    pub logging: LoggingDto,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InventoryDto {
    pub url: String,
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BaremetalDto {
    pub url: String,
    pub token: String,
    pub driver: String,
    pub resource_class: String,
    pub capabilities: String,
    pub boot_image: String,
}

impl Default for BaremetalDto {
    fn default() -> Self {
        Self {
            url: String::new(),
            token: String::new(),
            driver: "redfish".to_string(),
            resource_class: "baremetal".to_string(),
            capabilities: "boot_mode:uefi".to_string(),
            boot_image: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BmcDto {
    pub username: String,
    pub password: String,
    pub verify_tls: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FabricDto {
    pub name: String,
    /// `cumulus` or `arista`.
    pub kind: String,
    /// Regex matched against the upstream switch name recorded in inventory.
    pub switch_pattern: String,
    /// Endpoint template, `{switch}` is replaced by the switch name.
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DnsDto {
    pub url: String,
    pub token: String,
    pub zone: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiagnosticsDto {
    pub job_poll_interval_secs: u64,
    pub job_timeout_secs: u64,
}

impl Default for DiagnosticsDto {
    fn default() -> Self {
        Self { job_poll_interval_secs: 30, job_timeout_secs: 4 * 60 * 60 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulerDto {
    pub interval_secs: u64,
    pub max_concurrent_runs: usize,
    /// Inventory status that marks a node as due for tempering.
    pub due_status: String,
    pub bundles: Vec<String>,
    /// Bind address of the event listener, disabled when absent.
    pub listen: Option<String>,
}

impl Default for SchedulerDto {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            max_concurrent_runs: 16,
            due_status: "pending".to_string(),
            bundles: vec!["import".to_string(), "cable-check".to_string(), "hardware-check".to_string()],
            listen: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CleanupDto {
    pub delete_baremetal_node: bool,
    pub report_status: bool,
}

impl Default for CleanupDto {
    fn default() -> Self {
        Self { delete_baremetal_node: true, report_status: true }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TogglesDto {
    pub diagnostics: bool,
    pub baremetal: bool,
    pub use_boot_image: bool,
}

impl Default for TogglesDto {
    fn default() -> Self {
        Self { diagnostics: true, baremetal: true, use_boot_image: true }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeoutsDto {
    pub poll_interval_secs: u64,
    pub power_secs: u64,
    pub provision_secs: u64,
    pub deploy_secs: u64,
    pub lock_retry_secs: u64,
    pub lldp_settle_secs: u64,
}

impl Default for TimeoutsDto {
    fn default() -> Self {
        Self { poll_interval_secs: 10, power_secs: 300, provision_secs: 900, deploy_secs: 1800, lock_retry_secs: 120, lldp_settle_secs: 60 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingDto {
    pub level: String,
    pub dir: String,
    pub file: String,
}

impl Default for LoggingDto {
    fn default() -> Self {
        Self { level: "info".to_string(), dir: "logs".to_string(), file: "tempering.log".to_string() }
    }
}
