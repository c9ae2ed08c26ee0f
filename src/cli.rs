//! Command-line surface of the `temper` binary.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use node_tempering::domain::task::registry::{CABLE_CHECK, DNS, HARDWARE_CHECK, IMPORT, INVENTORY_SYNC, PREPARE, VALIDATE};

/// Acceptance testing and provisioning of bare-metal nodes
#[derive(Parser)]
#[command(name = "temper", version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (JSON); defaults plus TEMPER_* variables when absent
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Maximum number of nodes tempered at the same time
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,

    /// Print run reports as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Which nodes a command applies to.
#[derive(Args, Clone, Debug)]
#[group(required = true, multiple = false)]
pub struct Target {
    /// A single node by name
    #[arg(long)]
    pub node: Option<String>,

    /// Every node with this tempering status in the inventory system
    #[arg(long)]
    pub query: Option<String>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Bare-metal service operations
    Baremetal {
        #[command(subcommand)]
        action: BaremetalCommand,
    },

    /// Hardware and cabling checks
    Diagnostics {
        #[command(subcommand)]
        action: DiagnosticsCommand,
    },

    /// Inventory system operations
    Inventory {
        #[command(subcommand)]
        action: InventoryCommand,
    },

    /// DNS records
    Dns {
        #[command(subcommand)]
        action: DnsCommand,
    },

    /// Run an explicit list of bundles
    Run {
        #[command(flatten)]
        target: Target,

        /// Bundle to run; repeat to run several in order
        #[arg(long = "bundle", required = true)]
        bundles: Vec<String>,
    },

    /// Poll the inventory system and temper due nodes until interrupted
    Daemon,

    /// List the registered bundles and their tasks
    Bundles,
}

#[derive(Subcommand)]
pub enum BaremetalCommand {
    /// Enroll, validate and make nodes available
    Create(Target),
    /// Boot a test image and verify cabling
    Test(Target),
    /// Enroll nodes and apply scheduling properties
    Prepare(Target),
    /// Validate the driver interfaces
    Validate(Target),
}

#[derive(Subcommand)]
pub enum DiagnosticsCommand {
    /// Run the vendor hardware self-test
    Hardwarecheck(Target),
    /// Compare LLDP neighbors with the expected cabling
    Cablecheck(Target),
}

#[derive(Subcommand)]
pub enum InventoryCommand {
    /// Push the hardware snapshot to the inventory system
    Sync(Target),
}

#[derive(Subcommand)]
pub enum DnsCommand {
    /// Create or replace the node's A record
    Create(Target),
}

impl Command {
    /// Target and bundles of a one-shot command; `None` for `daemon` and `bundles`.
    pub fn plan(&self) -> Option<(&Target, Vec<String>)> {
        let single = |target, bundle: &str| Some((target, vec![bundle.to_string()]));

        match self {
            Command::Baremetal { action } => match action {
                BaremetalCommand::Create(target) => single(target, IMPORT),
                BaremetalCommand::Test(target) => single(target, CABLE_CHECK),
                BaremetalCommand::Prepare(target) => single(target, PREPARE),
                BaremetalCommand::Validate(target) => single(target, VALIDATE),
            },
            Command::Diagnostics { action } => match action {
                DiagnosticsCommand::Hardwarecheck(target) => single(target, HARDWARE_CHECK),
                DiagnosticsCommand::Cablecheck(target) => single(target, CABLE_CHECK),
            },
            Command::Inventory { action: InventoryCommand::Sync(target) } => single(target, INVENTORY_SYNC),
            Command::Dns { action: DnsCommand::Create(target) } => single(target, DNS),
            Command::Run { target, bundles } => Some((target, bundles.clone())),
            Command::Daemon | Command::Bundles => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subcommands_map_to_bundles() {
        let cli = Cli::parse_from(["temper", "diagnostics", "hardwarecheck", "--node", "r1-n01"]);
        let (target, bundles) = cli.command.plan().unwrap();
        assert_eq!(target.node.as_deref(), Some("r1-n01"));
        assert_eq!(bundles, vec![HARDWARE_CHECK.to_string()]);
    }

    #[test]
    fn run_keeps_bundle_order() {
        let cli = Cli::parse_from(["temper", "run", "--query", "pending", "--bundle", "import", "--bundle", "cable-check"]);
        let (target, bundles) = cli.command.plan().unwrap();
        assert_eq!(target.query.as_deref(), Some("pending"));
        assert_eq!(bundles, vec!["import".to_string(), "cable-check".to_string()]);
    }

    #[test]
    fn a_target_is_required() {
        assert!(Cli::try_parse_from(["temper", "baremetal", "create"]).is_err());
        assert!(Cli::try_parse_from(["temper", "baremetal", "create", "--node", "a", "--query", "pending"]).is_err());
    }
}
