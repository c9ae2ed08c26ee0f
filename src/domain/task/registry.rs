use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::task::actions::{
    ApplyRules, BootFromImage, CreateBaremetalNode, CreateDnsRecord, MakeAvailable, PowerOn, RunDiagnostics, SyncInventory,
    ValidateBaremetalNode, VerifyCabling, VerifyCreated, WaitForBoot,
};
use crate::domain::task::task::{Task, TaskAction};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown task bundle '{0}'")]
    UnknownBundle(String),
}

pub const IMPORT: &str = "import";
pub const CABLE_CHECK: &str = "cable-check";
pub const HARDWARE_CHECK: &str = "hardware-check";
pub const INVENTORY_SYNC: &str = "inventory-sync";
pub const DNS: &str = "dns";
pub const PREPARE: &str = "prepare";
pub const VALIDATE: &str = "validate";

pub fn action<A: TaskAction + 'static>(action: A) -> Arc<dyn TaskAction> {
    Arc::new(action)
}

#[derive(Clone)]
struct TaskTemplate {
    label: String,
    action: Arc<dyn TaskAction>,
}

/// Static table of task bundles, built once at startup. Bundle names are the
/// vocabulary shared with the CLI and with event senders.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    bundles: BTreeMap<String, Vec<TaskTemplate>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        TaskRegistry { bundles: BTreeMap::new() }
    }

    /// The bundles the tempering workflow ships with.
    pub fn standard() -> Self {
        let create = action(CreateBaremetalNode);
        let verify_created = action(VerifyCreated);
        let apply_rules = action(ApplyRules);
        let validate = action(ValidateBaremetalNode);

        let mut registry = TaskRegistry::new();
        registry.register(
            IMPORT,
            vec![
                ("create", create.clone()),
                ("verify-created", verify_created.clone()),
                ("apply-rules", apply_rules.clone()),
                ("validate", validate.clone()),
                ("power-on", action(PowerOn)),
                ("make-available", action(MakeAvailable)),
            ],
        );
        registry.register(
            CABLE_CHECK,
            vec![("boot-from-image", action(BootFromImage)), ("wait-for-boot", action(WaitForBoot)), ("verify-cabling", action(VerifyCabling))],
        );
        registry.register(HARDWARE_CHECK, vec![("run-diagnostics", action(RunDiagnostics))]);
        registry.register(INVENTORY_SYNC, vec![("push-status", action(SyncInventory))]);
        registry.register(DNS, vec![("create-dns-record", action(CreateDnsRecord))]);
        registry.register(PREPARE, vec![("create", create), ("verify-created", verify_created), ("apply-rules", apply_rules)]);
        registry.register(VALIDATE, vec![("validate", validate)]);
        registry
    }

    /// Adds or replaces a bundle.
    pub fn register<L: Into<String>>(&mut self, name: impl Into<String>, tasks: Vec<(L, Arc<dyn TaskAction>)>) {
        let templates = tasks.into_iter().map(|(label, action)| TaskTemplate { label: label.into(), action }).collect();
        self.bundles.insert(name.into(), templates);
    }

    /// Fresh tasks for `bundle`, in bundle order.
    pub fn resolve(&self, bundle: &str) -> Result<Vec<Task>, RegistryError> {
        let templates = self.bundles.get(bundle).ok_or_else(|| RegistryError::UnknownBundle(bundle.to_string()))?;

        Ok(templates.iter().map(|template| Task::new(template.label.clone(), template.action.clone())).collect())
    }

    /// Resolves several bundles into one list, keeping the requested order.
    pub fn resolve_all<S: AsRef<str>>(&self, bundles: &[S]) -> Result<Vec<Task>, RegistryError> {
        let mut tasks = Vec::new();
        for bundle in bundles {
            tasks.extend(self.resolve(bundle.as_ref())?);
        }
        Ok(tasks)
    }

    pub fn contains(&self, bundle: &str) -> bool {
        self.bundles.contains_key(bundle)
    }

    pub fn bundle_names(&self) -> impl Iterator<Item = &str> {
        self.bundles.keys().map(String::as_str)
    }

    pub fn labels(&self, bundle: &str) -> Option<Vec<&str>> {
        self.bundles.get(bundle).map(|templates| templates.iter().map(|t| t.label.as_str()).collect())
    }
}
