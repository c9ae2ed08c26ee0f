use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::domain::config::SchedulerConfig;
use crate::domain::engine::lifecycle::{LifecycleEngine, RunReport};
use crate::domain::node::node::Node;
use crate::domain::scheduler::in_progress::InProgressSet;
use crate::domain::task::registry::RegistryError;
use crate::domain::utils::id::NodeName;
use crate::error::Result;

/// Result of asking the scheduler to run a node.
#[derive(Debug)]
pub enum Dispatch {
    Started(JoinHandle<RunReport>),
    /// A run for the node is already queued or executing; nothing was started.
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub discovered: usize,
    pub dispatched: usize,
    pub already_running: usize,
}

/// Discovers due nodes and runs them concurrently, never twice at once.
pub struct Scheduler {
    engine: Arc<LifecycleEngine>,
    in_progress: InProgressSet,
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(engine: Arc<LifecycleEngine>, config: SchedulerConfig) -> Self {
        Scheduler {
            engine,
            in_progress: InProgressSet::new(),
            permits: Arc::new(Semaphore::new(config.max_concurrent_runs.max(1))),
            tracker: TaskTracker::new(),
            config,
        }
    }

    pub fn in_progress(&self) -> &InProgressSet {
        &self.in_progress
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Fails on the first configured bundle the registry does not know. The
    /// daemon calls this before its first tick.
    pub fn check_bundles(&self) -> std::result::Result<(), RegistryError> {
        let registry = self.engine.registry();
        match self.config.bundles.iter().find(|bundle| !registry.contains(bundle)) {
            Some(unknown) => Err(RegistryError::UnknownBundle(unknown.clone())),
            None => Ok(()),
        }
    }

    /// Starts a run of `bundles` on `name` unless one is already in progress.
    /// Bundles are resolved first, so an unknown bundle never claims the node.
    pub fn dispatch<S: AsRef<str>>(&self, name: NodeName, bundles: &[S]) -> std::result::Result<Dispatch, RegistryError> {
        let tasks = self.engine.registry().resolve_all(bundles)?;

        let Some(claim) = self.in_progress.try_claim(&name) else {
            log::debug!("Node {} is already being tempered, not dispatching.", name);
            return Ok(Dispatch::AlreadyRunning);
        };

        let mut node = Node::new(name);
        node.add_tasks(tasks);

        let engine = self.engine.clone();
        let permits = self.permits.clone();

        let handle = self.tracker.spawn(async move {
            let _claim = claim;
            // The semaphore is never closed.
            let _permit = permits.acquire_owned().await.ok();

            let name = node.name.clone();
            log::info!("Node {}: tempering started.", name);
            let report = engine.run(node).await;
            log::info!("Node {}: tempering finished with status {}.", name, report.status);
            report
        });

        Ok(Dispatch::Started(handle))
    }

    /// Dispatches every node currently due according to the inventory system.
    pub async fn tick(&self) -> Result<TickSummary> {
        let due = self.engine.services().inventory.nodes_with_status(&self.config.due_status).await?;

        let mut summary = TickSummary { discovered: due.len(), ..Default::default() };
        for name in due {
            match self.dispatch(name, &self.config.bundles)? {
                Dispatch::Started(_) => summary.dispatched += 1,
                Dispatch::AlreadyRunning => summary.already_running += 1,
            }
        }

        log::info!(
            "Scheduler tick: {} due, {} dispatched, {} already running, {} in progress.",
            summary.discovered,
            summary.dispatched,
            summary.already_running,
            self.in_progress.len()
        );
        Ok(summary)
    }

    /// Runs `bundles` on each node and waits for all reports. Nodes already in
    /// progress elsewhere are left out of the result.
    pub async fn run_batch<S: AsRef<str>>(&self, names: Vec<NodeName>, bundles: &[S]) -> Result<Vec<RunReport>> {
        let mut handles = Vec::with_capacity(names.len());
        for name in names {
            match self.dispatch(name.clone(), bundles)? {
                Dispatch::Started(handle) => handles.push(handle),
                Dispatch::AlreadyRunning => log::warn!("Node {} is already being tempered, skipped.", name),
            }
        }

        let mut reports = Vec::with_capacity(handles.len());
        for joined in futures::future::join_all(handles).await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => log::error!("A tempering run aborted: {}", e),
            }
        }
        Ok(reports)
    }

    /// Ticks on the configured interval until `shutdown` fires, then waits for
    /// the runs still in flight.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        log::info!(
            "Scheduler started: every {:?}, up to {} concurrent run(s), bundles {:?}.",
            self.config.interval,
            self.config.max_concurrent_runs,
            self.config.bundles
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        log::error!("Scheduler tick failed: {}", e);
                    }
                }
            }
        }

        self.shutdown().await;
    }

    /// Closes the run tracker and waits for every run to finish.
    pub async fn shutdown(&self) {
        log::info!("Scheduler stopping, waiting for {} run(s).", self.in_progress.len());
        self.tracker.close();
        self.tracker.wait().await;
        log::info!("Scheduler stopped.");
    }
}
