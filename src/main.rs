mod cli;

use anyhow::{Context, bail};
use clap::Parser;
use colored::Colorize;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::cli::{Cli, Command, Target};
use node_tempering::domain::config::Config;
use node_tempering::domain::engine::lifecycle::{LifecycleEngine, RunReport};
use node_tempering::domain::node::node::NodeStatus;
use node_tempering::domain::scheduler::scheduler::Scheduler;
use node_tempering::domain::scheduler::webhook;
use node_tempering::domain::task::registry::TaskRegistry;
use node_tempering::domain::utils::id::NodeName;
use node_tempering::{build_engine, logger};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Command::Bundles = cli.command {
        print_bundles(&TaskRegistry::standard());
        return Ok(());
    }

    let mut config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(concurrency) = cli.concurrency {
        config.scheduler.max_concurrent_runs = concurrency.max(1);
    }
    logger::init(&config.logging);

    let engine = Arc::new(build_engine(&config).context("failed to connect services")?);

    match cli.command.plan() {
        Some((target, bundles)) => {
            let names = resolve_target(&engine, target).await?;
            let scheduler = Scheduler::new(engine, config.scheduler.clone());
            let reports = scheduler.run_batch(names, &bundles).await?;
            print_reports(&reports, cli.json)
        }
        None => daemon(engine, &config).await,
    }
}

async fn resolve_target(engine: &LifecycleEngine, target: &Target) -> anyhow::Result<Vec<NodeName>> {
    match (&target.node, &target.query) {
        (Some(node), _) => Ok(vec![NodeName::new(node.as_str())]),
        (None, Some(status)) => {
            let names = engine
                .services()
                .inventory
                .nodes_with_status(status)
                .await
                .with_context(|| format!("inventory query for status '{}' failed", status))?;
            log::info!("{} node(s) with status '{}'.", names.len(), status);
            Ok(names)
        }
        (None, None) => bail!("either --node or --query is required"),
    }
}

async fn daemon(engine: Arc<LifecycleEngine>, config: &Config) -> anyhow::Result<()> {
    let scheduler = Arc::new(Scheduler::new(engine, config.scheduler.clone()));
    scheduler.check_bundles().context("invalid scheduler.bundles")?;
    let shutdown = CancellationToken::new();

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Interrupt received, shutting down.");
        }
        signal.cancel();
    });

    let listener = match &config.scheduler.listen {
        Some(addr) => {
            let (addr, scheduler, shutdown) = (addr.clone(), scheduler.clone(), shutdown.clone());
            Some(tokio::spawn(async move { webhook::serve(&addr, scheduler, shutdown).await }))
        }
        None => None,
    };

    scheduler.run(shutdown.clone()).await;

    if let Some(listener) = listener {
        listener.await.context("event listener panicked")?.context("event listener failed")?;
    }
    Ok(())
}

fn print_bundles(registry: &TaskRegistry) {
    for name in registry.bundle_names() {
        let labels = registry.labels(name).unwrap_or_default();
        println!("{:<16} {}", name.bold(), labels.join(" -> "));
    }
}

fn print_reports(reports: &[RunReport], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(reports)?);
        return Ok(());
    }

    for report in reports {
        let status = match report.status {
            NodeStatus::Staged => report.status.as_str().green().bold(),
            NodeStatus::Failed => report.status.as_str().red().bold(),
            _ => report.status.as_str().yellow().bold(),
        };
        println!("{:<24} {:<8} {}", report.node.as_str(), status, report.note);
    }

    let passed = reports.iter().filter(|report| report.passed()).count();
    println!("{} of {} node(s) passed.", passed, reports.len());
    Ok(())
}
