#[macro_use]
extern crate tracing;

use std::sync::Arc;

use catalog::Catalog;
use colored::Colorize;
use engine::BollardRuntime;
use notify::InMemoryNotifier;
use product::Orchestrator;
use registry::RegistryStore;
use rsgo_client::entities::environment::EnvironmentConnection;
use store::{InMemoryDeploymentStore, InMemoryProductStore};
use tokio::sync::RwLock;

mod config;

use crate::config::core_config;

/// Wires every component (C2, C6, C7/C8/C9, C11, C12, the persistence
/// seam) into one [`Orchestrator`]. The REST/admin API that would sit
/// in front of this is explicitly out of scope (spec section 1); this
/// binary exists to prove the wiring compiles and runs, the way
/// `rsgo-cli` proves it by actually driving deploy/upgrade/remove.
fn build_orchestrator(cfg: &::config::Config) -> anyhow::Result<Orchestrator> {
  let connection = match &cfg.docker_host {
    Some(base_url) => EnvironmentConnection::RemoteApi { base_url: base_url.clone(), tls_cert: None },
    None => EnvironmentConnection::LocalSocket { path: String::new() },
  };
  let runtime = Arc::new(BollardRuntime::connect(&connection)?);

  Ok(Orchestrator {
    product_store: Arc::new(InMemoryProductStore::new()),
    deployment_store: Arc::new(InMemoryDeploymentStore::new()),
    catalog: Arc::new(Catalog::new()),
    runtime,
    registry_store: Arc::new(RwLock::new(RegistryStore::new())),
    notifier: Arc::new(InMemoryNotifier::new()),
  })
}

async fn app() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();
  let cfg = core_config();
  logger::init(&cfg.logging)?;

  info!("ReadyStackGo Core {} starting", env!("CARGO_PKG_VERSION"));
  debug!(config = ?cfg.sanitized(), "loaded configuration");

  let orchestrator = build_orchestrator(cfg)?;
  // The orchestrator now exists and is ready to accept deploy / upgrade /
  // remove calls from whatever external trigger a deployment wires up
  // (out of scope here). Keep it alive until shutdown so ownership of
  // the in-memory stores doesn't drop early.
  let _orchestrator = orchestrator;

  println!(
    "{}: ReadyStackGo Core is running. Press Ctrl+C to stop.",
    "INFO".green()
  );
  tokio::signal::ctrl_c().await?;
  info!("shutdown signal received");
  Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let mut term_signal =
    tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
  tokio::select! {
    res = tokio::spawn(app()) => res?,
    _ = term_signal.recv() => Ok(()),
  }
}
