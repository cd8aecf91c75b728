use std::{collections::HashMap, path::Path, sync::Arc};

use catalog::Catalog;
use colored::Colorize;
use comfy_table::{Cell, Color, Table};
use engine::BollardRuntime;
use notify::InMemoryNotifier;
use product::{DeployRequest, Orchestrator};
use registry::RegistryStore;
use rsgo_client::entities::environment::EnvironmentConnection;
use store::{InMemoryDeploymentStore, InMemoryProductStore};
use tokio::sync::RwLock;
use uuid::Uuid;

const SOURCE_ID: &str = "cli";

#[allow(clippy::too_many_arguments)]
pub async fn handle(
  manifest_path: &Path,
  organization: String,
  group: Option<String>,
  environment: Uuid,
  shared_variables: Vec<(String, String)>,
  continue_on_error: bool,
  docker_host: Option<String>,
) -> anyhow::Result<()> {
  let manifest = manifest::parse_from_file(manifest_path)?;
  let validation = manifest::validate(&manifest);
  if !validation.is_valid {
    anyhow::bail!("manifest failed validation: {}", validation.errors.join("; "));
  }

  let definition = catalog::from_manifest(SOURCE_ID, manifest);
  let group_id = group.unwrap_or_else(|| definition.group_id());
  println!(
    "{}: deploying '{}' (group '{}')",
    "INFO".green(),
    definition.display_name,
    group_id
  );

  let catalog = Arc::new(Catalog::new());
  catalog.upsert(definition).await;

  let connection = match docker_host {
    Some(base_url) => EnvironmentConnection::RemoteApi { base_url, tls_cert: None },
    None => EnvironmentConnection::LocalSocket { path: String::new() },
  };
  let orchestrator = Orchestrator {
    product_store: Arc::new(InMemoryProductStore::new()),
    deployment_store: Arc::new(InMemoryDeploymentStore::new()),
    catalog,
    runtime: Arc::new(BollardRuntime::connect(&connection)?),
    registry_store: Arc::new(RwLock::new(RegistryStore::new())),
    notifier: Arc::new(InMemoryNotifier::new()),
  };

  let request = DeployRequest {
    environment_id: environment,
    organization_id: organization,
    product_group_id: group_id,
    shared_variables: shared_variables.into_iter().collect::<HashMap<_, _>>(),
    per_stack_variables: HashMap::new(),
    continue_on_error,
  };

  let response = orchestrator.deploy_product(request).await?;
  print_response(&response);

  if !response.success {
    anyhow::bail!("deployment finished with status {}", response.status);
  }
  Ok(())
}

fn print_response(response: &rsgo_client::entities::product::OrchestratorResponse) {
  println!(
    "\n{}: session {} | status {} | {}",
    if response.success { "SUCCESS".green() } else { "FAILED".red() },
    response.session_id,
    response.status,
    response.message,
  );

  let mut table = Table::new();
  table.set_header(vec!["stack", "success", "deployment id", "error"]);
  for result in &response.stack_results {
    table.add_row(vec![
      Cell::new(&result.name),
      Cell::new(result.success).fg(if result.success { Color::Green } else { Color::Red }),
      Cell::new(result.deployment_id.map(|id| id.to_string()).unwrap_or_default()),
      Cell::new(result.error_message.clone().unwrap_or_default()),
    ]);
  }
  println!("{table}");

  for warning in &response.warnings {
    println!("{}: {warning}", "WARN".yellow());
  }
}
