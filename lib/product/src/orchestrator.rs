//! The product orchestrator (component C9): deploy/upgrade/remove
//! workflows driving the engine (C6) and the two aggregates (C7/C8),
//! with continue-on-error semantics and crash-safe checkpointing.
//! Section 4.9.

use std::{collections::HashMap, sync::Arc};

use catalog::Catalog;
use chrono::Utc;
use engine::{execute, remove_stack, ContainerRuntime, RegistryAuth};
use indexmap::IndexMap;
use rsgo_client::entities::{
  catalog::ProductDefinition,
  deployment::{Deployment, DeploymentStatus, ServiceRuntimeStatus, ServiceState},
  error::CoreError,
  manifest::{Manifest, ServiceTemplate, StackEntry, VarDecl},
  notify::{InAppNotification, ProgressUpdate},
  product::{PhaseLevel, ProductDeployment, ProductStatus, StackResult, StackSubStatus},
  Id,
};
use registry::RegistryStore;
use store::{DeploymentStore, ProductStore};
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use variables::{extract_stack_variables, merge};

use crate::aggregate::{self, StackConfig};

pub struct Orchestrator {
  pub product_store: Arc<dyn ProductStore>,
  pub deployment_store: Arc<dyn DeploymentStore>,
  pub catalog: Arc<Catalog>,
  pub runtime: Arc<dyn ContainerRuntime>,
  pub registry_store: Arc<RwLock<RegistryStore>>,
  pub notifier: Arc<dyn notify::ProgressNotifier>,
}

#[derive(Debug, Clone, Default)]
pub struct DeployRequest {
  pub environment_id: Id,
  pub organization_id: String,
  pub product_group_id: String,
  pub shared_variables: HashMap<String, String>,
  pub per_stack_variables: HashMap<String, HashMap<String, String>>,
  pub continue_on_error: bool,
}

impl Orchestrator {
  pub async fn deploy_product(&self, request: DeployRequest) -> anyhow::Result<rsgo_client::entities::product::OrchestratorResponse> {
    let product = self
      .catalog
      .get_latest_product_version(&request.product_group_id)
      .await
      .ok_or_else(|| CoreError::NotFound(format!("product '{}' not found", request.product_group_id)))?;

    if self
      .product_store
      .find_active(request.environment_id, &product.group_id())
      .await?
      .is_some()
    {
      return Err(
        CoreError::PreconditionViolated(format!(
          "an active deployment already exists for product group '{}'",
          product.group_id()
        ))
        .into(),
      );
    }

    let stack_configs = build_stack_configs(&product, &request.per_stack_variables, &request.shared_variables, None)?;
    let mut aggregate = aggregate::initiate_deployment(
      request.environment_id,
      &product,
      stack_configs,
      request.shared_variables.clone(),
      request.continue_on_error,
    );
    self.product_store.create(aggregate.clone()).await?;

    let session_id = notify::synthesize_session_id("deploy", &product.display_name);
    self
      .notifier
      .progress(progress_update(&session_id, "Starting deployment", 0))
      .await;

    let mut ordered_stacks: Vec<_> = aggregate.stacks.iter().map(|s| s.stack_id.clone()).collect();
    ordered_stacks.sort_by_key(|id| aggregate.stacks.iter().find(|s| &s.stack_id == id).unwrap().order);

    for stack_id in ordered_stacks {
      aggregate::start_stack(&mut aggregate, &stack_id)?;
      let stack = aggregate.stacks.iter().find(|s| s.stack_id == stack_id).unwrap().clone();

      match self
        .deploy_one_stack(
          request.environment_id,
          &request.organization_id,
          &product.manifest,
          &stack.stack_name,
          &stack.variables,
          None,
        )
        .await
      {
        Ok((deployment_id, deployment_stack_name)) => {
          aggregate::complete_stack(&mut aggregate, &stack_id, deployment_id, deployment_stack_name)?;
        }
        Err(e) => {
          aggregate::fail_stack(&mut aggregate, &stack_id, format!("{e:#}"))?;
          if !request.continue_on_error {
            aggregate = self.product_store.save(aggregate).await?;
            break;
          }
        }
      }
      aggregate = self.product_store.save(aggregate).await?;
    }

    finalize_status(&mut aggregate, request.continue_on_error);
    let aggregate = self.product_store.save(aggregate).await?;

    let response = build_response(&aggregate, &session_id, Vec::new());
    self.notify_terminal(&session_id, &aggregate, &response).await;
    Ok(response)
  }

  pub async fn upgrade_product(
    &self,
    existing_id: Id,
    organization_id: &str,
    target_group_id: &str,
    target_version: &str,
    shared_variables: HashMap<String, String>,
    per_stack_variables: HashMap<String, HashMap<String, String>>,
  ) -> anyhow::Result<rsgo_client::entities::product::OrchestratorResponse> {
    let existing = self
      .product_store
      .get(existing_id)
      .await?
      .ok_or_else(|| CoreError::NotFound(format!("product deployment '{existing_id}' not found")))?;

    if !catalog::semver::is_greater(target_version, &existing.product_version) {
      return Err(
        CoreError::PreconditionViolated(format!(
          "target version '{target_version}' is not greater than current version '{}'",
          existing.product_version
        ))
        .into(),
      );
    }

    let target = self
      .catalog
      .get(target_group_id, target_version)
      .await
      .ok_or_else(|| CoreError::NotFound(format!("product '{target_group_id}:{target_version}' not found")))?;

    let stack_configs =
      build_stack_configs(&target, &per_stack_variables, &shared_variables, Some(&existing))?;

    let mut warnings = Vec::new();
    for prior in &existing.stacks {
      let still_present = stack_configs.iter().any(|c| c.display_name.eq_ignore_ascii_case(&prior.stack_display_name));
      if !still_present {
        warnings.push(format!("stack {} removed in upgrade", prior.stack_display_name));
      }
    }

    let mut aggregate =
      aggregate::initiate_upgrade(existing.environment_id, &existing, &target, stack_configs, shared_variables)?;
    self.product_store.create(aggregate.clone()).await?;

    let session_id = notify::synthesize_session_id("upgrade", &target.display_name);
    self
      .notifier
      .progress(progress_update(&session_id, "Starting upgrade", 0))
      .await;

    let mut ordered_stacks: Vec<_> = aggregate.stacks.iter().map(|s| s.stack_id.clone()).collect();
    ordered_stacks.sort_by_key(|id| aggregate.stacks.iter().find(|s| &s.stack_id == id).unwrap().order);

    for stack_id in ordered_stacks {
      aggregate::start_stack(&mut aggregate, &stack_id)?;
      let stack = aggregate.stacks.iter().find(|s| s.stack_id == stack_id).unwrap().clone();

      match self
        .deploy_one_stack(
          existing.environment_id,
          organization_id,
          &target.manifest,
          &stack.stack_name,
          &stack.variables,
          stack.deployment_id,
        )
        .await
      {
        Ok((deployment_id, deployment_stack_name)) => {
          aggregate::complete_stack(&mut aggregate, &stack_id, deployment_id, deployment_stack_name)?;
        }
        Err(e) => {
          aggregate::fail_stack(&mut aggregate, &stack_id, format!("{e:#}"))?;
        }
      }
      aggregate = self.product_store.save(aggregate).await?;
    }

    finalize_status(&mut aggregate, true);
    let aggregate = self.product_store.save(aggregate).await?;

    let response = build_response(&aggregate, &session_id, warnings);
    self.notify_terminal(&session_id, &aggregate, &response).await;
    Ok(response)
  }

  pub async fn remove_product(&self, id: Id) -> anyhow::Result<rsgo_client::entities::product::OrchestratorResponse> {
    let mut aggregate = self
      .product_store
      .get(id)
      .await?
      .ok_or_else(|| CoreError::NotFound(format!("product deployment '{id}' not found")))?;

    aggregate::start_removal(&mut aggregate)?;
    aggregate = self.product_store.save(aggregate).await?;

    let session_id = notify::synthesize_session_id("remove", &aggregate.product_name);
    let mut any_docker_failure = false;

    let mut ordered_stacks: Vec<_> = aggregate.stacks.iter().map(|s| s.stack_id.clone()).collect();
    ordered_stacks.sort_by_key(|id| aggregate.stacks.iter().find(|s| &s.stack_id == id).unwrap().order);
    ordered_stacks.reverse();

    for stack_id in ordered_stacks {
      let stack = aggregate.stacks.iter().find(|s| s.stack_id == stack_id).unwrap().clone();
      if stack.deployment_id.is_none() {
        aggregate::mark_stack_removed(&mut aggregate, &stack_id)?;
      } else {
        let deployment_stack_name = stack.deployment_stack_name.clone().unwrap_or(stack.stack_name.clone());
        let removal = remove_stack(self.runtime.as_ref(), &deployment_stack_name).await;
        if !removal.errors.is_empty() {
          any_docker_failure = true;
        }
        if let Some(deployment_id) = stack.deployment_id {
          if let Some(mut deployment) = self.deployment_store.get(deployment_id).await? {
            deployment::mark_as_removed(&mut deployment);
            self.deployment_store.save(deployment).await?;
          }
        }
        aggregate::mark_stack_removed(&mut aggregate, &stack_id)?;
      }
      aggregate = self.product_store.save(aggregate).await?;
    }

    let response = rsgo_client::entities::product::OrchestratorResponse {
      success: !any_docker_failure,
      status: aggregate.status,
      message: if any_docker_failure {
        "removal completed with errors".to_string()
      } else {
        "removal completed".to_string()
      },
      stack_results: stack_results(&aggregate),
      session_id: session_id.clone(),
      warnings: Vec::new(),
    };
    self.notify_terminal(&session_id, &aggregate, &response).await;
    Ok(response)
  }

  pub async fn check_product_upgrade(&self, id: Id) -> anyhow::Result<UpgradeCheck> {
    let existing = self
      .product_store
      .get(id)
      .await?
      .ok_or_else(|| CoreError::NotFound(format!("product deployment '{id}' not found")))?;

    let can_upgrade = matches!(existing.status, ProductStatus::Running | ProductStatus::PartiallyRunning);
    let upgrades = self
      .catalog
      .get_available_upgrades(&existing.product_group_id, &existing.product_version)
      .await;

    let (new_stacks, removed_stacks) = match upgrades.first() {
      Some(target) => diff_stacks(&existing, target),
      None => (Vec::new(), Vec::new()),
    };

    Ok(UpgradeCheck {
      can_upgrade,
      available_versions: upgrades.into_iter().filter_map(|p| p.product_version).collect(),
      new_stacks,
      removed_stacks,
    })
  }

  /// Merges variables, compiles a plan, and runs the engine for one
  /// stack. When `predecessor_deployment_id` names a still-`Running`
  /// aggregate, it is snapshotted and carried through `Upgrading` rather
  /// than abandoned for a freshly-minted one (section 4.7). Returns
  /// `(deploymentId, deploymentStackName)` on success.
  async fn deploy_one_stack(
    &self,
    environment_id: Id,
    organization_id: &str,
    manifest: &Manifest,
    stack_name: &str,
    variables: &HashMap<String, String>,
    predecessor_deployment_id: Option<Id>,
  ) -> anyhow::Result<(Id, String)> {
    let services = stack_services(manifest, stack_name)?;
    let stack_version = manifest.metadata.product_version.clone().unwrap_or_else(|| "0.0.0".to_string());
    let plan = planner::plan_stack(stack_name, &stack_version, services, variables)?;

    let (mut deployment, reusing_predecessor) =
      self.predecessor_or_fresh(predecessor_deployment_id, environment_id, stack_name, &plan.stack_version).await?;
    if reusing_predecessor {
      deployment = self.deployment_store.save(deployment.clone()).await?;
    }

    let credentials_by_ref = self.resolve_step_credentials(organization_id, &plan).await;
    let credentials_for = |image_ref: &str| credentials_by_ref.get(image_ref).cloned();

    let notifier = self.notifier.clone();
    let (tx, mut rx) = mpsc::unbounded_channel::<ProgressUpdate>();
    let forwarder = tokio::spawn(async move {
      while let Some(update) = rx.recv().await {
        notifier.progress(update).await;
      }
    });
    let progress: Box<dyn Fn(ProgressUpdate) + Send + Sync> = Box::new(move |update| {
      let _ = tx.send(update);
    });

    let result = execute(
      self.runtime.as_ref(),
      &plan,
      Some(deployment.id),
      &credentials_for,
      Some(progress),
      &CancellationToken::new(),
    )
    .await;
    let _ = forwarder.await;

    if !result.success {
      anyhow::bail!(result.errors.join("; "));
    }

    let service_states: Vec<ServiceState> = plan
      .steps
      .iter()
      .map(|step| ServiceState {
        name: step.context_name.clone(),
        container_id: None,
        container_name: step.container_name.clone(),
        image: format!("{}:{}", step.image, step.version),
        status: if result.deployed_contexts.contains(&step.context_name) {
          ServiceRuntimeStatus::Running
        } else {
          ServiceRuntimeStatus::Failed
        },
      })
      .collect();

    deployment::set_stack_version(&mut deployment, plan.stack_version.clone())?;
    deployment::set_variables(&mut deployment, variables.clone())?;
    deployment::mark_as_running(&mut deployment, service_states)?;
    if deployment.pending_upgrade_snapshot.is_some() {
      deployment::clear_snapshot(&mut deployment);
    }

    if reusing_predecessor {
      self.deployment_store.save(deployment.clone()).await?;
    } else {
      self.deployment_store.create(deployment.clone()).await?;
    }

    Ok((deployment.id, deployment.stack_name.clone()))
  }

  /// Loads and transitions the predecessor `Deployment` into `Upgrading`
  /// when one is named and still `Running`; otherwise starts a brand new
  /// `Installing` aggregate. The `bool` tells the caller whether the
  /// returned aggregate already exists in the store (`save`) or not
  /// (`create`).
  async fn predecessor_or_fresh(
    &self,
    predecessor_deployment_id: Option<Id>,
    environment_id: Id,
    stack_name: &str,
    stack_version: &str,
  ) -> anyhow::Result<(Deployment, bool)> {
    if let Some(predecessor_id) = predecessor_deployment_id {
      if let Some(mut predecessor) = self.deployment_store.get(predecessor_id).await? {
        if predecessor.status == DeploymentStatus::Running {
          deployment::start_upgrade(&mut predecessor, Some(format!("pre-upgrade to {stack_version}")))?;
          return Ok((predecessor, true));
        }
      }
    }
    Ok((
      deployment::start(environment_id, stack_name.to_string(), stack_name.to_string(), stack_version.to_string()),
      false,
    ))
  }

  /// Resolves credentials for every image reference in the plan up
  /// front, since [`execute`]'s `credentials_for` callback is
  /// synchronous and can't hold the registry store's lock.
  async fn resolve_step_credentials(
    &self,
    organization_id: &str,
    plan: &rsgo_client::entities::plan::DeploymentPlan,
  ) -> HashMap<String, RegistryAuth> {
    let store = self.registry_store.read().await;
    plan
      .steps
      .iter()
      .filter_map(|step| {
        let image_ref = format!("{}:{}", step.image, step.version);
        let auth = engine::registry_auth::resolve_credentials(&store, organization_id, &image_ref)?;
        Some((image_ref, auth))
      })
      .collect()
  }

  async fn notify_terminal(
    &self,
    session_id: &str,
    aggregate: &ProductDeployment,
    response: &rsgo_client::entities::product::OrchestratorResponse,
  ) {
    self
      .notifier
      .completed(InAppNotification {
        session_id: session_id.to_string(),
        product_name: aggregate.product_name.clone(),
        product_version: aggregate.product_version.clone(),
        stack_count: aggregate.stacks.len() as u32,
        success: response.success,
        message: response.message.clone(),
      })
      .await;
  }
}

#[derive(Debug, Clone, Default)]
pub struct UpgradeCheck {
  pub can_upgrade: bool,
  pub available_versions: Vec<String>,
  pub new_stacks: Vec<String>,
  pub removed_stacks: Vec<String>,
}

fn diff_stacks(existing: &ProductDeployment, target: &ProductDefinition) -> (Vec<String>, Vec<String>) {
  let existing_names: Vec<String> =
    existing.stacks.iter().map(|s| s.stack_display_name.to_lowercase()).collect();
  let target_names: Vec<String> = target.stacks.iter().map(|s| s.display_name.to_lowercase()).collect();

  let new_stacks = target
    .stacks
    .iter()
    .filter(|s| !existing_names.contains(&s.display_name.to_lowercase()))
    .map(|s| s.display_name.clone())
    .collect();
  let removed_stacks = existing
    .stacks
    .iter()
    .filter(|s| !target_names.contains(&s.stack_display_name.to_lowercase()))
    .map(|s| s.stack_display_name.clone())
    .collect();
  (new_stacks, removed_stacks)
}

fn stack_services<'a>(manifest: &'a Manifest, stack_name: &str) -> anyhow::Result<&'a IndexMap<String, ServiceTemplate>> {
  if manifest.is_multi_stack() {
    match manifest.stacks.get(stack_name) {
      Some(StackEntry::Inline(inline)) => Ok(&inline.services),
      Some(StackEntry::Include { .. }) => {
        anyhow::bail!("stack '{stack_name}' was never resolved from its include reference")
      }
      None => anyhow::bail!("stack '{stack_name}' not found in manifest"),
    }
  } else {
    Ok(&manifest.services)
  }
}

fn stack_variable_decls(manifest: &Manifest, stack_name: &str) -> IndexMap<String, VarDecl> {
  let stack_vars: IndexMap<String, VarDecl> = if manifest.is_multi_stack() {
    match manifest.stacks.get(stack_name) {
      Some(StackEntry::Inline(inline)) => inline.variables.clone(),
      _ => IndexMap::new(),
    }
  } else {
    manifest.variables.clone()
  };
  extract_stack_variables(&manifest.shared_variables, &stack_vars)
    .into_iter()
    .map(|(k, v)| (k, v.clone()))
    .collect()
}

fn build_stack_configs(
  product: &ProductDefinition,
  per_stack_variables: &HashMap<String, HashMap<String, String>>,
  shared_variables: &HashMap<String, String>,
  existing: Option<&ProductDeployment>,
) -> anyhow::Result<Vec<StackConfig>> {
  let mut configs = Vec::with_capacity(product.stacks.len());
  for stack_def in &product.stacks {
    let decls = stack_variable_decls(&product.manifest, &stack_def.stack_name);
    let declared_defaults: HashMap<String, String> = decls
      .iter()
      .filter_map(|(k, v)| v.default.clone().map(|d| (k.clone(), d)))
      .collect();

    let existing_values = existing.and_then(|e| {
      e.stacks
        .iter()
        .find(|s| s.stack_display_name.eq_ignore_ascii_case(&stack_def.display_name))
        .map(|s| s.variables.clone())
    });
    let per_stack = per_stack_variables.get(&stack_def.stack_name).cloned().unwrap_or_default();
    let merged = merge(&declared_defaults, existing_values.as_ref(), shared_variables, &per_stack);

    configs.push(StackConfig {
      stack_id: stack_def.stack_name.clone(),
      stack_name: stack_def.stack_name.clone(),
      display_name: stack_def.display_name.clone(),
      order: stack_def.order,
      service_count: stack_def.service_count,
      variables: merged,
    });
  }
  Ok(configs)
}

fn finalize_status(aggregate: &mut ProductDeployment, continue_on_error: bool) {
  let any_failed = aggregate.stacks.iter().any(|s| s.status == StackSubStatus::Failed);
  if any_failed && !continue_on_error {
    aggregate.status = ProductStatus::Failed;
    aggregate.completed_at = Some(Utc::now());
    aggregate.push_phase("Deployment stopped after stack failure", PhaseLevel::Error);
  } else {
    aggregate::apply_derived_status(aggregate);
  }
}

fn stack_results(aggregate: &ProductDeployment) -> Vec<StackResult> {
  aggregate
    .stacks
    .iter()
    .map(|s| StackResult {
      name: s.stack_display_name.clone(),
      success: !matches!(s.status, StackSubStatus::Failed),
      deployment_id: s.deployment_id,
      is_new_in_upgrade: s.is_new_in_upgrade,
      error_message: s.error_message.clone(),
    })
    .collect()
}

fn build_response(
  aggregate: &ProductDeployment,
  session_id: &str,
  warnings: Vec<String>,
) -> rsgo_client::entities::product::OrchestratorResponse {
  let success = !matches!(aggregate.status, ProductStatus::Failed);
  rsgo_client::entities::product::OrchestratorResponse {
    success,
    status: aggregate.status,
    message: format!("product deployment {}", aggregate.status),
    stack_results: stack_results(aggregate),
    session_id: session_id.to_string(),
    warnings,
  }
}

fn progress_update(session_id: &str, message: &str, overall_percent: u32) -> rsgo_client::entities::notify::ProgressUpdate {
  rsgo_client::entities::notify::ProgressUpdate {
    session_id: session_id.to_string(),
    phase: rsgo_client::entities::notify::EnginePhase::Resolving,
    message: message.to_string(),
    overall_percent,
    current_service: None,
    total_services: 0,
    completed_services: 0,
    total_init_containers: 0,
    completed_init_containers: 0,
  }
}
