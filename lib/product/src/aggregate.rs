//! The product deployment aggregate (component C8): multi-stack
//! lifecycle, per-stack sub-states, phase history, upgrade matching and
//! the derived-status computation. Section 4.8.

use std::collections::HashMap;

use chrono::Utc;
use rsgo_client::entities::{
  catalog::ProductDefinition,
  error::CoreError,
  product::{PhaseLevel, ProductDeployment, ProductStatus, StackSub, StackSubStatus},
  Id,
};

/// Caller-supplied per-stack configuration for a deploy or upgrade,
/// already carrying merged variables (C4's four-tier precedence).
#[derive(Debug, Clone)]
pub struct StackConfig {
  pub stack_id: String,
  pub stack_name: String,
  pub display_name: String,
  pub order: i32,
  pub service_count: u32,
  pub variables: HashMap<String, String>,
}

/// `InitiateDeployment`: status `Deploying`, stacks materialized in the
/// given order, `phaseHistory[0] = "Deployment initiated"`.
pub fn initiate_deployment(
  environment_id: Id,
  product: &ProductDefinition,
  stack_configs: Vec<StackConfig>,
  shared_variables: HashMap<String, String>,
  continue_on_error: bool,
) -> ProductDeployment {
  let stacks = stack_configs
    .into_iter()
    .map(|c| StackSub {
      stack_name: c.stack_name,
      stack_display_name: c.display_name,
      stack_id: c.stack_id,
      order: c.order,
      service_count: c.service_count,
      variables: c.variables,
      status: StackSubStatus::Pending,
      deployment_id: None,
      deployment_stack_name: None,
      started_at: None,
      completed_at: None,
      error_message: None,
      is_new_in_upgrade: false,
    })
    .collect();

  let mut deployment = ProductDeployment {
    id: Id::new_v4(),
    environment_id,
    product_group_id: product.group_id(),
    product_id: product.product_id.clone().unwrap_or_default(),
    product_name: product.display_name.clone(),
    product_version: product.product_version.clone().unwrap_or_default(),
    previous_version: None,
    upgrade_count: 0,
    status: ProductStatus::Deploying,
    created_at: Utc::now(),
    completed_at: None,
    error_message: None,
    continue_on_error,
    shared_variables,
    phase_history: Vec::new(),
    stacks,
    version: 1,
  };
  deployment.push_phase("Deployment initiated", PhaseLevel::Info);
  deployment
}

/// `InitiateUpgrade`: precondition `existing.status ∈ {Running,
/// PartiallyRunning}`. Creates a **new** aggregate; stacks are matched
/// against `existing` by display name (case-insensitive) to preserve
/// `deploymentId`/`deploymentStackName`, else flagged `isNewInUpgrade`.
pub fn initiate_upgrade(
  environment_id: Id,
  existing: &ProductDeployment,
  product: &ProductDefinition,
  stack_configs: Vec<StackConfig>,
  shared_variables: HashMap<String, String>,
) -> anyhow::Result<ProductDeployment> {
  if !matches!(existing.status, ProductStatus::Running | ProductStatus::PartiallyRunning) {
    return Err(
      CoreError::PreconditionViolated(format!(
        "cannot upgrade product deployment {} from status {}",
        existing.id, existing.status
      ))
      .into(),
    );
  }

  let stacks = stack_configs
    .into_iter()
    .map(|c| {
      let matched = existing
        .stacks
        .iter()
        .find(|s| s.stack_display_name.eq_ignore_ascii_case(&c.display_name));
      StackSub {
        stack_name: c.stack_name,
        stack_display_name: c.display_name,
        stack_id: c.stack_id,
        order: c.order,
        service_count: c.service_count,
        variables: c.variables,
        status: StackSubStatus::Pending,
        deployment_id: matched.and_then(|m| m.deployment_id),
        deployment_stack_name: matched.and_then(|m| m.deployment_stack_name.clone()),
        started_at: None,
        completed_at: None,
        error_message: None,
        is_new_in_upgrade: matched.is_none(),
      }
    })
    .collect();

  let mut deployment = ProductDeployment {
    id: Id::new_v4(),
    environment_id,
    product_group_id: product.group_id(),
    product_id: product.product_id.clone().unwrap_or_default(),
    product_name: product.display_name.clone(),
    product_version: product.product_version.clone().unwrap_or_default(),
    previous_version: Some(existing.product_version.clone()),
    upgrade_count: existing.upgrade_count + 1,
    status: ProductStatus::Upgrading,
    created_at: Utc::now(),
    completed_at: None,
    error_message: None,
    continue_on_error: existing.continue_on_error,
    shared_variables,
    phase_history: Vec::new(),
    stacks,
    version: 1,
  };
  deployment.push_phase(
    format!("Upgrade initiated from {}", existing.product_version),
    PhaseLevel::Info,
  );
  Ok(deployment)
}

fn find_stack<'a>(deployment: &'a ProductDeployment, stack_id: &str) -> anyhow::Result<&'a StackSub> {
  deployment
    .stacks
    .iter()
    .find(|s| s.stack_id == stack_id)
    .ok_or_else(|| CoreError::NotFound(format!("stack '{stack_id}' not found")).into())
}

pub fn start_stack(deployment: &mut ProductDeployment, stack_id: &str) -> anyhow::Result<()> {
  let name = find_stack(deployment, stack_id)?.stack_display_name.clone();
  let stack = deployment.find_stack_mut(stack_id).expect("checked above");
  stack.started_at = Some(Utc::now());
  deployment.push_phase(format!("Starting stack {name}"), PhaseLevel::Info);
  Ok(())
}

pub fn complete_stack(
  deployment: &mut ProductDeployment,
  stack_id: &str,
  deployment_id: Id,
  deployment_stack_name: String,
) -> anyhow::Result<()> {
  let name = find_stack(deployment, stack_id)?.stack_display_name.clone();
  let stack = deployment.find_stack_mut(stack_id).expect("checked above");
  stack.status = StackSubStatus::Running;
  stack.completed_at = Some(Utc::now());
  stack.deployment_id = Some(deployment_id);
  stack.deployment_stack_name = Some(deployment_stack_name);
  stack.error_message = None;
  deployment.push_phase(format!("Stack {name} running"), PhaseLevel::Info);
  apply_derived_status(deployment);
  Ok(())
}

pub fn fail_stack(deployment: &mut ProductDeployment, stack_id: &str, reason: String) -> anyhow::Result<()> {
  let name = find_stack(deployment, stack_id)?.stack_display_name.clone();
  let stack = deployment.find_stack_mut(stack_id).expect("checked above");
  stack.status = StackSubStatus::Failed;
  stack.completed_at = Some(Utc::now());
  stack.error_message = Some(reason.clone());
  deployment.push_phase(format!("Stack {name} failed: {reason}"), PhaseLevel::Error);
  apply_derived_status(deployment);
  Ok(())
}

/// Recomputes `status` from the stacks' current sub-statuses, per the
/// rules in section 4.8. Leaves `status` alone while any stack is still
/// `Pending` (the workflow hasn't reached a terminus yet).
pub fn apply_derived_status(deployment: &mut ProductDeployment) {
  if deployment.stacks.iter().any(|s| s.status == StackSubStatus::Pending) {
    return;
  }
  let was_upgrading = deployment.status == ProductStatus::Upgrading;
  let all_running = deployment.stacks.iter().all(|s| s.status == StackSubStatus::Running);
  let any_running = deployment.stacks.iter().any(|s| s.status == StackSubStatus::Running);
  let all_failed = deployment.stacks.iter().all(|s| s.status == StackSubStatus::Failed);

  deployment.status = if all_running {
    ProductStatus::Running
  } else if all_failed {
    ProductStatus::Failed
  } else if any_running {
    ProductStatus::PartiallyRunning
  } else {
    return;
  };
  let _ = was_upgrading; // completing an upgrade still lands on Running; no separate state.
  deployment.completed_at = Some(Utc::now());
}

/// `StartRemoval`: legal from `{Running, PartiallyRunning, Failed}`.
pub fn start_removal(deployment: &mut ProductDeployment) -> anyhow::Result<()> {
  if !matches!(
    deployment.status,
    ProductStatus::Running | ProductStatus::PartiallyRunning | ProductStatus::Failed
  ) {
    return Err(
      CoreError::PreconditionViolated(format!(
        "cannot remove product deployment {} from status {}",
        deployment.id, deployment.status
      ))
      .into(),
    );
  }
  deployment.status = ProductStatus::Removing;
  deployment.push_phase("Removal started", PhaseLevel::Info);
  Ok(())
}

pub fn mark_stack_removed(deployment: &mut ProductDeployment, stack_id: &str) -> anyhow::Result<()> {
  let stack = deployment
    .find_stack_mut(stack_id)
    .ok_or_else(|| CoreError::NotFound(format!("stack '{stack_id}' not found")))?;
  stack.status = StackSubStatus::Removed;
  if deployment.stacks.iter().all(|s| s.status == StackSubStatus::Removed) {
    deployment.status = ProductStatus::Removed;
    deployment.completed_at = Some(Utc::now());
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use rsgo_client::entities::manifest::Manifest;

  fn product_def() -> ProductDefinition {
    ProductDefinition {
      source_id: "src".to_string(),
      name: "demo".to_string(),
      display_name: "Demo".to_string(),
      product_version: Some("1.0.0".to_string()),
      product_id: Some("group-a".to_string()),
      stacks: Vec::new(),
      manifest: Manifest::default(),
    }
  }

  fn config(id: &str, display: &str, order: i32) -> StackConfig {
    StackConfig {
      stack_id: id.to_string(),
      stack_name: id.to_string(),
      display_name: display.to_string(),
      order,
      service_count: 1,
      variables: HashMap::new(),
    }
  }

  #[test]
  fn initiate_deployment_sets_deploying_and_first_phase() {
    let d = initiate_deployment(
      Id::new_v4(),
      &product_def(),
      vec![config("web", "Web", 0)],
      HashMap::new(),
      false,
    );
    assert_eq!(d.status, ProductStatus::Deploying);
    assert_eq!(d.phase_history[0].message, "Deployment initiated");
    assert_eq!(d.stacks[0].status, StackSubStatus::Pending);
  }

  #[test]
  fn derived_status_is_running_when_all_stacks_running() {
    let mut d = initiate_deployment(
      Id::new_v4(),
      &product_def(),
      vec![config("web", "Web", 0), config("db", "Db", 1)],
      HashMap::new(),
      false,
    );
    complete_stack(&mut d, "web", Id::new_v4(), "proj_web".to_string()).unwrap();
    assert_eq!(d.status, ProductStatus::Deploying); // db still pending
    complete_stack(&mut d, "db", Id::new_v4(), "proj_db".to_string()).unwrap();
    assert_eq!(d.status, ProductStatus::Running);
  }

  #[test]
  fn derived_status_is_partially_running_on_mixed_outcome() {
    let mut d = initiate_deployment(
      Id::new_v4(),
      &product_def(),
      vec![config("web", "Web", 0), config("db", "Db", 1)],
      HashMap::new(),
      true,
    );
    complete_stack(&mut d, "web", Id::new_v4(), "proj_web".to_string()).unwrap();
    fail_stack(&mut d, "db", "pull failed".to_string()).unwrap();
    assert_eq!(d.status, ProductStatus::PartiallyRunning);
  }

  #[test]
  fn derived_status_is_failed_when_all_stacks_failed() {
    let mut d = initiate_deployment(
      Id::new_v4(),
      &product_def(),
      vec![config("web", "Web", 0)],
      HashMap::new(),
      false,
    );
    fail_stack(&mut d, "web", "boom".to_string()).unwrap();
    assert_eq!(d.status, ProductStatus::Failed);
  }

  #[test]
  fn upgrade_requires_running_or_partially_running() {
    let d = initiate_deployment(Id::new_v4(), &product_def(), vec![], HashMap::new(), false);
    let mut target = product_def();
    target.product_version = Some("2.0.0".to_string());
    let err = initiate_upgrade(d.environment_id, &d, &target, vec![], HashMap::new());
    assert!(err.is_err());
  }

  #[test]
  fn upgrade_matches_stacks_by_display_name_case_insensitive() {
    let mut existing = initiate_deployment(
      Id::new_v4(),
      &product_def(),
      vec![config("web", "Web", 0)],
      HashMap::new(),
      false,
    );
    let existing_deployment_id = Id::new_v4();
    complete_stack(&mut existing, "web", existing_deployment_id, "proj_web".to_string()).unwrap();

    let mut target = product_def();
    target.product_version = Some("2.0.0".to_string());
    let upgrade = initiate_upgrade(
      existing.environment_id,
      &existing,
      &target,
      vec![config("web-2", "WEB", 0), config("cache", "Cache", 1)],
      HashMap::new(),
    )
    .unwrap();

    let web = upgrade.stacks.iter().find(|s| s.stack_id == "web-2").unwrap();
    assert!(!web.is_new_in_upgrade);
    assert_eq!(web.deployment_id, Some(existing_deployment_id));

    let cache = upgrade.stacks.iter().find(|s| s.stack_id == "cache").unwrap();
    assert!(cache.is_new_in_upgrade);
    assert_eq!(cache.deployment_id, None);
  }

  #[test]
  fn removal_lifecycle_reaches_removed_when_all_stacks_removed() {
    let mut d = initiate_deployment(
      Id::new_v4(),
      &product_def(),
      vec![config("web", "Web", 0)],
      HashMap::new(),
      false,
    );
    complete_stack(&mut d, "web", Id::new_v4(), "proj_web".to_string()).unwrap();
    start_removal(&mut d).unwrap();
    mark_stack_removed(&mut d, "web").unwrap();
    assert_eq!(d.status, ProductStatus::Removed);
  }

  #[test]
  fn start_removal_rejects_deploying_state() {
    let mut d = initiate_deployment(Id::new_v4(), &product_def(), vec![], HashMap::new(), false);
    assert!(start_removal(&mut d).is_err());
  }
}
