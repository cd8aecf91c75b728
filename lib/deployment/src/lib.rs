//! The deployment aggregate (component C7): a per-stack lifecycle
//! entity. Operations are free functions over [`Deployment`] rather
//! than inherent methods, since the entity type lives in `rsgo_client`.
//! Section 4.7.

use std::collections::HashMap;

use chrono::Utc;
use rsgo_client::entities::{
  deployment::{
    Deployment, DeploymentStatus, HealthCheckConfig, PendingUpgradeSnapshot, ServiceState,
    SnapshotService,
  },
  error::CoreError,
  Id,
};

/// `StartInstallation`: a brand-new aggregate, status `Installing`,
/// variables and health checks blank.
pub fn start(environment_id: Id, stack_name: String, project_name: String, stack_version: String) -> Deployment {
  let now = Utc::now();
  Deployment {
    id: Id::new_v4(),
    environment_id,
    stack_name,
    project_name,
    status: DeploymentStatus::Installing,
    stack_version,
    variables: HashMap::new(),
    services: Vec::new(),
    health_check_configs: Vec::new(),
    pending_upgrade_snapshot: None,
    version: 1,
    created_at: now,
    updated_at: now,
  }
}

fn require_not_removed(deployment: &Deployment) -> anyhow::Result<()> {
  if deployment.status == DeploymentStatus::Removed {
    return Err(
      CoreError::PreconditionViolated(format!(
        "deployment {} is removed and can no longer be modified",
        deployment.id
      ))
      .into(),
    );
  }
  Ok(())
}

pub fn set_stack_version(deployment: &mut Deployment, stack_version: String) -> anyhow::Result<()> {
  require_not_removed(deployment)?;
  deployment.stack_version = stack_version;
  deployment.updated_at = Utc::now();
  Ok(())
}

pub fn set_variables(deployment: &mut Deployment, variables: HashMap<String, String>) -> anyhow::Result<()> {
  require_not_removed(deployment)?;
  deployment.variables = variables;
  deployment.updated_at = Utc::now();
  Ok(())
}

pub fn set_health_check_configs(
  deployment: &mut Deployment,
  health_check_configs: Vec<HealthCheckConfig>,
) -> anyhow::Result<()> {
  require_not_removed(deployment)?;
  deployment.health_check_configs = health_check_configs;
  deployment.updated_at = Utc::now();
  Ok(())
}

/// `Installing|Upgrading -> Running`; the new service snapshot replaces
/// whatever was there before.
pub fn mark_as_running(deployment: &mut Deployment, services: Vec<ServiceState>) -> anyhow::Result<()> {
  if !matches!(deployment.status, DeploymentStatus::Installing | DeploymentStatus::Upgrading) {
    return Err(
      CoreError::PreconditionViolated(format!(
        "cannot mark deployment {} running from status {}",
        deployment.id, deployment.status
      ))
      .into(),
    );
  }
  deployment.status = DeploymentStatus::Running;
  deployment.services = services;
  deployment.updated_at = Utc::now();
  Ok(())
}

/// Legal only from `Running`. At most one snapshot; a new call
/// overwrites the previous one and resets `captured_at_utc`.
pub fn create_snapshot(deployment: &mut Deployment, description: Option<String>) -> anyhow::Result<()> {
  if deployment.status != DeploymentStatus::Running {
    return Err(
      CoreError::PreconditionViolated(format!(
        "cannot snapshot deployment {} from status {}",
        deployment.id, deployment.status
      ))
      .into(),
    );
  }
  deployment.pending_upgrade_snapshot = Some(PendingUpgradeSnapshot {
    stack_version: deployment.stack_version.clone(),
    variables: deployment.variables.clone(),
    services: deployment
      .services
      .iter()
      .map(|s| SnapshotService { name: s.name.clone(), image: s.image.clone() })
      .collect(),
    description,
    captured_at_utc: Utc::now(),
  });
  deployment.updated_at = Utc::now();
  Ok(())
}

/// Legal at any point.
pub fn clear_snapshot(deployment: &mut Deployment) {
  deployment.pending_upgrade_snapshot = None;
  deployment.updated_at = Utc::now();
}

/// `Running -> Upgrading`, snapshotting the pre-upgrade state first so a
/// failed upgrade still has `pending_upgrade_snapshot` to roll back to.
pub fn start_upgrade(deployment: &mut Deployment, description: Option<String>) -> anyhow::Result<()> {
  create_snapshot(deployment, description)?;
  deployment.status = DeploymentStatus::Upgrading;
  deployment.updated_at = Utc::now();
  Ok(())
}

pub fn mark_as_removed(deployment: &mut Deployment) {
  deployment.status = DeploymentStatus::Removed;
  deployment.updated_at = Utc::now();
}

#[cfg(test)]
mod tests {
  use super::*;

  fn fresh() -> Deployment {
    start(Id::new_v4(), "teststack".to_string(), "testproject".to_string(), "1.0.0".to_string())
  }

  #[test]
  fn start_is_installing_with_blank_state() {
    let d = fresh();
    assert_eq!(d.status, DeploymentStatus::Installing);
    assert!(d.variables.is_empty());
    assert!(d.health_check_configs.is_empty());
  }

  #[test]
  fn setters_reject_removed_deployments() {
    let mut d = fresh();
    mark_as_removed(&mut d);
    assert!(set_variables(&mut d, HashMap::new()).is_err());
    assert!(set_stack_version(&mut d, "2.0.0".to_string()).is_err());
  }

  #[test]
  fn mark_as_running_requires_installing_or_upgrading() {
    let mut d = fresh();
    mark_as_removed(&mut d);
    assert!(mark_as_running(&mut d, Vec::new()).is_err());

    let mut d2 = fresh();
    assert!(mark_as_running(&mut d2, Vec::new()).is_ok());
    assert_eq!(d2.status, DeploymentStatus::Running);
  }

  #[test]
  fn snapshot_requires_running_and_overwrites() {
    let mut d = fresh();
    assert!(create_snapshot(&mut d, None).is_err());

    mark_as_running(&mut d, Vec::new()).unwrap();
    create_snapshot(&mut d, Some("first".to_string())).unwrap();
    let first_captured = d.pending_upgrade_snapshot.as_ref().unwrap().captured_at_utc;

    create_snapshot(&mut d, Some("second".to_string())).unwrap();
    let snapshot = d.pending_upgrade_snapshot.as_ref().unwrap();
    assert_eq!(snapshot.description.as_deref(), Some("second"));
    assert!(snapshot.captured_at_utc >= first_captured);
  }

  #[test]
  fn clear_snapshot_is_always_legal() {
    let mut d = fresh();
    clear_snapshot(&mut d);
    assert!(d.pending_upgrade_snapshot.is_none());
  }

  #[test]
  fn start_upgrade_snapshots_and_transitions() {
    let mut d = fresh();
    assert!(start_upgrade(&mut d, Some("pre-upgrade".to_string())).is_err());

    mark_as_running(&mut d, Vec::new()).unwrap();
    start_upgrade(&mut d, Some("pre-upgrade".to_string())).unwrap();
    assert_eq!(d.status, DeploymentStatus::Upgrading);
    let snapshot = d.pending_upgrade_snapshot.as_ref().unwrap();
    assert_eq!(snapshot.description.as_deref(), Some("pre-upgrade"));

    mark_as_running(&mut d, Vec::new()).unwrap();
    assert_eq!(d.status, DeploymentStatus::Running);
  }
}
