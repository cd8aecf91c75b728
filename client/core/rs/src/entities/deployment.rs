use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::Id;

/// One Compose-like stack deployed onto one environment. Section 4.7 /
/// section 3 ("Deployment aggregate").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
  pub id: Id,
  pub environment_id: Id,
  pub stack_name: String,
  pub project_name: String,
  pub status: DeploymentStatus,
  pub stack_version: String,
  #[serde(default)]
  pub variables: HashMap<String, String>,
  #[serde(default)]
  pub services: Vec<ServiceState>,
  #[serde(default)]
  pub health_check_configs: Vec<HealthCheckConfig>,
  #[serde(default)]
  pub pending_upgrade_snapshot: Option<PendingUpgradeSnapshot>,
  /// Optimistic concurrency token (section 5).
  pub version: u64,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "PascalCase")]
#[serde(rename_all = "PascalCase")]
pub enum DeploymentStatus {
  #[default]
  Installing,
  Running,
  Upgrading,
  Removed,
  Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceState {
  pub name: String,
  #[serde(default)]
  pub container_id: Option<String>,
  pub container_name: String,
  /// Persisted as `"unknown"` when no image could be resolved (the
  /// invariant in section 3).
  pub image: String,
  pub status: ServiceRuntimeStatus,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "PascalCase")]
#[serde(rename_all = "PascalCase")]
pub enum ServiceRuntimeStatus {
  #[default]
  Pending,
  Created,
  Running,
  Exited,
  Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckConfig {
  pub service_name: String,
  pub endpoint: Option<String>,
  pub interval_secs: u64,
}

/// Captured on `CreateSnapshot`, cleared on `ClearSnapshot`. At most one
/// pending snapshot per aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingUpgradeSnapshot {
  pub stack_version: String,
  pub variables: HashMap<String, String>,
  pub services: Vec<SnapshotService>,
  pub description: Option<String>,
  pub captured_at_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotService {
  pub name: String,
  pub image: String,
}
