use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::Id;

/// Periodic service-health snapshot per deployment. Section 3 / 4.10.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSnapshot {
  pub id: Id,
  pub organization_id: String,
  pub environment_id: Id,
  pub deployment_id: Id,
  pub stack_name: String,
  pub operation_mode: OperationMode,
  pub stack_version: String,
  pub captured_at_utc: DateTime<Utc>,
  pub overall: OverallHealth,
  #[serde(rename = "self")]
  pub self_report: SelfReport,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "PascalCase")]
#[serde(rename_all = "PascalCase")]
pub enum OperationMode {
  #[default]
  Normal,
  Maintenance,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "PascalCase")]
#[serde(rename_all = "PascalCase")]
pub enum OverallHealth {
  #[default]
  Healthy,
  Degraded,
  Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelfReport {
  pub services: Vec<ServiceHealth>,
  pub total_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealth {
  pub name: String,
  pub status: OverallHealth,
}

/// `overall` is computed, never set directly: Unhealthy if any service
/// is Unhealthy, else Degraded if any is Degraded, else Healthy.
pub fn compute_overall(services: &[ServiceHealth]) -> OverallHealth {
  if services.iter().any(|s| s.status == OverallHealth::Unhealthy) {
    OverallHealth::Unhealthy
  } else if services.iter().any(|s| s.status == OverallHealth::Degraded) {
    OverallHealth::Degraded
  } else {
    OverallHealth::Healthy
  }
}
