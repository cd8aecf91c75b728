use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::Id;

/// Multi-stack lifecycle entity. Owns per-stack sub-states, phase
/// history, shared variables, upgrade metadata and a concurrency token.
/// Section 4.8 / section 3 ("ProductDeployment aggregate").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductDeployment {
  pub id: Id,
  pub environment_id: Id,
  pub product_group_id: String,
  pub product_id: String,
  pub product_name: String,
  pub product_version: String,
  #[serde(default)]
  pub previous_version: Option<String>,
  #[serde(default)]
  pub upgrade_count: u32,
  pub status: ProductStatus,
  pub created_at: DateTime<Utc>,
  #[serde(default)]
  pub completed_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub error_message: Option<String>,
  pub continue_on_error: bool,
  #[serde(default)]
  pub shared_variables: HashMap<String, String>,
  #[serde(default)]
  pub phase_history: Vec<PhaseEvent>,
  pub stacks: Vec<StackSub>,
  /// Optimistic concurrency token (section 5), incremented on every
  /// persisted change.
  pub version: u64,
}

impl ProductDeployment {
  pub fn push_phase(&mut self, message: impl Into<String>, level: PhaseLevel) {
    self.phase_history.push(PhaseEvent { timestamp: Utc::now(), message: message.into(), level });
  }

  pub fn find_stack_mut(&mut self, stack_id: &str) -> Option<&mut StackSub> {
    self.stacks.iter_mut().find(|s| s.stack_id == stack_id)
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "PascalCase")]
#[serde(rename_all = "PascalCase")]
pub enum ProductStatus {
  #[default]
  Deploying,
  Running,
  PartiallyRunning,
  Upgrading,
  Removing,
  Removed,
  Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseEvent {
  pub timestamp: DateTime<Utc>,
  pub message: String,
  pub level: PhaseLevel,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PhaseLevel {
  #[default]
  Info,
  Warning,
  Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackSub {
  pub stack_name: String,
  pub stack_display_name: String,
  pub stack_id: String,
  pub order: i32,
  pub service_count: u32,
  #[serde(default)]
  pub variables: HashMap<String, String>,
  pub status: StackSubStatus,
  #[serde(default)]
  pub deployment_id: Option<Id>,
  #[serde(default)]
  pub deployment_stack_name: Option<String>,
  #[serde(default)]
  pub started_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub completed_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub error_message: Option<String>,
  #[serde(default)]
  pub is_new_in_upgrade: bool,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "PascalCase")]
#[serde(rename_all = "PascalCase")]
pub enum StackSubStatus {
  #[default]
  Pending,
  Running,
  Failed,
  Removed,
}

/// Orchestrator response shape (section 6, "Exit codes / error surface").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorResponse {
  pub success: bool,
  pub status: ProductStatus,
  pub message: String,
  pub stack_results: Vec<StackResult>,
  pub session_id: String,
  #[serde(default)]
  pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackResult {
  pub name: String,
  pub success: bool,
  #[serde(default)]
  pub deployment_id: Option<Id>,
  pub is_new_in_upgrade: bool,
  #[serde(default)]
  pub error_message: Option<String>,
}
