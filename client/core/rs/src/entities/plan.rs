use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::Id;

/// The internal, stable compilation target of a manifest stack plus a
/// resolved variable map. Sections 4.5 and section 6 (plan YAML/JSON).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeploymentPlan {
  pub stack_name: String,
  pub stack_version: String,
  #[serde(default)]
  pub environment_id: Option<Id>,
  pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Step {
  /// The service key from the manifest (`rsgo.context` label).
  pub context_name: String,
  pub image: String,
  pub version: String,
  pub container_name: String,
  #[serde(default)]
  pub env_vars: HashMap<String, String>,
  #[serde(default)]
  pub ports: Vec<String>,
  #[serde(default)]
  pub volumes: HashMap<String, String>,
  #[serde(default)]
  pub networks: Vec<String>,
  #[serde(default)]
  pub depends_on: Vec<String>,
  pub order: u32,
  pub lifecycle: Lifecycle,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "PascalCase")]
#[serde(rename_all = "PascalCase")]
pub enum Lifecycle {
  #[default]
  Service,
  Init,
}
