use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Phase names the deployment engine reports through, with their
/// overall-percent weight bands (section 4.6).
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "PascalCase")]
#[serde(rename_all = "PascalCase")]
pub enum EnginePhase {
  #[default]
  Resolving,
  PullingImages,
  InitializingContainers,
  StartingServices,
}

impl EnginePhase {
  /// `(start, end)` of this phase's overall-percent band.
  pub const fn band(self) -> (u32, u32) {
    match self {
      EnginePhase::Resolving => (0, 10),
      EnginePhase::PullingImages => (10, 70),
      EnginePhase::InitializingContainers => (70, 80),
      EnginePhase::StartingServices => (80, 100),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
  pub session_id: String,
  pub phase: EnginePhase,
  pub message: String,
  pub overall_percent: u32,
  #[serde(default)]
  pub current_service: Option<String>,
  pub total_services: u32,
  pub completed_services: u32,
  pub total_init_containers: u32,
  pub completed_init_containers: u32,
}

/// A single terminal notification recorded once per workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InAppNotification {
  pub session_id: String,
  pub product_name: String,
  pub product_version: String,
  pub stack_count: u32,
  pub success: bool,
  pub message: String,
}
