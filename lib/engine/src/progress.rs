use rsgo_client::entities::notify::{EnginePhase, ProgressUpdate};

/// Computes the overall 0-100 percent for a phase given how much of
/// that phase's own work is done, per the weighted bands in section
/// 4.6. Progress is monotonic within a phase; a phase transition resets
/// the *band*, never rewinds the percent value itself.
pub fn overall_percent(phase: EnginePhase, completed: u32, total: u32) -> u32 {
  let (start, end) = phase.band();
  if total == 0 {
    return start;
  }
  let ratio = completed as f64 / total as f64;
  start + ((end - start) as f64 * ratio).round() as u32
}

pub struct ProgressReporter<'a> {
  session_id: String,
  total_services: u32,
  total_init_containers: u32,
  callback: Option<Box<dyn Fn(ProgressUpdate) + Send + Sync + 'a>>,
}

impl<'a> ProgressReporter<'a> {
  pub fn new(
    session_id: impl Into<String>,
    total_services: u32,
    total_init_containers: u32,
    callback: Option<Box<dyn Fn(ProgressUpdate) + Send + Sync + 'a>>,
  ) -> Self {
    Self { session_id: session_id.into(), total_services, total_init_containers, callback }
  }

  #[allow(clippy::too_many_arguments)]
  pub fn report(
    &self,
    phase: EnginePhase,
    message: impl Into<String>,
    current_service: Option<String>,
    completed_services: u32,
    completed_init_containers: u32,
    phase_completed: u32,
    phase_total: u32,
  ) {
    let Some(callback) = &self.callback else { return };
    callback(ProgressUpdate {
      session_id: self.session_id.clone(),
      phase,
      message: message.into(),
      overall_percent: overall_percent(phase, phase_completed, phase_total),
      current_service,
      total_services: self.total_services,
      completed_services,
      total_init_containers: self.total_init_containers,
      completed_init_containers,
    });
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bands_match_spec_table() {
    assert_eq!(EnginePhase::Resolving.band(), (0, 10));
    assert_eq!(EnginePhase::PullingImages.band(), (10, 70));
    assert_eq!(EnginePhase::InitializingContainers.band(), (70, 80));
    assert_eq!(EnginePhase::StartingServices.band(), (80, 100));
  }

  #[test]
  fn scales_linearly_within_phase() {
    assert_eq!(overall_percent(EnginePhase::PullingImages, 0, 4), 10);
    assert_eq!(overall_percent(EnginePhase::PullingImages, 2, 4), 40);
    assert_eq!(overall_percent(EnginePhase::PullingImages, 4, 4), 70);
  }

  #[test]
  fn zero_total_stays_at_band_start() {
    assert_eq!(overall_percent(EnginePhase::InitializingContainers, 0, 0), 70);
  }
}
