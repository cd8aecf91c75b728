use thiserror::Error;

/// The typed error surface from section 7 of the design. Workflow code
/// matches on this to decide retry / surface behavior; everything else
/// propagates as `anyhow::Error` with `.context(..)` chains.
#[derive(Debug, Error)]
pub enum CoreError {
  #[error("validation failed: {0}")]
  Validation(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("precondition violated: {0}")]
  PreconditionViolated(String),

  #[error("concurrency conflict on {entity} {id}: expected version {expected}, found {found}")]
  ConcurrencyConflict {
    entity: &'static str,
    id: String,
    expected: u64,
    found: u64,
  },

  #[error("failed to pull image '{image_ref}': {cause}")]
  PullFailure { image_ref: String, cause: String },

  #[error("container runtime error: {0}")]
  ContainerRuntimeError(String),

  #[error("transport error after {attempts} attempt(s): {cause}")]
  TransportError { attempts: u32, cause: String },

  #[error("operation cancelled")]
  Cancelled,

  #[error("fatal: {0}")]
  Fatal(String),
}

impl CoreError {
  /// `true` for errors the orchestrator should never retry automatically.
  pub fn is_terminal(&self) -> bool {
    !matches!(self, CoreError::ConcurrencyConflict { .. } | CoreError::TransportError { .. })
  }
}
