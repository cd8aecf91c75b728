use chrono::{DateTime, Utc};

/// Subtypes of [Manifest][manifest::Manifest]: product/fragment parsing model.
pub mod manifest;
/// Subtypes of [DeploymentPlan][plan::DeploymentPlan].
pub mod plan;
/// Subtypes of [Deployment][deployment::Deployment], the per-stack aggregate.
pub mod deployment;
/// Subtypes of [ProductDeployment][product::ProductDeployment], the multi-stack aggregate.
pub mod product;
/// [ProductDefinition][catalog::ProductDefinition] catalog entry shape.
pub mod catalog;
/// [RegistryEntry][registry::RegistryEntry] and credential resolution types.
pub mod registry;
/// [Environment][environment::Environment], the deploy target handle.
pub mod environment;
/// [HealthSnapshot][health::HealthSnapshot] and retention types.
pub mod health;
/// Progress/notification payloads forwarded to external push channels.
pub mod notify;
/// Typed error surface shared by every workflow (spec section 7).
pub mod error;
/// [LogConfig][logger::LogConfig], the ambient tracing-subscriber config shape.
pub mod logger;

/// Opaque 128-bit identifier, textual form is a UUID.
pub type Id = uuid::Uuid;

/// Millisecond UTC timestamp, matching the wire-stable JSON shape used
/// throughout the persisted state layout.
pub fn now() -> DateTime<Utc> {
  Utc::now()
}
