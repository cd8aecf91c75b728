//! The multi-stack product aggregate (C8) and the orchestrator (C9)
//! that drives deploy/upgrade/remove workflows across it. Section 4.8 / 4.9.

pub mod aggregate;
pub mod orchestrator;

pub use aggregate::StackConfig;
pub use orchestrator::{DeployRequest, Orchestrator, UpgradeCheck};
