use serde::{Deserialize, Serialize};

use super::Id;

/// A target container runtime: a local Docker socket or a remote Docker
/// API endpoint. Zero or more per organization, at most one default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
  pub id: Id,
  pub organization_id: String,
  pub name: String,
  pub connection: EnvironmentConnection,
  #[serde(default)]
  pub is_default: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EnvironmentConnection {
  LocalSocket { path: String },
  RemoteApi { base_url: String, tls_cert: Option<String> },
}
