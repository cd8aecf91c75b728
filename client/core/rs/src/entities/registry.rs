use serde::{Deserialize, Serialize};

use super::Id;

/// A stored container registry, scoped to an organization. Section 4.2.
///
/// Credentials are stored as cleartext in the underlying store — an
/// explicit, documented trade-off (section 7) — until the deployer
/// introduces an encrypted secret store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEntry {
  pub id: Id,
  pub organization_id: String,
  pub name: String,
  pub url: String,
  #[serde(default)]
  pub username: Option<String>,
  #[serde(default)]
  pub password: Option<String>,
  /// Glob patterns (`*` within a path segment, `**` across segments)
  /// matched against `registry/name` image references.
  #[serde(default)]
  pub image_patterns: Vec<String>,
  #[serde(default)]
  pub is_default: bool,
}

#[derive(Debug, Clone)]
pub struct RegistryCredentials {
  pub username: Option<String>,
  pub password: Option<String>,
}
