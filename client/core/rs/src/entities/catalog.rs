use serde::{Deserialize, Serialize};

use super::manifest::Manifest;

/// Runtime catalog form of a manifest (section 3). `groupId = productId
/// ?? "{sourceId}:{name}"`; `catalogKey = "{groupId}:{productVersion}"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductDefinition {
  pub source_id: String,
  pub name: String,
  pub display_name: String,
  #[serde(default)]
  pub product_version: Option<String>,
  #[serde(default)]
  pub product_id: Option<String>,
  pub stacks: Vec<StackDefinition>,
  /// Resolved manifest backing this catalog entry; kept alongside so
  /// the planner/variable resolver never re-parses YAML mid-workflow.
  pub manifest: Manifest,
}

impl ProductDefinition {
  pub fn group_id(&self) -> String {
    self.product_id.clone().unwrap_or_else(|| format!("{}:{}", self.source_id, self.name))
  }

  pub fn catalog_key(&self) -> String {
    format!("{}:{}", self.group_id(), self.product_version.as_deref().unwrap_or("0.0.0"))
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackDefinition {
  pub stack_name: String,
  pub display_name: String,
  pub order: i32,
  pub service_count: u32,
}
