use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Top level manifest, parsed from YAML. A manifest is either a
/// *product* (carries `metadata.product_version`, deployable standalone)
/// or a *fragment* (no `product_version`, only usable via `include:`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
  pub version: String,
  pub metadata: Metadata,
  /// Single-stack manifests declare `services` directly.
  #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
  pub services: IndexMap<String, ServiceTemplate>,
  /// Multi-stack manifests declare `stacks` instead of `services`.
  #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
  pub stacks: IndexMap<String, StackEntry>,
  #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
  pub variables: IndexMap<String, VarDecl>,
  #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
  pub shared_variables: IndexMap<String, VarDecl>,
  #[serde(default)]
  pub maintenance: Option<MaintenanceBlock>,
  /// Present only on a `services:` section that declares
  /// `services.include: [...]`; merged into `services` by the resolver
  /// and then cleared, so the resolved manifest never carries it.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub services_include: Vec<String>,
}

impl Manifest {
  /// A manifest is a product iff `metadata.product_version` is set.
  pub fn is_product(&self) -> bool {
    self.metadata.product_version.is_some()
  }

  pub fn is_multi_stack(&self) -> bool {
    !self.stacks.is_empty()
  }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
  pub name: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub category: String,
  #[serde(default)]
  pub product_id: Option<String>,
  #[serde(default)]
  pub product_version: Option<String>,
}

/// A `stacks.<name>` entry: either an inline stack body, or a reference
/// to another manifest file to include in its place.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StackEntry {
  Include { include: String },
  Inline(InlineStack),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InlineStack {
  #[serde(default)]
  pub metadata: Metadata,
  #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
  pub variables: IndexMap<String, VarDecl>,
  #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
  pub services: IndexMap<String, ServiceTemplate>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub services_include: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceTemplate {
  pub image: String,
  #[serde(default)]
  pub version: Option<String>,
  #[serde(default)]
  pub environment: HashMap<String, String>,
  #[serde(default)]
  pub ports: Vec<String>,
  #[serde(default)]
  pub volumes: Vec<String>,
  #[serde(default)]
  pub networks: Vec<String>,
  #[serde(default)]
  pub depends_on: Vec<String>,
  /// Marks this service as an init/migration container: the engine
  /// waits for it to exit before it counts towards "deployed".
  #[serde(default)]
  pub init: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarDecl {
  pub label: String,
  #[serde(default)]
  pub description: String,
  #[serde(rename = "type", default)]
  pub var_type: VarType,
  #[serde(default)]
  pub default: Option<String>,
  #[serde(default)]
  pub required: bool,
  #[serde(default)]
  pub min: Option<i64>,
  #[serde(default)]
  pub max: Option<i64>,
  #[serde(default)]
  pub pattern: Option<String>,
  #[serde(default)]
  pub pattern_error: Option<String>,
  #[serde(default)]
  pub group: Option<String>,
  #[serde(default)]
  pub order: i32,
  #[serde(default)]
  pub options: Vec<SelectOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectOption {
  pub value: String,
  pub label: String,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "PascalCase")]
#[serde(rename_all = "PascalCase")]
pub enum VarType {
  #[default]
  String,
  Password,
  Port,
  Boolean,
  Integer,
  Select,
  EventStoreConnectionString,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceBlock {
  pub observer: MaintenanceObserver,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum MaintenanceObserver {
  SqlExtendedProperty {
    connection: String,
    #[serde(default)]
    polling_interval_secs: u64,
    maintenance_value: String,
    #[serde(default)]
    normal_value: Option<String>,
  },
  SqlQuery {
    connection: String,
    query: String,
    #[serde(default)]
    polling_interval_secs: u64,
    maintenance_value: String,
    #[serde(default)]
    normal_value: Option<String>,
  },
  Http {
    url: String,
    #[serde(default)]
    headers: HashMap<String, String>,
    #[serde(default)]
    json_path: Option<String>,
    #[serde(default)]
    polling_interval_secs: u64,
    maintenance_value: String,
    #[serde(default)]
    normal_value: Option<String>,
    #[serde(default)]
    mode: ObserverMode,
  },
  File {
    path: String,
    #[serde(default)]
    polling_interval_secs: u64,
    maintenance_value: String,
    #[serde(default)]
    normal_value: Option<String>,
  },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum ObserverMode {
  #[default]
  Exists,
  Equals,
}

/// Result of validating a parsed manifest (section 4.3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationResult {
  pub is_valid: bool,
  pub errors: Vec<String>,
  pub warnings: Vec<String>,
}

impl ValidationResult {
  pub fn ok() -> Self {
    Self { is_valid: true, errors: Vec::new(), warnings: Vec::new() }
  }

  pub fn push_error(&mut self, msg: impl Into<String>) {
    self.errors.push(msg.into());
    self.is_valid = false;
  }

  pub fn push_warning(&mut self, msg: impl Into<String>) {
    self.warnings.push(msg.into());
  }
}
