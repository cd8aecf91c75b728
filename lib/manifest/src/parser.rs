use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use rsgo_client::entities::manifest::{Manifest, Metadata, ServiceTemplate};
use serde_yaml_ng::Value;

use crate::format::{detect_format, Format};

/// Parses YAML into the [`Manifest`] model, detecting Compose vs.
/// native shape first (section 4.3). Both shapes are parseable; a
/// missing `metadata.productVersion` is left for the validator to warn
/// on, never a parse error.
pub fn parse_str(yaml: &str) -> Result<Manifest> {
  match detect_format(yaml) {
    Format::Native => parse_native(yaml),
    Format::Compose => parse_compose(yaml),
  }
}

/// `services.include:` is written as a reserved `include:` key nested
/// inside a `services:` mapping, alongside ordinary service entries
/// (section 3/4.3). `serde`'s derive can't split one YAML key into two
/// struct fields, so this walks the raw tree first: every `services:`
/// mapping (at the manifest root, and inside each inline stack) has its
/// `include` entry lifted out into a sibling `services_include:` array
/// before the typed deserialization runs.
fn parse_native(yaml: &str) -> Result<Manifest> {
  let mut value: Value = serde_yaml_ng::from_str(yaml).context("failed to parse manifest YAML")?;
  if let Some(root) = value.as_mapping_mut() {
    lift_services_include(root);
    if let Some(Value::Mapping(stacks)) = root.get_mut("stacks") {
      for (_, stack_value) in stacks.iter_mut() {
        if let Some(stack_map) = stack_value.as_mapping_mut() {
          lift_services_include(stack_map);
        }
      }
    }
  }
  serde_yaml_ng::from_value::<Manifest>(value).context("failed to parse native manifest")
}

fn lift_services_include(map: &mut serde_yaml_ng::Mapping) {
  let Some(Value::Mapping(services)) = map.get_mut("services") else {
    return;
  };
  let include_key = Value::String("include".to_string());
  if let Some(include_value) = services.remove(&include_key) {
    map.insert(Value::String("services_include".to_string()), include_value);
  }
}

fn parse_compose(yaml: &str) -> Result<Manifest> {
  let value: Value = serde_yaml_ng::from_str(yaml).context("failed to parse compose YAML")?;
  let mapping = value.as_mapping().context("compose file is not a mapping")?;

  let mut services = IndexMap::new();
  if let Some(services_value) = mapping.get("services") {
    let services_map = services_value.as_mapping().context("`services` must be a mapping")?;
    for (key, svc_value) in services_map {
      let name = key.as_str().context("service key must be a string")?.to_string();
      services.insert(name, compose_service(svc_value)?);
    }
  }

  Ok(Manifest {
    version: "compose".to_string(),
    metadata: Metadata { name: String::new(), ..Default::default() },
    services,
    stacks: IndexMap::new(),
    variables: IndexMap::new(),
    shared_variables: IndexMap::new(),
    maintenance: None,
    services_include: Vec::new(),
  })
}

fn compose_service(value: &Value) -> Result<ServiceTemplate> {
  let mapping = value.as_mapping().context("service entry must be a mapping")?;

  let image = mapping
    .get("image")
    .and_then(|v| v.as_str())
    .unwrap_or_default()
    .to_string();

  let environment = match mapping.get("environment") {
    Some(Value::Mapping(m)) => m
      .iter()
      .filter_map(|(k, v)| Some((k.as_str()?.to_string(), value_to_string(v))))
      .collect(),
    Some(Value::Sequence(seq)) => seq
      .iter()
      .filter_map(|v| v.as_str())
      .filter_map(|s| s.split_once('='))
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect(),
    _ => HashMap::new(),
  };

  let ports = string_list(mapping.get("ports"));
  let volumes = string_list(mapping.get("volumes"));
  let networks = string_list(mapping.get("networks"));
  let depends_on = match mapping.get("depends_on") {
    Some(Value::Sequence(_)) => string_list(mapping.get("depends_on")),
    Some(Value::Mapping(m)) => m.keys().filter_map(|k| k.as_str().map(String::from)).collect(),
    _ => Vec::new(),
  };

  Ok(ServiceTemplate {
    image,
    version: None,
    environment,
    ports,
    volumes,
    networks,
    depends_on,
    init: false,
  })
}

fn string_list(value: Option<&Value>) -> Vec<String> {
  match value {
    Some(Value::Sequence(seq)) => seq.iter().filter_map(|v| v.as_str().map(String::from)).collect(),
    _ => Vec::new(),
  }
}

fn value_to_string(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    Value::Number(n) => n.to_string(),
    Value::Bool(b) => b.to_string(),
    _ => String::new(),
  }
}

/// Re-serializes a manifest back to native YAML; used by the CLI and
/// by round-trip tests.
pub fn to_yaml(manifest: &Manifest) -> Result<String> {
  serde_yaml_ng::to_string(manifest).context("failed to serialize manifest")
}

pub fn require_services_or_stacks(manifest: &Manifest) -> Result<()> {
  if manifest.services.is_empty() && manifest.stacks.is_empty() {
    bail!("manifest declares neither `services` nor `stacks`");
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_native_manifest() {
    let yaml = r#"
version: "1"
metadata:
  name: demo
  productVersion: 1.0.0
variables:
  PORT:
    label: Port
    type: Port
    default: "8080"
services:
  web:
    image: nginx
    version: "1.27"
    ports:
      - "${PORT}:80"
"#;
    let m = parse_str(yaml).unwrap();
    assert!(m.is_product());
    assert_eq!(m.services.len(), 1);
  }

  #[test]
  fn parses_compose_file() {
    let yaml = r#"
services:
  web:
    image: nginx:1.27
    environment:
      - FOO=bar
    ports:
      - "80:80"
    depends_on:
      - db
  db:
    image: postgres:15
    environment:
      POSTGRES_PASSWORD: secret
"#;
    let m = parse_str(yaml).unwrap();
    assert!(!m.is_product());
    assert_eq!(m.services.len(), 2);
    assert_eq!(m.services["web"].environment.get("FOO").unwrap(), "bar");
    assert_eq!(m.services["web"].depends_on, vec!["db".to_string()]);
    assert_eq!(
      m.services["db"].environment.get("POSTGRES_PASSWORD").unwrap(),
      "secret"
    );
  }
}
