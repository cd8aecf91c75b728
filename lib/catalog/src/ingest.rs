//! Converts a resolved [`Manifest`] into the runtime [`ProductDefinition`]
//! shape the catalog stores (section 4.11): "Catalog (C11) supplies
//! definitions for deploy/upgrade checks," fed by the parser (C3).

use rsgo_client::entities::{
  catalog::{ProductDefinition, StackDefinition},
  manifest::{Manifest, StackEntry},
};

/// Builds a catalog entry directly from a fully-resolved manifest (no
/// pending `include:` references). Multi-stack manifests enumerate one
/// [`StackDefinition`] per declared stack, in declaration order;
/// single-stack manifests get one implicit stack named after the
/// product itself.
pub fn from_manifest(source_id: &str, manifest: Manifest) -> ProductDefinition {
  let stacks = if manifest.is_multi_stack() {
    manifest
      .stacks
      .iter()
      .enumerate()
      .filter_map(|(order, (stack_name, entry))| match entry {
        StackEntry::Inline(inline) => Some(StackDefinition {
          stack_name: stack_name.clone(),
          display_name: if inline.metadata.name.is_empty() {
            stack_name.clone()
          } else {
            inline.metadata.name.clone()
          },
          order: order as i32,
          service_count: inline.services.len() as u32,
        }),
        // Should already be resolved by lib/manifest's include resolver
        // before a definition reaches the catalog.
        StackEntry::Include { .. } => None,
      })
      .collect()
  } else {
    vec![StackDefinition {
      stack_name: manifest.metadata.name.clone(),
      display_name: manifest.metadata.name.clone(),
      order: 0,
      service_count: manifest.services.len() as u32,
    }]
  };

  ProductDefinition {
    source_id: source_id.to_string(),
    name: manifest.metadata.name.clone(),
    display_name: manifest.metadata.name.clone(),
    product_version: manifest.metadata.product_version.clone(),
    product_id: manifest.metadata.product_id.clone(),
    stacks,
    manifest,
  }
}

#[cfg(test)]
mod tests {
  use indexmap::IndexMap;
  use rsgo_client::entities::manifest::{InlineStack, Metadata, ServiceTemplate};

  use super::*;

  #[test]
  fn single_stack_manifest_gets_one_implicit_stack() {
    let mut manifest = Manifest {
      metadata: Metadata { name: "widgets".to_string(), product_version: Some("1.0.0".to_string()), ..Default::default() },
      ..Default::default()
    };
    manifest.services.insert("api".to_string(), ServiceTemplate::default());

    let definition = from_manifest("src", manifest);
    assert_eq!(definition.stacks.len(), 1);
    assert_eq!(definition.stacks[0].stack_name, "widgets");
    assert_eq!(definition.stacks[0].service_count, 1);
    assert_eq!(definition.group_id(), "src:widgets");
  }

  #[test]
  fn multi_stack_manifest_enumerates_declared_stacks_in_order() {
    let mut manifest = Manifest {
      metadata: Metadata { name: "suite".to_string(), product_version: Some("2.0.0".to_string()), product_id: Some("suite-id".to_string()), ..Default::default() },
      ..Default::default()
    };
    let mut first_services = IndexMap::new();
    first_services.insert("db".to_string(), ServiceTemplate::default());
    manifest.stacks.insert(
      "backend".to_string(),
      StackEntry::Inline(InlineStack {
        metadata: Metadata { name: "Backend".to_string(), ..Default::default() },
        services: first_services,
        ..Default::default()
      }),
    );
    manifest.stacks.insert(
      "frontend".to_string(),
      StackEntry::Inline(InlineStack::default()),
    );

    let definition = from_manifest("src", manifest);
    assert_eq!(definition.stacks.len(), 2);
    assert_eq!(definition.stacks[0].stack_name, "backend");
    assert_eq!(definition.stacks[0].display_name, "Backend");
    assert_eq!(definition.stacks[0].order, 0);
    assert_eq!(definition.stacks[1].stack_name, "frontend");
    assert_eq!(definition.stacks[1].display_name, "frontend");
    assert_eq!(definition.group_id(), "suite-id");
  }
}
