//! The in-memory product catalog (component C11): versioned product
//! definitions grouped by `groupId`, with SemVer-ordered lookup and
//! upgrade enumeration. Single-writer/many-reader discipline via a
//! `tokio::sync::RwLock` (section 5). Section 4.11.

pub mod ingest;
pub mod semver;

use std::collections::HashMap;

use rsgo_client::entities::catalog::ProductDefinition;
use tokio::sync::RwLock;

pub use ingest::from_manifest;

#[derive(Default)]
pub struct Catalog {
  by_group: RwLock<HashMap<String, Vec<ProductDefinition>>>,
}

impl Catalog {
  pub fn new() -> Self {
    Self::default()
  }

  /// Stores once per `(groupId, productVersion)`; a missing version is
  /// stored under an empty-string version key (at most one per group).
  pub async fn upsert(&self, definition: ProductDefinition) {
    let group_id = definition.group_id();
    let version_key = definition.product_version.clone().unwrap_or_default();
    let mut by_group = self.by_group.write().await;
    let entries = by_group.entry(group_id).or_default();
    entries.retain(|d| d.product_version.clone().unwrap_or_default() != version_key);
    entries.push(definition);
  }

  pub async fn remove(&self, group_id: &str, version: Option<&str>) {
    let mut by_group = self.by_group.write().await;
    if let Some(entries) = by_group.get_mut(group_id) {
      entries.retain(|d| d.product_version.as_deref() != version);
    }
  }

  pub async fn clear(&self) {
    self.by_group.write().await.clear();
  }

  pub async fn get(&self, group_id: &str, version: &str) -> Option<ProductDefinition> {
    self
      .by_group
      .read()
      .await
      .get(group_id)?
      .iter()
      .find(|d| d.product_version.as_deref() == Some(version))
      .cloned()
  }

  /// Max by SemVer among versioned entries; falls back to the lone
  /// missing-version entry if that's all the group has.
  pub async fn get_latest_product_version(&self, group_id: &str) -> Option<ProductDefinition> {
    let by_group = self.by_group.read().await;
    let entries = by_group.get(group_id)?;
    entries
      .iter()
      .filter(|d| d.product_version.is_some())
      .max_by(|a, b| {
        semver::parse(a.product_version.as_deref().unwrap_or_default())
          .cmp(&semver::parse(b.product_version.as_deref().unwrap_or_default()))
      })
      .or_else(|| entries.first())
      .cloned()
  }

  /// Strictly-greater versions than `current_version`, SemVer descending.
  pub async fn get_available_upgrades(
    &self,
    group_id: &str,
    current_version: &str,
  ) -> Vec<ProductDefinition> {
    let by_group = self.by_group.read().await;
    let Some(entries) = by_group.get(group_id) else { return Vec::new() };
    let mut upgrades: Vec<ProductDefinition> = entries
      .iter()
      .filter(|d| {
        d.product_version
          .as_deref()
          .is_some_and(|v| semver::is_greater(v, current_version))
      })
      .cloned()
      .collect();
    upgrades.sort_by(|a, b| {
      semver::parse(b.product_version.as_deref().unwrap_or_default())
        .cmp(&semver::parse(a.product_version.as_deref().unwrap_or_default()))
    });
    upgrades
  }

  /// Legacy lookup: the latest product across all groups whose entries
  /// carry this `(source_id, name)` pair.
  pub async fn find_by_legacy_source(&self, source_id: &str, name: &str) -> Option<ProductDefinition> {
    let by_group = self.by_group.read().await;
    by_group
      .values()
      .flatten()
      .filter(|d| d.source_id == source_id && d.name == name)
      .max_by(|a, b| {
        semver::parse(a.product_version.as_deref().unwrap_or_default())
          .cmp(&semver::parse(b.product_version.as_deref().unwrap_or_default()))
      })
      .cloned()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rsgo_client::entities::manifest::Manifest;

  fn definition(source_id: &str, name: &str, product_id: &str, version: &str) -> ProductDefinition {
    ProductDefinition {
      source_id: source_id.to_string(),
      name: name.to_string(),
      display_name: name.to_string(),
      product_version: Some(version.to_string()),
      product_id: Some(product_id.to_string()),
      stacks: Vec::new(),
      manifest: Manifest::default(),
    }
  }

  #[tokio::test]
  async fn latest_and_upgrades_are_semver_ordered() {
    let catalog = Catalog::new();
    for v in ["1.0.0", "1.2.0", "2.0.0", "1.0.5"] {
      catalog.upsert(definition("src", "app", "group-a", v)).await;
    }

    let latest = catalog.get_latest_product_version("group-a").await.unwrap();
    assert_eq!(latest.product_version.as_deref(), Some("2.0.0"));

    let upgrades = catalog.get_available_upgrades("group-a", "1.0.0").await;
    let versions: Vec<_> = upgrades.iter().map(|d| d.product_version.clone().unwrap()).collect();
    assert_eq!(versions, vec!["2.0.0".to_string(), "1.2.0".to_string(), "1.0.5".to_string()]);
  }

  #[tokio::test]
  async fn upsert_replaces_same_version() {
    let catalog = Catalog::new();
    catalog.upsert(definition("src", "app", "group-a", "1.0.0")).await;
    catalog.upsert(definition("src", "renamed", "group-a", "1.0.0")).await;

    let entry = catalog.get("group-a", "1.0.0").await.unwrap();
    assert_eq!(entry.name, "renamed");
  }

  #[tokio::test]
  async fn legacy_lookup_falls_back_across_groups() {
    let catalog = Catalog::new();
    catalog.upsert(definition("legacy-src", "legacy-app", "group-a", "1.0.0")).await;
    catalog.upsert(definition("legacy-src", "legacy-app", "group-a", "2.0.0")).await;

    let found = catalog.find_by_legacy_source("legacy-src", "legacy-app").await.unwrap();
    assert_eq!(found.product_version.as_deref(), Some("2.0.0"));
  }
}
