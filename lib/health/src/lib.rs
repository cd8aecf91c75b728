//! The health snapshot store (component C10): an append-only record of
//! per-deployment health snapshots with environment-scoped latest
//! lookup and TTL-based retention. Section 4.10.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rsgo_client::entities::{health::HealthSnapshot, Id};
use tokio::sync::RwLock;

/// Append-only health-snapshot repository (section 4.10).
#[async_trait]
pub trait HealthStore: Send + Sync {
  async fn append(&self, snapshot: HealthSnapshot) -> anyhow::Result<()>;

  async fn get_latest_for_deployment(&self, deployment_id: Id)
    -> anyhow::Result<Option<HealthSnapshot>>;

  /// One most-recent snapshot per distinct `deployment_id` in this environment.
  async fn get_latest_for_environment(
    &self,
    environment_id: Id,
  ) -> anyhow::Result<Vec<HealthSnapshot>>;

  /// `limit` most-recent snapshots for this deployment, newest first.
  async fn get_history(&self, deployment_id: Id, limit: usize) -> anyhow::Result<Vec<HealthSnapshot>>;

  /// Deletes every snapshot older than `now - ttl`; returns the count removed.
  async fn remove_older_than(&self, ttl: Duration) -> anyhow::Result<usize>;
}

#[derive(Default)]
pub struct InMemoryHealthStore {
  snapshots: RwLock<Vec<HealthSnapshot>>,
}

impl InMemoryHealthStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl HealthStore for InMemoryHealthStore {
  async fn append(&self, snapshot: HealthSnapshot) -> anyhow::Result<()> {
    self.snapshots.write().await.push(snapshot);
    Ok(())
  }

  async fn get_latest_for_deployment(
    &self,
    deployment_id: Id,
  ) -> anyhow::Result<Option<HealthSnapshot>> {
    Ok(
      self
        .snapshots
        .read()
        .await
        .iter()
        .filter(|s| s.deployment_id == deployment_id)
        .max_by_key(|s| s.captured_at_utc)
        .cloned(),
    )
  }

  async fn get_latest_for_environment(
    &self,
    environment_id: Id,
  ) -> anyhow::Result<Vec<HealthSnapshot>> {
    let snapshots = self.snapshots.read().await;
    let mut latest: HashMap<Id, HealthSnapshot> = HashMap::new();
    for s in snapshots.iter().filter(|s| s.environment_id == environment_id) {
      latest
        .entry(s.deployment_id)
        .and_modify(|existing| {
          if s.captured_at_utc > existing.captured_at_utc {
            *existing = s.clone();
          }
        })
        .or_insert_with(|| s.clone());
    }
    Ok(latest.into_values().collect())
  }

  async fn get_history(&self, deployment_id: Id, limit: usize) -> anyhow::Result<Vec<HealthSnapshot>> {
    let mut matching: Vec<HealthSnapshot> = self
      .snapshots
      .read()
      .await
      .iter()
      .filter(|s| s.deployment_id == deployment_id)
      .cloned()
      .collect();
    matching.sort_by(|a, b| b.captured_at_utc.cmp(&a.captured_at_utc));
    matching.truncate(limit);
    Ok(matching)
  }

  async fn remove_older_than(&self, ttl: Duration) -> anyhow::Result<usize> {
    let cutoff: DateTime<Utc> = Utc::now() - ttl;
    let mut snapshots = self.snapshots.write().await;
    let before = snapshots.len();
    snapshots.retain(|s| s.captured_at_utc >= cutoff);
    Ok(before - snapshots.len())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rsgo_client::entities::health::{OperationMode, OverallHealth, SelfReport};
  use uuid::Uuid;

  fn snapshot(deployment_id: Id, environment_id: Id, captured_at_utc: DateTime<Utc>) -> HealthSnapshot {
    HealthSnapshot {
      id: Uuid::new_v4(),
      organization_id: "org".to_string(),
      environment_id,
      deployment_id,
      stack_name: "teststack".to_string(),
      operation_mode: OperationMode::Normal,
      stack_version: "1.0.0".to_string(),
      captured_at_utc,
      overall: OverallHealth::Healthy,
      self_report: SelfReport { services: Vec::new(), total_count: 0 },
    }
  }

  #[tokio::test]
  async fn history_is_newest_first_and_truncated() {
    let store = InMemoryHealthStore::new();
    let deployment_id = Uuid::new_v4();
    let env_id = Uuid::new_v4();
    let base = Utc::now();
    for i in 0..5 {
      store
        .append(snapshot(deployment_id, env_id, base + Duration::seconds(i)))
        .await
        .unwrap();
    }

    let history = store.get_history(deployment_id, 2).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[0].captured_at_utc > history[1].captured_at_utc);
  }

  #[tokio::test]
  async fn remove_older_than_prunes_stale_snapshots() {
    let store = InMemoryHealthStore::new();
    let deployment_id = Uuid::new_v4();
    let env_id = Uuid::new_v4();
    store.append(snapshot(deployment_id, env_id, Utc::now() - Duration::days(10))).await.unwrap();
    store.append(snapshot(deployment_id, env_id, Utc::now())).await.unwrap();

    let removed = store.remove_older_than(Duration::days(1)).await.unwrap();
    assert_eq!(removed, 1);
    assert_eq!(store.get_history(deployment_id, 10).await.unwrap().len(), 1);
  }
}
