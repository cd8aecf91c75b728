use std::collections::HashMap;

use async_trait::async_trait;
use rsgo_client::entities::{
  deployment::{Deployment, DeploymentStatus},
  error::CoreError,
  Id,
};
use tokio::sync::RwLock;

/// Per-stack deployment repository. Concurrency is enforced here: `save`
/// fails with [`CoreError::ConcurrencyConflict`] if the stored `version`
/// has moved since the caller last read it.
#[async_trait]
pub trait DeploymentStore: Send + Sync {
  async fn get(&self, id: Id) -> anyhow::Result<Option<Deployment>>;

  /// Most recent non-`Removed` deployment for this `(environment, stack_name)`.
  async fn get_by_stack_name(
    &self,
    environment_id: Id,
    stack_name: &str,
  ) -> anyhow::Result<Option<Deployment>>;

  /// Inserts a brand-new aggregate at `version = 1`.
  async fn create(&self, deployment: Deployment) -> anyhow::Result<()>;

  /// Persists an update; `deployment.version` must match the stored
  /// version before the bump, else [`CoreError::ConcurrencyConflict`].
  async fn save(&self, deployment: Deployment) -> anyhow::Result<Deployment>;
}

#[derive(Default)]
pub struct InMemoryDeploymentStore {
  entries: RwLock<HashMap<Id, Deployment>>,
}

impl InMemoryDeploymentStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl DeploymentStore for InMemoryDeploymentStore {
  async fn get(&self, id: Id) -> anyhow::Result<Option<Deployment>> {
    Ok(self.entries.read().await.get(&id).cloned())
  }

  async fn get_by_stack_name(
    &self,
    environment_id: Id,
    stack_name: &str,
  ) -> anyhow::Result<Option<Deployment>> {
    let entries = self.entries.read().await;
    Ok(
      entries
        .values()
        .filter(|d| {
          d.environment_id == environment_id
            && d.stack_name == stack_name
            && d.status != DeploymentStatus::Removed
        })
        .max_by_key(|d| d.updated_at)
        .cloned(),
    )
  }

  async fn create(&self, deployment: Deployment) -> anyhow::Result<()> {
    self.entries.write().await.insert(deployment.id, deployment);
    Ok(())
  }

  async fn save(&self, deployment: Deployment) -> anyhow::Result<Deployment> {
    let mut entries = self.entries.write().await;
    let current_version = entries.get(&deployment.id).map(|d| d.version).unwrap_or(0);
    if current_version != deployment.version {
      return Err(
        CoreError::ConcurrencyConflict {
          entity: "Deployment",
          id: deployment.id.to_string(),
          expected: deployment.version,
          found: current_version,
        }
        .into(),
      );
    }
    let mut next = deployment;
    next.version += 1;
    entries.insert(next.id, next.clone());
    Ok(next)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Utc;
  use uuid::Uuid;

  fn deployment(version: u64) -> Deployment {
    Deployment {
      id: Uuid::new_v4(),
      environment_id: Uuid::new_v4(),
      stack_name: "teststack".to_string(),
      project_name: "testproject".to_string(),
      status: DeploymentStatus::Installing,
      stack_version: "1.0.0".to_string(),
      variables: HashMap::new(),
      services: Vec::new(),
      health_check_configs: Vec::new(),
      pending_upgrade_snapshot: None,
      version,
      created_at: Utc::now(),
      updated_at: Utc::now(),
    }
  }

  #[tokio::test]
  async fn save_conflicts_on_stale_version() {
    let store = InMemoryDeploymentStore::new();
    let d = deployment(1);
    store.create(d.clone()).await.unwrap();

    let saved = store.save(d.clone()).await.unwrap();
    assert_eq!(saved.version, 2);

    let err = store.save(d).await.unwrap_err();
    assert!(err.downcast_ref::<CoreError>().is_some());
  }

  #[tokio::test]
  async fn get_by_stack_name_filters_removed() {
    let store = InMemoryDeploymentStore::new();
    let env_id = Uuid::new_v4();
    let mut d = deployment(1);
    d.environment_id = env_id;
    d.status = DeploymentStatus::Removed;
    store.create(d).await.unwrap();

    assert!(store.get_by_stack_name(env_id, "teststack").await.unwrap().is_none());
  }
}
