use std::collections::HashMap;

use async_trait::async_trait;
use rsgo_client::entities::{
  error::CoreError,
  product::{ProductDeployment, ProductStatus},
  Id,
};
use tokio::sync::RwLock;

/// Multi-stack product-deployment repository. An "active" deployment is
/// any non-`Removed`, non-`Failed` aggregate for an `(environment, group)`
/// pair — `DeployProduct` rejects a second one (section 4.9).
#[async_trait]
pub trait ProductStore: Send + Sync {
  async fn get(&self, id: Id) -> anyhow::Result<Option<ProductDeployment>>;

  async fn find_active(
    &self,
    environment_id: Id,
    product_group_id: &str,
  ) -> anyhow::Result<Option<ProductDeployment>>;

  async fn create(&self, deployment: ProductDeployment) -> anyhow::Result<()>;

  async fn save(&self, deployment: ProductDeployment) -> anyhow::Result<ProductDeployment>;
}

#[derive(Default)]
pub struct InMemoryProductStore {
  entries: RwLock<HashMap<Id, ProductDeployment>>,
}

impl InMemoryProductStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
  async fn get(&self, id: Id) -> anyhow::Result<Option<ProductDeployment>> {
    Ok(self.entries.read().await.get(&id).cloned())
  }

  async fn find_active(
    &self,
    environment_id: Id,
    product_group_id: &str,
  ) -> anyhow::Result<Option<ProductDeployment>> {
    let entries = self.entries.read().await;
    Ok(
      entries
        .values()
        .find(|d| {
          d.environment_id == environment_id
            && d.product_group_id == product_group_id
            && !matches!(d.status, ProductStatus::Removed | ProductStatus::Failed)
        })
        .cloned(),
    )
  }

  async fn create(&self, deployment: ProductDeployment) -> anyhow::Result<()> {
    self.entries.write().await.insert(deployment.id, deployment);
    Ok(())
  }

  async fn save(&self, deployment: ProductDeployment) -> anyhow::Result<ProductDeployment> {
    let mut entries = self.entries.write().await;
    let current_version = entries.get(&deployment.id).map(|d| d.version).unwrap_or(0);
    if current_version != deployment.version {
      return Err(
        CoreError::ConcurrencyConflict {
          entity: "ProductDeployment",
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

  fn product(env_id: Id, group: &str, version: u64, status: ProductStatus) -> ProductDeployment {
    ProductDeployment {
      id: Uuid::new_v4(),
      environment_id: env_id,
      product_group_id: group.to_string(),
      product_id: "prod-1".to_string(),
      product_name: "Test Product".to_string(),
      product_version: "1.0.0".to_string(),
      previous_version: None,
      upgrade_count: 0,
      status,
      created_at: Utc::now(),
      completed_at: None,
      error_message: None,
      continue_on_error: false,
      shared_variables: HashMap::new(),
      phase_history: Vec::new(),
      stacks: Vec::new(),
      version,
    }
  }

  #[tokio::test]
  async fn find_active_excludes_removed_and_failed() {
    let store = InMemoryProductStore::new();
    let env = Uuid::new_v4();
    store.create(product(env, "group-a", 1, ProductStatus::Removed)).await.unwrap();
    store.create(product(env, "group-a", 1, ProductStatus::Failed)).await.unwrap();

    assert!(store.find_active(env, "group-a").await.unwrap().is_none());

    let running = product(env, "group-a", 1, ProductStatus::Running);
    store.create(running.clone()).await.unwrap();
    assert_eq!(store.find_active(env, "group-a").await.unwrap().unwrap().id, running.id);
  }
}
