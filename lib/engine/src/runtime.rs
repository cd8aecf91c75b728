use std::collections::HashMap;

use async_trait::async_trait;
use rsgo_client::entities::plan::Step;

/// Abstracts the container runtime calls the engine makes, so the
/// two-phase orchestration logic (progress, cancellation, local-image
/// fallback) is testable without a live Docker daemon. [`crate::docker::BollardRuntime`]
/// is the production implementation.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
  async fn pull_image(
    &self,
    image: &str,
    version: &str,
    credentials: Option<&RegistryAuth>,
  ) -> anyhow::Result<()>;

  async fn image_exists(&self, image: &str, version: &str) -> anyhow::Result<bool>;

  async fn ensure_network(&self, network_name: &str) -> anyhow::Result<()>;

  /// Removes the network if it exists and has no attached containers.
  /// Never errors on a non-empty or already-absent network.
  async fn remove_network_if_empty(&self, network_name: &str) -> anyhow::Result<()>;

  async fn remove_container_if_exists(&self, container_name: &str) -> anyhow::Result<()>;

  async fn create_and_start_container(
    &self,
    step: &Step,
    network_name: &str,
    labels: HashMap<String, String>,
  ) -> anyhow::Result<ContainerHandle>;

  /// Blocks until the container exits, returning its exit code.
  async fn wait_for_exit(&self, container_id: &str) -> anyhow::Result<i64>;

  /// All containers carrying `rsgo.stack == stack_name`, in the
  /// order they were created (used for reverse-order removal).
  async fn list_stack_containers(&self, stack_name: &str) -> anyhow::Result<Vec<ContainerHandle>>;

  async fn remove_container(&self, container_id: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct ContainerHandle {
  pub id: String,
  pub name: String,
  pub context_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct RegistryAuth {
  pub username: Option<String>,
  pub password: Option<String>,
}
