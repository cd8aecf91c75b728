//! Mock [`ContainerRuntime`] used to test the orchestration logic in
//! [`crate::execute`] and [`crate::remove`] without a Docker daemon.

use std::{
  collections::{HashMap, HashSet},
  sync::Mutex,
};

use async_trait::async_trait;
use rsgo_client::entities::plan::Step;

use crate::runtime::{ContainerHandle, ContainerRuntime, RegistryAuth};

#[derive(Default)]
pub struct MockRuntime {
  state: Mutex<State>,
}

#[derive(Default)]
struct State {
  failing_pulls: HashSet<String>,
  local_images: HashSet<String>,
  exit_codes: HashMap<String, i64>,
  created: Vec<String>,
  stack_containers: HashMap<String, Vec<ContainerHandle>>,
  removed: HashSet<String>,
}

impl MockRuntime {
  pub fn fail_pull(&self, image: &str) {
    self.state.lock().unwrap().failing_pulls.insert(image.to_string());
  }

  pub fn mark_local_image_present(&self, image: &str, version: &str) {
    self.state.lock().unwrap().local_images.insert(format!("{image}:{version}"));
  }

  pub fn set_exit_code(&self, container_name: &str, code: i64) {
    self.state.lock().unwrap().exit_codes.insert(container_name.to_string(), code);
  }

  pub fn created_containers(&self) -> Vec<String> {
    self.state.lock().unwrap().created.clone()
  }

  pub fn seed_stack_container(&self, stack: &str, context_name: &str, container_id: &str) {
    self.state.lock().unwrap().stack_containers.entry(stack.to_string()).or_default().push(
      ContainerHandle {
        id: container_id.to_string(),
        name: context_name.to_string(),
        context_name: context_name.to_string(),
      },
    );
  }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
  async fn pull_image(
    &self,
    image: &str,
    _version: &str,
    _credentials: Option<&RegistryAuth>,
  ) -> anyhow::Result<()> {
    if self.state.lock().unwrap().failing_pulls.contains(image) {
      anyhow::bail!("simulated pull failure for '{image}'");
    }
    Ok(())
  }

  async fn image_exists(&self, image: &str, version: &str) -> anyhow::Result<bool> {
    Ok(self.state.lock().unwrap().local_images.contains(&format!("{image}:{version}")))
  }

  async fn ensure_network(&self, _network_name: &str) -> anyhow::Result<()> {
    Ok(())
  }

  async fn remove_network_if_empty(&self, _network_name: &str) -> anyhow::Result<()> {
    Ok(())
  }

  async fn remove_container_if_exists(&self, _container_name: &str) -> anyhow::Result<()> {
    Ok(())
  }

  async fn create_and_start_container(
    &self,
    step: &Step,
    _network_name: &str,
    _labels: HashMap<String, String>,
  ) -> anyhow::Result<ContainerHandle> {
    self.state.lock().unwrap().created.push(step.container_name.clone());
    Ok(ContainerHandle {
      id: step.container_name.clone(),
      name: step.container_name.clone(),
      context_name: step.context_name.clone(),
    })
  }

  async fn wait_for_exit(&self, container_id: &str) -> anyhow::Result<i64> {
    Ok(self.state.lock().unwrap().exit_codes.get(container_id).copied().unwrap_or(0))
  }

  async fn list_stack_containers(&self, stack_name: &str) -> anyhow::Result<Vec<ContainerHandle>> {
    let state = self.state.lock().unwrap();
    Ok(state
      .stack_containers
      .get(stack_name)
      .cloned()
      .unwrap_or_default()
      .into_iter()
      .filter(|h| !state.removed.contains(&h.id))
      .collect())
  }

  async fn remove_container(&self, container_id: &str) -> anyhow::Result<()> {
    self.state.lock().unwrap().removed.insert(container_id.to_string());
    Ok(())
  }
}
