use std::collections::HashMap;

use async_trait::async_trait;
use bollard::{
  network::CreateNetworkOptions,
  query_parameters::{
    CreateContainerOptions, CreateImageOptions, ListContainersOptions, ListNetworksOptions,
    RemoveContainerOptions, StartContainerOptions, WaitContainerOptions,
  },
  secret::{ContainerCreateBody, HostConfig, PortBinding},
  Docker,
};
use futures::StreamExt;
use rsgo_client::entities::{environment::EnvironmentConnection, plan::Step};

use crate::runtime::{ContainerHandle, ContainerRuntime, RegistryAuth};

/// Production [`ContainerRuntime`], backed by a live Docker socket or
/// remote API endpoint (section 4.6 preflight: resolve `environmentId`
/// to a connected handle).
pub struct BollardRuntime {
  docker: Docker,
}

impl BollardRuntime {
  pub fn connect(connection: &EnvironmentConnection) -> anyhow::Result<Self> {
    let docker = match connection {
      EnvironmentConnection::LocalSocket { path } if path.is_empty() => {
        Docker::connect_with_local_defaults()?
      }
      EnvironmentConnection::LocalSocket { path } => {
        Docker::connect_with_unix(path, 120, bollard::API_DEFAULT_VERSION)?
      }
      EnvironmentConnection::RemoteApi { base_url, .. } => {
        Docker::connect_with_http(base_url, 120, bollard::API_DEFAULT_VERSION)?
      }
    };
    Ok(Self { docker })
  }

  fn image_ref(image: &str, version: &str) -> String {
    format!("{image}:{version}")
  }
}

#[async_trait]
impl ContainerRuntime for BollardRuntime {
  async fn pull_image(
    &self,
    image: &str,
    version: &str,
    credentials: Option<&RegistryAuth>,
  ) -> anyhow::Result<()> {
    let options = CreateImageOptions {
      from_image: Some(image.to_string()),
      tag: Some(version.to_string()),
      ..Default::default()
    };
    let auth = credentials.map(|c| bollard::auth::DockerCredentials {
      username: c.username.clone(),
      password: c.password.clone(),
      ..Default::default()
    });

    let mut stream = self.docker.create_image(Some(options), None, auth);
    while let Some(chunk) = stream.next().await {
      chunk?;
    }
    Ok(())
  }

  async fn image_exists(&self, image: &str, version: &str) -> anyhow::Result<bool> {
    let reference = Self::image_ref(image, version);
    match self.docker.inspect_image(&reference).await {
      Ok(_) => Ok(true),
      Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => Ok(false),
      Err(e) => Err(e.into()),
    }
  }

  async fn ensure_network(&self, network_name: &str) -> anyhow::Result<()> {
    let existing = self
      .docker
      .list_networks(Some(ListNetworksOptions {
        filters: Some(HashMap::from([("name".to_string(), vec![network_name.to_string()])])),
      }))
      .await?;
    if existing.iter().any(|n| n.name.as_deref() == Some(network_name)) {
      return Ok(());
    }
    self
      .docker
      .create_network(CreateNetworkOptions {
        name: network_name.to_string(),
        ..Default::default()
      })
      .await?;
    Ok(())
  }

  async fn remove_network_if_empty(&self, network_name: &str) -> anyhow::Result<()> {
    match self.docker.remove_network(network_name).await {
      Ok(_) => Ok(()),
      Err(_) => Ok(()), // non-empty or already gone: not fatal (idempotent removal)
    }
  }

  async fn remove_container_if_exists(&self, container_name: &str) -> anyhow::Result<()> {
    let options = RemoveContainerOptions { force: true, ..Default::default() };
    match self.docker.remove_container(container_name, Some(options)).await {
      Ok(_) => Ok(()),
      Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => Ok(()),
      Err(e) => Err(e.into()),
    }
  }

  async fn create_and_start_container(
    &self,
    step: &Step,
    network_name: &str,
    labels: HashMap<String, String>,
  ) -> anyhow::Result<ContainerHandle> {
    self.remove_container_if_exists(&step.container_name).await?;

    let env: Vec<String> = step.env_vars.iter().map(|(k, v)| format!("{k}={v}")).collect();
    let port_bindings: HashMap<String, Option<Vec<PortBinding>>> = step
      .ports
      .iter()
      .filter_map(|p| p.split_once(':'))
      .map(|(host, container)| {
        (
          format!("{container}/tcp"),
          Some(vec![PortBinding { host_ip: None, host_port: Some(host.to_string()) }]),
        )
      })
      .collect();
    let binds: Vec<String> =
      step.volumes.iter().map(|(host, container)| format!("{host}:{container}")).collect();

    let body = ContainerCreateBody {
      image: Some(BollardRuntime::image_ref(&step.image, &step.version)),
      env: Some(env),
      labels: Some(labels),
      host_config: Some(HostConfig {
        port_bindings: Some(port_bindings),
        binds: Some(binds),
        network_mode: Some(network_name.to_string()),
        ..Default::default()
      }),
      ..Default::default()
    };

    let options =
      CreateContainerOptions { name: Some(step.container_name.clone()), ..Default::default() };
    let created = self.docker.create_container(Some(options), body).await?;
    self
      .docker
      .start_container(&created.id, Option::<StartContainerOptions>::None)
      .await?;

    Ok(ContainerHandle {
      id: created.id,
      name: step.container_name.clone(),
      context_name: step.context_name.clone(),
    })
  }

  async fn wait_for_exit(&self, container_id: &str) -> anyhow::Result<i64> {
    let mut stream = self.docker.wait_container(container_id, Option::<WaitContainerOptions>::None);
    match stream.next().await {
      Some(Ok(response)) => Ok(response.status_code),
      Some(Err(e)) => Err(e.into()),
      None => anyhow::bail!("container '{container_id}' wait stream ended with no response"),
    }
  }

  async fn list_stack_containers(&self, stack_name: &str) -> anyhow::Result<Vec<ContainerHandle>> {
    let containers = self
      .docker
      .list_containers(Some(ListContainersOptions {
        all: true,
        filters: Some(HashMap::from([(
          "label".to_string(),
          vec![format!("rsgo.stack={stack_name}")],
        )])),
        ..Default::default()
      }))
      .await?;

    Ok(
      containers
        .into_iter()
        .map(|c| ContainerHandle {
          id: c.id.unwrap_or_default(),
          name: c.names.and_then(|mut n| n.pop()).unwrap_or_default().replace('/', ""),
          context_name: c
            .labels
            .as_ref()
            .and_then(|l| l.get("rsgo.context"))
            .cloned()
            .unwrap_or_default(),
        })
        .collect(),
    )
  }

  async fn remove_container(&self, container_id: &str) -> anyhow::Result<()> {
    let options = RemoveContainerOptions { force: true, ..Default::default() };
    match self.docker.remove_container(container_id, Some(options)).await {
      Ok(_) => Ok(()),
      Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => Ok(()),
      Err(e) => Err(e.into()),
    }
  }
}
