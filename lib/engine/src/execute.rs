use std::collections::HashMap;

use rsgo_client::entities::{
  notify::{EnginePhase, ProgressUpdate},
  plan::{DeploymentPlan, Lifecycle},
  Id,
};
use tokio_util::sync::CancellationToken;

use crate::{
  progress::ProgressReporter,
  runtime::{ContainerRuntime, RegistryAuth},
};

#[derive(Debug, Clone, Default)]
pub struct EngineResult {
  pub success: bool,
  pub deployed_contexts: Vec<String>,
  pub warnings: Vec<String>,
  pub errors: Vec<String>,
}

/// Executes one plan on one environment in two phases (section 4.6):
/// pull every image first, then start every container. A pull failure
/// with no local fallback aborts before any container is created.
pub async fn execute(
  runtime: &dyn ContainerRuntime,
  plan: &DeploymentPlan,
  deployment_id: Option<Id>,
  credentials_for: &dyn Fn(&str) -> Option<RegistryAuth>,
  progress: Option<Box<dyn Fn(ProgressUpdate) + Send + Sync>>,
  cancel: &CancellationToken,
) -> EngineResult {
  let mut result = EngineResult { success: true, ..Default::default() };

  let total_services = plan.steps.len() as u32;
  let total_init = plan.steps.iter().filter(|s| s.lifecycle == Lifecycle::Init).count() as u32;
  let session_id = format!("deploy-{}-{}", plan.stack_name, plan.stack_version);
  let reporter = ProgressReporter::new(session_id, total_services, total_init, progress);

  reporter.report(EnginePhase::Resolving, "Resolving deployment plan", None, 0, 0, 1, 1);

  // Phase A: pull every image before starting anything.
  for (i, step) in plan.steps.iter().enumerate() {
    if cancel.is_cancelled() {
      result.success = false;
      result.errors.push("deployment cancelled during image pull".to_string());
      return result;
    }

    let image_ref = format!("{}:{}", step.image, step.version);
    reporter.report(
      EnginePhase::PullingImages,
      format!("Pulling {image_ref}"),
      Some(step.context_name.clone()),
      i as u32,
      0,
      i as u32,
      total_services,
    );

    let credentials = credentials_for(&image_ref);
    match runtime.pull_image(&step.image, &step.version, credentials.as_ref()).await {
      Ok(()) => {}
      Err(cause) => match runtime.image_exists(&step.image, &step.version).await {
        Ok(true) => {
          result.warnings.push(format!(
            "{image_ref} could not be pulled; using existing local image ({cause})"
          ));
        }
        _ => {
          let hint = if is_auth_failure(&cause) { " (registry credentials are configured)" } else { "" };
          result.errors.push(format!(
            "Failed to pull image '{image_ref}' and no local copy exists: {cause}{hint}"
          ));
          result.success = false;
          return result;
        }
      },
    }
  }

  reporter.report(
    EnginePhase::PullingImages,
    "All images resolved",
    None,
    total_services,
    0,
    total_services,
    total_services,
  );

  if cancel.is_cancelled() {
    result.success = false;
    result.errors.push("deployment cancelled before container phase".to_string());
    return result;
  }

  // Phase B: start containers in topological order.
  let network_name = naming::network_name(&plan.stack_name);
  if let Err(e) = runtime.ensure_network(&network_name).await {
    result.errors.push(format!("failed to ensure network '{network_name}': {e}"));
    result.success = false;
    return result;
  }

  let mut completed_init = 0u32;
  for (i, step) in plan.steps.iter().enumerate() {
    if cancel.is_cancelled() {
      result.success = false;
      result.errors.push(format!("deployment cancelled; reason=cancelled"));
      return result;
    }

    let phase = if step.lifecycle == Lifecycle::Init && total_init > 0 {
      EnginePhase::InitializingContainers
    } else {
      EnginePhase::StartingServices
    };
    reporter.report(
      phase,
      format!("Starting {}", step.context_name),
      Some(step.context_name.clone()),
      i as u32,
      completed_init,
      i as u32,
      total_services,
    );

    let labels = build_labels(&plan.stack_name, &step.context_name, deployment_id);
    let handle = match runtime.create_and_start_container(step, &network_name, labels).await {
      Ok(h) => h,
      Err(e) => {
        result.errors.push(format!("container runtime error for '{}': {e}", step.context_name));
        result.success = false;
        continue;
      }
    };

    if step.lifecycle == Lifecycle::Init {
      match runtime.wait_for_exit(&handle.id).await {
        Ok(0) => {
          completed_init += 1;
          result.deployed_contexts.push(step.context_name.clone());
        }
        Ok(code) => {
          result.errors.push(format!(
            "init container '{}' exited with non-zero status {code}",
            step.context_name
          ));
          result.success = false;
        }
        Err(e) => {
          result.errors.push(format!("failed waiting for init container '{}': {e}", step.context_name));
          result.success = false;
        }
      }
    } else {
      result.deployed_contexts.push(step.context_name.clone());
    }
  }

  reporter.report(
    EnginePhase::StartingServices,
    "Deployment complete",
    None,
    total_services,
    completed_init,
    total_services,
    total_services,
  );

  result
}

fn build_labels(stack_name: &str, context_name: &str, deployment_id: Option<Id>) -> HashMap<String, String> {
  let mut labels = HashMap::from([
    ("rsgo.stack".to_string(), stack_name.to_string()),
    ("rsgo.context".to_string(), context_name.to_string()),
    ("rsgo.service".to_string(), context_name.to_string()),
  ]);
  if let Some(id) = deployment_id {
    labels.insert("rsgo.deployment".to_string(), id.to_string());
  }
  labels
}

fn is_auth_failure(cause: &anyhow::Error) -> bool {
  let msg = format!("{cause:#}").to_lowercase();
  msg.contains("unauthorized") || msg.contains("authentication") || msg.contains("denied")
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testutil::MockRuntime;
  use rsgo_client::entities::plan::Step;

  fn step(name: &str, image: &str, lifecycle: Lifecycle, depends_on: &[&str]) -> Step {
    Step {
      context_name: name.to_string(),
      image: image.to_string(),
      version: "1.0".to_string(),
      container_name: format!("teststack_{name}"),
      env_vars: HashMap::new(),
      ports: Vec::new(),
      volumes: HashMap::new(),
      networks: Vec::new(),
      depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
      order: 0,
      lifecycle,
    }
  }

  fn plan(steps: Vec<Step>) -> DeploymentPlan {
    DeploymentPlan {
      stack_name: "teststack".to_string(),
      stack_version: "1.0.0".to_string(),
      environment_id: None,
      steps,
    }
  }

  #[tokio::test]
  async fn happy_path_deploys_all_steps_in_order() {
    let runtime = MockRuntime::default();
    let plan = plan(vec![
      step("db", "postgres", Lifecycle::Service, &[]),
      step("api", "myapp/api", Lifecycle::Service, &["db"]),
    ]);

    let result = execute(&runtime, &plan, None, &|_| None, None, &CancellationToken::new()).await;

    assert!(result.success);
    assert_eq!(result.deployed_contexts, vec!["db".to_string(), "api".to_string()]);
    assert_eq!(runtime.created_containers(), vec!["teststack_db", "teststack_api"]);
  }

  #[tokio::test]
  async fn pull_failure_with_local_image_warns_and_continues() {
    let runtime = MockRuntime::default();
    runtime.fail_pull("myregistry.com/api");
    runtime.mark_local_image_present("myregistry.com/api", "1.0");

    let plan = plan(vec![step("api", "myregistry.com/api", Lifecycle::Service, &[])]);
    let result = execute(&runtime, &plan, None, &|_| None, None, &CancellationToken::new()).await;

    assert!(result.success);
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("myregistry.com/api:1.0"));
    assert!(result.warnings[0].contains("using existing local image"));
    assert_eq!(runtime.created_containers(), vec!["teststack_api"]);
  }

  #[tokio::test]
  async fn pull_failure_without_local_image_aborts_before_any_container() {
    let runtime = MockRuntime::default();
    runtime.fail_pull("first/image");

    let plan = plan(vec![
      step("first", "first/image", Lifecycle::Service, &[]),
      step("second", "second/image", Lifecycle::Service, &[]),
    ]);
    let result = execute(&runtime, &plan, None, &|_| None, None, &CancellationToken::new()).await;

    assert!(!result.success);
    assert!(result.errors.iter().any(|e| e.contains("Failed to pull image")));
    assert!(runtime.created_containers().is_empty());
  }

  #[tokio::test]
  async fn init_container_nonzero_exit_fails_deployment() {
    let runtime = MockRuntime::default();
    runtime.set_exit_code("teststack_migrate", 1);
    let plan = plan(vec![step("migrate", "migrate/image", Lifecycle::Init, &[])]);

    let result = execute(&runtime, &plan, None, &|_| None, None, &CancellationToken::new()).await;

    assert!(!result.success);
    assert!(result.errors.iter().any(|e| e.contains("non-zero status 1")));
  }

  #[tokio::test]
  async fn cancellation_before_pull_prevents_any_container_creation() {
    let runtime = MockRuntime::default();
    let plan = plan(vec![step("api", "myapp/api", Lifecycle::Service, &[])]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = execute(&runtime, &plan, None, &|_| None, None, &cancel).await;

    assert!(!result.success);
    assert!(runtime.created_containers().is_empty());
  }
}
