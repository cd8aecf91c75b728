//! Compiles a resolved manifest stack plus a resolved variable map into
//! an ordered [`DeploymentPlan`] (section 4.5).

use std::collections::{HashMap, HashSet};

use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use naming::container_name;
use rsgo_client::entities::{
  manifest::ServiceTemplate,
  plan::{DeploymentPlan, Lifecycle, Step},
};
use variables::interpolate_plan;

/// Builds an unresolved plan (pre-interpolation) from the stack's
/// services in declaration order, then performs a stable topological
/// sort on `depends_on` to assign `order`, then interpolates every
/// string field against `values`.
pub fn plan_stack(
  stack_name: &str,
  stack_version: &str,
  services: &IndexMap<String, ServiceTemplate>,
  values: &HashMap<String, String>,
) -> Result<DeploymentPlan> {
  let order = topological_order(services)?;

  let mut steps = Vec::with_capacity(services.len());
  for (rank, service_name) in order.iter().enumerate() {
    let svc = &services[service_name];
    let container = container_name(stack_name, service_name);
    let volumes: HashMap<String, String> = svc
      .volumes
      .iter()
      .map(|v| match v.split_once(':') {
        Some((host, container_path)) => (host.to_string(), container_path.to_string()),
        None => (v.clone(), v.clone()),
      })
      .collect();

    steps.push(Step {
      context_name: service_name.clone(),
      image: svc.image.clone(),
      version: svc.version.clone().unwrap_or_else(|| "latest".to_string()),
      container_name: container,
      env_vars: svc.environment.clone(),
      ports: svc.ports.clone(),
      volumes,
      networks: svc.networks.clone(),
      depends_on: svc.depends_on.clone(),
      order: rank as u32,
      lifecycle: if svc.init { Lifecycle::Init } else { Lifecycle::Service },
    });
  }

  let mut plan = DeploymentPlan {
    stack_name: stack_name.to_string(),
    stack_version: stack_version.to_string(),
    environment_id: None,
    steps,
  };

  interpolate_plan(&mut plan, values).context("variable interpolation failed")?;

  Ok(plan)
}

/// Stable topological sort over `depends_on`, tie-breaking on
/// declaration order. Kahn's algorithm with a declaration-order-indexed
/// ready queue gives a deterministic, stable result.
fn topological_order(services: &IndexMap<String, ServiceTemplate>) -> Result<Vec<String>> {
  let index_of: HashMap<&str, usize> =
    services.keys().enumerate().map(|(i, k)| (k.as_str(), i)).collect();

  let mut in_degree: HashMap<&str, usize> = services.keys().map(|k| (k.as_str(), 0)).collect();
  let mut dependents: HashMap<&str, Vec<&str>> = services.keys().map(|k| (k.as_str(), Vec::new())).collect();

  for (name, svc) in services {
    for dep in &svc.depends_on {
      if !services.contains_key(dep) {
        bail!("service '{name}' depends_on unknown service '{dep}'");
      }
      *in_degree.get_mut(name.as_str()).unwrap() += 1;
      dependents.get_mut(dep.as_str()).unwrap().push(name.as_str());
    }
  }

  let mut ready: Vec<&str> =
    services.keys().map(String::as_str).filter(|k| in_degree[k] == 0).collect();
  ready.sort_by_key(|k| index_of[k]);

  let mut result = Vec::with_capacity(services.len());
  while !ready.is_empty() {
    ready.sort_by_key(|k| index_of[k]);
    let current = ready.remove(0);
    result.push(current.to_string());
    for &dependent in &dependents[current] {
      let degree = in_degree.get_mut(dependent).unwrap();
      *degree -= 1;
      if *degree == 0 {
        ready.push(dependent);
      }
    }
  }

  if result.len() != services.len() {
    bail!("dependency cycle detected among services");
  }

  Ok(result)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn svc(image: &str, depends_on: &[&str]) -> ServiceTemplate {
    ServiceTemplate {
      image: image.to_string(),
      version: Some("1.0".to_string()),
      environment: HashMap::new(),
      ports: Vec::new(),
      volumes: Vec::new(),
      networks: Vec::new(),
      depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
      init: false,
    }
  }

  #[test]
  fn orders_by_dependency_then_declaration() {
    let mut services = IndexMap::new();
    services.insert("api".to_string(), svc("myapp/api", &["db"]));
    services.insert("db".to_string(), svc("postgres", &[]));

    let order = topological_order(&services).unwrap();
    assert_eq!(order, vec!["db".to_string(), "api".to_string()]);
  }

  #[test]
  fn container_names_satisfy_invariant() {
    let mut services = IndexMap::new();
    services.insert("web app!".to_string(), svc("nginx", &[]));
    let plan = plan_stack("my stack", "1.0.0", &services, &HashMap::new()).unwrap();
    let re_ok = |s: &str| {
      let mut c = s.chars();
      c.next().is_some_and(|c| c.is_ascii_alphanumeric())
        && c.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-')
    };
    assert!(re_ok(&plan.steps[0].container_name));
  }

  #[test]
  fn detects_dependency_cycle() {
    let mut services = IndexMap::new();
    services.insert("a".to_string(), svc("x", &["b"]));
    services.insert("b".to_string(), svc("y", &["a"]));
    assert!(topological_order(&services).is_err());
  }

  #[test]
  fn flags_init_lifecycle() {
    let mut services = IndexMap::new();
    let mut migrate = svc("migrate", &[]);
    migrate.init = true;
    services.insert("migrate".to_string(), migrate);
    let plan = plan_stack("s", "1.0.0", &services, &HashMap::new()).unwrap();
    assert_eq!(plan.steps[0].lifecycle, rsgo_client::entities::plan::Lifecycle::Init);
  }
}
