use crate::runtime::ContainerRuntime;

#[derive(Debug, Clone, Default)]
pub struct RemoveResult {
  pub removed_containers: Vec<String>,
  pub errors: Vec<String>,
}

/// Removes every container labeled with `stack_name`, in reverse creation
/// order, then the stack's network if it is left empty. Re-running this
/// against a stack with nothing left is a no-op, not an error.
pub async fn remove_stack(runtime: &dyn ContainerRuntime, stack_name: &str) -> RemoveResult {
  let mut result = RemoveResult::default();

  let containers = match runtime.list_stack_containers(stack_name).await {
    Ok(c) => c,
    Err(e) => {
      result.errors.push(format!("failed to list containers for stack '{stack_name}': {e}"));
      return result;
    }
  };

  for handle in containers.into_iter().rev() {
    match runtime.remove_container(&handle.id).await {
      Ok(()) => result.removed_containers.push(handle.name),
      Err(e) => result.errors.push(format!("failed to remove container '{}': {e}", handle.name)),
    }
  }

  let network_name = naming::network_name(stack_name);
  if let Err(e) = runtime.remove_network_if_empty(&network_name).await {
    result.errors.push(format!("failed to remove network '{network_name}': {e}"));
  }

  result
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testutil::MockRuntime;

  #[tokio::test]
  async fn removes_containers_in_reverse_order() {
    let runtime = MockRuntime::default();
    runtime.seed_stack_container("teststack", "db", "cid-db");
    runtime.seed_stack_container("teststack", "api", "cid-api");

    let result = remove_stack(&runtime, "teststack").await;

    assert!(result.errors.is_empty());
    assert_eq!(result.removed_containers, vec!["api".to_string(), "db".to_string()]);
  }

  #[tokio::test]
  async fn removing_empty_stack_is_a_noop() {
    let runtime = MockRuntime::default();
    let result = remove_stack(&runtime, "ghoststack").await;

    assert!(result.errors.is_empty());
    assert!(result.removed_containers.is_empty());
  }

  #[tokio::test]
  async fn removal_is_idempotent() {
    let runtime = MockRuntime::default();
    runtime.seed_stack_container("teststack", "db", "cid-db");

    let first = remove_stack(&runtime, "teststack").await;
    let second = remove_stack(&runtime, "teststack").await;

    assert_eq!(first.removed_containers, vec!["db".to_string()]);
    assert!(second.removed_containers.is_empty());
    assert!(second.errors.is_empty());
  }
}
