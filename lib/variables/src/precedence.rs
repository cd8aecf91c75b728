use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use rsgo_client::entities::manifest::VarDecl;

/// `extractStackVariables` (section 4.4): the union of shared and
/// stack-scope declarations. On name collision the stack's declaration
/// wins.
pub fn extract_stack_variables<'a>(
  shared: &'a IndexMap<String, VarDecl>,
  stack: &'a IndexMap<String, VarDecl>,
) -> IndexMap<String, &'a VarDecl> {
  let mut out: IndexMap<String, &VarDecl> = shared.iter().map(|(k, v)| (k.clone(), v)).collect();
  for (k, v) in stack {
    out.insert(k.clone(), v);
  }
  out
}

/// The four-tier precedence (lowest to highest), applied uniformly by
/// deploy and upgrade (section 4.4 / 4.9, "variable-merge invariant"):
///
/// 1. Declared default (stack-scope, else shared)
/// 2. Existing value from the predecessor deployment (upgrade only)
/// 3. Shared variable value supplied by the caller
/// 4. Per-stack variable value supplied by the caller
///
/// A pure function: the same four maps always produce the same result,
/// and every call site (deploy, upgrade) must use it unchanged.
pub fn merge(
  declared_defaults: &HashMap<String, String>,
  existing: Option<&HashMap<String, String>>,
  shared: &HashMap<String, String>,
  per_stack: &HashMap<String, String>,
) -> HashMap<String, String> {
  let mut keys: HashSet<&str> = HashSet::new();
  keys.extend(declared_defaults.keys().map(String::as_str));
  if let Some(existing) = existing {
    keys.extend(existing.keys().map(String::as_str));
  }
  keys.extend(shared.keys().map(String::as_str));
  keys.extend(per_stack.keys().map(String::as_str));

  let mut out = HashMap::with_capacity(keys.len());
  for key in keys {
    let mut value = declared_defaults.get(key).cloned();
    if let Some(existing) = existing {
      if let Some(v) = existing.get(key) {
        value = Some(v.clone());
      }
    }
    if let Some(v) = shared.get(key) {
      value = Some(v.clone());
    }
    if let Some(v) = per_stack.get(key) {
      value = Some(v.clone());
    }
    if let Some(value) = value {
      out.insert(key.to_string(), value);
    }
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
  }

  #[test]
  fn per_stack_wins_over_everything() {
    let declared = map(&[("SHARED", "default")]);
    let existing = map(&[("SHARED", "existing")]);
    let shared = map(&[("SHARED", "shared")]);
    let per_stack = map(&[("SHARED", "per-stack")]);

    let result = merge(&declared, Some(&existing), &shared, &per_stack);
    assert_eq!(result["SHARED"], "per-stack");
  }

  #[test]
  fn removing_per_stack_falls_to_shared() {
    let declared = map(&[("SHARED", "default")]);
    let existing = map(&[("SHARED", "existing")]);
    let shared = map(&[("SHARED", "shared")]);
    let per_stack = HashMap::new();

    let result = merge(&declared, Some(&existing), &shared, &per_stack);
    assert_eq!(result["SHARED"], "shared");
  }

  #[test]
  fn removing_shared_too_falls_to_existing_on_upgrade() {
    let declared = map(&[("SHARED", "default")]);
    let existing = map(&[("SHARED", "existing")]);

    let result = merge(&declared, Some(&existing), &HashMap::new(), &HashMap::new());
    assert_eq!(result["SHARED"], "existing");
  }

  #[test]
  fn no_existing_on_deploy_falls_to_default() {
    let declared = map(&[("SHARED", "default")]);
    let result = merge(&declared, None, &HashMap::new(), &HashMap::new());
    assert_eq!(result["SHARED"], "default");
  }

  #[test]
  fn deploy_per_stack_still_wins_without_existing() {
    let declared = map(&[("SHARED", "default")]);
    let shared = map(&[("SHARED", "shared")]);
    let per_stack = map(&[("SHARED", "per-stack")]);
    let result = merge(&declared, None, &shared, &per_stack);
    assert_eq!(result["SHARED"], "per-stack");
  }
}
