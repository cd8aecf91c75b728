use std::collections::{HashMap, HashSet};

use anyhow::{bail, Result};
use rsgo_client::entities::plan::{DeploymentPlan, Step};

/// Substitutes `${VAR}` and `${VAR:-default}` occurrences in `input`
/// using `values`. Unresolved required references are reported by the
/// caller via [`missing_required`]; this function itself never errors —
/// an unmatched `${VAR}` with no default and no value is left verbatim
/// so the caller can detect and report it precisely.
pub fn substitute(input: &str, values: &HashMap<String, String>) -> String {
  let mut out = String::with_capacity(input.len());
  let bytes = input.as_bytes();
  let mut i = 0;
  while i < bytes.len() {
    if bytes[i] == b'$' && i + 1 < bytes.len() && bytes[i + 1] == b'{' {
      if let Some(end) = find_matching_brace(input, i + 1) {
        let inner = &input[i + 2..end];
        out.push_str(&resolve_reference(inner, values));
        i = end + 1;
        continue;
      }
    }
    let ch = input[i..].chars().next().expect("i is a char boundary within input");
    out.push(ch);
    i += ch.len_utf8();
  }
  out
}

fn find_matching_brace(s: &str, open_idx: usize) -> Option<usize> {
  s[open_idx..].find('}').map(|off| open_idx + off)
}

fn resolve_reference(inner: &str, values: &HashMap<String, String>) -> String {
  match inner.split_once(":-") {
    Some((name, default)) => values.get(name).cloned().unwrap_or_else(|| default.to_string()),
    None => values.get(inner).cloned().unwrap_or_else(|| format!("${{{inner}}}")),
  }
}

/// Scans `input` for `${VAR}` references (no default) whose name is not
/// in `values`, appending them to `missing`.
pub fn collect_missing_required(input: &str, values: &HashMap<String, String>, missing: &mut HashSet<String>) {
  let mut i = 0;
  let bytes = input.as_bytes();
  while i < bytes.len() {
    if bytes[i] == b'$' && i + 1 < bytes.len() && bytes[i + 1] == b'{' {
      if let Some(end) = find_matching_brace(input, i + 1) {
        let inner = &input[i + 2..end];
        if !inner.contains(":-") && !values.contains_key(inner) {
          missing.insert(inner.to_string());
        }
        i = end + 1;
        continue;
      }
    }
    i += 1;
  }
}

/// Performs `${VAR}` / `${VAR:-default}` substitution over every string
/// field of every step in a plan (section 4.4). Missing required
/// variables (no default, no resolved value) are collected into one
/// `ValidationError`-flavored message listing every missing name.
pub fn interpolate_plan(plan: &mut DeploymentPlan, values: &HashMap<String, String>) -> Result<()> {
  let mut missing = HashSet::new();
  for step in &plan.steps {
    collect_step_missing(step, values, &mut missing);
  }
  if !missing.is_empty() {
    let mut names: Vec<_> = missing.into_iter().collect();
    names.sort();
    bail!("missing required variables: {}", names.join(", "));
  }

  for step in &mut plan.steps {
    step.image = substitute(&step.image, values);
    step.version = substitute(&step.version, values);
    step.container_name = substitute(&step.container_name, values);
    for value in step.env_vars.values_mut() {
      *value = substitute(value, values);
    }
    for port in &mut step.ports {
      *port = substitute(port, values);
    }
    for (_, volume) in step.volumes.iter_mut() {
      *volume = substitute(volume, values);
    }
    for network in &mut step.networks {
      *network = substitute(network, values);
    }
  }
  Ok(())
}

fn collect_step_missing(step: &Step, values: &HashMap<String, String>, missing: &mut HashSet<String>) {
  collect_missing_required(&step.image, values, missing);
  collect_missing_required(&step.version, values, missing);
  collect_missing_required(&step.container_name, values, missing);
  for value in step.env_vars.values() {
    collect_missing_required(value, values, missing);
  }
  for port in &step.ports {
    collect_missing_required(port, values, missing);
  }
  for volume in step.volumes.values() {
    collect_missing_required(volume, values, missing);
  }
  for network in &step.networks {
    collect_missing_required(network, values, missing);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn vals(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
  }

  #[test]
  fn substitutes_plain_variable() {
    let values = vals(&[("TAG", "1.2")]);
    assert_eq!(substitute("myapp:${TAG}", &values), "myapp:1.2");
  }

  #[test]
  fn substitutes_default_when_missing() {
    let values = vals(&[]);
    assert_eq!(substitute("myapp:${TAG:-latest}", &values), "myapp:latest");
  }

  #[test]
  fn default_ignored_when_value_present() {
    let values = vals(&[("TAG", "1.2")]);
    assert_eq!(substitute("myapp:${TAG:-latest}", &values), "myapp:1.2");
  }

  #[test]
  fn substitution_is_idempotent_once_fully_defined() {
    let values = vals(&[("TAG", "1.2"), ("HOST", "db")]);
    let input = "${HOST}:${TAG}";
    let once = substitute(input, &values);
    let twice = substitute(&once, &values);
    assert_eq!(once, twice);
  }

  #[test]
  fn preserves_multibyte_literal_text() {
    let values = vals(&[("TAG", "1.2")]);
    assert_eq!(substitute("café:${TAG}", &values), "café:1.2");
  }

  #[test]
  fn detects_missing_required_reference() {
    let values = vals(&[]);
    let mut missing = HashSet::new();
    collect_missing_required("${FOO}/${BAR:-x}", &values, &mut missing);
    assert_eq!(missing, HashSet::from(["FOO".to_string()]));
  }
}
