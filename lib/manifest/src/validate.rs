use regex::Regex;
use rsgo_client::entities::manifest::{
  Manifest, StackEntry, ValidationResult, VarDecl, VarType,
};

/// Validates a manifest (ideally after include resolution). Section
/// 4.3's rules:
/// - a stack with neither services nor include is an error
/// - a Select variable with zero options is a warning
/// - an invalid `pattern` regex is an error
/// - a product without `productVersion` is a warning ("fragment")
/// - an inline stack with an empty `image:` on any service is an error
pub fn validate(manifest: &Manifest) -> ValidationResult {
  let mut result = ValidationResult::ok();

  if manifest.metadata.product_version.is_none() {
    result.push_warning(format!(
      "'{}' has no productVersion; it is a fragment and must be included",
      manifest.metadata.name
    ));
  }

  validate_variables(&manifest.variables, &mut result);
  validate_variables(&manifest.shared_variables, &mut result);

  if manifest.stacks.is_empty() {
    validate_services(&manifest.metadata.name, &manifest.services, &mut result);
  } else {
    for (stack_name, entry) in &manifest.stacks {
      match entry {
        StackEntry::Include { .. } => {
          // Unresolved include: nothing more to check until resolved.
        }
        StackEntry::Inline(inline) => {
          if inline.services.is_empty() && inline.services_include.is_empty() {
            result.push_error(format!(
              "stack '{stack_name}' has neither services nor include"
            ));
          }
          validate_variables(&inline.variables, &mut result);
          validate_services(stack_name, &inline.services, &mut result);
        }
      }
    }
  }

  result
}

fn validate_variables(
  vars: &indexmap::IndexMap<String, VarDecl>,
  result: &mut ValidationResult,
) {
  for (name, decl) in vars {
    if decl.var_type == VarType::Select && decl.options.is_empty() {
      result.push_warning(format!("variable '{name}' is type Select but declares no options"));
    }
    if let Some(pattern) = &decl.pattern {
      if Regex::new(pattern).is_err() {
        result.push_error(format!("variable '{name}' has an invalid pattern regex: {pattern}"));
      }
    }
  }
}

fn validate_services(
  stack_name: &str,
  services: &indexmap::IndexMap<String, rsgo_client::entities::manifest::ServiceTemplate>,
  result: &mut ValidationResult,
) {
  for (svc_name, svc) in services {
    if svc.image.is_empty() {
      result.push_error(format!(
        "stack '{stack_name}' service '{svc_name}' has an empty image"
      ));
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::parser::parse_str;

  #[test]
  fn warns_on_missing_product_version() {
    let yaml = "metadata:\n  name: frag\nservices:\n  web:\n    image: nginx\n";
    let manifest = parse_str(yaml).unwrap();
    let result = validate(&manifest);
    assert!(result.is_valid);
    assert!(result.warnings.iter().any(|w| w.contains("fragment")));
  }

  #[test]
  fn errors_on_empty_image() {
    let yaml = "metadata:\n  name: x\n  productVersion: 1.0.0\nservices:\n  web:\n    image: \"\"\n";
    let manifest = parse_str(yaml).unwrap();
    let result = validate(&manifest);
    assert!(!result.is_valid);
    assert!(result.errors.iter().any(|e| e.contains("empty image")));
  }

  #[test]
  fn errors_on_invalid_pattern() {
    let yaml = r#"
metadata:
  name: x
  productVersion: 1.0.0
variables:
  FOO:
    label: Foo
    type: String
    pattern: "("
services:
  web:
    image: nginx
"#;
    let manifest = parse_str(yaml).unwrap();
    let result = validate(&manifest);
    assert!(!result.is_valid);
    assert!(result.errors.iter().any(|e| e.contains("invalid pattern")));
  }

  #[test]
  fn warns_on_select_without_options() {
    let yaml = r#"
metadata:
  name: x
  productVersion: 1.0.0
variables:
  FOO:
    label: Foo
    type: Select
services:
  web:
    image: nginx
"#;
    let manifest = parse_str(yaml).unwrap();
    let result = validate(&manifest);
    assert!(result.warnings.iter().any(|w| w.contains("Select")));
  }
}
