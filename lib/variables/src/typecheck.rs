use std::collections::HashMap;

use regex::Regex;
use rsgo_client::entities::manifest::{VarDecl, VarType};

/// Validates one resolved value against its declaration (section 4.4,
/// "Type validation (on submit)").
pub fn validate_value(decl: &VarDecl, value: &str) -> Result<(), String> {
  match decl.var_type {
    VarType::Port => {
      let port: i64 = value.parse().map_err(|_| format!("'{value}' is not a valid port number"))?;
      if !(1..=65535).contains(&port) {
        return Err(format!("port {port} is out of range 1-65535"));
      }
    }
    VarType::Integer => {
      let n: i64 = value.parse().map_err(|_| format!("'{value}' is not a valid integer"))?;
      if let Some(min) = decl.min {
        if n < min {
          return Err(format!("{n} is less than minimum {min}"));
        }
      }
      if let Some(max) = decl.max {
        if n > max {
          return Err(format!("{n} is greater than maximum {max}"));
        }
      }
    }
    VarType::Boolean => {
      if !matches!(value.to_lowercase().as_str(), "true" | "false") {
        return Err(format!("'{value}' is not a valid boolean"));
      }
    }
    VarType::Select => {
      if !decl.options.iter().any(|o| o.value == value) {
        return Err(format!("'{value}' is not one of the declared options"));
      }
    }
    VarType::String | VarType::EventStoreConnectionString => {
      if let Some(pattern) = &decl.pattern {
        let re = Regex::new(pattern).map_err(|e| format!("invalid pattern '{pattern}': {e}"))?;
        if !re.is_match(value) {
          return Err(decl
            .pattern_error
            .clone()
            .unwrap_or_else(|| format!("'{value}' does not match pattern '{pattern}'")));
        }
      }
    }
    VarType::Password => {
      // Opaque: no format validation.
    }
  }
  Ok(())
}

/// Validates every declared variable's resolved value, collecting
/// per-name errors. Matches section 4.4: `variableErrors[name] = message`.
pub fn validate_all(
  decls: &indexmap::IndexMap<String, &VarDecl>,
  values: &HashMap<String, String>,
) -> HashMap<String, String> {
  let mut errors = HashMap::new();
  for (name, decl) in decls {
    if let Some(value) = values.get(name) {
      if let Err(message) = validate_value(decl, value) {
        errors.insert(name.clone(), message);
      }
    } else if decl.required {
      errors.insert(name.clone(), "required variable has no resolved value".to_string());
    }
  }
  errors
}
