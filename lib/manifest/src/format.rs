#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
  /// Native ReadyStackGo manifest shape (`variables:`, `stacks:`, typed
  /// `metadata`).
  Native,
  /// A plain Docker Compose file.
  Compose,
}

/// If a top-level `variables:` or a `metadata.productVersion` is
/// present, the manifest is native; otherwise Compose (section 4.3).
pub fn detect_format(yaml: &str) -> Format {
  let Ok(value) = serde_yaml_ng::from_str::<serde_yaml_ng::Value>(yaml) else {
    return Format::Compose;
  };
  let Some(map) = value.as_mapping() else {
    return Format::Compose;
  };

  let has_variables = map.get("variables").is_some();
  let has_product_version = map
    .get("metadata")
    .and_then(|m| m.as_mapping())
    .map(|m| m.get("productVersion").is_some() || m.get("product_version").is_some())
    .unwrap_or(false);

  if has_variables || has_product_version {
    Format::Native
  } else {
    Format::Compose
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn detects_native_by_variables() {
    let yaml = "variables:\n  FOO:\n    label: Foo\nservices:\n  web:\n    image: nginx\n";
    assert_eq!(detect_format(yaml), Format::Native);
  }

  #[test]
  fn detects_native_by_product_version() {
    let yaml = "metadata:\n  name: x\n  productVersion: 1.0.0\nservices:\n  web:\n    image: nginx\n";
    assert_eq!(detect_format(yaml), Format::Native);
  }

  #[test]
  fn detects_compose_by_absence() {
    let yaml = "services:\n  web:\n    image: nginx\n    ports:\n      - \"80:80\"\n";
    assert_eq!(detect_format(yaml), Format::Compose);
  }
}
