use std::{collections::HashMap, path::PathBuf};

use anyhow::Context;
use rsgo_client::entities::logger::{LogConfig, LogLevel, StdioLogMode};
use serde::{Deserialize, Serialize};

use crate::ConfigLoader;

/// The full configuration surface for `rsgo-core` and `rsgo-cli`,
/// merged from static config files (via [`ConfigLoader`]) and then
/// overridden by environment variables (see [`load_config`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  pub data_dir: PathBuf,
  pub docker_host: Option<String>,
  /// Username/password offered to [`registry::file_fallback_credentials`]
  /// style callers when no organization registry matches an image.
  pub default_registry_username: Option<String>,
  pub default_registry_password: Option<String>,
  /// Flat `{name: bool}` map (spec section 6); exposed to deployed
  /// containers as `RSGO_FEATURE_<NAME>`.
  pub feature_flags: HashMap<String, bool>,
  pub logging: LogConfig,
}

impl Default for Config {
  fn default() -> Self {
    Config {
      data_dir: PathBuf::from("./data"),
      docker_host: None,
      default_registry_username: None,
      default_registry_password: None,
      feature_flags: HashMap::new(),
      logging: LogConfig::default(),
    }
  }
}

impl Config {
  /// Redacts credential-shaped fields before the config is logged or
  /// printed (spec section 7: "must not log credential fields").
  pub fn sanitized(&self) -> Config {
    Config {
      default_registry_password: self
        .default_registry_password
        .as_ref()
        .map(|_| "<redacted>".to_string()),
      ..self.clone()
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
struct Env {
  #[serde(default)]
  rsgo_config_paths: Vec<PathBuf>,
  #[serde(default)]
  rsgo_config_keywords: Vec<String>,
  #[serde(default = "default_true")]
  rsgo_merge_nested_config: bool,
  #[serde(default)]
  rsgo_extend_config_arrays: bool,
  #[serde(default)]
  rsgo_config_debug: bool,
  rsgo_data_dir: Option<PathBuf>,
  rsgo_docker_host: Option<String>,
  rsgo_log_level: Option<String>,
  rsgo_log_stdio: Option<String>,
  #[serde(default)]
  rsgo_log_pretty: bool,
  rsgo_default_registry_username: Option<String>,
  rsgo_default_registry_password: Option<String>,
}

fn default_true() -> bool {
  true
}

/// Loads [`Config`] the same way `bin/core` and `bin/cli` both need it:
/// an optional [`ConfigLoader`] pass over `RSGO_CONFIG_PATHS`, then
/// environment variable overrides, then `RSGO_FEATURE_<NAME>` flag
/// overrides layered on top of whatever the config files declared.
pub fn load_config() -> anyhow::Result<Config> {
  let env: Env = envy::from_env()
    .context("failed to parse ReadyStackGo environment")?;

  let mut config = if env.rsgo_config_paths.is_empty() {
    Config::default()
  } else {
    let keywords: Vec<&str> =
      env.rsgo_config_keywords.iter().map(String::as_str).collect();
    ConfigLoader {
      paths: &env
        .rsgo_config_paths
        .iter()
        .map(PathBuf::as_path)
        .collect::<Vec<_>>(),
      match_wildcards: &keywords,
      include_file_name: ".rsgoinclude",
      merge_nested: env.rsgo_merge_nested_config,
      extend_array: env.rsgo_extend_config_arrays,
      debug_print: env.rsgo_config_debug,
    }
    .load::<Config>()
    .context("failed to parse config from RSGO_CONFIG_PATHS")?
  };

  if let Some(dir) = env.rsgo_data_dir {
    config.data_dir = dir;
  }
  if env.rsgo_docker_host.is_some() {
    config.docker_host = env.rsgo_docker_host;
  }
  if let Some(level) = env.rsgo_log_level {
    config.logging.level = parse_log_level(&level)?;
  }
  if let Some(stdio) = env.rsgo_log_stdio {
    config.logging.stdio = parse_stdio_mode(&stdio)?;
  }
  if env.rsgo_log_pretty {
    config.logging.pretty = true;
  }
  if env.rsgo_default_registry_username.is_some() {
    config.default_registry_username = env.rsgo_default_registry_username;
  }
  if env.rsgo_default_registry_password.is_some() {
    config.default_registry_password = env.rsgo_default_registry_password;
  }

  apply_feature_flag_overrides(&mut config.feature_flags);

  Ok(config)
}

/// `RSGO_FEATURE_<NAME>=true|false` wins over whatever the config files
/// declared for `<name>` (lowercased).
fn apply_feature_flag_overrides(flags: &mut HashMap<String, bool>) {
  for (key, value) in std::env::vars() {
    let Some(name) = key.strip_prefix("RSGO_FEATURE_") else {
      continue;
    };
    let enabled =
      matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on");
    flags.insert(name.to_lowercase(), enabled);
  }
}

fn parse_log_level(raw: &str) -> anyhow::Result<LogLevel> {
  serde_json::from_value(serde_json::Value::String(raw.to_uppercase()))
    .with_context(|| format!("invalid RSGO_LOG_LEVEL '{raw}'"))
}

fn parse_stdio_mode(raw: &str) -> anyhow::Result<StdioLogMode> {
  serde_json::from_value(serde_json::Value::String(raw.to_lowercase()))
    .with_context(|| format!("invalid RSGO_LOG_STDIO '{raw}'"))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sanitized_redacts_password_but_keeps_username() {
    let mut config = Config::default();
    config.default_registry_username = Some("svc".to_string());
    config.default_registry_password = Some("hunter2".to_string());

    let sanitized = config.sanitized();
    assert_eq!(sanitized.default_registry_username.as_deref(), Some("svc"));
    assert_eq!(sanitized.default_registry_password.as_deref(), Some("<redacted>"));
  }

  #[test]
  fn feature_flag_env_override_is_case_insensitive() {
    let mut flags = HashMap::new();
    flags.insert("maintenance_banner".to_string(), false);
    unsafe {
      std::env::set_var("RSGO_FEATURE_MAINTENANCE_BANNER", "true");
    }
    apply_feature_flag_overrides(&mut flags);
    unsafe {
      std::env::remove_var("RSGO_FEATURE_MAINTENANCE_BANNER");
    }
    assert_eq!(flags.get("maintenance_banner"), Some(&true));
  }
}
