//! The `config.json` shape emitted by standard container tooling
//! (section 6, "Registry file fallback format").

use std::collections::HashMap;

use base64::Engine;
use rsgo_client::entities::registry::RegistryCredentials;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DockerConfig {
  #[serde(default)]
  pub auths: HashMap<String, DockerAuthEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DockerAuthEntry {
  #[serde(default)]
  pub auth: Option<String>,
  #[serde(default)]
  pub username: Option<String>,
  #[serde(default)]
  pub password: Option<String>,
}

impl DockerConfig {
  pub fn credentials_for(&self, registry_host: &str) -> Option<RegistryCredentials> {
    let entry = self.auths.get(registry_host)?;

    if let (Some(u), Some(p)) = (&entry.username, &entry.password) {
      return Some(RegistryCredentials { username: Some(u.clone()), password: Some(p.clone()) });
    }

    let auth = entry.auth.as_ref()?;
    let decoded = base64::engine::general_purpose::STANDARD.decode(auth).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some(RegistryCredentials { username: Some(user.to_string()), password: Some(pass.to_string()) })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn decodes_base64_auth() {
    let auth = base64::engine::general_purpose::STANDARD.encode("user:pass");
    let cfg = DockerConfig {
      auths: HashMap::from([(
        "registry.example.com".to_string(),
        DockerAuthEntry { auth: Some(auth), username: None, password: None },
      )]),
    };
    let creds = cfg.credentials_for("registry.example.com").unwrap();
    assert_eq!(creds.username.as_deref(), Some("user"));
    assert_eq!(creds.password.as_deref(), Some("pass"));
  }

  #[test]
  fn prefers_explicit_username_password() {
    let cfg = DockerConfig {
      auths: HashMap::from([(
        "registry.example.com".to_string(),
        DockerAuthEntry {
          auth: None,
          username: Some("u".into()),
          password: Some("p".into()),
        },
      )]),
    };
    let creds = cfg.credentials_for("registry.example.com").unwrap();
    assert_eq!(creds.username.as_deref(), Some("u"));
  }
}
