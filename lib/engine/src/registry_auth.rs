use registry::RegistryStore;
use rsgo_client::entities::registry::RegistryEntry;

use crate::runtime::RegistryAuth;

/// Resolves an image reference to credentials: a stored registry match
/// first (section 4.2), falling back to the host's local `config.json`
/// when no stored registry covers it.
pub fn resolve_credentials(
  store: &RegistryStore,
  org_id: &str,
  image_ref: &str,
) -> Option<RegistryAuth> {
  if let Some(entry) = store.find_matching(org_id, image_ref) {
    return Some(from_entry(entry));
  }

  let host = registry_host(image_ref)?;
  registry::file_fallback_credentials(&host)
    .map(|c| RegistryAuth { username: c.username, password: c.password })
}

fn from_entry(entry: &RegistryEntry) -> RegistryAuth {
  RegistryAuth { username: entry.username.clone(), password: entry.password.clone() }
}

fn registry_host(image_ref: &str) -> Option<String> {
  naming::parse_image_ref(image_ref).registry
}

#[cfg(test)]
mod tests {
  use super::*;
  use uuid::Uuid;

  fn registry_entry(org: &str, patterns: &[&str], user: &str) -> RegistryEntry {
    RegistryEntry {
      id: Uuid::new_v4(),
      organization_id: org.to_string(),
      name: "r".to_string(),
      url: "https://example.com".to_string(),
      username: Some(user.to_string()),
      password: Some("secret".to_string()),
      image_patterns: patterns.iter().map(|s| s.to_string()).collect(),
      is_default: false,
    }
  }

  #[test]
  fn uses_stored_registry_when_pattern_matches() {
    let mut store = RegistryStore::new();
    store.upsert(registry_entry("org", &["myregistry.com/*"], "alice"));

    let creds = resolve_credentials(&store, "org", "myregistry.com/api:1.0").unwrap();
    assert_eq!(creds.username.as_deref(), Some("alice"));
  }

  #[test]
  fn returns_none_when_nothing_matches_and_no_local_fallback() {
    let store = RegistryStore::new();
    assert!(resolve_credentials(&store, "org", "docker.io/library/nginx:1.27").is_none());
  }
}
