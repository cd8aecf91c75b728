//! Registry storage and image-reference-to-credentials resolution
//! (section 4.2). Credential values are stored exactly as given —
//! cleartext, a documented trade-off (section 7) — and this crate never
//! logs them.

use std::{collections::HashMap, env, fs, path::PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use rsgo_client::entities::{registry::RegistryEntry, Id};

pub mod dockerconfig;

/// In-memory registry store, one organization's worth of registries at
/// a time is queried through [`find_matching`].
#[derive(Debug, Default)]
pub struct RegistryStore {
  entries: HashMap<Id, RegistryEntry>,
}

impl RegistryStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn upsert(&mut self, entry: RegistryEntry) {
    self.entries.insert(entry.id, entry);
  }

  pub fn remove(&mut self, id: Id) -> Option<RegistryEntry> {
    self.entries.remove(&id)
  }

  /// Marks `id` as the sole default for its organization.
  pub fn set_default(&mut self, id: Id) -> Result<()> {
    let org = self
      .entries
      .get(&id)
      .map(|r| r.organization_id.clone())
      .context("registry not found")?;
    for entry in self.entries.values_mut() {
      if entry.organization_id == org {
        entry.is_default = entry.id == id;
      }
    }
    Ok(())
  }

  pub fn for_organization(&self, org_id: &str) -> Vec<&RegistryEntry> {
    self.entries.values().filter(|r| r.organization_id == org_id).collect()
  }

  /// Resolves an image reference to a registry by longest-specific-
  /// pattern match, falling back to the organization's default
  /// registry, else `None` (section 4.2).
  pub fn find_matching(&self, org_id: &str, image_ref: &str) -> Option<&RegistryEntry> {
    find_matching(&self.for_organization(org_id), image_ref)
  }
}

/// Pure matching function over an already-scoped registry list, kept
/// separate from [`RegistryStore`] so callers can test it directly.
pub fn find_matching<'a>(
  registries: &[&'a RegistryEntry],
  image_ref: &str,
) -> Option<&'a RegistryEntry> {
  let bare_ref = strip_tag_or_digest(image_ref);

  let mut best: Option<(&RegistryEntry, usize)> = None;
  for registry in registries {
    for pattern in &registry.image_patterns {
      if glob_matches(pattern, &bare_ref) {
        let specificity = literal_prefix_len(pattern);
        if best.map(|(_, len)| specificity > len).unwrap_or(true) {
          best = Some((registry, specificity));
        }
      }
    }
  }

  best.map(|(r, _)| r).or_else(|| registries.iter().find(|r| r.is_default).copied())
}

fn strip_tag_or_digest(image_ref: &str) -> String {
  if let Some((head, _)) = image_ref.split_once('@') {
    return head.to_string();
  }
  match image_ref.rfind(':') {
    Some(idx) if !image_ref[idx + 1..].contains('/') => image_ref[..idx].to_string(),
    _ => image_ref.to_string(),
  }
}

/// Length of the pattern's prefix before its first glob metacharacter;
/// longer literal prefixes are considered more specific matches.
fn literal_prefix_len(pattern: &str) -> usize {
  pattern.find('*').unwrap_or(pattern.len())
}

/// `*` matches within one path segment (no `/`); `**` matches across
/// segments (including `/`). Matching is case-insensitive.
fn glob_matches(pattern: &str, text: &str) -> bool {
  let regex_src = glob_to_regex(pattern);
  Regex::new(&regex_src).map(|re| re.is_match(text)).unwrap_or(false)
}

fn glob_to_regex(pattern: &str) -> String {
  let mut out = String::from("(?i)^");
  let chars: Vec<char> = pattern.chars().collect();
  let mut i = 0;
  while i < chars.len() {
    if chars[i] == '*' {
      if i + 1 < chars.len() && chars[i + 1] == '*' {
        out.push_str(".*");
        i += 2;
      } else {
        out.push_str("[^/]*");
        i += 1;
      }
    } else {
      out.push_str(&regex::escape(&chars[i].to_string()));
      i += 1;
    }
  }
  out.push('$');
  out
}

/// File-based credential fallback order (section 4.2): `DOCKER_CONFIGPATH`
/// override, then `DOCKER_CONFIG/config.json`, then the root and user
/// docker config locations.
pub fn docker_config_fallback_paths() -> Vec<PathBuf> {
  let mut candidates = Vec::new();
  if let Ok(path) = env::var("DOCKER_CONFIGPATH") {
    candidates.push(PathBuf::from(path));
  }
  if let Ok(dir) = env::var("DOCKER_CONFIG") {
    candidates.push(PathBuf::from(dir).join("config.json"));
  }
  candidates.push(PathBuf::from("/root/.docker/config.json"));
  if let Some(home) = env::var_os("HOME") {
    candidates.push(PathBuf::from(home).join(".docker/config.json"));
  }
  candidates
}

/// Loads the first readable `config.json` off
/// [`docker_config_fallback_paths`] and resolves credentials for
/// `registry_host` from it, if present.
pub fn file_fallback_credentials(
  registry_host: &str,
) -> Option<rsgo_client::entities::registry::RegistryCredentials> {
  for path in docker_config_fallback_paths() {
    if let Ok(contents) = fs::read_to_string(&path) {
      if let Ok(config) = serde_json::from_str::<dockerconfig::DockerConfig>(&contents) {
        if let Some(creds) = config.credentials_for(registry_host) {
          return Some(creds);
        }
      }
    }
  }
  None
}

#[cfg(test)]
mod tests {
  use super::*;
  use uuid::Uuid;

  fn registry(patterns: &[&str], is_default: bool) -> RegistryEntry {
    RegistryEntry {
      id: Uuid::new_v4(),
      organization_id: "org".into(),
      name: "r".into(),
      url: "https://example.com".into(),
      username: None,
      password: None,
      image_patterns: patterns.iter().map(|s| s.to_string()).collect(),
      is_default,
    }
  }

  #[test]
  fn matches_literal_prefix_specificity() {
    let broad = registry(&["myregistry.com/*"], false);
    let narrow = registry(&["myregistry.com/team/api*"], false);
    let list = vec![&broad, &narrow];
    let found = find_matching(&list, "myregistry.com/team/api:1.0").unwrap();
    assert_eq!(found.name, narrow.name);
    assert!(std::ptr::eq(found, &narrow));
  }

  #[test]
  fn double_star_crosses_segments() {
    let r = registry(&["myregistry.com/**"], false);
    let list = vec![&r];
    assert!(find_matching(&list, "myregistry.com/a/b/c:1.0").is_some());
  }

  #[test]
  fn single_star_stops_at_segment() {
    let r = registry(&["myregistry.com/*"], false);
    let list = vec![&r];
    assert!(find_matching(&list, "myregistry.com/a/b:1.0").is_none());
    assert!(find_matching(&list, "myregistry.com/a:1.0").is_some());
  }

  #[test]
  fn falls_back_to_default_when_no_pattern_matches() {
    let d = registry(&["nomatch/*"], true);
    let list = vec![&d];
    assert_eq!(find_matching(&list, "other.com/img:1.0").unwrap().name, d.name);
  }

  #[test]
  fn returns_none_when_nothing_matches_and_no_default() {
    let r = registry(&["nomatch/*"], false);
    let list = vec![&r];
    assert!(find_matching(&list, "other.com/img:1.0").is_none());
  }

  #[test]
  fn tag_and_digest_ignored_during_match() {
    let r = registry(&["myregistry.com/api"], false);
    let list = vec![&r];
    assert!(find_matching(&list, "myregistry.com/api:1.0").is_some());
    assert!(find_matching(&list, "myregistry.com/api@sha256:abc").is_some());
  }
}
