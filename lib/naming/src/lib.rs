//! Sanitizes names to container-registry-safe identifiers and parses
//! `registry/name:tag` image references, including registries that
//! carry their own port.

/// Replaces runs of disallowed characters with `_`, strips leading
/// non-alphanumerics and trailing underscores, and returns `"unnamed"`
/// for empty input. Output always matches `^[A-Za-z0-9][A-Za-z0-9_.-]*$`.
pub fn sanitize(name: &str) -> String {
  if name.is_empty() {
    return "unnamed".to_string();
  }

  let mut out = String::with_capacity(name.len());
  let mut prev_was_disallowed = false;
  for c in name.chars() {
    if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
      out.push(c);
      prev_was_disallowed = false;
    } else if !prev_was_disallowed {
      out.push('_');
      prev_was_disallowed = true;
    }
  }

  let trimmed = out.trim_start_matches(|c: char| !c.is_ascii_alphanumeric());
  let trimmed = trimmed.trim_end_matches('_');

  if trimmed.is_empty() {
    "unnamed".to_string()
  } else {
    trimmed.to_string()
  }
}

/// `sanitize(stack) + "_" + sanitize(service)`, used for container,
/// network and volume naming alike.
pub fn container_name(stack: &str, service: &str) -> String {
  format!("{}_{}", sanitize(stack), sanitize(service))
}

pub fn network_name(stack: &str) -> String {
  format!("{}_default", sanitize(stack))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
  pub registry: Option<String>,
  pub path: String,
  pub tag: String,
  /// `true` when `tag` is actually a `sha256:...` digest.
  pub is_digest: bool,
}

impl ImageRef {
  /// Left-inverse of parsing: `format(parse(r)) == r` for any `r`
  /// without a digest; digest references survive verbatim.
  pub fn format(&self) -> String {
    let sep = if self.is_digest { "@" } else { ":" };
    match &self.registry {
      Some(registry) => format!("{registry}/{}{sep}{}", self.path, self.tag),
      None => format!("{}{sep}{}", self.path, self.tag),
    }
  }
}

/// Splits on the *last* `:`. If the text after the last `:` contains a
/// `/`, that colon wasn't a tag separator (it was part of a
/// `registry:port` host) and the whole string is the path with a
/// defaulted `latest` tag. Digest references (`@sha256:...`) are
/// preserved as the tag portion verbatim.
pub fn parse_image_ref(reference: &str) -> ImageRef {
  if let Some((rest, digest)) = reference.split_once('@') {
    let (registry, path) = split_registry(rest);
    return ImageRef { registry, path, tag: digest.to_string(), is_digest: true };
  }

  match reference.rfind(':') {
    Some(idx) if !reference[idx + 1..].contains('/') => {
      let (head, tag) = (&reference[..idx], &reference[idx + 1..]);
      let (registry, path) = split_registry(head);
      ImageRef { registry, path, tag: tag.to_string(), is_digest: false }
    }
    _ => {
      let (registry, path) = split_registry(reference);
      ImageRef { registry, path, tag: "latest".to_string(), is_digest: false }
    }
  }
}

/// Splits a leading `host[:port]/` segment off a reference, recognizing
/// it as a registry host only when it contains a `.`, a `:`, or is
/// literally `localhost` — otherwise the first segment is a path
/// component (e.g. Docker Hub's `library/nginx`).
fn split_registry(s: &str) -> (Option<String>, String) {
  match s.split_once('/') {
    Some((first, rest))
      if first.contains('.') || first.contains(':') || first == "localhost" =>
    {
      (Some(first.to_string()), rest.to_string())
    }
    _ => (None, s.to_string()),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sanitize_preserves_dots_and_dashes() {
    assert_eq!(sanitize("my-service.v1"), "my-service.v1");
  }

  #[test]
  fn sanitize_collapses_disallowed_runs() {
    assert_eq!(sanitize("my service!!name"), "my_service_name");
  }

  #[test]
  fn sanitize_strips_leading_and_trailing() {
    assert_eq!(sanitize("__foo__"), "foo");
  }

  #[test]
  fn sanitize_empty_is_unnamed() {
    assert_eq!(sanitize(""), "unnamed");
    assert_eq!(sanitize("___"), "unnamed");
  }

  #[test]
  fn container_name_matches_invariant() {
    let re = regex_like(&container_name("my stack", "api!"));
    assert!(re);
  }

  fn regex_like(s: &str) -> bool {
    let mut chars = s.chars();
    let first_ok = chars.next().is_some_and(|c| c.is_ascii_alphanumeric());
    let rest_ok =
      chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-');
    first_ok && rest_ok
  }

  #[test]
  fn parse_plain_ref_defaults_tag() {
    let r = parse_image_ref("nginx");
    assert_eq!(r.registry, None);
    assert_eq!(r.path, "nginx");
    assert_eq!(r.tag, "latest");
  }

  #[test]
  fn parse_ref_with_tag() {
    let r = parse_image_ref("myapp/api:1.0");
    assert_eq!(r.registry, None);
    assert_eq!(r.path, "myapp/api");
    assert_eq!(r.tag, "1.0");
  }

  #[test]
  fn parse_registry_with_port_and_tag() {
    let r = parse_image_ref("registry.example.com:5000/img:v1");
    assert_eq!(r.registry.as_deref(), Some("registry.example.com:5000"));
    assert_eq!(r.path, "img");
    assert_eq!(r.tag, "v1");
  }

  #[test]
  fn parse_registry_with_port_no_tag() {
    let r = parse_image_ref("registry.example.com:5000/img");
    assert_eq!(r.registry.as_deref(), Some("registry.example.com:5000"));
    assert_eq!(r.path, "img");
    assert_eq!(r.tag, "latest");
  }

  #[test]
  fn parse_digest_reference_preserved_verbatim() {
    let r = parse_image_ref(
      "myregistry.com/api@sha256:abcd1234abcd1234abcd1234abcd1234abcd1234abcd1234abcd1234abcd1234",
    );
    assert!(r.is_digest);
    assert_eq!(
      r.tag,
      "sha256:abcd1234abcd1234abcd1234abcd1234abcd1234abcd1234abcd1234abcd1234"
    );
    assert_eq!(r.format(), "myregistry.com/api@sha256:abcd1234abcd1234abcd1234abcd1234abcd1234abcd1234abcd1234abcd1234");
  }

  #[test]
  fn format_is_left_inverse_without_digest() {
    for r in [
      "nginx:1.27",
      "myapp/api:1.0",
      "registry.example.com:5000/img:v1",
      "registry.example.com/team/img:latest",
    ] {
      assert_eq!(parse_image_ref(r).format(), r);
    }
  }
}
