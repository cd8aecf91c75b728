use regex::Regex;

/// A tolerant SemVer parse: accepts an optional leading `v`, requires a
/// major version, defaults missing minor/patch to zero. Pre-release and
/// build-metadata suffixes are accepted but ignored for ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SemVer {
  major: u64,
  minor: u64,
  patch: u64,
}

pub fn parse(version: &str) -> Option<SemVer> {
  let re = Regex::new(r"^[vV]?(\d+)(?:\.(\d+))?(?:\.(\d+))?").ok()?;
  let captures = re.captures(version.trim())?;
  let major = captures.get(1)?.as_str().parse().ok()?;
  let minor = captures.get(2).map(|m| m.as_str().parse().unwrap_or(0)).unwrap_or(0);
  let patch = captures.get(3).map(|m| m.as_str().parse().unwrap_or(0)).unwrap_or(0);
  Some(SemVer { major, minor, patch })
}

/// `true` iff `candidate` parses and is strictly greater than `baseline`.
pub fn is_greater(candidate: &str, baseline: &str) -> bool {
  match (parse(candidate), parse(baseline)) {
    (Some(c), Some(b)) => c > b,
    _ => false,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn orders_patch_minor_major() {
    assert!(is_greater("1.0.1", "1.0.0"));
    assert!(is_greater("1.1.0", "1.0.1"));
    assert!(is_greater("2.0.0", "1.1.0"));
    assert!(!is_greater("1.0.0", "1.0.0"));
  }

  #[test]
  fn tolerates_leading_v_and_missing_components() {
    assert_eq!(parse("v1.2.3"), parse("1.2.3"));
    assert_eq!(parse("v2"), parse("2.0.0"));
    assert_eq!(parse("3.1"), parse("3.1.0"));
  }

  #[test]
  fn invalid_strings_do_not_parse() {
    assert!(parse("not-a-version").is_none());
  }
}
