use std::{
  collections::HashSet,
  fs,
  path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use rsgo_client::entities::manifest::{InlineStack, Manifest, StackEntry};

use crate::parser::parse_str;

/// Parses `path` and transitively resolves every `include:` and
/// `services.include:` it reaches, pushing a per-include working
/// directory so relative paths are resolved against the fragment that
/// declared them (section 4.3).
pub fn parse_from_file(path: impl AsRef<Path>) -> Result<Manifest> {
  let mut ancestors = HashSet::new();
  resolve_file(path.as_ref(), &mut ancestors)
}

fn resolve_file(path: &Path, ancestors: &mut HashSet<PathBuf>) -> Result<Manifest> {
  let canonical = path
    .canonicalize()
    .with_context(|| format!("manifest file not found: {}", path.display()))?;

  if !ancestors.insert(canonical.clone()) {
    bail!("include cycle detected at {}", canonical.display());
  }

  let contents = fs::read_to_string(&canonical)
    .with_context(|| format!("failed to read {}", canonical.display()))?;
  let mut manifest = parse_str(&contents)
    .with_context(|| format!("failed to parse {}", canonical.display()))?;

  let base_dir = canonical.parent().map(Path::to_path_buf).unwrap_or_default();

  resolve_services_include(&mut manifest.services, &mut manifest.services_include, &base_dir, ancestors)?;

  for (stack_name, entry) in manifest.stacks.iter_mut() {
    *entry = resolve_stack_entry(stack_name, entry, &base_dir, ancestors)?;
  }

  ancestors.remove(&canonical);
  Ok(manifest)
}

fn resolve_stack_entry(
  stack_name: &str,
  entry: &StackEntry,
  base_dir: &Path,
  ancestors: &mut HashSet<PathBuf>,
) -> Result<StackEntry> {
  match entry {
    StackEntry::Include { include } => {
      let fragment_path = base_dir.join(include);
      let fragment = resolve_file(&fragment_path, ancestors)
        .with_context(|| format!("failed to include stack '{stack_name}' from {include}"))?;

      let inline = if fragment.is_multi_stack() {
        // Multi-stack product included as a single stack: flatten every
        // sub-stack's services into one dictionary, preserving the
        // fragment's own metadata at the stack level.
        let mut flattened = IndexMap::new();
        for sub_entry in fragment.stacks.values() {
          match sub_entry {
            StackEntry::Inline(sub) => {
              for (svc_name, svc) in &sub.services {
                flattened.insert(svc_name.clone(), svc.clone());
              }
            }
            StackEntry::Include { .. } => {
              bail!("fragment '{include}' left an unresolved nested include");
            }
          }
        }
        InlineStack {
          metadata: fragment.metadata,
          variables: fragment.shared_variables,
          services: flattened,
          services_include: Vec::new(),
        }
      } else {
        InlineStack {
          metadata: fragment.metadata,
          variables: fragment.variables,
          services: fragment.services,
          services_include: Vec::new(),
        }
      };

      Ok(StackEntry::Inline(inline))
    }
    StackEntry::Inline(inline) => {
      let mut inline = inline.clone();
      resolve_services_include(&mut inline.services, &mut inline.services_include, base_dir, ancestors)?;
      Ok(StackEntry::Inline(inline))
    }
  }
}

/// Merges each `services.include:` fragment's `services` map into
/// `services`, in listed order so later entries shadow earlier ones on
/// key collision; the stack's own directly-declared services always
/// win over anything pulled in via include.
fn resolve_services_include(
  services: &mut IndexMap<String, rsgo_client::entities::manifest::ServiceTemplate>,
  services_include: &mut Vec<String>,
  base_dir: &Path,
  ancestors: &mut HashSet<PathBuf>,
) -> Result<()> {
  if services_include.is_empty() {
    return Ok(());
  }

  let mut merged = IndexMap::new();
  for include_path in services_include.iter() {
    let fragment_path = base_dir.join(include_path);
    let fragment = resolve_file(&fragment_path, ancestors)
      .with_context(|| format!("failed to resolve services.include '{include_path}'"))?;
    for (name, svc) in fragment.services {
      merged.insert(name, svc);
    }
  }
  // Own declarations win over included ones.
  for (name, svc) in services.drain(..) {
    merged.insert(name, svc);
  }
  *services = merged;
  services_include.clear();
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;

  fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
  }

  #[test]
  fn resolves_stack_level_include() {
    let dir = tempfile::tempdir().unwrap();
    write(
      dir.path(),
      "fragment.yaml",
      "metadata:\n  name: frag\nservices:\n  web:\n    image: nginx\n",
    );
    let main = write(
      dir.path(),
      "main.yaml",
      "metadata:\n  name: main\n  productVersion: 1.0.0\nstacks:\n  app:\n    include: fragment.yaml\n",
    );

    let manifest = parse_from_file(&main).unwrap();
    match &manifest.stacks["app"] {
      StackEntry::Inline(inline) => assert_eq!(inline.services.len(), 1),
      StackEntry::Include { .. } => panic!("expected resolved inline stack"),
    }
  }

  #[test]
  fn flattens_multi_stack_include() {
    let dir = tempfile::tempdir().unwrap();
    write(
      dir.path(),
      "business-services.yaml",
      r#"
metadata:
  name: business
  productVersion: 1.0.0
stacks:
  projectmanagement:
    metadata:
      name: projectmanagement
    services:
      project-api:
        image: pm/api
      project-web:
        image: pm/web
  memo:
    metadata:
      name: memo
    services:
      memo-api:
        image: memo/api
"#,
    );
    let main = write(
      dir.path(),
      "main.yaml",
      "metadata:\n  name: main\n  productVersion: 1.0.0\nstacks:\n  business:\n    include: business-services.yaml\n",
    );

    let manifest = parse_from_file(&main).unwrap();
    match &manifest.stacks["business"] {
      StackEntry::Inline(inline) => {
        let mut keys: Vec<_> = inline.services.keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["memo-api", "project-api", "project-web"]);
      }
      StackEntry::Include { .. } => panic!("expected resolved inline stack"),
    }
  }

  #[test]
  fn detects_include_cycle() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.yaml", "metadata:\n  name: a\nstacks:\n  s:\n    include: b.yaml\n");
    let b = write(dir.path(), "b.yaml", "metadata:\n  name: b\nstacks:\n  s:\n    include: a.yaml\n");

    let err = parse_from_file(&b).unwrap_err();
    assert!(format!("{err:#}").contains("cycle"));
  }

  #[test]
  fn services_include_merge_shadows_in_order() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "frag1.yaml", "metadata:\n  name: f1\nservices:\n  web:\n    image: v1\n");
    write(dir.path(), "frag2.yaml", "metadata:\n  name: f2\nservices:\n  web:\n    image: v2\n");
    let main = write(
      dir.path(),
      "main.yaml",
      "metadata:\n  name: main\nservices:\n  include:\n    - frag1.yaml\n    - frag2.yaml\n",
    );

    let manifest = parse_from_file(&main).unwrap();
    assert_eq!(manifest.services["web"].image, "v2");
  }
}
