use std::path::Path;

use colored::Colorize;
use comfy_table::{Cell, Color, Table};

pub fn handle(path: &Path) -> anyhow::Result<()> {
  let manifest = manifest::parse_from_file(path)?;
  let result = manifest::validate(&manifest);

  let mut table = Table::new();
  table.set_header(vec!["kind", "message"]);
  for error in &result.errors {
    table.add_row(vec![Cell::new("error").fg(Color::Red), Cell::new(error)]);
  }
  for warning in &result.warnings {
    table.add_row(vec![Cell::new("warning").fg(Color::Yellow), Cell::new(warning)]);
  }
  if result.errors.is_empty() && result.warnings.is_empty() {
    println!("{}: manifest is valid, no warnings", "OK".green());
  } else {
    println!("{table}");
  }

  if !result.is_valid {
    anyhow::bail!("manifest '{}' failed validation", manifest.metadata.name);
  }
  Ok(())
}
