use std::path::PathBuf;

use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "rsgo-cli", version, about = "Drive the ReadyStackGo orchestration core from the command line")]
pub struct CliArgs {
  #[command(subcommand)]
  pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
  /// Parses and validates a manifest file, printing errors and warnings.
  Validate { manifest: PathBuf },
  /// Parses a manifest, registers it in a fresh catalog, and deploys it
  /// against a Docker-compatible runtime.
  Deploy {
    manifest: PathBuf,
    /// Organization owning the target environment and registries.
    #[arg(long)]
    organization: String,
    /// Product group id; defaults to the manifest's own `groupId`.
    #[arg(long)]
    group: Option<String>,
    /// Id of the [`rsgo_client::entities::environment::Environment`] to deploy into.
    #[arg(long)]
    environment: Uuid,
    /// `key=value` shared variable overrides, may be repeated.
    #[arg(long = "var", value_parser = parse_key_value)]
    shared_variables: Vec<(String, String)>,
    /// Continue deploying remaining stacks after one stack fails.
    #[arg(long)]
    continue_on_error: bool,
  },
  /// Prints the active configuration (credentials redacted unless
  /// `--unsanitized` is passed).
  Config {
    #[arg(long)]
    unsanitized: bool,
  },
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
  raw
    .split_once('=')
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .ok_or_else(|| format!("expected `key=value`, got '{raw}'"))
}
