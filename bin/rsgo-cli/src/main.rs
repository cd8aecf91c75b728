use clap::Parser;

mod args;
mod command;
mod config;

use crate::{args::Command, config::cli_config};

async fn app() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();
  let cli_args = args::CliArgs::parse();
  let cfg = cli_config();
  logger::init(&cfg.logging)?;

  match cli_args.command {
    Command::Validate { manifest } => command::validate::handle(&manifest),
    Command::Deploy {
      manifest,
      organization,
      group,
      environment,
      shared_variables,
      continue_on_error,
    } => {
      command::deploy::handle(
        &manifest,
        organization,
        group,
        environment,
        shared_variables,
        continue_on_error,
        cfg.docker_host.clone(),
      )
      .await
    }
    Command::Config { unsanitized } => {
      let printed = if unsanitized { cfg.clone() } else { cfg.sanitized() };
      println!("{printed:#?}");
      Ok(())
    }
  }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  if let Err(e) = app().await {
    eprintln!("{e:?}");
    std::process::exit(1);
  }
  Ok(())
}
