use std::sync::OnceLock;

use colored::Colorize;
use config::Config;

pub fn cli_config() -> &'static Config {
  static CLI_CONFIG: OnceLock<Config> = OnceLock::new();
  CLI_CONFIG.get_or_init(|| match config::load_config() {
    Ok(config) => config,
    Err(e) => {
      eprintln!("{}: {e:?}", "ERROR".red());
      std::process::exit(1);
    }
  })
}
