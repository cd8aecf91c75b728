use std::sync::OnceLock;

use colored::Colorize;
use config::Config;

pub fn core_config() -> &'static Config {
  static CORE_CONFIG: OnceLock<Config> = OnceLock::new();
  CORE_CONFIG.get_or_init(|| match config::load_config() {
    Ok(config) => config,
    Err(e) => {
      eprintln!("{}: {e:?}", "ERROR".red());
      std::process::exit(1);
    }
  })
}
