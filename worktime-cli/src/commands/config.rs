//! `worktime config`: inspect `~/.worktime/config.yaml`.

use anyhow::{Context, Result};
use clap::Subcommand;

use worktime_core::{paths, Config};

use super::home_dir;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration (defaults filled in).
    Show,
}

pub fn run(command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => show(),
    }
}

fn show() -> Result<()> {
    let home = home_dir()?;
    let path = paths::config_path(&home);
    let config = Config::load_at(&home).context("failed to load configuration")?;

    let origin = if path.exists() { "" } else { " (not present, defaults)" };
    println!("# {}{origin}", path.display());
    print!(
        "{}",
        serde_yaml::to_string(&config).context("failed to serialize configuration")?
    );
    Ok(())
}
