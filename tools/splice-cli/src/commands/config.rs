//! Print the effective engine configuration.

use anyhow::Context;
use splice_common::config::EngineConfig;

pub fn run(config: &EngineConfig, save: bool) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    if save {
        config.save().context("Failed to save config")?;
        eprintln!("Config saved.");
    }
    Ok(())
}
