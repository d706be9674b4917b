use anyhow::Result;

use crate::config::{ClientConfig, ConfigOverrides, ConfigStore};

pub fn run_config_show(store: &ConfigStore, overrides: &ConfigOverrides) -> Result<()> {
    let config = store.effective(overrides)?;

    println!("Config file: {}", store.path().display());
    if !store.path().exists() {
        println!("   (not created yet, run 'mediashare-upload config init')");
    }
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);

    Ok(())
}

pub fn run_config_init(store: &ConfigStore, force: bool) -> Result<()> {
    if store.path().exists() && !force {
        println!("⚠️  {} already exists.", store.path().display());
        println!("   Use --force to overwrite it.");
        return Ok(());
    }

    store.save(&ClientConfig::default())?;
    println!("✅ Wrote {}", store.path().display());

    Ok(())
}
