//! Initialize .accessgate.toml configuration

use accessgate_core::config::CONFIG_FILENAME;
use accessgate_core::GateConfig;
use anyhow::Result;
use std::path::Path;

pub fn run(path: Option<&Path>) -> Result<()> {
    let target_path = path.unwrap_or_else(|| Path::new("."));
    let config_path = target_path.join(CONFIG_FILENAME);

    if config_path.exists() {
        println!("⚠️  {} already exists at {:?}", CONFIG_FILENAME, config_path);
        return Ok(());
    }

    let config = GateConfig::default();
    config.save(&config_path)?;

    println!("✅ Created {} at {:?}", CONFIG_FILENAME, config_path);
    println!("\nSet [api] base_url for your backend, then run:");
    println!("  accessgate auth --token <TOKEN> --role <ROLE>");
    println!("  accessgate run");

    Ok(())
}
