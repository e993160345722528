use std::path::Path;

use crate::error::{PortKeeperError, Result};
use crate::models::config::ConfigFile;
use crate::models::KeeperConfig;

pub const CONFIG_FILENAME: &str = ".portkeeper.yaml";

/// Read `.portkeeper.yaml` from `dir`. A missing file is `None`.
/// Relative paths in the file are taken relative to `dir`.
pub fn load(dir: &Path) -> Result<Option<ConfigFile>> {
    let config_path = dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&config_path)?;
    let mut file: ConfigFile = serde_yaml::from_str(&contents)
        .map_err(|e| PortKeeperError::InvalidConfig(format!("{}: {e}", config_path.display())))?;
    file.registry = file.registry.map(|p| dir.join(p));
    file.lock = file.lock.map(|p| dir.join(p));
    Ok(Some(file))
}

/// Defaults, then the config file in `dir`, then the process environment.
pub fn resolve(dir: &Path) -> Result<KeeperConfig> {
    let mut config = KeeperConfig::default();
    if let Some(file) = load(dir)? {
        config.apply_file(file);
    }
    config.apply_env(|key| std::env::var(key).ok())?;
    Ok(config)
}
