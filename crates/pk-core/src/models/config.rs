use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use super::port_range::PortRange;
use crate::error::{PortKeeperError, Result};

pub const ENV_REGISTRY: &str = "PORTKEEPER_REGISTRY";
pub const ENV_LOCK: &str = "PORTKEEPER_LOCK";
pub const ENV_HOST: &str = "PORTKEEPER_HOST";
pub const ENV_STRICT: &str = "PORTKEEPER_STRICT";
pub const ENV_LOCK_METHOD: &str = "PORTKEEPER_LOCK_METHOD";

pub const DEFAULT_REGISTRY: &str = ".port_registry.json";
pub const DEFAULT_LOCK: &str = ".port_registry.lock";
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Which exclusive-lock backend guards registry transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockMethod {
    /// Native lock where the platform has one, marker file otherwise.
    #[default]
    Auto,
    /// `flock` on Unix, `LockFileEx` on Windows.
    Native,
    /// Exclusive creation of `<lock>.lck` with randomized retry. A holder that
    /// crashes leaves the marker behind and it has to be removed by hand.
    Marker,
}

impl FromStr for LockMethod {
    type Err = PortKeeperError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "native" => Ok(Self::Native),
            "marker" => Ok(Self::Marker),
            other => Err(PortKeeperError::InvalidConfig(format!(
                "unknown lock method '{other}' (expected auto, native or marker)"
            ))),
        }
    }
}

/// What a registry read does with a file it cannot parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CorruptRegistryPolicy {
    /// Treat the file as an empty registry.
    #[default]
    Lenient,
    /// Surface `PortKeeperError::CorruptRegistry`.
    Strict,
}

/// Optional `.portkeeper.yaml` overrides.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub registry: Option<PathBuf>,
    #[serde(default)]
    pub lock: Option<PathBuf>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub range: Option<PortRange>,
    #[serde(default)]
    pub lock_method: Option<LockMethod>,
    #[serde(default)]
    pub strict: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeeperConfig {
    pub registry_path: PathBuf,
    pub lock_path: PathBuf,
    pub default_host: String,
    pub default_range: PortRange,
    pub lock_method: LockMethod,
    pub corrupt_policy: CorruptRegistryPolicy,
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            registry_path: PathBuf::from(DEFAULT_REGISTRY),
            lock_path: PathBuf::from(DEFAULT_LOCK),
            default_host: DEFAULT_HOST.to_string(),
            default_range: PortRange::DEFAULT,
            lock_method: LockMethod::Auto,
            corrupt_policy: CorruptRegistryPolicy::Lenient,
        }
    }
}

impl KeeperConfig {
    /// Defaults with the registry and lock file placed inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            registry_path: dir.join(DEFAULT_REGISTRY),
            lock_path: dir.join(DEFAULT_LOCK),
            ..Self::default()
        }
    }

    pub fn apply_file(&mut self, file: ConfigFile) {
        if let Some(registry) = file.registry {
            self.registry_path = registry;
        }
        if let Some(lock) = file.lock {
            self.lock_path = lock;
        }
        if let Some(host) = file.host {
            self.default_host = host;
        }
        if let Some(range) = file.range {
            self.default_range = range;
        }
        if let Some(method) = file.lock_method {
            self.lock_method = method;
        }
        if let Some(strict) = file.strict {
            self.corrupt_policy = policy_for(strict);
        }
    }

    /// Overlay values from environment variables fetched through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(registry) = non_empty(lookup(ENV_REGISTRY)) {
            self.registry_path = PathBuf::from(registry);
        }
        if let Some(lock) = non_empty(lookup(ENV_LOCK)) {
            self.lock_path = PathBuf::from(lock);
        }
        if let Some(host) = non_empty(lookup(ENV_HOST)) {
            self.default_host = host;
        }
        if let Some(method) = non_empty(lookup(ENV_LOCK_METHOD)) {
            self.lock_method = method.parse()?;
        }
        if let Some(strict) = non_empty(lookup(ENV_STRICT)) {
            self.corrupt_policy = policy_for(parse_flag(ENV_STRICT, &strict)?);
        }
        Ok(())
    }
}

fn policy_for(strict: bool) -> CorruptRegistryPolicy {
    if strict {
        CorruptRegistryPolicy::Strict
    } else {
        CorruptRegistryPolicy::Lenient
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(PortKeeperError::InvalidConfig(format!(
            "{name} must be a boolean, got '{other}'"
        ))),
    }
}
