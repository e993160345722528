use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use pk_core::services::config_loader;
use pk_core::{KeeperConfig, PortRange, ReserveRequest};

#[derive(Debug, Parser)]
#[command(
    name = "portkeeper",
    version,
    about = "Reserve and manage TCP ports for local development",
    after_help = "Registry and lock paths default to PORTKEEPER_REGISTRY / PORTKEEPER_LOCK, \
                  then .portkeeper.yaml, then .port_registry.json / .port_registry.lock."
)]
pub struct Cli {
    /// Registry file shared by cooperating processes.
    #[arg(long, global = true, value_name = "PATH")]
    pub registry: Option<PathBuf>,

    /// Lock file serializing registry updates.
    #[arg(long, global = true, value_name = "PATH")]
    pub lock: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Write logs to this file instead of stderr.
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Config from `dir` and the environment, with command-line paths on top.
    pub fn config(&self, dir: &Path) -> pk_core::Result<KeeperConfig> {
        let mut config = config_loader::resolve(dir)?;
        if let Some(registry) = &self.registry {
            config.registry_path = registry.clone();
        }
        if let Some(lock) = &self.lock {
            config.lock_path = lock.clone();
        }
        Ok(config)
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Reserve one or more ports and print them as JSON
    Reserve(ReserveArgs),
    /// Remove a port from the registry
    Release {
        port: u16,
        #[arg(long)]
        host: Option<String>,
    },
    /// List reserved ports
    Status {
        /// Print an aligned table instead of JSON.
        #[arg(long)]
        table: bool,
    },
    /// Drop registry entries whose port is no longer bound
    Gc,
    /// Reserve a port and print only the number
    Port(AllocArgs),
    /// Reserve a port, run a command with it in the environment, then release it
    Run(RunArgs),
}

/// Where and for whom to allocate.
#[derive(Debug, Clone, Default, Args)]
pub struct AllocArgs {
    /// Port to try before scanning the range.
    #[arg(long)]
    pub preferred: Option<u16>,

    /// Closed range to scan.
    #[arg(long, num_args = 2, value_names = ["START", "END"])]
    pub range: Option<Vec<u16>>,

    /// Host to bind-check; defaults to PORTKEEPER_HOST or 127.0.0.1.
    #[arg(long)]
    pub host: Option<String>,

    /// Free-form label stored with the reservation.
    #[arg(long)]
    pub owner: Option<String>,
}

impl AllocArgs {
    pub fn port_range(&self) -> Option<PortRange> {
        match self.range.as_deref() {
            Some([start, end]) => Some(PortRange::new(*start, *end)),
            _ => None,
        }
    }

    pub fn request(&self) -> ReserveRequest {
        ReserveRequest {
            preferred: self.preferred,
            range: self.port_range(),
            host: self.host.clone(),
            owner: self.owner.clone(),
            ..ReserveRequest::default()
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct ReserveArgs {
    #[command(flatten)]
    pub alloc: AllocArgs,

    /// Bind and listen on the ports until interrupted, then release them.
    #[arg(long)]
    pub hold: bool,

    #[arg(long, default_value_t = 1)]
    pub count: usize,

    /// Write KEY=PORT to the env file (KEY_1, KEY_2, ... when --count > 1).
    #[arg(long, value_name = "KEY")]
    pub write_env: Option<String>,

    #[arg(long, value_name = "PATH", default_value = ".env")]
    pub env_path: PathBuf,

    /// Merge {KEY: {host, port}} into this JSON config, keeping a .bak copy.
    #[arg(long, value_name = "PATH")]
    pub update_config: Option<PathBuf>,

    #[arg(long, value_name = "KEY", default_value = "server")]
    pub config_key: String,
}

impl ReserveArgs {
    pub fn request(&self) -> ReserveRequest {
        ReserveRequest {
            hold: self.hold,
            count: self.count,
            ..self.alloc.request()
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub alloc: AllocArgs,

    /// Environment variable that receives the port.
    #[arg(long, value_name = "NAME", default_value = "PORT")]
    pub env_var: String,

    /// Command to run, after `--`.
    #[arg(last = true, required = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}
