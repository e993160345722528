use std::io::Write;

use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use pk_core::services::{env_file, json_config, PortProbe};
use pk_core::{Reservation, ReservationManager};
use serde_json::{json, Map, Value};

use crate::cli::{Commands, ReserveArgs};
use crate::{output, runner};

/// Run one subcommand, writing its result to `out`. Returns the process exit
/// code.
pub async fn execute<P: PortProbe>(
    manager: &ReservationManager<P>,
    command: &Commands,
    out: &mut dyn Write,
) -> Result<i32> {
    match command {
        Commands::Reserve(args) => {
            let mut reservations = reserve(manager, args)?;
            writeln!(out, "{}", output::reservations_json(&reservations))?;
            if args.hold {
                out.flush()?;
                hold_until_interrupted(manager, &mut reservations).await?;
            }
        }
        Commands::Release { port, host } => {
            let host = host.as_deref().unwrap_or(manager.default_host());
            let removed = manager.release_port(host, *port)?;
            writeln!(out, "{}", output::release_json(*port, removed))?;
        }
        Commands::Status { table } => {
            let registry = manager.status()?;
            if *table {
                writeln!(out, "{}", output::status_table(&registry))?;
            } else {
                writeln!(out, "{:#}", output::status_json(&registry))?;
            }
        }
        Commands::Gc => {
            let report = manager.collect_garbage()?;
            writeln!(out, "{}", output::gc_json(&report))?;
        }
        Commands::Port(args) => {
            let reservation = manager.reserve_one(&args.request())?;
            writeln!(out, "{}", reservation.port())?;
        }
        Commands::Run(args) => {
            out.flush()?;
            return runner::run(manager, args).await;
        }
    }
    Ok(0)
}

/// Reserve, then propagate the ports into the env file and JSON config the
/// caller asked for.
pub fn reserve<P: PortProbe>(
    manager: &ReservationManager<P>,
    args: &ReserveArgs,
) -> Result<Vec<Reservation>> {
    let reservations = manager.reserve(&args.request())?;

    if let Some(key) = &args.write_env {
        env_file::write_env(&args.env_path, env_entries(key, &reservations), true)
            .wrap_err_with(|| format!("failed to update {}", args.env_path.display()))?;
    }
    if let Some(path) = &args.update_config {
        let mut changes = Map::new();
        changes.insert(args.config_key.clone(), config_entry(&reservations));
        json_config::update_config_json(path, &changes, true)
            .wrap_err_with(|| format!("failed to update {}", path.display()))?;
    }
    Ok(reservations)
}

/// `KEY=PORT` for one reservation, `KEY_1=..`, `KEY_2=..` for several.
pub fn env_entries(key: &str, reservations: &[Reservation]) -> Vec<(String, String)> {
    match reservations {
        [single] => vec![(key.to_string(), single.port().to_string())],
        many => many
            .iter()
            .enumerate()
            .map(|(i, r)| (format!("{key}_{}", i + 1), r.port().to_string()))
            .collect(),
    }
}

fn config_entry(reservations: &[Reservation]) -> Value {
    match reservations {
        [single] => json!({"host": single.host(), "port": single.port()}),
        many => json!({
            "host": many.first().map(Reservation::host),
            "ports": many.iter().map(Reservation::port).collect::<Vec<_>>(),
        }),
    }
}

async fn hold_until_interrupted<P: PortProbe>(
    manager: &ReservationManager<P>,
    reservations: &mut [Reservation],
) -> Result<()> {
    tracing::info!(
        ports = ?reservations.iter().map(Reservation::port).collect::<Vec<_>>(),
        "holding_until_interrupted"
    );
    tokio::signal::ctrl_c()
        .await
        .wrap_err("failed to wait for Ctrl-C")?;
    for reservation in reservations.iter_mut() {
        manager.release(reservation)?;
    }
    Ok(())
}
