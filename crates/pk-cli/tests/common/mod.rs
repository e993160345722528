// Each test binary compiles this module independently and uses a different
// subset of helpers, so unused-function warnings are expected.
#![allow(dead_code)]

use std::path::Path;

use chrono::{DateTime, Utc};
use clap::Parser;

use pk_cli::cli::Cli;
use pk_cli::commands;
use pk_core::models::{Registry, ReservationRecord};
use pk_core::{KeeperConfig, ReservationManager};

pub type Probe = fn(&str, u16) -> bool;

/// Probe that reports every port free, so tests never touch real sockets.
pub fn always_free(_host: &str, _port: u16) -> bool {
    true
}

/// Manager over a registry and lock inside `dir`.
pub fn manager_in(dir: &Path) -> ReservationManager<Probe> {
    ReservationManager::with_probe(&KeeperConfig::in_dir(dir), always_free as Probe)
}

/// Parse `args` as a portkeeper command line and execute it, returning the
/// exit code and everything written to stdout.
pub async fn run_cli(manager: &ReservationManager<Probe>, args: &[&str]) -> (i32, String) {
    let cli = Cli::try_parse_from(std::iter::once("portkeeper").chain(args.iter().copied()))
        .unwrap();
    let mut out = Vec::new();
    let code = commands::execute(manager, &cli.command, &mut out)
        .await
        .unwrap();
    (code, String::from_utf8(out).unwrap())
}

/// A record with a fixed timestamp for deterministic output.
pub fn make_record(host: &str, port: u16, owner: &str, at: &str) -> ReservationRecord {
    let mut record = ReservationRecord::new(host, port, Some(owner));
    record.created_at = at.parse::<DateTime<Utc>>().unwrap();
    record
}

pub fn registry_of(records: Vec<ReservationRecord>) -> Registry {
    records.into_iter().map(|r| (r.key(), r)).collect()
}
