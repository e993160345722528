use clap::Parser;

use pk_cli::cli::Cli;
use pk_cli::{commands, logging};
use pk_core::ReservationManager;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let guard = logging::init(cli.verbose, cli.log_file.as_deref());

    let cwd = std::env::current_dir()?;
    let config = cli.config(&cwd)?;
    tracing::debug!(
        registry = %config.registry_path.display(),
        lock = %config.lock_path.display(),
        "config_resolved"
    );
    let manager = ReservationManager::new(&config);

    let mut stdout = std::io::stdout();
    let code = commands::execute(&manager, &cli.command, &mut stdout).await?;
    if code != 0 {
        // process::exit skips destructors; flush pending log lines first.
        drop(guard);
        std::process::exit(code);
    }
    Ok(())
}
