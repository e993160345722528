use std::process::ExitStatus;

use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use pk_core::services::PortProbe;
use pk_core::{Reservation, ReservationManager};
use tokio::process::Command;

use crate::cli::RunArgs;

/// Exit code reported when Ctrl-C stops the child.
const INTERRUPTED: i32 = 130;

/// Environment handed to the child: the port under `var`, plus the host.
pub fn build_env_vars(var: &str, reservation: &Reservation) -> Vec<(String, String)> {
    vec![
        (var.to_string(), reservation.port().to_string()),
        ("PORTKEEPER_RESERVED_HOST".to_string(), reservation.host().to_string()),
    ]
}

/// Reserve a port, run the command with it injected, and release the port
/// once the command exits, fails to start, or is interrupted.
pub async fn run<P: PortProbe>(manager: &ReservationManager<P>, args: &RunArgs) -> Result<i32> {
    let scope = manager
        .scoped(&args.alloc.request())
        .wrap_err("failed to reserve a port for the command")?;
    let env = build_env_vars(&args.env_var, &scope[0]);
    tracing::debug!(port = scope[0].port(), command = ?args.command, "running_child");

    let outcome = spawn_and_wait(&args.command, &env).await;
    scope.close().wrap_err("failed to release the port after the command")?;
    outcome
}

async fn spawn_and_wait(command: &[String], env: &[(String, String)]) -> Result<i32> {
    let (program, rest) = command
        .split_first()
        .ok_or_else(|| eyre!("no command given"))?;

    let mut child = Command::new(program)
        .args(rest)
        .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .kill_on_drop(true)
        .spawn()
        .wrap_err_with(|| format!("failed to start {program}"))?;

    tokio::select! {
        status = child.wait() => Ok(exit_code(status?)),
        _ = tokio::signal::ctrl_c() => {
            tracing::debug!("interrupted_killing_child");
            child.kill().await.wrap_err("failed to stop the command")?;
            Ok(INTERRUPTED)
        }
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_vars_carry_port_and_host() {
        let reservation = Reservation::new("127.0.0.1", 8123);
        let vars = build_env_vars("API_PORT", &reservation);
        assert_eq!(vars[0], ("API_PORT".into(), "8123".into()));
        assert_eq!(vars[1], ("PORTKEEPER_RESERVED_HOST".into(), "127.0.0.1".into()));
    }
}
