use std::net::TcpListener;

/// Point-in-time answer to "could `(host, port)` be bound right now?".
pub trait PortProbe {
    fn is_free(&self, host: &str, port: u16) -> bool;
}

/// Probes by binding a real socket and closing it straight away.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbe;

impl PortProbe for SystemProbe {
    fn is_free(&self, host: &str, port: u16) -> bool {
        is_free(host, port)
    }
}

/// `TcpListener::bind` sets `SO_REUSEADDR` on Unix, so a port lingering in
/// TIME_WAIT still counts as free. Unresolvable hosts count as not free.
pub fn is_free(host: &str, port: u16) -> bool {
    match TcpListener::bind((host, port)) {
        Ok(listener) => {
            drop(listener);
            true
        }
        Err(e) => {
            tracing::trace!(host, port, error = %e, "probe_bind_failed");
            false
        }
    }
}

impl<F> PortProbe for F
where
    F: Fn(&str, u16) -> bool,
{
    fn is_free(&self, host: &str, port: u16) -> bool {
        self(host, port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bound_port_is_not_free() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        assert!(!is_free("127.0.0.1", port));
        drop(listener);
        assert!(is_free("127.0.0.1", port));
    }

    #[test]
    fn unresolvable_host_is_not_free() {
        assert!(!is_free("no-such-host.invalid", 8000));
    }

    #[test]
    fn closures_act_as_probes() {
        let probe = |_: &str, port: u16| port % 2 == 0;
        assert!(probe.is_free("127.0.0.1", 8000));
        assert!(!PortProbe::is_free(&probe, "127.0.0.1", 8001));
    }
}
