use serde::Serialize;

use crate::models::{Registry, ReservationRecord};

use super::probe::PortProbe;

/// Outcome of one garbage-collection sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GcReport {
    pub removed: Vec<ReservationRecord>,
    pub kept: usize,
}

impl GcReport {
    pub fn removed_ports(&self) -> Vec<u16> {
        self.removed.iter().map(|r| r.port).collect()
    }
}

/// Drop every entry whose port probes free, on the theory that its owner
/// exited without releasing it.
///
/// This is a heuristic. An entry that is reserved but not yet bound by its
/// service also probes free and is evicted too.
pub fn sweep<P: PortProbe + ?Sized>(registry: &mut Registry, probe: &P) -> GcReport {
    let mut removed = Vec::new();
    registry.retain(|_, record| {
        let in_use = !probe.is_free(&record.host, record.port);
        if !in_use {
            removed.push(record.clone());
        }
        in_use
    });
    GcReport {
        removed,
        kept: registry.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(ports: &[u16]) -> Registry {
        ports
            .iter()
            .map(|&port| {
                let record = ReservationRecord::new("127.0.0.1", port, Some("gc-test"));
                (record.key(), record)
            })
            .collect()
    }

    #[test]
    fn drops_entries_that_probe_free() {
        let mut registry = registry_with(&[8000, 8001, 8002]);
        let probe = |_: &str, port: u16| port != 8001;

        let report = sweep(&mut registry, &probe);

        assert_eq!(report.removed_ports(), vec![8000, 8002]);
        assert_eq!(report.kept, 1);
        assert!(registry.contains_key("127.0.0.1:8001"));
    }

    #[test]
    fn busy_entries_survive() {
        let mut registry = registry_with(&[8000]);
        let report = sweep(&mut registry, &|_: &str, _: u16| false);
        assert!(report.removed.is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn empty_registry_is_a_no_op() {
        let mut registry = Registry::new();
        assert_eq!(sweep(&mut registry, &|_: &str, _: u16| true), GcReport::default());
    }
}
