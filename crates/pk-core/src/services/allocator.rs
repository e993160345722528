use std::collections::HashSet;

use crate::models::{registry_key, PortRange, Registry};

use super::probe::PortProbe;

/// First port in `range` (ascending) that is not in `already_chosen`, has no
/// registry entry for `host`, and probes free. `None` means the pool is
/// exhausted.
///
/// Port 0 is never a candidate: binding it asks the OS for any port.
pub fn find_free<P: PortProbe + ?Sized>(
    range: PortRange,
    host: &str,
    registry: &Registry,
    already_chosen: &HashSet<u16>,
    probe: &P,
) -> Option<u16> {
    let range = PortRange::new(range.start, range.end);
    range
        .ports()
        .find(|&port| is_candidate(port, host, registry, already_chosen, probe))
}

/// `Some(preferred)` when that single port passes the same checks as a scan.
pub fn try_preferred<P: PortProbe + ?Sized>(
    preferred: u16,
    host: &str,
    registry: &Registry,
    already_chosen: &HashSet<u16>,
    probe: &P,
) -> Option<u16> {
    is_candidate(preferred, host, registry, already_chosen, probe).then_some(preferred)
}

fn is_candidate<P: PortProbe + ?Sized>(
    port: u16,
    host: &str,
    registry: &Registry,
    already_chosen: &HashSet<u16>,
    probe: &P,
) -> bool {
    port != 0
        && !already_chosen.contains(&port)
        && !registry.contains_key(&registry_key(host, port))
        && probe.is_free(host, port)
}

/// Picks ports one at a time for a batch, remembering what it already handed
/// out so the batch never contains a port twice before the registry is
/// updated.
pub struct PortAllocator<'a, P: ?Sized> {
    host: &'a str,
    registry: &'a Registry,
    probe: &'a P,
    chosen: HashSet<u16>,
    order: Vec<u16>,
}

impl<'a, P: PortProbe + ?Sized> PortAllocator<'a, P> {
    pub fn new(host: &'a str, registry: &'a Registry, probe: &'a P) -> Self {
        Self {
            host,
            registry,
            probe,
            chosen: HashSet::new(),
            order: Vec::new(),
        }
    }

    /// Try `preferred` first, then scan `range`.
    pub fn allocate(&mut self, preferred: Option<u16>, range: PortRange) -> Option<u16> {
        let port = preferred
            .and_then(|p| try_preferred(p, self.host, self.registry, &self.chosen, self.probe))
            .or_else(|| find_free(range, self.host, self.registry, &self.chosen, self.probe))?;
        self.chosen.insert(port);
        self.order.push(port);
        Some(port)
    }

    /// Ports handed out so far, in allocation order.
    pub fn chosen(&self) -> &[u16] {
        &self.order
    }

    pub fn into_chosen(self) -> Vec<u16> {
        self.order
    }
}
