use std::net::TcpListener;
use std::path::{Path, PathBuf};

use crate::error::{PortKeeperError, Result};
use crate::models::{
    registry_key, KeeperConfig, LockMethod, PortRange, Registry, Reservation, ReservationRecord,
};

use super::allocator::PortAllocator;
use super::gc::{self, GcReport};
use super::lock::FileLock;
use super::probe::{PortProbe, SystemProbe};
use super::registry::RegistryStore;
use super::scope::ReservationScope;

/// Parameters of one reserve transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReserveRequest {
    pub preferred: Option<u16>,
    pub range: Option<PortRange>,
    pub host: Option<String>,
    pub hold: bool,
    pub owner: Option<String>,
    pub count: usize,
}

impl Default for ReserveRequest {
    fn default() -> Self {
        Self {
            preferred: None,
            range: None,
            host: None,
            hold: false,
            owner: None,
            count: 1,
        }
    }
}

impl ReserveRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn preferred(mut self, port: u16) -> Self {
        self.preferred = Some(port);
        self
    }

    pub fn range(mut self, start: u16, end: u16) -> Self {
        self.range = Some(PortRange::new(start, end));
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn hold(mut self, hold: bool) -> Self {
        self.hold = hold;
        self
    }

    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }
}

/// Runs reserve, release and garbage-collection transactions against one
/// registry file, serialized across processes by the registry lock.
pub struct ReservationManager<P = SystemProbe> {
    store: RegistryStore,
    lock_path: PathBuf,
    lock_method: LockMethod,
    default_host: String,
    default_range: PortRange,
    probe: P,
}

impl ReservationManager<SystemProbe> {
    pub fn new(config: &KeeperConfig) -> Self {
        Self::with_probe(config, SystemProbe)
    }
}

impl<P: PortProbe> ReservationManager<P> {
    pub fn with_probe(config: &KeeperConfig, probe: P) -> Self {
        Self {
            store: RegistryStore::new(&config.registry_path).with_policy(config.corrupt_policy),
            lock_path: config.lock_path.clone(),
            lock_method: config.lock_method,
            default_host: config.default_host.clone(),
            default_range: config.default_range,
            probe,
        }
    }

    pub fn store(&self) -> &RegistryStore {
        &self.store
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    pub fn default_host(&self) -> &str {
        &self.default_host
    }

    /// Reserve `request.count` ports as one all-or-nothing commit.
    ///
    /// Handles come back in allocation order. If any slot cannot be filled
    /// the registry is left untouched and `PoolExhausted` is returned. Holds
    /// are attempted after the lock is released; a failed hold only leaves
    /// that handle unheld.
    pub fn reserve(&self, request: &ReserveRequest) -> Result<Vec<Reservation>> {
        if request.count == 0 {
            return Ok(Vec::new());
        }
        let host = request.host.as_deref().unwrap_or(&self.default_host);
        let range = request.range.unwrap_or(self.default_range);

        let ports = self.transact(|registry| {
            let mut allocator = PortAllocator::new(host, registry, &self.probe);
            for _ in 0..request.count {
                if allocator.allocate(request.preferred, range).is_none() {
                    tracing::debug!(
                        host,
                        %range,
                        requested = request.count,
                        found = allocator.chosen().len(),
                        "pool_exhausted"
                    );
                    return Err(PortKeeperError::PoolExhausted {
                        start: range.start,
                        end: range.end,
                    });
                }
            }
            let ports = allocator.into_chosen();
            for &port in &ports {
                let record = ReservationRecord::new(host, port, request.owner.as_deref());
                registry.insert(record.key(), record);
            }
            Ok((ports, true))
        })?;
        tracing::debug!(host, ports = ?ports, "ports_reserved");

        let mut handles: Vec<Reservation> = ports
            .into_iter()
            .map(|port| Reservation::new(host, port))
            .collect();
        if request.hold {
            for handle in &mut handles {
                hold(handle);
            }
        }
        Ok(handles)
    }

    /// Reserve exactly one port, ignoring `request.count`.
    pub fn reserve_one(&self, request: &ReserveRequest) -> Result<Reservation> {
        let request = ReserveRequest {
            count: 1,
            ..request.clone()
        };
        self.reserve(&request)?
            .pop()
            .ok_or_else(|| PortKeeperError::Registry("reserve returned no reservation".into()))
    }

    /// Reserve and wrap the handles in a guard that releases them on exit.
    pub fn scoped(&self, request: &ReserveRequest) -> Result<ReservationScope<'_, P>> {
        let handles = self.reserve(request)?;
        Ok(ReservationScope::new(self, handles))
    }

    /// Run `f` with freshly reserved handles and release them afterwards,
    /// whether `f` returns normally or unwinds.
    pub fn with_reservations<T, F>(&self, request: &ReserveRequest, f: F) -> Result<T>
    where
        F: FnOnce(&mut [Reservation]) -> T,
    {
        let mut scope = self.scoped(request)?;
        let out = f(&mut scope[..]);
        scope.close()?;
        Ok(out)
    }

    /// Remove the handle's registry entry and close its held socket.
    /// Releasing twice is a no-op.
    pub fn release(&self, handle: &mut Reservation) -> Result<()> {
        let result = self.remove_key(&handle.key());
        if handle.close_holder() {
            tracing::debug!(port = handle.port(), "hold_closed");
        }
        result.map(|_| ())
    }

    /// Registry-only release by address, for callers that do not own the
    /// handle. Returns whether an entry was removed.
    pub fn release_port(&self, host: &str, port: u16) -> Result<bool> {
        self.remove_key(&registry_key(host, port))
    }

    /// Consistent snapshot of the registry, read under the lock.
    pub fn status(&self) -> Result<Registry> {
        self.transact(|registry| Ok((registry.clone(), false)))
    }

    /// Drop entries whose port is no longer bound by anyone.
    pub fn collect_garbage(&self) -> Result<GcReport> {
        let report = self.transact(|registry| {
            let report = gc::sweep(registry, &self.probe);
            let dirty = !report.removed.is_empty();
            Ok((report, dirty))
        })?;
        if !report.removed.is_empty() {
            tracing::info!(
                removed = ?report.removed_ports(),
                kept = report.kept,
                "stale_reservations_collected"
            );
        }
        Ok(report)
    }

    fn remove_key(&self, key: &str) -> Result<bool> {
        let removed = self.transact(|registry| {
            let removed = registry.remove(key).is_some();
            Ok((removed, removed))
        })?;
        tracing::debug!(key, removed, "reservation_released");
        Ok(removed)
    }

    /// Lock, read, apply `f`, and persist when `f` reports a change. `f`
    /// returning an error aborts without writing.
    fn transact<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Registry) -> Result<(T, bool)>,
    {
        let lock = FileLock::acquire(&self.lock_path, self.lock_method)?;
        self.store.ensure_exists()?;
        let mut registry = self.store.read()?;
        let (out, dirty) = f(&mut registry)?;
        if dirty {
            self.store.write(&registry)?;
        }
        lock.release()?;
        Ok(out)
    }
}

/// Bind and listen on the reserved port so nobody else can take it.
fn hold(handle: &mut Reservation) {
    match TcpListener::bind((handle.host(), handle.port())) {
        Ok(listener) => {
            handle.attach_holder(listener);
            tracing::debug!(port = handle.port(), "port_held");
        }
        Err(e) => {
            tracing::warn!(
                host = handle.host(),
                port = handle.port(),
                error = %e,
                "hold_failed"
            );
        }
    }
}
