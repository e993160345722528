use std::ops::{Deref, DerefMut};

use crate::error::Result;
use crate::models::Reservation;

use super::manager::ReservationManager;
use super::probe::PortProbe;

/// Reservations that are released when the scope ends.
///
/// Every handle is released exactly once, in allocation order, either by
/// [`close`](Self::close) or when the scope is dropped (including during
/// unwinding or an early `?` return).
pub struct ReservationScope<'m, P: PortProbe> {
    manager: &'m ReservationManager<P>,
    handles: Vec<Reservation>,
    closed: bool,
}

impl<'m, P: PortProbe> ReservationScope<'m, P> {
    pub(crate) fn new(manager: &'m ReservationManager<P>, handles: Vec<Reservation>) -> Self {
        Self {
            manager,
            handles,
            closed: false,
        }
    }

    pub fn ports(&self) -> Vec<u16> {
        self.handles.iter().map(Reservation::port).collect()
    }

    /// Release everything now and report the first failure.
    pub fn close(mut self) -> Result<()> {
        self.release_all()
    }

    fn release_all(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let mut first_error = None;
        for handle in &mut self.handles {
            if let Err(e) = self.manager.release(handle) {
                tracing::warn!(port = handle.port(), error = %e, "scoped_release_failed");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl<P: PortProbe> Deref for ReservationScope<'_, P> {
    type Target = [Reservation];

    fn deref(&self) -> &Self::Target {
        &self.handles
    }
}

impl<P: PortProbe> DerefMut for ReservationScope<'_, P> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.handles
    }
}

impl<P: PortProbe> Drop for ReservationScope<'_, P> {
    fn drop(&mut self) {
        // Failures were already logged per handle.
        let _ = self.release_all();
    }
}
