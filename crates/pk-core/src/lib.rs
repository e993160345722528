//! Port reservations shared between local processes through a file-backed
//! registry.

pub mod error;
pub mod models;
pub mod services;

pub use error::{PortKeeperError, Result};
pub use models::{KeeperConfig, PortRange, Reservation, ReservationRecord};
pub use services::{ReservationManager, ReserveRequest};
