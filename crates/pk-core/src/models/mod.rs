pub mod config;
pub mod port_range;
pub mod reservation;

pub use config::{CorruptRegistryPolicy, KeeperConfig, LockMethod};
pub use port_range::PortRange;
pub use reservation::{registry_key, Registry, Reservation, ReservationRecord};
