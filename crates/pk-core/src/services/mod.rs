pub mod allocator;
pub mod atomic;
pub mod config_loader;
pub mod env_file;
pub mod gc;
pub mod json_config;
pub mod lock;
pub mod manager;
pub mod probe;
pub mod registry;
pub mod scope;

pub use gc::GcReport;
pub use lock::FileLock;
pub use manager::{ReservationManager, ReserveRequest};
pub use probe::{PortProbe, SystemProbe};
pub use registry::RegistryStore;
pub use scope::ReservationScope;
