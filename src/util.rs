mod caches;
mod shutdown_signal;
mod wrapper;

pub use caches::Caches;
pub use shutdown_signal::shutdown_signal;
pub use wrapper::{NotFound, Wrapper};
