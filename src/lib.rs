mod config;
mod handler;
pub mod models;
pub mod rib;
mod router;
pub mod session;
mod utils;

pub use config::{ConfigError, NeighborConfig, RouterConfig};
pub use handler::{run, serve};
pub use router::{Outbound, Router};
