pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod service;

pub use error::{ApiError, Result};
pub use router::create_router;
pub use server::run_server;
pub use service::{OrderSource, RevenueService};
