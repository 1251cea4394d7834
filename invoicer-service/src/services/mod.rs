//! Services module for invoicer-service.

pub mod database;
pub mod metrics;
pub mod stock;
pub mod sync;

pub use database::Database;
pub use metrics::{get_metrics, init_metrics};
