pub mod cache;
pub mod health;

pub use cache::{call_batch, call_single, clear, configure, delete, metrics, set, warmup};
pub use health::health_check;
