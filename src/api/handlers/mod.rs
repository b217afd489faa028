pub mod config;
pub mod dlq;
pub mod health;
pub mod metrics;
pub mod trades;
