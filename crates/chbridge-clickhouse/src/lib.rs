//! ClickHouse over its HTTP interface, as a pipeline [`Connection`](chbridge_pipeline::Connection).

pub mod bind;
pub mod client;
pub mod config;
pub mod error;
pub mod rows;

pub use client::ClickHouseClient;
pub use config::{ClickHouseConfig, DEFAULT_PORT, DEFAULT_TIMEOUT_SECS};
pub use error::{ClientError, Result};
