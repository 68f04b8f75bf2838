//! Support code for the `chbridge` binary: config loading, logging setup and
//! result rendering.

pub mod config;
pub mod logging;
pub mod render;
