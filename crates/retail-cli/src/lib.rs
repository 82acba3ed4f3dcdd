//! Library side of the `retail-etl` binary.

pub mod config;
pub mod logging;
pub mod pipeline;
pub mod types;
