//! CLI command implementations

pub mod audit;
pub mod batch;
pub mod definition;
pub mod deploy;
