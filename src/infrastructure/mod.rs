//! Infrastructure layer module
//!
//! Configuration loading and logging setup shared by every command.

pub mod config;
pub mod logging;
