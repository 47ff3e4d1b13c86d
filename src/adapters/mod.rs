//! Adapters implementing the domain ports.

pub mod backends;
pub mod descriptor;
pub mod journal;
