//! Outward-facing pieces of the running controller: status publishing and health checks.

pub mod health;
pub mod status;
