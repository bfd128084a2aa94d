//! API handlers module

pub mod audits;
pub mod health;
