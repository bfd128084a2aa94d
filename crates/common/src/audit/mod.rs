//! Coverage audit: report model and the audit service

mod model;
mod service;

pub use model::*;
pub use service::{AuditOutcome, AuditSettings, Auditor};
