//! Framecheck Common Library
//!
//! Shared code for the framecheck services including:
//! - Audit report model and the audit service
//! - Prompt building and response normalization
//! - Generative model client abstraction
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod audit;
pub mod config;
pub mod errors;
pub mod llm;
pub mod metrics;
pub mod normalize;
pub mod prompt;

// Re-export commonly used types
pub use audit::{AuditOutcome, AuditReport, Auditor, CitationReference};
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use llm::GenerativeModel;
pub use normalize::Normalizer;
pub use prompt::PromptBuilder;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
