//! Response Normalizer - turns raw model text into an `AuditReport`
//!
//! Normalization is an ordered chain of stages:
//! 1. Preprocessors rewrite the text (fence stripping, truncation at the
//!    boundary between concatenated objects)
//! 2. Strict JSON parse
//! 3. Repairs, tried in order only when the strict parse fails
//! 4. Shape validation against the report model
//!
//! New heuristics are appended through [`NormalizerBuilder`] without touching
//! the earlier stages. The normalizer holds no per-call state.

mod shape;
mod stages;

pub use stages::{CloseMisbracketedArray, StripFences, TruncateAtConcatenation};

use crate::audit::AuditReport;
use crate::errors::{AppError, Result};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Text-to-text stage applied before parsing
pub trait Preprocessor: Send + Sync {
    /// Stable stage name for diagnostics and metrics
    fn name(&self) -> &'static str;

    /// Rewritten text, or `None` when the stage does not apply
    fn apply(&self, text: &str) -> Option<String>;
}

/// Targeted fix attempted after a failed strict parse
pub trait Repair: Send + Sync {
    /// Stable stage name for diagnostics and metrics
    fn name(&self) -> &'static str;

    /// Repaired text, or `None` when the failure signature is absent
    fn repair(&self, text: &str) -> Option<String>;
}

/// What normalization had to do to produce the report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizationDiagnostics {
    /// Preprocessors that changed the text, in order
    pub stages_applied: Vec<&'static str>,

    /// Repair that made the text parse, if one was needed
    pub repaired_by: Option<&'static str>,

    /// Claims dropped for a blank statement or a repeated id
    pub discarded_claims: usize,

    /// Framing entries referencing a claim id that does not exist
    pub dangling_references: usize,
}

/// A normalized report with its diagnostics
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub report: AuditReport,
    pub diagnostics: NormalizationDiagnostics,
}

/// Ordered chain of recovery stages
pub struct Normalizer {
    preprocessors: Vec<Box<dyn Preprocessor>>,
    repairs: Vec<Box<dyn Repair>>,
}

/// Builder for a [`Normalizer`]
pub struct NormalizerBuilder {
    preprocessors: Vec<Box<dyn Preprocessor>>,
    repairs: Vec<Box<dyn Repair>>,
}

impl NormalizerBuilder {
    /// Start from the default chain
    pub fn new() -> Self {
        Self {
            preprocessors: vec![Box::new(StripFences), Box::new(TruncateAtConcatenation)],
            repairs: vec![Box::new(CloseMisbracketedArray)],
        }
    }

    /// Start from an empty chain (strict parse and shape validation only)
    pub fn empty() -> Self {
        Self {
            preprocessors: Vec::new(),
            repairs: Vec::new(),
        }
    }

    /// Append a preprocessor after the existing ones
    pub fn preprocessor(mut self, stage: impl Preprocessor + 'static) -> Self {
        self.preprocessors.push(Box::new(stage));
        self
    }

    /// Append a repair after the existing ones
    pub fn repair(mut self, stage: impl Repair + 'static) -> Self {
        self.repairs.push(Box::new(stage));
        self
    }

    pub fn build(self) -> Normalizer {
        Normalizer {
            preprocessors: self.preprocessors,
            repairs: self.repairs,
        }
    }
}

impl Default for NormalizerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        NormalizerBuilder::new().build()
    }
}

impl fmt::Debug for Normalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Normalizer")
            .field("preprocessors", &self.preprocessor_names())
            .field("repairs", &self.repair_names())
            .finish()
    }
}

impl Normalizer {
    pub fn builder() -> NormalizerBuilder {
        NormalizerBuilder::new()
    }

    pub fn preprocessor_names(&self) -> Vec<&'static str> {
        self.preprocessors.iter().map(|s| s.name()).collect()
    }

    pub fn repair_names(&self) -> Vec<&'static str> {
        self.repairs.iter().map(|s| s.name()).collect()
    }

    /// Normalize raw model text.
    ///
    /// Absent or blank text fails with [`AppError::EmptyResponse`]; text that
    /// cannot be turned into a report fails with [`AppError::InvalidFormat`].
    pub fn normalize(&self, raw: Option<&str>) -> Result<Normalized> {
        let raw = raw
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AppError::EmptyResponse { reason: None })?;

        let mut diagnostics = NormalizationDiagnostics::default();
        let mut text = raw.to_string();

        for stage in &self.preprocessors {
            if let Some(next) = stage.apply(&text) {
                tracing::debug!(stage = stage.name(), before = text.len(), after = next.len(), "Preprocessor applied");
                diagnostics.stages_applied.push(stage.name());
                text = next;
            }
        }

        if text.trim().is_empty() {
            return Err(AppError::EmptyResponse {
                reason: Some("response contained only markup".to_string()),
            });
        }

        let (value, repaired_by) = self.parse(&text)?;
        diagnostics.repaired_by = repaired_by;

        let shaped = shape::validate(value)?;
        diagnostics.discarded_claims = shaped.discarded_claims;
        diagnostics.dangling_references = shaped.report.dangling_references();

        if diagnostics.discarded_claims > 0 {
            tracing::warn!(discarded = diagnostics.discarded_claims, "Discarded invalid claims");
        }

        Ok(Normalized {
            report: shaped.report,
            diagnostics,
        })
    }

    /// Strict parse, then each repair in order.
    ///
    /// On total failure the error carries the diagnostic of the first,
    /// unrepaired parse.
    fn parse(&self, text: &str) -> Result<(Value, Option<&'static str>)> {
        let original = match serde_json::from_str::<Value>(text) {
            Ok(value) => return Ok((value, None)),
            Err(e) => e,
        };

        for stage in &self.repairs {
            let Some(fixed) = stage.repair(text) else {
                continue;
            };
            match serde_json::from_str::<Value>(&fixed) {
                Ok(value) => {
                    tracing::info!(repair = stage.name(), "Model output repaired");
                    return Ok((value, Some(stage.name())));
                }
                Err(e) => {
                    tracing::debug!(repair = stage.name(), error = %e, "Repair did not produce valid JSON");
                }
            }
        }

        Err(AppError::InvalidFormat {
            diagnostic: original.to_string(),
        })
    }
}
