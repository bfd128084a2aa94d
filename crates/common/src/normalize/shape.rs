//! Shape validation: generic JSON value to `AuditReport`

use crate::audit::{AuditReport, TOP_LEVEL_FIELDS};
use crate::errors::{AppError, Result};
use serde_json::Value;
use std::collections::HashSet;

/// Validated report plus the number of claims that had to be discarded
pub(crate) struct Shaped {
    pub report: AuditReport,
    pub discarded_claims: usize,
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Check a parsed value against the report shape.
///
/// Missing lists default to empty. A value with none of the top-level fields
/// is rejected, as is any field of the wrong kind. When a top-level field
/// appears under both names, the canonical one is kept.
pub(crate) fn validate(value: Value) -> Result<Shaped> {
    let mut fields = match value {
        Value::Object(fields) => fields,
        other => {
            return Err(AppError::InvalidFormat {
                diagnostic: format!(
                    "expected a JSON object at the top level, found {}",
                    kind_of(&other)
                ),
            })
        }
    };

    for (canonical, legacy) in TOP_LEVEL_FIELDS {
        if fields.contains_key(canonical) && fields.remove(legacy).is_some() {
            tracing::warn!(field = canonical, ignored = legacy, "Report field given under both names");
        }
    }

    let present = TOP_LEVEL_FIELDS
        .iter()
        .any(|(canonical, legacy)| fields.contains_key(*canonical) || fields.contains_key(*legacy));
    if !present {
        let expected: Vec<&str> = TOP_LEVEL_FIELDS.iter().map(|(name, _)| *name).collect();
        return Err(AppError::InvalidFormat {
            diagnostic: format!("none of the report fields ({}) is present", expected.join(", ")),
        });
    }

    let mut report: AuditReport =
        serde_json::from_value(Value::Object(fields)).map_err(|e| AppError::InvalidFormat {
            diagnostic: e.to_string(),
        })?;

    let discarded_claims = retain_valid_claims(&mut report);

    Ok(Shaped {
        report,
        discarded_claims,
    })
}

/// Drop claims with blank statements or an id seen earlier
fn retain_valid_claims(report: &mut AuditReport) -> usize {
    let before = report.claims.len();
    let mut seen = HashSet::new();
    report
        .claims
        .retain(|claim| !claim.statement.trim().is_empty() && seen.insert(claim.id));
    before - report.claims.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_non_object_rejected() {
        let err = validate(json!([1, 2])).err().unwrap();
        match err {
            AppError::InvalidFormat { diagnostic } => assert!(diagnostic.contains("array")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_no_report_fields_rejected() {
        let err = validate(json!({ "answer": "I cannot access these URLs" })).err().unwrap();
        assert!(matches!(err, AppError::InvalidFormat { .. }));
    }

    #[test]
    fn test_single_missing_field_defaulted() {
        let shaped = validate(json!({ "verified_facts": [{ "index": 1, "content": "X" }] })).unwrap();
        assert_eq!(shaped.report.claims.len(), 1);
        assert!(shaped.report.publications.is_empty());
        assert!(shaped.report.synthesis.meta_notes.is_empty());
    }

    #[test]
    fn test_invalid_claims_discarded() {
        let shaped = validate(json!({
            "verified_facts": [
                { "index": 1, "content": "First" },
                { "index": 2, "content": "   " },
                { "index": 1, "content": "Duplicate id" },
                { "index": 3, "content": "Third" }
            ]
        }))
        .unwrap();
        let ids: Vec<i64> = shaped.report.claims.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(shaped.discarded_claims, 2);
    }

    #[test]
    fn test_claims_without_statement_discarded() {
        let shaped = validate(json!({
            "verified_facts": [
                { "index": 1 },
                { "index": 2, "content": null },
                { "index": 3, "content": "Kept" }
            ]
        }))
        .unwrap();
        assert_eq!(shaped.report.claims.len(), 1);
        assert_eq!(shaped.report.claims[0].id, 3);
        assert_eq!(shaped.discarded_claims, 2);
    }

    #[test]
    fn test_mixed_vocabularies_keep_canonical() {
        let shaped = validate(json!({
            "verified_facts": [{ "index": 1, "content": "Canonical" }],
            "facts": [{ "id": 9, "statement": "Legacy" }],
            "outlets": []
        }))
        .unwrap();
        assert_eq!(shaped.report.claims.len(), 1);
        assert_eq!(shaped.report.claims[0].statement, "Canonical");
        assert!(shaped.report.publications.is_empty());
    }

    #[test]
    fn test_wrong_kind_rejected() {
        let err = validate(json!({ "verified_facts": {}, "publications": [] })).err().unwrap();
        assert!(matches!(err, AppError::InvalidFormat { .. }));
    }
}
