//! Formal response schema for constrained decoding
//!
//! Uses the OpenAPI subset accepted by the Gemini `responseSchema` field.
//! Property names are the canonical wire names of [`AuditReport`].
//!
//! [`AuditReport`]: crate::audit::AuditReport

use serde_json::{json, Value};

fn string() -> Value {
    json!({ "type": "STRING" })
}

fn string_list() -> Value {
    json!({ "type": "ARRAY", "items": string() })
}

fn claim() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "index": { "type": "INTEGER" },
            "content": string()
        },
        "required": ["index", "content"],
        "propertyOrdering": ["index", "content"]
    })
}

fn framing_entry() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "fact_id": { "type": "INTEGER" },
            "framing_narrative": string(),
            "pivotal_terms": string_list()
        },
        "required": ["fact_id", "framing_narrative", "pivotal_terms"],
        "propertyOrdering": ["fact_id", "framing_narrative", "pivotal_terms"]
    })
}

fn publication() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "publisher": string(),
            "source_url": string(),
            "political_alignment": string(),
            "narratives": { "type": "ARRAY", "items": framing_entry() }
        },
        "required": ["publisher", "source_url", "political_alignment", "narratives"],
        "propertyOrdering": ["publisher", "source_url", "political_alignment", "narratives"]
    })
}

fn synthesis() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "consensus_points": string_list(),
            "divergent_perspectives": string_list(),
            "analytical_meta_notes": string_list()
        },
        "required": ["consensus_points", "divergent_perspectives", "analytical_meta_notes"],
        "propertyOrdering": ["consensus_points", "divergent_perspectives", "analytical_meta_notes"]
    })
}

/// Schema describing a complete audit report
pub fn audit_report_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "verified_facts": { "type": "ARRAY", "items": claim() },
            "publications": { "type": "ARRAY", "items": publication() },
            "synthesis": synthesis()
        },
        "required": ["verified_facts", "publications", "synthesis"],
        "propertyOrdering": ["verified_facts", "publications", "synthesis"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::TOP_LEVEL_FIELDS;

    #[test]
    fn test_schema_requires_all_top_level_fields() {
        let schema = audit_report_schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        let canonical: Vec<&str> = TOP_LEVEL_FIELDS.iter().map(|(name, _)| *name).collect();
        assert_eq!(required, canonical);
    }

    #[test]
    fn test_schema_nesting() {
        let schema = audit_report_schema();
        let narratives = &schema["properties"]["publications"]["items"]["properties"]["narratives"];
        assert_eq!(narratives["type"], "ARRAY");
        assert_eq!(narratives["items"]["properties"]["fact_id"]["type"], "INTEGER");
        assert_eq!(
            schema["properties"]["synthesis"]["properties"]["analytical_meta_notes"]["items"]["type"],
            "STRING"
        );
    }
}
