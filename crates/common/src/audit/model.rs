//! Audit report model
//!
//! Serialized field names follow the canonical wire vocabulary
//! (`verified_facts`, `publications`, `synthesis`). The older vocabulary
//! (`facts`, `outlets`, `perspective_summary`) is accepted on input.

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Number;
use std::borrow::Cow;
use std::collections::HashSet;

/// Alignment label used when the model does not give one
pub const UNCLEAR_ALIGNMENT: &str = "unclear";

/// Fallback label for citations without a title
pub const UNTITLED_CITATION: &str = "External Source";

/// Top-level fields of a report, as (canonical, legacy) wire names
pub const TOP_LEVEL_FIELDS: [(&str, &str); 3] = [
    ("verified_facts", "facts"),
    ("publications", "outlets"),
    ("synthesis", "perspective_summary"),
];

/// One atomic, verifiable fact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    /// Unique within a report
    #[serde(rename = "index", alias = "id", deserialize_with = "integral_id")]
    pub id: i64,

    /// Blank when the model omitted it; such claims are discarded
    #[serde(
        rename = "content",
        alias = "statement",
        default,
        deserialize_with = "null_as_default"
    )]
    pub statement: String,
}

/// One publication's framing of a specific claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FramingEntry {
    /// May be absent or reference a claim that does not exist
    #[serde(
        rename = "fact_id",
        default,
        deserialize_with = "optional_integral_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub referenced_claim_id: Option<i64>,

    #[serde(
        rename = "framing_narrative",
        alias = "how_they_spin_it",
        default,
        deserialize_with = "null_as_default"
    )]
    pub framing_narrative: String,

    #[serde(
        rename = "pivotal_terms",
        alias = "notable_language",
        default,
        deserialize_with = "null_as_default"
    )]
    pub notable_terms: Vec<String>,
}

/// Coverage of the event by one outlet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationReport {
    #[serde(rename = "publisher", alias = "name")]
    pub publisher_name: String,

    #[serde(rename = "source_url", alias = "url")]
    pub source_url: String,

    /// Free-form label such as "left", "center-right" or "unclear"
    #[serde(
        rename = "political_alignment",
        alias = "claimed_leaning",
        default = "unclear_alignment",
        deserialize_with = "alignment_or_unclear"
    )]
    pub claimed_alignment: String,

    #[serde(
        rename = "narratives",
        alias = "interpretations",
        default,
        deserialize_with = "null_as_default"
    )]
    pub framing_entries: Vec<FramingEntry>,
}

/// Cross-publication roll-up
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Synthesis {
    #[serde(
        rename = "consensus_points",
        alias = "areas_of_agreement",
        default,
        deserialize_with = "null_as_default"
    )]
    pub consensus_points: Vec<String>,

    #[serde(
        rename = "divergent_perspectives",
        alias = "areas_of_disagreement",
        default,
        deserialize_with = "null_as_default"
    )]
    pub divergent_points: Vec<String>,

    #[serde(
        rename = "analytical_meta_notes",
        alias = "meta_observations",
        default,
        deserialize_with = "null_as_default"
    )]
    pub meta_notes: Vec<String>,
}

/// Root aggregate produced by one audit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    #[serde(
        rename = "verified_facts",
        alias = "facts",
        default,
        deserialize_with = "null_as_default"
    )]
    pub claims: Vec<Claim>,

    #[serde(
        rename = "publications",
        alias = "outlets",
        default,
        deserialize_with = "null_as_default"
    )]
    pub publications: Vec<PublicationReport>,

    #[serde(
        rename = "synthesis",
        alias = "perspective_summary",
        default,
        deserialize_with = "null_as_default"
    )]
    pub synthesis: Synthesis,
}

/// A framing entry paired with its publication and baseline claim
#[derive(Debug, Clone, Copy)]
pub struct ResolvedFraming<'a> {
    pub publication: &'a PublicationReport,
    pub entry: &'a FramingEntry,
    /// `None` means no baseline is available
    pub baseline: Option<&'a Claim>,
}

/// Source attribution returned alongside the model's answer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

fn unclear_alignment() -> String {
    UNCLEAR_ALIGNMENT.to_string()
}

fn alignment_or_unclear<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .filter(|label| !label.trim().is_empty())
        .unwrap_or_else(unclear_alignment))
}

/// Integer value of a JSON number, accepting integral floats such as `1.0`
fn integral(number: &Number) -> Option<i64> {
    number.as_i64().or_else(|| {
        number
            .as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
            .map(|f| f as i64)
    })
}

fn integral_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let number = Number::deserialize(deserializer)?;
    integral(&number)
        .ok_or_else(|| de::Error::custom(format!("expected an integer id, found {number}")))
}

fn optional_integral_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Number>::deserialize(deserializer)? {
        None => Ok(None),
        Some(number) => integral(&number).map(Some).ok_or_else(|| {
            de::Error::custom(format!("expected an integer claim id, found {number}"))
        }),
    }
}

/// Treat an explicit `null` the same as a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Claim {
    /// Short quote of the statement, at most `max_chars` characters.
    /// The ellipsis is dropped when it would not fit.
    pub fn excerpt(&self, max_chars: usize) -> Cow<'_, str> {
        if self.statement.chars().count() <= max_chars {
            return Cow::Borrowed(&self.statement);
        }
        if max_chars < 3 {
            return Cow::Owned(self.statement.chars().take(max_chars).collect());
        }
        let mut short: String = self
            .statement
            .chars()
            .take(max_chars.saturating_sub(3))
            .collect();
        short.push_str("...");
        Cow::Owned(short)
    }
}

impl AuditReport {
    /// Look up the claim with the given id
    pub fn claim(&self, id: i64) -> Option<&Claim> {
        self.claims.iter().find(|c| c.id == id)
    }

    /// Pair every framing entry with its baseline claim, in report order
    pub fn resolve_framing(&self) -> Vec<ResolvedFraming<'_>> {
        self.publications
            .iter()
            .flat_map(|publication| {
                publication.framing_entries.iter().map(move |entry| ResolvedFraming {
                    publication,
                    entry,
                    baseline: entry.referenced_claim_id.and_then(|id| self.claim(id)),
                })
            })
            .collect()
    }

    /// Number of framing entries with a missing claim id or one that matches no claim
    pub fn dangling_references(&self) -> usize {
        let known: HashSet<i64> = self.claims.iter().map(|c| c.id).collect();
        self.publications
            .iter()
            .flat_map(|p| &p.framing_entries)
            .filter(|e| e.referenced_claim_id.map_or(true, |id| !known.contains(&id)))
            .count()
    }
}

impl CitationReference {
    pub fn new(uri: Option<String>, title: Option<String>) -> Self {
        Self { uri, title }
    }

    /// A citation without a usable uri cannot be linked
    pub fn is_displayable(&self) -> bool {
        self.uri.as_deref().is_some_and(|u| !u.trim().is_empty())
    }

    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(UNTITLED_CITATION)
    }
}
