//! Prompt Builder - the instruction and schema contract sent to the model
//!
//! Provides:
//! - A fixed analyst persona with hard constraints
//! - A task instruction embedding the article URLs
//! - An optional formal schema for constrained decoding
//!
//! Output is a pure function of the URLs and options, so prompts are
//! reproducible.

mod schema;

pub use schema::audit_report_schema;

use crate::errors::{AppError, Result};
use serde::Serialize;
use serde_json::Value;

const SYSTEM_INSTRUCTION: &str = "\
You are a forensic media analyst comparing how different news outlets report the same event.
You MUST strictly separate (1) bare, verifiable facts from (2) each outlet's framing of those facts and (3) a neutral synthesis of the coverage.
Respect copyright: never quote at length or copy exact wording. Paraphrase concisely.
Output ONLY the required JSON structure. No preamble, no commentary, no markdown.";

const VERIFICATION_WITH_SEARCH: &str =
    "Use web search to access the provided articles or the stories they report, and to verify facts externally.";

const VERIFICATION_WITHOUT_SEARCH: &str =
    "Verify facts against every source you can access; say nothing you cannot attribute to a source.";

const TASKS: &str = "\
Your tasks:

1. FACTUAL BASELINE
   - Extract only directly reported, verifiable facts (who, what, when, where, official numbers or statements).
   - Do NOT include motives, opinions, predictions, emotional adjectives, or speculation.
   - Number every fact with a unique integer index.

2. NARRATIVE LAYERS (PER OUTLET)
   - For each outlet, explain how it frames each fact, referencing the fact by its index.
   - Note who is blamed or defended and which actors are emphasized or downplayed.
   - List notable word choices or recurring terms, paraphrased briefly.

3. COMPARATIVE SYNTHESIS
   - Summarize the main clusters of viewpoints in a neutral tone.
   - Distinguish areas of agreement on facts from areas of divergence in interpretation.
   - Add meta observations about the coverage itself.";

const FORMAT: &str = r#"OUTPUT FORMAT (VERY IMPORTANT):
Return STRICTLY valid JSON. Close every array with ']' and every object with '}'.
Return exactly one JSON object. Do not add any text before or after it.

Structure:
{
  "verified_facts": [ { "index": 1, "content": "..." } ],
  "publications": [
    {
      "publisher": "Outlet name",
      "source_url": "Original URL provided",
      "political_alignment": "left | center-left | center | center-right | right | unclear",
      "narratives": [
        { "fact_id": 1, "framing_narrative": "...", "pivotal_terms": ["..."] }
      ]
    }
  ],
  "synthesis": {
    "consensus_points": ["..."],
    "divergent_perspectives": ["..."],
    "analytical_meta_notes": ["..."]
  }
}"#;

/// Prompt builder options
#[derive(Debug, Clone, Default)]
pub struct PromptOptions {
    /// The model will have web search available
    pub web_search: bool,

    /// Attach the formal schema as a decoding constraint
    pub constrained_decoding: bool,
}

/// A complete prompt for one audit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditPrompt {
    /// Persona and hard constraints
    pub system_instruction: String,

    /// Task instruction embedding the URLs
    pub user_content: String,

    /// Formal schema, when constrained decoding is enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,

    /// The URLs actually embedded, trimmed, blanks removed
    pub urls: Vec<String>,
}

/// Builds audit prompts
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    options: PromptOptions,
}

impl PromptBuilder {
    pub fn new(options: PromptOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PromptOptions {
        &self.options
    }

    /// Build the prompt for a set of article URLs.
    ///
    /// Blank entries are ignored. Fails with [`AppError::NoUrls`] when no
    /// URL remains; never fails otherwise.
    pub fn build<S: AsRef<str>>(&self, urls: &[S]) -> Result<AuditPrompt> {
        let urls: Vec<String> = urls
            .iter()
            .map(|u| u.as_ref().trim())
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .collect();

        if urls.is_empty() {
            return Err(AppError::NoUrls);
        }

        Ok(AuditPrompt {
            system_instruction: self.system_instruction(),
            user_content: Self::user_content(&urls),
            response_schema: self
                .options
                .constrained_decoding
                .then(audit_report_schema),
            urls,
        })
    }

    fn system_instruction(&self) -> String {
        let verification = if self.options.web_search {
            VERIFICATION_WITH_SEARCH
        } else {
            VERIFICATION_WITHOUT_SEARCH
        };
        format!("{}\n{}", SYSTEM_INSTRUCTION, verification)
    }

    fn user_content(urls: &[String]) -> String {
        let mut content = String::from(
            "Analyze the news coverage of the event reported at these URLs:\n",
        );
        for url in urls {
            content.push_str("- ");
            content.push_str(url);
            content.push('\n');
        }
        content.push('\n');
        content.push_str(TASKS);
        content.push_str("\n\n");
        content.push_str(FORMAT);
        content
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls() -> Vec<String> {
        vec![
            "https://a.example/story".to_string(),
            "https://b.example/story".to_string(),
        ]
    }

    #[test]
    fn test_empty_urls_rejected() {
        let builder = PromptBuilder::default();
        let empty: Vec<String> = Vec::new();
        assert!(matches!(builder.build(&empty), Err(AppError::NoUrls)));
        assert!(matches!(builder.build(&["", "   "]), Err(AppError::NoUrls)));
    }

    #[test]
    fn test_urls_embedded_in_order() {
        let prompt = PromptBuilder::default().build(&urls()).unwrap();
        let a = prompt.user_content.find("- https://a.example/story").unwrap();
        let b = prompt.user_content.find("- https://b.example/story").unwrap();
        assert!(a < b);
        assert_eq!(prompt.urls, urls());
    }

    #[test]
    fn test_blank_entries_dropped_and_trimmed() {
        let prompt = PromptBuilder::default()
            .build(&["  https://a.example/story ", "", "\t"])
            .unwrap();
        assert_eq!(prompt.urls, vec!["https://a.example/story"]);
        assert!(prompt.user_content.contains("- https://a.example/story\n"));
    }

    #[test]
    fn test_deterministic() {
        let builder = PromptBuilder::new(PromptOptions {
            web_search: true,
            constrained_decoding: true,
        });
        assert_eq!(builder.build(&urls()).unwrap(), builder.build(&urls()).unwrap());
    }

    #[test]
    fn test_system_instruction_constraints() {
        let prompt = PromptBuilder::new(PromptOptions {
            web_search: true,
            constrained_decoding: false,
        })
        .build(&urls())
        .unwrap();
        let system = &prompt.system_instruction;
        assert!(system.contains("separate"));
        assert!(system.contains("Paraphrase"));
        assert!(system.contains("web search"));
        assert!(system.contains("Output ONLY"));
    }

    #[test]
    fn test_schema_only_when_constrained() {
        let plain = PromptBuilder::default().build(&urls()).unwrap();
        assert!(plain.response_schema.is_none());

        let constrained = PromptBuilder::new(PromptOptions {
            web_search: false,
            constrained_decoding: true,
        })
        .build(&urls())
        .unwrap();
        assert_eq!(constrained.response_schema, Some(audit_report_schema()));
    }
}
