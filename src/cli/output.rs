//! Output formatting for CLI commands.

#![allow(clippy::format_push_string)]

use serde::Serialize;

use crate::agent::PipelineState;
use crate::storage::Collection;

/// Output format selected with `--format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
    /// One compact JSON document per line.
    Ndjson,
}

impl OutputFormat {
    /// Parses a format name; unknown names fall back to text.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            "ndjson" | "jsonl" => Self::Ndjson,
            _ => Self::Text,
        }
    }

    /// Serializes `value` in this format's JSON flavour.
    pub fn to_json<T: Serialize + ?Sized>(self, value: &T) -> String {
        let rendered = match self {
            Self::Ndjson => serde_json::to_string(value),
            Self::Text | Self::Json => serde_json::to_string_pretty(value),
        };
        rendered.unwrap_or_else(|e| format!("{{\"error\": \"serialization failed: {e}\"}}"))
    }
}

/// Formats passage counts per collection.
pub fn format_status(counts: &[(Collection, usize)], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut output = String::from("Passages\n");
            for (collection, count) in counts {
                output.push_str(&format!("  {collection:<8} {count}\n"));
            }
            output
        }
        OutputFormat::Json | OutputFormat::Ndjson => {
            let map: serde_json::Map<String, serde_json::Value> = counts
                .iter()
                .map(|(c, n)| (c.as_str().to_string(), serde_json::Value::from(*n)))
                .collect();
            format.to_json(&serde_json::json!({ "passages": map }))
        }
    }
}

/// Formats a finished pipeline run.
///
/// Text output is the answer followed by a one-line trailer; `verbose`
/// appends the processing history.
pub fn format_answer(state: &PipelineState, verbose: bool, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut output = state.final_response.clone().unwrap_or_default();
            let strategy = state
                .retrieval_strategy
                .as_ref()
                .map_or_else(|| "-".to_string(), |s| format!("{}/{}", s.course_k, s.review_k));
            let passages = state.retrieved_info.as_ref().map_or(0, |r| r.len());
            output.push_str(&format!(
                "\n\n---\nStage: {} | Attempts: {} | Refinements: {} | Split: {strategy} | Passages: {passages}",
                state.stage,
                state.retrieval_iteration + 1,
                state.enhancement_iteration,
            ));
            if let Some(error) = &state.error {
                output.push_str(&format!("\nError: {error}"));
            }
            if verbose {
                for line in &state.processing_history {
                    output.push_str(&format!("\n  {line}"));
                }
            }
            output.push('\n');
            output
        }
        OutputFormat::Json | OutputFormat::Ndjson => format.to_json(state),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Stage;

    #[test]
    fn test_parse() {
        assert_eq!(OutputFormat::parse("json"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("ndjson"), OutputFormat::Ndjson);
        assert_eq!(OutputFormat::parse("yaml"), OutputFormat::Text);
    }

    #[test]
    fn test_ndjson_is_single_line() {
        let out = OutputFormat::Ndjson.to_json(&serde_json::json!({"a": [1, 2]}));
        assert!(!out.contains('\n'));
    }

    #[test]
    fn test_format_status_text() {
        let out = format_status(
            &[(Collection::Course, 12), (Collection::Review, 3)],
            OutputFormat::Text,
        );
        assert!(out.contains("course"));
        assert!(out.contains("12"));
    }

    #[test]
    fn test_format_answer_trailer() {
        let state = PipelineState {
            final_response: Some("It meets MWF.".to_string()),
            stage: Stage::ResponseGeneration,
            ..PipelineState::new("q")
        }
        .with_history("Validation: validation");
        let out = format_answer(&state, true, OutputFormat::Text);
        assert!(out.starts_with("It meets MWF."));
        assert!(out.contains("Attempts: 1"));
        assert!(out.contains("Validation: validation"));
    }
}
