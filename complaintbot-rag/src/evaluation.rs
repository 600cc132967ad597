//! Qualitative evaluation over a fixed question set.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::RagError;
use crate::pipeline::RagPipeline;

/// Questions covering the main product lines in the complaint dataset.
pub const DEFAULT_EVALUATION_QUESTIONS: [&str; 5] = [
    "Why are people unhappy with the Buy Now, Pay Later (BNPL) service?",
    "What are the most common complaints about credit card billing disputes?",
    "Are there any recurring issues with money transfers being delayed?",
    "What problems are customers facing when trying to close their savings accounts?",
    "Describe a situation where a customer was wrongly charged for a personal loan.",
];

/// Number of sources shown per row in the Markdown table.
const SOURCES_PER_ROW: usize = 2;
/// Characters of each source shown in the Markdown table.
const SOURCE_PREVIEW_CHARS: usize = 150;

/// Result of asking one evaluation question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRow {
    /// The question asked.
    pub question: String,
    /// The generated answer, if the pipeline produced one.
    pub answer: Option<String>,
    /// Retrieved chunk texts, nearest first.
    pub sources: Vec<String>,
    /// Error text if the question failed.
    pub error: Option<String>,
}

/// Ask every question in turn.
///
/// A failing question is recorded in its row and does not stop the others.
/// Sources retrieved before a generation failure are kept.
pub async fn evaluate<S: AsRef<str>>(
    pipeline: &RagPipeline,
    questions: &[S],
) -> Vec<EvaluationRow> {
    let mut rows = Vec::with_capacity(questions.len());
    for question in questions {
        let question = question.as_ref();
        let row = match pipeline.answer(question).await {
            Ok(answer) => EvaluationRow {
                question: question.to_string(),
                answer: Some(answer.answer),
                sources: answer.sources,
                error: None,
            },
            Err(RagError::GenerationFailed { sources, source }) => {
                warn!(question, error = %source, "evaluation question failed during generation");
                EvaluationRow {
                    question: question.to_string(),
                    answer: None,
                    sources,
                    error: Some(source.to_string()),
                }
            }
            Err(e) => {
                warn!(question, error = %e, "evaluation question failed");
                EvaluationRow {
                    question: question.to_string(),
                    answer: None,
                    sources: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        };
        rows.push(row);
    }
    rows
}

fn cell(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ").replace('|', "\\|")
}

/// Shorten `text` to `max_chars` characters, marking the cut with `...`.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}

/// Render rows as a Markdown table with empty score and comment columns for
/// a reviewer to fill in.
pub fn render_markdown(rows: &[EvaluationRow]) -> String {
    let mut out = String::from(
        "| # | Question | Generated Answer | Retrieved Sources | Quality Score (1-5) | Comments/Analysis |\n\
         |---|----------|------------------|-------------------|---------------------|-------------------|\n",
    );
    for (i, row) in rows.iter().enumerate() {
        let answer = match (&row.answer, &row.error) {
            (Some(answer), _) => cell(answer),
            (None, Some(error)) => format!("_error: {}_", cell(error)),
            (None, None) => String::new(),
        };
        let sources = if row.sources.is_empty() {
            "_no sources retrieved_".to_string()
        } else {
            row.sources
                .iter()
                .take(SOURCES_PER_ROW)
                .enumerate()
                .map(|(j, s)| format!("{}. {}", j + 1, cell(&preview(s, SOURCE_PREVIEW_CHARS))))
                .collect::<Vec<_>>()
                .join("<br>")
        };
        out.push_str(&format!(
            "| {} | {} | {} | {} |  |  |\n",
            i + 1,
            cell(&row.question),
            answer,
            sources
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_escapes_pipes_and_flattens_newlines() {
        let rows = vec![EvaluationRow {
            question: "a | b?".into(),
            answer: Some("line one\nline two".into()),
            sources: vec!["src".into()],
            error: None,
        }];
        let table = render_markdown(&rows);
        assert!(table.contains("| 1 | a \\| b? | line one line two | 1. src |  |  |"));
        assert_eq!(table.lines().count(), 3);
    }

    #[test]
    fn markdown_marks_errors_and_missing_sources() {
        let rows = vec![EvaluationRow {
            question: "q".into(),
            answer: None,
            sources: vec![],
            error: Some("boom".into()),
        }];
        let table = render_markdown(&rows);
        assert!(table.contains("_error: boom_"));
        assert!(table.contains("_no sources retrieved_"));
    }

    #[test]
    fn long_sources_are_previewed() {
        let long = "x".repeat(200);
        assert_eq!(preview(&long, 150).chars().count(), 153);
        assert_eq!(preview("short", 150), "short");
        assert_eq!(preview("ééééé", 3), "ééé...");
    }
}
