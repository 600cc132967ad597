//! The grounded-answer prompt.

/// Answer the model is told to give when the context does not contain one.
pub const REFUSAL_ANSWER: &str =
    "I do not have enough information in the provided context to answer this question.";

const DEFAULT_TEMPLATE: &str = r#"You are a helpful financial analyst assistant for CrediTrust. Your task is to answer questions about customer complaints based ONLY on the provided context.

Follow these rules:
1.  Synthesize an answer directly from the information given in the "CONTEXT" section.
2.  Do not use any outside knowledge or make up information.
3.  If the context does not contain the answer to the question, you MUST state: "{refusal}"
4.  Quote or reference specific parts of the context to support your answer where possible.

CONTEXT:
---
{context}
---

QUESTION:
{question}

ANSWER:
"#;

/// Renders questions and retrieved sources into a generator prompt.
///
/// The template holds three placeholders: `{context}`, `{question}` and
/// `{refusal}`. Sources are inserted verbatim, nearest first, separated by a
/// blank line. Rendering is deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self { template: DEFAULT_TEMPLATE.to_string() }
    }
}

impl PromptTemplate {
    /// Use a custom template string.
    pub fn new(template: impl Into<String>) -> Self {
        Self { template: template.into() }
    }

    /// The raw template.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Render the prompt for `question` over `sources`.
    pub fn render<S: AsRef<str>>(&self, question: &str, sources: &[S]) -> String {
        let context = sources.iter().map(|s| s.as_ref()).collect::<Vec<&str>>().join("\n\n");
        // single pass: substituted text is never scanned for placeholders
        let mut out = String::with_capacity(self.template.len() + context.len() + question.len());
        let mut rest = self.template.as_str();
        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let tail = &rest[start..];
            let (value, consumed) = if tail.starts_with("{context}") {
                (context.as_str(), "{context}".len())
            } else if tail.starts_with("{question}") {
                (question, "{question}".len())
            } else if tail.starts_with("{refusal}") {
                (REFUSAL_ANSWER, "{refusal}".len())
            } else {
                ("{", 1)
            };
            out.push_str(value);
            rest = &tail[consumed..];
        }
        out.push_str(rest);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn includes_refusal_instruction_and_sources_verbatim() {
        let prompt = PromptTemplate::default()
            .render("Why the fee?", &["Source {one} text.", "source two"]);
        assert!(prompt.contains(REFUSAL_ANSWER));
        assert!(prompt.contains("Source {one} text.\n\nsource two"));
        assert!(prompt.contains("QUESTION:\nWhy the fee?\n"));
        assert!(prompt.trim_end().ends_with("ANSWER:"));
    }

    #[test]
    fn empty_context_leaves_empty_block() {
        let prompt = PromptTemplate::default().render::<&str>("Anything?", &[]);
        assert!(prompt.contains("CONTEXT:\n---\n\n---"));
    }

    #[test]
    fn custom_template() {
        let template = PromptTemplate::new("Q={question} C={context} {other}");
        assert_eq!(template.render("q", &["a", "b"]), "Q=q C=a\n\nb {other}");
    }

    #[test]
    fn rendering_is_deterministic() {
        let template = PromptTemplate::default();
        assert_eq!(template.render("q", &["x"]), template.render("q", &["x"]));
    }
}
