//! Text generation backends.

use async_trait::async_trait;
use tracing::debug;

use crate::error::{RagError, Result};

/// A model that turns a prompt into text.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Clone)]
enum MockMode {
    Fixed(String),
    Echo,
    Failing(String),
}

/// A deterministic [`Generator`] for tests and offline runs.
///
/// - [`fixed`](Self::fixed) always answers with the same text.
/// - [`echo`](Self::echo) answers with the prompt itself.
/// - [`failing`](Self::failing) always fails with [`RagError::Generation`].
#[derive(Debug, Clone)]
pub struct MockGenerator {
    mode: MockMode,
}

impl MockGenerator {
    /// Always answer `response`.
    pub fn fixed(response: impl Into<String>) -> Self {
        Self { mode: MockMode::Fixed(response.into()) }
    }

    /// Answer with the prompt.
    pub fn echo() -> Self {
        Self { mode: MockMode::Echo }
    }

    /// Always fail with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self { mode: MockMode::Failing(message.into()) }
    }
}

#[async_trait]
impl Generator for MockGenerator {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        debug!(generator = "mock", prompt_len = prompt.len(), "generate");
        match &self.mode {
            MockMode::Fixed(response) => Ok(response.clone()),
            MockMode::Echo => Ok(prompt.to_string()),
            MockMode::Failing(message) => Err(RagError::generation("mock", message.clone())),
        }
    }
}
