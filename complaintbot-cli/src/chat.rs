//! Interactive chat over the complaint index.

use std::io::Write;

use complaintbot_rag::{RagError, RagPipeline};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::warn;

use crate::commands::{require_collection, write_sources};

const HELP: &str = "\
Commands:
  /sources   toggle showing retrieved sources
  /history   list this session's questions and answers
  /clear     forget the session history
  /quit      leave (also /exit, Ctrl-D)
Anything else is asked as a question.";

/// One answered question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    /// The question as typed.
    pub question: String,
    /// The generated answer.
    pub answer: String,
    /// Chunk texts the answer was grounded on, nearest first.
    pub sources: Vec<String>,
}

/// What the read loop should do after a line was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatFlow {
    /// Read the next line.
    Continue,
    /// History was cleared; the line editor should drop its history too.
    Cleared,
    /// Leave the loop.
    Quit,
}

/// State of a chat session, independent of the terminal.
#[derive(Debug)]
pub struct ChatSession {
    k: usize,
    show_sources: bool,
    history: Vec<Turn>,
}

impl ChatSession {
    /// A session retrieving `k` chunks per question, with sources shown.
    pub fn new(k: usize) -> Self {
        Self { k, show_sources: true, history: Vec::new() }
    }

    /// Whether answers are followed by their sources.
    pub fn show_sources(&self) -> bool {
        self.show_sources
    }

    /// Answered questions since the start or the last `/clear`.
    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    /// Handle one input line: a slash command or a question.
    ///
    /// Pipeline errors are reported to `out` and do not end the session.
    pub async fn handle<W: Write>(
        &mut self,
        pipeline: &RagPipeline,
        line: &str,
        out: &mut W,
    ) -> std::io::Result<ChatFlow> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(ChatFlow::Continue);
        }

        match line {
            "/quit" | "/exit" => return Ok(ChatFlow::Quit),
            "/sources" => {
                self.show_sources = !self.show_sources;
                let state = if self.show_sources { "on" } else { "off" };
                writeln!(out, "Source display {state}.")?;
                return Ok(ChatFlow::Continue);
            }
            "/clear" => {
                self.history.clear();
                writeln!(out, "History cleared.")?;
                return Ok(ChatFlow::Cleared);
            }
            "/history" => {
                if self.history.is_empty() {
                    writeln!(out, "No questions asked yet.")?;
                }
                for (i, turn) in self.history.iter().enumerate() {
                    writeln!(out, "{}. Q: {}", i + 1, turn.question)?;
                    writeln!(out, "   A: {}", turn.answer)?;
                }
                return Ok(ChatFlow::Continue);
            }
            "/help" => {
                writeln!(out, "{HELP}")?;
                return Ok(ChatFlow::Continue);
            }
            cmd if cmd.starts_with('/') => {
                writeln!(out, "Unknown command {cmd}.\n{HELP}")?;
                return Ok(ChatFlow::Continue);
            }
            _ => {}
        }

        match pipeline.answer_with_k(line, self.k).await {
            Ok(answer) => {
                writeln!(out, "{}", answer.answer)?;
                if self.show_sources {
                    writeln!(out)?;
                    write_sources(out, &answer.sources)?;
                }
                self.history.push(Turn {
                    question: line.to_string(),
                    answer: answer.answer,
                    sources: answer.sources,
                });
            }
            Err(RagError::GenerationFailed { sources, source }) => {
                warn!(error = %source, "chat answer failed");
                writeln!(out, "Sorry, the answer could not be generated: {source}")?;
                if self.show_sources {
                    write_sources(out, &sources)?;
                }
            }
            Err(e) => {
                warn!(error = %e, "chat answer failed");
                writeln!(out, "Sorry, something went wrong: {e}")?;
            }
        }
        Ok(ChatFlow::Continue)
    }
}

/// Run the chat REPL on the terminal until `/quit`, Ctrl-C or Ctrl-D.
pub async fn run_chat(pipeline: &RagPipeline, k: Option<usize>) -> anyhow::Result<()> {
    let info = require_collection(pipeline).await?;
    let mut session = ChatSession::new(k.unwrap_or(pipeline.config().top_k));
    let mut rl = DefaultEditor::new()?;
    let mut out = std::io::stdout();

    println!(
        "ComplaintBot: ask about {} indexed complaint excerpts. /help for commands.",
        info.count
    );

    loop {
        match rl.readline("you> ") {
            Ok(line) => {
                if !line.trim().is_empty() {
                    rl.add_history_entry(line.as_str())?;
                }
                match session.handle(pipeline, &line, &mut out).await? {
                    ChatFlow::Continue => {}
                    ChatFlow::Cleared => rl.clear_history()?,
                    ChatFlow::Quit => break,
                }
                println!();
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    println!("Goodbye.");
    Ok(())
}
