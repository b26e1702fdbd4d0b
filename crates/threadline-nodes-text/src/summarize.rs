use serde_json::{Value, json};
use threadline_node::{Node, NodeError, NodeOutput};
use threadline_workflow::State;
use tracing::debug;

use crate::params;

/// Splits `text` into chunks of at most `chunk_size` words.
#[derive(Debug, Clone, Copy, Default)]
pub struct SplitText;

impl Node for SplitText {
  fn apply(&self, mut state: State) -> Result<NodeOutput, NodeError> {
    let chunk_size = params::positive(&state, "chunk_size", 300)?;
    let words: Vec<&str> = params::text(&state, "text")?.split_whitespace().collect();

    let chunks: Vec<Value> = words
      .chunks(chunk_size)
      .map(|chunk| Value::String(chunk.join(" ")))
      .collect();

    debug!(words = words.len(), chunks = chunks.len(), "split text");
    state.insert("chunks".to_string(), Value::Array(chunks));
    Ok(NodeOutput::next(state))
  }
}

/// Summarises each chunk as its first `per_chunk_summary_words` words.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateSummaries;

impl Node for GenerateSummaries {
  fn apply(&self, mut state: State) -> Result<NodeOutput, NodeError> {
    let limit = params::positive(&state, "per_chunk_summary_words", 50)?;

    let summaries: Vec<Value> = params::strings(&state, "chunks")?
      .iter()
      .map(|chunk| Value::String(first_words(chunk, limit)))
      .collect();

    state.insert("chunk_summaries".to_string(), Value::Array(summaries));
    Ok(NodeOutput::next(state))
  }
}

/// Joins the chunk summaries into a single draft `summary`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeSummaries;

impl Node for MergeSummaries {
  fn apply(&self, mut state: State) -> Result<NodeOutput, NodeError> {
    let summary = params::strings(&state, "chunk_summaries")?.join(" ");
    state.insert("summary".to_string(), Value::String(summary));
    Ok(NodeOutput::next(state))
  }
}

/// Trims `summary` towards `max_summary_words`, looping on itself while the
/// summary is still too long and ending the run once it fits.
///
/// Each pass removes at most `refine_step_words` words; without that
/// parameter a single pass trims straight to the limit.
#[derive(Debug, Clone)]
pub struct RefineSummary {
  /// Registered name of this node, used as the loop target.
  name: String,
}

impl RefineSummary {
  pub fn new(name: impl Into<String>) -> Self {
    Self { name: name.into() }
  }
}

impl Node for RefineSummary {
  fn apply(&self, mut state: State) -> Result<NodeOutput, NodeError> {
    let max_words = params::positive(&state, "max_summary_words", 120)?;
    let step = params::optional_positive(&state, "refine_step_words")?;

    let words: Vec<&str> = params::text(&state, "summary")?.split_whitespace().collect();
    let keep = match step {
      Some(step) if words.len() > max_words => max_words.max(words.len().saturating_sub(step)),
      _ => max_words.min(words.len()),
    };
    let summary = words[..keep].join(" ");

    state.insert("summary".to_string(), Value::String(summary));
    state.insert("summary_word_count".to_string(), json!(keep));

    if keep > max_words {
      debug!(words = keep, max_words, "summary still too long, refining again");
      Ok(NodeOutput::goto(state, self.name.clone()))
    } else {
      Ok(NodeOutput::end(state))
    }
  }
}

fn first_words(text: &str, limit: usize) -> String {
  text
    .split_whitespace()
    .take(limit)
    .collect::<Vec<_>>()
    .join(" ")
}
