//! Threadline text nodes
//!
//! A small summarisation pipeline built from four nodes:
//!
//! | name                 | reads                                   | writes                          |
//! |----------------------|-----------------------------------------|---------------------------------|
//! | `split_text`         | `text`, `chunk_size` (300)              | `chunks`                        |
//! | `generate_summaries` | `chunks`, `per_chunk_summary_words` (50)| `chunk_summaries`               |
//! | `merge_summaries`    | `chunk_summaries`                       | `summary`                       |
//! | `refine_summary`     | `summary`, `max_summary_words` (120), `refine_step_words` | `summary`, `summary_word_count` |
//!
//! `refine_summary` loops on itself until the summary fits, then ends the run.

mod params;
mod summarize;

use threadline_node::{NodeRegistry, RegistryError};

pub use summarize::{GenerateSummaries, MergeSummaries, RefineSummary, SplitText};

pub const SPLIT_TEXT: &str = "split_text";
pub const GENERATE_SUMMARIES: &str = "generate_summaries";
pub const MERGE_SUMMARIES: &str = "merge_summaries";
pub const REFINE_SUMMARY: &str = "refine_summary";

/// Register the four text nodes under their default names.
pub fn register_builtin(registry: &mut NodeRegistry) -> Result<(), RegistryError> {
  registry.register(SPLIT_TEXT, SplitText)?;
  registry.register(GENERATE_SUMMARIES, GenerateSummaries)?;
  registry.register(MERGE_SUMMARIES, MergeSummaries)?;
  registry.register(REFINE_SUMMARY, RefineSummary::new(REFINE_SUMMARY))?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_register_builtin() {
    let mut registry = NodeRegistry::new();
    register_builtin(&mut registry).unwrap();

    assert_eq!(
      registry.list(),
      vec![
        GENERATE_SUMMARIES,
        MERGE_SUMMARIES,
        REFINE_SUMMARY,
        SPLIT_TEXT
      ]
    );
  }
}
