//! Grounded answer generation.
//!
//! [`AnswerGenerator`] turns a question and its retrieved chunks into a
//! single prompt and calls a [`Generator`] once. The context section is
//! kept within a character budget derived from the model's token budget
//! (4 chars per token); when retrieved chunks do not fit, the lowest-ranked
//! ones are dropped from the tail. A chunk is never cut mid-text.

use serde::Serialize;

use crate::error::{RagError, Result};
use crate::generation::Generator;
use crate::models::SearchHit;

/// Characters per token used for budget estimation.
pub const CHARS_PER_TOKEN: usize = 4;

/// Separator placed between chunk texts in the context section.
pub const CONTEXT_SEPARATOR: &str = "\n";

const PREAMBLE: &str = "You are a knowledgeable assistant. \
Use the provided document context to answer the following question.";

const INSTRUCTION: &str = "Answer only from the context above, concisely and accurately. \
If the context does not contain the answer, say so.";

/// A prompt ready to send, plus which chunks made it in.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptPlan {
    pub prompt: String,
    pub used: Vec<SearchHit>,
    /// Number of retrieved chunks dropped to fit the budget.
    pub trimmed: usize,
}

/// Generated answer with the chunks it was grounded on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    pub used_chunks: Vec<SearchHit>,
    pub trimmed: usize,
}

#[derive(Debug, Clone)]
pub struct AnswerGenerator {
    budget_chars: usize,
}

impl AnswerGenerator {
    /// Create a generator whose context section holds at most
    /// `context_budget_tokens × 4` characters.
    pub fn new(context_budget_tokens: usize) -> Result<Self> {
        if context_budget_tokens == 0 {
            return Err(RagError::Configuration(
                "context budget must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            budget_chars: context_budget_tokens.saturating_mul(CHARS_PER_TOKEN),
        })
    }

    pub fn budget_chars(&self) -> usize {
        self.budget_chars
    }

    /// Assemble the prompt for `question` from `chunks` in retrieval order.
    ///
    /// Fails with [`RagError::Configuration`] when even the top-ranked chunk
    /// exceeds the budget.
    pub fn build_prompt(&self, question: &str, chunks: &[SearchHit]) -> Result<PromptPlan> {
        let mut used = Vec::with_capacity(chunks.len());
        let mut context_len = 0usize;
        for hit in chunks {
            let sep = if used.is_empty() {
                0
            } else {
                CONTEXT_SEPARATOR.chars().count()
            };
            let next = context_len + sep + hit.text.chars().count();
            if next > self.budget_chars {
                break;
            }
            context_len = next;
            used.push(hit.clone());
        }

        if used.is_empty() && !chunks.is_empty() {
            return Err(RagError::Configuration(format!(
                "top chunk ({} chars) exceeds the context budget of {} chars",
                chunks[0].text.chars().count(),
                self.budget_chars
            )));
        }

        let trimmed = chunks.len() - used.len();
        let context = used
            .iter()
            .map(|h| h.text.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR);
        let prompt = format!(
            "{}\nContext: {}\nQuestion: {}\n{}",
            PREAMBLE, context, question, INSTRUCTION
        );

        Ok(PromptPlan {
            prompt,
            used,
            trimmed,
        })
    }

    /// Build the prompt and call `generator` exactly once.
    ///
    /// The generator's output is returned verbatim.
    pub async fn answer(
        &self,
        generator: &dyn Generator,
        question: &str,
        chunks: &[SearchHit],
    ) -> Result<Answer> {
        let plan = self.build_prompt(question, chunks)?;
        if plan.trimmed > 0 {
            tracing::info!(
                trimmed = plan.trimmed,
                kept = plan.used.len(),
                budget_chars = self.budget_chars,
                "context trimmed to fit budget"
            );
        }

        let text = generator.generate(&plan.prompt).await?;
        Ok(Answer {
            text,
            used_chunks: plan.used,
            trimmed: plan.trimmed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingGenerator, ScriptedGenerator};
    use futures::executor::block_on;

    fn hit(id: i64, text: &str) -> SearchHit {
        SearchHit {
            chunk_id: id,
            text: text.to_string(),
            score: 1.0 - id as f32 * 0.1,
        }
    }

    fn five_hits() -> Vec<SearchHit> {
        (0..5).map(|i| hit(i, &"x".repeat(100))).collect()
    }

    #[test]
    fn test_prompt_layout() {
        let gen = AnswerGenerator::new(100).unwrap();
        let plan = gen
            .build_prompt("What is it?", &[hit(0, "first"), hit(1, "second")])
            .unwrap();
        assert!(plan.prompt.starts_with(PREAMBLE));
        assert!(plan.prompt.contains("Context: first\nsecond\n"));
        assert!(plan.prompt.contains("Question: What is it?\n"));
        assert!(plan.prompt.ends_with(INSTRUCTION));
        assert_eq!(plan.trimmed, 0);
        assert_eq!(plan.used.len(), 2);
    }

    #[test]
    fn test_trims_lowest_ranked_to_fit() {
        // 75 tokens → 300 chars: three 100-char chunks need 302 with
        // separators, so only two fit.
        let gen = AnswerGenerator::new(75).unwrap();
        let plan = gen.build_prompt("q", &five_hits()).unwrap();
        assert_eq!(plan.used.len(), 2);
        assert_eq!(plan.trimmed, 3);
        let ids: Vec<i64> = plan.used.iter().map(|h| h.chunk_id).collect();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn test_trimmed_answer_does_not_fail() {
        let gen = AnswerGenerator::new(60).unwrap();
        let generator = ScriptedGenerator::new("short answer");
        let answer = block_on(gen.answer(&generator, "q", &five_hits())).unwrap();
        assert_eq!(answer.text, "short answer");
        assert_eq!(answer.used_chunks.len(), 2);
        assert_eq!(answer.trimmed, 3);
        assert_eq!(generator.prompts().len(), 1);
    }

    #[test]
    fn test_oversized_top_chunk_is_configuration_error() {
        let gen = AnswerGenerator::new(10).unwrap();
        let err = gen.build_prompt("q", &five_hits()).unwrap_err();
        assert!(matches!(err, RagError::Configuration(_)));
    }

    #[test]
    fn test_generation_failure_surfaces() {
        let gen = AnswerGenerator::new(100).unwrap();
        let err = block_on(gen.answer(&FailingGenerator, "q", &[hit(0, "ctx")])).unwrap_err();
        assert_eq!(err, RagError::Generation("model overloaded".to_string()));
    }

    #[test]
    fn test_zero_budget_rejected() {
        assert!(matches!(
            AnswerGenerator::new(0),
            Err(RagError::Configuration(_))
        ));
    }
}
