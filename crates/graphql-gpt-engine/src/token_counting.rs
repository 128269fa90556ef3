//! Token budgeting for completion prompts
//!
//! Completion services limit context by tokens, not characters, so prompt
//! sizes are measured with the BPE encoding of the target model family.

use std::fmt;
use std::sync::Arc;

use tiktoken_rs::{CoreBPE, get_bpe_from_model};
use tracing::warn;

/// Context window of the gpt-4 model family
pub const DEFAULT_CONTEXT_WINDOW: usize = 8192;

/// Combined size of a prompt measured against a context window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBudget {
    pub ceiling: usize,
    pub total: usize,
}

impl TokenBudget {
    pub fn new(ceiling: usize, total: usize) -> Self {
        Self { ceiling, total }
    }

    /// Whether a prompt of this size may be sent
    pub fn fits(&self) -> bool {
        self.total < self.ceiling
    }
}

impl fmt::Display for TokenBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {} tokens", self.total, self.ceiling)
    }
}

#[derive(Clone)]
enum Encoding {
    Bpe(Arc<CoreBPE>),

    /// Character based estimate for models without a known encoding
    Approximate,
}

/// Counts tokens the way a given model's tokenizer would
#[derive(Clone)]
pub struct TokenCounter {
    encoding: Encoding,
}

impl fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoding = match self.encoding {
            Encoding::Bpe(_) => "bpe",
            Encoding::Approximate => "approximate",
        };
        f.debug_struct("TokenCounter")
            .field("encoding", &encoding)
            .finish()
    }
}

impl TokenCounter {
    /// Use the encoding table entry for `model`, falling back to an approximation
    pub fn for_model(model: &str) -> Self {
        match get_bpe_from_model(model) {
            Ok(bpe) => Self {
                encoding: Encoding::Bpe(Arc::new(bpe)),
            },
            Err(error) => {
                warn!("No tokenizer known for model {model}, using approximate token counts: {error}");
                Self::approximate()
            }
        }
    }

    /// A counter that estimates tokens from character counts
    ///
    /// Roughly four characters make up a token in English text. The estimate
    /// is rounded up and padded by a quarter so that a prompt accepted by the
    /// approximation is very unlikely to overflow the real tokenizer.
    pub fn approximate() -> Self {
        Self {
            encoding: Encoding::Approximate,
        }
    }

    pub fn is_approximate(&self) -> bool {
        matches!(self.encoding, Encoding::Approximate)
    }

    /// Count the tokens in a single piece of text
    pub fn count(&self, text: &str) -> usize {
        match &self.encoding {
            Encoding::Bpe(bpe) => bpe.encode_with_special_tokens(text).len(),
            Encoding::Approximate => {
                let base = text.chars().count().div_ceil(4);
                base + base.div_ceil(4)
            }
        }
    }

    /// Combined token cost of a synthesis prompt
    ///
    /// Each part is tokenized on its own, matching how the parts are sent as
    /// separate messages.
    pub fn estimate(&self, schema: &str, instruction: &str, question: &str) -> usize {
        self.count(schema) + self.count(instruction) + self.count(question)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn budget_fits_strictly_below_ceiling() {
        assert!(TokenBudget::new(10, 9).fits());
        assert!(!TokenBudget::new(10, 10).fits());
        assert!(!TokenBudget::new(10, 11).fits());
    }

    #[test]
    fn budget_display() {
        assert_eq!(TokenBudget::new(8192, 120).to_string(), "120 of 8192 tokens");
    }

    #[test]
    fn gpt4_uses_bpe_encoding() {
        let counter = TokenCounter::for_model("gpt-4");
        assert!(!counter.is_approximate());
        assert_eq!(counter.count("hello world"), 2);
    }

    #[test]
    fn unknown_model_falls_back_to_approximation() {
        let counter = TokenCounter::for_model("definitely-not-a-model");
        assert!(counter.is_approximate());
    }

    #[rstest]
    #[case("", 0)]
    #[case("abcd", 2)]
    #[case("abcdefgh", 3)]
    #[case("abcdefghijklmnopq", 7)]
    fn approximation_rounds_up_with_margin(#[case] text: &str, #[case] expected: usize) {
        assert_eq!(TokenCounter::approximate().count(text), expected);
    }

    #[test]
    fn estimate_sums_parts_independently() {
        let counter = TokenCounter::for_model("gpt-4");
        let schema = "type Query { target(ensemblId: String!): Target }";
        let instruction = "Generate the GraphQL query code ONLY.";
        let question = "What is gene BRAF?";

        assert_eq!(
            counter.estimate(schema, instruction, question),
            counter.count(schema) + counter.count(instruction) + counter.count(question)
        );
    }

    #[test]
    fn estimate_is_deterministic() {
        let counter = TokenCounter::for_model("gpt-4");
        let first = counter.estimate("type Query { id: ID }", "instruction", "question");
        let second = counter.estimate("type Query { id: ID }", "instruction", "question");
        assert_eq!(first, second);
    }
}
