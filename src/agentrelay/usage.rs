//! Advisory token and cost estimates.
//!
//! Tokens are approximated at one per four characters (rounded up), the same heuristic used for
//! context trimming elsewhere in the ecosystem. The estimate is telemetry, not billing: it only
//! has to be cheap, never fail, and grow as the message log grows.

use crate::agentrelay::message::Message;
use serde::{Deserialize, Serialize};

/// Approximate characters per token.
pub const CHARS_PER_TOKEN: usize = 4;

/// Estimated token count and dollar cost of a body of text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageEstimate {
    pub tokens: usize,
    pub cost: f64,
}

/// Estimate the tokens in `text`. Empty text is zero tokens.
pub fn estimate_token_count(text: &str) -> usize {
    let chars = text.chars().count();
    (chars + CHARS_PER_TOKEN - 1) / CHARS_PER_TOKEN
}

/// Estimate usage for the concatenation of every message's content.
pub fn estimate_messages(messages: &[Message], price_per_1k_tokens: f64) -> UsageEstimate {
    let text: String = messages.iter().map(Message::accounting_text).collect();
    let tokens = estimate_token_count(&text);
    UsageEstimate {
        tokens,
        cost: tokens as f64 / 1000.0 * price_per_1k_tokens.max(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_free() {
        assert_eq!(estimate_token_count(""), 0);
        assert_eq!(estimate_messages(&[], 0.06), UsageEstimate::default());
    }

    #[test]
    fn rounds_partial_tokens_up() {
        assert_eq!(estimate_token_count("abc"), 1);
        assert_eq!(estimate_token_count("abcd"), 1);
        assert_eq!(estimate_token_count("abcde"), 2);
    }

    #[test]
    fn cost_scales_with_tokens() {
        let messages = vec![Message::plain("a".repeat(4000))];
        let usage = estimate_messages(&messages, 0.06);
        assert_eq!(usage.tokens, 1000);
        assert!((usage.cost - 0.06).abs() < 1e-9);
    }
}
