//! Token and cost accounting for one analysis.

use serde::{Deserialize, Serialize};

use crate::providers::TokenUsage;

/// Accumulated LLM usage for an analysis.
///
/// Built fresh per call to `DocumentAnalyzer::analyze_with_report`; nothing
/// is shared between analyses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmUsage {
    /// Total tokens used
    pub total_tokens: u32,

    /// Prompt/input tokens
    pub prompt_tokens: u32,

    /// Completion/output tokens
    pub completion_tokens: u32,

    /// Successful LLM calls
    pub llm_calls: u32,

    /// Estimated cost in USD
    pub estimated_cost: f64,

    /// Tokens written to cache
    pub cache_creation_tokens: u32,

    /// Tokens read from cache
    pub cache_read_tokens: u32,
}

impl LlmUsage {
    /// Add token usage from a provider response.
    pub fn add(&mut self, usage: &TokenUsage, model: &str) {
        self.prompt_tokens += usage.prompt_tokens;
        self.completion_tokens += usage.completion_tokens;
        self.total_tokens += usage.total();
        self.llm_calls += 1;
        self.cache_creation_tokens += usage.cache_creation_tokens;
        self.cache_read_tokens += usage.cache_read_tokens;
        self.estimated_cost += Self::estimate_cost(usage, model);
    }

    /// Estimate cost for a usage entry.
    fn estimate_cost(usage: &TokenUsage, model: &str) -> f64 {
        // USD per million tokens: input, output, cache write, cache read
        let (input_rate, output_rate, cache_write_rate, cache_read_rate) = match model {
            m if m.contains("gpt-4o-mini") => (0.15, 0.6, 0.0, 0.075),
            m if m.contains("gpt-4o") => (2.5, 10.0, 0.0, 1.25),
            m if m.contains("gpt-4.1-mini") => (0.4, 1.6, 0.0, 0.1),
            m if m.contains("gpt-4.1") => (2.0, 8.0, 0.0, 0.5),
            m if m.contains("haiku") => (1.0, 5.0, 1.25, 0.1),
            m if m.contains("opus") => (5.0, 25.0, 6.25, 0.5),
            m if m.contains("sonnet") => (3.0, 15.0, 3.75, 0.3),
            _ => (2.5, 10.0, 0.0, 1.25),
        };

        let per_million = |tokens: u32, rate: f64| tokens as f64 / 1_000_000.0 * rate;

        // Cache reads and writes are part of prompt_tokens but billed at their own rates
        let uncached_prompt = usage
            .prompt_tokens
            .saturating_sub(usage.cache_read_tokens)
            .saturating_sub(usage.cache_creation_tokens);

        per_million(uncached_prompt, input_rate)
            + per_million(usage.completion_tokens, output_rate)
            + per_million(usage.cache_creation_tokens, cache_write_rate)
            + per_million(usage.cache_read_tokens, cache_read_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(prompt: u32, completion: u32, cached: u32) -> TokenUsage {
        TokenUsage {
            prompt_tokens: prompt,
            completion_tokens: completion,
            cache_read_tokens: cached,
            cache_creation_tokens: 0,
        }
    }

    #[test]
    fn test_accumulates_calls() {
        let mut total = LlmUsage::default();
        total.add(&usage(3_000, 800, 0), "gpt-4o");
        total.add(&usage(1_000, 200, 0), "claude-sonnet-4-5");

        assert_eq!(total.llm_calls, 2);
        assert_eq!(total.prompt_tokens, 4_000);
        assert_eq!(total.total_tokens, 5_000);
    }

    #[test]
    fn test_cost_estimation() {
        let mut total = LlmUsage::default();
        total.add(&usage(1_000_000, 100_000, 0), "gpt-4o-2024-08-06");
        // $2.50 input + $1.00 output
        assert!((total.estimated_cost - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_anthropic_cache_read_and_write_billing() {
        // 2000 uncached + 2000 read from cache
        let mut read = LlmUsage::default();
        read.add(&usage(4_000, 0, 2_000), "claude-sonnet-4-5");
        // $3.00/M input + $0.30/M cache read
        assert!((read.estimated_cost - 0.0066).abs() < 1e-9);

        let mut write = LlmUsage::default();
        write.add(
            &TokenUsage {
                prompt_tokens: 3_000,
                completion_tokens: 0,
                cache_read_tokens: 0,
                cache_creation_tokens: 1_000,
            },
            "claude-sonnet-4-5",
        );
        // 2000 at $3.00/M + 1000 at $3.75/M, no double billing of the write
        assert!((write.estimated_cost - 0.00975).abs() < 1e-9);
    }

    #[test]
    fn test_cached_tokens_are_cheaper() {
        let mut cold = LlmUsage::default();
        cold.add(&usage(10_000, 0, 0), "gpt-4o");
        let mut warm = LlmUsage::default();
        warm.add(&usage(10_000, 0, 8_000), "gpt-4o");
        assert!(warm.estimated_cost < cold.estimated_cost);
    }
}
