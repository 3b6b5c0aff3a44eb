//! Model-aware token estimation
//!
//! Exact tokenizers are not available for every vendor, and these counts
//! feed cost/metrics display only. GPT-family text averages roughly four
//! characters per token; Claude and DeepSeek are estimated from whitespace
//! tokens scaled by empirical multipliers.

/// Estimate the token count of `text` for `model`. The model string may be a
/// bare model name or a `provider/model` label.
#[must_use]
pub fn count_tokens(text: &str, model: &str) -> usize {
    let model = model.to_lowercase();

    if model.contains("gpt") || model.contains("o3") || model.contains("davinci") {
        chars_estimate(text)
    } else if model.contains("claude") {
        words_estimate(text, 1.3)
    } else if model.contains("deepseek") {
        words_estimate(text, 1.2)
    } else {
        chars_estimate(text)
    }
}

fn chars_estimate(text: &str) -> usize {
    text.chars().count() / 4
}

fn words_estimate(text: &str, multiplier: f64) -> usize {
    (text.split_whitespace().count() as f64 * multiplier) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_counts_zero() {
        assert_eq!(count_tokens("", "gpt-4o"), 0);
        assert_eq!(count_tokens("", "claude-3-7-sonnet-20250219"), 0);
    }

    #[test]
    fn claude_counts_exceed_word_count() {
        let text = "the tribunal dismissed the application for review";
        let words = text.split_whitespace().count();
        assert!(count_tokens(text, "claude-3-7-sonnet-20250219") > words);
    }

    #[test]
    fn provider_prefixed_labels_work() {
        let text = "a b c d e f g h";
        assert_eq!(
            count_tokens(text, "deepseek/deepseek-reasoner"),
            count_tokens(text, "deepseek-reasoner")
        );
    }

    #[test]
    fn gpt_family_scales_with_length() {
        let short = count_tokens("short", "gpt-4o");
        let long = count_tokens(&"lease ".repeat(100), "gpt-4o");
        assert!(long > short);
    }
}
