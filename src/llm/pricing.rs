//! Token 计价与估算
//!
//! LlmClient 只报告累计 token 数；调用方在调用前后各取一次快照，用差值乘以单价得到本次成本。
//! 客户端不报告用量时（如 Mock），退回到按字符数估算。

use serde::Deserialize;

use crate::llm::{LlmClient, Message};

/// 每千 token 单价（美元）
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Default)]
#[serde(default)]
pub struct TokenPricing {
    pub prompt_per_1k_usd: f64,
    pub completion_per_1k_usd: f64,
}

impl TokenPricing {
    pub fn new(prompt_per_1k_usd: f64, completion_per_1k_usd: f64) -> Self {
        Self {
            prompt_per_1k_usd,
            completion_per_1k_usd,
        }
    }

    pub fn cost(&self, prompt_tokens: u64, completion_tokens: u64) -> f64 {
        (prompt_tokens as f64 / 1000.0) * self.prompt_per_1k_usd
            + (completion_tokens as f64 / 1000.0) * self.completion_per_1k_usd
    }

    /// 仅按 prompt 估算的下限成本，用于调用前的预算检查
    pub fn estimate_prompt_cost(&self, messages: &[Message]) -> f64 {
        let tokens: usize = messages
            .iter()
            .map(|m| TokenEstimator::estimate(&m.content))
            .sum();
        self.cost(tokens as u64, 0)
    }
}

/// Token 估算器（简单的字符计数近似）
pub struct TokenEstimator;

impl TokenEstimator {
    /// 英文约 4 字符/token，中文约 1.5 字符/token
    pub fn estimate(text: &str) -> usize {
        let mut ascii_chars = 0;
        let mut non_ascii_chars = 0;

        for c in text.chars() {
            if c.is_ascii() {
                ascii_chars += 1;
            } else {
                non_ascii_chars += 1;
            }
        }

        let tokens = ascii_chars / 4 + (non_ascii_chars as f64 / 1.5).ceil() as usize;
        tokens.max(1)
    }
}

/// 调用前的累计用量快照
#[derive(Debug, Clone, Copy)]
pub struct UsageSnapshot {
    prompt: u64,
    completion: u64,
}

impl UsageSnapshot {
    pub fn take(llm: &dyn LlmClient) -> Self {
        let (prompt, completion, _) = llm.token_usage();
        Self { prompt, completion }
    }

    /// 自快照以来的 (prompt, completion) 增量
    pub fn delta(&self, llm: &dyn LlmClient) -> (u64, u64) {
        let (prompt, completion, _) = llm.token_usage();
        (
            prompt.saturating_sub(self.prompt),
            completion.saturating_sub(self.completion),
        )
    }

    /// 本次调用成本；客户端未报告用量时按输入输出文本估算
    pub fn cost_since(
        &self,
        llm: &dyn LlmClient,
        pricing: &TokenPricing,
        messages: &[Message],
        reply: &str,
    ) -> f64 {
        let (prompt, completion) = self.delta(llm);
        if prompt == 0 && completion == 0 {
            let prompt_est: usize = messages
                .iter()
                .map(|m| TokenEstimator::estimate(&m.content))
                .sum();
            return pricing.cost(prompt_est as u64, TokenEstimator::estimate(reply) as u64);
        }
        pricing.cost(prompt, completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pricing_cost() {
        let p = TokenPricing::new(1.0, 2.0);
        assert!((p.cost(1000, 500) - 2.0).abs() < 1e-9);
        assert_eq!(p.cost(0, 0), 0.0);
    }

    #[test]
    fn test_estimator_never_zero() {
        assert_eq!(TokenEstimator::estimate(""), 1);
        assert_eq!(TokenEstimator::estimate("abcdefgh"), 2);
        assert_eq!(TokenEstimator::estimate("区域"), 2);
    }
}
