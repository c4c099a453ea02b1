//! LLM 执行器的公共部分：预算预检、成本计量、JSON 输出解析
//!
//! 调用前按 prompt 估算成本，超过剩余预算直接以 CostCeiling 失败（不触网）；
//! LLM 调用失败与 JSON 解析失败都视为可重试，解析失败时已产生的成本随错误一并报告。

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::executors::{ExecutorError, ExecutorOutput};
use crate::llm::{LlmClient, Message, TokenPricing, UsageSnapshot};
use crate::text::extract_json_block;

#[derive(Clone)]
pub struct LlmWorker {
    llm: Arc<dyn LlmClient>,
    pricing: TokenPricing,
}

impl LlmWorker {
    pub fn new(llm: Arc<dyn LlmClient>, pricing: TokenPricing) -> Self {
        Self { llm, pricing }
    }

    /// 一次 system + user 调用，返回 (回复, 成本)
    pub async fn ask(
        &self,
        system: &str,
        user: &str,
        remaining_usd: f64,
    ) -> Result<(String, f64), ExecutorError> {
        let messages = vec![Message::system(system), Message::user(user)];
        let estimate = self.pricing.estimate_prompt_cost(&messages);
        if estimate > remaining_usd {
            return Err(ExecutorError::CostCeiling {
                ceiling_usd: remaining_usd,
                spent_usd: estimate,
            });
        }

        let snapshot = UsageSnapshot::take(self.llm.as_ref());
        match self.llm.complete(&messages).await {
            Ok(reply) => {
                let cost = snapshot.cost_since(self.llm.as_ref(), &self.pricing, &messages, &reply);
                Ok((reply, cost))
            }
            Err(e) => {
                let (p, c) = snapshot.delta(self.llm.as_ref());
                Err(ExecutorError::transient(format!("LLM error: {e}"))
                    .with_cost(self.pricing.cost(p, c)))
            }
        }
    }

    /// 调用并把回复中的 JSON 块解析为 T
    pub async fn ask_json<T: DeserializeOwned>(
        &self,
        system: &str,
        user: &str,
        remaining_usd: f64,
    ) -> Result<ExecutorOutput<T>, ExecutorError> {
        let (reply, cost) = self.ask(system, user, remaining_usd).await?;
        let json = extract_json_block(&reply).ok_or_else(|| {
            ExecutorError::transient("reply contained no JSON").with_cost(cost)
        })?;
        let value = serde_json::from_str(json).map_err(|e| {
            ExecutorError::transient(format!("malformed JSON output: {e}")).with_cost(cost)
        })?;
        Ok(ExecutorOutput::new(value, cost))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlmClient;

    #[tokio::test]
    async fn test_ask_json_parses_and_costs() {
        let llm = Arc::new(ScriptedLlmClient::new([r#"Here: ["a", "b"]"#]));
        let worker = LlmWorker::new(llm, TokenPricing::new(1.0, 1.0));
        let out: ExecutorOutput<Vec<String>> = worker.ask_json("sys", "user", 10.0).await.unwrap();
        assert_eq!(out.value, vec!["a", "b"]);
        assert!(out.cost_usd > 0.0);
    }

    #[tokio::test]
    async fn test_malformed_json_is_transient_with_cost() {
        let llm = Arc::new(ScriptedLlmClient::new(["{not json}"]));
        let worker = LlmWorker::new(llm, TokenPricing::new(1.0, 1.0));
        let err = worker
            .ask_json::<Vec<String>>("sys", "user", 10.0)
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert!(err.cost_usd() > 0.0);
    }

    #[tokio::test]
    async fn test_prompt_over_budget_skips_call() {
        let llm = Arc::new(ScriptedLlmClient::new(["[]"]));
        let worker = LlmWorker::new(llm.clone(), TokenPricing::new(1000.0, 0.0));
        let err = worker.ask("sys", &"x".repeat(4000), 0.01).await.unwrap_err();
        assert!(matches!(
            err,
            ExecutorError::CostCeiling { ceiling_usd, spent_usd } if ceiling_usd == 0.01 && spent_usd > 0.01
        ));
        assert_eq!(llm.calls(), 0);
    }
}
