//! 一致性交叉核对执行器（LLM）

use async_trait::async_trait;

use crate::executors::{
    CrossReferenceRequest, CrossReferencer, ExecutorError, ExecutorOutput, LlmWorker,
};
use crate::model::CrossReferenceResult;

const SYSTEM: &str = "You check extracted records about one game-world region for contradictions across categories (e.g. an NPC placed in a sub-area the zone record does not list). Respond with ONE JSON object: {\"consistent\": bool, \"conflicts\": [{\"categories\": [..], \"description\": \"..\"}], \"confidence\": {\"<category>\": 0.0-1.0}}.";

pub struct LlmCrossReferencer {
    worker: LlmWorker,
}

impl LlmCrossReferencer {
    pub fn new(worker: LlmWorker) -> Self {
        Self { worker }
    }
}

#[async_trait]
impl CrossReferencer for LlmCrossReferencer {
    async fn cross_reference(
        &self,
        request: &CrossReferenceRequest,
        remaining_usd: f64,
    ) -> Result<ExecutorOutput<CrossReferenceResult>, ExecutorError> {
        let payload = serde_json::to_string_pretty(&request.records)
            .map_err(|e| ExecutorError::permanent(format!("serialize records: {e}")))?;
        let prompt = format!(
            "Subject: {} ({})\nRecords:\n{}",
            request.display_name, request.unit_id, payload
        );
        self.worker
            .ask_json::<CrossReferenceResult>(SYSTEM, &prompt, remaining_usd)
            .await
    }
}
