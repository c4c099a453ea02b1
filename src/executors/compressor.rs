//! 内容压缩服务（LLM 实现）
//!
//! 输出为空视为服务异常（可重试）；输出是否真的更短由 summarize_topic 工具判断。

use async_trait::async_trait;

use crate::executors::{CompressionRequest, ContentCompressor, ExecutorError, ExecutorOutput, LlmWorker};

pub struct LlmCompressor {
    worker: LlmWorker,
}

impl LlmCompressor {
    pub fn new(worker: LlmWorker) -> Self {
        Self { worker }
    }
}

#[async_trait]
impl ContentCompressor for LlmCompressor {
    async fn compress(
        &self,
        request: &CompressionRequest,
        remaining_usd: f64,
    ) -> Result<ExecutorOutput<String>, ExecutorError> {
        let system = format!(
            "Compress the research notes you are given to at most {} characters. {} Output only the compressed notes.",
            request.max_output_chars, request.schema_hint
        );
        let (reply, cost) = self
            .worker
            .ask(&system, &request.content, remaining_usd)
            .await?;
        let reply = reply.trim().to_string();
        if reply.is_empty() {
            return Err(ExecutorError::transient("compression returned nothing").with_cost(cost));
        }
        Ok(ExecutorOutput::new(reply, cost))
    }
}
