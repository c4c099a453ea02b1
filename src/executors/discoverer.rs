//! 关联单元发现执行器（LLM）：给出值得后续调研的相邻区域标识

use async_trait::async_trait;

use crate::executors::{DiscoveryRequest, ExecutorError, ExecutorOutput, LlmWorker, UnitDiscoverer};

const SYSTEM: &str = "You suggest neighbouring or closely related regions of a game world that deserve their own research. Respond with a JSON array of identifiers written in the same style as the given subject identifier.";

pub struct LlmDiscoverer {
    worker: LlmWorker,
}

impl LlmDiscoverer {
    pub fn new(worker: LlmWorker) -> Self {
        Self { worker }
    }
}

#[async_trait]
impl UnitDiscoverer for LlmDiscoverer {
    async fn discover(
        &self,
        request: &DiscoveryRequest,
        remaining_usd: f64,
    ) -> Result<ExecutorOutput<Vec<String>>, ExecutorError> {
        let prompt = format!(
            "Subject identifier: {}\nSubject: {}\nWhat we know so far:\n{}",
            request.unit_id, request.display_name, request.context
        );
        self.worker
            .ask_json::<Vec<String>>(SYSTEM, &prompt, remaining_usd)
            .await
    }
}
