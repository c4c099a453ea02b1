//! 类别抽取执行器（LLM）：每个类别一个实例，输出一个 CategoryRecord

use async_trait::async_trait;

use crate::executors::{CategoryExtractor, ExecutorError, ExecutorOutput, ExtractionRequest, LlmWorker};
use crate::model::{Category, CategoryRecord};

const SYSTEM: &str = "You convert research notes about a game-world region into structured JSON records. Never invent facts that are not in the notes.";

pub struct LlmExtractor {
    worker: LlmWorker,
    category: Category,
}

impl LlmExtractor {
    pub fn new(worker: LlmWorker, category: Category) -> Self {
        Self { worker, category }
    }
}

#[async_trait]
impl CategoryExtractor for LlmExtractor {
    async fn extract(
        &self,
        request: &ExtractionRequest,
        remaining_usd: f64,
    ) -> Result<ExecutorOutput<CategoryRecord>, ExecutorError> {
        let prompt = format!(
            "Subject: {} ({})\n{}\n\nNotes:\n{}",
            request.display_name, request.unit_id, request.instructions, request.content
        );
        let mut out = self
            .worker
            .ask_json::<CategoryRecord>(SYSTEM, &prompt, remaining_usd)
            .await?;
        if out.value.category != self.category {
            tracing::warn!(
                expected = %self.category,
                got = %out.value.category,
                "extractor returned a record for another category, relabelling"
            );
            out.value.category = self.category;
        }
        out.value.entities.retain(|e| !e.name.trim().is_empty());
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ScriptedLlmClient, TokenPricing};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_record_relabelled_and_blank_entities_dropped() {
        let llm = Arc::new(ScriptedLlmClient::new([
            r#"{"category": "zone", "entities": [{"name": "Marshal McBride"}, {"name": " "}], "summary": "s"}"#,
        ]));
        let extractor = LlmExtractor::new(LlmWorker::new(llm, TokenPricing::default()), Category::Npcs);
        let req = ExtractionRequest {
            unit_id: "elwynn-forest".into(),
            display_name: "Elwynn Forest".into(),
            category: Category::Npcs,
            instructions: "Extract npcs.".into(),
            content: "Marshal McBride stands at Northshire Abbey.".into(),
        };
        let out = extractor.extract(&req, 1.0).await.unwrap();
        assert_eq!(out.value.category, Category::Npcs);
        assert_eq!(out.value.entity_count(), 1);
    }
}
