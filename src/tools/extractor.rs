//! extract_category：从某类别对应主题的内容中抽取结构化记录

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::executors::ExtractionRequest;
use crate::model::Category;
use crate::tools::{category_arg, DelegationTool, ToolContext, ToolDeps};

/// 抽取请求中附带的来源 URL 上限
const MAX_LISTED_SOURCES: usize = 20;

pub struct ExtractTool {
    deps: Arc<ToolDeps>,
}

impl ExtractTool {
    pub fn new(deps: Arc<ToolDeps>) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl DelegationTool for ExtractTool {
    fn name(&self) -> &str {
        "extract_category"
    }

    fn description(&self) -> &str {
        "Extract a structured record for one category from the researched content of its topic (zone<-geography, npcs<-inhabitants, factions<-history, quests<-quests, items<-items). Research the topic first. Args: {\"category\": one of zone, npcs, factions, quests, items}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "category": {
                    "type": "string",
                    "enum": Category::ALL.iter().map(|c| c.as_str()).collect::<Vec<_>>()
                }
            },
            "required": ["category"]
        })
    }

    async fn call(&self, args: &Value, ctx: &mut ToolContext<'_>) -> String {
        let category = match category_arg(args) {
            Ok(c) => c,
            Err(msg) => return msg,
        };
        let catalog = &self.deps.catalog;
        let topic = catalog.topic_for_category(category);
        if !ctx.acc.has_content(topic) {
            return format!(
                "No content for topic '{topic}' yet. Call research_topic with topic \"{topic}\" before extracting '{category}'."
            );
        }
        let Some(executor) = self.deps.workers.extractor(category) else {
            return format!("No extractor is configured for '{category}'.");
        };

        let mut content = ctx.acc.content(topic).join("\n\n");
        let urls: Vec<&str> = ctx
            .acc
            .sources()
            .iter()
            .map(|s| s.normalized_url.as_str())
            .take(MAX_LISTED_SOURCES)
            .collect();
        if !urls.is_empty() {
            content.push_str("\n\nKnown sources:\n");
            for url in urls {
                content.push_str("- ");
                content.push_str(url);
                content.push('\n');
            }
        }
        let request = ExtractionRequest {
            unit_id: ctx.goal.unit_id.clone(),
            display_name: ctx.goal.display_name.clone(),
            category,
            instructions: catalog.extraction_instructions(category),
            content,
        };

        match executor.invoke(|e, remaining| e.extract(&request, remaining)).await {
            Ok(out) => {
                ctx.acc.add_worker_cost(out.cost_usd);
                let entities = out.value.entity_count();
                let replaced = ctx.acc.set_record(out.value).is_some();
                if replaced {
                    tracing::warn!(category = %category, "replacing existing category record");
                    format!("Extracted '{category}': {entities} entities (replaced the previous record).")
                } else {
                    format!("Extracted '{category}': {entities} entities.")
                }
            }
            Err(failure) => {
                ctx.acc.add_worker_cost(failure.cost_usd);
                tracing::warn!(category = %category, error = %failure, "extraction failed");
                format!("Extraction of '{category}' failed: {failure}. No record was stored.")
            }
        }
    }
}
