//! research_topic：调研一个主题并把内容追加到累加器

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::executors::{FetchGateway, ResearchRequest};
use crate::tools::{topic_arg, topic_schema, DelegationTool, ToolContext, ToolDeps};

pub struct ResearchTool {
    deps: Arc<ToolDeps>,
}

impl ResearchTool {
    pub fn new(deps: Arc<ToolDeps>) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl DelegationTool for ResearchTool {
    fn name(&self) -> &str {
        "research_topic"
    }

    fn description(&self) -> &str {
        "Research one topic about the target region. Appends gathered content and sources for that topic. Args: {\"topic\": one of geography, inhabitants, history, quests, items}"
    }

    fn parameters_schema(&self) -> Value {
        topic_schema()
    }

    async fn call(&self, args: &Value, ctx: &mut ToolContext<'_>) -> String {
        let topic = match topic_arg(args) {
            Ok(t) => t,
            Err(msg) => return msg,
        };
        let catalog = &self.deps.catalog;
        let request = ResearchRequest {
            unit_id: ctx.goal.unit_id.clone(),
            display_name: ctx.goal.display_name.clone(),
            topic,
            directive: catalog.topic_instructions(topic),
            max_urls: self.deps.settings.max_research_urls,
        };

        // 网关持有缓存副本，只有调研成功才写回累加器
        let workers = &self.deps.workers;
        let gateway = FetchGateway::new(&workers.fetcher, &workers.trust, ctx.acc.url_cache().clone());
        let outcome = workers
            .researcher
            .invoke(|r, remaining| r.research(&request, &gateway, remaining))
            .await;
        let network_fetches = gateway.network_fetches();
        let (cache, fetch_cost) = gateway.finish();
        ctx.acc.add_worker_cost(fetch_cost);

        let research = match outcome {
            Ok(out) => {
                ctx.acc.add_worker_cost(out.cost_usd);
                out.value
            }
            Err(failure) => {
                ctx.acc.add_worker_cost(failure.cost_usd);
                tracing::warn!(topic = %topic, error = %failure, "research failed");
                return format!(
                    "Research on '{topic}' failed: {failure}. Nothing was recorded for this topic; continue with other topics or retry later."
                );
            }
        };

        ctx.acc.restore_url_cache(cache);
        let mut blocks: Vec<String> = research
            .blocks
            .into_iter()
            .filter(|b| !b.trim().is_empty())
            .collect();
        if !ctx.acc.has_content(topic) {
            if let Some(first) = blocks.first_mut() {
                *first = format!("{}\n\n{}", catalog.section_header(topic), first);
            }
        }
        let block_count = blocks.len();
        let source_count = research.sources.len();
        ctx.acc.append_content(topic, blocks);
        ctx.acc.extend_sources(research.sources);

        format!(
            "Researched '{topic}': {block_count} content block(s), {source_count} source(s) ({network_fetches} fetched from the network). '{topic}' now holds {} chars.",
            ctx.acc.content_chars(topic)
        )
    }
}
