//! fetch_url：直接抓取一个 URL，内容放入保留的 direct 桶
//!
//! 与调研执行器共用抓取网关，因此同样按规范化 URL 去重；返回给 planner 的正文按 observation_chars 截断。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::executors::{FetchGateway, GatewayError};
use crate::model::Topic;
use crate::text::truncate_chars;
use crate::tools::{str_arg, DelegationTool, ToolContext, ToolDeps};

pub struct DirectFetchTool {
    deps: Arc<ToolDeps>,
}

impl DirectFetchTool {
    pub fn new(deps: Arc<ToolDeps>) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl DelegationTool for DirectFetchTool {
    fn name(&self) -> &str {
        "fetch_url"
    }

    fn description(&self) -> &str {
        "Fetch one specific page and keep its text as extra material. Already-fetched URLs are served from the run cache. Args: {\"url\": \"https://...\"}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "Absolute http(s) URL" }
            },
            "required": ["url"]
        })
    }

    async fn call(&self, args: &Value, ctx: &mut ToolContext<'_>) -> String {
        let Some(url) = str_arg(args, "url") else {
            return "Missing \"url\". Provide an absolute http(s) URL.".to_string();
        };

        let workers = &self.deps.workers;
        let gateway = FetchGateway::new(&workers.fetcher, &workers.trust, ctx.acc.take_url_cache());
        let outcome = gateway.fetch(url).await;
        let (cache, cost) = gateway.finish();
        ctx.acc.restore_url_cache(cache);
        ctx.acc.add_worker_cost(cost);

        let page = match outcome {
            Ok(page) => page,
            Err(GatewayError::Url(e)) => return format!("Invalid URL: {e}."),
            Err(GatewayError::Fetch(failure)) => {
                tracing::warn!(url = %url, error = %failure, "direct fetch failed");
                return format!("Fetch of {url} failed: {failure}. Nothing was recorded.");
            }
        };

        let status = if page.from_cache() { "Served from cache" } else { "Fetched" };
        let title = page.source.title.clone().unwrap_or_else(|| "untitled".to_string());
        let preview = truncate_chars(&page.content, self.deps.settings.observation_chars, "\n[truncated]");
        let block = format!(
            "{}\n\n[{}]\n{}",
            self.deps.catalog.section_header(Topic::Direct),
            page.source.normalized_url,
            page.content
        );
        ctx.acc.append_content(Topic::Direct, [block]);
        ctx.acc.push_source(page.source);

        format!("{status} {url} ({title}):\n{preview}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::Accumulator;
    use crate::config::ToolsSection;
    use crate::executors::mock::StaticFetcher;
    use crate::model::Goal;
    use crate::tools::test_support::Mocks;

    const URL: &str = "https://wowpedia.fandom.com/wiki/Northshire_Abbey";

    fn mocks() -> Mocks {
        Mocks {
            fetcher: Arc::new(StaticFetcher::new().with_page(URL, &"Northshire Abbey. ".repeat(50))),
            ..Mocks::default()
        }
    }

    #[tokio::test]
    async fn test_fetch_stores_direct_content_and_truncates_observation() {
        let mocks = mocks();
        let settings = ToolsSection {
            observation_chars: 40,
            ..ToolsSection::default()
        };
        let tool = DirectFetchTool::new(mocks.deps(settings));
        let goal = Goal::new("elwynn", "Elwynn Forest");
        let mut acc = Accumulator::new();

        let obs = tool
            .call(&serde_json::json!({"url": URL}), &mut ToolContext { goal: &goal, acc: &mut acc })
            .await;

        assert!(obs.starts_with("Fetched"), "{obs}");
        assert!(obs.ends_with("[truncated]"), "{obs}");
        assert_eq!(acc.content(Topic::Direct).len(), 1);
        assert!(acc.content(Topic::Direct)[0].contains(&"Northshire Abbey. ".repeat(50)));
        assert_eq!(acc.sources().len(), 1);
        // direct 桶不计入已调研主题
        assert_eq!(acc.researched_topic_count(), 0);
    }

    #[tokio::test]
    async fn test_equivalent_url_hits_cache() {
        let mocks = mocks();
        let tool = DirectFetchTool::new(mocks.deps(ToolsSection::default()));
        let goal = Goal::new("elwynn", "Elwynn Forest");
        let mut acc = Accumulator::new();

        tool.call(&serde_json::json!({"url": URL}), &mut ToolContext { goal: &goal, acc: &mut acc })
            .await;
        let obs = tool
            .call(
                &serde_json::json!({"url": "wowpedia.fandom.com/wiki/Northshire_Abbey#History"}),
                &mut ToolContext { goal: &goal, acc: &mut acc },
            )
            .await;

        assert!(obs.starts_with("Served from cache"), "{obs}");
        assert_eq!(mocks.fetcher.calls(), 1);
        assert_eq!(acc.sources().len(), 2);
        assert!(acc.sources()[1].from_cache);
        assert_eq!(acc.content(Topic::Direct).len(), 2);
    }

    #[tokio::test]
    async fn test_failed_fetch_records_nothing() {
        let mocks = mocks();
        let tool = DirectFetchTool::new(mocks.deps(ToolsSection::default()));
        let goal = Goal::new("elwynn", "Elwynn Forest");
        let mut acc = Accumulator::new();

        let missing = tool
            .call(
                &serde_json::json!({"url": "https://example.com/missing"}),
                &mut ToolContext { goal: &goal, acc: &mut acc },
            )
            .await;
        let invalid = tool
            .call(
                &serde_json::json!({"url": "ftp://example.com/file"}),
                &mut ToolContext { goal: &goal, acc: &mut acc },
            )
            .await;

        assert!(missing.contains("failed"), "{missing}");
        assert!(invalid.starts_with("Invalid URL"), "{invalid}");
        assert!(!acc.has_content(Topic::Direct));
        assert!(acc.sources().is_empty());
        assert!(acc.url_cache().is_empty());
    }
}
