//! summarize_topic：把过长的主题内容交给压缩服务缩短
//!
//! 低于阈值时不做任何事；压缩服务不可用或结果没有变短时保留原内容（降级，不视为错误）。
//! 输出上限 = max(min_summary_chars, summary_budget_chars / 已调研主题数)。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::ToolsSection;
use crate::executors::CompressionRequest;
use crate::tools::{topic_arg, topic_schema, DelegationTool, ToolContext, ToolDeps};

pub struct SummarizeTool {
    deps: Arc<ToolDeps>,
}

impl SummarizeTool {
    pub fn new(deps: Arc<ToolDeps>) -> Self {
        Self { deps }
    }
}

pub fn max_output_chars(settings: &ToolsSection, researched_topics: usize) -> usize {
    let share = settings.summary_budget_chars / researched_topics.max(1);
    share.max(settings.min_summary_chars)
}

#[async_trait]
impl DelegationTool for SummarizeTool {
    fn name(&self) -> &str {
        "summarize_topic"
    }

    fn description(&self) -> &str {
        "Compress the accumulated content of one topic when it has grown large. Does nothing for short content. Args: {\"topic\": one of geography, inhabitants, history, quests, items}"
    }

    fn parameters_schema(&self) -> Value {
        topic_schema()
    }

    async fn call(&self, args: &Value, ctx: &mut ToolContext<'_>) -> String {
        let topic = match topic_arg(args) {
            Ok(t) => t,
            Err(msg) => return msg,
        };
        if !ctx.acc.has_content(topic) {
            return format!("Nothing to summarize: '{topic}' has no content yet.");
        }
        let settings = &self.deps.settings;
        let before = ctx.acc.content_chars(topic);
        if before < settings.summarize_threshold_chars {
            return format!(
                "'{topic}' holds {before} chars, below the {}-char threshold; left unchanged.",
                settings.summarize_threshold_chars
            );
        }

        let request = CompressionRequest {
            content: ctx.acc.content(topic).join("\n\n"),
            schema_hint: self.deps.catalog.schema_hint(topic),
            max_output_chars: max_output_chars(settings, ctx.acc.researched_topic_count()),
        };
        let outcome = self
            .deps
            .workers
            .compressor
            .invoke(|c, remaining| c.compress(&request, remaining))
            .await;

        match outcome {
            Ok(out) => {
                ctx.acc.add_worker_cost(out.cost_usd);
                let after = out.value.chars().count();
                if out.value.trim().is_empty() || after >= before {
                    tracing::warn!(topic = %topic, before, after, "summary did not shrink content");
                    return format!(
                        "Summarization of '{topic}' did not shrink it ({before} -> {after} chars); original content kept (degraded, not an error)."
                    );
                }
                ctx.acc.replace_content(topic, out.value);
                format!("Summarized '{topic}': {before} -> {after} chars.")
            }
            Err(failure) => {
                ctx.acc.add_worker_cost(failure.cost_usd);
                tracing::warn!(topic = %topic, error = %failure, "summarization unavailable");
                format!(
                    "Summarization service unavailable for '{topic}' ({failure}); original content kept (degraded, not an error)."
                )
            }
        }
    }
}
