//! discover_related：发现与目标相关的其他区域单元

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::accumulator::Accumulator;
use crate::executors::DiscoveryRequest;
use crate::model::{Category, Topic};
use crate::text::truncate_chars;
use crate::tools::{DelegationTool, ToolContext, ToolDeps};

/// 发现上下文中地理内容的最大字符数
const GEOGRAPHY_CONTEXT_CHARS: usize = 4000;

pub struct DiscoverTool {
    deps: Arc<ToolDeps>,
}

impl DiscoverTool {
    pub fn new(deps: Arc<ToolDeps>) -> Self {
        Self { deps }
    }
}

/// 由已有记录摘要与地理内容拼出发现上下文
fn discovery_context(acc: &Accumulator) -> String {
    let mut parts = Vec::new();
    if let Some(zone) = acc.record(Category::Zone) {
        let names: Vec<&str> = zone.entities.iter().map(|e| e.name.as_str()).collect();
        parts.push(format!("Zone record: {}\nEntities: {}", zone.summary, names.join(", ")));
    }
    let geography = acc.content(Topic::Geography).join("\n\n");
    if !geography.is_empty() {
        parts.push(truncate_chars(&geography, GEOGRAPHY_CONTEXT_CHARS, "..."));
    }
    parts.join("\n\n")
}

#[async_trait]
impl DelegationTool for DiscoverTool {
    fn name(&self) -> &str {
        "discover_related"
    }

    fn description(&self) -> &str {
        "Identify related regions (neighbouring or linked units) worth researching later. Works best after geography is researched. Args: {}"
    }

    async fn call(&self, _args: &Value, ctx: &mut ToolContext<'_>) -> String {
        let request = DiscoveryRequest {
            unit_id: ctx.goal.unit_id.clone(),
            display_name: ctx.goal.display_name.clone(),
            context: discovery_context(ctx.acc),
        };
        let outcome = self
            .deps
            .workers
            .discoverer
            .invoke(|d, remaining| d.discover(&request, remaining))
            .await;

        match outcome {
            Ok(out) => {
                ctx.acc.add_worker_cost(out.cost_usd);
                let found = out.value.len();
                let added = ctx.acc.add_discovered(out.value, &ctx.goal.unit_id);
                format!(
                    "Discovered {found} related unit(s), {added} new. Known related units: {}.",
                    if ctx.acc.discovered_units().is_empty() {
                        "none".to_string()
                    } else {
                        ctx.acc.discovered_units().join(", ")
                    }
                )
            }
            Err(failure) => {
                ctx.acc.add_worker_cost(failure.cost_usd);
                tracing::warn!(error = %failure, "discovery failed");
                format!("Discovery failed: {failure}. No related units were recorded.")
            }
        }
    }
}
