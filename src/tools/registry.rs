//! 委派工具集
//!
//! 按注册顺序保存工具（顺序即 planner 看到的工具列表顺序），dispatch(tool, args) 查找并调用工具，
//! 每次调用输出结构化审计日志（JSON）。未知工具名不报错，而是返回列出可用工具的观察。

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;

use crate::text::truncate_chars;
use crate::tools::{
    CrossReferenceTool, DelegationTool, DirectFetchTool, DiscoverTool, ExtractTool, ResearchTool,
    SummarizeTool, ToolContext, ToolDeps,
};

/// 一次工具调用的观察，回传给 planner
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolObservation {
    pub tool: String,
    pub args: Value,
    pub text: String,
}

/// 供 planner 理解工具的描述（名称、说明、参数 schema）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Default)]
pub struct DelegationToolset {
    tools: Vec<Arc<dyn DelegationTool>>,
}

impl DelegationToolset {
    pub fn new() -> Self {
        Self::default()
    }

    /// 六个标准委派工具，共享同一份依赖
    pub fn standard(deps: Arc<ToolDeps>) -> Self {
        let mut set = Self::new();
        set.register(ResearchTool::new(Arc::clone(&deps)));
        set.register(ExtractTool::new(Arc::clone(&deps)));
        set.register(CrossReferenceTool::new(Arc::clone(&deps)));
        set.register(DiscoverTool::new(Arc::clone(&deps)));
        set.register(SummarizeTool::new(Arc::clone(&deps)));
        set.register(DirectFetchTool::new(deps));
        set
    }

    /// 注册工具；同名工具替换原有条目（保持原位置）
    pub fn register(&mut self, tool: impl DelegationTool + 'static) {
        let tool: Arc<dyn DelegationTool> = Arc::new(tool);
        match self.tools.iter().position(|t| t.name() == tool.name()) {
            Some(i) => self.tools[i] = tool,
            None => self.tools.push(tool),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn DelegationTool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools
            .iter()
            .map(|t| ToolSpec {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect()
    }

    /// 调用指定工具并返回观察；输出 JSON 审计日志（含本次 worker 成本增量）
    pub async fn dispatch(&self, tool_name: &str, args: Value, ctx: &mut ToolContext<'_>) -> ToolObservation {
        let start = Instant::now();
        let cost_before = ctx.acc.worker_cost();

        let (known, text) = match self.get(tool_name) {
            Some(tool) => (true, tool.call(&args, ctx).await),
            None => (
                false,
                format!(
                    "Unknown tool '{tool_name}'. Available tools: {}.",
                    self.tool_names().join(", ")
                ),
            ),
        };

        let audit = serde_json::json!({
            "event": "tool_audit",
            "run_id": ctx.acc.run_id().to_string(),
            "tool": tool_name,
            "known": known,
            "duration_ms": start.elapsed().as_millis() as u64,
            "worker_cost_delta_usd": ctx.acc.worker_cost() - cost_before,
            "args_preview": args_preview(&args),
            "observation_preview": truncate_chars(&text, 160, "..."),
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        ToolObservation {
            tool: tool_name.to_string(),
            args,
            text,
        }
    }
}

fn args_preview(args: &Value) -> String {
    truncate_chars(&args.to_string(), 200, "...")
}
