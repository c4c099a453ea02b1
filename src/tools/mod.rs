//! 委派工具
//!
//! 六个工具各包装一个有界执行器，是 planner 唯一能调用的能力。工具只接收最小决策参数（主题、类别、URL），
//! 其余上下文从累加器读取；执行结果写回累加器，返回给 planner 的永远是一段简短文字观察，从不抛错。
//! 执行器失败时只累加其报告的成本，其余累加器状态保持不变。

pub mod cross_reference;
pub mod direct_fetch;
pub mod discoverer;
pub mod extractor;
pub mod registry;
pub mod researcher;
pub mod summarizer;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::accumulator::Accumulator;
use crate::catalog::TopicCatalog;
use crate::config::ToolsSection;
use crate::executors::Workers;
use crate::model::{Category, Goal, Topic};

pub use cross_reference::{cap_confidence, CrossReferenceTool, ZERO_ENTITY_CONFIDENCE_CAP};
pub use direct_fetch::DirectFetchTool;
pub use discoverer::DiscoverTool;
pub use extractor::ExtractTool;
pub use registry::{DelegationToolset, ToolObservation, ToolSpec};
pub use researcher::ResearchTool;
pub use summarizer::SummarizeTool;

/// 一次工具调用可见的运行状态：当前目标 + 独占的累加器
pub struct ToolContext<'a> {
    pub goal: &'a Goal,
    pub acc: &'a mut Accumulator,
}

/// 委派工具 trait：名称、描述（供 planner 理解）、参数 schema、调用（永远返回观察文本）
#[async_trait]
pub trait DelegationTool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn call(&self, args: &Value, ctx: &mut ToolContext<'_>) -> String;
}

/// 所有工具共享的依赖：执行器、主题目录、工具参数
pub struct ToolDeps {
    pub workers: Workers,
    pub catalog: Arc<dyn TopicCatalog>,
    pub settings: ToolsSection,
}

impl ToolDeps {
    pub fn new(workers: Workers, catalog: Arc<dyn TopicCatalog>, settings: ToolsSection) -> Self {
        Self {
            workers,
            catalog,
            settings,
        }
    }
}

pub(crate) fn str_arg<'v>(args: &'v Value, key: &str) -> Option<&'v str> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn topic_names() -> String {
    Topic::RESEARCHABLE
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn category_names() -> String {
    Category::ALL
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// 解析 topic 参数；失败时返回给 planner 的提示
pub(crate) fn topic_arg(args: &Value) -> Result<Topic, String> {
    let raw = str_arg(args, "topic")
        .ok_or_else(|| format!("Missing \"topic\". Valid topics: {}.", topic_names()))?;
    Topic::parse_researchable(raw)
        .ok_or_else(|| format!("Unknown topic '{raw}'. Valid topics: {}.", topic_names()))
}

/// 解析 category 参数；失败时返回给 planner 的提示
pub(crate) fn category_arg(args: &Value) -> Result<Category, String> {
    let raw = str_arg(args, "category")
        .ok_or_else(|| format!("Missing \"category\". Valid categories: {}.", category_names()))?;
    raw.parse::<Category>().map_err(|_| {
        format!(
            "Unknown category '{raw}'. Valid categories: {}.",
            category_names()
        )
    })
}

pub(crate) fn topic_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "topic": {
                "type": "string",
                "enum": Topic::RESEARCHABLE.iter().map(|t| t.as_str()).collect::<Vec<_>>()
            }
        },
        "required": ["topic"]
    })
}
