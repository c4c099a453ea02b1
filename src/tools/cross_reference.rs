//! cross_reference：核对已抽取的类别记录之间是否一致
//!
//! 主类别（zone）记录缺失时拒绝执行。结果写入前做置信度修正：所有值截到 [0, 1]，
//! 记录缺失或实体数为 0 的类别置信度不超过 ZERO_ENTITY_CONFIDENCE_CAP，不论执行器给出多少。

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::executors::CrossReferenceRequest;
use crate::model::{Category, CategoryRecord, CrossReferenceResult};
use crate::tools::{DelegationTool, ToolContext, ToolDeps};

pub const ZERO_ENTITY_CONFIDENCE_CAP: f64 = 0.2;

/// 修正执行器返回的置信度
pub fn cap_confidence(
    mut result: CrossReferenceResult,
    records: &BTreeMap<Category, CategoryRecord>,
) -> CrossReferenceResult {
    for (category, confidence) in result.confidence.iter_mut() {
        let mut value = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        let empty = records.get(category).map_or(true, |r| r.entity_count() == 0);
        if empty {
            value = value.min(ZERO_ENTITY_CONFIDENCE_CAP);
        }
        *confidence = value;
    }
    result
}

pub struct CrossReferenceTool {
    deps: Arc<ToolDeps>,
}

impl CrossReferenceTool {
    pub fn new(deps: Arc<ToolDeps>) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl DelegationTool for CrossReferenceTool {
    fn name(&self) -> &str {
        "cross_reference"
    }

    fn description(&self) -> &str {
        "Check the extracted category records against each other for consistency and score confidence per category. Requires the zone record. Args: {}"
    }

    async fn call(&self, _args: &Value, ctx: &mut ToolContext<'_>) -> String {
        if ctx.acc.record(Category::PRIMARY).is_none() {
            return format!(
                "Cannot cross-reference yet: the primary category '{}' has no record. Call extract_category with category \"{}\" first.",
                Category::PRIMARY,
                Category::PRIMARY
            );
        }

        let request = CrossReferenceRequest {
            unit_id: ctx.goal.unit_id.clone(),
            display_name: ctx.goal.display_name.clone(),
            records: ctx.acc.records().values().cloned().collect(),
        };
        let outcome = self
            .deps
            .workers
            .cross_referencer
            .invoke(|x, remaining| x.cross_reference(&request, remaining))
            .await;

        let result = match outcome {
            Ok(out) => {
                ctx.acc.add_worker_cost(out.cost_usd);
                cap_confidence(out.value, ctx.acc.records())
            }
            Err(failure) => {
                ctx.acc.add_worker_cost(failure.cost_usd);
                tracing::warn!(error = %failure, "cross reference failed");
                return format!("Cross-reference failed: {failure}. No result was stored.");
            }
        };

        let low: Vec<String> = result
            .confidence
            .iter()
            .filter(|(_, c)| **c <= ZERO_ENTITY_CONFIDENCE_CAP)
            .map(|(cat, c)| format!("{cat}={c:.2}"))
            .collect();
        let mut obs = format!(
            "Cross-reference {}: {} conflict(s) across {} record(s).",
            if result.consistent { "consistent" } else { "found inconsistencies" },
            result.conflicts.len(),
            request.records.len()
        );
        for conflict in result.conflicts.iter().take(5) {
            obs.push_str(&format!("\n- {}", conflict.description));
        }
        if !low.is_empty() {
            obs.push_str(&format!("\nLow confidence: {}.", low.join(", ")));
        }
        if ctx.acc.set_cross_reference(result).is_some() {
            tracing::warn!("replacing existing cross reference result");
            obs.push_str("\n(Replaced the previous cross-reference result.)");
        }
        obs
    }
}
