//! 协调主循环
//!
//! 新建累加器 -> 简报 planner -> (决策 -> 委派工具 -> 观察) 循环 -> planner 报告完成 -> 组装结果。
//! 循环本身没有步数上限与超时；planner 错误是唯一的致命路径，此时不产生任何结果。

use std::sync::Arc;

use tracing::Instrument;

use crate::accumulator::Accumulator;
use crate::coordinator::{assemble, CoordinatorError, PlannerFactory, PlannerStep, RunBrief};
use crate::model::{FinalResult, Goal};
use crate::tools::{DelegationToolset, ToolContext, ToolObservation};

/// skip_discovery 时禁用的工具
pub const DISCOVERY_TOOL: &str = "discover_related";

pub struct Coordinator {
    planners: Arc<dyn PlannerFactory>,
    tools: DelegationToolset,
}

impl Coordinator {
    pub fn new(planners: Arc<dyn PlannerFactory>, tools: DelegationToolset) -> Self {
        Self { planners, tools }
    }

    pub fn tools(&self) -> &DelegationToolset {
        &self.tools
    }

    fn brief(&self, goal: &Goal) -> RunBrief {
        let excluded_tools = if goal.skip_discovery {
            vec![DISCOVERY_TOOL.to_string()]
        } else {
            Vec::new()
        };
        RunBrief {
            goal: goal.clone(),
            tools: self.tools.specs(),
            excluded_tools,
        }
    }

    /// 为一个目标执行一次完整的协调运行
    pub async fn run(&self, goal: &Goal) -> Result<FinalResult, CoordinatorError> {
        if goal.unit_id.trim().is_empty() {
            return Err(CoordinatorError::InvalidGoal("unit_id is empty".to_string()));
        }
        let acc = Accumulator::new();
        let span = tracing::info_span!("run", run_id = %acc.run_id(), unit_id = %goal.unit_id);
        self.run_with(goal, acc).instrument(span).await
    }

    async fn run_with(&self, goal: &Goal, mut acc: Accumulator) -> Result<FinalResult, CoordinatorError> {
        let brief = self.brief(goal);
        let mut planner = self.planners.create();
        planner.start(&brief);
        tracing::info!(skip_discovery = goal.skip_discovery, "run started");

        let mut last: Option<ToolObservation> = None;
        let mut steps = 0usize;
        loop {
            let step = match planner.next_decision(last.as_ref()).await {
                Ok(step) => step,
                Err(e) => {
                    tracing::error!(error = %e, steps, "planner failed, aborting run");
                    return Err(e.into());
                }
            };
            let decision = match step {
                PlannerStep::Done => break,
                PlannerStep::Call(decision) => decision,
            };
            steps += 1;

            let observation = if brief.is_excluded(&decision.tool) {
                tracing::warn!(tool = %decision.tool, "planner called a disabled tool");
                ToolObservation {
                    text: format!("Tool '{}' is disabled for this run.", decision.tool),
                    tool: decision.tool,
                    args: decision.args,
                }
            } else {
                let mut ctx = ToolContext {
                    goal,
                    acc: &mut acc,
                };
                self.tools.dispatch(&decision.tool, decision.args, &mut ctx).await
            };
            last = Some(observation);
        }

        let planner_cost_usd = planner.cost_usd();
        let result = assemble(acc, &goal.unit_id, planner_cost_usd);
        tracing::info!(
            steps,
            records = result.category_records.len(),
            sources = result.sources.len(),
            planner_cost_usd = result.planner_cost_usd,
            worker_cost_usd = result.worker_cost_usd,
            "run finished"
        );
        Ok(result)
    }
}
