//! Planner 接口与脚本化实现
//!
//! 协调者每次运行通过 PlannerFactory 新建一个 planner：start(brief) 交代目标与可用工具，
//! 之后反复 next_decision(上一条观察)，直到返回 Done。cost_usd() 报告 planner 自身的累计成本。

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::coordinator::PlannerError;
use crate::model::Goal;
use crate::tools::{ToolObservation, ToolSpec};

/// 一次工具调用决策（{"tool": "...", "args": {...}}）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub tool: String,
    #[serde(default)]
    pub args: Value,
}

impl Decision {
    pub fn new(tool: impl Into<String>, args: Value) -> Self {
        Self {
            tool: tool.into(),
            args,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlannerStep {
    Call(Decision),
    Done,
}

/// 运行开始时交给 planner 的简报
#[derive(Debug, Clone)]
pub struct RunBrief {
    pub goal: Goal,
    pub tools: Vec<ToolSpec>,
    /// 本次运行禁用的工具（如 skip_discovery 时的 discover_related）
    pub excluded_tools: Vec<String>,
}

impl RunBrief {
    pub fn is_excluded(&self, tool: &str) -> bool {
        self.excluded_tools.iter().any(|t| t == tool)
    }

    /// 去掉禁用工具后的工具列表
    pub fn available_tools(&self) -> impl Iterator<Item = &ToolSpec> {
        self.tools.iter().filter(|t| !self.is_excluded(&t.name))
    }
}

#[async_trait]
pub trait Planner: Send {
    fn start(&mut self, brief: &RunBrief);

    async fn next_decision(
        &mut self,
        last: Option<&ToolObservation>,
    ) -> Result<PlannerStep, PlannerError>;

    fn cost_usd(&self) -> f64;
}

/// 每次运行创建新的 planner，避免跨运行共享对话状态
pub trait PlannerFactory: Send + Sync {
    fn create(&self) -> Box<dyn Planner>;
}

impl<F> PlannerFactory for F
where
    F: Fn() -> Box<dyn Planner> + Send + Sync,
{
    fn create(&self) -> Box<dyn Planner> {
        self()
    }
}

/// planner 收到的观察记录，可在 planner 被装箱交给协调者后继续读取
pub type Transcript = Arc<Mutex<Vec<ToolObservation>>>;

/// 脚本化 planner（测试用）：按顺序给出决策，脚本耗尽即 Done
///
/// 禁用工具的决策会被跳过；failing_at(n) 让第 n 步（从 1 开始）返回错误。
#[derive(Debug, Clone, Default)]
pub struct ScriptedPlanner {
    script: VecDeque<Decision>,
    excluded: Vec<String>,
    cost_per_decision_usd: f64,
    cost_usd: f64,
    steps: usize,
    fail_at: Option<usize>,
    transcript: Transcript,
}

impl ScriptedPlanner {
    pub fn new(script: Vec<Decision>) -> Self {
        Self {
            script: script.into(),
            ..Self::default()
        }
    }

    pub fn with_cost_per_decision(mut self, cost_usd: f64) -> Self {
        self.cost_per_decision_usd = cost_usd;
        self
    }

    pub fn failing_at(mut self, step: usize) -> Self {
        self.fail_at = Some(step);
        self
    }

    pub fn transcript(&self) -> Transcript {
        Arc::clone(&self.transcript)
    }
}

#[async_trait]
impl Planner for ScriptedPlanner {
    fn start(&mut self, brief: &RunBrief) {
        self.excluded = brief.excluded_tools.clone();
    }

    async fn next_decision(
        &mut self,
        last: Option<&ToolObservation>,
    ) -> Result<PlannerStep, PlannerError> {
        if let Some(obs) = last {
            if let Ok(mut t) = self.transcript.lock() {
                t.push(obs.clone());
            }
        }
        self.steps += 1;
        if self.fail_at == Some(self.steps) {
            return Err(PlannerError::Scripted(self.steps));
        }
        self.cost_usd += self.cost_per_decision_usd;

        while let Some(decision) = self.script.pop_front() {
            if self.excluded.contains(&decision.tool) {
                continue;
            }
            return Ok(PlannerStep::Call(decision));
        }
        Ok(PlannerStep::Done)
    }

    fn cost_usd(&self) -> f64 {
        self.cost_usd
    }
}
