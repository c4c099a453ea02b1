//! 协调层：planner 接口、协调主循环、结果组装

pub mod assembler;
pub mod error;
pub mod llm_planner;
pub mod loop_;
pub mod planner;

pub use assembler::assemble;
pub use error::{CoordinatorError, PlannerError};
pub use llm_planner::{parse_decision, LlmPlanner};
pub use loop_::{Coordinator, DISCOVERY_TOOL};
pub use planner::{
    Decision, Planner, PlannerFactory, PlannerStep, RunBrief, ScriptedPlanner, Transcript,
};
