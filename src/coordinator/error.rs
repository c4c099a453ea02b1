//! 协调层错误
//!
//! 执行器失败从不出现在这里：委派工具已把它们转成文字观察。只有 planner 故障与非法目标会终止一次运行。

use thiserror::Error;

/// planner 接口错误；对协调者而言是致命的
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlannerError {
    #[error("planner LLM error: {0}")]
    Llm(String),

    #[error("planner produced malformed output {attempts} time(s) in a row: {detail}")]
    MalformedOutput { attempts: usize, detail: String },

    #[error("planner not started")]
    NotStarted,

    #[error("scripted planner failure at step {0}")]
    Scripted(usize),
}

#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("invalid goal: {0}")]
    InvalidGoal(String),

    #[error("planner failed: {0}")]
    Planner(#[from] PlannerError),

    #[error("coordinator not configured: {0}")]
    Config(String),
}
