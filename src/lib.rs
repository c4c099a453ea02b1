//! Forage - 目标驱动的区域调研协调器
//!
//! 模块划分：
//! - **model**: 主题、类别、来源引用、类别记录、目标与最终结果
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / 脚本化 Mock）、token 计价
//! - **accumulator**: 运行级累加器、URL 规范化与缓存
//! - **catalog**: 主题目录（调研指令、段落标题、摘要提示）
//! - **executors**: 有界子任务执行器（重试 + 成本上限）与默认实现
//! - **tools**: 六个委派工具与工具集
//! - **coordinator**: planner 接口、协调主循环、结果组装
//! - **builder**: 从配置组装协调者

pub mod accumulator;
pub mod builder;
pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod executors;
pub mod llm;
pub mod model;
pub mod observability;
pub mod text;
pub mod tools;

pub use builder::CoordinatorBuilder;
pub use coordinator::{Coordinator, CoordinatorError};
pub use model::{FinalResult, Goal};
