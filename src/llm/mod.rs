//! LLM 层：客户端抽象、OpenAI 兼容实现、脚本化 Mock、token 计价

pub mod message;
pub mod mock;
pub mod openai;
pub mod pricing;
pub mod traits;

pub use message::{Message, Role};
pub use mock::ScriptedLlmClient;
pub use openai::{OpenAiClient, TokenUsage};
pub use pricing::{TokenEstimator, TokenPricing, UsageSnapshot};
pub use traits::LlmClient;
