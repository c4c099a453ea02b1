//! 有界子任务执行器
//!
//! 六类执行器各有输出契约（trait）；重试次数与成本上限由 Bounded 包装统一施加。
//! 执行器通过 Workers 注入协调层，委派工具从不自行构造执行器，测试可逐个替换为 mock。

pub mod bounded;
pub mod compressor;
pub mod cross_reference;
pub mod discoverer;
pub mod extractor;
pub mod fetch;
pub mod gateway;
pub mod llm_worker;
pub mod mock;
pub mod researcher;
pub mod workers;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{Category, CategoryRecord, CrossReferenceResult, SourceReference, Topic};

pub use bounded::{Bounded, ExecutorPolicy};
pub use compressor::LlmCompressor;
pub use cross_reference::LlmCrossReferencer;
pub use discoverer::LlmDiscoverer;
pub use extractor::LlmExtractor;
pub use fetch::HttpFetcher;
pub use gateway::{FetchGateway, FetchedPage, GatewayError};
pub use llm_worker::LlmWorker;
pub use researcher::LlmResearcher;
pub use workers::Workers;

/// 执行器成功输出：值 + 本次（含重试）报告的成本
#[derive(Debug, Clone)]
pub struct ExecutorOutput<T> {
    pub value: T,
    pub cost_usd: f64,
}

impl<T> ExecutorOutput<T> {
    pub fn new(value: T, cost_usd: f64) -> Self {
        Self { value, cost_usd }
    }

    /// 无成本输出（如 HTTP 抓取）
    pub fn free(value: T) -> Self {
        Self::new(value, 0.0)
    }
}

/// 单次尝试的错误；只有 Transient 会被 Bounded 重试
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutorError {
    #[error("transient: {message}")]
    Transient { message: String, cost_usd: f64 },

    #[error("{message}")]
    Permanent { message: String, cost_usd: f64 },

    #[error("cost ceiling ${ceiling_usd:.4} reached (spent ${spent_usd:.4})")]
    CostCeiling { ceiling_usd: f64, spent_usd: f64 },
}

impl ExecutorError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
            cost_usd: 0.0,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent {
            message: message.into(),
            cost_usd: 0.0,
        }
    }

    /// 附加本次失败尝试已产生的成本（如 LLM 已回复但解析失败）
    pub fn with_cost(self, cost: f64) -> Self {
        match self {
            Self::Transient { message, .. } => Self::Transient {
                message,
                cost_usd: cost,
            },
            Self::Permanent { message, .. } => Self::Permanent {
                message,
                cost_usd: cost,
            },
            other => other,
        }
    }

    pub fn cost_usd(&self) -> f64 {
        match self {
            Self::Transient { cost_usd, .. } | Self::Permanent { cost_usd, .. } => *cost_usd,
            Self::CostCeiling { .. } => 0.0,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// 执行器在内部重试耗尽后的最终失败；委派工具把它转成文字观察，不再上抛
#[derive(Error, Debug, Clone)]
#[error("{executor} failed after {attempts} attempt(s): {source}")]
pub struct ExecutorFailure {
    pub executor: String,
    pub attempts: u32,
    /// 所有尝试累计报告的成本
    pub cost_usd: f64,
    pub source: ExecutorError,
}

// --- 请求与输出契约 ---

#[derive(Debug, Clone)]
pub struct ResearchRequest {
    pub unit_id: String,
    pub display_name: String,
    pub topic: Topic,
    pub directive: String,
    pub max_urls: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Research {
    pub blocks: Vec<String>,
    pub sources: Vec<SourceReference>,
}

#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub unit_id: String,
    pub display_name: String,
    pub category: Category,
    pub instructions: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct CrossReferenceRequest {
    pub unit_id: String,
    pub display_name: String,
    pub records: Vec<CategoryRecord>,
}

#[derive(Debug, Clone)]
pub struct DiscoveryRequest {
    pub unit_id: String,
    pub display_name: String,
    pub context: String,
}

#[derive(Debug, Clone)]
pub struct CompressionRequest {
    pub content: String,
    pub schema_hint: String,
    pub max_output_chars: usize,
}

/// 抓取得到的文档（已转为纯文本）
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedDocument {
    pub title: Option<String>,
    pub text: String,
}

// --- 执行器契约；remaining_usd 为本次尝试可用的剩余预算 ---

#[async_trait]
pub trait ContentResearcher: Send + Sync {
    async fn research(
        &self,
        request: &ResearchRequest,
        web: &FetchGateway<'_>,
        remaining_usd: f64,
    ) -> Result<ExecutorOutput<Research>, ExecutorError>;
}

#[async_trait]
pub trait CategoryExtractor: Send + Sync {
    async fn extract(
        &self,
        request: &ExtractionRequest,
        remaining_usd: f64,
    ) -> Result<ExecutorOutput<CategoryRecord>, ExecutorError>;
}

#[async_trait]
pub trait CrossReferencer: Send + Sync {
    async fn cross_reference(
        &self,
        request: &CrossReferenceRequest,
        remaining_usd: f64,
    ) -> Result<ExecutorOutput<CrossReferenceResult>, ExecutorError>;
}

#[async_trait]
pub trait UnitDiscoverer: Send + Sync {
    async fn discover(
        &self,
        request: &DiscoveryRequest,
        remaining_usd: f64,
    ) -> Result<ExecutorOutput<Vec<String>>, ExecutorError>;
}

/// 外部内容压缩服务
#[async_trait]
pub trait ContentCompressor: Send + Sync {
    async fn compress(
        &self,
        request: &CompressionRequest,
        remaining_usd: f64,
    ) -> Result<ExecutorOutput<String>, ExecutorError>;
}

#[async_trait]
pub trait UrlFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<ExecutorOutput<FetchedDocument>, ExecutorError>;
}
