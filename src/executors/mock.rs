//! 执行器 Mock（用于测试，无需网络与 API）
//!
//! 每个 Mock 记录调用次数、报告固定成本，并可按调用序号注入失败，便于脚本化协调运行。

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::accumulator::normalize_url;
use crate::executors::{
    CategoryExtractor, CompressionRequest, ContentCompressor, ContentResearcher,
    CrossReferenceRequest, CrossReferencer, DiscoveryRequest, ExecutorError, ExecutorOutput,
    ExtractionRequest, FetchGateway, FetchedDocument, Research, ResearchRequest, UnitDiscoverer,
    UrlFetcher,
};
use crate::model::{Category, CategoryRecord, CrossReferenceResult, Entity, Topic};

fn key(url: &str) -> String {
    normalize_url(url).unwrap_or_else(|_| url.to_string())
}

/// 固定页面表；未登记的 URL 返回 404（不可重试）
#[derive(Debug, Default)]
pub struct StaticFetcher {
    pages: HashMap<String, FetchedDocument>,
    calls: AtomicUsize,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, text: &str) -> Self {
        self.pages.insert(
            key(url),
            FetchedDocument {
                title: Some(format!("Page {url}")),
                text: text.to_string(),
            },
        );
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UrlFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<ExecutorOutput<FetchedDocument>, ExecutorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.pages
            .get(&key(url))
            .cloned()
            .map(ExecutorOutput::free)
            .ok_or_else(|| ExecutorError::permanent(format!("HTTP 404 Not Found: {url}")))
    }
}

/// 按主题返回预设内容；登记的 URL 通过网关抓取并作为来源返回
#[derive(Debug, Default)]
pub struct StaticResearcher {
    content: HashMap<Topic, Vec<String>>,
    urls: HashMap<Topic, Vec<String>>,
    cost_usd: f64,
    /// 第 N 次调用（从 1 开始）失败
    fail_on_calls: HashSet<usize>,
    calls: AtomicUsize,
}

impl StaticResearcher {
    pub fn new(cost_usd: f64) -> Self {
        Self {
            cost_usd,
            ..Self::default()
        }
    }

    pub fn with_content(mut self, topic: Topic, blocks: &[&str]) -> Self {
        self.content
            .insert(topic, blocks.iter().map(|b| b.to_string()).collect());
        self
    }

    pub fn with_urls(mut self, topic: Topic, urls: &[&str]) -> Self {
        self.urls
            .insert(topic, urls.iter().map(|u| u.to_string()).collect());
        self
    }

    pub fn failing_on_call(mut self, call: usize) -> Self {
        self.fail_on_calls.insert(call);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentResearcher for StaticResearcher {
    async fn research(
        &self,
        request: &ResearchRequest,
        web: &FetchGateway<'_>,
        _remaining_usd: f64,
    ) -> Result<ExecutorOutput<Research>, ExecutorError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_calls.contains(&call) {
            return Err(
                ExecutorError::permanent(format!("scripted researcher failure on call {call}"))
                    .with_cost(self.cost_usd),
            );
        }

        let mut sources = Vec::new();
        for url in self.urls.get(&request.topic).into_iter().flatten() {
            if let Ok(page) = web.fetch(url).await {
                sources.push(page.source);
            }
        }
        let blocks = self.content.get(&request.topic).cloned().unwrap_or_else(|| {
            vec![format!(
                "{} notes about {}.",
                request.topic, request.display_name
            )]
        });
        Ok(ExecutorOutput::new(Research { blocks, sources }, self.cost_usd))
    }
}

/// 返回指定数量实体的记录；entity_counts 可按类别覆盖默认数量
#[derive(Debug, Default)]
pub struct StaticExtractor {
    default_entities: usize,
    entity_counts: BTreeMap<Category, usize>,
    cost_usd: f64,
    fail: bool,
    calls: AtomicUsize,
    last_content: Mutex<Option<String>>,
}

impl StaticExtractor {
    pub fn new(default_entities: usize, cost_usd: f64) -> Self {
        Self {
            default_entities,
            cost_usd,
            ..Self::default()
        }
    }

    pub fn with_entities(mut self, category: Category, count: usize) -> Self {
        self.entity_counts.insert(category, count);
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_content(&self) -> Option<String> {
        self.last_content.lock().ok().and_then(|c| c.clone())
    }
}

#[async_trait]
impl CategoryExtractor for StaticExtractor {
    async fn extract(
        &self,
        request: &ExtractionRequest,
        _remaining_usd: f64,
    ) -> Result<ExecutorOutput<CategoryRecord>, ExecutorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_content.lock() {
            *last = Some(request.content.clone());
        }
        if self.fail {
            return Err(ExecutorError::transient("scripted extractor failure").with_cost(self.cost_usd));
        }
        let count = self
            .entity_counts
            .get(&request.category)
            .copied()
            .unwrap_or(self.default_entities);
        let entities = (0..count)
            .map(|i| Entity {
                name: format!("{} {}", request.category, i + 1),
                kind: Some(request.category.to_string()),
                details: BTreeMap::new(),
            })
            .collect();
        Ok(ExecutorOutput::new(
            CategoryRecord {
                category: request.category,
                entities,
                summary: format!("{} of {}", request.category, request.display_name),
                source_urls: Vec::new(),
            },
            self.cost_usd,
        ))
    }
}

/// 返回固定结果，并记录最近一次请求
#[derive(Debug)]
pub struct StaticCrossReferencer {
    result: CrossReferenceResult,
    cost_usd: f64,
    calls: AtomicUsize,
    last_request: Mutex<Option<CrossReferenceRequest>>,
}

impl StaticCrossReferencer {
    pub fn new(result: CrossReferenceResult, cost_usd: f64) -> Self {
        Self {
            result,
            cost_usd,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// 所有类别置信度均为 confidence 的一致结果
    pub fn uniform(confidence: f64, cost_usd: f64) -> Self {
        Self::new(
            CrossReferenceResult {
                consistent: true,
                conflicts: Vec::new(),
                confidence: Category::ALL.iter().map(|c| (*c, confidence)).collect(),
            },
            cost_usd,
        )
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<CrossReferenceRequest> {
        self.last_request.lock().ok().and_then(|r| r.clone())
    }
}

#[async_trait]
impl CrossReferencer for StaticCrossReferencer {
    async fn cross_reference(
        &self,
        request: &CrossReferenceRequest,
        _remaining_usd: f64,
    ) -> Result<ExecutorOutput<CrossReferenceResult>, ExecutorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request.clone());
        }
        Ok(ExecutorOutput::new(self.result.clone(), self.cost_usd))
    }
}

#[derive(Debug, Default)]
pub struct StaticDiscoverer {
    units: Vec<String>,
    cost_usd: f64,
    calls: AtomicUsize,
}

impl StaticDiscoverer {
    pub fn new(units: &[&str], cost_usd: f64) -> Self {
        Self {
            units: units.iter().map(|u| u.to_string()).collect(),
            cost_usd,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UnitDiscoverer for StaticDiscoverer {
    async fn discover(
        &self,
        _request: &DiscoveryRequest,
        _remaining_usd: f64,
    ) -> Result<ExecutorOutput<Vec<String>>, ExecutorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ExecutorOutput::new(self.units.clone(), self.cost_usd))
    }
}

/// 压缩服务 Mock 的行为
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressorMode {
    /// 截断到 max_output_chars 与原长一半中较小者
    Shrink,
    /// 原样返回（不缩小）
    Echo,
    /// 服务不可用
    Unavailable,
}

#[derive(Debug)]
pub struct StaticCompressor {
    mode: CompressorMode,
    cost_usd: f64,
    calls: AtomicUsize,
    last_request: Mutex<Option<CompressionRequest>>,
}

impl StaticCompressor {
    pub fn new(mode: CompressorMode, cost_usd: f64) -> Self {
        Self {
            mode,
            cost_usd,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<CompressionRequest> {
        self.last_request.lock().ok().and_then(|r| r.clone())
    }
}

#[async_trait]
impl ContentCompressor for StaticCompressor {
    async fn compress(
        &self,
        request: &CompressionRequest,
        _remaining_usd: f64,
    ) -> Result<ExecutorOutput<String>, ExecutorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request.clone());
        }
        match self.mode {
            CompressorMode::Shrink => {
                let len = request.content.chars().count();
                let keep = request.max_output_chars.min(len / 2);
                Ok(ExecutorOutput::new(
                    request.content.chars().take(keep).collect(),
                    self.cost_usd,
                ))
            }
            CompressorMode::Echo => Ok(ExecutorOutput::new(request.content.clone(), self.cost_usd)),
            CompressorMode::Unavailable => Err(ExecutorError::transient("compression service unavailable")),
        }
    }
}
