//! 执行器注入上下文
//!
//! Workers 持有六类有界执行器与来源分级策略，由协调者的构建方一次性组装后注入委派工具。
//! from_config 组装默认的 LLM / HTTP 实现；测试直接填字段换成 mock。

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::accumulator::TrustPolicy;
use crate::config::AppConfig;
use crate::executors::{
    Bounded, CategoryExtractor, ContentCompressor, ContentResearcher, CrossReferencer,
    ExecutorPolicy, HttpFetcher, LlmCompressor, LlmCrossReferencer, LlmDiscoverer, LlmExtractor,
    LlmResearcher, LlmWorker, UnitDiscoverer, UrlFetcher,
};
use crate::llm::LlmClient;
use crate::model::Category;

pub struct Workers {
    pub researcher: Bounded<dyn ContentResearcher>,
    pub extractors: BTreeMap<Category, Bounded<dyn CategoryExtractor>>,
    pub cross_referencer: Bounded<dyn CrossReferencer>,
    pub discoverer: Bounded<dyn UnitDiscoverer>,
    pub compressor: Bounded<dyn ContentCompressor>,
    pub fetcher: Bounded<dyn UrlFetcher>,
    pub trust: TrustPolicy,
}

impl Workers {
    pub fn extractor(&self, category: Category) -> Option<&Bounded<dyn CategoryExtractor>> {
        self.extractors.get(&category)
    }

    /// 默认实现：worker LLM + HTTP 抓取，策略取自配置
    pub fn from_config(cfg: &AppConfig, worker_llm: Arc<dyn LlmClient>) -> Self {
        let worker = LlmWorker::new(worker_llm, cfg.pricing.worker);

        let researcher: Arc<dyn ContentResearcher> = Arc::new(LlmResearcher::new(worker.clone()));
        let cross_referencer: Arc<dyn CrossReferencer> =
            Arc::new(LlmCrossReferencer::new(worker.clone()));
        let discoverer: Arc<dyn UnitDiscoverer> = Arc::new(LlmDiscoverer::new(worker.clone()));
        let compressor: Arc<dyn ContentCompressor> = Arc::new(LlmCompressor::new(worker.clone()));
        let fetcher: Arc<dyn UrlFetcher> = Arc::new(HttpFetcher::new(
            cfg.fetch.timeout_secs,
            cfg.fetch.max_result_chars,
        ));

        let extractors = Category::ALL
            .iter()
            .map(|c| {
                let inner: Arc<dyn CategoryExtractor> =
                    Arc::new(LlmExtractor::new(worker.clone(), *c));
                (
                    *c,
                    Bounded::new(format!("extract:{c}"), inner, cfg.extract_policy(*c)),
                )
            })
            .collect();

        Self {
            researcher: Bounded::new("research", researcher, cfg.research_policy()),
            extractors,
            cross_referencer: Bounded::new(
                "cross_reference",
                cross_referencer,
                cfg.cross_reference_policy(),
            ),
            discoverer: Bounded::new("discover", discoverer, cfg.discovery_policy()),
            compressor: Bounded::new("summarize", compressor, cfg.summarize_policy()),
            fetcher: Bounded::new("fetch", fetcher, cfg.fetch_policy()),
            trust: TrustPolicy::new(
                cfg.fetch.official_domains.clone(),
                cfg.fetch.community_domains.clone(),
            ),
        }
    }

    /// 同一个抽取实现服务所有类别，各类别仍使用各自的策略
    pub fn shared_extractor(
        inner: Arc<dyn CategoryExtractor>,
        policy_for: impl Fn(Category) -> ExecutorPolicy,
    ) -> BTreeMap<Category, Bounded<dyn CategoryExtractor>> {
        Category::ALL
            .iter()
            .map(|c| {
                (
                    *c,
                    Bounded::new(format!("extract:{c}"), Arc::clone(&inner), policy_for(*c)),
                )
            })
            .collect()
    }
}
