//! 抓取网关：URL 缓存去重 + 有界抓取
//!
//! 调研执行器与 fetch_url 工具共用同一套去重逻辑：先规范化 URL，命中缓存则不再抓取，
//! 但仍返回一条新的来源引用（from_cache = true），保证来源溯源不丢失。
//! 网关持有运行级缓存的一份副本；调用方在成功后用 finish() 取回并写回累加器。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use thiserror::Error;

use crate::accumulator::{normalize_url, CachedPage, TrustPolicy, UrlCache, UrlError};
use crate::executors::{Bounded, ExecutorFailure, UrlFetcher};
use crate::model::SourceReference;

#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    #[error(transparent)]
    Url(#[from] UrlError),

    #[error(transparent)]
    Fetch(#[from] ExecutorFailure),
}

/// 网关返回的页面：来源引用 + 正文
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub source: SourceReference,
    pub content: String,
}

impl FetchedPage {
    pub fn from_cache(&self) -> bool {
        self.source.from_cache
    }
}

pub struct FetchGateway<'a> {
    fetcher: &'a Bounded<dyn UrlFetcher>,
    trust: &'a TrustPolicy,
    cache: Mutex<UrlCache>,
    cost_usd: Mutex<f64>,
    network_fetches: AtomicUsize,
}

impl<'a> FetchGateway<'a> {
    pub fn new(fetcher: &'a Bounded<dyn UrlFetcher>, trust: &'a TrustPolicy, cache: UrlCache) -> Self {
        Self {
            fetcher,
            trust,
            cache: Mutex::new(cache),
            cost_usd: Mutex::new(0.0),
            network_fetches: AtomicUsize::new(0),
        }
    }

    fn cache(&self) -> MutexGuard<'_, UrlCache> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn add_cost(&self, cost: f64) {
        let mut c = self.cost_usd.lock().unwrap_or_else(|e| e.into_inner());
        if cost.is_finite() && cost > 0.0 {
            *c += cost;
        }
    }

    /// 抓取（或从缓存取）一个 URL；锁不会跨 await 持有
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage, GatewayError> {
        let normalized = normalize_url(url)?;

        let hit = self.cache().get(&normalized).cloned();
        if let Some(page) = hit {
            tracing::debug!(url = %normalized, "url cache hit");
            return Ok(FetchedPage {
                source: page.source.cache_hit(url),
                content: page.content,
            });
        }

        self.network_fetches.fetch_add(1, Ordering::SeqCst);
        let outcome = self.fetcher.invoke(|f, _| f.fetch(&normalized)).await;
        let doc = match outcome {
            Ok(out) => {
                self.add_cost(out.cost_usd);
                out.value
            }
            Err(failure) => {
                self.add_cost(failure.cost_usd);
                return Err(failure.into());
            }
        };

        let source = SourceReference {
            url: url.trim().to_string(),
            normalized_url: normalized.clone(),
            tier: self.trust.classify(&normalized),
            title: doc.title,
            fetched_at: Utc::now(),
            from_cache: false,
        };
        let page = CachedPage {
            source: source.clone(),
            content: doc.text,
        };

        let mut cache = self.cache();
        if !cache.insert(page.clone()) {
            // 并发抓取同一 URL 时保留先写入的条目，本次结果按缓存命中处理
            if let Some(existing) = cache.get(&normalized) {
                return Ok(FetchedPage {
                    source: existing.source.cache_hit(url),
                    content: existing.content.clone(),
                });
            }
        }
        Ok(FetchedPage {
            source,
            content: page.content,
        })
    }

    /// 本网关发起的真实网络抓取次数
    pub fn network_fetches(&self) -> usize {
        self.network_fetches.load(Ordering::SeqCst)
    }

    /// 取回缓存与抓取累计成本
    pub fn finish(self) -> (UrlCache, f64) {
        let cache = self.cache.into_inner().unwrap_or_else(|e| e.into_inner());
        let cost = self
            .cost_usd
            .into_inner()
            .unwrap_or_else(|e| e.into_inner());
        (cache, cost)
    }
}
