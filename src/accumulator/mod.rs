//! 运行级累加器
//!
//! 一次协调运行独占一个 Accumulator：各委派工具按 `&mut` 依次写入，结果组装器只读一次，之后丢弃。
//! 不持久化、不跨运行共享；同一时刻只有一个写者，因此不需要锁。

pub mod cache;
pub mod url;

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::model::{Category, CategoryRecord, CrossReferenceResult, SourceReference, Topic};

pub use cache::{CachedPage, UrlCache};
pub use url::{normalize_url, TrustPolicy, UrlError};

#[derive(Debug)]
pub struct Accumulator {
    pub(crate) run_id: Uuid,
    pub(crate) content_by_topic: BTreeMap<Topic, Vec<String>>,
    pub(crate) sources: Vec<SourceReference>,
    pub(crate) category_records: BTreeMap<Category, CategoryRecord>,
    pub(crate) cross_reference: Option<CrossReferenceResult>,
    pub(crate) discovered_units: Vec<String>,
    pub(crate) worker_cost: f64,
    pub(crate) url_cache: UrlCache,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Accumulator {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            content_by_topic: BTreeMap::new(),
            sources: Vec::new(),
            category_records: BTreeMap::new(),
            cross_reference: None,
            discovered_units: Vec::new(),
            worker_cost: 0.0,
            url_cache: UrlCache::new(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    // --- 内容 ---

    pub fn content(&self, topic: Topic) -> &[String] {
        self.content_by_topic
            .get(&topic)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_content(&self, topic: Topic) -> bool {
        !self.content(topic).is_empty()
    }

    /// 某主题内容的总字符数
    pub fn content_chars(&self, topic: Topic) -> usize {
        self.content(topic).iter().map(|b| b.chars().count()).sum()
    }

    /// 已有内容的可调研主题数（不含 Direct 桶）
    pub fn researched_topic_count(&self) -> usize {
        Topic::RESEARCHABLE
            .iter()
            .filter(|t| self.has_content(**t))
            .count()
    }

    /// 按顺序追加内容块；空块忽略
    pub fn append_content<I>(&mut self, topic: Topic, blocks: I)
    where
        I: IntoIterator<Item = String>,
    {
        let entry = self.content_by_topic.entry(topic).or_default();
        entry.extend(blocks.into_iter().filter(|b| !b.trim().is_empty()));
        if entry.is_empty() {
            self.content_by_topic.remove(&topic);
        }
    }

    /// 用单个块替换某主题的全部内容（摘要成功后使用）
    pub fn replace_content(&mut self, topic: Topic, block: String) {
        self.content_by_topic.insert(topic, vec![block]);
    }

    // --- 来源 ---

    pub fn sources(&self) -> &[SourceReference] {
        &self.sources
    }

    pub fn push_source(&mut self, source: SourceReference) {
        self.sources.push(source);
    }

    pub fn extend_sources<I>(&mut self, sources: I)
    where
        I: IntoIterator<Item = SourceReference>,
    {
        self.sources.extend(sources);
    }

    // --- 类别记录 / 交叉核对 / 发现 ---

    pub fn record(&self, category: Category) -> Option<&CategoryRecord> {
        self.category_records.get(&category)
    }

    pub fn records(&self) -> &BTreeMap<Category, CategoryRecord> {
        &self.category_records
    }

    /// 写入类别记录；同一类别重复写入时后写覆盖，返回被覆盖的旧记录
    pub fn set_record(&mut self, record: CategoryRecord) -> Option<CategoryRecord> {
        self.category_records.insert(record.category, record)
    }

    pub fn cross_reference(&self) -> Option<&CrossReferenceResult> {
        self.cross_reference.as_ref()
    }

    /// 写入交叉核对结果；后写覆盖，返回旧结果
    pub fn set_cross_reference(
        &mut self,
        result: CrossReferenceResult,
    ) -> Option<CrossReferenceResult> {
        self.cross_reference.replace(result)
    }

    pub fn discovered_units(&self) -> &[String] {
        &self.discovered_units
    }

    /// 追加发现的关联单元：去空白、去重、排除 own_unit；返回新增数量
    pub fn add_discovered<I>(&mut self, units: I, own_unit: &str) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let mut added = 0;
        for unit in units {
            let unit = unit.trim().to_string();
            if unit.is_empty() || unit == own_unit || self.discovered_units.contains(&unit) {
                continue;
            }
            self.discovered_units.push(unit);
            added += 1;
        }
        added
    }

    // --- 成本 ---

    pub fn worker_cost(&self) -> f64 {
        self.worker_cost
    }

    /// 累加 worker 成本；负数、NaN、无穷被忽略，保证单调不减
    pub fn add_worker_cost(&mut self, cost_usd: f64) {
        if cost_usd.is_finite() && cost_usd > 0.0 {
            self.worker_cost += cost_usd;
        }
    }

    // --- URL 缓存 ---

    pub fn url_cache(&self) -> &UrlCache {
        &self.url_cache
    }

    /// 取出缓存交给抓取网关；调用方负责用 restore_url_cache 放回
    pub fn take_url_cache(&mut self) -> UrlCache {
        std::mem::take(&mut self.url_cache)
    }

    pub fn restore_url_cache(&mut self, cache: UrlCache) {
        self.url_cache = cache;
    }
}
