//! 运行级 URL 缓存：规范化 URL -> 已抓取内容
//!
//! 每个规范化 URL 至多一条；先写入者保留。缓存只存活于一次协调运行。

use std::collections::HashMap;

use crate::model::SourceReference;

/// 缓存条目：首次抓取时的来源引用与正文
#[derive(Debug, Clone)]
pub struct CachedPage {
    pub source: SourceReference,
    pub content: String,
}

#[derive(Debug, Clone, Default)]
pub struct UrlCache {
    entries: HashMap<String, CachedPage>,
}

impl UrlCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, normalized_url: &str) -> Option<&CachedPage> {
        self.entries.get(normalized_url)
    }

    pub fn contains(&self, normalized_url: &str) -> bool {
        self.entries.contains_key(normalized_url)
    }

    /// 插入条目；键已存在时不覆盖并返回 false
    pub fn insert(&mut self, page: CachedPage) -> bool {
        let key = page.source.normalized_url.clone();
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, page);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
