//! 领域数据模型
//!
//! 固定的调研主题（Topic）与抽取类别（Category）、来源引用、类别记录、交叉核对结果，
//! 以及协调者的输入（Goal）与输出（FinalResult）。

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 调研主题：五个固定主题 + 保留的直接抓取桶（Direct）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Geography,
    Inhabitants,
    History,
    Quests,
    Items,
    /// 保留桶：fetch_url 直接抓取的内容，不接受作为 planner 参数
    Direct,
}

impl Topic {
    /// 可调研的主题（不含 Direct）
    pub const RESEARCHABLE: [Topic; 5] = [
        Topic::Geography,
        Topic::Inhabitants,
        Topic::History,
        Topic::Quests,
        Topic::Items,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Geography => "geography",
            Topic::Inhabitants => "inhabitants",
            Topic::History => "history",
            Topic::Quests => "quests",
            Topic::Items => "items",
            Topic::Direct => "direct",
        }
    }

    pub fn is_reserved(&self) -> bool {
        matches!(self, Topic::Direct)
    }

    /// 解析 planner 传入的主题名；保留桶 direct 不可由 planner 指定
    pub fn parse_researchable(s: &str) -> Option<Topic> {
        s.parse::<Topic>().ok().filter(|t| !t.is_reserved())
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "geography" => Ok(Topic::Geography),
            "inhabitants" => Ok(Topic::Inhabitants),
            "history" => Ok(Topic::History),
            "quests" => Ok(Topic::Quests),
            "items" => Ok(Topic::Items),
            "direct" => Ok(Topic::Direct),
            other => Err(format!("unknown topic: {other}")),
        }
    }
}

/// 抽取类别：每个类别对应一个独立的抽取执行器；Zone 为主类别（交叉核对的前置条件）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Zone,
    Npcs,
    Factions,
    Quests,
    Items,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Zone,
        Category::Npcs,
        Category::Factions,
        Category::Quests,
        Category::Items,
    ];

    /// 主类别：缺失时拒绝交叉核对
    pub const PRIMARY: Category = Category::Zone;

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Zone => "zone",
            Category::Npcs => "npcs",
            Category::Factions => "factions",
            Category::Quests => "quests",
            Category::Items => "items",
        }
    }

    /// 默认的 类别 -> 主题 映射（可由 TopicCatalog 覆盖）
    pub fn default_topic(&self) -> Topic {
        match self {
            Category::Zone => Topic::Geography,
            Category::Npcs => Topic::Inhabitants,
            Category::Factions => Topic::History,
            Category::Quests => Topic::Quests,
            Category::Items => Topic::Items,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "zone" => Ok(Category::Zone),
            "npcs" => Ok(Category::Npcs),
            "factions" => Ok(Category::Factions),
            "quests" => Ok(Category::Quests),
            "items" => Ok(Category::Items),
            other => Err(format!("unknown category: {other}")),
        }
    }
}

/// 来源可信等级；排序越大越优先（Official > Community > Unverified）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustTier {
    Unverified,
    Community,
    Official,
}

/// 来源引用：创建后不可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceReference {
    pub url: String,
    pub normalized_url: String,
    pub tier: TrustTier,
    pub title: Option<String>,
    pub fetched_at: DateTime<Utc>,
    /// 是否来自本次运行的 URL 缓存（未发生网络抓取）
    pub from_cache: bool,
}

impl SourceReference {
    /// 由缓存命中派生一条新引用（保留原抓取时间，标记 from_cache）
    pub fn cache_hit(&self, requested_url: &str) -> Self {
        Self {
            url: requested_url.to_string(),
            from_cache: true,
            ..self.clone()
        }
    }
}

/// 抽取出的单个实体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Entity {
    pub name: String,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub details: BTreeMap<String, String>,
}

/// 某一类别的抽取结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CategoryRecord {
    pub category: Category,
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub source_urls: Vec<String>,
}

impl CategoryRecord {
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }
}

/// 交叉核对发现的冲突
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Conflict {
    pub categories: Vec<Category>,
    pub description: String,
}

/// 交叉核对结果：一致性标志、冲突列表、各类别置信度（0..=1）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CrossReferenceResult {
    pub consistent: bool,
    #[serde(default)]
    pub conflicts: Vec<Conflict>,
    #[serde(default)]
    pub confidence: BTreeMap<Category, f64>,
}

/// 一次协调运行的目标
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub unit_id: String,
    pub display_name: String,
    /// 为 true 时指示 planner 不要调用 discover_related
    #[serde(default)]
    pub skip_discovery: bool,
}

impl Goal {
    pub fn new(unit_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            unit_id: unit_id.into(),
            display_name: display_name.into(),
            skip_discovery: false,
        }
    }

    pub fn skipping_discovery(mut self) -> Self {
        self.skip_discovery = true;
        self
    }
}

/// 协调运行的最终结果；planner 与 worker 两级成本分别保留
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalResult {
    pub run_id: Uuid,
    pub unit_id: String,
    pub category_records: BTreeMap<Category, CategoryRecord>,
    pub sources: Vec<SourceReference>,
    pub cross_reference_result: Option<CrossReferenceResult>,
    pub discovered_units: Vec<String>,
    pub planner_cost_usd: f64,
    pub worker_cost_usd: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_topic_not_researchable() {
        assert_eq!(Topic::parse_researchable("Geography"), Some(Topic::Geography));
        assert_eq!(Topic::parse_researchable("direct"), None);
        assert_eq!(Topic::parse_researchable("weather"), None);
        assert!(!Topic::RESEARCHABLE.contains(&Topic::Direct));
    }

    #[test]
    fn test_category_default_topics_are_researchable() {
        for c in Category::ALL {
            assert!(!c.default_topic().is_reserved());
        }
        assert_eq!(Category::PRIMARY, Category::Zone);
    }

    #[test]
    fn test_trust_tier_ordering() {
        assert!(TrustTier::Official > TrustTier::Community);
        assert!(TrustTier::Community > TrustTier::Unverified);
    }

    #[test]
    fn test_category_record_deserializes_with_defaults() {
        let rec: CategoryRecord =
            serde_json::from_str(r#"{"category": "npcs", "entities": [{"name": "Old Tom"}]}"#).unwrap();
        assert_eq!(rec.category, Category::Npcs);
        assert_eq!(rec.entity_count(), 1);
        assert!(rec.entities[0].details.is_empty());
        assert!(rec.summary.is_empty());
    }
}
