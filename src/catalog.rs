//! 主题目录（只读配置提供者）
//!
//! 委派工具通过注入的 TopicCatalog 查询：主题调研指令、段落标题、摘要 schema 提示、类别 -> 主题映射、抽取指令。
//! StaticCatalog 内置默认值，并叠加 [catalog.topics.<topic>] 中的覆盖项。

use std::collections::HashMap;

use schemars::schema_for;

use crate::config::{CatalogSection, TopicOverride};
use crate::model::{Category, CategoryRecord, Topic};

/// 只读查询接口；实现不得在运行中改变返回值
pub trait TopicCatalog: Send + Sync {
    fn topic_instructions(&self, topic: Topic) -> String;

    fn section_header(&self, topic: Topic) -> String;

    /// 摘要时告诉压缩服务哪些信息必须保留
    fn schema_hint(&self, topic: Topic) -> String;

    fn topic_for_category(&self, category: Category) -> Topic {
        category.default_topic()
    }

    fn extraction_instructions(&self, category: Category) -> String;
}

/// 默认目录：内置文案 + 配置覆盖
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    overrides: HashMap<Topic, TopicOverride>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 [catalog] 段构建；无法识别的主题名会被忽略并记录警告
    pub fn from_config(section: &CatalogSection) -> Self {
        let mut overrides = HashMap::new();
        for (name, ov) in &section.topics {
            match Topic::parse_researchable(name) {
                Some(topic) => {
                    overrides.insert(topic, ov.clone());
                }
                None => tracing::warn!(topic = %name, "ignoring catalog override for unknown topic"),
            }
        }
        Self { overrides }
    }

    fn override_of(&self, topic: Topic) -> Option<&TopicOverride> {
        self.overrides.get(&topic)
    }
}

fn default_instructions(topic: Topic) -> &'static str {
    match topic {
        Topic::Geography => "Describe the region's location, borders, sub-areas, landmarks, travel routes and level range.",
        Topic::Inhabitants => "List notable characters, creatures and vendors living in the region, with roles and locations.",
        Topic::History => "Summarize the region's lore, past events and the factions that hold or contest it.",
        Topic::Quests => "List quests and quest chains that start or take place in the region, with givers and rewards.",
        Topic::Items => "List notable items obtainable in the region: drops, quest rewards, vendor goods, crafting materials.",
        Topic::Direct => "Raw page content fetched on request.",
    }
}

fn default_header(topic: Topic) -> &'static str {
    match topic {
        Topic::Geography => "## Geography",
        Topic::Inhabitants => "## Inhabitants",
        Topic::History => "## History",
        Topic::Quests => "## Quests",
        Topic::Items => "## Items",
        Topic::Direct => "## Fetched pages",
    }
}

fn default_schema_hint(topic: Topic) -> &'static str {
    match topic {
        Topic::Geography => "Keep every place name, coordinate, border and level range.",
        Topic::Inhabitants => "Keep every character name with its role, faction and location.",
        Topic::History => "Keep dates, event names and faction names.",
        Topic::Quests => "Keep quest names, quest givers, prerequisites and rewards.",
        Topic::Items => "Keep item names, sources, rarity and stats.",
        Topic::Direct => "Keep facts verbatim.",
    }
}

fn category_focus(category: Category) -> &'static str {
    match category {
        Category::Zone => "the region itself: one entity for the zone plus one per named sub-area; details: level_range, continent, controlled_by",
        Category::Npcs => "named characters; details: role, faction, location",
        Category::Factions => "factions and organisations; details: alignment, leader, stance",
        Category::Quests => "quests; details: giver, level, reward, chain",
        Category::Items => "items; details: source, rarity, slot",
    }
}

impl TopicCatalog for StaticCatalog {
    fn topic_instructions(&self, topic: Topic) -> String {
        self.override_of(topic)
            .and_then(|o| o.instructions.clone())
            .unwrap_or_else(|| default_instructions(topic).to_string())
    }

    fn section_header(&self, topic: Topic) -> String {
        self.override_of(topic)
            .and_then(|o| o.header.clone())
            .unwrap_or_else(|| default_header(topic).to_string())
    }

    fn schema_hint(&self, topic: Topic) -> String {
        self.override_of(topic)
            .and_then(|o| o.schema_hint.clone())
            .unwrap_or_else(|| default_schema_hint(topic).to_string())
    }

    fn extraction_instructions(&self, category: Category) -> String {
        let schema = serde_json::to_string(&schema_for!(CategoryRecord)).unwrap_or_default();
        format!(
            "Extract {}. Respond with ONE JSON object matching this schema, with \"category\" set to \"{}\". Use only facts present in the content.\nSchema: {}",
            category_focus(category),
            category.as_str(),
            schema
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_every_topic() {
        let catalog = StaticCatalog::new();
        for topic in Topic::RESEARCHABLE {
            assert!(!catalog.topic_instructions(topic).is_empty());
            assert!(catalog.section_header(topic).starts_with("## "));
            assert!(!catalog.schema_hint(topic).is_empty());
        }
    }

    #[test]
    fn test_overrides_from_config() {
        let mut section = CatalogSection::default();
        section.topics.insert(
            "history".to_string(),
            TopicOverride {
                header: Some("## Lore".to_string()),
                ..TopicOverride::default()
            },
        );
        section
            .topics
            .insert("direct".to_string(), TopicOverride::default());
        let catalog = StaticCatalog::from_config(&section);
        assert_eq!(catalog.section_header(Topic::History), "## Lore");
        // 未覆盖字段回落到默认值
        assert!(catalog.topic_instructions(Topic::History).contains("lore"));
        assert_eq!(catalog.section_header(Topic::Direct), "## Fetched pages");
    }

    #[test]
    fn test_extraction_instructions_embed_schema() {
        let catalog = StaticCatalog::new();
        let text = catalog.extraction_instructions(Category::Npcs);
        assert!(text.contains("\"npcs\""));
        assert!(text.contains("entities"));
    }
}
