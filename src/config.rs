//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `FORAGE__*` 覆盖（双下划线表示嵌套，如 `FORAGE__BUDGET__TOTAL_USD=2.0`）。
//! 所有字段都有默认值，空配置即可运行。

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::executors::ExecutorPolicy;
use crate::llm::TokenPricing;
use crate::model::Category;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmSection,
    pub pricing: PricingSection,
    pub planner: PlannerSection,
    pub budget: BudgetSection,
    pub executors: ExecutorsSection,
    pub fetch: FetchSection,
    pub tools: ToolsSection,
    pub catalog: CatalogSection,
}

/// [llm] 段：OpenAI 兼容端点；worker_model 未设置时与 planner 共用 model
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub model: String,
    pub worker_model: Option<String>,
    pub base_url: Option<String>,
    /// 读取 API Key 的环境变量名
    pub api_key_env: String,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            worker_model: None,
            base_url: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

/// [pricing] 段：planner 与 worker 分别计价（每千 token 美元）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PricingSection {
    pub planner: TokenPricing,
    pub worker: TokenPricing,
}

impl Default for PricingSection {
    fn default() -> Self {
        Self {
            planner: TokenPricing::new(0.0025, 0.01),
            worker: TokenPricing::new(0.00015, 0.0006),
        }
    }
}

/// [planner] 段：LLM planner 的自我保护参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlannerSection {
    /// planner 内部的最大决策轮数，到达后自行宣告完成
    pub max_turns: usize,
    /// 连续多少次非法 JSON 输出后放弃（视为 planner 故障）
    pub max_parse_retries: usize,
}

impl Default for PlannerSection {
    fn default() -> Self {
        Self {
            max_turns: 40,
            max_parse_retries: 2,
        }
    }
}

/// [budget] 段：各执行器的单次调用成本上限（美元）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BudgetSection {
    /// 抽取预算总额；每个类别按 category_fractions 分得一部分
    pub total_usd: f64,
    pub category_fractions: CategoryFractions,
    pub research_usd: f64,
    pub cross_reference_usd: f64,
    pub discovery_usd: f64,
    pub summarize_usd: f64,
}

impl Default for BudgetSection {
    fn default() -> Self {
        Self {
            total_usd: 1.0,
            category_fractions: CategoryFractions::default(),
            research_usd: 0.25,
            cross_reference_usd: 0.10,
            discovery_usd: 0.05,
            summarize_usd: 0.05,
        }
    }
}

impl BudgetSection {
    /// 某类别抽取执行器的成本上限 = total_usd × fraction
    pub fn category_ceiling(&self, category: Category) -> f64 {
        self.total_usd * self.category_fractions.get(category)
    }
}

/// [budget.category_fractions] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CategoryFractions {
    pub zone: f64,
    pub npcs: f64,
    pub factions: f64,
    pub quests: f64,
    pub items: f64,
}

impl Default for CategoryFractions {
    fn default() -> Self {
        Self {
            zone: 0.25,
            npcs: 0.20,
            factions: 0.15,
            quests: 0.20,
            items: 0.20,
        }
    }
}

impl CategoryFractions {
    pub fn get(&self, category: Category) -> f64 {
        let f = match category {
            Category::Zone => self.zone,
            Category::Npcs => self.npcs,
            Category::Factions => self.factions,
            Category::Quests => self.quests,
            Category::Items => self.items,
        };
        f.clamp(0.0, 1.0)
    }
}

/// [executors] 段：各执行器的内部重试次数与退避
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutorsSection {
    pub research_retries: u32,
    pub extract_retries: u32,
    pub cross_reference_retries: u32,
    pub discovery_retries: u32,
    pub summarize_retries: u32,
    pub fetch_retries: u32,
    pub backoff_ms: u64,
}

impl Default for ExecutorsSection {
    fn default() -> Self {
        Self {
            research_retries: 2,
            extract_retries: 2,
            cross_reference_retries: 1,
            discovery_retries: 1,
            summarize_retries: 0,
            fetch_retries: 2,
            backoff_ms: 500,
        }
    }
}

/// [fetch] 段：抓取超时、最大字符数、可信域名分级
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchSection {
    pub timeout_secs: u64,
    pub max_result_chars: usize,
    pub official_domains: Vec<String>,
    pub community_domains: Vec<String>,
}

impl Default for FetchSection {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            max_result_chars: 12000,
            official_domains: Vec::new(),
            community_domains: vec![
                "fandom.com".into(),
                "wiki.gg".into(),
                "wikipedia.org".into(),
                "reddit.com".into(),
            ],
        }
    }
}

/// [tools] 段：委派工具的观察截断与摘要参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 返回给 planner 的观察文本最大字符数
    pub observation_chars: usize,
    /// 主题内容低于此字符数时 summarize_topic 不做任何事
    pub summarize_threshold_chars: usize,
    /// 摘要总字符预算，按已调研主题数均分
    pub summary_budget_chars: usize,
    pub min_summary_chars: usize,
    /// 调研执行器每次最多抓取的 URL 数
    pub max_research_urls: usize,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            observation_chars: 1500,
            summarize_threshold_chars: 6000,
            summary_budget_chars: 30000,
            min_summary_chars: 2000,
            max_research_urls: 6,
        }
    }
}

/// [catalog] 段：按主题名覆盖调研指令与段落标题
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CatalogSection {
    pub topics: HashMap<String, TopicOverride>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TopicOverride {
    pub instructions: Option<String>,
    pub header: Option<String>,
    pub schema_hint: Option<String>,
}

impl ExecutorsSection {
    pub fn backoff(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.backoff_ms)
    }
}

impl AppConfig {
    pub fn research_policy(&self) -> ExecutorPolicy {
        ExecutorPolicy::new(self.executors.research_retries, self.budget.research_usd)
            .with_backoff(self.executors.backoff())
    }

    pub fn extract_policy(&self, category: Category) -> ExecutorPolicy {
        ExecutorPolicy::new(
            self.executors.extract_retries,
            self.budget.category_ceiling(category),
        )
        .with_backoff(self.executors.backoff())
    }

    pub fn cross_reference_policy(&self) -> ExecutorPolicy {
        ExecutorPolicy::new(
            self.executors.cross_reference_retries,
            self.budget.cross_reference_usd,
        )
        .with_backoff(self.executors.backoff())
    }

    pub fn discovery_policy(&self) -> ExecutorPolicy {
        ExecutorPolicy::new(self.executors.discovery_retries, self.budget.discovery_usd)
            .with_backoff(self.executors.backoff())
    }

    pub fn summarize_policy(&self) -> ExecutorPolicy {
        ExecutorPolicy::new(self.executors.summarize_retries, self.budget.summarize_usd)
            .with_backoff(self.executors.backoff())
    }

    /// 抓取不产生 LLM 成本，上限设为无穷
    pub fn fetch_policy(&self) -> ExecutorPolicy {
        ExecutorPolicy::new(self.executors.fetch_retries, f64::INFINITY)
            .with_backoff(self.executors.backoff())
    }
}

/// 从 config 目录加载配置，环境变量 FORAGE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 FORAGE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("FORAGE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_usable() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.planner.max_turns, 40);
        assert!((cfg.budget.category_ceiling(Category::Zone) - 0.25).abs() < 1e-9);
        assert!(cfg.tools.summarize_threshold_chars > 0);
        assert!(cfg.fetch_policy().cost_ceiling_usd.is_infinite());
    }

    #[test]
    fn test_load_config_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r###"
[budget]
total_usd = 2.0

[budget.category_fractions]
zone = 0.5

[tools]
observation_chars = 300

[catalog.topics.history]
header = "## Lore"
"###
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert!((cfg.budget.category_ceiling(Category::Zone) - 1.0).abs() < 1e-9);
        // 未覆盖的字段保持默认值
        assert!((cfg.budget.category_ceiling(Category::Npcs) - 0.4).abs() < 1e-9);
        assert_eq!(cfg.tools.observation_chars, 300);
        assert_eq!(cfg.tools.min_summary_chars, 2000);
        assert_eq!(
            cfg.catalog.topics.get("history").and_then(|t| t.header.as_deref()),
            Some("## Lore")
        );
    }

    #[test]
    fn test_fraction_is_clamped() {
        let mut fractions = CategoryFractions::default();
        fractions.items = 3.0;
        assert_eq!(fractions.get(Category::Items), 1.0);
    }
}
