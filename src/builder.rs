//! 协调者构建器：从配置组装 planner 工厂、执行器、主题目录与委派工具集
//!
//! 默认实现（LLM 执行器、HTTP 抓取、StaticCatalog）都可以被替换，测试借此注入 mock。

use std::sync::Arc;

use crate::catalog::{StaticCatalog, TopicCatalog};
use crate::config::AppConfig;
use crate::coordinator::{Coordinator, CoordinatorError, LlmPlanner, PlannerFactory};
use crate::executors::Workers;
use crate::llm::LlmClient;
use crate::tools::{DelegationToolset, ToolDeps};

pub struct CoordinatorBuilder {
    config: AppConfig,
    planner_llm: Option<Arc<dyn LlmClient>>,
    worker_llm: Option<Arc<dyn LlmClient>>,
    planners: Option<Arc<dyn PlannerFactory>>,
    workers: Option<Workers>,
    catalog: Option<Arc<dyn TopicCatalog>>,
}

impl CoordinatorBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            planner_llm: None,
            worker_llm: None,
            planners: None,
            workers: None,
            catalog: None,
        }
    }

    /// planner 使用的 LLM；未设置 worker LLM 时执行器也用它
    pub fn with_planner_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.planner_llm = Some(llm);
        self
    }

    pub fn with_worker_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.worker_llm = Some(llm);
        self
    }

    /// 直接指定 planner 工厂（优先于 planner LLM）
    pub fn with_planner_factory(mut self, factory: impl PlannerFactory + 'static) -> Self {
        self.planners = Some(Arc::new(factory));
        self
    }

    pub fn with_workers(mut self, workers: Workers) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn TopicCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn build(self) -> Result<Coordinator, CoordinatorError> {
        let cfg = self.config;

        let planners: Arc<dyn PlannerFactory> = match (self.planners, &self.planner_llm) {
            (Some(factory), _) => factory,
            (None, Some(llm)) => Arc::new(LlmPlanner::factory(
                Arc::clone(llm),
                cfg.pricing.planner,
                cfg.planner.clone(),
            )),
            (None, None) => {
                return Err(CoordinatorError::Config(
                    "either a planner factory or a planner LLM is required".to_string(),
                ))
            }
        };

        let workers = match self.workers {
            Some(w) => w,
            None => {
                let llm = self
                    .worker_llm
                    .or(self.planner_llm)
                    .ok_or_else(|| CoordinatorError::Config("no LLM available for workers".to_string()))?;
                Workers::from_config(&cfg, llm)
            }
        };

        let catalog = self
            .catalog
            .unwrap_or_else(|| Arc::new(StaticCatalog::from_config(&cfg.catalog)));

        let deps = Arc::new(ToolDeps::new(workers, catalog, cfg.tools.clone()));
        Ok(Coordinator::new(planners, DelegationToolset::standard(deps)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::{Planner, ScriptedPlanner};
    use crate::llm::ScriptedLlmClient;

    #[test]
    fn test_build_requires_a_planner() {
        let err = CoordinatorBuilder::new(AppConfig::default()).build().err();
        assert!(matches!(err, Some(CoordinatorError::Config(_))));
    }

    #[test]
    fn test_build_with_planner_llm_only() {
        let llm: Arc<dyn LlmClient> = Arc::new(ScriptedLlmClient::new(Vec::<String>::new()));
        let coordinator = CoordinatorBuilder::new(AppConfig::default())
            .with_planner_llm(llm)
            .build()
            .unwrap();
        assert_eq!(coordinator.tools().tool_names().len(), 6);
    }

    #[test]
    fn test_factory_without_worker_llm_fails() {
        let err = CoordinatorBuilder::new(AppConfig::default())
            .with_planner_factory(|| Box::new(ScriptedPlanner::new(Vec::new())) as Box<dyn Planner>)
            .build()
            .err();
        assert!(matches!(err, Some(CoordinatorError::Config(_))));
    }
}
