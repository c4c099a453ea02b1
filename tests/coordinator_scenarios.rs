//! 协调者端到端场景：脚本化 planner + 执行器 mock，无需网络与 API

use std::sync::Arc;

use async_trait::async_trait;
use forage::accumulator::TrustPolicy;
use forage::catalog::StaticCatalog;
use forage::config::ToolsSection;
use forage::coordinator::{
    Coordinator, CoordinatorError, Decision, Planner, PlannerError, PlannerStep, RunBrief,
    ScriptedPlanner, Transcript,
};
use forage::executors::mock::{
    CompressorMode, StaticCompressor, StaticCrossReferencer, StaticDiscoverer, StaticExtractor,
    StaticFetcher, StaticResearcher,
};
use forage::executors::{
    Bounded, CategoryExtractor, ContentCompressor, ContentResearcher, CrossReferencer,
    ExecutorPolicy, UnitDiscoverer, UrlFetcher, Workers,
};
use forage::model::{Category, Goal, Topic};
use forage::tools::{DelegationToolset, ToolDeps, ToolObservation};
use serde_json::json;

const PAGE: &str = "https://wowpedia.fandom.com/wiki/Elwynn_Forest";

struct Harness {
    researcher: Arc<StaticResearcher>,
    extractor: Arc<StaticExtractor>,
    cross_referencer: Arc<StaticCrossReferencer>,
    discoverer: Arc<StaticDiscoverer>,
    fetcher: Arc<StaticFetcher>,
}

impl Harness {
    fn new(researcher: StaticResearcher) -> Self {
        Self {
            researcher: Arc::new(researcher),
            extractor: Arc::new(StaticExtractor::new(3, 0.01).with_entities(Category::Items, 0)),
            cross_referencer: Arc::new(StaticCrossReferencer::uniform(0.9, 0.03)),
            discoverer: Arc::new(StaticDiscoverer::new(&["westfall", "redridge", "elwynn"], 0.005)),
            fetcher: Arc::new(StaticFetcher::new().with_page(PAGE, "Elwynn Forest is a peaceful zone.")),
        }
    }

    fn toolset(&self) -> DelegationToolset {
        let p = ExecutorPolicy::unbounded();
        let researcher: Arc<dyn ContentResearcher> = self.researcher.clone();
        let extractor: Arc<dyn CategoryExtractor> = self.extractor.clone();
        let cross_referencer: Arc<dyn CrossReferencer> = self.cross_referencer.clone();
        let discoverer: Arc<dyn UnitDiscoverer> = self.discoverer.clone();
        let compressor: Arc<dyn ContentCompressor> =
            Arc::new(StaticCompressor::new(CompressorMode::Shrink, 0.0));
        let fetcher: Arc<dyn UrlFetcher> = self.fetcher.clone();
        let workers = Workers {
            researcher: Bounded::new("research", researcher, p),
            extractors: Workers::shared_extractor(extractor, |_| p),
            cross_referencer: Bounded::new("cross_reference", cross_referencer, p),
            discoverer: Bounded::new("discover", discoverer, p),
            compressor: Bounded::new("summarize", compressor, p),
            fetcher: Bounded::new("fetch", fetcher, p),
            trust: TrustPolicy::new(vec![], vec!["fandom.com".into()]),
        };
        let deps = Arc::new(ToolDeps::new(
            workers,
            Arc::new(StaticCatalog::new()),
            ToolsSection::default(),
        ));
        DelegationToolset::standard(deps)
    }

    fn coordinator(&self, script: Vec<Decision>, fail_at: Option<usize>) -> (Coordinator, Transcript) {
        // 所有运行共享同一份 transcript，便于断言 planner 收到的观察
        let mut template = ScriptedPlanner::new(script).with_cost_per_decision(0.001);
        if let Some(step) = fail_at {
            template = template.failing_at(step);
        }
        let transcript = template.transcript();
        let factory = move || Box::new(template.clone()) as Box<dyn Planner>;
        (
            Coordinator::new(Arc::new(factory), self.toolset()),
            transcript,
        )
    }
}

fn research(topic: Topic) -> Decision {
    Decision::new("research_topic", json!({"topic": topic.as_str()}))
}

fn extract(category: Category) -> Decision {
    Decision::new("extract_category", json!({"category": category.as_str()}))
}

fn full_script() -> Vec<Decision> {
    let mut script: Vec<Decision> = Topic::RESEARCHABLE.iter().map(|t| research(*t)).collect();
    script.extend(Category::ALL.iter().map(|c| extract(*c)));
    script.push(Decision::new("cross_reference", json!({})));
    script.push(Decision::new("discover_related", json!({})));
    script
}

#[tokio::test]
async fn test_full_run_produces_all_records() {
    let harness = Harness::new(
        StaticResearcher::new(0.02).with_urls(Topic::Geography, &[PAGE]),
    );
    let (coordinator, _) = harness.coordinator(full_script(), None);
    let goal = Goal::new("elwynn", "Elwynn Forest");

    let result = coordinator.run(&goal).await.unwrap();

    assert_eq!(result.unit_id, "elwynn");
    assert_eq!(result.category_records.len(), 5);
    let xref = result.cross_reference_result.as_ref().unwrap();
    // items 抽取出 0 个实体，置信度被压到 0.2 以下
    assert!(xref.confidence[&Category::Items] <= 0.2);
    assert_eq!(xref.confidence[&Category::Zone], 0.9);
    assert_eq!(result.discovered_units, ["westfall", "redridge"]);
    assert_eq!(result.sources.len(), 1);

    let expected_worker = 5.0 * 0.02 + 5.0 * 0.01 + 0.03 + 0.005;
    assert!((result.worker_cost_usd - expected_worker).abs() < 1e-9);
    // 12 次调用 + 1 次 Done
    assert!((result.planner_cost_usd - 0.013).abs() < 1e-9);
    assert_eq!(harness.researcher.calls(), 5);
    assert_eq!(harness.extractor.calls(), 5);
    assert_eq!(harness.cross_referencer.calls(), 1);
}

#[tokio::test]
async fn test_skip_discovery_never_invokes_discoverer() {
    let harness = Harness::new(StaticResearcher::new(0.02));
    let (coordinator, _) = harness.coordinator(full_script(), None);
    let goal = Goal::new("elwynn", "Elwynn Forest").skipping_discovery();

    let result = coordinator.run(&goal).await.unwrap();

    assert_eq!(harness.discoverer.calls(), 0);
    assert!(result.discovered_units.is_empty());
    assert_eq!(result.category_records.len(), 5);
    assert!(result.cross_reference_result.is_some());
}

/// 不理会禁用列表的 planner：先调用 discover_related，再结束
struct StubbornPlanner {
    called: bool,
    observation: Arc<std::sync::Mutex<Option<String>>>,
}

#[async_trait]
impl Planner for StubbornPlanner {
    fn start(&mut self, _brief: &RunBrief) {}

    async fn next_decision(
        &mut self,
        last: Option<&ToolObservation>,
    ) -> Result<PlannerStep, PlannerError> {
        if let Some(obs) = last {
            *self.observation.lock().unwrap() = Some(obs.text.clone());
        }
        if self.called {
            return Ok(PlannerStep::Done);
        }
        self.called = true;
        Ok(PlannerStep::Call(Decision::new("discover_related", json!({}))))
    }

    fn cost_usd(&self) -> f64 {
        0.0
    }
}

#[tokio::test]
async fn test_disabled_tool_is_refused_even_if_called() {
    let harness = Harness::new(StaticResearcher::new(0.02));
    let observation = Arc::new(std::sync::Mutex::new(None));
    let seen = Arc::clone(&observation);
    let factory = move || {
        Box::new(StubbornPlanner {
            called: false,
            observation: Arc::clone(&seen),
        }) as Box<dyn Planner>
    };
    let coordinator = Coordinator::new(Arc::new(factory), harness.toolset());

    let goal = Goal::new("elwynn", "Elwynn Forest").skipping_discovery();
    let result = coordinator.run(&goal).await.unwrap();

    assert_eq!(harness.discoverer.calls(), 0);
    assert!(result.discovered_units.is_empty());
    assert_eq!(result.worker_cost_usd, 0.0);
    let text = observation.lock().unwrap().clone().unwrap();
    assert!(text.contains("disabled"), "{text}");
}

#[tokio::test]
async fn test_researcher_failure_is_isolated() {
    // 第 2 次调研（inhabitants）失败
    let harness = Harness::new(StaticResearcher::new(0.02).failing_on_call(2));
    let script = vec![
        research(Topic::Geography),
        research(Topic::Inhabitants),
        research(Topic::History),
        extract(Category::Zone),
        extract(Category::Npcs),
        extract(Category::Factions),
    ];
    let (coordinator, transcript) = harness.coordinator(script, None);
    let goal = Goal::new("elwynn", "Elwynn Forest");

    let result = coordinator.run(&goal).await.unwrap();

    assert!(result.category_records.contains_key(&Category::Zone));
    assert!(result.category_records.contains_key(&Category::Factions));
    assert!(!result.category_records.contains_key(&Category::Npcs));

    let observations = transcript.lock().unwrap().clone();
    assert_eq!(observations.len(), 6);
    assert!(observations[1].text.contains("failed"));
    assert!(observations[4].text.contains("No content for topic 'inhabitants'"));
    // 失败调用的成本仍计入 worker 成本
    let expected_worker = 3.0 * 0.02 + 2.0 * 0.01;
    assert!((result.worker_cost_usd - expected_worker).abs() < 1e-9);
}

#[tokio::test]
async fn test_direct_fetch_twice_hits_cache() {
    let harness = Harness::new(StaticResearcher::new(0.02));
    let script = vec![
        Decision::new("fetch_url", json!({"url": PAGE})),
        Decision::new("fetch_url", json!({"url": "https://WWW.wowpedia.fandom.com/wiki/Elwynn_Forest/#Geography"})),
        Decision::new("teleport", json!({})),
    ];
    let (coordinator, transcript) = harness.coordinator(script, None);

    let result = coordinator.run(&Goal::new("elwynn", "Elwynn Forest")).await.unwrap();

    assert_eq!(harness.fetcher.calls(), 1);
    assert_eq!(result.sources.len(), 2);
    assert!(result.sources[1].from_cache);
    let observations = transcript.lock().unwrap().clone();
    assert!(observations[2].text.contains("Unknown tool 'teleport'"));
}

#[tokio::test]
async fn test_planner_failure_aborts_without_result() {
    let harness = Harness::new(StaticResearcher::new(0.02));
    let (coordinator, _) = harness.coordinator(full_script(), Some(3));

    let err = coordinator
        .run(&Goal::new("elwynn", "Elwynn Forest"))
        .await
        .unwrap_err();

    assert!(matches!(err, CoordinatorError::Planner(PlannerError::Scripted(3))));
    assert_eq!(harness.researcher.calls(), 2);
}

#[tokio::test]
async fn test_runs_do_not_share_state() {
    let harness = Harness::new(StaticResearcher::new(0.02));
    let script = vec![research(Topic::Geography), extract(Category::Zone)];
    let (coordinator, _) = harness.coordinator(script, None);
    let goal = Goal::new("elwynn", "Elwynn Forest");

    let first = coordinator.run(&goal).await.unwrap();
    let second = coordinator.run(&goal).await.unwrap();

    assert_ne!(first.run_id, second.run_id);
    assert_eq!(first.category_records.len(), 1);
    assert_eq!(second.category_records.len(), 1);
    assert!((first.worker_cost_usd - second.worker_cost_usd).abs() < 1e-9);
    assert!((second.planner_cost_usd - 0.003).abs() < 1e-9);
}

#[tokio::test]
async fn test_empty_unit_id_is_rejected() {
    let harness = Harness::new(StaticResearcher::new(0.02));
    let (coordinator, _) = harness.coordinator(Vec::new(), None);
    let err = coordinator.run(&Goal::new("  ", "Nowhere")).await.unwrap_err();
    assert!(matches!(err, CoordinatorError::InvalidGoal(_)));
}
