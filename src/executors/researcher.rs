//! 内容调研执行器（LLM）
//!
//! 两步：先让 LLM 给出候选 URL（JSON 数组），经抓取网关并发抓取（去重、走缓存），
//! 再让 LLM 基于抓到的页面写出该主题的调研笔记。没有任何页面可用时视为可重试失败。

use std::collections::HashSet;

use async_trait::async_trait;
use futures_util::future::join_all;

use crate::accumulator::normalize_url;
use crate::executors::{
    ContentResearcher, ExecutorError, ExecutorOutput, FetchGateway, LlmWorker, Research,
    ResearchRequest,
};
use crate::text::truncate_chars;

const PLAN_SYSTEM: &str = "You are a research assistant for a game-world wiki. Given a research directive, propose web pages likely to contain the answer. Respond with a JSON array of absolute URLs only.";

const WRITE_SYSTEM: &str = "You are a research assistant for a game-world wiki. Write factual research notes that answer the directive using ONLY the numbered pages provided. Cite pages as [n]. Plain text, no preamble.";

/// 每个页面送入写作步骤的最大字符数
const PAGE_EXCERPT_CHARS: usize = 4000;

pub struct LlmResearcher {
    worker: LlmWorker,
}

impl LlmResearcher {
    pub fn new(worker: LlmWorker) -> Self {
        Self { worker }
    }
}

/// 按规范化 URL 去重并限量；无效 URL 丢弃
fn dedupe_urls(urls: Vec<String>, max: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter()
        .filter(|u| match normalize_url(u) {
            Ok(n) => seen.insert(n),
            Err(_) => false,
        })
        .take(max)
        .collect()
}

fn add_cost(err: ExecutorError, extra: f64) -> ExecutorError {
    let total = err.cost_usd() + extra;
    err.with_cost(total)
}

#[async_trait]
impl ContentResearcher for LlmResearcher {
    async fn research(
        &self,
        request: &ResearchRequest,
        web: &FetchGateway<'_>,
        remaining_usd: f64,
    ) -> Result<ExecutorOutput<Research>, ExecutorError> {
        let plan_prompt = format!(
            "Subject: {} ({})\nTopic: {}\nDirective: {}\nReturn at most {} URLs.",
            request.display_name, request.unit_id, request.topic, request.directive, request.max_urls
        );
        let planned = self
            .worker
            .ask_json::<Vec<String>>(PLAN_SYSTEM, &plan_prompt, remaining_usd)
            .await?;
        let plan_cost = planned.cost_usd;
        let urls = dedupe_urls(planned.value, request.max_urls);

        let results = join_all(urls.iter().map(|u| web.fetch(u))).await;
        let mut pages = Vec::new();
        for (url, result) in urls.iter().zip(results) {
            match result {
                Ok(page) => pages.push(page),
                Err(e) => tracing::debug!(url = %url, error = %e, "skipping unfetchable page"),
            }
        }
        if pages.is_empty() {
            return Err(ExecutorError::transient(format!(
                "none of {} candidate pages could be fetched",
                urls.len()
            ))
            .with_cost(plan_cost));
        }

        let excerpts = pages
            .iter()
            .enumerate()
            .map(|(i, p)| {
                format!(
                    "[{}] {}\n{}",
                    i + 1,
                    p.source.url,
                    truncate_chars(&p.content, PAGE_EXCERPT_CHARS, " ...")
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        let write_prompt = format!(
            "Subject: {}\nDirective: {}\n\nPages:\n{}",
            request.display_name, request.directive, excerpts
        );
        let (notes, write_cost) = self
            .worker
            .ask(WRITE_SYSTEM, &write_prompt, remaining_usd - plan_cost)
            .await
            .map_err(|e| add_cost(e, plan_cost))?;

        let notes = notes.trim().to_string();
        if notes.is_empty() {
            return Err(ExecutorError::transient("empty research notes")
                .with_cost(plan_cost + write_cost));
        }

        Ok(ExecutorOutput::new(
            Research {
                blocks: vec![notes],
                sources: pages.into_iter().map(|p| p.source).collect(),
            },
            plan_cost + write_cost,
        ))
    }
}
