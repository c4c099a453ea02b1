//! LLM 驱动的 planner
//!
//! 维护一段与 planner LLM 的对话：system prompt 含目标与工具 schema，每条观察作为 user 消息追加。
//! 回复中含 {"tool": ..., "args": ...} 即为一次调用；纯文本回复（或 {"done": true}）表示完成。
//! 非法 JSON 会追加纠正提示重试，连续超过 max_parse_retries 次视为 planner 故障。

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::config::PlannerSection;
use crate::coordinator::{Decision, Planner, PlannerError, PlannerFactory, PlannerStep, RunBrief};
use crate::llm::{LlmClient, Message, TokenPricing, UsageSnapshot};
use crate::text::extract_json_block;
use crate::tools::ToolObservation;

#[derive(Debug, Deserialize)]
struct DecisionWire {
    #[serde(default)]
    tool: String,
    #[serde(default)]
    args: Value,
    #[serde(default)]
    done: bool,
}

/// 解析 planner 输出：Ok(Some) 为调用，Ok(None) 为完成，Err 为无法解析的工具调用 JSON
///
/// 只有 JSON 对象才可能是调用；纯文本里的 `[1]`、`[zone, npcs]` 之类括号视为完成。
pub fn parse_decision(output: &str) -> Result<Option<Decision>, String> {
    let Some(json_str) = extract_json_block(output) else {
        return Ok(None);
    };
    if !json_str.starts_with('{') {
        return Ok(None);
    }
    let wire: DecisionWire = match serde_json::from_str(json_str) {
        Ok(wire) => wire,
        // 看起来是工具调用却解析失败才算非法输出
        Err(e) if json_str.contains("\"tool\"") => return Err(format!("{e}: {json_str}")),
        Err(_) => return Ok(None),
    };
    if wire.done || wire.tool.trim().is_empty() {
        return Ok(None);
    }
    let args = if wire.args.is_null() {
        Value::Object(Default::default())
    } else {
        wire.args
    };
    Ok(Some(Decision::new(wire.tool.trim(), args)))
}

fn system_prompt(brief: &RunBrief) -> String {
    let tools: Vec<&crate::tools::ToolSpec> = brief.available_tools().collect();
    let schema = serde_json::to_string_pretty(&tools).unwrap_or_else(|_| "[]".to_string());
    let mut prompt = format!(
        "You coordinate research on one game-world region: \"{}\" (id: {}).\n\
         Gather content per topic, extract structured records per category, cross-reference them, \
         and find related regions. You decide the order; each tool returns a short observation.\n\
         Reply with exactly one JSON object per turn: {{\"tool\": \"<name>\", \"args\": {{...}}}}.\n\
         When the research is complete, reply with a short plain-text summary and no JSON.\n\n\
         ## Tools\n```json\n{}\n```",
        brief.goal.display_name, brief.goal.unit_id, schema
    );
    if !brief.excluded_tools.is_empty() {
        prompt.push_str(&format!(
            "\n\nDisabled for this run (do not call): {}.",
            brief.excluded_tools.join(", ")
        ));
    }
    prompt
}

pub struct LlmPlanner {
    llm: Arc<dyn LlmClient>,
    pricing: TokenPricing,
    settings: PlannerSection,
    system: Option<String>,
    messages: Vec<Message>,
    turns: usize,
    cost_usd: f64,
}

impl LlmPlanner {
    pub fn new(llm: Arc<dyn LlmClient>, pricing: TokenPricing, settings: PlannerSection) -> Self {
        Self {
            llm,
            pricing,
            settings,
            system: None,
            messages: Vec::new(),
            turns: 0,
            cost_usd: 0.0,
        }
    }

    /// 产生 LlmPlanner 的工厂；每次 create 都是全新对话
    pub fn factory(
        llm: Arc<dyn LlmClient>,
        pricing: TokenPricing,
        settings: PlannerSection,
    ) -> impl PlannerFactory {
        move || {
            Box::new(LlmPlanner::new(Arc::clone(&llm), pricing, settings.clone())) as Box<dyn Planner>
        }
    }

    async fn ask(&mut self, system: &str) -> Result<String, PlannerError> {
        let mut full = Vec::with_capacity(self.messages.len() + 1);
        full.push(Message::system(system));
        full.extend(self.messages.iter().cloned());

        let snapshot = UsageSnapshot::take(self.llm.as_ref());
        let reply = self.llm.complete(&full).await;
        let text = reply.as_deref().unwrap_or("");
        self.cost_usd += snapshot.cost_since(self.llm.as_ref(), &self.pricing, &full, text);
        reply.map_err(PlannerError::Llm)
    }
}

#[async_trait]
impl Planner for LlmPlanner {
    fn start(&mut self, brief: &RunBrief) {
        self.system = Some(system_prompt(brief));
        self.messages = vec![Message::user(format!(
            "Begin researching {} ({}).",
            brief.goal.display_name, brief.goal.unit_id
        ))];
        self.turns = 0;
    }

    async fn next_decision(
        &mut self,
        last: Option<&ToolObservation>,
    ) -> Result<PlannerStep, PlannerError> {
        let system = self.system.clone().ok_or(PlannerError::NotStarted)?;
        if let Some(obs) = last {
            self.messages
                .push(Message::user(format!("Observation ({}):\n{}", obs.tool, obs.text)));
        }
        if self.turns >= self.settings.max_turns {
            tracing::info!(turns = self.turns, "planner reached max turns, finishing");
            return Ok(PlannerStep::Done);
        }
        self.turns += 1;

        let mut failures = 0;
        loop {
            let reply = self.ask(&system).await?;
            self.messages.push(Message::assistant(reply.clone()));
            match parse_decision(&reply) {
                Ok(Some(decision)) => return Ok(PlannerStep::Call(decision)),
                Ok(None) => return Ok(PlannerStep::Done),
                Err(detail) => {
                    failures += 1;
                    tracing::warn!(attempt = failures, error = %detail, "planner output is not valid JSON");
                    if failures > self.settings.max_parse_retries {
                        return Err(PlannerError::MalformedOutput {
                            attempts: failures,
                            detail,
                        });
                    }
                    self.messages.push(Message::user(format!(
                        "Your last reply was not valid JSON ({detail}). Reply with exactly one JSON object: {{\"tool\": \"<name>\", \"args\": {{...}}}}, or plain text if you are done."
                    )));
                }
            }
        }
    }

    fn cost_usd(&self) -> f64 {
        self.cost_usd
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlmClient;
    use crate::model::Goal;
    use crate::tools::ToolSpec;

    fn brief(excluded: &[&str]) -> RunBrief {
        RunBrief {
            goal: Goal::new("elwynn", "Elwynn Forest"),
            tools: vec![
                ToolSpec {
                    name: "research_topic".into(),
                    description: "Research a topic".into(),
                    parameters: serde_json::json!({"type": "object"}),
                },
                ToolSpec {
                    name: "discover_related".into(),
                    description: "Find related regions".into(),
                    parameters: serde_json::json!({"type": "object"}),
                },
            ],
            excluded_tools: excluded.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn settings(max_turns: usize, max_parse_retries: usize) -> PlannerSection {
        PlannerSection {
            max_turns,
            max_parse_retries,
        }
    }

    #[test]
    fn test_parse_decision() {
        let d = parse_decision(r#"{"tool": "research_topic", "args": {"topic": "items"}}"#)
            .unwrap()
            .unwrap();
        assert_eq!(d.tool, "research_topic");
        assert_eq!(d.args["topic"], "items");

        let fenced = "I'll start.\n```json\n{\"tool\": \"cross_reference\"}\n```";
        let d = parse_decision(fenced).unwrap().unwrap();
        assert!(d.args.is_object());

        assert_eq!(parse_decision("All categories are done.").unwrap(), None);
        assert_eq!(parse_decision(r#"{"done": true}"#).unwrap(), None);
        assert!(parse_decision(r#"{"tool": "research_topic", "args": }"#).is_err());
    }

    #[test]
    fn test_bracketed_summary_means_done() {
        assert_eq!(
            parse_decision("Research complete: all 5 categories extracted [zone, npcs, factions, quests, items].")
                .unwrap(),
            None
        );
        assert_eq!(parse_decision("Finished. Confidence for zone is high [1].").unwrap(), None);
        assert_eq!(parse_decision("Done {see notes above}.").unwrap(), None);
    }

    #[tokio::test]
    async fn test_bracketed_summary_finishes_planner() {
        let llm = Arc::new(ScriptedLlmClient::new([
            "Finished. Confidence for zone is high [1].",
        ]));
        let mut planner = LlmPlanner::new(llm.clone(), TokenPricing::default(), PlannerSection::default());
        planner.start(&brief(&[]));
        assert_eq!(planner.next_decision(None).await.unwrap(), PlannerStep::Done);
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_llm_planner_decides_then_finishes() {
        let llm = Arc::new(ScriptedLlmClient::new([
            r#"{"tool": "research_topic", "args": {"topic": "geography"}}"#,
            "Research complete.",
        ]));
        let mut planner = LlmPlanner::new(llm.clone(), TokenPricing::new(1.0, 1.0), settings(10, 1));
        planner.start(&brief(&["discover_related"]));

        let step = planner.next_decision(None).await.unwrap();
        assert!(matches!(step, PlannerStep::Call(ref d) if d.tool == "research_topic"));
        let system = &llm.last_messages()[0].content;
        assert!(system.contains("Elwynn Forest"));
        assert!(system.contains("Disabled for this run (do not call): discover_related"));

        let obs = ToolObservation {
            tool: "research_topic".into(),
            args: serde_json::json!({"topic": "geography"}),
            text: "Researched 'geography'".into(),
        };
        assert_eq!(planner.next_decision(Some(&obs)).await.unwrap(), PlannerStep::Done);
        assert!(llm
            .last_messages()
            .iter()
            .any(|m| m.content.contains("Observation (research_topic)")));
        assert!(planner.cost_usd() > 0.0);
    }

    #[tokio::test]
    async fn test_malformed_output_retries_then_fails() {
        let llm = Arc::new(ScriptedLlmClient::new([
            r#"{"tool": "research_topic", "args": }"#,
            r#"{"tool": "research_topic", "args": {"topic": "items"}}"#,
            r#"{"tool": oops}"#,
            r#"{"tool": oops}"#,
        ]));
        let mut planner = LlmPlanner::new(llm.clone(), TokenPricing::default(), settings(10, 1));
        planner.start(&brief(&[]));

        // 第一次非法后纠正成功
        let step = planner.next_decision(None).await.unwrap();
        assert!(matches!(step, PlannerStep::Call(_)));
        // 连续两次非法，超过 max_parse_retries = 1
        let err = planner.next_decision(None).await.unwrap_err();
        assert!(matches!(err, PlannerError::MalformedOutput { attempts: 2, .. }));
    }

    #[tokio::test]
    async fn test_max_turns_and_llm_errors() {
        let llm = Arc::new(ScriptedLlmClient::new([r#"{"tool": "research_topic", "args": {}}"#]));
        let mut planner = LlmPlanner::new(llm.clone(), TokenPricing::default(), settings(1, 0));
        planner.start(&brief(&[]));
        assert!(matches!(planner.next_decision(None).await, Ok(PlannerStep::Call(_))));
        assert_eq!(planner.next_decision(None).await.unwrap(), PlannerStep::Done);
        assert_eq!(llm.calls(), 1);

        let failing = Arc::new(ScriptedLlmClient::new(Vec::<String>::new()).then_fail("503"));
        let mut planner = LlmPlanner::new(failing, TokenPricing::default(), settings(5, 0));
        planner.start(&brief(&[]));
        assert_eq!(
            planner.next_decision(None).await,
            Err(PlannerError::Llm("503".into()))
        );
    }

    #[tokio::test]
    async fn test_not_started() {
        let llm = Arc::new(ScriptedLlmClient::new(Vec::<String>::new()));
        let mut planner = LlmPlanner::new(llm, TokenPricing::default(), settings(5, 0));
        assert_eq!(
            planner.next_decision(None).await,
            Err(PlannerError::NotStarted)
        );
    }
}
