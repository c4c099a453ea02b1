//! Forage 命令行入口
//!
//! 用法：forage <unit_id> [display name] [--skip-discovery] [--config PATH]
//! 从配置构建 LLM planner 与执行器，执行一次协调运行，把最终结果以 JSON 打印到 stdout。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use forage::config::load_config;
use forage::llm::{LlmClient, OpenAiClient};
use forage::{observability, CoordinatorBuilder, Goal};

#[derive(Parser, Debug)]
#[command(name = "forage", version)]
#[command(about = "Goal-directed research of one game-world region")]
struct Cli {
    /// Region identifier, e.g. elwynn_forest
    unit_id: String,
    /// Display name; defaults to the unit id
    display_name: Vec<String>,
    /// Tell the planner not to call discover_related
    #[arg(long)]
    skip_discovery: bool,
    /// Extra TOML file layered over config/default.toml
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

impl Cli {
    fn goal(&self) -> Goal {
        let display_name = if self.display_name.is_empty() {
            self.unit_id.clone()
        } else {
            self.display_name.join(" ")
        };
        let mut goal = Goal::new(self.unit_id.clone(), display_name);
        goal.skip_discovery = self.skip_discovery;
        goal
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cli = Cli::parse();
    let cfg = load_config(cli.config.clone()).context("Failed to load config")?;

    let api_key = std::env::var(&cfg.llm.api_key_env).ok();
    if api_key.is_none() {
        tracing::warn!(env = %cfg.llm.api_key_env, "API key env var not set");
    }
    let base_url = cfg.llm.base_url.as_deref();
    let planner_llm: Arc<dyn LlmClient> = Arc::new(OpenAiClient::new(
        base_url,
        &cfg.llm.model,
        api_key.as_deref(),
    ));
    let worker_model = cfg.llm.worker_model.as_deref().unwrap_or(&cfg.llm.model);
    let worker_llm: Arc<dyn LlmClient> =
        Arc::new(OpenAiClient::new(base_url, worker_model, api_key.as_deref()));

    let coordinator = CoordinatorBuilder::new(cfg.clone())
        .with_planner_llm(planner_llm)
        .with_worker_llm(worker_llm)
        .build()
        .context("Failed to build coordinator")?;

    let goal = cli.goal();

    let result = coordinator.run(&goal).await.context("Coordinator run failed")?;
    println!(
        "{}",
        serde_json::to_string_pretty(&result).context("Failed to serialize result")?
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_display_name_and_flags() {
        let cli = Cli::try_parse_from([
            "forage",
            "elwynn_forest",
            "Elwynn",
            "Forest",
            "--skip-discovery",
            "--config",
            "local.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("local.toml")));
        let goal = cli.goal();
        assert_eq!(goal.unit_id, "elwynn_forest");
        assert_eq!(goal.display_name, "Elwynn Forest");
        assert!(goal.skip_discovery);
    }

    #[test]
    fn test_cli_defaults_display_name_to_unit_id() {
        let goal = Cli::try_parse_from(["forage", "westfall"]).unwrap().goal();
        assert_eq!(goal.display_name, "westfall");
        assert!(!goal.skip_discovery);
        assert!(Cli::try_parse_from(["forage"]).is_err());
    }
}
