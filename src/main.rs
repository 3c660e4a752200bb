use anyhow::Result;
use clap::Parser;
use dotenvy::dotenv;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use web_nav_agent::brain::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use web_nav_agent::human::read_reply;
use web_nav_agent::manual::ManualDriver;
use web_nav_agent::types::{
    DEFAULT_MAX_IMAGES, DEFAULT_MAX_STEPS, DEFAULT_SETTLE_MS, DEFAULT_START_URL,
};
use web_nav_agent::{
    AgentConfig, BrowserConfig, ChatClient, ChromeBrowser, LlmClient, LlmConfig, RunOutcome,
    StdinHuman, WebNavAgent, save_run,
};

/// Drive Chrome toward a task with a vision model.
#[derive(Debug, Parser)]
#[command(name = "web-nav-agent", version)]
struct Cli {
    /// What the agent should accomplish. Asked for on stdin if omitted.
    task: Option<String>,

    #[arg(long, default_value = DEFAULT_START_URL)]
    start_url: String,

    #[arg(long, default_value_t = DEFAULT_MAX_STEPS)]
    max_steps: usize,

    /// Screenshots kept in each request to the model.
    #[arg(long, default_value_t = DEFAULT_MAX_IMAGES)]
    max_images: usize,

    /// Idle time after each action before the next screenshot.
    #[arg(long, default_value_t = DEFAULT_SETTLE_MS)]
    settle_ms: u64,

    #[arg(long)]
    headless: bool,

    #[arg(long)]
    chrome_path: Option<PathBuf>,

    /// Where run directories are written.
    #[arg(long, default_value = "results")]
    output_dir: PathBuf,

    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,

    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Act as the model yourself: type each action at the prompt.
    #[arg(long)]
    manual: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let task = match cli.task.clone() {
        Some(task) => task,
        None => {
            tokio::task::spawn_blocking(|| read_reply("Task: "))
                .await??
                .trim()
                .to_string()
        }
    };

    if cli.manual {
        let driver = ManualDriver::new(cli.output_dir.join("manual"));
        run(driver, &cli, &task).await
    } else {
        let mut llm = LlmConfig::from_env()?;
        llm.model = cli.model.clone();
        llm.base_url = cli.base_url.clone();
        run(ChatClient::new(llm), &cli, &task).await
    }
}

async fn run<L: LlmClient>(llm: L, cli: &Cli, task: &str) -> Result<()> {
    let config = AgentConfig {
        max_steps: cli.max_steps,
        max_images: cli.max_images,
        start_url: cli.start_url.clone(),
        settle_delay: Duration::from_millis(cli.settle_ms),
        ..Default::default()
    };
    let mut browser = ChromeBrowser::new(BrowserConfig {
        headless: cli.headless,
        chrome_path: cli.chrome_path.clone(),
        ..Default::default()
    });

    let agent = WebNavAgent::new(llm, StdinHuman, config);
    let report = agent.run(&mut browser, task).await?;

    match report.outcome {
        RunOutcome::Finished => info!(steps = report.steps.len(), "Task finished"),
        RunOutcome::Exhausted => info!(steps = report.steps.len(), "Step limit reached"),
    }

    let run_dir = save_run(task, &report.steps, &cli.output_dir)?;
    println!("\nResults saved to: {}", run_dir.display());
    Ok(())
}
