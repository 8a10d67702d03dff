use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::signal;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use visor_cli::config::EngineConfig;
use visor_cli::engine::{build_dry_run_driver, build_orchestrator, PageFixture};
use visor_cli::parser::parse_scenario;
use visor_cli::report::RunReport;

#[derive(Parser)]
#[command(
    name = "visor",
    version,
    about = "Vision-first browser test execution engine"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario against a scripted page.
    Run(RunArgs),
    /// Parse a scenario and print its steps without running anything.
    Check {
        /// Scenario text file.
        scenario: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Scenario text file.
    scenario: PathBuf,

    /// Engine config file (JSON).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Page fixture to seed the scripted page from (JSON).
    #[arg(long)]
    page: Option<PathBuf>,

    /// Where to write the JSON report. Defaults to
    /// `<artifacts-dir>/report.json`.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Artifacts directory for screenshots and the report.
    #[arg(long)]
    artifacts_dir: Option<PathBuf>,

    /// Keep running past permanent step failures.
    #[arg(long)]
    continue_on_failure: bool,

    /// Run the browser with a visible window.
    #[arg(long)]
    headed: bool,

    /// Wall-clock budget for the whole run (e.g. "90s", "5m").
    #[arg(long, value_name = "DURATION")]
    timeout: Option<humantime::Duration>,

    /// Enable the vision backend.
    #[arg(long)]
    vision: bool,

    /// Vision endpoint URL.
    #[arg(long)]
    vision_endpoint: Option<String>,

    /// Vision model name.
    #[arg(long)]
    vision_model: Option<String>,

    /// Vision API key.
    #[arg(long, env = "VISOR_VISION_API_KEY", hide_env_values = true)]
    vision_api_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Check { scenario } => check(scenario),
    }
}

fn load_config(args: &RunArgs) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path).context("loading config")?,
        None => EngineConfig::default(),
    };
    if let Some(dir) = &args.artifacts_dir {
        config.artifacts_dir = dir.clone();
    }
    if args.continue_on_failure {
        config.abort_on_failure = false;
    }
    if args.headed {
        config.headless = false;
    }
    if let Some(timeout) = args.timeout {
        config.scenario_timeout_secs = Some(timeout.as_secs());
    }
    if args.vision {
        config.vision.enabled = true;
    }
    if let Some(endpoint) = &args.vision_endpoint {
        config.vision.endpoint = endpoint.clone();
    }
    if let Some(model) = &args.vision_model {
        config.vision.model = model.clone();
    }
    if let Some(key) = &args.vision_api_key {
        config.vision.api_key = Some(key.clone());
    }
    Ok(config)
}

fn scenario_name(path: &std::path::Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "scenario".to_string())
}

async fn run(args: RunArgs) -> Result<()> {
    let config = load_config(&args)?;

    let text = std::fs::read_to_string(&args.scenario)
        .with_context(|| format!("reading scenario {}", args.scenario.display()))?;
    let scenario = parse_scenario(&scenario_name(&args.scenario), &text)?;

    let fixture = match &args.page {
        Some(path) => Some(PageFixture::load(path)?),
        None => None,
    };
    let driver = build_dry_run_driver(&config, fixture.as_ref())?;
    let orchestrator = Arc::new(build_orchestrator(&config, driver)?);

    let token = orchestrator.cancel_token();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, aborting run");
            token.cancel();
        }
    });

    let state = orchestrator.run(&scenario).await?;
    let report = RunReport::from_state(&state);

    let report_path = args
        .report
        .unwrap_or_else(|| config.artifacts_dir.join("report.json"));
    report.write_json(&report_path)?;
    println!("{}", report.render_summary());

    if state.status != scenario_flow::RunStatus::Passed {
        std::process::exit(1);
    }
    Ok(())
}

fn check(path: PathBuf) -> Result<()> {
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("reading scenario {}", path.display()))?;
    let scenario = parse_scenario(&scenario_name(&path), &text)?;
    scenario
        .validate()
        .map_err(|reason| anyhow::anyhow!("invalid scenario: {}", reason))?;

    println!("{} ({} steps)", scenario.name, scenario.steps.len());
    for step in &scenario.steps {
        println!("  {}: [{}] {}", step.index, step.action.kind(), step.description);
    }
    Ok(())
}
