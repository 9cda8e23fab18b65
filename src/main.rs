use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use research_assistant::config::{Config, ENDPOINT_ENV_VAR};
use research_assistant::console::{self, Console};
use research_assistant::research_service::ResearchServiceClient;
use research_assistant::submitter::QuerySubmitter;

fn config_candidates() -> Vec<PathBuf> {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."));

    vec![
        std::env::var("CONFIG_PATH").ok().map(PathBuf::from),
        Some(PathBuf::from("conf.yaml")),
        Some(PathBuf::from("conf.json")),
        Some(exe_dir.join("conf.yaml")),
        Some(exe_dir.join("conf.json")),
    ]
    .into_iter()
    .flatten()
    .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let discovered =
        Config::discover(&config_candidates()).context("Failed to load configuration")?;
    let config = discovered
        .config
        .with_endpoint_override(std::env::var(ENDPOINT_ENV_VAR).ok())
        .with_context(|| format!("{} is not a valid endpoint", ENDPOINT_ENV_VAR))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    for path in &discovered.skipped {
        debug!("No config at {}", path.display());
    }
    match &discovered.loaded_from {
        Some(path) => info!("Loaded configuration from: {}", path),
        None => info!("No config file found, using defaults"),
    }

    let backend = Arc::new(ResearchServiceClient::new(config.backend.endpoint.clone()));
    info!("Backend endpoint: {}", backend.endpoint());
    let submitter = QuerySubmitter::new(backend, config.ui.error_placeholder.clone());
    let mut view = Console::new(std::io::stdout(), config.ui.clone());

    let args: Vec<String> = std::env::args().skip(1).collect();
    if !args.is_empty() {
        let submission = console::run_once(&submitter, args.join(" "), &mut view).await?;
        if !submission.is_success() {
            std::process::exit(1);
        }
        return Ok(());
    }

    let stdin = BufReader::new(tokio::io::stdin());
    console::run_interactive(&submitter, stdin, &mut view).await?;
    Ok(())
}
