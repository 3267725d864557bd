//! CLI command implementations

use anyhow::{bail, Context, Result};
use chrono::Utc;
use sessions_executor::sessions_auth::{DefaultCredential, TokenCache};
use sessions_executor::{
    extract_python_blocks, CodeFragment, ExecutionClient, ExecutionOutcome, ExecutorConfig,
};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;

/// Install stderr logging, plus a plain-text file layer when requested
pub fn init_tracing(verbose: bool, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "sessions={},sessions_auth={},sessions_executor={}",
            log_level, log_level, log_level
        ))
    });

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .with_context(|| format!("Log file has no name: {}", path.display()))?;
            let appender = tracing_appender::rolling::never(directory, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(file_layer)
        .with(filter)
        .init();

    Ok(guard)
}

/// Config file and environment, then the `--endpoint` override
pub fn resolve_config(path: Option<&Path>, endpoint: Option<String>) -> Result<ExecutorConfig> {
    ExecutorConfig::load_with_endpoint(path, endpoint.as_deref())
        .context("Failed to load configuration")
}

/// One fragment per file (or stdin); markdown input yields its python blocks
pub fn read_fragments(files: &[PathBuf], markdown: bool) -> Result<Vec<CodeFragment>> {
    let inputs = if files.is_empty() {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read stdin")?;
        vec![text]
    } else {
        files
            .iter()
            .map(|path| {
                std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))
            })
            .collect::<Result<Vec<_>>>()?
    };

    let fragments: Vec<CodeFragment> = if markdown {
        inputs.iter().flat_map(|text| extract_python_blocks(text)).collect()
    } else {
        inputs.into_iter().map(CodeFragment::new).collect()
    };

    if fragments.is_empty() {
        bail!("No code to execute");
    }
    debug!(count = fragments.len(), "Read fragments");
    Ok(fragments)
}

/// Execute a batch against the configured pool
pub async fn execute_run(
    config: ExecutorConfig,
    fragments: Vec<CodeFragment>,
) -> Result<ExecutionOutcome> {
    let client = ExecutionClient::with_provider(config, DefaultCredential::from_env())?;
    info!(endpoint = %client.execute_url(), identifier = client.identifier(), "Running batch");

    match client.execute(&fragments).await {
        Ok(outcome) => Ok(outcome),
        Err(err) => {
            // Whatever ran before the failure is still worth showing
            if let Some(partial) = err.partial_outcome() {
                if !partial.combined_log.is_empty() {
                    print_log(&partial.combined_log);
                }
            }
            Err(err).context("Batch could not complete")
        }
    }
}

pub fn print_outcome(outcome: &ExecutionOutcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
    } else {
        print_log(&outcome.combined_log);
    }
    Ok(())
}

fn print_log(log: &str) {
    if log.ends_with('\n') || log.is_empty() {
        print!("{}", log);
    } else {
        println!("{}", log);
    }
}

/// Acquire a token for `scope` and report its lifetime (never the token)
pub async fn execute_token(config: ExecutorConfig, scope: Option<String>) -> Result<()> {
    let scope = scope.unwrap_or(config.scope);
    let cache = TokenCache::new(DefaultCredential::from_env());

    let token = cache
        .get_token(&scope)
        .await
        .with_context(|| format!("Failed to acquire a token for {}", scope))?;

    let remaining = token.remaining(Utc::now());
    println!("provider:   {}", cache.provider_name());
    println!("scope:      {}", scope);
    println!("expires_at: {}", token.expires_at().to_rfc3339());
    println!("remaining:  {}s", remaining.num_seconds());
    Ok(())
}
