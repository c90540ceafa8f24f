use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlpush_config::{AppConfig, ConfigLoader};
use sqlpush_runner::{Executor, ExecutorOptions, MigrationScript, RestClient, build_strategies};
use sqlpush_security::{CredentialValidator, SERVICE_ROLE};
use tracing::{debug, info, warn};

use crate::args::Cli;
use crate::console;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Completed, including runs where some statements failed.
    Success = 0,
    SetupError = 1,
    /// `--fail-fast` stopped on a failed statement.
    Aborted = 2,
    /// A request timed out; what it carried may or may not have run.
    Unconfirmed = 3,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

pub async fn run(cli: &Cli) -> Result<ExitCode> {
    run_with_env(cli, |name| std::env::var(name).ok()).await
}

/// Full invocation with environment lookups going through `lookup`.
///
/// Configuration and the migration file are both checked before any client
/// is built, so setup errors never reach the network.
pub async fn run_with_env<F>(cli: &Cli, lookup: F) -> Result<ExitCode>
where
    F: Fn(&str) -> Option<String>,
{
    if cli.dry_run {
        let script = read_script(&cli.file)?;
        let config = load_config(cli, lookup).context("failed to load configuration")?;
        console::print_statements(&script, config.execution.preview_chars);
        return Ok(ExitCode::Success);
    }

    let config = load_config(cli, lookup).context("failed to load configuration")?;

    let endpoint = CredentialValidator::validate_endpoint(config.endpoint.require_url()?)?;
    let key = config.endpoint.require_service_key()?;
    CredentialValidator::validate_service_key(key)?;
    match CredentialValidator::key_role(key) {
        Some(role) if role != SERVICE_ROLE => warn!(
            "key role is {role:?}, not {SERVICE_ROLE:?}; admin procedures will likely be refused"
        ),
        Some(_) => {}
        None => debug!("service key is not a JWT, skipping role check"),
    }
    info!(url = %endpoint, key = %CredentialValidator::mask(key), "endpoint configured");

    let script = read_script(&cli.file)?;
    if cli.show_sql && !cli.json {
        console::print_sql(&script);
    }

    let client = Arc::new(RestClient::new(
        endpoint.clone(),
        key,
        Duration::from_secs(config.execution.request_timeout_secs),
    )?);
    let strategies = build_strategies(&config.strategies, client)?;
    let mut executor = Executor::new(strategies, ExecutorOptions::from(&config.execution))?;

    if !cli.json {
        console::print_header(&script, &endpoint, &executor.strategy_names());
        executor = executor.with_progress(console::progress_printer());
    }

    let report = executor.run(&script).await;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        console::print_summary(&report);
    }

    Ok(if report.needs_verification() {
        ExitCode::Unconfirmed
    } else if report.aborted {
        ExitCode::Aborted
    } else {
        ExitCode::Success
    })
}

fn load_config<F>(cli: &Cli, lookup: F) -> Result<AppConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_file(path);
    }
    let mut config = loader.load_with(lookup)?;

    config.apply_overrides(cli.url.clone(), cli.service_key.clone());
    if cli.fail_fast {
        config.execution.fail_fast = true;
    }
    if cli.split_only {
        config.execution.whole_script_first = false;
    }
    Ok(config)
}

fn read_script(path: &Path) -> Result<MigrationScript> {
    let script = MigrationScript::read(path).context("failed to read migration file")?;
    info!(
        "loaded {} ({} characters)",
        path.display(),
        script.text().chars().count()
    );
    Ok(script)
}
