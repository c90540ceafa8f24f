use std::path::PathBuf;

use clap::{ArgAction, Parser};

#[derive(Debug, Parser)]
#[command(name = "sqlpush")]
#[command(about = "Apply a SQL migration file through a hosted database's REST RPC endpoint")]
#[command(version)]
pub struct Cli {
    /// Migration file to apply
    pub file: PathBuf,

    /// YAML or TOML config file with endpoint, strategy chain and execution settings
    #[arg(short, long, env = "SQLPUSH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Endpoint URL, overrides SUPABASE_URL
    #[arg(long)]
    pub url: Option<String>,

    /// Service role key, overrides SUPABASE_SERVICE_ROLE_KEY (visible in the process list)
    #[arg(long)]
    pub service_key: Option<String>,

    /// Split and list the statements without contacting the server
    #[arg(long)]
    pub dry_run: bool,

    /// Print the migration text before executing it
    #[arg(long)]
    pub show_sql: bool,

    /// Stop at the first statement that fails on every strategy
    #[arg(long)]
    pub fail_fast: bool,

    /// Skip the single-call attempt and execute statement by statement
    #[arg(long)]
    pub split_only: bool,

    /// Print the execution report as JSON instead of progress lines
    #[arg(long)]
    pub json: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}
