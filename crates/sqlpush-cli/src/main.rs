use clap::Parser;
use tracing_subscriber::EnvFilter;

mod apply;
mod args;
mod console;

use args::Cli;

#[tokio::main]
async fn main() {
    // Missing .env is fine; the environment may already carry the values.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let code = match apply::run(&cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            apply::ExitCode::SetupError
        }
    };
    std::process::exit(code.as_i32());
}

fn init_tracing(verbose: u8) {
    let default_filter = match verbose {
        // progress lines already cover per-tier failures
        0 => "sqlpush=warn,sqlpush_config=warn,sqlpush_security=warn,sqlpush_runner=error",
        1 => "sqlpush=info,sqlpush_config=info,sqlpush_security=info,sqlpush_runner=info",
        _ => "sqlpush=debug,sqlpush_config=debug,sqlpush_security=debug,sqlpush_runner=debug",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}
