use std::sync::Arc;
use std::time::{Duration, Instant};

use sqlpush_common::{Error, Result};
use sqlpush_config::ExecutionConfig;
use tracing::{debug, info, warn};

use crate::report::{ExecutionReport, Outcome, StatementOutcome, TierError};
use crate::script::{MigrationScript, Statement, preview};
use crate::strategy::ExecStrategy;

#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// Send the whole script through the first tier before splitting it.
    pub whole_script_first: bool,
    /// Stop after the first statement that fails on every tier.
    pub fail_fast: bool,
    pub preview_chars: usize,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self::from(&ExecutionConfig::default())
    }
}

impl From<&ExecutionConfig> for ExecutorOptions {
    fn from(config: &ExecutionConfig) -> Self {
        Self {
            whole_script_first: config.whole_script_first,
            fail_fast: config.fail_fast,
            preview_chars: config.preview_chars,
        }
    }
}

/// Events reported while a run is in flight.
#[derive(Debug)]
pub enum Progress<'a> {
    WholeScript { chars: usize, strategy: &'a str },
    WholeScriptFailed { error: &'a str },
    /// The whole-file call timed out; nothing else is sent.
    WholeScriptUnconfirmed { error: &'a str },
    Split { total: usize },
    Statement {
        ordinal: usize,
        total: usize,
        kind: &'a str,
        preview: &'a str,
    },
    TierFailed {
        ordinal: usize,
        strategy: &'a str,
        error: &'a str,
    },
    Finished(&'a StatementOutcome),
}

pub type ProgressFn = Arc<dyn Fn(Progress<'_>) + Send + Sync>;

/// Runs statements one at a time through an ordered list of strategies.
pub struct Executor {
    strategies: Vec<Box<dyn ExecStrategy>>,
    options: ExecutorOptions,
    on_progress: Option<ProgressFn>,
}

impl Executor {
    pub fn new(strategies: Vec<Box<dyn ExecStrategy>>, options: ExecutorOptions) -> Result<Self> {
        if strategies.is_empty() {
            return Err(Error::Config(
                "executor needs at least one strategy".into(),
            ));
        }
        Ok(Self {
            strategies,
            options,
            on_progress: None,
        })
    }

    pub fn with_progress(mut self, on_progress: ProgressFn) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    fn emit(&self, event: Progress<'_>) {
        if let Some(cb) = &self.on_progress {
            cb(event);
        }
    }

    /// Apply `script`. Per-statement failures are recorded, never returned.
    pub async fn run(&self, script: &MigrationScript) -> ExecutionReport {
        let mut report = ExecutionReport::new(script.source().display().to_string());
        info!(run_id = %report.run_id, source = %report.source, "applying migration");

        let total = script.statements().count();
        if total == 0 {
            warn!("{} contains no statements", report.source);
            return report;
        }

        if self.options.whole_script_first {
            match self.try_whole_script(script).await {
                WholeScript::Applied(strategy) => {
                    report.whole_script = Some(strategy);
                    return report;
                }
                WholeScript::Unconfirmed(error) => {
                    report.whole_script_unconfirmed = Some(error);
                    report.outcomes = script
                        .statements()
                        .map(|stmt| self.skipped(&stmt))
                        .collect();
                    return report;
                }
                WholeScript::Rejected => {}
            }
        }

        info!("executing {total} statements");
        self.emit(Progress::Split { total });

        let mut statements = script.statements();
        for stmt in statements.by_ref() {
            let kind = stmt.kind();
            let preview = stmt.preview(self.options.preview_chars);
            self.emit(Progress::Statement {
                ordinal: stmt.ordinal(),
                total,
                kind: &kind,
                preview: &preview,
            });

            let outcome = self.execute_statement(&stmt).await;
            self.emit(Progress::Finished(&outcome));
            let stop = outcome.is_failed() || outcome.is_unconfirmed();
            report.outcomes.push(outcome);

            if stop && self.options.fail_fast {
                warn!(
                    "stopping after statement {} (fail-fast)",
                    stmt.ordinal()
                );
                report.aborted = true;
                break;
            }
        }

        for stmt in statements {
            report.outcomes.push(self.skipped(&stmt));
        }

        info!(
            run_id = %report.run_id,
            applied = report.applied(),
            failed = report.failed(),
            unconfirmed = report.unconfirmed(),
            skipped = report.skipped(),
            "migration finished"
        );
        report
    }

    /// Try each tier in order until one accepts the statement.
    ///
    /// A timeout ends the attempt as [`Outcome::Unconfirmed`]; later tiers
    /// are not tried so the statement is never sent twice.
    pub async fn execute_statement(&self, stmt: &Statement<'_>) -> StatementOutcome {
        let sql = stmt.sql();
        let preview = stmt.preview(self.options.preview_chars);
        let started = Instant::now();
        let mut errors = Vec::new();

        for strategy in &self.strategies {
            match strategy.attempt(&sql).await {
                Ok(()) => {
                    debug!(
                        statement = stmt.ordinal(),
                        strategy = strategy.name(),
                        "statement applied"
                    );
                    return StatementOutcome {
                        ordinal: stmt.ordinal(),
                        preview,
                        elapsed_ms: duration_ms(started.elapsed()),
                        outcome: Outcome::Applied {
                            strategy: strategy.name().to_string(),
                        },
                    };
                }
                Err(e @ Error::Timeout(_)) => {
                    warn!(
                        statement = stmt.ordinal(),
                        strategy = strategy.name(),
                        "{preview}: {e}; it may still have been applied, check the server"
                    );
                    return StatementOutcome {
                        ordinal: stmt.ordinal(),
                        preview,
                        elapsed_ms: duration_ms(started.elapsed()),
                        outcome: Outcome::Unconfirmed {
                            strategy: strategy.name().to_string(),
                            message: e.to_string(),
                        },
                    };
                }
                Err(e) => {
                    let message = e.to_string();
                    warn!(
                        statement = stmt.ordinal(),
                        strategy = strategy.name(),
                        "{preview}: {message}"
                    );
                    self.emit(Progress::TierFailed {
                        ordinal: stmt.ordinal(),
                        strategy: strategy.name(),
                        error: &message,
                    });
                    errors.push(TierError {
                        strategy: strategy.name().to_string(),
                        message,
                    });
                }
            }
        }

        StatementOutcome {
            ordinal: stmt.ordinal(),
            preview,
            elapsed_ms: duration_ms(started.elapsed()),
            outcome: Outcome::Failed { errors },
        }
    }

    fn skipped(&self, stmt: &Statement<'_>) -> StatementOutcome {
        StatementOutcome {
            ordinal: stmt.ordinal(),
            preview: stmt.preview(self.options.preview_chars),
            elapsed_ms: 0,
            outcome: Outcome::Skipped,
        }
    }

    async fn try_whole_script(&self, script: &MigrationScript) -> WholeScript {
        let Some(strategy) = self.strategies.first() else {
            return WholeScript::Rejected;
        };
        self.emit(Progress::WholeScript {
            chars: script.text().chars().count(),
            strategy: strategy.name(),
        });

        match strategy.attempt(script.text()).await {
            Ok(()) => {
                info!(strategy = strategy.name(), "whole script applied in one call");
                WholeScript::Applied(strategy.name().to_string())
            }
            Err(e @ Error::Timeout(_)) => {
                let message = e.to_string();
                warn!(
                    strategy = strategy.name(),
                    "whole script call timed out, not splitting since it may have run: {message}"
                );
                self.emit(Progress::WholeScriptUnconfirmed { error: &message });
                WholeScript::Unconfirmed(TierError {
                    strategy: strategy.name().to_string(),
                    message,
                })
            }
            Err(e) => {
                let message = e.to_string();
                warn!(
                    strategy = strategy.name(),
                    "whole script rejected ({}), falling back to statements: {message}",
                    preview(script.text(), self.options.preview_chars)
                );
                self.emit(Progress::WholeScriptFailed { error: &message });
                WholeScript::Rejected
            }
        }
    }
}

enum WholeScript {
    Applied(String),
    Unconfirmed(TierError),
    Rejected,
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
