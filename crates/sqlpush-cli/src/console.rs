use std::sync::Arc;

use sqlpush_runner::{ExecutionReport, MigrationScript, Outcome, Progress, ProgressFn};
use url::Url;

const WIDTH: usize = 72;
const LABEL_W: usize = 12;

/// Print the run header: source file, endpoint and strategy chain.
pub fn print_header(script: &MigrationScript, endpoint: &Url, strategies: &[&str]) {
    println!();
    println!("  Applying {}", script.source().display());
    println!("  Endpoint   {endpoint}");
    println!("  Strategies {}", strategies.join(" -> "));
    println!();
}

/// Print the raw migration between rule lines.
pub fn print_sql(script: &MigrationScript) {
    println!("{}", sql_block(script));
}

fn sql_block(script: &MigrationScript) -> String {
    let rule = "─".repeat(WIDTH);
    format!(
        "Migration SQL:\n{rule}\n{}\n{rule}\n",
        script.text().trim_end()
    )
}

/// Dry run: list what would be sent, one statement per line.
pub fn print_statements(script: &MigrationScript, preview_chars: usize) {
    let total = script.statements().count();
    println!(
        "{}: {total} statement{}",
        script.source().display(),
        if total == 1 { "" } else { "s" }
    );
    for stmt in script.statements() {
        println!(
            "  {:>3}. {:<8} {}",
            stmt.ordinal(),
            stmt.kind(),
            stmt.preview(preview_chars)
        );
    }
}

pub fn progress_printer() -> ProgressFn {
    Arc::new(|event: Progress<'_>| {
        if let Some(line) = progress_line(&event) {
            println!("{line}");
        }
    })
}

fn progress_line(event: &Progress<'_>) -> Option<String> {
    let line = match event {
        Progress::WholeScript { chars, strategy } => {
            format!("Sending whole script ({chars} characters) via {strategy}...")
        }
        Progress::WholeScriptFailed { error } => {
            format!("  whole script rejected: {error}\n  executing statement by statement\n")
        }
        Progress::WholeScriptUnconfirmed { error } => format!(
            "  whole script timed out: {error}\n  it may have been applied; nothing else was sent"
        ),
        Progress::Split { total } => format!("Found {total} SQL statements to execute"),
        Progress::Statement {
            ordinal,
            total,
            kind,
            preview,
        } => format!("[{ordinal}/{total}] {kind:<8} {preview}"),
        Progress::TierFailed {
            strategy, error, ..
        } => format!("        {strategy} failed: {error}"),
        Progress::Finished(outcome) => match &outcome.outcome {
            Outcome::Applied { strategy } => {
                format!("        ✓ applied via {strategy} ({} ms)", outcome.elapsed_ms)
            }
            Outcome::Failed { .. } => {
                format!("        ✗ statement {} failed on every strategy", outcome.ordinal)
            }
            Outcome::Unconfirmed { strategy, .. } => {
                format!("        ? {strategy} timed out, check whether it was applied")
            }
            Outcome::Skipped => return None,
        },
    };
    Some(line)
}

/// Print the boxed summary followed by the failed statements, if any.
pub fn print_summary(report: &ExecutionReport) {
    let version = env!("CARGO_PKG_VERSION");

    let mode = match (&report.whole_script, &report.whole_script_unconfirmed) {
        (Some(strategy), _) => format!("whole script via {strategy}"),
        (None, Some(timeout)) => format!("whole script via {} (timed out)", timeout.strategy),
        (None, None) => "statement by statement".to_string(),
    };
    let status = if report.needs_verification() {
        "timed out, verify on the server"
    } else if report.aborted {
        "aborted (fail-fast)"
    } else if report.failed() > 0 {
        "completed with failures"
    } else {
        "completed"
    };

    let title = format!("sqlpush v{version}");
    let title_dashes = WIDTH - 2 - title.chars().count() - 5; // ╭╮ plus "─── " and " "
    let top = format!("╭─── {title} {}╮", "─".repeat(title_dashes));
    let bottom = format!("╰{}╯", "─".repeat(WIDTH - 2));

    let label_w = LABEL_W;
    let value_w = WIDTH - label_w - 4; // "│ " + " │"
    let row = |label: &str, value: &str| {
        format!("│ {label:<label_w$}{:<value_w$} │", fit(value, value_w))
    };

    println!();
    println!("{top}");
    println!("{}", row("Source", &report.source));
    println!("{}", row("Run", &report.run_id.to_string()));
    println!("{}", row("Mode", &mode));
    println!("{}", row("Status", status));
    if report.whole_script.is_none() {
        println!("{}", row("Statements", &report.total().to_string()));
        println!("{}", row("Applied", &report.applied().to_string()));
        println!("{}", row("Failed", &report.failed().to_string()));
        if report.unconfirmed() > 0 {
            println!("{}", row("Unconfirmed", &report.unconfirmed().to_string()));
        }
        if report.skipped() > 0 {
            println!("{}", row("Skipped", &report.skipped().to_string()));
        }
    }
    println!("{bottom}");

    let failures: Vec<_> = report.outcomes.iter().filter(|o| o.is_failed()).collect();
    if !failures.is_empty() {
        println!();
        println!("Failed statements:");
        for outcome in failures {
            println!("  {}. {}", outcome.ordinal, outcome.preview);
            if let Some(error) = outcome.last_error() {
                println!("     {error}");
            }
        }
    }

    let unconfirmed: Vec<_> = report
        .outcomes
        .iter()
        .filter(|o| o.is_unconfirmed())
        .collect();
    if !unconfirmed.is_empty() {
        println!();
        println!("Timed out, may have been applied:");
        for outcome in unconfirmed {
            println!("  {}. {}", outcome.ordinal, outcome.preview);
        }
    }
}

/// Truncate `value` to `width` characters, marking the cut with `...`.
fn fit(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let kept: String = value.chars().take(width.saturating_sub(3)).collect();
    format!("{kept}...")
}

#[cfg(test)]
mod tests {
    use sqlpush_runner::StatementOutcome;

    use super::*;

    fn finished(outcome: Outcome) -> StatementOutcome {
        StatementOutcome {
            ordinal: 2,
            preview: "CREATE POLICY y AS ...".into(),
            elapsed_ms: 12,
            outcome,
        }
    }

    #[test]
    fn sql_block_wraps_text_in_rules() {
        let script = MigrationScript::from_text("m.sql", "DROP POLICY x;\n\n");
        let block = sql_block(&script);
        let lines: Vec<&str> = block.lines().collect();
        assert_eq!(lines[0], "Migration SQL:");
        assert_eq!(lines[1], "─".repeat(WIDTH));
        assert_eq!(lines[2], "DROP POLICY x;");
        assert_eq!(lines[3], "─".repeat(WIDTH));
    }

    #[test]
    fn progress_lines_follow_events() {
        assert_eq!(
            progress_line(&Progress::Split { total: 2 }).as_deref(),
            Some("Found 2 SQL statements to execute")
        );
        assert_eq!(
            progress_line(&Progress::Statement {
                ordinal: 1,
                total: 2,
                kind: "DROP",
                preview: "DROP POLICY x",
            })
            .as_deref(),
            Some("[1/2] DROP     DROP POLICY x")
        );
        assert_eq!(
            progress_line(&Progress::TierFailed {
                ordinal: 1,
                strategy: "rpc:exec_sql",
                error: "HTTP 404",
            })
            .as_deref(),
            Some("        rpc:exec_sql failed: HTTP 404")
        );

        let applied = finished(Outcome::Applied {
            strategy: "rpc:exec".into(),
        });
        assert_eq!(
            progress_line(&Progress::Finished(&applied)).as_deref(),
            Some("        ✓ applied via rpc:exec (12 ms)")
        );
        let unconfirmed = finished(Outcome::Unconfirmed {
            strategy: "rpc:exec_sql".into(),
            message: "request timed out".into(),
        });
        assert!(
            progress_line(&Progress::Finished(&unconfirmed))
                .unwrap()
                .contains("timed out")
        );
        assert_eq!(progress_line(&Progress::Finished(&finished(Outcome::Skipped))), None);
    }

    #[test]
    fn whole_script_timeout_says_nothing_else_was_sent() {
        let line = progress_line(&Progress::WholeScriptUnconfirmed {
            error: "request timed out",
        })
        .unwrap();
        assert!(line.contains("nothing else was sent"));
    }

    #[test]
    fn fit_leaves_short_values_alone() {
        assert_eq!(fit("m.sql", 10), "m.sql");
        assert_eq!(fit("", 10), "");
    }

    #[test]
    fn fit_truncates_long_values() {
        assert_eq!(fit("supabase/migrations/2025.sql", 10), "supabas...");
        assert_eq!(fit("ééééé", 4), "é...");
    }
}
