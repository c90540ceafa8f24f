use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Error reported by one tier for one statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierError {
    pub strategy: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Applied { strategy: String },
    /// Every tier failed; errors are in tier order.
    Failed { errors: Vec<TierError> },
    /// The request timed out. The server may have applied the statement, so
    /// no other tier was tried.
    Unconfirmed { strategy: String, message: String },
    /// Not attempted because the run stopped before reaching it.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementOutcome {
    pub ordinal: usize,
    pub preview: String,
    pub elapsed_ms: u64,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl StatementOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self.outcome, Outcome::Applied { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, Outcome::Failed { .. })
    }

    pub fn is_unconfirmed(&self) -> bool {
        matches!(self.outcome, Outcome::Unconfirmed { .. })
    }

    /// Message from the last tier tried, if the statement failed.
    pub fn last_error(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Failed { errors } => errors.last().map(|e| e.message.as_str()),
            _ => None,
        }
    }
}

/// Result of one invocation, outcomes in statement order.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub source: String,
    /// Strategy that accepted the whole file in one call, if any.
    pub whole_script: Option<String>,
    /// Set when the whole-file call timed out. Statements are then skipped
    /// since the file may already have run.
    pub whole_script_unconfirmed: Option<TierError>,
    pub outcomes: Vec<StatementOutcome>,
    /// Set when fail-fast stopped the run early.
    pub aborted: bool,
}

impl ExecutionReport {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            source: source.into(),
            whole_script: None,
            whole_script_unconfirmed: None,
            outcomes: Vec::new(),
            aborted: false,
        }
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn applied(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_applied()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }

    pub fn unconfirmed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_unconfirmed()).count()
    }

    /// True when some SQL may or may not have run and must be checked on the
    /// server.
    pub fn needs_verification(&self) -> bool {
        self.whole_script_unconfirmed.is_some() || self.unconfirmed() > 0
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.outcome == Outcome::Skipped)
            .count()
    }

    /// True when every statement is known to have been applied.
    pub fn is_clean(&self) -> bool {
        !self.aborted && !self.needs_verification() && self.failed() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(ordinal: usize, outcome: Outcome) -> StatementOutcome {
        StatementOutcome {
            ordinal,
            preview: format!("stmt {ordinal}"),
            elapsed_ms: 1,
            outcome,
        }
    }

    #[test]
    fn counters_follow_outcomes() {
        let mut report = ExecutionReport::new("m.sql");
        report.outcomes.push(outcome(
            1,
            Outcome::Applied {
                strategy: "rpc:exec_sql".into(),
            },
        ));
        report.outcomes.push(outcome(
            2,
            Outcome::Failed {
                errors: vec![
                    TierError {
                        strategy: "rpc:exec_sql".into(),
                        message: "first".into(),
                    },
                    TierError {
                        strategy: "rpc:exec".into(),
                        message: "second".into(),
                    },
                ],
            },
        ));
        report.outcomes.push(outcome(3, Outcome::Skipped));

        assert_eq!(report.total(), 3);
        assert_eq!(report.applied(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.skipped(), 1);
        assert!(!report.is_clean());
        assert_eq!(report.outcomes[1].last_error(), Some("second"));
        assert_eq!(report.outcomes[0].last_error(), None);
    }

    #[test]
    fn timeouts_need_verification() {
        let mut report = ExecutionReport::new("m.sql");
        report.outcomes.push(outcome(
            1,
            Outcome::Unconfirmed {
                strategy: "rpc:exec_sql".into(),
                message: "request timed out: operation timed out".into(),
            },
        ));
        report.outcomes.push(outcome(2, Outcome::Skipped));

        assert_eq!(report.unconfirmed(), 1);
        assert_eq!(report.failed(), 0);
        assert!(report.needs_verification());
        assert!(!report.is_clean());

        let value = serde_json::to_value(&report.outcomes[0]).unwrap();
        assert_eq!(value["status"], "unconfirmed");

        let mut whole = ExecutionReport::new("m.sql");
        assert!(whole.is_clean());
        whole.whole_script_unconfirmed = Some(TierError {
            strategy: "rpc:exec_sql".into(),
            message: "request timed out".into(),
        });
        assert!(whole.needs_verification());
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let value = serde_json::to_value(outcome(
            4,
            Outcome::Applied {
                strategy: "raw:exec".into(),
            },
        ))
        .unwrap();
        assert_eq!(value["status"], "applied");
        assert_eq!(value["strategy"], "raw:exec");
        assert_eq!(value["ordinal"], 4);
    }
}
