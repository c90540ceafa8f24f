//! Splits a SQL migration into statements and executes them against a
//! hosted database's REST RPC surface, falling back through an ordered list
//! of strategies per statement.

pub mod client;
pub mod executor;
pub mod report;
pub mod script;
pub mod strategy;

pub use client::RestClient;
pub use executor::{Executor, ExecutorOptions, Progress, ProgressFn};
pub use report::{ExecutionReport, Outcome, StatementOutcome, TierError};
pub use script::{MigrationScript, Statement, Statements, split_statements};
pub use strategy::{
    ExecStrategy, RawHttpStrategy, RpcStrategy, TableInsertStrategy, build_strategies,
};
