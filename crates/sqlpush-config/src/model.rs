use std::fmt;

use serde::{Deserialize, Serialize};
use sqlpush_common::{Error, Result};

use crate::loader::{SERVICE_KEY_ENV, URL_ENV};

/// Top-level configuration for one `sqlpush` invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub endpoint: EndpointConfig,
    /// Execution tiers, tried in order for every statement.
    #[serde(default = "default_strategies")]
    pub strategies: Vec<StrategyConfig>,
    #[serde(default)]
    pub execution: ExecutionConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoint: EndpointConfig::default(),
            strategies: default_strategies(),
            execution: ExecutionConfig::default(),
        }
    }
}

impl AppConfig {
    /// Apply values given on the command line. `None` leaves the current value.
    pub fn apply_overrides(&mut self, url: Option<String>, service_key: Option<String>) {
        if let Some(url) = non_blank(url) {
            self.endpoint.url = Some(url);
        }
        if let Some(key) = non_blank(service_key) {
            self.endpoint.service_key = Some(key);
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub url: Option<String>,
    pub service_key: Option<String>,
}

impl EndpointConfig {
    pub fn require_url(&self) -> Result<&str> {
        self.url
            .as_deref()
            .ok_or_else(|| Error::Config(format!("{URL_ENV} must be set")))
    }

    pub fn require_service_key(&self) -> Result<&str> {
        self.service_key
            .as_deref()
            .ok_or_else(|| Error::Config(format!("{SERVICE_KEY_ENV} must be set")))
    }
}

// Keys must never reach logs through a `{:?}`.
impl fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("url", &self.url)
            .field("service_key", &self.service_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// One execution tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    /// Remote procedure called through the shared REST client.
    Rpc {
        function: String,
        #[serde(default = "default_param")]
        param: String,
    },
    /// Same RPC path, but a bare request built outside the shared client.
    RawHttp {
        function: String,
        #[serde(default = "default_param")]
        param: String,
    },
    /// Insert the statement text as a row of a table.
    TableInsert {
        table: String,
        #[serde(default = "default_column")]
        column: String,
    },
}

impl StrategyConfig {
    pub fn rpc(function: impl Into<String>, param: impl Into<String>) -> Self {
        Self::Rpc {
            function: function.into(),
            param: param.into(),
        }
    }

    pub fn raw_http(function: impl Into<String>, param: impl Into<String>) -> Self {
        Self::RawHttp {
            function: function.into(),
            param: param.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Send the whole file through the first tier before splitting.
    #[serde(default = "default_true")]
    pub whole_script_first: bool,
    /// Stop at the first statement that fails on every tier.
    #[serde(default)]
    pub fail_fast: bool,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Characters of a statement shown in progress and error lines.
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            whole_script_first: true,
            fail_fast: false,
            request_timeout_secs: default_timeout_secs(),
            preview_chars: default_preview_chars(),
        }
    }
}

pub fn default_strategies() -> Vec<StrategyConfig> {
    vec![
        StrategyConfig::rpc("exec_sql", "sql"),
        StrategyConfig::rpc("exec", "sql"),
        StrategyConfig::raw_http("exec", "sql"),
    ]
}

fn default_param() -> String {
    "sql".to_string()
}

fn default_column() -> String {
    "statement".to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_preview_chars() -> usize {
    80
}

pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_chain_is_exec_sql_then_exec_then_raw() {
        let config = AppConfig::default();
        assert_eq!(
            config.strategies,
            vec![
                StrategyConfig::rpc("exec_sql", "sql"),
                StrategyConfig::rpc("exec", "sql"),
                StrategyConfig::raw_http("exec", "sql"),
            ]
        );
        assert!(config.execution.whole_script_first);
        assert!(!config.execution.fail_fast);
    }

    #[test]
    fn strategy_kinds_deserialize_from_yaml() {
        let yaml = r#"
strategies:
  - kind: rpc
    function: exec_sql
    param: sql_query
  - kind: raw_http
    function: exec
  - kind: table_insert
    table: _migrations
"#;
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.strategies[0], StrategyConfig::rpc("exec_sql", "sql_query"));
        assert_eq!(config.strategies[1], StrategyConfig::raw_http("exec", "sql"));
        assert_eq!(
            config.strategies[2],
            StrategyConfig::TableInsert {
                table: "_migrations".into(),
                column: "statement".into(),
            }
        );
    }

    #[test]
    fn example_config_parses() {
        let config: AppConfig =
            serde_yaml::from_str(include_str!("../../../sqlpush.example.yml")).unwrap();
        assert_eq!(config.strategies, default_strategies());
        assert!(config.endpoint.service_key.is_none());
        assert_eq!(config.execution.request_timeout_secs, 30);
    }

    #[test]
    fn missing_credentials_are_config_errors() {
        let endpoint = EndpointConfig::default();
        let err = endpoint.require_url().unwrap_err();
        assert!(err.to_string().contains(URL_ENV));
        let err = endpoint.require_service_key().unwrap_err();
        assert!(err.to_string().contains(SERVICE_KEY_ENV));
    }

    #[test]
    fn debug_output_redacts_service_key() {
        let endpoint = EndpointConfig {
            url: Some("https://example.supabase.co".into()),
            service_key: Some("super-secret".into()),
        };
        let rendered = format!("{endpoint:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn blank_overrides_are_ignored() {
        let mut config = AppConfig::default();
        config.endpoint.url = Some("https://a.example".into());
        config.apply_overrides(Some("   ".into()), Some("key".into()));
        assert_eq!(config.endpoint.url.as_deref(), Some("https://a.example"));
        assert_eq!(config.endpoint.service_key.as_deref(), Some("key"));
    }
}
