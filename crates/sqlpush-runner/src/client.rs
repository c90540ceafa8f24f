use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use sqlpush_common::{Error, Result};
use tracing::debug;
use url::Url;

/// Header carrying the project key on every PostgREST request.
pub const API_KEY_HEADER: &str = "apikey";

const REST_PREFIX: &str = "rest/v1";

/// Thin client for the platform's PostgREST surface.
///
/// Credentials are installed as default headers once, so callers only
/// supply a path and a JSON body.
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base: Url,
    service_key: String,
    timeout: Duration,
}

/// Error body returned by PostgREST.
#[derive(Debug, Deserialize)]
struct PostgrestError {
    message: String,
    code: Option<String>,
    hint: Option<String>,
}

impl RestClient {
    pub fn new(base: Url, service_key: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .default_headers(auth_headers(service_key)?)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Remote(format!("failed to build http client: {e}")))?;

        Ok(Self {
            http,
            base,
            service_key: service_key.to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub(crate) fn service_key(&self) -> &str {
        &self.service_key
    }

    /// `POST /rest/v1/rpc/{function}` with `body` as the named arguments.
    pub async fn rpc(&self, function: &str, body: &serde_json::Value) -> Result<()> {
        let url = rest_url(&self.base, &format!("rpc/{function}"))?;
        self.post(url, body).await
    }

    /// `POST /rest/v1/{table}` inserting `body` as a single row.
    pub async fn insert(&self, table: &str, body: &serde_json::Value) -> Result<()> {
        let url = rest_url(&self.base, table)?;
        self.post(url, body).await
    }

    async fn post(&self, url: Url, body: &serde_json::Value) -> Result<()> {
        debug!("POST {url}");
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(send_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        Err(Error::Remote(describe_failure(status, &text)))
    }
}

pub(crate) fn auth_headers(service_key: &str) -> Result<HeaderMap> {
    let mut key = HeaderValue::from_str(service_key)
        .map_err(|_| Error::Security("service key is not a valid header value".into()))?;
    key.set_sensitive(true);
    let mut bearer = HeaderValue::from_str(&format!("Bearer {service_key}"))
        .map_err(|_| Error::Security("service key is not a valid header value".into()))?;
    bearer.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(API_KEY_HEADER, key);
    headers.insert(AUTHORIZATION, bearer);
    Ok(headers)
}

/// Timeouts become [`Error::Timeout`]; anything else is a remote failure.
pub(crate) fn send_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Remote(format!("request failed: {e}"))
    }
}

/// Join `path` under `{base}/rest/v1/`, keeping any path prefix on `base`.
pub(crate) fn rest_url(base: &Url, path: &str) -> Result<Url> {
    let joined = format!(
        "{}/{REST_PREFIX}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined).map_err(|e| Error::Config(format!("invalid request url {joined}: {e}")))
}

/// Prefer the PostgREST `message`, fall back to the raw body.
pub(crate) fn describe_failure(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<PostgrestError>(body) {
        Ok(err) => {
            let mut out = format!("HTTP {}: {}", status.as_u16(), err.message);
            if let Some(code) = err.code {
                out.push_str(&format!(" ({code})"));
            }
            if let Some(hint) = err.hint {
                out.push_str(&format!("; hint: {hint}"));
            }
            out
        }
        Err(_) if body.trim().is_empty() => format!("HTTP {}", status.as_u16()),
        Err(_) => format!("HTTP {}: {}", status.as_u16(), body.trim()),
    }
}
