use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use sqlpush_common::{Error, Result};
use url::Url;

const MAX_KEY_LEN: usize = 4096;

/// Role claim carried by platform keys that are allowed to run admin SQL.
pub const SERVICE_ROLE: &str = "service_role";

/// Validation and display helpers for the endpoint URL and service key.
pub struct CredentialValidator;

#[derive(Deserialize)]
struct KeyClaims {
    role: Option<String>,
}

impl CredentialValidator {
    /// Parse the endpoint URL. Only `http` and `https` with a host are accepted.
    pub fn validate_endpoint(raw: &str) -> Result<Url> {
        let url = Url::parse(raw.trim())
            .map_err(|e| Error::Security(format!("invalid endpoint url {raw:?}: {e}")))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Security(format!(
                "endpoint url must use http or https, got {}",
                url.scheme()
            )));
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(Error::Security("endpoint url has no host".into()));
        }
        Ok(url)
    }

    /// The key ends up in HTTP headers, so it must be non-empty printable ASCII.
    pub fn validate_service_key(key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(Error::Security("service key cannot be empty".into()));
        }
        if key.len() > MAX_KEY_LEN {
            return Err(Error::Security("service key too long".into()));
        }
        if !key.chars().all(|c| c.is_ascii_graphic()) {
            return Err(Error::Security(
                "service key contains whitespace or non-ASCII characters".into(),
            ));
        }
        Ok(())
    }

    /// Show just enough of a key to tell two keys apart.
    pub fn mask(key: &str) -> String {
        let chars: Vec<char> = key.chars().collect();
        if chars.len() <= 12 {
            return "****".to_string();
        }
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}****{tail}")
    }

    /// Read the `role` claim from a JWT-shaped key without verifying it.
    pub fn key_role(key: &str) -> Option<String> {
        let mut parts = key.split('.');
        let (_header, payload, _sig) = (parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some() {
            return None;
        }
        let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
        let claims: KeyClaims = serde_json::from_slice(&bytes).ok()?;
        claims.role
    }
}
