//! Remote-resource helpers: `get_remote` and `get_remote_with_config`.
//!
//! Fetches are synchronous, uncached and never retried. Every call re-issues
//! the request.

use crate::log;
use minijinja::value::{Value, ValueKind};
use reqwest::{StatusCode, blocking::Client};
use thiserror::Error;
use url::Url;

/// Errors surfaced by remote fetches.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URI `{0}` given to get_remote")]
    InvalidUri(String, #[source] url::ParseError),

    #[error("invalid get_remote config: {0}")]
    InvalidConfig(String),

    #[error("request to remote resource failed")]
    Transport(#[from] reqwest::Error),

    #[error("received bad response from remote resource")]
    BadResponse,
}

/// Performs the actual GET. Swappable so rendering can be tested offline.
pub trait Fetch: Send + Sync {
    fn fetch(&self, uri: &Url, headers: &[(String, String)]) -> Result<String, FetchError>;
}

/// Blocking HTTP fetcher backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> reqwest::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("snowman/", env!("CARGO_PKG_VERSION")))
            .timeout(None)
            .build()?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, uri: &Url, headers: &[(String, String)]) -> Result<String, FetchError> {
        let mut request = self.client.get(uri.clone());
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send()?;
        let status = response.status();
        let body = response.text()?;

        if status != StatusCode::OK {
            log!("remote"; "{}", bad_response_message(status, uri, &body));
            return Err(FetchError::BadResponse);
        }

        Ok(body)
    }
}

/// Diagnostic logged ahead of [`FetchError::BadResponse`].
fn bad_response_message(status: StatusCode, uri: &Url, body: &str) -> String {
    format!("received bad (HTTP: {status}) response from {uri}\n{body}")
}

/// Body of `get_remote(uri)`.
pub fn get_remote(fetcher: &dyn Fetch, uri: &str) -> Result<String, FetchError> {
    let uri = parse_uri(uri)?;
    fetcher.fetch(&uri, &[])
}

/// Body of `get_remote_with_config(uri, config)`.
///
/// `config` may be none/undefined or a map; its optional `headers` entry must
/// be a map of string to string.
pub fn get_remote_with_config(
    fetcher: &dyn Fetch,
    uri: &str,
    config: &Value,
) -> Result<String, FetchError> {
    let uri = parse_uri(uri)?;
    let headers = request_headers(config)?;
    fetcher.fetch(&uri, &headers)
}

fn parse_uri(uri: &str) -> Result<Url, FetchError> {
    Url::parse(uri).map_err(|e| FetchError::InvalidUri(uri.to_string(), e))
}

/// Pull the `headers` mapping out of a template-supplied config value.
///
/// Non-string header names or values are rejected rather than coerced.
fn request_headers(config: &Value) -> Result<Vec<(String, String)>, FetchError> {
    match config.kind() {
        ValueKind::Undefined | ValueKind::None => return Ok(Vec::new()),
        ValueKind::Map => {}
        kind => return Err(FetchError::InvalidConfig(format!("expected a map, found {kind}"))),
    }

    let headers = config
        .get_attr("headers")
        .map_err(|e| FetchError::InvalidConfig(e.to_string()))?;

    match headers.kind() {
        ValueKind::Undefined | ValueKind::None => return Ok(Vec::new()),
        ValueKind::Map => {}
        kind => {
            return Err(FetchError::InvalidConfig(format!(
                "`headers` must be a map, found {kind}"
            )));
        }
    }

    let keys = headers
        .try_iter()
        .map_err(|e| FetchError::InvalidConfig(e.to_string()))?;

    keys.map(|key| {
        let value = headers
            .get_item(&key)
            .map_err(|e| FetchError::InvalidConfig(e.to_string()))?;
        match (key.as_str(), value.as_str()) {
            (Some(name), Some(value)) => Ok((name.to_string(), value.to_string())),
            _ => Err(FetchError::InvalidConfig(format!(
                "header `{key}` must map a string to a string, found {}",
                value.kind()
            ))),
        }
    })
    .collect()
}
