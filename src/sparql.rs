//! SPARQL 1.1 protocol client.
//!
//! Queries are sent as `application/x-www-form-urlencoded` POST requests and
//! answered in the SPARQL 1.1 Query Results JSON format. Bindings are passed
//! through to templates untouched.

use crate::config::SiteConfig;
use reqwest::{
    StatusCode,
    blocking::Client,
    header::{ACCEPT, HeaderMap, HeaderName, HeaderValue},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use url::Url;

const RESULTS_JSON: &str = "application/sparql-results+json";

/// Errors from executing a query against the endpoint.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid SPARQL request header `{0}`")]
    Header(String),

    #[error("failed to reach SPARQL endpoint")]
    Transport(#[from] reqwest::Error),

    #[error("SPARQL endpoint answered HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("failed to decode SPARQL results")]
    Decode(#[from] serde_json::Error),
}

/// Runs query text and returns its bindings.
pub trait QueryExecutor {
    fn query(&self, sparql: &str) -> Result<QueryResults, QueryError>;
}

/// RDF term kinds as they appear in the results format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TermKind {
    Uri,
    Literal,
    TypedLiteral,
    Bnode,
}

/// One bound value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    #[serde(rename = "type")]
    pub kind: TermKind,

    pub value: String,

    /// Exposed to templates as `lang`
    #[serde(
        rename(deserialize = "xml:lang", serialize = "lang"),
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub lang: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
}

/// One result row: variable name to term. Unbound variables are absent.
pub type Binding = BTreeMap<String, Term>;

/// Decoded answer to one query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryResults {
    /// Projected variables, in query order
    pub vars: Vec<String>,

    /// `SELECT` rows, empty for `ASK`
    pub bindings: Vec<Binding>,

    /// `ASK` answer
    pub boolean: Option<bool>,
}

#[derive(Deserialize)]
struct ResultsDocument {
    #[serde(default)]
    head: Head,
    #[serde(default)]
    results: Option<ResultRows>,
    #[serde(default)]
    boolean: Option<bool>,
}

#[derive(Default, Deserialize)]
struct Head {
    #[serde(default)]
    vars: Vec<String>,
}

#[derive(Deserialize)]
struct ResultRows {
    bindings: Vec<Binding>,
}

impl QueryResults {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let document: ResultsDocument = serde_json::from_str(json)?;
        Ok(Self {
            vars: document.head.vars,
            bindings: document.results.map(|r| r.bindings).unwrap_or_default(),
            boolean: document.boolean,
        })
    }
}

/// Blocking client bound to one endpoint. Reused for every view.
#[derive(Debug, Clone)]
pub struct SparqlClient {
    endpoint: Url,
    client: Client,
}

impl SparqlClient {
    pub fn new(endpoint: Url, headers: &BTreeMap<String, String>) -> Result<Self, QueryError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static(RESULTS_JSON));
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| QueryError::Header(name.clone()))?;
            let value =
                HeaderValue::from_str(value).map_err(|_| QueryError::Header(name.as_str().to_string()))?;
            default_headers.insert(name, value);
        }

        let client = Client::builder()
            .user_agent(concat!("snowman/", env!("CARGO_PKG_VERSION")))
            .default_headers(default_headers)
            .timeout(None)
            .build()?;

        Ok(Self { endpoint, client })
    }

    pub fn from_config(config: &SiteConfig) -> Result<Self, QueryError> {
        Self::new(config.endpoint.clone(), &config.headers)
    }
}

impl QueryExecutor for SparqlClient {
    fn query(&self, sparql: &str) -> Result<QueryResults, QueryError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .form(&[("query", sparql)])
            .send()?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(QueryError::Status {
                status,
                body: body.trim().to_string(),
            });
        }

        Ok(QueryResults::from_json(&body)?)
    }
}
