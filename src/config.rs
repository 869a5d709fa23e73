//! Site configuration management.
//!
//! Handles loading, parsing, and validating the `snowman.yaml` configuration file.

mod error;

pub use error::ConfigError;

use educe::Educe;
use serde::Deserialize;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};
use url::Url;

/// Default config filename
pub const CONFIG_FILE: &str = "snowman.yaml";

/// Include fragments, relative to the project root
pub const INCLUDES_DIR: &str = "templates/includes";

/// View units, relative to the project root
pub const VIEWS_DIR: &str = "views";

/// Generated output, relative to the project root
pub const SITE_DIR: &str = "site";

/// Default values for serde deserialization
pub mod config_defaults {
    pub mod serve {
        pub fn interface() -> String {
            "127.0.0.1".into()
        }
        pub fn port() -> u16 {
            8000
        }
    }
}

/// `serve` section in snowman.yaml
#[derive(Debug, Clone, Educe, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct ServeConfig {
    /// Interface to bind on
    #[serde(default = "config_defaults::serve::interface")]
    #[educe(Default = config_defaults::serve::interface())]
    pub interface: String,

    /// Port to listen on
    #[serde(default = "config_defaults::serve::port")]
    #[educe(Default = config_defaults::serve::port())]
    pub port: u16,
}

/// On-disk shape of snowman.yaml, before validation
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    sparql_endpoint: String,

    #[serde(default)]
    headers: BTreeMap<String, String>,

    #[serde(default)]
    serve: ServeConfig,
}

/// Validated site configuration.
///
/// The endpoint is guaranteed to be an absolute `http`/`https` URL.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// SPARQL endpoint every view query is sent to
    pub endpoint: Url,

    /// Static headers sent with every SPARQL request
    pub headers: BTreeMap<String, String>,

    /// Preview server settings
    pub serve: ServeConfig,

    /// Project root, all other paths are resolved against it
    root: PathBuf,
}

impl SiteConfig {
    /// Parse and validate configuration from a YAML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = serde_yaml::from_str(content)?;
        let endpoint = validate_endpoint(&file.sparql_endpoint)?;

        Ok(Self {
            endpoint,
            headers: file.headers,
            serve: file.serve,
            root: PathBuf::from("./"),
        })
    }

    /// Load `config_file` from `root`.
    ///
    /// Missing, unreadable, unparsable and invalid files are reported as
    /// distinct errors.
    pub fn load(root: &Path, config_file: &Path) -> Result<Self, ConfigError> {
        let path = root.join(config_file);
        if !path.is_file() {
            return Err(ConfigError::NotFound(path));
        }

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::Io(path.clone(), e))?;
        let mut config = Self::from_str(&content)?;
        config.root = root.to_path_buf();
        Ok(config)
    }

    pub fn get_root(&self) -> &Path {
        &self.root
    }

    pub fn includes_dir(&self) -> PathBuf {
        self.root.join(INCLUDES_DIR)
    }

    pub fn views_dir(&self) -> PathBuf {
        self.root.join(VIEWS_DIR)
    }

    pub fn site_dir(&self) -> PathBuf {
        self.root.join(SITE_DIR)
    }
}

/// Require an absolute `http`/`https` URL with a host.
fn validate_endpoint(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidEndpoint {
        endpoint: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme `{}`", url.scheme())));
    }
    if !url.has_host() {
        return Err(invalid("missing host".into()));
    }

    Ok(url)
}
