//! Discovery error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading includes and views into the template set.
///
/// Any of these aborts the build before `site/` is created.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to walk `{0}`")]
    Walk(PathBuf, #[source] walkdir::Error),

    #[error("failed to read `{0}`")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("failed to parse view definition `{0}`")]
    Definition(PathBuf, #[source] serde_yaml::Error),

    #[error("failed to parse template `{0}`")]
    Template(String, #[source] minijinja::Error),

    #[error("template `{0}` is registered twice")]
    DuplicateTemplate(String),

    #[error("template `{0}` is not in the template set")]
    MissingTemplate(String),

    #[error("view `{view}` has invalid {field} path `{path}`: {reason}")]
    InvalidPath {
        view: String,
        field: &'static str,
        path: PathBuf,
        reason: &'static str,
    },

    #[error("views `{first}` and `{second}` both write `{output}`")]
    DuplicateOutput {
        first: String,
        second: String,
        output: PathBuf,
    },
}
