//! Site building orchestration.
//!
//! # Architecture
//!
//! ```text
//! build_site()
//!     │
//!     ├── site/ must not exist
//!     │
//!     ├── load_includes() ──► TemplateSet
//!     │
//!     ├── discover_views() ──► register view templates, ViewConfig[]
//!     │
//!     ├── resolve_views() ──► ResolvedView[]
//!     │
//!     ├── create site/
//!     │
//!     └── render_views()
//!             │
//!             └── per view: query ──► create site/<output> ──► render
//! ```
//!
//! The run is fail-fast. The first error aborts and leaves whatever was
//! already written in `site/`.

use crate::{
    config::SiteConfig,
    functions::FunctionRegistry,
    log,
    sparql::QueryExecutor,
    template::load_includes,
    view::{ResolvedView, discover_views, resolve_views},
};
use anyhow::{Context, Result, bail};
use minijinja::context;
use std::{
    fmt,
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

/// Where a view is in the render loop. Reported when it fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ViewState {
    Pending,
    QueryExecuting,
    Rendering,
    Written,
}

impl fmt::Display for ViewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::QueryExecuting => "executing its query",
            Self::Rendering => "rendering",
            Self::Written => "written",
        })
    }
}

/// Build the whole site into `site/`.
///
/// Returns the written files in render order.
pub fn build_site(
    config: &SiteConfig,
    registry: &FunctionRegistry,
    executor: &dyn QueryExecutor,
) -> Result<Vec<PathBuf>> {
    let site = config.site_dir();
    if site.exists() {
        bail!(
            "Site directory `{}` already exists. Remove it first (`snowman clean`).",
            site.display()
        );
    }

    log!("build"; "building {}", config.get_root().display());
    let mut templates =
        load_includes(&config.includes_dir(), registry).context("Failed to discover includes.")?;
    let configs =
        discover_views(&config.views_dir(), &mut templates).context("Failed to discover views.")?;
    let views = resolve_views(&templates, configs).context("Failed to discover views.")?;
    log!("build"; "found {} views", views.len());

    fs::create_dir(&site)
        .with_context(|| format!("Failed to create site directory `{}`.", site.display()))?;

    let written = render_views(&views, executor, &site)?;
    log!("build"; "done, {} pages written", written.len());

    Ok(written)
}

/// Render every view in order into `site`. Stops at the first failure.
pub fn render_views(
    views: &[ResolvedView<'_>],
    executor: &dyn QueryExecutor,
    site: &Path,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(views.len());

    for view in views {
        let mut state = ViewState::Pending;
        let path = render_view(view, executor, site, &mut state)
            .with_context(|| format!("View `{}` failed while {state}.", view.name()))?;
        debug_assert_eq!(state, ViewState::Written);
        written.push(path);
    }

    Ok(written)
}

fn render_view(
    view: &ResolvedView<'_>,
    executor: &dyn QueryExecutor,
    site: &Path,
    state: &mut ViewState,
) -> Result<PathBuf> {
    *state = ViewState::QueryExecuting;
    log!("query"; "{}", view.name());
    let results = executor
        .query(&view.config.sparql_query)
        .context("SPARQL query failed.")?;

    *state = ViewState::Rendering;
    let path = site.join(&view.config.output);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory `{}`.", parent.display()))?;
    }
    let file = File::create(&path)
        .with_context(|| format!("Failed to create `{}` file.", path.display()))?;
    let mut writer = BufWriter::new(file);

    let ctx = context! {
        results => &results.bindings,
        vars => &results.vars,
        boolean => results.boolean,
    };
    view.template
        .render_captured_to(ctx, &mut writer)
        .with_context(|| format!("Failed to render `{}`.", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("Failed to write `{}`.", path.display()))?;

    *state = ViewState::Written;
    log!("render"; "{} -> {}", view.template_name(), path.display());

    Ok(path)
}

/// Remove `site/` if present.
pub fn clean_site(config: &SiteConfig) -> Result<()> {
    let site = config.site_dir();
    if !site.exists() {
        log!("clean"; "nothing to clean");
        return Ok(());
    }

    fs::remove_dir_all(&site)
        .with_context(|| format!("Failed to remove site directory `{}`.", site.display()))?;
    log!("clean"; "removed {}", site.display());
    Ok(())
}
