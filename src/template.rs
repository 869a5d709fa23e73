//! The shared template set.
//!
//! ```text
//! load_includes()          templates/includes/**  ──►  TemplateSet
//!                                                         │
//! discover_views()         views/*/template.html  ──►  add()
//!                                                         │
//! resolve()                                          ResolvedView[]
//! ```
//!
//! Every include and every view template lives in one `minijinja`
//! environment, so any view can `{% include %}` or `{% extends %}` any
//! fragment and call every registered function. Templates are named by their
//! path with `/` separators: includes relative to `templates/includes`, views
//! prefixed with `views/`.

use crate::{error::DiscoveryError, functions::FunctionRegistry};
use minijinja::{Environment, Template, UndefinedBehavior};
use std::{
    collections::BTreeSet,
    fs,
    path::{Component, Path},
};
use walkdir::WalkDir;

/// Files to ignore during directory traversal
const IGNORED_FILES: &[&str] = &[".DS_Store"];

/// Composed collection of include fragments and view templates.
///
/// Built once during discovery, then only borrowed while rendering.
pub struct TemplateSet {
    env: Environment<'static>,
    names: BTreeSet<String>,
}

impl TemplateSet {
    /// Empty set with `registry` bound and strict undefined handling.
    pub fn new(registry: &FunctionRegistry) -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        registry.register(&mut env);
        Self {
            env,
            names: BTreeSet::new(),
        }
    }

    /// Parse `source` and register it as `name`.
    pub fn add(&mut self, name: String, source: String) -> Result<(), DiscoveryError> {
        if self.contains(&name) {
            return Err(DiscoveryError::DuplicateTemplate(name));
        }
        self.env
            .add_template_owned(name.clone(), source)
            .map_err(|e| DiscoveryError::Template(name.clone(), e))?;
        self.names.insert(name);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Look up a registered template.
    pub fn get(&self, name: &str) -> Result<Template<'_, '_>, DiscoveryError> {
        self.env
            .get_template(name)
            .map_err(|_| DiscoveryError::MissingTemplate(name.to_string()))
    }

    /// Names of every registered template, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.names.iter().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for TemplateSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateSet")
            .field("templates", &self.names())
            .finish()
    }
}

/// Collect all regular files under `dir`, sorted by path.
///
/// Unlike a lenient walk, any traversal error (including a missing `dir`)
/// is returned.
pub fn collect_all_files(dir: &Path) -> Result<Vec<walkdir::DirEntry>, DiscoveryError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|e| DiscoveryError::Walk(dir.to_path_buf(), e))?;
        let name = entry.file_name().to_str().unwrap_or_default();
        if entry.file_type().is_file() && !IGNORED_FILES.contains(&name) {
            files.push(entry);
        }
    }
    Ok(files)
}

/// Template name for `path`: its components joined with `/`.
pub fn template_name(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Load every file under `includes` as a fragment of a new [`TemplateSet`].
///
/// Fails on a missing or unreadable directory and on the first fragment that
/// does not parse. Nothing is skipped.
pub fn load_includes(
    includes: &Path,
    registry: &FunctionRegistry,
) -> Result<TemplateSet, DiscoveryError> {
    let mut set = TemplateSet::new(registry);

    for entry in collect_all_files(includes)? {
        let path = entry.path();
        let source =
            fs::read_to_string(path).map_err(|e| DiscoveryError::Read(path.to_path_buf(), e))?;
        let relative = path.strip_prefix(includes).unwrap_or(path);
        set.add(template_name(relative), source)?;
    }

    Ok(set)
}
