//! View discovery.
//!
//! A view unit is any directory below `views/` that contains a `view.yaml`:
//!
//! ```text
//! views/
//! ├── index/
//! │   ├── view.yaml        output: index.html
//! │   ├── query.rq         SPARQL text
//! │   └── template.html    template body
//! └── books/
//!     └── view.yaml        output: books.html
//!                          query: books.rq
//!                          template: list.html
//! ```
//!
//! `query` and `template` default to `query.rq` and `template.html`. Units are
//! discovered in lexicographic path order and each template is registered in
//! the shared [`TemplateSet`] as `views/<unit>/<template>`.

use crate::{
    config::VIEWS_DIR,
    error::DiscoveryError,
    template::{TemplateSet, collect_all_files, template_name},
};
use minijinja::Template;
use serde::Deserialize;
use std::{
    collections::HashMap,
    fs,
    path::{Component, Path, PathBuf},
};

/// Definition file that marks a directory as a view unit
pub const VIEW_FILE: &str = "view.yaml";

mod defaults {
    use std::path::PathBuf;

    pub fn query() -> PathBuf {
        "query.rq".into()
    }
    pub fn template() -> PathBuf {
        "template.html".into()
    }
}

/// On-disk shape of view.yaml
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ViewFile {
    output: PathBuf,

    #[serde(default = "defaults::query")]
    query: PathBuf,

    #[serde(default = "defaults::template")]
    template: PathBuf,
}

/// Everything needed to render one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewConfig {
    /// Unit path relative to `views/`, used in messages
    pub name: String,

    pub sparql_query: String,

    /// Name of the view's entry in the [`TemplateSet`]
    pub template_name: String,

    /// Output file, relative to `site/`
    pub output: PathBuf,
}

/// A view whose template has been found in the shared set.
#[derive(Debug)]
pub struct ResolvedView<'set> {
    pub config: ViewConfig,
    pub template: Template<'set, 'set>,
}

impl ResolvedView<'_> {
    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn template_name(&self) -> &str {
        &self.config.template_name
    }
}

/// Walk `views`, register each unit's template into `set` and return the
/// unit configs in discovery order.
///
/// The first unreadable, unparsable or invalid unit aborts discovery.
pub fn discover_views(views: &Path, set: &mut TemplateSet) -> Result<Vec<ViewConfig>, DiscoveryError> {
    let mut configs = Vec::new();
    let mut outputs: HashMap<String, String> = HashMap::new();

    let definitions = collect_all_files(views)?
        .into_iter()
        .filter(|entry| entry.file_name() == VIEW_FILE);

    for definition in definitions {
        let unit_dir = definition.path().parent().unwrap_or(views);
        let unit = unit_dir.strip_prefix(views).unwrap_or(unit_dir);
        let name = match template_name(unit) {
            name if name.is_empty() => ".".to_string(),
            name => name,
        };

        let config = load_view(definition.path(), unit_dir, unit, &name, set)?;

        if let Some(first) = outputs.insert(template_name(&config.output), name.clone()) {
            return Err(DiscoveryError::DuplicateOutput {
                first,
                second: name,
                output: config.output,
            });
        }
        configs.push(config);
    }

    Ok(configs)
}

fn load_view(
    definition: &Path,
    unit_dir: &Path,
    unit: &Path,
    name: &str,
    set: &mut TemplateSet,
) -> Result<ViewConfig, DiscoveryError> {
    let file: ViewFile = serde_yaml::from_str(&read(definition)?)
        .map_err(|e| DiscoveryError::Definition(definition.to_path_buf(), e))?;

    check_relative(name, "output", &file.output)?;
    check_relative(name, "query", &file.query)?;
    check_relative(name, "template", &file.template)?;

    let sparql_query = read(&unit_dir.join(&file.query))?;
    let template_source = read(&unit_dir.join(&file.template))?;

    let template_name = template_name(&Path::new(VIEWS_DIR).join(unit).join(&file.template));
    set.add(template_name.clone(), template_source)?;

    Ok(ViewConfig {
        name: name.to_string(),
        sparql_query,
        template_name,
        output: file.output,
    })
}

/// Pair every config with its template. Fails if any template is absent.
pub fn resolve_views(
    set: &TemplateSet,
    configs: Vec<ViewConfig>,
) -> Result<Vec<ResolvedView<'_>>, DiscoveryError> {
    configs
        .into_iter()
        .map(|config| {
            let template = set.get(&config.template_name)?;
            Ok(ResolvedView { config, template })
        })
        .collect()
}

fn read(path: &Path) -> Result<String, DiscoveryError> {
    fs::read_to_string(path).map_err(|e| DiscoveryError::Read(path.to_path_buf(), e))
}

/// Paths in view.yaml must stay inside their root.
fn check_relative(view: &str, field: &'static str, path: &Path) -> Result<(), DiscoveryError> {
    let invalid = |reason| DiscoveryError::InvalidPath {
        view: view.to_string(),
        field,
        path: path.to_path_buf(),
        reason,
    };

    if path.file_name().is_none() {
        return Err(invalid("must name a file"));
    }
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => return Err(invalid("must not contain `..`")),
            Component::RootDir | Component::Prefix(_) => return Err(invalid("must be relative")),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{functions::FunctionRegistry, test_util::StubFetcher};
    use minijinja::context;
    use tempfile::TempDir;

    fn new_set() -> TemplateSet {
        TemplateSet::new(&FunctionRegistry::with_fetcher(StubFetcher::default()))
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn unit(root: &Path, name: &str, output: &str) {
        write(root, &format!("{name}/view.yaml"), &format!("output: {output}\n"));
        write(root, &format!("{name}/query.rq"), "SELECT * WHERE { ?s ?p ?o }");
        write(root, &format!("{name}/template.html"), "<h1>{{ results | length }}</h1>");
    }

    #[test]
    fn test_discover_defaults() {
        let dir = TempDir::new().unwrap();
        unit(dir.path(), "index", "index.html");

        let mut set = new_set();
        let views = discover_views(dir.path(), &mut set).unwrap();

        assert_eq!(
            views,
            vec![ViewConfig {
                name: "index".into(),
                sparql_query: "SELECT * WHERE { ?s ?p ?o }".into(),
                template_name: "views/index/template.html".into(),
                output: PathBuf::from("index.html"),
            }]
        );
        assert!(set.contains("views/index/template.html"));
    }

    #[test]
    fn test_discover_custom_files_and_nested_units() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "catalog/books/view.yaml",
            "output: books/index.html\nquery: books.rq\ntemplate: list.html\n",
        );
        write(dir.path(), "catalog/books/books.rq", "SELECT ?b WHERE { ?b a ?c }");
        write(dir.path(), "catalog/books/list.html", "{% for r in results %}{{ r.b.value }}{% endfor %}");

        let mut set = new_set();
        let views = discover_views(dir.path(), &mut set).unwrap();

        assert_eq!(views[0].name, "catalog/books");
        assert_eq!(views[0].template_name, "views/catalog/books/list.html");
        assert_eq!(views[0].output, PathBuf::from("books/index.html"));
    }

    #[test]
    fn test_discovery_order_is_stable() {
        let dir = TempDir::new().unwrap();
        for (name, output) in [("zeta", "z.html"), ("alpha", "a.html"), ("mid", "m.html")] {
            unit(dir.path(), name, output);
        }

        let names = |set: &mut TemplateSet| {
            discover_views(dir.path(), set)
                .unwrap()
                .into_iter()
                .map(|v| v.name)
                .collect::<Vec<_>>()
        };

        let first = names(&mut new_set());
        assert_eq!(first, vec!["alpha", "mid", "zeta"]);
        assert_eq!(first, names(&mut new_set()));
    }

    #[test]
    fn test_missing_views_dir() {
        let dir = TempDir::new().unwrap();
        let result = discover_views(&dir.path().join("views"), &mut new_set());
        assert!(matches!(result, Err(DiscoveryError::Walk(..))));
    }

    #[test]
    fn test_missing_output_key() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "index/view.yaml", "query: query.rq\n");

        let result = discover_views(dir.path(), &mut new_set());
        assert!(matches!(result, Err(DiscoveryError::Definition(..))));
    }

    #[test]
    fn test_missing_query_file() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "index/view.yaml", "output: index.html\n");
        write(dir.path(), "index/template.html", "x");

        let result = discover_views(dir.path(), &mut new_set());
        assert!(matches!(result, Err(DiscoveryError::Read(..))));
    }

    #[test]
    fn test_template_syntax_error_aborts() {
        let dir = TempDir::new().unwrap();
        unit(dir.path(), "good", "good.html");
        write(dir.path(), "later/view.yaml", "output: later.html\n");
        write(dir.path(), "later/query.rq", "ASK {}");
        write(dir.path(), "later/template.html", "{{ unclosed");

        let result = discover_views(dir.path(), &mut new_set());
        assert!(matches!(result, Err(DiscoveryError::Template(..))));
    }

    #[test]
    fn test_output_must_stay_inside_site() {
        for output in ["../escape.html", "/etc/passwd", "."] {
            let dir = TempDir::new().unwrap();
            unit(dir.path(), "index", output);

            let result = discover_views(dir.path(), &mut new_set());
            assert!(
                matches!(result, Err(DiscoveryError::InvalidPath { field: "output", .. })),
                "{output} should be rejected"
            );
        }
    }

    #[test]
    fn test_duplicate_output() {
        let dir = TempDir::new().unwrap();
        unit(dir.path(), "a", "index.html");
        unit(dir.path(), "b", "index.html");

        let result = discover_views(dir.path(), &mut new_set());
        match result {
            Err(DiscoveryError::DuplicateOutput { first, second, .. }) => {
                assert_eq!((first.as_str(), second.as_str()), ("a", "b"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_resolve_views() {
        let dir = TempDir::new().unwrap();
        unit(dir.path(), "index", "index.html");

        let mut set = new_set();
        let configs = discover_views(dir.path(), &mut set).unwrap();
        let views = resolve_views(&set, configs).unwrap();

        assert_eq!(views[0].template_name(), "views/index/template.html");
        let out = views[0].template.render(context! { results => vec![1, 2] }).unwrap();
        assert_eq!(out, "<h1>2</h1>");
    }

    #[test]
    fn test_resolve_missing_template() {
        let set = new_set();
        let config = ViewConfig {
            name: "ghost".into(),
            sparql_query: String::new(),
            template_name: "views/ghost/template.html".into(),
            output: PathBuf::from("ghost.html"),
        };

        let result = resolve_views(&set, vec![config]);
        assert!(matches!(result, Err(DiscoveryError::MissingTemplate(_))));
    }
}
