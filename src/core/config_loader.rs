//! # Config Loader
//!
//! Turns a working directory into the list of root templates a run can render.
//!
//! Loading happens in stages:
//!
//! 1. **Config discovery:** `pli.toml` is taken from `--config` or looked up in
//!    the working directory. A project without one is valid.
//! 2. **Compilation:** the config is compiled through the binary cache
//!    (`config_cache`) and turned into runtime templates.
//! 3. **Extraction:** every first-level directory of the templates directory
//!    becomes a root template holding every file below it.
//! 4. **Merge:** config and extracted templates with the same id are merged,
//!    the config winning, and `include` references are replaced by the merged
//!    roots they name.
//! 5. **Fetch:** file entries still lacking content are read from storage in
//!    parallel via `rayon`.
use crate::{
    constants::{CONFIG_FILENAME, DEFAULT_TEMPLATES_DIRNAME},
    core::{
        compiler::{self, CompilerError},
        config_cache, paths,
        template::{Template, TemplateError, TemplateProps},
        template_entry::TemplateEntry,
    },
    dev_utils::BlockTimer,
    system::storage::{Storage, StorageError},
};
use log::{debug, info, trace};
use rayon::prelude::*;
use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
    sync::Arc,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file '{path}' was not found.")]
    ConfigNotFound { path: String },

    #[error("Templates directory '{path}' does not exist and the config declares no templates.")]
    TemplatesDirectoryNotFound { path: String },

    #[error("No templates found. Add directories under '{path}' or declare templates in {CONFIG_FILENAME}.")]
    NoTemplates { path: String },

    #[error("Template '{template}' includes unknown template '{include}'.")]
    UnknownInclude { template: String, include: String },

    #[error("Include cycle detected: {cycle}")]
    IncludeCycle { cycle: String },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Compiler(#[from] CompilerError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Cache(#[from] anyhow::Error),
}

/// Where and how to load a project from.
#[derive(Debug, Clone, Default)]
pub struct ProjectOptions {
    /// Absolute working directory; relative paths resolve against it.
    pub cwd: String,
    pub config_path: Option<String>,
    /// Overrides the config's `templates_directory`.
    pub templates_directory: Option<String>,
    pub use_cache: bool,
}

/// A loaded project, ready to be handed to the renderer.
#[derive(Debug, Clone)]
pub struct Project {
    pub cwd: String,
    pub config_path: Option<String>,
    pub templates_directory: String,
    pub templates: Vec<Arc<Template>>,
}

impl Project {
    pub fn template(&self, id: &str) -> Option<&Arc<Template>> {
        self.templates.iter().find(|t| t.id() == id)
    }
}

/// Loads every root template of the project described by `options`.
pub fn load_project(storage: &dyn Storage, options: &ProjectOptions) -> Result<Project, ConfigError> {
    let _timer = BlockTimer::new("load_project");
    let cwd = paths::normalize(&options.cwd);

    let config_path = search_for_config_file(storage, &cwd, options.config_path.as_deref())?;
    let compiled = match &config_path {
        Some(path) => {
            let content = storage.read(path)?;
            let cache_path = options.use_cache.then(|| paths::config_cache_path(&cwd));
            Some(config_cache::load_compiled_config(
                &content,
                Path::new(path),
                cache_path.as_deref(),
            )?)
        }
        None => {
            debug!("No {} found in '{}'", CONFIG_FILENAME, cwd);
            None
        }
    };

    let templates_directory = options
        .templates_directory
        .clone()
        .or_else(|| compiled.as_ref().and_then(|c| c.templates_directory.clone()))
        .unwrap_or_else(|| DEFAULT_TEMPLATES_DIRNAME.to_string());
    let templates_directory = paths::resolve(&cwd, &templates_directory);
    debug!("Templates directory: '{}'", templates_directory);

    let declared = match &compiled {
        Some(config) => compiler::build_templates(config, &templates_directory)?,
        None => Vec::new(),
    };

    let extracted = if storage.exists(&templates_directory) {
        extract_templates_from_directory(storage, &templates_directory)?
    } else if declared.is_empty() {
        return Err(ConfigError::TemplatesDirectoryNotFound {
            path: templates_directory,
        });
    } else {
        Vec::new()
    };

    let merged = merge_root_templates(extracted, declared)?;
    if merged.is_empty() {
        return Err(ConfigError::NoTemplates {
            path: templates_directory,
        });
    }

    let resolved = resolve_includes(merged)?;
    let templates = fetch_template_entries_content(storage, resolved)?;
    info!("Loaded {} root template(s)", templates.len());

    Ok(Project {
        cwd,
        config_path,
        templates_directory,
        templates,
    })
}

/// The config file to use: the explicit one (which must exist) or `pli.toml`
/// in `cwd` when present.
pub fn search_for_config_file(
    storage: &dyn Storage,
    cwd: &str,
    explicit: Option<&str>,
) -> Result<Option<String>, ConfigError> {
    if let Some(explicit) = explicit {
        let path = paths::resolve(cwd, explicit);
        if !storage.exists(&path) {
            return Err(ConfigError::ConfigNotFound { path });
        }
        return Ok(Some(path));
    }

    let candidate = paths::join(&[cwd, CONFIG_FILENAME]);
    Ok(storage.exists(&candidate).then_some(candidate))
}

/// One root template per first-level directory of `templates_directory`,
/// sorted by id. Files directly inside the templates directory are ignored.
///
/// Entries get no content here; it is fetched once the roots are merged.
pub fn extract_templates_from_directory(
    storage: &dyn Storage,
    templates_directory: &str,
) -> Result<Vec<Template>, ConfigError> {
    let mut grouped: BTreeMap<String, Vec<TemplateEntry>> = BTreeMap::new();
    for file in storage.list(templates_directory)? {
        let relative = paths::relative(templates_directory, &file);
        let segments = paths::split(&relative);
        if segments.len() < 2 {
            trace!("Skipping top level file '{}'", file);
            continue;
        }
        if let Some(id) = segments.first() {
            grouped
                .entry(id.clone())
                .or_default()
                .push(TemplateEntry::new(file, None));
        }
    }

    let templates = grouped
        .into_iter()
        .map(|(id, entries)| {
            Template::new(TemplateProps {
                name: Some(id.clone()),
                id,
                entries,
                ..Default::default()
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    debug!(
        "Extracted {} template(s) from '{}'",
        templates.len(),
        templates_directory
    );
    Ok(templates)
}

/// Merges declared templates into extracted ones by id. Declared templates
/// win on conflicting values; templates present on one side only are kept,
/// extracted ones first.
pub fn merge_root_templates(
    extracted: Vec<Template>,
    declared: Vec<Template>,
) -> Result<Vec<Template>, ConfigError> {
    let mut merged = extracted;
    for template in declared {
        match merged.iter_mut().find(|t| t.id() == template.id()) {
            Some(existing) => {
                trace!("Merging declared template '{}'", template.id());
                *existing = existing.merge(&template)?;
            }
            None => merged.push(template),
        }
    }
    Ok(merged)
}

/// Replaces every `include` of the forest by the root template it names,
/// resolved recursively. Included roots are appended to the children.
pub fn resolve_includes(roots: Vec<Template>) -> Result<Vec<Arc<Template>>, ConfigError> {
    let by_id: HashMap<&str, &Template> = roots.iter().map(|t| (t.id(), t)).collect();
    roots
        .iter()
        .map(|root| {
            let mut stack = vec![root.id().to_string()];
            resolve_template_includes(root, &by_id, &mut stack).map(Arc::new)
        })
        .collect()
}

fn resolve_template_includes(
    template: &Template,
    by_id: &HashMap<&str, &Template>,
    stack: &mut Vec<String>,
) -> Result<Template, ConfigError> {
    let mut children = template
        .children()
        .iter()
        .map(|child| resolve_template_includes(child, by_id, stack).map(Arc::new))
        .collect::<Result<Vec<_>, _>>()?;

    for include in template.includes() {
        if stack.contains(include) {
            let mut cycle = stack.clone();
            cycle.push(include.clone());
            return Err(ConfigError::IncludeCycle {
                cycle: cycle.join(" -> "),
            });
        }
        let included = by_id
            .get(include.as_str())
            .ok_or_else(|| ConfigError::UnknownInclude {
                template: template.id().to_string(),
                include: include.clone(),
            })?;

        stack.push(include.clone());
        let resolved = resolve_template_includes(included, by_id, stack);
        stack.pop();
        children.push(Arc::new(resolved?));
    }

    Ok(template.with_children(children))
}

/// Reads the content of every file entry that has none, each source once.
pub fn fetch_template_entries_content(
    storage: &dyn Storage,
    templates: Vec<Arc<Template>>,
) -> Result<Vec<Arc<Template>>, ConfigError> {
    let mut sources: Vec<String> = templates.iter().flat_map(|t| t.missing_sources()).collect();
    sources.sort();
    sources.dedup();
    if sources.is_empty() {
        return Ok(templates);
    }

    let _timer = BlockTimer::new("fetch_template_entries_content");
    let contents = sources
        .par_iter()
        .map(|source| storage.read(source).map(|content| (source.clone(), content)))
        .collect::<Result<HashMap<String, String>, StorageError>>()?;
    debug!("Fetched the content of {} entry file(s)", contents.len());

    Ok(templates
        .iter()
        .map(|t| Arc::new(t.with_loaded_contents(&contents)))
        .collect())
}
