// src/core/template.rs

//! Templates: a set of entries, nested child templates, variable
//! declarations and an output mapping.
//!
//! A `Template` is static. Every render collects its variables into fresh
//! scopes, so the same template can take part in several trees at once.

use crate::core::builtins::BuiltinVariable;
use crate::core::paths;
use crate::core::scope::{ScopeError, ScopeId, ScopeTree};
use crate::core::template_engine::{EngineError, TemplateEngine};
use crate::core::template_entry::{EntryError, TemplateEntry};
use crate::core::variable::TemplateVariable;
use log::debug;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemplateError {
    #[error("Template '{template}' declares variable '{name}' more than once.")]
    DuplicateVariable { template: String, name: String },

    #[error("Template '{template}' declares entry '{source_path}' more than once.")]
    DuplicateEntry { template: String, source_path: String },

    #[error("Cannot merge templates with different ids: '{left}' and '{right}'.")]
    IdMismatch { left: String, right: String },

    #[error("Entry '{source_path}' of template '{template}' has no content to extract variables from.")]
    MissingContent { template: String, source_path: String },

    #[error("Cannot resolve the output path of '{source_path}' in template '{template}': {source}")]
    OutputPath {
        template: String,
        source_path: String,
        #[source]
        source: EngineError,
    },

    #[error(transparent)]
    Scope(#[from] ScopeError),

    #[error(transparent)]
    Entry(#[from] EntryError),
}

/// Construction parameters of a [`Template`].
#[derive(Debug, Clone, Default)]
pub struct TemplateProps {
    pub id: String,
    pub name: Option<String>,
    pub entries: Vec<TemplateEntry>,
    pub children: Vec<Arc<Template>>,
    pub variables: Vec<TemplateVariable>,
    pub output_mapping: BTreeMap<String, String>,
    pub default_output_directory_path: Option<String>,
    /// Ids of root templates to nest as children once all roots are known.
    pub includes: Vec<String>,
}

/// Overrides for [`Template::clone_with`]; `None` keeps the original value.
#[derive(Debug, Clone, Default)]
pub struct TemplateOverrides {
    pub id: Option<String>,
    pub name: Option<String>,
    pub entries: Option<Vec<TemplateEntry>>,
    pub variables: Option<Vec<TemplateVariable>>,
    pub output_mapping: Option<BTreeMap<String, String>>,
    pub default_output_directory_path: Option<String>,
}

/// The result of collecting a template's variables: the template, the scope
/// its variables were registered in, and the same for each child.
#[derive(Debug, Clone)]
pub struct CollectedBranch {
    pub template: Arc<Template>,
    pub scope: ScopeId,
    pub children: Vec<CollectedBranch>,
}

#[derive(Debug, Clone)]
pub struct Template {
    id: String,
    name: Option<String>,
    entries: Vec<TemplateEntry>,
    children: Vec<Arc<Template>>,
    variables: Vec<TemplateVariable>,
    output_mapping: BTreeMap<String, String>,
    default_output_directory_path: Option<String>,
    includes: Vec<String>,
}

impl Template {
    pub fn new(props: TemplateProps) -> Result<Self, TemplateError> {
        let mut names = HashSet::new();
        for variable in &props.variables {
            if !names.insert(variable.name()) {
                return Err(TemplateError::DuplicateVariable {
                    template: props.id.clone(),
                    name: variable.name().to_string(),
                });
            }
        }

        let mut sources = HashSet::new();
        for entry in &props.entries {
            if !sources.insert(entry.source()) {
                return Err(TemplateError::DuplicateEntry {
                    template: props.id.clone(),
                    source_path: entry.source().to_string(),
                });
            }
        }

        Ok(Self {
            id: props.id,
            name: props.name,
            entries: props.entries,
            children: props.children,
            variables: props.variables,
            output_mapping: props.output_mapping,
            default_output_directory_path: props.default_output_directory_path,
            includes: props.includes,
        })
    }

    // --- ACCESSORS ---

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The name when there is one, the id otherwise.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    pub fn entries(&self) -> &[TemplateEntry] {
        &self.entries
    }

    pub fn children(&self) -> &[Arc<Template>] {
        &self.children
    }

    pub fn variables(&self) -> &[TemplateVariable] {
        &self.variables
    }

    pub fn output_mapping(&self) -> &BTreeMap<String, String> {
        &self.output_mapping
    }

    pub fn default_output_directory_path(&self) -> Option<&str> {
        self.default_output_directory_path.as_deref()
    }

    pub fn includes(&self) -> &[String] {
        &self.includes
    }

    // --- STRUCTURAL OPERATIONS ---

    /// Combines two templates with the same id; `other` wins where both provide a value.
    ///
    /// Entries are matched by source, children by id (merged recursively) and
    /// variables by name. Output mappings are combined key by key.
    pub fn merge(&self, other: &Self) -> Result<Self, TemplateError> {
        if self.id != other.id {
            return Err(TemplateError::IdMismatch {
                left: self.id.clone(),
                right: other.id.clone(),
            });
        }

        let mut entries = self.entries.clone();
        for entry in &other.entries {
            match entries.iter_mut().find(|e| e.source() == entry.source()) {
                Some(existing) => *existing = existing.merge(entry),
                None => entries.push(entry.clone()),
            }
        }

        let mut children = self.children.clone();
        for child in &other.children {
            match children.iter_mut().find(|c| c.id == child.id) {
                Some(existing) => *existing = Arc::new(existing.merge(child)?),
                None => children.push(Arc::clone(child)),
            }
        }

        let mut variables = self.variables.clone();
        for variable in &other.variables {
            match variables.iter_mut().find(|v| v.name() == variable.name()) {
                Some(existing) => *existing = existing.merge(variable),
                None => variables.push(variable.clone()),
            }
        }

        let mut output_mapping = self.output_mapping.clone();
        output_mapping.extend(other.output_mapping.clone());

        let mut includes = self.includes.clone();
        for include in &other.includes {
            if !includes.contains(include) {
                includes.push(include.clone());
            }
        }

        Ok(Self {
            id: other.id.clone(),
            name: other.name.clone().or_else(|| self.name.clone()),
            entries,
            children,
            variables,
            output_mapping,
            default_output_directory_path: other
                .default_output_directory_path
                .clone()
                .or_else(|| self.default_output_directory_path.clone()),
            includes,
        })
    }

    /// A copy with some properties replaced. The id defaults to `<id>_clone`
    /// and the name to `<name>_clone`.
    pub fn clone_with(&self, overrides: TemplateOverrides) -> Result<Self, TemplateError> {
        Self::new(TemplateProps {
            id: overrides.id.unwrap_or_else(|| format!("{}_clone", self.id)),
            name: Some(
                overrides
                    .name
                    .unwrap_or_else(|| format!("{}_clone", self.display_name())),
            ),
            entries: overrides.entries.unwrap_or_else(|| self.entries.clone()),
            children: self.children.clone(),
            variables: overrides
                .variables
                .unwrap_or_else(|| self.variables.clone()),
            output_mapping: overrides
                .output_mapping
                .unwrap_or_else(|| self.output_mapping.clone()),
            default_output_directory_path: overrides
                .default_output_directory_path
                .or_else(|| self.default_output_directory_path.clone()),
            includes: self.includes.clone(),
        })
    }

    /// The same template with extra children appended and its includes cleared.
    pub fn with_children(&self, children: Vec<Arc<Template>>) -> Self {
        let mut out = self.clone();
        out.children = children;
        out.includes.clear();
        out
    }

    /// Sources of this tree's file entries that still lack content, deduplicated.
    pub fn missing_sources(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_missing_sources(&mut out);
        let mut seen = HashSet::new();
        out.retain(|source| seen.insert(source.clone()));
        out
    }

    fn collect_missing_sources(&self, out: &mut Vec<String>) {
        out.extend(
            self.entries
                .iter()
                .filter(|e| !e.is_dynamic() && e.content().is_none())
                .map(|e| e.source().to_string()),
        );
        for child in &self.children {
            child.collect_missing_sources(out);
        }
    }

    /// A copy of this tree where every entry without content takes it from `contents`.
    pub fn with_loaded_contents(&self, contents: &HashMap<String, String>) -> Self {
        let mut out = self.clone();
        for entry in &mut out.entries {
            if entry.content().is_none()
                && let Some(content) = contents.get(entry.source())
            {
                entry.set_content(content.clone());
            }
        }
        out.children = self
            .children
            .iter()
            .map(|child| Arc::new(child.with_loaded_contents(contents)))
            .collect();
        out
    }

    // --- RENDER LIFE CYCLE ---

    /// Registers this template's variables in a new scope (a child of
    /// `parent`, or a fresh root) and recurses into the children.
    ///
    /// Variables come from the placeholders of every entry's content and
    /// output path, merged with the declared ones. The output directory
    /// variable is always added.
    pub fn collect_variables(
        self: &Arc<Self>,
        engine: &TemplateEngine,
        scopes: &mut ScopeTree,
        parent: Option<ScopeId>,
    ) -> Result<CollectedBranch, TemplateError> {
        let scope = match parent {
            Some(parent) => scopes.spawn_child(parent)?,
            None => scopes.create_root(),
        };
        let templates_directory = scopes
            .get_variable_value(scope, BuiltinVariable::TemplatesDirectory.name())
            .map(ToString::to_string)
            .unwrap_or_default();

        let mut variables: Vec<TemplateVariable> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for entry in &self.entries {
            let content = entry
                .content()
                .ok_or_else(|| TemplateError::MissingContent {
                    template: self.id.clone(),
                    source_path: entry.source().to_string(),
                })?;
            let path = self.path_to_resolve(entry, &templates_directory);
            let names = engine
                .extract_all_variables(content)
                .into_iter()
                .chain(engine.extract_all_variables(&path));
            for name in names {
                if !BuiltinVariable::is_builtin(&name) && seen.insert(name.clone()) {
                    variables.push(TemplateVariable::new(name));
                }
            }
        }

        for declared in &self.variables {
            match variables.iter_mut().find(|v| v.name() == declared.name()) {
                Some(existing) => *existing = existing.merge(declared),
                None => variables.push(declared.clone()),
            }
        }

        let output_directory = BuiltinVariable::output_directory_variable(
            self.default_output_directory_path.clone(),
        );
        match variables
            .iter_mut()
            .find(|v| v.name() == BuiltinVariable::Cwd.name())
        {
            Some(existing) => *existing = output_directory.merge(existing),
            None => variables.push(output_directory),
        }

        debug!(
            "Template '{}' collected {} variable(s) into scope {:?}",
            self.id,
            variables.len(),
            scope
        );
        scopes.bulk_register_variables(scope, variables)?;

        let children = self
            .children
            .iter()
            .map(|child| child.collect_variables(engine, scopes, Some(scope)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CollectedBranch {
            template: Arc::clone(self),
            scope,
            children,
        })
    }

    /// The output path of `entry` before placeholders are rendered.
    fn path_to_resolve(&self, entry: &TemplateEntry, templates_directory: &str) -> String {
        let source = entry.source();
        let from_templates_directory =
            !templates_directory.is_empty() && paths::is_within(templates_directory, source);

        if from_templates_directory {
            let relative = paths::relative(templates_directory, source);
            return self
                .output_mapping
                .get(source)
                .or_else(|| self.output_mapping.get(&relative))
                .cloned()
                .unwrap_or_else(|| source.to_string());
        }

        match self.output_mapping.get(source) {
            Some(mapped) => mapped.clone(),
            None if entry.is_dynamic() => source.to_string(),
            None => paths::basename(source),
        }
    }

    /// Maps each entry source to its final output path, rendered strictly
    /// against `scope`: every placeholder must resolve to a non-empty value.
    pub fn resolve_output_mapping(
        &self,
        engine: &TemplateEngine,
        scopes: &ScopeTree,
        scope: ScopeId,
    ) -> Result<BTreeMap<String, String>, TemplateError> {
        let view = scopes.scope(scope);
        let value = |builtin: BuiltinVariable| {
            view.get_variable_value(builtin.name())
                .map(ToString::to_string)
                .unwrap_or_default()
        };
        let root_cwd = value(BuiltinVariable::RootCwd);
        let cwd = value(BuiltinVariable::Cwd);
        let templates_directory = value(BuiltinVariable::TemplatesDirectory);

        let mut out = BTreeMap::new();
        for entry in &self.entries {
            let mut path = self.path_to_resolve(entry, &templates_directory);
            if !templates_directory.is_empty() && paths::is_within(&templates_directory, &path) {
                path = paths::relative(&templates_directory, &path);
            }
            let output_directory = paths::resolve(&root_cwd, &cwd);
            let joined = paths::join(&[output_directory.as_str(), path.as_str()]);
            let resolved = engine.render_template(&joined, &view, true).map_err(|source| {
                TemplateError::OutputPath {
                    template: self.id.clone(),
                    source_path: entry.source().to_string(),
                    source,
                }
            })?;
            out.insert(entry.source().to_string(), resolved);
        }
        Ok(out)
    }

    /// Renders every entry against `scope` and keys the result by output path.
    ///
    /// Content rendering is lenient: a placeholder without value becomes empty.
    pub fn render(
        &self,
        engine: &TemplateEngine,
        scopes: &ScopeTree,
        scope: ScopeId,
    ) -> Result<BTreeMap<String, String>, TemplateError> {
        let view = scopes.scope(scope);
        let output_paths = self.resolve_output_mapping(engine, scopes, scope)?;

        let mut out = BTreeMap::new();
        for entry in &self.entries {
            let content = entry.content().unwrap_or_default();
            let rendered = engine
                .render_template(content, &view, false)
                .map_err(|source| TemplateError::OutputPath {
                    template: self.id.clone(),
                    source_path: entry.source().to_string(),
                    source,
                })?;
            if let Some(path) = output_paths.get(entry.source()) {
                out.insert(path.clone(), rendered);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::builtins::{RootScopeDefaults, create_root_scope};
    use crate::models::VariableValue;

    fn defaults() -> RootScopeDefaults {
        RootScopeDefaults {
            cwd: None,
            root_cwd: "/work".to_string(),
            templates_directory: "/work/templates".to_string(),
        }
    }

    fn entry(source: &str, content: &str) -> TemplateEntry {
        TemplateEntry::new(source, Some(content.to_string()))
    }

    #[test]
    fn test_new_rejects_duplicate_variables_and_entries() {
        let err = Template::new(TemplateProps {
            id: "t".to_string(),
            variables: vec![TemplateVariable::new("A"), TemplateVariable::new("A")],
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, TemplateError::DuplicateVariable { .. }));

        let err = Template::new(TemplateProps {
            id: "t".to_string(),
            entries: vec![entry("a", "1"), entry("a", "2")],
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, TemplateError::DuplicateEntry { .. }));
    }

    #[test]
    fn test_collect_synthesizes_variables_from_content_and_paths() {
        // --- Setup ---
        let mut mapping = BTreeMap::new();
        mapping.insert("comp/a.ts".to_string(), "$NAME$.ts".to_string());
        let template = Arc::new(
            Template::new(TemplateProps {
                id: "comp".to_string(),
                entries: vec![entry("/work/templates/comp/a.ts", "export class $CLASS$ {}")],
                variables: vec![TemplateVariable::new("CLASS").with_default("$NAME$Cmp")],
                output_mapping: mapping,
                ..Default::default()
            })
            .unwrap(),
        );
        let engine = TemplateEngine::new();
        let mut scopes = ScopeTree::new();
        let root = create_root_scope(&mut scopes, &defaults()).unwrap();

        // --- Execute ---
        let branch = template
            .collect_variables(&engine, &mut scopes, Some(root))
            .unwrap();

        // --- Assert ---
        let names: Vec<_> = scopes
            .own_variables(branch.scope)
            .iter()
            .map(|v| v.name().to_string())
            .collect();
        assert!(names.contains(&"NAME".to_string()));
        assert!(names.contains(&"CLASS".to_string()));
        assert!(names.contains(&"CWD".to_string()));
        assert!(!names.contains(&"ROOT_CWD".to_string()));
        assert_eq!(scopes.parent(branch.scope), Some(root));
    }

    #[test]
    fn test_collect_requires_content() {
        let template = Arc::new(
            Template::new(TemplateProps {
                id: "t".to_string(),
                entries: vec![TemplateEntry::new("/work/templates/t/a.ts", None)],
                ..Default::default()
            })
            .unwrap(),
        );
        let mut scopes = ScopeTree::new();
        let err = template
            .collect_variables(&TemplateEngine::new(), &mut scopes, None)
            .unwrap_err();
        assert!(matches!(err, TemplateError::MissingContent { .. }));
    }

    #[test]
    fn test_render_maps_outputs_and_resolves_placeholders() {
        // --- Setup ---
        let mut mapping = BTreeMap::new();
        mapping.insert("comp/a.ts".to_string(), "$NAME$/$NAME$.ts".to_string());
        let template = Arc::new(
            Template::new(TemplateProps {
                id: "comp".to_string(),
                entries: vec![
                    entry("/work/templates/comp/a.ts", "const name = '$NAME$';"),
                    entry("/work/templates/comp/readme.md", "# readme"),
                ],
                output_mapping: mapping,
                ..Default::default()
            })
            .unwrap(),
        );
        let engine = TemplateEngine::new();
        let mut scopes = ScopeTree::new();
        let root = create_root_scope(&mut scopes, &defaults()).unwrap();
        let branch = template
            .collect_variables(&engine, &mut scopes, Some(root))
            .unwrap();

        // --- Execute ---
        scopes
            .set_variable_value(branch.scope, "NAME", VariableValue::from("Button"))
            .unwrap();
        let output = template.render(&engine, &scopes, branch.scope).unwrap();

        // --- Assert ---
        assert_eq!(
            output.get("/work/Button/Button.ts").map(String::as_str),
            Some("const name = 'Button';")
        );
        assert_eq!(
            output.get("/work/comp/readme.md").map(String::as_str),
            Some("# readme")
        );
    }

    #[test]
    fn test_output_path_requires_values() {
        let mut mapping = BTreeMap::new();
        mapping.insert("t/a.ts".to_string(), "$NAME$.ts".to_string());
        let template = Arc::new(
            Template::new(TemplateProps {
                id: "t".to_string(),
                entries: vec![entry("/work/templates/t/a.ts", "")],
                output_mapping: mapping,
                ..Default::default()
            })
            .unwrap(),
        );
        let engine = TemplateEngine::new();
        let mut scopes = ScopeTree::new();
        let root = create_root_scope(&mut scopes, &defaults()).unwrap();
        let branch = template
            .collect_variables(&engine, &mut scopes, Some(root))
            .unwrap();

        let err = template
            .resolve_output_mapping(&engine, &scopes, branch.scope)
            .unwrap_err();
        assert!(err.to_string().contains("NAME"));
    }

    #[test]
    fn test_absolute_output_directory_replaces_root_cwd() {
        let template = Arc::new(
            Template::new(TemplateProps {
                id: "t".to_string(),
                entries: vec![entry("/work/templates/t/a.ts", "a")],
                ..Default::default()
            })
            .unwrap(),
        );
        let engine = TemplateEngine::new();
        let mut scopes = ScopeTree::new();
        let root = create_root_scope(
            &mut scopes,
            &RootScopeDefaults {
                cwd: Some("/srv/out".to_string()),
                ..defaults()
            },
        )
        .unwrap();
        let branch = template
            .collect_variables(&engine, &mut scopes, Some(root))
            .unwrap();

        let mapping = template
            .resolve_output_mapping(&engine, &scopes, branch.scope)
            .unwrap();

        assert_eq!(
            mapping.get("/work/templates/t/a.ts").map(String::as_str),
            Some("/srv/out/t/a.ts")
        );
    }

    #[test]
    fn test_entries_outside_templates_directory_use_their_basename() {
        let template = Arc::new(
            Template::new(TemplateProps {
                id: "t".to_string(),
                entries: vec![
                    entry("/elsewhere/deep/file.txt", "x"),
                    TemplateEntry::dynamic("virtual/$NAME$.txt", "y"),
                ],
                default_output_directory_path: Some("out".to_string()),
                ..Default::default()
            })
            .unwrap(),
        );
        let engine = TemplateEngine::new();
        let mut scopes = ScopeTree::new();
        let root = create_root_scope(&mut scopes, &defaults()).unwrap();
        let branch = template
            .collect_variables(&engine, &mut scopes, Some(root))
            .unwrap();
        scopes
            .set_variable_value(branch.scope, "NAME", VariableValue::from("n"))
            .unwrap();

        let mapping = template
            .resolve_output_mapping(&engine, &scopes, branch.scope)
            .unwrap();

        assert_eq!(
            mapping.get("/elsewhere/deep/file.txt").map(String::as_str),
            Some("/work/out/file.txt")
        );
        assert_eq!(
            mapping.get("virtual/$NAME$.txt").map(String::as_str),
            Some("/work/out/virtual/n.txt")
        );
    }

    #[test]
    fn test_merge_requires_same_id_and_unions_parts() {
        let left = Template::new(TemplateProps {
            id: "t".to_string(),
            name: Some("Left".to_string()),
            entries: vec![entry("a", "from left")],
            variables: vec![TemplateVariable::new("A").with_default("1")],
            ..Default::default()
        })
        .unwrap();
        let right = Template::new(TemplateProps {
            id: "t".to_string(),
            entries: vec![entry("a", ""), entry("b", "from right")],
            variables: vec![TemplateVariable::new("B")],
            default_output_directory_path: Some("out".to_string()),
            ..Default::default()
        })
        .unwrap();

        let merged = left.merge(&right).unwrap();

        assert_eq!(merged.name(), Some("Left"));
        assert_eq!(merged.entries().len(), 2);
        assert_eq!(merged.entries().first().unwrap().content(), Some("from left"));
        assert_eq!(merged.variables().len(), 2);
        assert_eq!(merged.default_output_directory_path(), Some("out"));

        let other = Template::new(TemplateProps {
            id: "other".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert!(matches!(
            left.merge(&other),
            Err(TemplateError::IdMismatch { .. })
        ));
    }

    #[test]
    fn test_merge_lets_the_other_default_win() {
        let first = Template::new(TemplateProps {
            id: "x".to_string(),
            entries: vec![entry("a", "a")],
            variables: vec![TemplateVariable::new("NAME").with_default("t1")],
            ..Default::default()
        })
        .unwrap();
        let second = Template::new(TemplateProps {
            id: "x".to_string(),
            entries: vec![entry("b", "b")],
            variables: vec![TemplateVariable::new("NAME").with_default("t2")],
            ..Default::default()
        })
        .unwrap();

        let merged = first.merge(&second).unwrap();

        assert_eq!(merged.id(), "x");
        assert_eq!(merged.variables().len(), 1);
        assert_eq!(
            merged.variables().first().unwrap().default_value(),
            Some(&VariableValue::from("t2"))
        );
        let sources: Vec<_> = merged.entries().iter().map(TemplateEntry::source).collect();
        assert_eq!(sources, vec!["a", "b"]);
    }

    #[test]
    fn test_clone_with_derives_id_and_name() {
        let template = Template::new(TemplateProps {
            id: "t".to_string(),
            ..Default::default()
        })
        .unwrap();

        let copy = template.clone_with(TemplateOverrides::default()).unwrap();

        assert_eq!(copy.id(), "t_clone");
        assert_eq!(copy.name(), Some("t_clone"));
    }

    #[test]
    fn test_loaded_contents_fill_missing_entries_only() {
        let child = Arc::new(
            Template::new(TemplateProps {
                id: "child".to_string(),
                entries: vec![TemplateEntry::new("/t/c.ts", None)],
                ..Default::default()
            })
            .unwrap(),
        );
        let template = Template::new(TemplateProps {
            id: "t".to_string(),
            entries: vec![TemplateEntry::new("/t/a.ts", None), entry("/t/b.ts", "kept")],
            children: vec![child],
            ..Default::default()
        })
        .unwrap();

        assert_eq!(template.missing_sources(), vec!["/t/a.ts", "/t/c.ts"]);

        let mut contents = HashMap::new();
        contents.insert("/t/a.ts".to_string(), "A".to_string());
        contents.insert("/t/b.ts".to_string(), "ignored".to_string());
        contents.insert("/t/c.ts".to_string(), "C".to_string());
        let loaded = template.with_loaded_contents(&contents);

        assert!(loaded.missing_sources().is_empty());
        assert_eq!(loaded.entries().get(1).unwrap().content(), Some("kept"));
    }
}
