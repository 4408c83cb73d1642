//! # Compiler
//!
//! Turns the flexible `pli.toml` syntax into a validated form that can be
//! cached (`CompiledConfig`), and that form into runtime [`Template`]s.
//!
//! Everything that can be rejected statically (empty ids, dynamic entries
//! without content, invalid regex patterns, duplicate names) is rejected
//! here, so a cached configuration always builds.

use crate::core::paths;
use crate::core::template::{Template, TemplateError, TemplateProps};
use crate::core::template_entry::{EntryError, TemplateEntry};
use crate::core::variable::{TemplateVariable, UiOption, Validator};
use crate::models::{
    CompiledConfig, SerializableOption, SerializableTemplate, SerializableVariable,
    TomlConfig, TomlOption, TomlTemplate, TomlVariable, VariableValue,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Represents errors that can occur while compiling `pli.toml`.
#[derive(Error, Debug)]
pub enum CompilerError {
    /// The TOML content is invalid and could not be parsed.
    #[error("Failed to parse TOML file at '{path}': {source}")]
    TomlParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("A template in '{parent}' has an empty id.")]
    EmptyTemplateId { parent: String },

    #[error("Invalid pattern for variable '{variable}' of template '{template}': {source}")]
    InvalidPattern {
        template: String,
        variable: String,
        #[source]
        source: regex::Error,
    },

    #[error("In template '{template}': {source}")]
    Entry {
        template: String,
        #[source]
        source: EntryError,
    },

    #[error(transparent)]
    Template(#[from] TemplateError),
}

// --- PUBLIC COMPILER API ---

/// Parses the text of a `pli.toml`.
pub fn parse_config(content: &str, path: &Path) -> Result<TomlConfig, CompilerError> {
    toml::from_str(content).map_err(|source| CompilerError::TomlParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Validates a parsed configuration and converts it to its cacheable form.
pub(crate) fn compile_config(
    config: TomlConfig,
    source_hash: String,
) -> Result<CompiledConfig, CompilerError> {
    let templates = config
        .templates
        .into_iter()
        .map(|t| compile_template(t, "<root>"))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CompiledConfig {
        source_hash,
        templates_directory: config.templates_directory,
        templates,
    })
}

/// Builds the runtime templates of a compiled configuration.
///
/// Relative sources of file entries are resolved against `templates_directory`,
/// so they line up with the entries extracted from that directory.
pub(crate) fn build_templates(
    config: &CompiledConfig,
    templates_directory: &str,
) -> Result<Vec<Template>, CompilerError> {
    config
        .templates
        .iter()
        .map(|t| build_template(t, templates_directory))
        .collect()
}

// --- COMPILATION (TOML -> CACHE) ---

fn compile_template(
    template: TomlTemplate,
    parent: &str,
) -> Result<SerializableTemplate, CompilerError> {
    if template.id.trim().is_empty() {
        return Err(CompilerError::EmptyTemplateId {
            parent: parent.to_string(),
        });
    }

    let mut names = HashSet::new();
    if let Some(duplicate) = template.variables.iter().find(|v| !names.insert(v.name.as_str())) {
        return Err(TemplateError::DuplicateVariable {
            template: template.id.clone(),
            name: duplicate.name.clone(),
        }
        .into());
    }
    let mut sources = HashSet::new();
    if let Some(duplicate) = template.entries.iter().find(|e| !sources.insert(e.source.as_str())) {
        return Err(TemplateError::DuplicateEntry {
            template: template.id.clone(),
            source_path: duplicate.source.clone(),
        }
        .into());
    }

    for definition in &template.entries {
        TemplateEntry::from_definition(definition).map_err(|source| CompilerError::Entry {
            template: template.id.clone(),
            source,
        })?;
    }

    let variables = template
        .variables
        .into_iter()
        .map(|v| compile_variable(v, &template.id))
        .collect::<Result<Vec<_>, _>>()?;

    let children = template
        .children
        .into_iter()
        .map(|child| compile_template(child, &template.id))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SerializableTemplate {
        id: template.id,
        name: template.name,
        default_output_directory: template.default_output_directory,
        output_mapping: template.output_mapping,
        include: template.include,
        entries: template.entries,
        variables,
        children,
    })
}

fn compile_variable(
    variable: TomlVariable,
    template_id: &str,
) -> Result<SerializableVariable, CompilerError> {
    // Patterns are compiled once here only to reject invalid ones early.
    Validator::from_specs(&variable.validate).map_err(|source| CompilerError::InvalidPattern {
        template: template_id.to_string(),
        variable: variable.name.clone(),
        source,
    })?;

    let options = variable
        .options
        .into_iter()
        .map(|option| match option {
            TomlOption::Plain(label) => SerializableOption {
                value: VariableValue::Text(label.clone()),
                label,
            },
            TomlOption::Labeled { label, value } => SerializableOption {
                value: value
                    .map(VariableValue::from)
                    .unwrap_or_else(|| VariableValue::Text(label.clone())),
                label,
            },
        })
        .collect();

    Ok(SerializableVariable {
        name: variable.name,
        default: variable.default.map(VariableValue::from),
        transform: variable.transform,
        validate: variable.validate,
        readonly: variable.readonly,
        overridable: variable.overridable,
        reactive: variable.reactive,
        multiple: variable.multiple,
        options,
        ui: variable.ui.unwrap_or_default(),
    })
}

// --- BUILDING (CACHE -> RUNTIME) ---

fn build_template(
    template: &SerializableTemplate,
    templates_directory: &str,
) -> Result<Template, CompilerError> {
    let entries = template
        .entries
        .iter()
        .map(|definition| {
            let mut definition = definition.clone();
            if !definition.dynamic && !paths::is_absolute(&definition.source) {
                definition.source = paths::join(&[templates_directory, definition.source.as_str()]);
            }
            TemplateEntry::from_definition(&definition).map_err(|source| CompilerError::Entry {
                template: template.id.clone(),
                source,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let variables = template
        .variables
        .iter()
        .map(|v| build_variable(v, &template.id))
        .collect::<Result<Vec<_>, _>>()?;

    let children = template
        .children
        .iter()
        .map(|child| build_template(child, templates_directory).map(Arc::new))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Template::new(TemplateProps {
        id: template.id.clone(),
        name: template.name.clone(),
        entries,
        children,
        variables,
        output_mapping: template.output_mapping.clone(),
        default_output_directory_path: template.default_output_directory.clone(),
        includes: template.include.clone(),
    })?)
}

fn build_variable(
    variable: &SerializableVariable,
    template_id: &str,
) -> Result<TemplateVariable, CompilerError> {
    let mut out = TemplateVariable::new(variable.name.clone())
        .with_ui(variable.ui.clone())
        .with_options(
            variable
                .options
                .iter()
                .map(|o| UiOption::new(o.label.clone(), o.value.clone()))
                .collect(),
        )
        .pipe(variable.transform.iter().cloned());

    if let Some(default) = &variable.default {
        out = out.with_default(default.clone());
    }
    if let Some(readonly) = variable.readonly {
        out = out.readonly(readonly);
    }
    if let Some(overridable) = variable.overridable {
        out = out.overridable(overridable);
    }
    if let Some(reactive) = variable.reactive {
        out = out.reactive(reactive);
    }
    if let Some(multiple) = variable.multiple {
        out = out.multiple(multiple);
    }

    let validator =
        Validator::from_specs(&variable.validate).map_err(|source| CompilerError::InvalidPattern {
            template: template_id.to_string(),
            variable: variable.name.clone(),
            source,
        })?;
    if let Some(validator) = validator {
        out = out.with_validator(validator);
    }
    Ok(out)
}
