// src/core/builtins.rs

use crate::constants::OUTPUT_DIRECTORY_UI_INDEX;
use crate::core::scope::{ScopeError, ScopeId, ScopeTree};
use crate::core::variable::TemplateVariable;
use crate::models::VariableValue;

/// Variables every render has, declared in the root scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinVariable {
    /// The output directory, relative to `ROOT_CWD` unless absolute.
    Cwd,
    /// The directory pli was started from.
    RootCwd,
    /// The absolute templates directory.
    TemplatesDirectory,
}

impl BuiltinVariable {
    pub const ALL: [Self; 3] = [Self::Cwd, Self::RootCwd, Self::TemplatesDirectory];

    pub fn name(self) -> &'static str {
        match self {
            Self::Cwd => "CWD",
            Self::RootCwd => "ROOT_CWD",
            Self::TemplatesDirectory => "TEMPLATES_DIRECTORY",
        }
    }

    pub fn is_builtin(name: &str) -> bool {
        Self::ALL.iter().any(|b| b.name() == name)
    }

    /// The user facing declaration of `CWD`, used both in root scopes and when
    /// a template contributes its own output directory.
    pub fn output_directory_variable(default: Option<String>) -> TemplateVariable {
        let variable = TemplateVariable::new(Self::Cwd.name())
            .with_message("Output directory")
            .with_index(OUTPUT_DIRECTORY_UI_INDEX);
        match default {
            Some(dir) => variable.with_default(dir),
            None => variable,
        }
    }
}

/// Values the root scope of every render starts with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootScopeDefaults {
    pub cwd: Option<String>,
    pub root_cwd: String,
    pub templates_directory: String,
}

/// Creates a root scope holding the builtin variables.
pub fn create_root_scope(
    tree: &mut ScopeTree,
    defaults: &RootScopeDefaults,
) -> Result<ScopeId, ScopeError> {
    let root = tree.create_root();
    tree.bulk_register_variables(
        root,
        vec![
            BuiltinVariable::output_directory_variable(defaults.cwd.clone()),
            TemplateVariable::new(BuiltinVariable::RootCwd.name())
                .with_default(VariableValue::from(defaults.root_cwd.as_str()))
                .readonly(true)
                .hidden(true),
            TemplateVariable::new(BuiltinVariable::TemplatesDirectory.name())
                .with_default(VariableValue::from(defaults.templates_directory.as_str()))
                .readonly(true)
                .hidden(true),
        ],
    )?;
    Ok(root)
}
