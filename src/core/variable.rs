// src/core/variable.rs

//! Variable declarations: default value, presentation hints, a transform
//! pipeline and an optional validator.
//!
//! A declaration is never changed in place once registered in a scope. Merging
//! and piping produce new instances.

use crate::core::scope::ScopeRef;
use crate::core::template_engine::TemplateEngine;
use crate::models::{TransformSpec, UiDescriptor, UiKind, ValidatorSpec, VariableValue};
use heck::{ToKebabCase, ToLowerCamelCase, ToShoutySnakeCase, ToSnakeCase, ToUpperCamelCase};
use regex::Regex;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VariableError {
    #[error("Invalid value \"{value}\" for variable {name}: {message}")]
    Validation {
        name: String,
        value: String,
        message: String,
    },
    #[error("Transform '{stage}' failed for variable {name}: {message}")]
    Transform {
        name: String,
        stage: String,
        message: String,
    },
}

/// User supplied transform stage.
pub type TransformFn = dyn Fn(VariableValue, &TemplateVariable, ScopeRef<'_>) -> Result<VariableValue, String>
    + Send
    + Sync;

/// User supplied validation rule; `Err` carries the message shown to the user.
pub type ValidateFn =
    dyn Fn(&VariableValue, &TemplateVariable, ScopeRef<'_>) -> Result<(), String> + Send + Sync;

/// One stage of a transform pipeline.
#[derive(Clone)]
pub enum Transform {
    Builtin(TransformSpec),
    Custom(Arc<TransformFn>),
}

impl Transform {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(VariableValue, &TemplateVariable, ScopeRef<'_>) -> Result<VariableValue, String>
            + Send
            + Sync
            + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    fn label(&self) -> String {
        match self {
            Self::Builtin(spec) => format!("{spec:?}"),
            Self::Custom(_) => "custom".to_string(),
        }
    }

    fn apply(
        &self,
        value: VariableValue,
        variable: &TemplateVariable,
        scope: ScopeRef<'_>,
    ) -> Result<VariableValue, String> {
        match self {
            Self::Builtin(spec) => apply_builtin(spec, value),
            Self::Custom(f) => f(value, variable, scope),
        }
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin(spec) => f.debug_tuple("Builtin").field(spec).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl From<TransformSpec> for Transform {
    fn from(spec: TransformSpec) -> Self {
        Self::Builtin(spec)
    }
}

/// Applies `f` to the text of a value, element-wise for lists. Other kinds pass through.
fn map_text(value: VariableValue, f: impl Fn(&str) -> String) -> VariableValue {
    match value {
        VariableValue::Text(text) => VariableValue::Text(f(&text)),
        VariableValue::List(items) => VariableValue::List(items.iter().map(|s| f(s)).collect()),
        other => other,
    }
}

fn apply_builtin(spec: &TransformSpec, value: VariableValue) -> Result<VariableValue, String> {
    let out = match spec {
        TransformSpec::Trim => map_text(value, |s| s.trim().to_string()),
        TransformSpec::Lowercase => map_text(value, str::to_lowercase),
        TransformSpec::Uppercase => map_text(value, str::to_uppercase),
        TransformSpec::PascalCase => map_text(value, |s| s.to_upper_camel_case()),
        TransformSpec::CamelCase => map_text(value, |s| s.to_lower_camel_case()),
        TransformSpec::SnakeCase => map_text(value, |s| s.to_snake_case()),
        TransformSpec::KebabCase => map_text(value, |s| s.to_kebab_case()),
        TransformSpec::ScreamingSnakeCase => map_text(value, |s| s.to_shouty_snake_case()),
        TransformSpec::ToNumber => match value {
            VariableValue::Number(n) => VariableValue::Number(n),
            other => match other.as_number() {
                Some(n) => VariableValue::Number(n),
                None => return Err(format!("'{other}' is not a number")),
            },
        },
        TransformSpec::ToBool => match value {
            VariableValue::Bool(b) => VariableValue::Bool(b),
            VariableValue::Number(n) => VariableValue::Bool(n != 0.0),
            other => match other.to_string().trim().to_lowercase().as_str() {
                "true" | "yes" | "y" | "1" => VariableValue::Bool(true),
                "false" | "no" | "n" | "0" | "" => VariableValue::Bool(false),
                _ => return Err(format!("'{other}' is not a boolean")),
            },
        },
        TransformSpec::Multiply(factor) => match value.as_number() {
            Some(n) => VariableValue::Number(n * factor),
            None => return Err(format!("'{value}' is not a number")),
        },
        TransformSpec::Prefix(prefix) => VariableValue::Text(format!("{prefix}{value}")),
        TransformSpec::Suffix(suffix) => VariableValue::Text(format!("{value}{suffix}")),
        TransformSpec::Replace { from, to } => map_text(value, |s| s.replace(from.as_str(), to)),
    };
    Ok(out)
}

/// A validation rule of a variable.
#[derive(Clone)]
pub enum Validator {
    NonEmpty,
    Integer,
    Number,
    Pattern(Regex),
    OneOf(Vec<String>),
    MinLength(usize),
    MaxLength(usize),
    /// Passes when every inner rule passes; reports the first failure.
    All(Vec<Validator>),
    Custom(Arc<ValidateFn>),
}

impl Validator {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&VariableValue, &TemplateVariable, ScopeRef<'_>) -> Result<(), String>
            + Send
            + Sync
            + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    /// Builds a rule from its declarative form. Only `pattern` can fail.
    pub fn from_spec(spec: &ValidatorSpec) -> Result<Self, regex::Error> {
        Ok(match spec {
            ValidatorSpec::NonEmpty => Self::NonEmpty,
            ValidatorSpec::Integer => Self::Integer,
            ValidatorSpec::Number => Self::Number,
            ValidatorSpec::Pattern(pattern) => Self::Pattern(Regex::new(pattern)?),
            ValidatorSpec::OneOf(choices) => Self::OneOf(choices.clone()),
            ValidatorSpec::MinLength(n) => Self::MinLength(*n),
            ValidatorSpec::MaxLength(n) => Self::MaxLength(*n),
        })
    }

    /// Combines several declarative rules; `None` when there is nothing to check.
    pub fn from_specs(specs: &[ValidatorSpec]) -> Result<Option<Self>, regex::Error> {
        let mut rules = specs
            .iter()
            .map(Self::from_spec)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(match rules.len() {
            0 => None,
            1 => rules.pop(),
            _ => Some(Self::All(rules)),
        })
    }

    fn check(
        &self,
        value: &VariableValue,
        variable: &TemplateVariable,
        scope: ScopeRef<'_>,
    ) -> Result<(), String> {
        let text = value.to_string();
        match self {
            Self::NonEmpty if value.is_empty() => Err("a value is required".to_string()),
            Self::Integer => match value {
                VariableValue::Number(n) if n.fract() == 0.0 => Ok(()),
                _ if text.trim().parse::<i64>().is_ok() => Ok(()),
                _ => Err("expected an integer".to_string()),
            },
            Self::Number if value.as_number().is_none() => Err("expected a number".to_string()),
            Self::Pattern(re) if !re.is_match(&text) => {
                Err(format!("does not match the pattern /{}/", re.as_str()))
            }
            Self::OneOf(choices) if !choices.iter().any(|c| *c == text) => {
                Err(format!("expected one of: {}", choices.join(", ")))
            }
            Self::MinLength(min) if text.chars().count() < *min => {
                Err(format!("must be at least {min} characters long"))
            }
            Self::MaxLength(max) if text.chars().count() > *max => {
                Err(format!("must be at most {max} characters long"))
            }
            Self::All(rules) => rules
                .iter()
                .try_for_each(|rule| rule.check(value, variable, scope)),
            Self::Custom(f) => f(value, variable, scope),
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonEmpty => f.write_str("NonEmpty"),
            Self::Integer => f.write_str("Integer"),
            Self::Number => f.write_str("Number"),
            Self::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            Self::OneOf(choices) => f.debug_tuple("OneOf").field(choices).finish(),
            Self::MinLength(n) => f.debug_tuple("MinLength").field(n).finish(),
            Self::MaxLength(n) => f.debug_tuple("MaxLength").field(n).finish(),
            Self::All(rules) => f.debug_tuple("All").field(rules).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// A choice offered by list and checkbox prompts.
#[derive(Debug, Clone, PartialEq)]
pub struct UiOption {
    pub label: String,
    pub value: VariableValue,
}

impl UiOption {
    pub fn new(label: impl Into<String>, value: impl Into<VariableValue>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// A named variable declaration.
#[derive(Debug, Clone)]
pub struct TemplateVariable {
    name: String,
    default_value: Option<VariableValue>,
    ui: UiDescriptor,
    options: Vec<UiOption>,
    readonly: Option<bool>,
    overridable: Option<bool>,
    reactive: Option<bool>,
    multiple: Option<bool>,
    transforms: Vec<Transform>,
    validator: Option<Validator>,
}

impl TemplateVariable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_value: None,
            ui: UiDescriptor::default(),
            options: Vec::new(),
            readonly: None,
            overridable: None,
            reactive: None,
            multiple: None,
            transforms: Vec::new(),
            validator: None,
        }
    }

    // --- BUILDERS ---

    pub fn with_default(mut self, value: impl Into<VariableValue>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_ui(mut self, ui: UiDescriptor) -> Self {
        self.ui = ui;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.ui.message = Some(message.into());
        self
    }

    pub fn with_kind(mut self, kind: UiKind) -> Self {
        self.ui.kind = Some(kind);
        self
    }

    pub fn with_index(mut self, index: i32) -> Self {
        self.ui.index = Some(index);
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.ui.hidden = Some(hidden);
        self
    }

    pub fn with_options(mut self, options: Vec<UiOption>) -> Self {
        self.options = options;
        self
    }

    pub fn readonly(mut self, readonly: bool) -> Self {
        self.readonly = Some(readonly);
        self
    }

    pub fn overridable(mut self, overridable: bool) -> Self {
        self.overridable = Some(overridable);
        self
    }

    pub fn reactive(mut self, reactive: bool) -> Self {
        self.reactive = Some(reactive);
        self
    }

    pub fn multiple(mut self, multiple: bool) -> Self {
        self.multiple = Some(multiple);
        self
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Appends stages to the transform pipeline. Piping twice concatenates.
    pub fn pipe<I>(mut self, transforms: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Transform>,
    {
        self.transforms
            .extend(transforms.into_iter().map(Into::into));
        self
    }

    // --- ACCESSORS ---

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_value(&self) -> Option<&VariableValue> {
        self.default_value.as_ref()
    }

    pub fn ui(&self) -> &UiDescriptor {
        &self.ui
    }

    pub fn ui_kind(&self) -> UiKind {
        self.ui.kind.unwrap_or_default()
    }

    pub fn ui_message(&self) -> String {
        self.ui
            .message
            .clone()
            .unwrap_or_else(|| format!("Insert value for {} :", self.name))
    }

    pub fn is_hidden(&self) -> bool {
        self.ui.hidden.unwrap_or(false)
    }

    pub fn ui_index(&self) -> i32 {
        self.ui.index.unwrap_or(0)
    }

    pub fn options(&self) -> &[UiOption] {
        &self.options
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly.unwrap_or(false)
    }

    pub fn is_overridable(&self) -> bool {
        self.overridable.unwrap_or(true)
    }

    pub fn is_reactive(&self) -> bool {
        self.reactive.unwrap_or(true)
    }

    pub fn is_multiple(&self) -> bool {
        self.multiple.unwrap_or(false)
    }

    pub fn transforms(&self) -> &[Transform] {
        &self.transforms
    }

    pub fn validator(&self) -> Option<&Validator> {
        self.validator.as_ref()
    }

    // --- BEHAVIOUR ---

    /// Names the default value refers to through placeholders.
    pub fn get_dependencies(&self, engine: &TemplateEngine) -> Vec<String> {
        match &self.default_value {
            Some(VariableValue::Text(text)) => engine.extract_all_variables(text),
            _ => Vec::new(),
        }
    }

    /// A derived variable computes its value from other variables.
    pub fn is_derived(&self, engine: &TemplateEngine) -> bool {
        matches!(&self.default_value, Some(VariableValue::Text(text)) if engine.has_variables(text))
    }

    /// Runs the pipeline stages in order; the first failing stage aborts.
    pub fn transform_value(
        &self,
        raw: VariableValue,
        scope: ScopeRef<'_>,
    ) -> Result<VariableValue, VariableError> {
        self.transforms
            .iter()
            .try_fold(raw, |value, stage| {
                stage
                    .apply(value, self, scope)
                    .map_err(|message| VariableError::Transform {
                        name: self.name.clone(),
                        stage: stage.label(),
                        message,
                    })
            })
    }

    /// Succeeds when there is no validator or when it accepts `value`.
    pub fn validate(&self, value: &VariableValue, scope: ScopeRef<'_>) -> Result<(), VariableError> {
        let Some(validator) = &self.validator else {
            return Ok(());
        };
        validator
            .check(value, self, scope)
            .map_err(|message| VariableError::Validation {
                name: self.name.clone(),
                value: value.to_string(),
                message,
            })
    }

    /// Combines two declarations of the same name; `other` wins field by field
    /// whenever it provides a value. Its transform pipeline replaces this one
    /// as a whole, even when empty.
    pub fn merge(&self, other: &Self) -> Self {
        let mut options = self.options.clone();
        for option in &other.options {
            if !options.contains(option) {
                options.push(option.clone());
            }
        }

        Self {
            name: other.name.clone(),
            default_value: other
                .default_value
                .clone()
                .or_else(|| self.default_value.clone()),
            ui: UiDescriptor {
                kind: other.ui.kind.or(self.ui.kind),
                message: other.ui.message.clone().or_else(|| self.ui.message.clone()),
                hidden: other.ui.hidden.or(self.ui.hidden),
                index: other.ui.index.or(self.ui.index),
            },
            options,
            readonly: other.readonly.or(self.readonly),
            overridable: other.overridable.or(self.overridable),
            reactive: other.reactive.or(self.reactive),
            multiple: other.multiple.or(self.multiple),
            transforms: other.transforms.clone(),
            validator: other.validator.clone().or_else(|| self.validator.clone()),
        }
    }
}
