// src/cli/prompter.rs

//! Interactive questions: which template to render and the value of each
//! visible variable.
//!
//! The [`Prompter`] trait is the seam between the render flow and the
//! terminal; [`DialoguerPrompter`] is the real implementation.

use crate::core::template::Template;
use crate::core::tree_renderer::{RenderError, TemplateTreeRenderer};
use crate::core::variable::{TemplateVariable, UiOption};
use crate::models::{UiKind, VariableValue};
use colored::Colorize;
use dialoguer::{Confirm, Input, MultiSelect, Password, Select, theme::ColorfulTheme};
use log::debug;
use std::collections::{BTreeMap, HashSet};
use std::io::ErrorKind;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PromptError {
    #[error("Operation cancelled by the user.")]
    Interrupted,

    #[error("Prompt failed: {0}")]
    Terminal(dialoguer::Error),

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl From<dialoguer::Error> for PromptError {
    fn from(e: dialoguer::Error) -> Self {
        match e {
            dialoguer::Error::IO(io) if io.kind() == ErrorKind::Interrupted => Self::Interrupted,
            other => Self::Terminal(other),
        }
    }
}

/// One question about one variable.
#[derive(Debug, Clone)]
pub struct PromptRequest {
    pub name: String,
    pub kind: UiKind,
    pub message: String,
    pub default: Option<VariableValue>,
    pub options: Vec<UiOption>,
    pub multiple: bool,
}

impl PromptRequest {
    pub fn for_variable(variable: &TemplateVariable, current: Option<VariableValue>) -> Self {
        Self {
            name: variable.name().to_string(),
            kind: variable.ui_kind(),
            message: variable.ui_message(),
            default: current.or_else(|| variable.default_value().cloned()),
            options: variable.options().to_vec(),
            multiple: variable.is_multiple(),
        }
    }
}

/// Checks a candidate answer; the error text is shown before asking again.
pub type AnswerCheck<'a> = dyn Fn(&VariableValue) -> Result<(), String> + 'a;

pub trait Prompter {
    /// Asks for one of `choices`, given as `(id, label)` pairs, and returns its id.
    fn select_template(&mut self, choices: &[(String, String)]) -> Result<String, PromptError>;

    /// Asks until `check` accepts the answer.
    fn prompt(
        &mut self,
        request: &PromptRequest,
        check: &AnswerCheck<'_>,
    ) -> Result<VariableValue, PromptError>;
}

// --- TERMINAL PROMPTER ---

/// Asks on the terminal with `dialoguer`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DialoguerPrompter;

impl DialoguerPrompter {
    pub fn new() -> Self {
        Self
    }

    fn ask_text(
        &self,
        request: &PromptRequest,
        check: &AnswerCheck<'_>,
    ) -> Result<VariableValue, PromptError> {
        let theme = ColorfulTheme::default();
        let mut input = Input::<String>::with_theme(&theme)
            .with_prompt(&request.message)
            .allow_empty(true)
            .validate_with(|text: &String| check(&VariableValue::Text(text.clone())));
        if let Some(default) = &request.default {
            input = input.default(default.to_string());
        }
        Ok(VariableValue::Text(input.interact_text()?))
    }

    fn ask_number(
        &self,
        request: &PromptRequest,
        check: &AnswerCheck<'_>,
    ) -> Result<VariableValue, PromptError> {
        let theme = ColorfulTheme::default();
        let mut input = Input::<String>::with_theme(&theme)
            .with_prompt(&request.message)
            .validate_with(|text: &String| match text.trim().parse::<f64>() {
                Ok(n) => check(&VariableValue::Number(n)),
                Err(_) => Err(format!(t!("prompt.error.not_a_number"), value = text)),
            });
        if let Some(default) = &request.default {
            input = input.default(default.to_string());
        }
        let text = input.interact_text()?;
        Ok(text
            .trim()
            .parse::<f64>()
            .map(VariableValue::Number)
            .unwrap_or(VariableValue::Text(text)))
    }

    fn ask_password(
        &self,
        request: &PromptRequest,
        check: &AnswerCheck<'_>,
    ) -> Result<VariableValue, PromptError> {
        let theme = ColorfulTheme::default();
        let secret = Password::with_theme(&theme)
            .with_prompt(&request.message)
            .allow_empty_password(true)
            .validate_with(|text: &String| check(&VariableValue::Text(text.clone())))
            .interact()?;
        Ok(VariableValue::Text(secret))
    }

    fn ask_confirm(&self, request: &PromptRequest) -> Result<VariableValue, PromptError> {
        let theme = ColorfulTheme::default();
        let default = request
            .default
            .as_ref()
            .is_some_and(|v| matches!(v, VariableValue::Bool(true)) || v.to_string() == "true");
        let answer = Confirm::with_theme(&theme)
            .with_prompt(&request.message)
            .default(default)
            .interact()?;
        Ok(VariableValue::Bool(answer))
    }

    fn ask_select(&self, request: &PromptRequest) -> Result<VariableValue, PromptError> {
        let theme = ColorfulTheme::default();
        let labels: Vec<&str> = request.options.iter().map(|o| o.label.as_str()).collect();
        let current = request.default.as_ref().map(ToString::to_string);
        let default = request
            .options
            .iter()
            .position(|o| Some(o.value.to_string()) == current)
            .unwrap_or(0);
        let index = Select::with_theme(&theme)
            .with_prompt(&request.message)
            .items(&labels)
            .default(default)
            .interact()?;
        Ok(request
            .options
            .get(index)
            .map_or_else(|| VariableValue::Text(String::new()), |o| o.value.clone()))
    }

    fn ask_multi_select(&self, request: &PromptRequest) -> Result<VariableValue, PromptError> {
        let theme = ColorfulTheme::default();
        let labels: Vec<&str> = request.options.iter().map(|o| o.label.as_str()).collect();
        let selected: HashSet<String> = match &request.default {
            Some(VariableValue::List(items)) => items.iter().cloned().collect(),
            Some(other) => other.to_string().split(',').map(str::to_string).collect(),
            None => HashSet::new(),
        };
        let checked: Vec<bool> = request
            .options
            .iter()
            .map(|o| selected.contains(&o.value.to_string()))
            .collect();
        let indexes = MultiSelect::with_theme(&theme)
            .with_prompt(&request.message)
            .items(&labels)
            .defaults(&checked)
            .interact()?;
        Ok(VariableValue::List(
            indexes
                .into_iter()
                .filter_map(|i| request.options.get(i))
                .map(|o| o.value.to_string())
                .collect(),
        ))
    }
}

impl Prompter for DialoguerPrompter {
    fn select_template(&mut self, choices: &[(String, String)]) -> Result<String, PromptError> {
        let theme = ColorfulTheme::default();
        let labels: Vec<&str> = choices.iter().map(|(_, label)| label.as_str()).collect();
        let index = Select::with_theme(&theme)
            .with_prompt(t!("prompt.select_template"))
            .items(&labels)
            .default(0)
            .interact()?;
        Ok(choices
            .get(index)
            .map(|(id, _)| id.clone())
            .unwrap_or_default())
    }

    fn prompt(
        &mut self,
        request: &PromptRequest,
        check: &AnswerCheck<'_>,
    ) -> Result<VariableValue, PromptError> {
        let has_options = !request.options.is_empty();
        match request.kind {
            UiKind::Input => self.ask_text(request, check),
            UiKind::Number => self.ask_number(request, check),
            UiKind::Password => self.ask_password(request, check),
            // Choices have no inline validation; a rejected answer asks again.
            UiKind::Confirm | UiKind::List | UiKind::Checkbox => loop {
                let answer = match request.kind {
                    UiKind::Confirm => self.ask_confirm(request)?,
                    UiKind::Checkbox if has_options => self.ask_multi_select(request)?,
                    UiKind::List if has_options && request.multiple => {
                        self.ask_multi_select(request)?
                    }
                    UiKind::List if has_options => self.ask_select(request)?,
                    _ => return self.ask_text(request, check),
                };
                match check(&answer) {
                    Ok(()) => return Ok(answer),
                    Err(message) => eprintln!("{}", message.red()),
                }
            },
        }
    }
}

// --- FLOWS ---

/// The id of the template to render: the only one, or the user's choice.
pub fn run_template_selection_ui(
    prompter: &mut dyn Prompter,
    templates: &[Arc<Template>],
) -> Result<String, PromptError> {
    if let [only] = templates {
        return Ok(only.id().to_string());
    }
    let choices: Vec<(String, String)> = templates
        .iter()
        .map(|t| (t.id().to_string(), t.display_name().to_string()))
        .collect();
    prompter.select_template(&choices)
}

/// Whether the variable UI asks for `variable`.
///
/// Hidden, readonly and already answered variables are skipped, as are
/// derived variables that cannot be overridden.
pub fn should_prompt(
    renderer: &TemplateTreeRenderer,
    variable: &TemplateVariable,
    answered: &HashSet<String>,
) -> bool {
    !variable.is_hidden()
        && !variable.is_readonly()
        && !answered.contains(variable.name())
        && (variable.is_overridable() || !variable.is_derived(renderer.engine()))
}

/// Asks for every visible variable of `template_id`, in UI index order, and
/// writes each answer into the scope tree before the next question, so
/// defaults of later questions show recomputed values.
///
/// Returns the answers given.
pub fn run_variables_ui(
    prompter: &mut dyn Prompter,
    renderer: &mut TemplateTreeRenderer,
    template_id: &str,
    answered: &HashSet<String>,
) -> Result<BTreeMap<String, VariableValue>, PromptError> {
    let mut variables: Vec<TemplateVariable> = renderer
        .branch_variables(template_id)?
        .into_iter()
        .filter(|v| should_prompt(renderer, v, answered))
        .collect();
    variables.sort_by_key(TemplateVariable::ui_index);
    debug!(
        "Prompting {} variable(s) of template '{}'",
        variables.len(),
        template_id
    );

    let mut answers = BTreeMap::new();
    for variable in &variables {
        let current = renderer.branch_value(template_id, variable.name())?;
        let request = PromptRequest::for_variable(variable, current);

        let scope = renderer.template_scope(template_id)?;
        let view = renderer.scopes().scope(scope);
        let check = |value: &VariableValue| variable.validate(value, view).map_err(|e| e.to_string());
        let answer = prompter.prompt(&request, &check)?;

        renderer.set_branch_value(template_id, variable.name(), answer.clone())?;
        answers.insert(variable.name().to_string(), answer);
    }
    Ok(answers)
}
