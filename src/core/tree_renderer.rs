// src/core/tree_renderer.rs

use crate::core::builtins::{RootScopeDefaults, create_root_scope};
use crate::core::scope::{ScopeError, ScopeId, ScopeTree};
use crate::core::template::{CollectedBranch, Template, TemplateError};
use crate::core::template_engine::TemplateEngine;
use crate::core::variable::TemplateVariable;
use crate::models::VariableValue;
use log::{debug, info};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("Template '{0}' not found. Did you collect variables first?")]
    UnknownTemplate(String),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Scope(#[from] ScopeError),
}

/// Output path mapped to rendered content.
pub type RenderOutput = BTreeMap<String, String>;

/// Drives a render over a list of root templates: one root scope per root
/// template, then the template's own tree below it.
#[derive(Debug)]
pub struct TemplateTreeRenderer {
    templates: Vec<Arc<Template>>,
    engine: TemplateEngine,
    root_defaults: RootScopeDefaults,
    scopes: ScopeTree,
    branches: HashMap<String, CollectedBranch>,
}

impl TemplateTreeRenderer {
    pub fn new(
        templates: Vec<Arc<Template>>,
        engine: TemplateEngine,
        root_defaults: RootScopeDefaults,
    ) -> Self {
        Self {
            templates,
            engine,
            root_defaults,
            scopes: ScopeTree::with_engine(engine),
            branches: HashMap::new(),
        }
    }

    pub fn templates(&self) -> &[Arc<Template>] {
        &self.templates
    }

    pub fn scopes(&self) -> &ScopeTree {
        &self.scopes
    }

    pub fn engine(&self) -> &TemplateEngine {
        &self.engine
    }

    /// Builds fresh scopes for every root template. Calling it again starts over.
    pub fn collect_variables(&mut self) -> Result<(), RenderError> {
        self.scopes.clear();
        self.branches.clear();

        for template in &self.templates {
            let root = create_root_scope(&mut self.scopes, &self.root_defaults)?;
            let child = template.collect_variables(&self.engine, &mut self.scopes, Some(root))?;
            self.branches.insert(
                template.id().to_string(),
                CollectedBranch {
                    template: Arc::clone(template),
                    scope: root,
                    children: vec![child],
                },
            );
        }
        debug!("Collected variables for {} template(s)", self.branches.len());
        Ok(())
    }

    /// The collected branch of the root template `template_id`.
    pub fn get_branch_for_template_id(
        &self,
        template_id: &str,
    ) -> Result<&CollectedBranch, RenderError> {
        self.branches
            .get(template_id)
            .ok_or_else(|| RenderError::UnknownTemplate(template_id.to_string()))
    }

    /// Every declaration of the branch, one per name, shallowest first.
    pub fn branch_variables(&self, template_id: &str) -> Result<Vec<TemplateVariable>, RenderError> {
        let branch = self.get_branch_for_template_id(template_id)?;
        Ok(self.scopes.collect_all_branch_variables(branch.scope))
    }

    /// The current value of `name` as the branch sees it from the top.
    pub fn branch_value(&self, template_id: &str, name: &str) -> Result<Option<VariableValue>, RenderError> {
        let branch = self.get_branch_for_template_id(template_id)?;
        Ok(self
            .scopes
            .collect_all_branch_variables_values(branch.scope)
            .get(name)
            .cloned()
            .flatten())
    }

    /// Assigns one answer to every first-declaring scope of the branch.
    pub fn set_branch_value(
        &mut self,
        template_id: &str,
        name: &str,
        value: VariableValue,
    ) -> Result<(), RenderError> {
        let scope = self.get_branch_for_template_id(template_id)?.scope;
        self.scopes.set_variable_value_from_top(scope, name, value)?;
        Ok(())
    }

    /// Assigns many answers, in iteration order.
    pub fn assign_answers<I>(&mut self, template_id: &str, answers: I) -> Result<(), RenderError>
    where
        I: IntoIterator<Item = (String, VariableValue)>,
    {
        let scope = self.get_branch_for_template_id(template_id)?.scope;
        self.scopes.assign_values_object_from_top(scope, answers)?;
        Ok(())
    }

    /// Renders the whole branch of `template_id`.
    ///
    /// Root scopes only hold builtins and render nothing. When two templates
    /// produce the same output path, the one visited last wins.
    pub fn render(&self, template_id: &str) -> Result<RenderOutput, RenderError> {
        let branch = self.get_branch_for_template_id(template_id)?;
        let mut output = RenderOutput::new();
        self.render_branch(branch, &mut output)?;
        info!(
            "Rendered {} file(s) for template '{}'",
            output.len(),
            template_id
        );
        Ok(output)
    }

    fn render_branch(
        &self,
        branch: &CollectedBranch,
        output: &mut RenderOutput,
    ) -> Result<(), RenderError> {
        if !self.scopes.is_root(branch.scope) {
            output.extend(
                branch
                    .template
                    .render(&self.engine, &self.scopes, branch.scope)?,
            );
        }
        for child in &branch.children {
            self.render_branch(child, output)?;
        }
        Ok(())
    }

    /// The scope of the template's own variables (the child of its root scope).
    pub fn template_scope(&self, template_id: &str) -> Result<ScopeId, RenderError> {
        let branch = self.get_branch_for_template_id(template_id)?;
        Ok(branch
            .children
            .first()
            .map_or(branch.scope, |child| child.scope))
    }
}
