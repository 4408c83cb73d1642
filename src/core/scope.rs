// src/core/scope.rs

//! Hierarchical variable scopes with reactive derived values.
//!
//! All scopes of a render live in one [`ScopeTree`] arena and are addressed by
//! [`ScopeId`]. A tree may hold several roots (one per root template).
//!
//! A variable whose default text contains placeholders is *derived*. Each of
//! its placeholders becomes a dependency edge bound to the cell (scope, name)
//! of the nearest scope declaring that name, looking from the dependent's scope
//! up to the root. Edges whose name is not declared yet stay pending and get
//! bound when a matching declaration appears. When a cell's value changes,
//! every derived variable bound to it is recomputed, and so on down the chain.

use crate::constants::MAX_PROPAGATION_DEPTH;
use crate::core::template_engine::{EngineError, TemplateEngine, ValueSource};
use crate::core::variable::{TemplateVariable, VariableError};
use crate::models::VariableValue;
use log::{debug, trace};
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScopeError {
    #[error("Variable \"{name}\" is already registered in this scope.")]
    DuplicateVariable { name: String },

    #[error("Attempt to access unregistered variable \"{name}\" in the current branch.")]
    UnknownVariable { name: String },

    #[error("Attempt to set a value for readonly variable \"{name}\".")]
    ReadonlyVariable { name: String },

    #[error("Variable \"{name}\" is derived from other variables and cannot be overridden.")]
    NotOverridable { name: String },

    #[error("Circular reference detected in the default value of variable \"{name}\": {cycle}")]
    CircularDependency { name: String, cycle: String },

    #[error(
        "Maximum propagation depth ({max_depth}) exceeded while recomputing \"{name}\". Check for circular references."
    )]
    MaxRecursionDepth { max_depth: u32, name: String },

    #[error("Scope {0:?} does not belong to this scope tree.")]
    UnknownScope(ScopeId),

    #[error(transparent)]
    Variable(#[from] VariableError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Handle of a scope inside its [`ScopeTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(usize);

/// A placeholder of a derived variable and the scope it is bound to.
#[derive(Debug, Clone)]
struct Dependency {
    name: String,
    /// `None` while no scope on the path to the root declares `name`.
    source: Option<ScopeId>,
}

#[derive(Debug, Clone)]
struct DerivedBinding {
    template: String,
    dependencies: Vec<Dependency>,
}

#[derive(Debug, Default)]
struct ScopeNode {
    parent: Option<ScopeId>,
    children: Vec<ScopeId>,
    depth: usize,
    declarations: Vec<TemplateVariable>,
    positions: HashMap<String, usize>,
    values: HashMap<String, VariableValue>,
    defaults: HashMap<String, VariableValue>,
    derived: BTreeMap<String, DerivedBinding>,
}

impl ScopeNode {
    fn declaration(&self, name: &str) -> Option<&TemplateVariable> {
        self.positions
            .get(name)
            .and_then(|&pos| self.declarations.get(pos))
    }
}

/// Arena holding every scope of a render.
#[derive(Debug, Default)]
pub struct ScopeTree {
    nodes: Vec<ScopeNode>,
    engine: TemplateEngine,
}

// --- PUBLIC API: STRUCTURE ---

impl ScopeTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_engine(engine: TemplateEngine) -> Self {
        Self {
            nodes: Vec::new(),
            engine,
        }
    }

    /// Drops every scope. Previously issued ids become invalid.
    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Creates a new scope with no parent.
    pub fn create_root(&mut self) -> ScopeId {
        let id = ScopeId(self.nodes.len());
        self.nodes.push(ScopeNode::default());
        id
    }

    /// Creates a new, empty scope whose parent is `parent`.
    pub fn spawn_child(&mut self, parent: ScopeId) -> Result<ScopeId, ScopeError> {
        let depth = self.node(parent)?.depth + 1;
        let id = ScopeId(self.nodes.len());
        self.nodes.push(ScopeNode {
            parent: Some(parent),
            depth,
            ..Default::default()
        });
        self.node_mut(parent)?.children.push(id);
        Ok(id)
    }

    /// A read-only view of one scope.
    pub fn scope(&self, id: ScopeId) -> ScopeRef<'_> {
        ScopeRef { tree: self, id }
    }

    pub fn parent(&self, id: ScopeId) -> Option<ScopeId> {
        self.nodes.get(id.0).and_then(|node| node.parent)
    }

    pub fn children(&self, id: ScopeId) -> &[ScopeId] {
        self.nodes
            .get(id.0)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
    }

    pub fn is_root(&self, id: ScopeId) -> bool {
        self.parent(id).is_none()
    }

    pub fn root_of(&self, id: ScopeId) -> ScopeId {
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    // --- PRIVATE HELPERS ---

    fn node(&self, id: ScopeId) -> Result<&ScopeNode, ScopeError> {
        self.nodes.get(id.0).ok_or(ScopeError::UnknownScope(id))
    }

    fn node_mut(&mut self, id: ScopeId) -> Result<&mut ScopeNode, ScopeError> {
        self.nodes.get_mut(id.0).ok_or(ScopeError::UnknownScope(id))
    }

    fn depth(&self, id: ScopeId) -> usize {
        self.nodes.get(id.0).map_or(0, |node| node.depth)
    }

    /// `id` followed by its ancestors, nearest first.
    fn ancestry(&self, id: ScopeId) -> impl Iterator<Item = ScopeId> + '_ {
        std::iter::successors(Some(id), move |current| self.parent(*current))
    }

    /// `id` and every scope below it, in pre-order.
    fn subtree(&self, id: ScopeId) -> Vec<ScopeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    fn declaration(&self, id: ScopeId, name: &str) -> Result<&TemplateVariable, ScopeError> {
        self.node(id)?
            .declaration(name)
            .ok_or_else(|| ScopeError::UnknownVariable {
                name: name.to_string(),
            })
    }
}

// --- PUBLIC API: LOOKUPS ---

impl ScopeTree {
    /// Whether `name` is declared in this very scope.
    pub fn has_variable(&self, id: ScopeId, name: &str) -> bool {
        self.nodes
            .get(id.0)
            .is_some_and(|node| node.positions.contains_key(name))
    }

    /// The value of `name`, looking up the ancestors when this scope has none.
    pub fn get_variable_value(&self, id: ScopeId, name: &str) -> Option<&VariableValue> {
        self.get_variable_value_with(id, name, true)
    }

    /// The value of `name`. Without fallback only this scope is consulted.
    pub fn get_variable_value_with(
        &self,
        id: ScopeId,
        name: &str,
        with_fallback: bool,
    ) -> Option<&VariableValue> {
        if !with_fallback {
            return self.nodes.get(id.0).and_then(|node| node.values.get(name));
        }
        self.ancestry(id)
            .find_map(|scope| self.nodes.get(scope.0).and_then(|node| node.values.get(name)))
    }

    /// The declaration of `name` in the nearest scope declaring it, this one included.
    pub fn get_variable(&self, id: ScopeId, name: &str) -> Result<&TemplateVariable, ScopeError> {
        let owner = self
            .find_first_scope_from_bottom_with_variable(id, name)
            .ok_or_else(|| ScopeError::UnknownVariable {
                name: name.to_string(),
            })?;
        self.declaration(owner, name)
    }

    /// The declaration of `name` in this scope or, failing that, in the first
    /// scope declaring it found from the root downwards.
    pub fn get_variable_from_top(
        &self,
        id: ScopeId,
        name: &str,
    ) -> Result<&TemplateVariable, ScopeError> {
        if self.has_variable(id, name) {
            return self.declaration(id, name);
        }
        let owner = self
            .find_first_scopes_from_top_with_variable(id, name)
            .into_iter()
            .next()
            .ok_or_else(|| ScopeError::UnknownVariable {
                name: name.to_string(),
            })?;
        self.declaration(owner, name)
    }

    /// The declared default of `name` in this scope, before any transform.
    pub fn get_default_value(&self, id: ScopeId, name: &str) -> Option<&VariableValue> {
        self.nodes.get(id.0).and_then(|node| node.defaults.get(name))
    }

    /// Declarations of this scope only, in registration order.
    pub fn own_variables(&self, id: ScopeId) -> &[TemplateVariable] {
        self.nodes
            .get(id.0)
            .map(|node| node.declarations.as_slice())
            .unwrap_or_default()
    }

    /// From the root of `id`, descends every branch and stops at the first
    /// scope declaring `name`. Results are in pre-order.
    pub fn find_first_scopes_from_top_with_variable(
        &self,
        id: ScopeId,
        name: &str,
    ) -> Vec<ScopeId> {
        let mut found = Vec::new();
        let mut stack = vec![self.root_of(id)];
        while let Some(current) = stack.pop() {
            if self.has_variable(current, name) {
                found.push(current);
            } else {
                stack.extend(self.children(current).iter().rev().copied());
            }
        }
        found
    }

    /// The nearest scope declaring `name`, walking from `id` up to the root.
    pub fn find_first_scope_from_bottom_with_variable(
        &self,
        id: ScopeId,
        name: &str,
    ) -> Option<ScopeId> {
        self.ancestry(id).find(|scope| self.has_variable(*scope, name))
    }

    /// The nearest scope, walking up, whose own value of `name` is defined.
    pub fn find_first_scope_from_bottom_with_non_nullable_variable_value(
        &self,
        id: ScopeId,
        name: &str,
    ) -> Option<ScopeId> {
        self.ancestry(id).find(|scope| {
            self.nodes
                .get(scope.0)
                .is_some_and(|node| node.values.contains_key(name))
        })
    }

    /// Values of every variable declared in this subtree.
    ///
    /// A name declared in a scope shadows the same name declared below it.
    /// Between sibling subtrees, the later sibling wins.
    pub fn collect_all_branch_variables_values(
        &self,
        id: ScopeId,
    ) -> BTreeMap<String, Option<VariableValue>> {
        let Some(node) = self.nodes.get(id.0) else {
            return BTreeMap::new();
        };

        let mut result: BTreeMap<String, Option<VariableValue>> = node
            .declarations
            .iter()
            .map(|v| (v.name().to_string(), node.values.get(v.name()).cloned()))
            .collect();

        for child in &node.children {
            for (name, value) in self.collect_all_branch_variables_values(*child) {
                if !node.positions.contains_key(&name) {
                    result.insert(name, value);
                }
            }
        }
        result
    }

    /// Declarations of every variable in this subtree, one per name.
    ///
    /// Scopes are walked depth first in pre-order, so a scope is visited before
    /// its descendants and a whole branch before its later siblings. The first
    /// declaration of a name met on that walk is kept.
    pub fn collect_all_branch_variables(&self, id: ScopeId) -> Vec<TemplateVariable> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut out = Vec::new();

        for current in self.subtree(id) {
            let Some(node) = self.nodes.get(current.0) else {
                continue;
            };
            for variable in &node.declarations {
                if seen.insert(variable.name()) {
                    out.push(variable.clone());
                }
            }
        }
        out
    }
}

// --- PUBLIC API: MUTATIONS ---

impl ScopeTree {
    /// Declares `variable` in scope `id`.
    ///
    /// The default becomes the initial value. A derived default is bound to
    /// its dependencies and, when they all have a value already, computed
    /// right away. Dependents waiting for this name below `id` are rebound to
    /// it and refreshed.
    pub fn register_variable(
        &mut self,
        id: ScopeId,
        variable: TemplateVariable,
    ) -> Result<(), ScopeError> {
        let name = variable.name().to_string();
        if self.node(id)?.positions.contains_key(&name) {
            return Err(ScopeError::DuplicateVariable { name });
        }

        let dependency_names = variable.get_dependencies(&self.engine);
        if dependency_names.iter().any(|dep| *dep == name) {
            return Err(ScopeError::CircularDependency {
                cycle: format!("{name} -> {name}"),
                name,
            });
        }

        let dependencies: Vec<Dependency> = dependency_names
            .iter()
            .map(|dep| Dependency {
                name: dep.clone(),
                source: self.find_first_scope_from_bottom_with_variable(id, dep),
            })
            .collect();
        let rebinds = self.pending_rebinds(id, &name);
        self.check_for_cycle(&name, &dependencies, &rebinds)?;

        trace!("Registering '{}' in scope {:?}", name, id);
        let default_value = variable.default_value().cloned();
        let template = match &default_value {
            Some(VariableValue::Text(text)) if !dependencies.is_empty() => Some(text.clone()),
            _ => None,
        };

        {
            let node = self.node_mut(id)?;
            node.positions.insert(name.clone(), node.declarations.len());
            node.declarations.push(variable);
            if let Some(value) = default_value {
                node.defaults.insert(name.clone(), value.clone());
                node.values.insert(name.clone(), value);
            }
            if let Some(template) = template {
                node.derived.insert(
                    name.clone(),
                    DerivedBinding {
                        template,
                        dependencies,
                    },
                );
            }
        }

        for (scope, dependent, position) in &rebinds {
            if let Some(dep) = self
                .node_mut(*scope)?
                .derived
                .get_mut(dependent)
                .and_then(|binding| binding.dependencies.get_mut(*position))
            {
                dep.source = Some(id);
            }
        }

        if self.dependencies_ready(id, &name) {
            self.recompute(id, &name, 0)
        } else {
            self.propagate(id, &name, 0)
        }
    }

    /// Registers several variables; non-derived ones go first so that derived
    /// ones find their dependencies already declared.
    pub fn bulk_register_variables(
        &mut self,
        id: ScopeId,
        variables: Vec<TemplateVariable>,
    ) -> Result<(), ScopeError> {
        let (derived, plain): (Vec<_>, Vec<_>) = variables
            .into_iter()
            .partition(|variable| variable.is_derived(&self.engine));
        for variable in plain.into_iter().chain(derived) {
            self.register_variable(id, variable)?;
        }
        Ok(())
    }

    /// Sets `name` on the nearest scope declaring it, after validating and
    /// transforming `value`. Dependents are recomputed.
    pub fn set_variable_value(
        &mut self,
        id: ScopeId,
        name: &str,
        value: VariableValue,
    ) -> Result<(), ScopeError> {
        let owner = self
            .find_first_scope_from_bottom_with_variable(id, name)
            .ok_or_else(|| ScopeError::UnknownVariable {
                name: name.to_string(),
            })?;

        let transformed = {
            let variable = self.declaration(owner, name)?;
            if variable.is_readonly() {
                return Err(ScopeError::ReadonlyVariable {
                    name: name.to_string(),
                });
            }
            if !variable.is_overridable() && variable.is_derived(&self.engine) {
                return Err(ScopeError::NotOverridable {
                    name: name.to_string(),
                });
            }
            let view = self.scope(id);
            variable.validate(&value, view)?;
            variable.transform_value(value, view)?
        };

        debug!("Setting '{}' = '{}' in scope {:?}", name, transformed, owner);
        self.node_mut(owner)?
            .values
            .insert(name.to_string(), transformed);
        self.propagate(owner, name, 0)
    }

    /// Sets `name` on the first declaring scope of every branch, starting
    /// from the root of `id`.
    pub fn set_variable_value_from_top(
        &mut self,
        id: ScopeId,
        name: &str,
        value: VariableValue,
    ) -> Result<(), ScopeError> {
        let owners = self.find_first_scopes_from_top_with_variable(id, name);
        if owners.is_empty() {
            return Err(ScopeError::UnknownVariable {
                name: name.to_string(),
            });
        }
        for owner in owners {
            self.set_variable_value(owner, name, value.clone())?;
        }
        Ok(())
    }

    /// `set_variable_value` for every pair, in iteration order.
    pub fn assign_values_from_object<I>(&mut self, id: ScopeId, values: I) -> Result<(), ScopeError>
    where
        I: IntoIterator<Item = (String, VariableValue)>,
    {
        for (name, value) in values {
            self.set_variable_value(id, &name, value)?;
        }
        Ok(())
    }

    /// `set_variable_value_from_top` for every pair, in iteration order.
    pub fn assign_values_object_from_top<I>(
        &mut self,
        id: ScopeId,
        values: I,
    ) -> Result<(), ScopeError>
    where
        I: IntoIterator<Item = (String, VariableValue)>,
    {
        for (name, value) in values {
            self.set_variable_value_from_top(id, &name, value)?;
        }
        Ok(())
    }
}

// --- REACTIVE GRAPH ---

impl ScopeTree {
    /// Dependency edges below `id` that a new declaration of `name` in `id`
    /// would capture: pending ones, and ones bound further up than `id`.
    fn pending_rebinds(&self, id: ScopeId, name: &str) -> Vec<(ScopeId, String, usize)> {
        let depth = self.depth(id);
        let mut out = Vec::new();
        for scope in self.subtree(id) {
            let Some(node) = self.nodes.get(scope.0) else {
                continue;
            };
            for (dependent, binding) in &node.derived {
                for (position, dep) in binding.dependencies.iter().enumerate() {
                    let captured = dep.name == name
                        && dep.source.is_none_or(|source| self.depth(source) < depth);
                    if captured {
                        out.push((scope, dependent.clone(), position));
                    }
                }
            }
        }
        out
    }

    /// Rejects a registration that would close a loop of derived variables.
    ///
    /// Any new loop has to go through the new cell, so it is enough to walk
    /// the existing edges from its dependencies and look for a cell that
    /// would be rebound to it.
    fn check_for_cycle(
        &self,
        name: &str,
        dependencies: &[Dependency],
        rebinds: &[(ScopeId, String, usize)],
    ) -> Result<(), ScopeError> {
        let closing: HashSet<(ScopeId, &str)> = rebinds
            .iter()
            .map(|(scope, dependent, _)| (*scope, dependent.as_str()))
            .collect();
        if closing.is_empty() {
            return Ok(());
        }

        let mut stack: Vec<(ScopeId, String, Vec<String>)> = dependencies
            .iter()
            .filter_map(|dep| {
                dep.source
                    .map(|source| (source, dep.name.clone(), vec![name.to_string()]))
            })
            .collect();
        let mut visited: HashSet<(ScopeId, String)> = HashSet::new();

        while let Some((scope, current, mut path)) = stack.pop() {
            path.push(current.clone());
            if closing.contains(&(scope, current.as_str())) {
                path.push(name.to_string());
                return Err(ScopeError::CircularDependency {
                    name: name.to_string(),
                    cycle: path.join(" -> "),
                });
            }
            if !visited.insert((scope, current.clone())) {
                continue;
            }
            let Some(binding) = self
                .nodes
                .get(scope.0)
                .and_then(|node| node.derived.get(&current))
            else {
                continue;
            };
            for dep in &binding.dependencies {
                if let Some(source) = dep.source {
                    stack.push((source, dep.name.clone(), path.clone()));
                }
            }
        }
        Ok(())
    }

    /// A derived variable is ready when each of its dependencies is bound and
    /// resolves to a value. Until then it keeps its previous value.
    fn dependencies_ready(&self, id: ScopeId, name: &str) -> bool {
        let Some(binding) = self.nodes.get(id.0).and_then(|node| node.derived.get(name)) else {
            return false;
        };
        binding.dependencies.iter().all(|dep| {
            dep.source
                .is_some_and(|source| self.get_variable_value(source, &dep.name).is_some())
        })
    }

    /// Recomputes every derived variable bound to the cell (`id`, `name`).
    fn propagate(&mut self, id: ScopeId, name: &str, depth: u32) -> Result<(), ScopeError> {
        let reactive = self
            .declaration(id, name)
            .map_or(true, TemplateVariable::is_reactive);
        let source_depth = self.depth(id);

        let mut targets = Vec::new();
        for scope in self.subtree(id) {
            let Some(node) = self.nodes.get(scope.0) else {
                continue;
            };
            if !reactive && node.depth > source_depth + 1 {
                continue;
            }
            for (dependent, binding) in &node.derived {
                let bound = binding
                    .dependencies
                    .iter()
                    .any(|dep| dep.name == name && dep.source == Some(id));
                if bound {
                    targets.push((scope, dependent.clone()));
                }
            }
        }

        for (scope, dependent) in targets {
            self.recompute(scope, &dependent, depth + 1)?;
        }
        Ok(())
    }

    /// Renders the default of a derived variable against its own scope, then
    /// validates, transforms and stores the result exactly like an explicit set.
    fn recompute(&mut self, id: ScopeId, name: &str, depth: u32) -> Result<(), ScopeError> {
        if depth > MAX_PROPAGATION_DEPTH {
            return Err(ScopeError::MaxRecursionDepth {
                max_depth: MAX_PROPAGATION_DEPTH,
                name: name.to_string(),
            });
        }

        if !self.dependencies_ready(id, name) {
            return Ok(());
        }

        let value = {
            let node = self.node(id)?;
            let Some(binding) = node.derived.get(name) else {
                return Ok(());
            };
            let view = self.scope(id);
            let raw = self.engine.render_template(&binding.template, &view, false)?;
            let variable = self.declaration(id, name)?;
            let raw = VariableValue::Text(raw);
            variable.validate(&raw, view)?;
            variable.transform_value(raw, view)?
        };

        trace!("Recomputed '{}' = '{}' in scope {:?}", name, value, id);
        self.node_mut(id)?.values.insert(name.to_string(), value);
        self.propagate(id, name, depth)
    }
}

// --- READ-ONLY VIEW ---

/// A borrowed view of one scope, handed to transforms, validators and renders.
#[derive(Debug, Clone, Copy)]
pub struct ScopeRef<'a> {
    tree: &'a ScopeTree,
    id: ScopeId,
}

impl<'a> ScopeRef<'a> {
    pub fn id(&self) -> ScopeId {
        self.id
    }

    pub fn tree(&self) -> &'a ScopeTree {
        self.tree
    }

    pub fn parent(&self) -> Option<ScopeRef<'a>> {
        self.tree.parent(self.id).map(|id| self.tree.scope(id))
    }

    pub fn is_root(&self) -> bool {
        self.tree.is_root(self.id)
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.tree.has_variable(self.id, name)
    }

    pub fn get_variable_value(&self, name: &str) -> Option<&'a VariableValue> {
        self.tree.get_variable_value(self.id, name)
    }

    pub fn get_variable(&self, name: &str) -> Result<&'a TemplateVariable, ScopeError> {
        self.tree.get_variable(self.id, name)
    }
}

impl ValueSource for ScopeRef<'_> {
    fn value_of(&self, name: &str) -> Option<VariableValue> {
        self.get_variable_value(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::variable::Validator;
    use crate::models::TransformSpec;

    fn text(value: &str) -> VariableValue {
        VariableValue::from(value)
    }

    fn value_of(tree: &ScopeTree, id: ScopeId, name: &str) -> Option<String> {
        tree.get_variable_value(id, name).map(ToString::to_string)
    }

    #[test]
    fn test_register_uses_default_as_initial_value() {
        let mut tree = ScopeTree::new();
        let root = tree.create_root();
        tree.register_variable(root, TemplateVariable::new("A").with_default("a"))
            .unwrap();
        tree.register_variable(root, TemplateVariable::new("B")).unwrap();

        assert_eq!(value_of(&tree, root, "A").as_deref(), Some("a"));
        assert!(tree.get_variable_value(root, "B").is_none());
        assert!(tree.has_variable(root, "B"));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut tree = ScopeTree::new();
        let root = tree.create_root();
        tree.register_variable(root, TemplateVariable::new("A")).unwrap();
        let err = tree
            .register_variable(root, TemplateVariable::new("A"))
            .unwrap_err();
        assert_eq!(
            err,
            ScopeError::DuplicateVariable {
                name: "A".to_string()
            }
        );
    }

    #[test]
    fn test_self_reference_is_rejected() {
        let mut tree = ScopeTree::new();
        let root = tree.create_root();
        let err = tree
            .register_variable(root, TemplateVariable::new("A").with_default("x$A$"))
            .unwrap_err();
        assert!(err.to_string().contains("Circular reference"));
        assert!(!tree.has_variable(root, "A"));
    }

    #[test]
    fn test_bulk_register_rejects_self_reference() {
        // --- Setup ---
        let mut tree = ScopeTree::new();
        let root = tree.create_root();

        // --- Execute ---
        let err = tree
            .bulk_register_variables(
                root,
                vec![
                    TemplateVariable::new("A").with_default("a"),
                    TemplateVariable::new("SELF").with_default("$SELF$"),
                ],
            )
            .unwrap_err();

        // --- Assert ---
        assert_eq!(
            err,
            ScopeError::CircularDependency {
                name: "SELF".to_string(),
                cycle: "SELF -> SELF".to_string(),
            }
        );
        assert!(!tree.has_variable(root, "SELF"));
        assert_eq!(value_of(&tree, root, "A").as_deref(), Some("a"));
    }

    #[test]
    fn test_indirect_cycle_is_rejected() {
        let mut tree = ScopeTree::new();
        let root = tree.create_root();
        tree.register_variable(root, TemplateVariable::new("A").with_default("$B$"))
            .unwrap();
        let err = tree
            .register_variable(root, TemplateVariable::new("B").with_default("$A$"))
            .unwrap_err();
        assert_eq!(
            err,
            ScopeError::CircularDependency {
                name: "B".to_string(),
                cycle: "B -> A -> B".to_string(),
            }
        );
    }

    #[test]
    fn test_child_shadows_parent_and_falls_back_otherwise() {
        let mut tree = ScopeTree::new();
        let root = tree.create_root();
        let child = tree.spawn_child(root).unwrap();
        tree.register_variable(root, TemplateVariable::new("A").with_default("root"))
            .unwrap();
        tree.register_variable(root, TemplateVariable::new("B").with_default("only-root"))
            .unwrap();
        tree.register_variable(child, TemplateVariable::new("A").with_default("child"))
            .unwrap();

        assert_eq!(value_of(&tree, child, "A").as_deref(), Some("child"));
        assert_eq!(value_of(&tree, child, "B").as_deref(), Some("only-root"));
        assert!(tree.get_variable_value_with(child, "B", false).is_none());
        assert!(tree.is_root(root));
        assert!(!tree.is_root(child));
    }

    #[test]
    fn test_set_value_targets_the_nearest_declaring_scope() {
        let mut tree = ScopeTree::new();
        let root = tree.create_root();
        let child = tree.spawn_child(root).unwrap();
        tree.register_variable(root, TemplateVariable::new("A")).unwrap();

        tree.set_variable_value(child, "A", text("from-child")).unwrap();

        assert_eq!(value_of(&tree, root, "A").as_deref(), Some("from-child"));
        assert!(tree.get_variable_value_with(child, "A", false).is_none());
    }

    #[test]
    fn test_set_unknown_variable_fails() {
        let mut tree = ScopeTree::new();
        let root = tree.create_root();
        let err = tree
            .set_variable_value(root, "NOPE", text("x"))
            .unwrap_err();
        assert_eq!(
            err,
            ScopeError::UnknownVariable {
                name: "NOPE".to_string()
            }
        );
    }

    #[test]
    fn test_readonly_rejects_external_writes() {
        let mut tree = ScopeTree::new();
        let root = tree.create_root();
        tree.register_variable(
            root,
            TemplateVariable::new("R").with_default("fixed").readonly(true),
        )
        .unwrap();

        let err = tree.set_variable_value(root, "R", text("x")).unwrap_err();
        assert!(matches!(err, ScopeError::ReadonlyVariable { .. }));
        assert_eq!(value_of(&tree, root, "R").as_deref(), Some("fixed"));
    }

    #[test]
    fn test_set_value_validates_then_transforms() {
        let mut tree = ScopeTree::new();
        let root = tree.create_root();
        tree.register_variable(
            root,
            TemplateVariable::new("NAME")
                .with_validator(Validator::NonEmpty)
                .pipe([TransformSpec::Uppercase]),
        )
        .unwrap();

        assert!(tree.set_variable_value(root, "NAME", text("")).is_err());
        tree.set_variable_value(root, "NAME", text("abc")).unwrap();
        assert_eq!(value_of(&tree, root, "NAME").as_deref(), Some("ABC"));
    }

    #[test]
    fn test_derived_value_follows_its_dependency() {
        let mut tree = ScopeTree::new();
        let root = tree.create_root();
        let child = tree.spawn_child(root).unwrap();
        tree.register_variable(root, TemplateVariable::new("A").with_default("a"))
            .unwrap();
        tree.register_variable(
            child,
            TemplateVariable::new("B").with_default("$A$-suffix"),
        )
        .unwrap();

        assert_eq!(value_of(&tree, child, "B").as_deref(), Some("a-suffix"));

        tree.set_variable_value(root, "A", text("new")).unwrap();
        assert_eq!(value_of(&tree, child, "B").as_deref(), Some("new-suffix"));
    }

    #[test]
    fn test_derived_value_runs_its_transforms() {
        let mut tree = ScopeTree::new();
        let root = tree.create_root();
        tree.register_variable(root, TemplateVariable::new("A")).unwrap();
        tree.register_variable(
            root,
            TemplateVariable::new("B")
                .with_default("$A$")
                .pipe([TransformSpec::ToNumber, TransformSpec::Multiply(2.0)]),
        )
        .unwrap();

        tree.set_variable_value(root, "A", text("22")).unwrap();
        assert_eq!(
            tree.get_variable_value(root, "B"),
            Some(&VariableValue::Number(44.0))
        );
    }

    #[test]
    fn test_change_propagates_through_chains() {
        let mut tree = ScopeTree::new();
        let root = tree.create_root();
        let child = tree.spawn_child(root).unwrap();
        let grandchild = tree.spawn_child(child).unwrap();
        tree.register_variable(root, TemplateVariable::new("A").with_default("1"))
            .unwrap();
        tree.register_variable(child, TemplateVariable::new("B").with_default("$A$2"))
            .unwrap();
        tree.register_variable(grandchild, TemplateVariable::new("C").with_default("$B$3"))
            .unwrap();

        assert_eq!(value_of(&tree, grandchild, "C").as_deref(), Some("123"));
        tree.set_variable_value(root, "A", text("x")).unwrap();
        assert_eq!(value_of(&tree, grandchild, "C").as_deref(), Some("x23"));
    }

    #[test]
    fn test_pending_dependency_binds_when_declared_later() {
        let mut tree = ScopeTree::new();
        let root = tree.create_root();
        let child = tree.spawn_child(root).unwrap();
        tree.register_variable(child, TemplateVariable::new("B").with_default("<$A$>"))
            .unwrap();
        assert_eq!(value_of(&tree, child, "B").as_deref(), Some("<$A$>"));

        tree.register_variable(root, TemplateVariable::new("A").with_default("late"))
            .unwrap();
        assert_eq!(value_of(&tree, child, "B").as_deref(), Some("<late>"));

        tree.set_variable_value(root, "A", text("again")).unwrap();
        assert_eq!(value_of(&tree, child, "B").as_deref(), Some("<again>"));
    }

    #[test]
    fn test_nearer_declaration_takes_over_the_binding() {
        let mut tree = ScopeTree::new();
        let root = tree.create_root();
        let child = tree.spawn_child(root).unwrap();
        let grandchild = tree.spawn_child(child).unwrap();
        tree.register_variable(root, TemplateVariable::new("A").with_default("root"))
            .unwrap();
        tree.register_variable(grandchild, TemplateVariable::new("B").with_default("$A$"))
            .unwrap();
        assert_eq!(value_of(&tree, grandchild, "B").as_deref(), Some("root"));

        tree.register_variable(child, TemplateVariable::new("A").with_default("child"))
            .unwrap();
        assert_eq!(value_of(&tree, grandchild, "B").as_deref(), Some("child"));

        // The root cell no longer feeds B.
        tree.set_variable_value(root, "A", text("ignored")).unwrap();
        assert_eq!(value_of(&tree, grandchild, "B").as_deref(), Some("child"));
    }

    #[test]
    fn test_non_reactive_source_only_reaches_one_level_down() {
        let mut tree = ScopeTree::new();
        let root = tree.create_root();
        let child = tree.spawn_child(root).unwrap();
        let grandchild = tree.spawn_child(child).unwrap();
        tree.register_variable(
            root,
            TemplateVariable::new("A").with_default("a").reactive(false),
        )
        .unwrap();
        tree.register_variable(child, TemplateVariable::new("NEAR").with_default("$A$"))
            .unwrap();
        tree.register_variable(grandchild, TemplateVariable::new("FAR").with_default("$A$"))
            .unwrap();

        tree.set_variable_value(root, "A", text("b")).unwrap();

        assert_eq!(value_of(&tree, child, "NEAR").as_deref(), Some("b"));
        assert_eq!(value_of(&tree, grandchild, "FAR").as_deref(), Some("a"));
    }

    #[test]
    fn test_not_overridable_derived_variable_rejects_writes() {
        let mut tree = ScopeTree::new();
        let root = tree.create_root();
        tree.register_variable(root, TemplateVariable::new("A").with_default("a"))
            .unwrap();
        tree.register_variable(
            root,
            TemplateVariable::new("B").with_default("$A$").overridable(false),
        )
        .unwrap();

        let err = tree.set_variable_value(root, "B", text("x")).unwrap_err();
        assert!(matches!(err, ScopeError::NotOverridable { .. }));
    }

    #[test]
    fn test_bulk_register_registers_plain_variables_first() {
        let mut tree = ScopeTree::new();
        let root = tree.create_root();
        tree.bulk_register_variables(
            root,
            vec![
                TemplateVariable::new("PATH").with_default("$DIR$/$FILE$"),
                TemplateVariable::new("DIR").with_default("src"),
                TemplateVariable::new("FILE").with_default("main.rs"),
            ],
        )
        .unwrap();

        assert_eq!(value_of(&tree, root, "PATH").as_deref(), Some("src/main.rs"));
        let names: Vec<_> = tree
            .own_variables(root)
            .iter()
            .map(|v| v.name().to_string())
            .collect();
        assert_eq!(names, vec!["DIR", "FILE", "PATH"]);
    }

    #[test]
    fn test_set_from_top_updates_every_first_declaring_branch() {
        let mut tree = ScopeTree::new();
        let root = tree.create_root();
        let left = tree.spawn_child(root).unwrap();
        let right = tree.spawn_child(root).unwrap();
        let right_child = tree.spawn_child(right).unwrap();
        tree.register_variable(left, TemplateVariable::new("A")).unwrap();
        tree.register_variable(right, TemplateVariable::new("A")).unwrap();
        tree.register_variable(right_child, TemplateVariable::new("A").with_default("deep"))
            .unwrap();

        assert_eq!(
            tree.find_first_scopes_from_top_with_variable(right_child, "A"),
            vec![left, right]
        );

        tree.set_variable_value_from_top(left, "A", text("v")).unwrap();

        assert_eq!(value_of(&tree, left, "A").as_deref(), Some("v"));
        assert_eq!(value_of(&tree, right, "A").as_deref(), Some("v"));
        assert_eq!(value_of(&tree, right_child, "A").as_deref(), Some("deep"));
    }

    #[test]
    fn test_set_from_top_without_declaration_fails() {
        let mut tree = ScopeTree::new();
        let root = tree.create_root();
        assert!(tree.set_variable_value_from_top(root, "X", text("x")).is_err());
    }

    #[test]
    fn test_get_variable_from_top_prefers_own_declaration() {
        let mut tree = ScopeTree::new();
        let root = tree.create_root();
        let left = tree.spawn_child(root).unwrap();
        let right = tree.spawn_child(root).unwrap();
        tree.register_variable(left, TemplateVariable::new("A").with_message("left"))
            .unwrap();
        tree.register_variable(right, TemplateVariable::new("A").with_message("right"))
            .unwrap();

        assert_eq!(tree.get_variable_from_top(right, "A").unwrap().ui_message(), "right");
        assert_eq!(tree.get_variable_from_top(root, "A").unwrap().ui_message(), "left");
        assert!(tree.get_variable(root, "A").is_err());
    }

    #[test]
    fn test_collect_values_prefers_shallow_declarations() {
        let mut tree = ScopeTree::new();
        let root = tree.create_root();
        let child = tree.spawn_child(root).unwrap();
        tree.register_variable(root, TemplateVariable::new("A").with_default("root"))
            .unwrap();
        tree.register_variable(child, TemplateVariable::new("A").with_default("child"))
            .unwrap();
        tree.register_variable(child, TemplateVariable::new("B")).unwrap();

        let values = tree.collect_all_branch_variables_values(root);

        assert_eq!(values.get("A"), Some(&Some(text("root"))));
        assert_eq!(values.get("B"), Some(&None));
    }

    #[test]
    fn test_collect_declarations_keeps_one_per_name() {
        let mut tree = ScopeTree::new();
        let root = tree.create_root();
        let left = tree.spawn_child(root).unwrap();
        let right = tree.spawn_child(root).unwrap();
        tree.register_variable(left, TemplateVariable::new("A").with_message("left"))
            .unwrap();
        tree.register_variable(right, TemplateVariable::new("A").with_message("right"))
            .unwrap();
        tree.register_variable(right, TemplateVariable::new("B")).unwrap();

        let variables = tree.collect_all_branch_variables(root);

        let names: Vec<_> = variables.iter().map(TemplateVariable::name).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(variables.first().unwrap().ui_message(), "left");
    }

    #[test]
    fn test_collect_declarations_walks_each_branch_before_its_siblings() {
        let mut tree = ScopeTree::new();
        let root = tree.create_root();
        let first = tree.spawn_child(root).unwrap();
        let second = tree.spawn_child(root).unwrap();
        let nested = tree.spawn_child(first).unwrap();
        tree.register_variable(nested, TemplateVariable::new("DEEP"))
            .unwrap();
        tree.register_variable(second, TemplateVariable::new("SIDE"))
            .unwrap();
        tree.register_variable(nested, TemplateVariable::new("SHARED").with_message("nested"))
            .unwrap();
        tree.register_variable(second, TemplateVariable::new("SHARED").with_message("second"))
            .unwrap();

        let variables = tree.collect_all_branch_variables(root);

        let names: Vec<_> = variables.iter().map(TemplateVariable::name).collect();
        assert_eq!(names, vec!["DEEP", "SHARED", "SIDE"]);
        assert_eq!(variables[1].ui_message(), "nested");
    }

    #[test]
    fn test_find_first_scope_with_defined_value() {
        let mut tree = ScopeTree::new();
        let root = tree.create_root();
        let child = tree.spawn_child(root).unwrap();
        tree.register_variable(root, TemplateVariable::new("A").with_default("x"))
            .unwrap();
        tree.register_variable(child, TemplateVariable::new("A")).unwrap();

        assert_eq!(
            tree.find_first_scope_from_bottom_with_variable(child, "A"),
            Some(child)
        );
        assert_eq!(
            tree.find_first_scope_from_bottom_with_non_nullable_variable_value(child, "A"),
            Some(root)
        );
        assert_eq!(value_of(&tree, child, "A").as_deref(), Some("x"));
    }
}
