// src/core/template_engine.rs

//! The `$NAME$` placeholder engine.
//!
//! A placeholder is a dollar sign, one or more ASCII letters, digits or
//! underscores, and a closing dollar sign. Anything else (a lone `$`, `$ A $`,
//! `$a-b$`) is plain text and is left untouched.

use crate::models::VariableValue;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;

lazy_static! {
    static ref PLACEHOLDER_RE: Regex =
        Regex::new(r"\$([A-Za-z0-9_]+)\$").expect("placeholder pattern is valid");
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Variable '{name}' has no value, so the placeholder '${name}$' cannot be rendered.")]
    UnresolvedVariable { name: String },
}

/// Anything that can answer "what is the value of NAME?".
///
/// Scopes implement it with their fallback lookup; plain maps are handy in tests
/// and for one-off renders.
pub trait ValueSource {
    fn value_of(&self, name: &str) -> Option<VariableValue>;
}

impl ValueSource for HashMap<String, VariableValue> {
    fn value_of(&self, name: &str) -> Option<VariableValue> {
        self.get(name).cloned()
    }
}

impl ValueSource for BTreeMap<String, VariableValue> {
    fn value_of(&self, name: &str) -> Option<VariableValue> {
        self.get(name).cloned()
    }
}

impl ValueSource for BTreeMap<String, Option<VariableValue>> {
    fn value_of(&self, name: &str) -> Option<VariableValue> {
        self.get(name).cloned().flatten()
    }
}

/// Stateless renderer for the placeholder syntax.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateEngine;

impl TemplateEngine {
    pub fn new() -> Self {
        Self
    }

    /// Returns the placeholder text for `name`, e.g. `$NAME$`.
    pub fn placeholder_for(&self, name: &str) -> String {
        format!("${name}$")
    }

    /// Returns every distinct variable name referenced in `text`, in order of first appearance.
    pub fn extract_all_variables(&self, text: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        PLACEHOLDER_RE
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str())
            .filter(|name| seen.insert(*name))
            .map(str::to_string)
            .collect()
    }

    pub fn has_variables(&self, text: &str) -> bool {
        PLACEHOLDER_RE.is_match(text)
    }

    /// Replaces every occurrence of `$name$` in `text` with the textual form of `value`.
    ///
    /// A missing value becomes the empty string, unless `strict` is set, in which
    /// case a missing or empty value is an error.
    pub fn replace_variable(
        &self,
        text: &str,
        name: &str,
        value: Option<&VariableValue>,
        strict: bool,
    ) -> Result<String, EngineError> {
        let placeholder = self.placeholder_for(name);
        if !text.contains(&placeholder) {
            return Ok(text.to_string());
        }
        let rendered = value.map(VariableValue::to_string).unwrap_or_default();
        if strict && rendered.is_empty() {
            return Err(EngineError::UnresolvedVariable {
                name: name.to_string(),
            });
        }
        Ok(text.replace(&placeholder, &rendered))
    }

    /// Replaces every placeholder of `text` with the value `source` gives for it.
    ///
    /// Substitution is a single pass: placeholders appearing inside substituted
    /// values are not expanded again.
    pub fn render_template(
        &self,
        text: &str,
        source: &dyn ValueSource,
        strict: bool,
    ) -> Result<String, EngineError> {
        let names = self.extract_all_variables(text);
        if names.is_empty() {
            return Ok(text.to_string());
        }

        let mut resolved: HashMap<String, String> = HashMap::with_capacity(names.len());
        for name in names {
            let rendered = source
                .value_of(&name)
                .map(|value| value.to_string())
                .unwrap_or_default();
            if strict && rendered.is_empty() {
                return Err(EngineError::UnresolvedVariable { name });
            }
            resolved.insert(name, rendered);
        }

        let output = PLACEHOLDER_RE.replace_all(text, |caps: &Captures<'_>| {
            caps.get(1)
                .and_then(|m| resolved.get(m.as_str()))
                .cloned()
                .unwrap_or_default()
        });
        Ok(output.into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_values() -> HashMap<String, VariableValue> {
        HashMap::new()
    }

    fn values(pairs: &[(&str, &str)]) -> HashMap<String, VariableValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), VariableValue::from(*v)))
            .collect()
    }

    #[test]
    fn test_extract_keeps_first_appearance_order_without_duplicates() {
        let engine = TemplateEngine::new();
        let names = engine.extract_all_variables("$B$ and $A$, then $B$ again and $C_1$");
        assert_eq!(names, vec!["B", "A", "C_1"]);
    }

    #[test]
    fn test_malformed_placeholders_are_plain_text() {
        let engine = TemplateEngine::new();
        assert!(engine.extract_all_variables("costs $5 and $ A $ or $a-b$").is_empty());
        assert!(!engine.has_variables("$$"));
        assert!(engine.has_variables("prefix $X$ suffix"));
    }

    #[test]
    fn test_render_substitutes_every_occurrence() {
        let engine = TemplateEngine::new();
        let source = values(&[("NAME", "Button"), ("EXT", "tsx")]);
        let out = engine
            .render_template("$NAME$/$NAME$.$EXT$", &source, true)
            .unwrap();
        assert_eq!(out, "Button/Button.tsx");
    }

    #[test]
    fn test_render_lenient_mode_uses_empty_string_for_missing_values() {
        let engine = TemplateEngine::new();
        let out = engine
            .render_template("[$MISSING$]", &no_values(), false)
            .unwrap();
        assert_eq!(out, "[]");
    }

    #[test]
    fn test_render_strict_mode_rejects_missing_and_empty_values() {
        let engine = TemplateEngine::new();
        let err = engine
            .render_template("$MISSING$", &no_values(), true)
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::UnresolvedVariable {
                name: "MISSING".to_string()
            }
        );

        let empty = values(&[("EMPTY", "")]);
        assert!(engine.render_template("$EMPTY$", &empty, true).is_err());
    }

    #[test]
    fn test_render_is_single_pass() {
        let engine = TemplateEngine::new();
        let source = values(&[("A", "$B$"), ("B", "nope")]);
        assert_eq!(engine.render_template("$A$", &source, false).unwrap(), "$B$");
    }

    #[test]
    fn test_render_formats_non_text_values() {
        let engine = TemplateEngine::new();
        let mut source = HashMap::new();
        source.insert("N".to_string(), VariableValue::Number(44.0));
        source.insert("F".to_string(), VariableValue::Number(2.5));
        source.insert("B".to_string(), VariableValue::Bool(true));
        source.insert(
            "L".to_string(),
            VariableValue::List(vec!["a".to_string(), "b".to_string()]),
        );
        let out = engine
            .render_template("$N$ $F$ $B$ $L$", &source, true)
            .unwrap();
        assert_eq!(out, "44 2.5 true a,b");
    }

    #[test]
    fn test_replace_variable_only_touches_the_named_placeholder() {
        let engine = TemplateEngine::new();
        let value = VariableValue::from("x");
        let out = engine
            .replace_variable("$A$-$B$-$A$", "A", Some(&value), false)
            .unwrap();
        assert_eq!(out, "x-$B$-x");

        let out = engine.replace_variable("$A$", "A", None, false).unwrap();
        assert_eq!(out, "");
        assert!(engine.replace_variable("$A$", "A", None, true).is_err());
    }
}
