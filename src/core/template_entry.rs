// src/core/template_entry.rs

use crate::models::EntryDefinition;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntryError {
    #[error("Dynamic entry '{source_path}' must define its content.")]
    DynamicWithoutContent { source_path: String },
}

/// One source file of a template.
///
/// A *dynamic* entry has no file behind it: its content is given inline and
/// its source is only an identifier used by the output mapping.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TemplateEntry {
    source: String,
    content: Option<String>,
    dynamic: bool,
    rendered_content: Option<String>,
}

impl TemplateEntry {
    pub fn new(source: impl Into<String>, content: Option<String>) -> Self {
        Self {
            source: source.into(),
            content,
            dynamic: false,
            rendered_content: None,
        }
    }

    pub fn dynamic(source: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            content: Some(content.into()),
            dynamic: true,
            rendered_content: None,
        }
    }

    pub fn from_definition(definition: &EntryDefinition) -> Result<Self, EntryError> {
        if definition.dynamic && definition.content.is_none() {
            return Err(EntryError::DynamicWithoutContent {
                source_path: definition.source.clone(),
            });
        }
        Ok(Self {
            source: definition.source.clone(),
            content: definition.content.clone(),
            dynamic: definition.dynamic,
            rendered_content: None,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    pub fn rendered_content(&self) -> Option<&str> {
        self.rendered_content.as_deref()
    }

    pub fn set_content(&mut self, content: String) {
        self.content = Some(content);
    }

    pub fn set_rendered_content(&mut self, rendered: String) {
        self.rendered_content = Some(rendered);
    }

    /// Same source; `other`'s content wins when it is non-empty.
    pub fn merge(&self, other: &Self) -> Self {
        let content = match other.content.as_deref() {
            Some(c) if !c.is_empty() => Some(c.to_string()),
            _ => self.content.clone(),
        };
        Self {
            source: self.source.clone(),
            content,
            dynamic: self.dynamic || other.dynamic,
            rendered_content: other
                .rendered_content
                .clone()
                .or_else(|| self.rendered_content.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dynamic_definition_requires_content() {
        let definition = EntryDefinition {
            source: "virtual".to_string(),
            content: None,
            dynamic: true,
        };
        assert_eq!(
            TemplateEntry::from_definition(&definition).unwrap_err(),
            EntryError::DynamicWithoutContent {
                source_path: "virtual".to_string()
            }
        );
    }

    #[test]
    fn test_merge_keeps_non_empty_content() {
        let loaded = TemplateEntry::new("a.ts", Some("from disk".to_string()));
        let declared = TemplateEntry::new("a.ts", Some(String::new()));

        assert_eq!(loaded.merge(&declared).content(), Some("from disk"));
        assert_eq!(declared.merge(&loaded).content(), Some("from disk"));

        let dynamic = TemplateEntry::dynamic("a.ts", "inline");
        assert!(loaded.merge(&dynamic).is_dynamic());
    }
}
