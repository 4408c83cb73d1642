// src/models.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// --- RUNTIME VALUE MODEL ---

/// A concrete variable value. "Undefined" is modelled as `Option::None` by the
/// holders of a value, never as a variant of this enum.
///
/// This enum is externally tagged so it survives the binary cache; user-facing
/// input goes through [`LiteralValue`] first.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum VariableValue {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl VariableValue {
    /// A value is empty when its textual form is empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::List(items) => items.iter().all(String::is_empty),
            Self::Bool(_) | Self::Number(_) => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(text) => text.trim().parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for VariableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            // Integral numbers print without a trailing ".0".
            Self::Number(n) if n.is_finite() && n.fract() == 0.0 => write!(f, "{n:.0}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(text) => f.write_str(text),
            Self::List(items) => f.write_str(&items.join(",")),
        }
    }
}

impl From<&str> for VariableValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for VariableValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for VariableValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for VariableValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<String>> for VariableValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

/// A value as written by a user in `pli.toml` or a `--values` JSON file.
/// Untagged for a flexible syntax, so it is only used for deserialization.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum LiteralValue {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl From<LiteralValue> for VariableValue {
    fn from(value: LiteralValue) -> Self {
        match value {
            LiteralValue::Bool(b) => Self::Bool(b),
            LiteralValue::Number(n) => Self::Number(n),
            LiteralValue::Text(s) => Self::Text(s),
            LiteralValue::List(l) => Self::List(l),
        }
    }
}

impl From<VariableValue> for LiteralValue {
    fn from(value: VariableValue) -> Self {
        match value {
            VariableValue::Bool(b) => Self::Bool(b),
            VariableValue::Number(n) => Self::Number(n),
            VariableValue::Text(s) => Self::Text(s),
            VariableValue::List(l) => Self::List(l),
        }
    }
}

// --- SHARED DECLARATIVE MODELS ---
// Externally tagged, so they parse from TOML (`"trim"` or `{ prefix = "I" }`)
// and are also safe for the binary cache.

/// The kind of prompt used to ask for a variable.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum UiKind {
    #[default]
    Input,
    Number,
    Password,
    Confirm,
    List,
    Checkbox,
}

/// A builtin stage of a variable's transform pipeline.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum TransformSpec {
    Trim,
    Lowercase,
    Uppercase,
    PascalCase,
    CamelCase,
    SnakeCase,
    KebabCase,
    ScreamingSnakeCase,
    ToNumber,
    ToBool,
    Multiply(f64),
    Prefix(String),
    Suffix(String),
    Replace { from: String, to: String },
}

/// A builtin validation rule.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorSpec {
    NonEmpty,
    Integer,
    Number,
    Pattern(String),
    OneOf(Vec<String>),
    MinLength(usize),
    MaxLength(usize),
}

/// Presentation hints of a variable. Every field is optional so that merges
/// can tell "not given" apart from a given value.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct UiDescriptor {
    #[serde(rename = "type")]
    pub kind: Option<UiKind>,
    pub message: Option<String>,
    pub hidden: Option<bool>,
    pub index: Option<i32>,
}

/// An entry of a template, as declared in the configuration.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct EntryDefinition {
    pub source: String,
    pub content: Option<String>,
    #[serde(default)]
    pub dynamic: bool,
}

// --- `pli.toml` MODELS (What is read from the configuration file) ---

/// A choice offered by `list`/`checkbox` prompts.
/// `"Red"` and `{ label = "Red", value = "#f00" }` are both accepted.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum TomlOption {
    Plain(String),
    Labeled {
        label: String,
        value: Option<LiteralValue>,
    },
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct TomlVariable {
    pub name: String,
    pub default: Option<LiteralValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transform: Vec<TransformSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validate: Vec<ValidatorSpec>,
    pub readonly: Option<bool>,
    pub overridable: Option<bool>,
    pub reactive: Option<bool>,
    pub multiple: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<TomlOption>,
    pub ui: Option<UiDescriptor>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct TomlTemplate {
    pub id: String,
    pub name: Option<String>,
    pub default_output_directory: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub output_mapping: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<EntryDefinition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<TomlVariable>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TomlTemplate>,
}

/// Represents the deserialized structure of a `pli.toml` file.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    pub templates_directory: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub templates: Vec<TomlTemplate>,
}

impl TomlConfig {
    /// The scaffold written by `pli init`: one template whose entry lives in the
    /// templates directory, plus a derived variable to show reactivity.
    pub fn new_for_init(template_id: &str) -> Self {
        let variables = vec![
            TomlVariable {
                name: "NAME".to_string(),
                default: Some(LiteralValue::Text("World".to_string())),
                transform: vec![TransformSpec::Trim],
                validate: vec![ValidatorSpec::NonEmpty],
                ui: Some(UiDescriptor {
                    message: Some("Who should be greeted?".to_string()),
                    index: Some(0),
                    ..Default::default()
                }),
                ..Default::default()
            },
            TomlVariable {
                name: "FILE_NAME".to_string(),
                default: Some(LiteralValue::Text("$NAME$".to_string())),
                transform: vec![TransformSpec::KebabCase],
                ui: Some(UiDescriptor {
                    index: Some(1),
                    ..Default::default()
                }),
                ..Default::default()
            },
        ];

        let mut output_mapping = BTreeMap::new();
        output_mapping.insert(
            format!("{template_id}/hello.txt"),
            "$FILE_NAME$.txt".to_string(),
        );

        Self {
            templates_directory: Some(crate::constants::DEFAULT_TEMPLATES_DIRNAME.to_string()),
            templates: vec![TomlTemplate {
                id: template_id.to_string(),
                name: Some("Hello world".to_string()),
                output_mapping,
                variables,
                ..Default::default()
            }],
        }
    }
}

// --- SERIALIZATION SUBSTITUTES MODELS (For the binary cache) ---
// bincode cannot read untagged enums, so the compiled configuration swaps
// every `LiteralValue` for the tagged `VariableValue`.

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub(crate) struct SerializableOption {
    pub label: String,
    pub value: VariableValue,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub(crate) struct SerializableVariable {
    pub name: String,
    pub default: Option<VariableValue>,
    pub transform: Vec<TransformSpec>,
    pub validate: Vec<ValidatorSpec>,
    pub readonly: Option<bool>,
    pub overridable: Option<bool>,
    pub reactive: Option<bool>,
    pub multiple: Option<bool>,
    pub options: Vec<SerializableOption>,
    pub ui: UiDescriptor,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub(crate) struct SerializableTemplate {
    pub id: String,
    pub name: Option<String>,
    pub default_output_directory: Option<String>,
    pub output_mapping: BTreeMap<String, String>,
    pub include: Vec<String>,
    pub entries: Vec<EntryDefinition>,
    pub variables: Vec<SerializableVariable>,
    pub children: Vec<SerializableTemplate>,
}

/// The compiled, validated form of a `pli.toml`, as stored in the binary cache.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub(crate) struct CompiledConfig {
    /// Truncated blake3 hash of the `pli.toml` bytes this was compiled from.
    pub source_hash: String,
    pub templates_directory: Option<String>,
    pub templates: Vec<SerializableTemplate>,
}
