// src/cli/handlers/commons.rs

// Shared helpers of the command handlers.

use anyhow::{Context, Result, anyhow};
use colored::Colorize;
use std::collections::BTreeMap;
use std::fs;

use crate::{
    core::{config_loader::ProjectOptions, output_tree, paths},
    models::{LiteralValue, VariableValue},
};

/// Builds the loader options from the raw CLI values.
pub fn project_options(
    config: Option<&str>,
    templates_directory: Option<&str>,
    no_cache: bool,
) -> Result<ProjectOptions> {
    let cwd = paths::current_dir().context(t!("common.error.no_cwd"))?;
    Ok(ProjectOptions {
        config_path: config.map(paths::expand_user_path).transpose()?,
        templates_directory: templates_directory
            .map(|dir| paths::resolve_user_dir(&cwd, dir))
            .transpose()?,
        use_cache: !no_cache,
        cwd,
    })
}

/// Parses `--set KEY=VALUE` arguments. Values are kept as text.
pub fn parse_set_arguments(raw: &[String]) -> Result<Vec<(String, VariableValue)>> {
    raw.iter()
        .map(|pair| {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!(format!(t!("run.error.invalid_set"), pair = pair)))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(anyhow!(format!(t!("run.error.invalid_set"), pair = pair)));
            }
            Ok((key.to_string(), VariableValue::from(value)))
        })
        .collect()
}

/// Parses the content of a `--values` file: a JSON object of variable values.
pub fn parse_values_json(content: &str) -> Result<Vec<(String, VariableValue)>> {
    let values: BTreeMap<String, LiteralValue> =
        serde_json::from_str(content).context(t!("run.error.invalid_values_file"))?;
    Ok(values
        .into_iter()
        .map(|(name, value)| (name, VariableValue::from(value)))
        .collect())
}

/// Reads and parses a `--values` file.
pub fn load_values_file(path: &str) -> Result<Vec<(String, VariableValue)>> {
    let path = paths::expand_user_path(path)?;
    let content = fs::read_to_string(&path)
        .with_context(|| format!(t!("run.error.read_values_file"), path = path))?;
    parse_values_json(&content)
}

/// Prints the tree of written (or planned) files.
pub fn print_output_tree(cwd: &str, files: &[String], header: &str) {
    if files.is_empty() {
        println!("{}", t!("run.info.nothing_written").yellow());
        return;
    }
    println!("\n{}", header.green().bold());
    println!("{}", output_tree::format_output_tree(cwd, files));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_set_arguments() {
        let parsed = parse_set_arguments(&[
            "NAME=Button".to_string(),
            "EXPR=a=b".to_string(),
            "EMPTY=".to_string(),
        ])
        .unwrap();

        assert_eq!(
            parsed,
            vec![
                ("NAME".to_string(), VariableValue::from("Button")),
                ("EXPR".to_string(), VariableValue::from("a=b")),
                ("EMPTY".to_string(), VariableValue::from("")),
            ]
        );
    }

    #[test]
    fn test_parse_set_arguments_rejects_missing_key() {
        assert!(parse_set_arguments(&["NAME".to_string()]).is_err());
        assert!(parse_set_arguments(&["=x".to_string()]).is_err());
    }

    #[test]
    fn test_parse_values_json_keeps_types() {
        let parsed =
            parse_values_json(r#"{ "NAME": "Button", "SIZE": 3, "TS": true, "TAGS": ["a", "b"] }"#)
                .unwrap();

        let map: BTreeMap<_, _> = parsed.into_iter().collect();
        assert_eq!(map.get("NAME"), Some(&VariableValue::from("Button")));
        assert_eq!(map.get("SIZE"), Some(&VariableValue::Number(3.0)));
        assert_eq!(map.get("TS"), Some(&VariableValue::Bool(true)));
        assert_eq!(
            map.get("TAGS"),
            Some(&VariableValue::List(vec!["a".to_string(), "b".to_string()]))
        );
    }

    #[test]
    fn test_parse_values_json_requires_an_object() {
        assert!(parse_values_json("[1, 2]").is_err());
    }
}
