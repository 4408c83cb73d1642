// src/cli/handlers/init.rs

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use colored::Colorize;

use crate::{
    cli::{args::InitArgs, handlers::commons},
    constants::{CONFIG_FILENAME, DEFAULT_TEMPLATES_DIRNAME},
    core::paths,
    models::TomlConfig,
    system::storage::{FileSystemStorage, Storage},
};

const SAMPLE_FILENAME: &str = "hello.txt";
const SAMPLE_CONTENT: &str = "Hello, $NAME$!\n";

/// Files created by `init`, and the ones left alone because they already existed.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct InitReport {
    pub created: Vec<String>,
    pub skipped: Vec<String>,
}

/// Main entry point for the 'init' command.
pub fn handle(args: Vec<String>) -> Result<()> {
    let init_args = InitArgs::try_parse_from(&args).unwrap_or_else(|e| e.exit());
    let cwd = paths::current_dir().context(t!("common.error.no_cwd"))?;
    let config = init_args
        .config
        .as_deref()
        .map(paths::expand_user_path)
        .transpose()?;

    let report = init_project(
        &FileSystemStorage::new(),
        &cwd,
        config.as_deref(),
        &init_args.template,
    )?;

    for path in &report.skipped {
        println!(
            "{}",
            format!(t!("init.info.skipped"), path = paths::relative(&cwd, path)).yellow()
        );
    }
    commons::print_output_tree(&cwd, &report.created, t!("init.info.created_header"));
    Ok(())
}

/// Writes a starter config and its sample template below `cwd`. Existing
/// files are never overwritten.
pub fn init_project(
    storage: &dyn Storage,
    cwd: &str,
    config: Option<&str>,
    template_id: &str,
) -> Result<InitReport> {
    if template_id.trim().is_empty() || template_id.contains(['/', '\\']) {
        return Err(anyhow!(format!(t!("init.error.invalid_template_id"), id = template_id)));
    }

    let config_path = paths::resolve(cwd, config.unwrap_or(CONFIG_FILENAME));
    let sample_path = paths::join(&[cwd, DEFAULT_TEMPLATES_DIRNAME, template_id, SAMPLE_FILENAME]);

    let config_content = toml::to_string_pretty(&TomlConfig::new_for_init(template_id))
        .context(t!("init.error.serialize"))?;

    let mut report = InitReport::default();
    for (path, content) in [(config_path, config_content), (sample_path, SAMPLE_CONTENT.to_string())] {
        if storage.exists(&path) {
            log::debug!("'{}' already exists, skipping", path);
            report.skipped.push(path);
            continue;
        }
        storage.create_dir(&paths::dirname(&path))?;
        storage.write(&path, &content)?;
        report.created.push(path);
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config_loader::{self, ProjectOptions};
    use crate::system::storage::MemoryStorage;

    #[test]
    fn test_init_creates_a_loadable_project() {
        // --- Setup ---
        let storage = MemoryStorage::new();

        // --- Execute ---
        let report = init_project(&storage, "/work", None, "hello").unwrap();

        // --- Assert ---
        assert_eq!(
            report.created,
            vec!["/work/pli.toml", "/work/templates/hello/hello.txt"]
        );
        let project = config_loader::load_project(
            &storage,
            &ProjectOptions {
                cwd: "/work".to_string(),
                ..Default::default()
            },
        )
        .unwrap();
        let hello = project.template("hello").unwrap();
        assert_eq!(hello.variables().len(), 2);
        assert_eq!(
            hello.entries().first().unwrap().content(),
            Some(SAMPLE_CONTENT)
        );
    }

    #[test]
    fn test_init_keeps_existing_files() {
        let storage = MemoryStorage::with_files([("/work/pli.toml", "# mine")]);

        let report = init_project(&storage, "/work", None, "hello").unwrap();

        assert_eq!(report.skipped, vec!["/work/pli.toml"]);
        assert_eq!(storage.read("/work/pli.toml").unwrap(), "# mine");
    }

    #[test]
    fn test_init_rejects_nested_template_ids() {
        assert!(init_project(&MemoryStorage::new(), "/work", None, "a/b").is_err());
    }
}
