// src/cli/handlers/list.rs

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;

use crate::{
    cli::{args::ListArgs, handlers::commons},
    core::{
        builtins::{BuiltinVariable, RootScopeDefaults},
        config_loader::{self, Project},
        template_engine::TemplateEngine,
        tree_renderer::TemplateTreeRenderer,
    },
    system::storage::FileSystemStorage,
};

/// One line of the listing.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateSummary {
    pub id: String,
    pub name: String,
    pub variables: Vec<String>,
}

/// Main entry point for the 'list' command.
pub fn handle(args: Vec<String>) -> Result<()> {
    let list_args = ListArgs::try_parse_from(&args).unwrap_or_else(|e| e.exit());
    let options = commons::project_options(
        list_args.config.as_deref(),
        list_args.templates_directory.as_deref(),
        list_args.no_cache,
    )?;
    let project = config_loader::load_project(&FileSystemStorage::new(), &options)
        .context(t!("run.error.load_project"))?;

    println!(
        "\n{}",
        format!(t!("list.header"), directory = project.templates_directory).bold()
    );
    for summary in summarize(&project)? {
        let name = if summary.name == summary.id {
            String::new()
        } else {
            format!(" ({})", summary.name)
        };
        println!("  {}{}", summary.id.cyan().bold(), name);
        if summary.variables.is_empty() {
            println!("    {}", t!("list.no_variables").dimmed());
        } else {
            println!("    {}", summary.variables.join(", ").dimmed());
        }
    }
    Ok(())
}

/// Every root template with the variables a run of it would ask for,
/// in prompt order. Builtins other than the output directory are left out.
pub fn summarize(project: &Project) -> Result<Vec<TemplateSummary>> {
    let mut renderer = TemplateTreeRenderer::new(
        project.templates.clone(),
        TemplateEngine::new(),
        RootScopeDefaults {
            cwd: None,
            root_cwd: project.cwd.clone(),
            templates_directory: project.templates_directory.clone(),
        },
    );
    renderer.collect_variables()?;

    project
        .templates
        .iter()
        .map(|template| {
            let mut variables = renderer.branch_variables(template.id())?;
            variables.retain(|v| {
                !v.is_hidden()
                    && (!BuiltinVariable::is_builtin(v.name())
                        || v.name() == BuiltinVariable::Cwd.name())
            });
            variables.sort_by_key(|v| v.ui_index());
            Ok(TemplateSummary {
                id: template.id().to_string(),
                name: template.display_name().to_string(),
                variables: variables.iter().map(|v| v.name().to_string()).collect(),
            })
        })
        .collect()
}
