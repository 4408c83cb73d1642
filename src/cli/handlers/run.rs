// src/cli/handlers/run.rs

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use colored::Colorize;
use std::collections::HashSet;

use crate::{
    cli::{
        args::RunArgs,
        handlers::commons,
        prompter::{self, DialoguerPrompter, Prompter},
    },
    core::{
        builtins::{BuiltinVariable, RootScopeDefaults},
        config_loader::{self, Project, ProjectOptions},
        paths,
        template_engine::TemplateEngine,
        tree_renderer::{RenderOutput, TemplateTreeRenderer},
    },
    dev_utils::BlockTimer,
    models::VariableValue,
    system::{
        storage::{FileSystemStorage, Storage},
        writer::{self, WriteOptions, WriteReport},
    },
};

/// Main entry point for the 'run' command.
pub fn handle(args: Vec<String>) -> Result<()> {
    let run_args = RunArgs::try_parse_from(&args).unwrap_or_else(|e| e.exit());
    let storage = FileSystemStorage::new();
    let mut prompter = DialoguerPrompter::new();
    let options = commons::project_options(
        run_args.config.as_deref(),
        run_args.templates_directory.as_deref(),
        run_args.no_cache,
    )?;

    let report = execute(&storage, &mut prompter, &run_args, &options)?;

    let header = if report.dry_run {
        t!("run.info.dry_run_header")
    } else {
        t!("run.info.written_header")
    };
    let files: Vec<String> = report
        .created
        .iter()
        .chain(report.overwritten.iter())
        .cloned()
        .collect();
    commons::print_output_tree(&options.cwd, &files, header);
    if !report.overwritten.is_empty() {
        println!(
            "{}",
            format!(t!("run.info.overwritten"), count = report.overwritten.len()).yellow()
        );
    }
    Ok(())
}

/// The whole run pipeline: load, select, answer, render and write.
pub fn execute(
    storage: &dyn Storage,
    prompter: &mut dyn Prompter,
    run_args: &RunArgs,
    options: &ProjectOptions,
) -> Result<WriteReport> {
    // 1. Load the project.
    let project = config_loader::load_project(storage, options)
        .context(t!("run.error.load_project"))?;

    // 2. Pick the template.
    let template_id = select_template(&project, run_args.template.as_deref(), prompter)?;

    // 3. Collect the variables of every root template.
    let output_directory = run_args
        .output
        .as_deref()
        .map(|dir| paths::resolve_user_dir(&project.cwd, dir))
        .transpose()?
        .map(|dir| paths::relative(&project.cwd, &dir));
    let mut renderer = TemplateTreeRenderer::new(
        project.templates.clone(),
        TemplateEngine::new(),
        RootScopeDefaults {
            cwd: output_directory,
            root_cwd: project.cwd.clone(),
            templates_directory: project.templates_directory.clone(),
        },
    );
    renderer.collect_variables()?;

    // 4. Answers given up front, then the interactive ones.
    let mut answers: Vec<(String, VariableValue)> = Vec::new();
    if let Some(values) = &run_args.values {
        answers.extend(commons::load_values_file(values)?);
    }
    answers.extend(commons::parse_set_arguments(&run_args.set)?);

    let mut answered: HashSet<String> = answers.iter().map(|(name, _)| name.clone()).collect();
    if run_args.output.is_some() {
        answered.insert(BuiltinVariable::Cwd.name().to_string());
    }
    renderer.assign_answers(&template_id, answers)?;

    if !run_args.yes {
        prompter::run_variables_ui(prompter, &mut renderer, &template_id, &answered)?;
    }

    // 5. Render and write.
    let output = {
        let _timer = BlockTimer::new("render");
        renderer.render(&template_id)?
    };
    write_output(storage, &output, run_args)
}

/// The template to render: `--template`, or the user's choice.
fn select_template(
    project: &Project,
    requested: Option<&str>,
    prompter: &mut dyn Prompter,
) -> Result<String> {
    match requested {
        Some(id) if project.template(id).is_some() => Ok(id.to_string()),
        Some(id) => {
            let available: Vec<&str> = project.templates.iter().map(|t| t.id()).collect();
            Err(anyhow!(format!(
                t!("run.error.unknown_template"),
                id = id.cyan(),
                available = available.join(", ")
            )))
        }
        None => Ok(prompter::run_template_selection_ui(prompter, &project.templates)?),
    }
}

fn write_output(storage: &dyn Storage, output: &RenderOutput, run_args: &RunArgs) -> Result<WriteReport> {
    let options = WriteOptions {
        allow_overwriting: run_args.allow_overwriting,
        dry_run: run_args.dry,
    };
    Ok(writer::save_render_output(storage, output, options)?)
}
