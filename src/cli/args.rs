// src/cli/args.rs
use clap::Parser;

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true, // Important: the dispatcher already removed the command name
    about = "Renders a template into the output directory."
)]
pub struct RunArgs {
    /// Path to the config file. Defaults to `pli.toml` in the current directory.
    #[arg(long, short = 'c')]
    pub config: Option<String>,

    /// Directory holding one sub-directory per template.
    #[arg(long, visible_alias = "templates-dir")]
    pub templates_directory: Option<String>,

    /// Id of the template to render. Asked interactively when omitted.
    #[arg(long, short)]
    pub template: Option<String>,

    /// Output directory (the `CWD` variable), relative to the current directory.
    #[arg(long)]
    pub output: Option<String>,

    /// Set a variable without prompting (e.g., "NAME=Button"). Repeatable.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,

    /// JSON file with an object of variable values.
    #[arg(long, value_name = "FILE")]
    pub values: Option<String>,

    /// Do not prompt; keep current values for everything not given.
    #[arg(long, short)]
    pub yes: bool,

    /// Render and print the file tree without writing anything.
    #[arg(long, short)]
    pub dry: bool,

    /// Overwrite files that already exist.
    #[arg(long, short = 'o')]
    pub allow_overwriting: bool,

    /// Ignore and do not write the compiled config cache.
    #[arg(long)]
    pub no_cache: bool,
}

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Creates a starter pli.toml and a sample template."
)]
pub struct InitArgs {
    /// Where to create the config file. Defaults to `pli.toml`.
    #[arg(long, short = 'c')]
    pub config: Option<String>,

    /// Id of the sample template.
    #[arg(long, short, default_value = "hello")]
    pub template: String,
}

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Lists the available templates and their variables."
)]
pub struct ListArgs {
    #[arg(long, short = 'c')]
    pub config: Option<String>,

    #[arg(long, visible_alias = "templates-dir")]
    pub templates_directory: Option<String>,

    /// Ignore and do not write the compiled config cache.
    #[arg(long)]
    pub no_cache: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args_parse_repeated_sets_and_flags() {
        let args = RunArgs::try_parse_from([
            "-t", "comp", "--set", "NAME=Button", "--set", "STYLE=css", "-y", "-o", "--dry",
        ])
        .unwrap();

        assert_eq!(args.template.as_deref(), Some("comp"));
        assert_eq!(args.set, vec!["NAME=Button", "STYLE=css"]);
        assert!(args.yes);
        assert!(args.allow_overwriting);
        assert!(args.dry);
        assert!(!args.no_cache);
    }

    #[test]
    fn test_init_args_default_template() {
        let args = InitArgs::try_parse_from(Vec::<String>::new()).unwrap();
        assert_eq!(args.template, "hello");
        assert_eq!(args.config, None);
    }

    #[test]
    fn test_templates_dir_alias() {
        let args = ListArgs::try_parse_from(["--templates-dir", "blueprints"]).unwrap();
        assert_eq!(args.templates_directory.as_deref(), Some("blueprints"));
    }
}
