// src/cli/dispatcher.rs
use anyhow::Result;

use crate::cli::handlers;

// --- Command Definition and Registry ---

/// Defines a command, its aliases, and its handler.
struct CommandDefinition {
    name: &'static str,
    aliases: &'static [&'static str],
    handler: fn(Vec<String>) -> Result<()>,
}

/// The single source of truth for all commands.
static COMMAND_REGISTRY: &[CommandDefinition] = &[
    CommandDefinition {
        name: "run",
        aliases: &["r"],
        handler: handlers::run::handle,
    },
    CommandDefinition {
        name: "init",
        aliases: &["new"],
        handler: handlers::init::handle,
    },
    CommandDefinition {
        name: "list",
        aliases: &["ls"],
        handler: handlers::list::handle,
    },
];

/// Finds a command definition in the registry by its name or alias.
fn find_command(name: &str) -> Option<&'static CommandDefinition> {
    COMMAND_REGISTRY
        .iter()
        .find(|cmd| cmd.name == name || cmd.aliases.contains(&name))
}

/// Splits the raw arguments into a command and its own arguments.
///
/// `pli <command> [args...]` runs the named command; anything else,
/// including no arguments at all, is `run` with every argument.
fn route(all_args: Vec<String>) -> (&'static str, Vec<String>) {
    if let Some(command) = all_args.first().and_then(|arg| find_command(arg)) {
        return (command.name, all_args.into_iter().skip(1).collect());
    }
    ("run", all_args)
}

/// The main application dispatcher.
pub fn dispatch(all_args: Vec<String>) -> Result<()> {
    log::debug!("Dispatching args: {:?}", all_args);

    let (name, args) = route(all_args);
    match find_command(name) {
        Some(command) => (command.handler)(args),
        None => handlers::run::handle(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_commands_are_found_by_alias() {
        assert_eq!(find_command("ls").map(|c| c.name), Some("list"));
        assert_eq!(find_command("new").map(|c| c.name), Some("init"));
        assert!(find_command("deploy").is_none());
    }

    #[test]
    fn test_explicit_command_drops_its_name() {
        let (name, args) = route(strings(&["list", "--no-cache"]));
        assert_eq!(name, "list");
        assert_eq!(args, strings(&["--no-cache"]));
    }

    #[test]
    fn test_flags_alone_default_to_run() {
        let (name, args) = route(strings(&["-t", "comp"]));
        assert_eq!(name, "run");
        assert_eq!(args, strings(&["-t", "comp"]));

        let (name, args) = route(Vec::new());
        assert_eq!(name, "run");
        assert!(args.is_empty());
    }
}
