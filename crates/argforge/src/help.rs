//! Usage and help rendering.
//!
//! Everything here is a pure function of the command tree; missing help text
//! renders as empty, never as an error.

use crate::command::{Arity, Command, Multiplicity, OptionSpec, PositionalSpec};
use crate::error::ParseError;

/// Builtin spellings offered by the parser unless the command declares them.
pub(crate) const HELP_ALIASES: [&str; 2] = ["-h", "--help"];
pub(crate) const VERSION_ALIASES: [&str; 2] = ["-V", "--version"];

fn command_line(command: &Command, ancestors: &[&Command]) -> String {
    ancestors
        .iter()
        .map(|c| c.name())
        .chain(std::iter::once(command.name()))
        .filter(|n| !n.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn value_placeholders(arity: Arity, value_name: &str) -> String {
    match arity {
        Arity::Fixed(n) => (0..n).map(|_| format!(" <{value_name}>")).collect(),
        Arity::Optional => format!(" [{value_name}]"),
        Arity::Variadic { .. } => format!(" <{value_name}>..."),
    }
}

/// Flag plus value placeholders, e.g. `--count <COUNT>`.
///
/// Substituting sample values for the placeholders yields a parsable line.
pub fn usage_fragment(spec: &OptionSpec) -> String {
    let mut out = spec.display_name().to_string();
    if spec.takes_value() {
        out.push_str(&value_placeholders(spec.arity, &spec.value_name()));
    }
    out
}

fn synopsis_option(spec: &OptionSpec) -> String {
    let fragment = usage_fragment(spec);
    let mut out = if spec.required {
        fragment
    } else {
        format!("[{fragment}]")
    };
    if spec.multiplicity != Multiplicity::Overwrite {
        out.push_str("...");
    }
    out
}

fn synopsis_positional(spec: &PositionalSpec) -> String {
    let name = spec.value_name();
    match spec.arity {
        Arity::Fixed(n) => vec![format!("<{name}>"); n].join(" "),
        Arity::Optional => format!("[{name}]"),
        Arity::Variadic { min: 0 } => format!("[{name}]..."),
        Arity::Variadic { .. } => format!("<{name}>..."),
    }
}

/// One-line synopsis: `Usage: app sub [--flag] --name <NAME> <FILE>... <COMMAND>`.
pub fn usage(command: &Command, ancestors: &[&Command]) -> String {
    let mut parts = vec![command_line(command, ancestors)];
    parts.extend(
        command
            .options()
            .iter()
            .filter(|o| !o.hidden)
            .map(synopsis_option),
    );
    parts.extend(command.positionals().iter().map(synopsis_positional));
    if command.subcommands().any(|c| !c.hidden) {
        parts.push(if command.subcommand_required {
            "<COMMAND>".to_string()
        } else {
            "[COMMAND]".to_string()
        });
    }
    let line = parts
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    format!("Usage: {line}")
}

fn option_left(spec: &OptionSpec) -> String {
    let mut out = spec.aliases.join(", ");
    if spec.takes_value() {
        out.push_str(&value_placeholders(spec.arity, &spec.value_name()));
    }
    out
}

fn option_help(spec: &OptionSpec) -> String {
    let mut notes: Vec<String> = Vec::new();
    let text = spec.help.trim();
    if !text.is_empty() {
        notes.push(text.to_string());
    }
    if spec.required {
        notes.push("(required)".to_string());
    }
    if let Some(default) = &spec.default {
        notes.push(format!("[default: {default}]"));
    }
    if let Some(env) = &spec.env {
        notes.push(format!("[env: {env}]"));
    }
    if let Some(values) = spec.value_type.possible_values() {
        notes.push(format!("[possible values: {}]", values.join(", ")));
    }
    notes.join(" ")
}

fn positional_help(spec: &PositionalSpec) -> String {
    let mut notes: Vec<String> = Vec::new();
    let text = spec.help.trim();
    if !text.is_empty() {
        notes.push(text.to_string());
    }
    if let Some(default) = &spec.default {
        notes.push(format!("[default: {default}]"));
    }
    if let Some(values) = spec.value_type.possible_values() {
        notes.push(format!("[possible values: {}]", values.join(", ")));
    }
    notes.join(" ")
}

fn push_table(out: &mut String, title: &str, rows: Vec<(String, String)>) {
    if rows.is_empty() {
        return;
    }
    out.push_str(&format!("\n{title}:\n"));
    let width = rows.iter().map(|(l, _)| l.len()).max().unwrap_or(0);
    for (left, help) in rows {
        if help.is_empty() {
            out.push_str(&format!("  {left}\n"));
        } else {
            out.push_str(&format!("  {left:width$}  {help}\n"));
        }
    }
}

fn free_aliases(command: &Command, aliases: [&'static str; 2]) -> Vec<&'static str> {
    aliases
        .into_iter()
        .filter(|a| !command.has_alias(a))
        .collect()
}

fn builtin_rows(command: &Command, help_flags: bool) -> Vec<(String, String)> {
    let mut rows = Vec::new();
    if !help_flags {
        return rows;
    }
    let help = free_aliases(command, HELP_ALIASES);
    if !help.is_empty() {
        rows.push((help.join(", "), "Print help".to_string()));
    }
    if !command.version.trim().is_empty() {
        let version = free_aliases(command, VERSION_ALIASES);
        if !version.is_empty() {
            rows.push((version.join(", "), "Print version".to_string()));
        }
    }
    rows
}

/// Full help page for `command`, reached through `ancestors` (root first).
///
/// `help_flags` mirrors [`ParserSettings::help_flags`](crate::ParserSettings):
/// the builtin help/version rows are listed only when the parser accepts them.
pub fn render_help(command: &Command, ancestors: &[&Command], help_flags: bool) -> String {
    let mut out = String::new();
    let title = command_line(command, ancestors);
    if command.summary.trim().is_empty() {
        out.push_str(&format!("{title}\n"));
    } else {
        out.push_str(&format!("{title} - {}\n", command.summary.trim()));
    }

    out.push_str(&format!("\n{}\n", usage(command, ancestors)));

    if !command.description.trim().is_empty() {
        out.push('\n');
        out.push_str(command.description.trim_end());
        out.push('\n');
    }

    let mut options: Vec<(String, String)> = command
        .options()
        .iter()
        .filter(|o| !o.hidden)
        .map(|o| (option_left(o), option_help(o)))
        .collect();
    options.extend(builtin_rows(command, help_flags));
    push_table(&mut out, "Options", options);

    let arguments = command
        .positionals()
        .iter()
        .map(|p| (synopsis_positional(p), positional_help(p)))
        .collect();
    push_table(&mut out, "Arguments", arguments);

    let commands = command
        .subcommands()
        .filter(|c| !c.hidden)
        .map(|c| {
            let mut names = vec![c.name().to_string()];
            names.extend(c.aliases.iter().cloned());
            (names.join(", "), c.summary.trim().to_string())
        })
        .collect();
    push_table(&mut out, "Commands", commands);

    out
}

pub fn render_version(command: &Command) -> String {
    if command.version.trim().is_empty() {
        format!("{}\n", command.name())
    } else {
        format!("{} {}\n", command.name(), command.version.trim())
    }
}

/// One-line summary (or a list for several failures), the usage line of the
/// command the parser had reached, and a pointer to `--help` when
/// `help_flags` is set and the command leaves `--help` to the parser.
pub fn render_error(err: &ParseError, root: &Command, help_flags: bool) -> String {
    let below_root = err.command_path().get(1..).unwrap_or_default();
    let chain = root
        .resolve_path(below_root)
        .unwrap_or_else(|| vec![root]);
    let (command, ancestors) = match chain.split_last() {
        Some((last, rest)) => (*last, rest),
        None => (root, &[][..]),
    };

    let mut out = String::new();
    match err.failures() {
        [single] => out.push_str(&format!("error: {single}\n")),
        many => {
            out.push_str(&format!("error: {} problems found:\n", many.len()));
            for failure in many {
                out.push_str(&format!("  - {failure}\n"));
            }
        }
    }
    out.push_str(&format!("\n{}\n", usage(command, ancestors)));
    if help_flags && !command.has_alias("--help") {
        out.push_str("\nFor more information, try '--help'.\n");
    }
    out
}
