mod schema;

use anyhow::{Context, Result, bail};
use argforge::help::{render_error, render_help, usage};
use argforge::{Command, Error, ParseOutcome, ParserSettings};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt};

use crate::schema::{load_schema, write_default_schema};

#[derive(Parser)]
#[command(name = "argforge", disable_help_subcommand = true)]
#[command(version, about = "Parse command lines against a JSON command schema", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter argforge.json
    Init(InitArgs),

    /// Parse ARGS against the schema and print the bound values as JSON
    Parse(ParseArgs),

    /// Print help for the schema's root command or a subcommand
    Help(HelpArgs),

    /// Build the schema and report configuration errors
    Check(CheckArgs),
}

#[derive(Parser)]
struct InitArgs {
    /// Project directory (default: current directory)
    #[arg(value_name = "DIR")]
    dir: Option<PathBuf>,

    /// Root command name (default: directory name)
    #[arg(short, long)]
    name: Option<String>,

    /// Replace an existing argforge.json
    #[arg(long)]
    force: bool,
}

#[derive(Parser)]
struct ParseArgs {
    /// Path to the command schema (default: ./argforge.json)
    #[arg(short, long, value_name = "FILE")]
    schema: Option<PathBuf>,

    /// Accept unambiguous prefixes of long options
    #[arg(long)]
    abbrev: bool,

    /// Require value-taking short options to end their cluster
    #[arg(long)]
    strict_clusters: bool,

    /// Ignore environment variables declared by options
    #[arg(long)]
    no_env: bool,

    /// Arguments to parse (after `--`)
    #[arg(last = true, value_name = "ARGS")]
    args: Vec<String>,
}

#[derive(Parser)]
struct HelpArgs {
    /// Path to the command schema (default: ./argforge.json)
    #[arg(short, long, value_name = "FILE")]
    schema: Option<PathBuf>,

    /// Subcommand names leading to the command to describe
    #[arg(value_name = "PATH")]
    path: Vec<String>,
}

#[derive(Parser)]
struct CheckArgs {
    /// Path to the command schema (default: ./argforge.json)
    #[arg(short, long, value_name = "FILE")]
    schema: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Init(args) => init(args),
        Commands::Parse(args) => parse(args),
        Commands::Help(args) => help(args),
        Commands::Check(args) => check(args),
    }
}

fn init(args: InitArgs) -> Result<()> {
    let dir = args.dir.unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create directory: {}", dir.display()))?;

    let path = write_default_schema(&dir, args.name.as_deref(), args.force)?;

    eprintln!("Created: {}", path.display());
    eprintln!("\nNext steps:");
    eprintln!("  1. Edit argforge.json to describe your command");
    eprintln!("  2. Run: argforge check");
    eprintln!("  3. Run: argforge parse -- greet --shout");
    Ok(())
}

fn parse(args: ParseArgs) -> Result<()> {
    tracing::debug!(args = ?args.args, "executing parse command");
    let loaded = load_schema(args.schema.as_deref())?;
    let command = loaded.build()?;

    let settings = ParserSettings {
        allow_abbreviated_options: args.abbrev,
        attached_short_values: !args.strict_clusters,
        ..Default::default()
    };
    let mut parser = argforge::Parser::new(&command).with_settings(settings);
    if !args.no_env {
        parser = parser.with_env(std::env::vars());
    }

    match parser.parse(&args.args) {
        Ok(ParseOutcome::Matches(matches)) => {
            let json = serde_json::to_string_pretty(&matches).context("failed to serialize matches")?;
            println!("{json}");
            Ok(())
        }
        Ok(ParseOutcome::Help(text)) | Ok(ParseOutcome::Version(text)) => {
            print!("{text}");
            std::io::stdout().flush().context("failed to write to stdout")?;
            Ok(())
        }
        Err(Error::Parse(err)) => {
            tracing::debug!(failures = err.failures().len(), "parse failed");
            eprint!("{}", render_error(&err, &command, settings.help_flags));
            std::process::exit(err.exit_code());
        }
        Err(err @ Error::Configuration(_)) => {
            Err(err).with_context(|| format!("invalid command schema: {}", loaded.path.display()))
        }
    }
}

fn help(args: HelpArgs) -> Result<()> {
    let loaded = load_schema(args.schema.as_deref())?;
    let command = loaded.build()?;

    let Some(chain) = command.resolve_path(&args.path) else {
        bail!("unknown subcommand path: {}", args.path.join(" "));
    };
    let (target, ancestors) = match chain.split_last() {
        Some((last, rest)) => (*last, rest),
        None => (&command, &[][..]),
    };
    print!("{}", render_help(target, ancestors, true));
    Ok(())
}

fn check(args: CheckArgs) -> Result<()> {
    let loaded = load_schema(args.schema.as_deref())?;
    let command = loaded.build()?;

    let mut stats = Stats::default();
    let mut lines = Vec::new();
    walk(&command, &mut Vec::new(), &mut stats, &mut lines);

    println!(
        "{}: ok ({} commands, {} options, {} positionals)",
        loaded.path.display(),
        stats.commands,
        stats.options,
        stats.positionals
    );
    for line in lines {
        println!("  {line}");
    }
    Ok(())
}

#[derive(Default)]
struct Stats {
    commands: usize,
    options: usize,
    positionals: usize,
}

/// Count declarations and collect the usage line of every visible command.
fn walk<'a>(command: &'a Command, ancestors: &mut Vec<&'a Command>, stats: &mut Stats, lines: &mut Vec<String>) {
    stats.commands += 1;
    stats.options += command.options().len();
    stats.positionals += command.positionals().len();
    if !command.hidden {
        lines.push(usage(command, ancestors));
    }
    ancestors.push(command);
    for child in command.subcommands() {
        walk(child, ancestors, stats, lines);
    }
    ancestors.pop();
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
