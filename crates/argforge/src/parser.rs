//! The parser/binder: walks tokens against a [`Command`] tree and binds values.

use crate::command::{Arity, Command, Multiplicity, OptionSpec, PositionalSpec};
use crate::error::{Error, Failure, ParseError, ParseErrorKind};
use crate::help;
use crate::lexer::{Lexer, Token, TokenKind};
use crate::matches::{Matches, ValueSource};
use crate::validate::{Validator, validate};
use crate::value::{BoolLiterals, Value, ValueType};

/// Policy toggles for token interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserSettings {
    /// Accept unambiguous prefixes of long options (`--verb` for `--verbose`).
    pub allow_abbreviated_options: bool,
    /// Let a value-taking short option take the rest of its cluster as its
    /// value (`-ofile`). When off it must be the last char of the cluster.
    pub attached_short_values: bool,
    /// Recognize `-h/--help` and `-V/--version` unless the command declares them.
    pub help_flags: bool,
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self {
            allow_abbreviated_options: false,
            attached_short_values: true,
            help_flags: true,
        }
    }
}

/// Result of a parse that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Matches(Matches),
    /// Rendered help for the command where `--help` appeared.
    Help(String),
    Version(String),
}

/// Something that stops the scan before binding completes.
enum Interrupt {
    Help(String),
    Version(String),
    Fail(Failure),
}

impl From<Failure> for Interrupt {
    fn from(failure: Failure) -> Self {
        Self::Fail(failure)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolved {
    Option(usize),
    Help,
    Version,
}

/// One appearance of an option in argv, with its raw values.
#[derive(Debug)]
struct Occurrence<'a> {
    values: Vec<(usize, &'a str)>,
}

/// Everything collected for one command before binding.
struct Scan<'a> {
    occurrences: Vec<Vec<Occurrence<'a>>>,
    candidates: Vec<(usize, &'a str)>,
    child: Option<(&'a Command, &'a [String], usize)>,
}

/// Parses argv against a command tree.
///
/// The tree is only read, so one `Command` can back many parsers at once.
#[derive(Debug, Clone)]
pub struct Parser<'c> {
    command: &'c Command,
    settings: ParserSettings,
    env: Vec<(String, String)>,
}

impl<'c> Parser<'c> {
    pub fn new(command: &'c Command) -> Self {
        Self {
            command,
            settings: ParserSettings::default(),
            env: Vec::new(),
        }
    }

    pub fn with_settings(mut self, settings: ParserSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Use `env` as the value source for options that declare `env`.
    ///
    /// Precedence is argv, then env, then the declared default.
    pub fn with_env<I, K, V>(mut self, env: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = env.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self
    }

    pub fn settings(&self) -> &ParserSettings {
        &self.settings
    }

    /// Parse `argv` (without the program name).
    pub fn parse<S: AsRef<str>>(&self, argv: &[S]) -> Result<ParseOutcome, Error> {
        self.command.validate()?;
        let args: Vec<String> = argv.iter().map(|s| s.as_ref().to_string()).collect();

        let mut failures = Vec::new();
        let mut reached = Vec::new();
        let outcome = self.parse_command(self.command, &[], &args, 0, &mut failures, &mut reached);
        match outcome {
            Ok(matches) if failures.is_empty() => {
                tracing::debug!(path = ?matches.command_path(), "parse succeeded");
                Ok(ParseOutcome::Matches(matches))
            }
            Ok(_) => {
                tracing::debug!(count = failures.len(), "parse failed");
                Err(ParseError::new(failures, reached).into())
            }
            Err(Interrupt::Help(text)) => Ok(ParseOutcome::Help(text)),
            Err(Interrupt::Version(text)) => Ok(ParseOutcome::Version(text)),
            Err(Interrupt::Fail(failure)) => {
                tracing::debug!(error = %failure, "parse stopped");
                Err(ParseError::new(vec![failure], reached).into())
            }
        }
    }

    fn parse_command<'a>(
        &self,
        command: &'a Command,
        ancestors: &[&'a Command],
        args: &'a [String],
        offset: usize,
        failures: &mut Vec<Failure>,
        reached: &mut Vec<String>,
    ) -> Result<Matches, Interrupt> {
        tracing::debug!(command = command.name(), tokens = args.len(), "parsing command");
        reached.push(command.name().to_string());

        let scan = self.scan(command, ancestors, args, offset)?;

        let mut matches = Matches::new(command.name());
        self.bind_positionals(command, &scan.candidates, &mut matches, failures)?;
        self.bind_options(command, &scan.occurrences, &mut matches, failures)?;
        check_relations(command, &matches, failures);

        match scan.child {
            Some((child, rest, rest_offset)) => {
                tracing::debug!(subcommand = child.name(), "dispatching to subcommand");
                let mut chain = ancestors.to_vec();
                chain.push(command);
                let sub = self.parse_command(child, &chain, rest, rest_offset, failures, reached)?;
                matches.set_subcommand(sub);
            }
            None if command.subcommand_required && command.has_subcommands() => {
                let missing = ParseErrorKind::MissingSubcommand {
                    available: visible_subcommands(command),
                };
                report(Failure::new(missing), failures)?;
            }
            None => {}
        }
        Ok(matches)
    }

    /// Classify tokens for one command until argv ends or a subcommand starts.
    fn scan<'a>(
        &self,
        command: &'a Command,
        ancestors: &[&'a Command],
        args: &'a [String],
        offset: usize,
    ) -> Result<Scan<'a>, Interrupt> {
        let mut lexer = Lexer::new(args, offset, command);
        let mut scan = Scan {
            occurrences: command.options().iter().map(|_| Vec::new()).collect(),
            candidates: Vec::new(),
            child: None,
        };
        let min_positionals = command.min_positionals();
        let max_positionals = command.max_positionals();

        while let Some(token) = lexer.next() {
            match token.kind {
                TokenKind::Separator => {}
                TokenKind::Long { name, value } => {
                    let flag = format!("--{name}");
                    match self.resolve_long(command, name, &token)? {
                        Resolved::Help => {
                            let text = help::render_help(command, ancestors, self.settings.help_flags);
                            return Err(Interrupt::Help(text));
                        }
                        Resolved::Version => {
                            return Err(Interrupt::Version(help::render_version(command)));
                        }
                        Resolved::Option(index) => {
                            let spec = &command.options()[index];
                            if !spec.takes_value() && value.is_some() {
                                return Err(Failure::at(
                                    ParseErrorKind::UnexpectedValue { name: flag },
                                    token.raw,
                                    token.position,
                                )
                                .into());
                            }
                            let mut values = Vec::new();
                            if let Some(v) = value {
                                values.push((token.position, v));
                            }
                            take_values(spec, &flag, &mut lexer, &mut values, &token)?;
                            scan.occurrences[index].push(Occurrence { values });
                        }
                    }
                }
                TokenKind::Short { cluster } => {
                    self.short_cluster(command, ancestors, cluster, &token, &mut lexer, &mut scan)?;
                }
                TokenKind::Positional(text) => {
                    let may_dispatch = !lexer.is_positional_only()
                        && command.has_subcommands()
                        && scan.candidates.len() >= min_positionals;
                    if may_dispatch {
                        if let Some(child) = command.subcommand(text) {
                            let (rest, rest_offset) = lexer.remaining();
                            scan.child = Some((child, rest, rest_offset));
                            break;
                        }
                        let full = max_positionals.is_some_and(|max| scan.candidates.len() >= max);
                        if full && !command.allow_passthrough {
                            return Err(Failure::at(
                                ParseErrorKind::UnknownSubcommand {
                                    name: text.to_string(),
                                    available: visible_subcommands(command),
                                },
                                text,
                                token.position,
                            )
                            .into());
                        }
                    }
                    scan.candidates.push((token.position, text));
                }
            }
        }
        Ok(scan)
    }

    fn short_cluster<'a>(
        &self,
        command: &'a Command,
        ancestors: &[&'a Command],
        cluster: &'a str,
        token: &Token<'a>,
        lexer: &mut Lexer<'a>,
        scan: &mut Scan<'a>,
    ) -> Result<(), Interrupt> {
        for (at, c) in cluster.char_indices() {
            let flag = format!("-{c}");
            let index = match command.option_index(&flag) {
                Some(index) => index,
                None => match self.builtin(command, &flag) {
                    Some(Resolved::Help) => {
                        let text = help::render_help(command, ancestors, self.settings.help_flags);
                        return Err(Interrupt::Help(text));
                    }
                    Some(Resolved::Version) => {
                        return Err(Interrupt::Version(help::render_version(command)));
                    }
                    _ => {
                        return Err(Failure::at(
                            ParseErrorKind::UnknownOption { name: flag },
                            token.raw,
                            token.position,
                        )
                        .into());
                    }
                },
            };

            let spec = &command.options()[index];
            if !spec.takes_value() {
                scan.occurrences[index].push(Occurrence { values: Vec::new() });
                continue;
            }

            // The first value-taking option ends the cluster; `-f=v` binds `v`.
            let rest = &cluster[at + c.len_utf8()..];
            let attached = match rest.strip_prefix('=') {
                Some(value) => Some(value),
                None => (!rest.is_empty()).then_some(rest),
            };
            let mut values = Vec::new();
            if let Some(attached) = attached {
                if !self.settings.attached_short_values {
                    return Err(Failure::at(
                        ParseErrorKind::ArityMismatch {
                            name: flag,
                            expected: spec.arity.describe(),
                            found: 0,
                        },
                        token.raw,
                        token.position,
                    )
                    .into());
                }
                values.push((token.position, attached));
            }
            take_values(spec, &flag, lexer, &mut values, token)?;
            scan.occurrences[index].push(Occurrence { values });
            return Ok(());
        }
        Ok(())
    }

    fn builtin(&self, command: &Command, flag: &str) -> Option<Resolved> {
        if !self.settings.help_flags || command.has_alias(flag) {
            return None;
        }
        if help::HELP_ALIASES.contains(&flag) {
            Some(Resolved::Help)
        } else if help::VERSION_ALIASES.contains(&flag) && !command.version.trim().is_empty() {
            Some(Resolved::Version)
        } else {
            None
        }
    }

    /// Exact alias first, then builtins, then (if enabled) unique prefixes.
    fn resolve_long(&self, command: &Command, name: &str, token: &Token<'_>) -> Result<Resolved, Failure> {
        let flag = format!("--{name}");
        if let Some(index) = command.option_index(&flag) {
            return Ok(Resolved::Option(index));
        }
        if let Some(builtin) = self.builtin(command, &flag) {
            return Ok(builtin);
        }

        if self.settings.allow_abbreviated_options && !name.is_empty() {
            let mut hits: Vec<(String, Resolved)> = Vec::new();
            for (index, spec) in command.options().iter().enumerate() {
                for alias in spec.long_aliases() {
                    if alias.starts_with(&flag) {
                        hits.push((alias.to_string(), Resolved::Option(index)));
                    }
                }
            }
            for alias in ["--help", "--version"] {
                if alias.starts_with(&flag) {
                    if let Some(builtin) = self.builtin(command, alias) {
                        hits.push((alias.to_string(), builtin));
                    }
                }
            }

            let mut targets: Vec<Resolved> = hits.iter().map(|(_, r)| *r).collect();
            targets.dedup();
            match targets.as_slice() {
                [single] => {
                    tracing::trace!(prefix = %flag, "abbreviated option resolved");
                    return Ok(*single);
                }
                [] => {}
                _ => {
                    let mut candidates: Vec<String> = hits.into_iter().map(|(a, _)| a).collect();
                    candidates.sort();
                    return Err(Failure::at(
                        ParseErrorKind::AmbiguousOption {
                            name: flag,
                            candidates,
                        },
                        token.raw,
                        token.position,
                    ));
                }
            }
        }

        Err(Failure::at(
            ParseErrorKind::UnknownOption { name: flag },
            token.raw,
            token.position,
        ))
    }

    fn bind_positionals(
        &self,
        command: &Command,
        candidates: &[(usize, &str)],
        matches: &mut Matches,
        failures: &mut Vec<Failure>,
    ) -> Result<(), Interrupt> {
        let specs = command.positionals();
        let available = candidates.len();
        let fixed_total: usize = specs
            .iter()
            .filter(|p| p.arity.is_fixed())
            .map(|p| p.arity.min())
            .sum();
        let flexible = specs.iter().find(|p| !p.arity.is_fixed()).map(|p| p.arity);
        let flexible_min = flexible.map(|a| a.min()).unwrap_or(0);

        if available < fixed_total + flexible_min {
            // Hand out tokens left to right; fields that get their minimum
            // are still converted and validated.
            let mut cursor = 0;
            for spec in specs {
                let need = spec.arity.min();
                let remaining = available - cursor;
                if remaining >= need {
                    bind_positional(spec, &candidates[cursor..cursor + need], matches, failures);
                    cursor += need;
                    continue;
                }
                let failure = if remaining > 0 {
                    let (position, text) = candidates[available - 1];
                    let kind = ParseErrorKind::ArityMismatch {
                        name: spec.display_name(),
                        expected: spec.arity.describe(),
                        found: remaining,
                    };
                    Failure::at(kind, text, position)
                } else {
                    Failure::new(ParseErrorKind::MissingRequiredArgument {
                        name: spec.display_name(),
                    })
                };
                report(failure, failures)?;
                cursor = available;
            }
            return Ok(());
        }

        let flexible_take = match flexible {
            Some(Arity::Optional) => (available - fixed_total).min(1),
            Some(_) => available - fixed_total,
            None => 0,
        };
        let takes: Vec<usize> = specs
            .iter()
            .map(|p| match p.arity {
                Arity::Fixed(n) => n,
                _ => flexible_take,
            })
            .collect();
        let consumed: usize = takes.iter().sum();

        for &(position, text) in &candidates[consumed..] {
            if !command.allow_passthrough {
                let kind = ParseErrorKind::UnexpectedArgument {
                    value: text.to_string(),
                };
                report(Failure::at(kind, text, position), failures)?;
            }
            matches.push_rest(text);
        }

        let mut cursor = 0;
        for (spec, take) in specs.iter().zip(takes) {
            let slice = &candidates[cursor..cursor + take];
            cursor += take;
            bind_positional(spec, slice, matches, failures);
        }
        Ok(())
    }

    fn bind_options(
        &self,
        command: &Command,
        occurrences: &[Vec<Occurrence<'_>>],
        matches: &mut Matches,
        failures: &mut Vec<Failure>,
    ) -> Result<(), Interrupt> {
        for (spec, seen) in command.options().iter().zip(occurrences) {
            if seen.is_empty() {
                self.bind_absent_option(spec, matches, failures)?;
                continue;
            }
            let value = match spec.multiplicity {
                Multiplicity::Count => Some(Value::Int(seen.len() as i64)),
                Multiplicity::Overwrite => seen
                    .last()
                    .and_then(|last| convert_occurrence(spec, last, failures)),
                Multiplicity::Accumulate => {
                    let converted: Vec<Option<Value>> = seen
                        .iter()
                        .map(|occ| convert_occurrence(spec, occ, failures))
                        .collect();
                    converted.into_iter().collect::<Option<Vec<_>>>().map(Value::List)
                }
            };
            if let Some(value) = value {
                bind_validated(
                    &spec.name,
                    spec.display_name(),
                    value,
                    ValueSource::CommandLine,
                    &spec.validators,
                    matches,
                    failures,
                );
            }
        }
        Ok(())
    }

    fn bind_absent_option(
        &self,
        spec: &OptionSpec,
        matches: &mut Matches,
        failures: &mut Vec<Failure>,
    ) -> Result<(), Interrupt> {
        if let Some(raw) = spec.env.as_deref().and_then(|key| self.env_lookup(key)) {
            let converted = match (spec.takes_value(), spec.multiplicity) {
                (false, Multiplicity::Count) => ValueType::Integer.convert(raw),
                (false, _) => ValueType::Boolean(BoolLiterals::default()).convert(raw),
                (true, _) if spec.arity.is_scalar() => spec.value_type.convert(raw),
                (true, _) => {
                    let parts: Vec<&str> = raw.split_whitespace().collect();
                    if !spec.arity.accepts(parts.len()) {
                        let kind = ParseErrorKind::ArityMismatch {
                            name: spec.display_name().to_string(),
                            expected: spec.arity.describe(),
                            found: parts.len(),
                        };
                        let failure = Failure {
                            kind,
                            token: Some(raw.to_string()),
                            position: None,
                        };
                        return report(failure, failures);
                    }
                    parts
                        .into_iter()
                        .map(|part| spec.value_type.convert(part))
                        .collect::<Result<Vec<_>, _>>()
                        .map(Value::List)
                }
            };
            match converted {
                Ok(value) => {
                    let value = if spec.multiplicity == Multiplicity::Accumulate {
                        Value::List(vec![value])
                    } else {
                        value
                    };
                    bind_validated(
                        &spec.name,
                        spec.display_name(),
                        value,
                        ValueSource::Env,
                        &spec.validators,
                        matches,
                        failures,
                    );
                }
                Err(message) => failures.push(Failure::new(ParseErrorKind::Conversion {
                    name: spec.display_name().to_string(),
                    value: raw.to_string(),
                    message,
                })),
            }
            return Ok(());
        }

        if spec.required {
            let missing = ParseErrorKind::MissingRequiredOption {
                name: spec.display_name().to_string(),
            };
            report(Failure::new(missing), failures)?;
        } else if let Some(default) = &spec.default {
            matches.bind(&spec.name, default.clone(), ValueSource::Default);
        }
        Ok(())
    }

    fn env_lookup(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Read the values an option needs after its flag (and any inline value).
fn take_values<'a>(
    spec: &OptionSpec,
    flag: &str,
    lexer: &mut Lexer<'a>,
    values: &mut Vec<(usize, &'a str)>,
    token: &Token<'_>,
) -> Result<(), Failure> {
    match spec.arity {
        Arity::Fixed(n) => {
            while values.len() < n {
                match lexer.next_value() {
                    Some(value) => values.push(value),
                    None => break,
                }
            }
        }
        // A subcommand name ends the list.
        Arity::Variadic { .. } => {
            while !lexer.peek_is_option() && !lexer.peek_is_subcommand() {
                match lexer.next_value() {
                    Some(value) => values.push(value),
                    None => break,
                }
            }
        }
        Arity::Optional => {}
    }

    if values.len() < spec.arity.min() {
        return Err(Failure::at(
            ParseErrorKind::ArityMismatch {
                name: flag.to_string(),
                expected: spec.arity.describe(),
                found: values.len(),
            },
            token.raw,
            token.position,
        ));
    }
    Ok(())
}

/// Structural failures stop the parse; field failures are collected.
fn report(failure: Failure, failures: &mut Vec<Failure>) -> Result<(), Interrupt> {
    if failure.kind.is_structural() {
        return Err(failure.into());
    }
    failures.push(failure);
    Ok(())
}

/// Convert one occurrence. Every bad value is reported, then `None`.
fn convert_occurrence(spec: &OptionSpec, occ: &Occurrence<'_>, failures: &mut Vec<Failure>) -> Option<Value> {
    if !spec.takes_value() {
        return Some(Value::Bool(true));
    }
    let values = convert_all(spec.display_name(), &spec.value_type, &occ.values, failures)?;
    Some(shape(spec.arity, values))
}

fn convert_all(
    display: &str,
    value_type: &ValueType,
    raw: &[(usize, &str)],
    failures: &mut Vec<Failure>,
) -> Option<Vec<Value>> {
    let mut out = Vec::with_capacity(raw.len());
    let mut ok = true;
    for &(position, text) in raw {
        match value_type.convert(text) {
            Ok(value) => out.push(value),
            Err(message) => {
                ok = false;
                failures.push(Failure::at(
                    ParseErrorKind::Conversion {
                        name: display.to_string(),
                        value: text.to_string(),
                        message,
                    },
                    text,
                    position,
                ));
            }
        }
    }
    ok.then_some(out)
}

/// Scalar for single-value arities, list otherwise.
fn shape(arity: Arity, mut values: Vec<Value>) -> Value {
    if arity.is_scalar() && values.len() == 1 {
        values.remove(0)
    } else {
        Value::List(values)
    }
}

fn bind_positional(
    spec: &PositionalSpec,
    slice: &[(usize, &str)],
    matches: &mut Matches,
    failures: &mut Vec<Failure>,
) {
    if slice.is_empty() {
        if let Some(default) = &spec.default {
            matches.bind(&spec.name, default.clone(), ValueSource::Default);
        }
        return;
    }
    let display = spec.display_name();
    if let Some(values) = convert_all(&display, &spec.value_type, slice, failures) {
        bind_validated(
            &spec.name,
            &display,
            shape(spec.arity, values),
            ValueSource::CommandLine,
            &spec.validators,
            matches,
            failures,
        );
    }
}

fn bind_validated(
    name: &str,
    display: &str,
    value: Value,
    source: ValueSource,
    validators: &[Validator],
    matches: &mut Matches,
    failures: &mut Vec<Failure>,
) {
    match validate(&value, validators) {
        Ok(()) => matches.bind(name, value, source),
        Err(messages) => failures.push(Failure::new(ParseErrorKind::Validation {
            name: display.to_string(),
            value: value.to_string(),
            messages,
        })),
    }
}

/// `conflicts_with` / `requires` between fields given on the command line.
fn check_relations(command: &Command, matches: &Matches, failures: &mut Vec<Failure>) {
    let options = command.options();
    for (index, spec) in options.iter().enumerate() {
        if !matches.is_explicit(&spec.name) {
            continue;
        }
        for other in &spec.conflicts_with {
            if !matches.is_explicit(other) {
                continue;
            }
            // A pair declared from both sides is reported once.
            let mirrored = options[..index]
                .iter()
                .any(|o| o.name == *other && o.conflicts_with.contains(&spec.name));
            if !mirrored {
                failures.push(Failure::new(ParseErrorKind::Conflict {
                    name: spec.display_name().to_string(),
                    other: command.field_display_name(other),
                }));
            }
        }
        for other in &spec.requires {
            if !matches.is_explicit(other) {
                failures.push(Failure::new(ParseErrorKind::MissingDependency {
                    name: spec.display_name().to_string(),
                    other: command.field_display_name(other),
                }));
            }
        }
    }
}

fn visible_subcommands(command: &Command) -> Vec<String> {
    command
        .subcommands()
        .filter(|c| !c.hidden)
        .map(|c| c.name().to_string())
        .collect()
}

/// Parse `argv` against `command` with default settings and no environment.
pub fn parse<S: AsRef<str>>(command: &Command, argv: &[S]) -> Result<ParseOutcome, Error> {
    Parser::new(command).parse(argv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn build() -> Command {
        let mut build = Command::new("build");
        build.summary = "Compile the project".to_string();
        build
            .add_option(OptionSpec::flag("release", &["-r", "--release"]))
            .unwrap();

        let mut root = Command::new("tool");
        root.version = "1.2.0".to_string();
        root.add_option(OptionSpec {
            value_type: ValueType::Integer,
            default: Some(Value::Int(1)),
            ..OptionSpec::value("count", &["-c", "--count"])
        })
        .unwrap()
        .add_option(OptionSpec::flag("verbose", &["-v", "--verbose"]))
        .unwrap()
        .add_subcommand(build)
        .unwrap();
        root
    }

    fn matches(command: &Command, argv: &[&str]) -> Matches {
        match parse(command, argv).unwrap() {
            ParseOutcome::Matches(m) => m,
            other => panic!("expected matches, got {other:?}"),
        }
    }

    fn parse_error(command: &Command, argv: &[&str]) -> ParseError {
        match parse(command, argv) {
            Err(Error::Parse(err)) => err,
            other => panic!("expected a parse error, got {other:?}"),
        }
    }

    #[test]
    fn value_then_subcommand() {
        let root = build();
        let m = matches(&root, &["--count", "3", "build"]);
        assert_eq!(m.get_int("count"), Some(3));
        assert_eq!(m.subcommand_path(), vec!["build"]);
        assert!(!m.leaf().flag("release"));
    }

    #[test]
    fn empty_argv_binds_defaults() {
        let root = build();
        let m = matches(&root, &[] as &[&str]);
        assert_eq!(m.get_int("count"), Some(1));
        assert_eq!(m.source("count"), Some(ValueSource::Default));
        assert!(!m.contains("verbose"));
        assert!(m.subcommand().is_none());
    }

    #[test]
    fn short_cluster_with_trailing_value() {
        let mut cmd = Command::new("tar");
        cmd.add_option(OptionSpec::flag("extract", &["-x"]))
            .unwrap()
            .add_option(OptionSpec::flag("verbose", &["-v"]))
            .unwrap()
            .add_option(OptionSpec::value("file", &["-f"]))
            .unwrap();

        let m = matches(&cmd, &["-xvf", "file.txt"]);
        assert!(m.flag("extract"));
        assert!(m.flag("verbose"));
        assert_eq!(m.get_str("file"), Some("file.txt"));

        let m = matches(&cmd, &["-xfarchive.tar"]);
        assert_eq!(m.get_str("file"), Some("archive.tar"));
        assert!(!m.flag("verbose"));

        let m = matches(&cmd, &["-f=v"]);
        assert_eq!(m.get_str("file"), Some("v"));
        let m = matches(&cmd, &["-xf=a=b"]);
        assert_eq!(m.get_str("file"), Some("a=b"));
        let m = matches(&cmd, &["-f="]);
        assert_eq!(m.get_str("file"), Some(""));
    }

    #[test]
    fn strict_clusters_reject_attached_values() {
        let mut cmd = Command::new("tar");
        cmd.add_option(OptionSpec::flag("extract", &["-x"]))
            .unwrap()
            .add_option(OptionSpec::value("file", &["-f"]))
            .unwrap();
        let parser = Parser::new(&cmd).with_settings(ParserSettings {
            attached_short_values: false,
            ..Default::default()
        });

        assert!(parser.parse(&["-xf", "a.tar"]).is_ok());
        let err = parser.parse(&["-fx"]).unwrap_err();
        let Error::Parse(err) = err else {
            panic!("expected a parse error");
        };
        assert!(matches!(err.kind(), ParseErrorKind::ArityMismatch { name, .. } if name == "-f"));
    }

    #[test]
    fn choice_conversion_reports_value_and_choices() {
        let mut cmd = Command::new("run");
        cmd.add_option(OptionSpec {
            value_type: ValueType::choice(["fast", "slow"]),
            ..OptionSpec::value("mode", &["--mode"])
        })
        .unwrap();

        let m = matches(&cmd, &["--mode=fast"]);
        assert_eq!(m.get_str("mode"), Some("fast"));

        let err = parse_error(&cmd, &["--mode=turbo"]);
        let ParseErrorKind::Conversion { name, value, message } = err.kind() else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(name, "--mode");
        assert_eq!(value, "turbo");
        assert!(message.contains("fast") && message.contains("slow"), "{message}");
        assert_eq!(err.failures()[0].position, Some(0));
    }

    #[test]
    fn multiplicity_rules() {
        let mut cmd = Command::new("cc");
        cmd.add_option(OptionSpec {
            multiplicity: Multiplicity::Accumulate,
            ..OptionSpec::value("include", &["-I", "--include"])
        })
        .unwrap()
        .add_option(OptionSpec::value("out", &["-o"]))
        .unwrap()
        .add_option(OptionSpec {
            multiplicity: Multiplicity::Count,
            ..OptionSpec::flag("verbose", &["-v"])
        })
        .unwrap();

        let m = matches(&cmd, &["-I", "a", "-o", "x", "--include=b", "-vvv", "-o", "y", "-v"]);
        assert_eq!(
            m.get_list("include"),
            Some(&[Value::from("a"), Value::from("b")][..])
        );
        assert_eq!(m.get_str("out"), Some("y"));
        assert_eq!(m.get_int("verbose"), Some(4));
    }

    #[test]
    fn abbreviations_are_opt_in() {
        let mut cmd = Command::new("app");
        cmd.add_option(OptionSpec::flag("verbose", &["--verbose"]))
            .unwrap()
            .add_option(OptionSpec::flag("version-check", &["--version-check"]))
            .unwrap()
            .add_option(OptionSpec::flag("dry-run", &["--dry-run"]))
            .unwrap();

        let err = parse_error(&cmd, &["--dry"]);
        assert!(matches!(err.kind(), ParseErrorKind::UnknownOption { name } if name == "--dry"));

        let parser = Parser::new(&cmd).with_settings(ParserSettings {
            allow_abbreviated_options: true,
            ..Default::default()
        });
        let Ok(ParseOutcome::Matches(m)) = parser.parse(&["--dry"]) else {
            panic!("prefix should resolve");
        };
        assert!(m.flag("dry-run"));

        let Err(Error::Parse(err)) = parser.parse(&["--ver"]) else {
            panic!("prefix should be ambiguous");
        };
        let ParseErrorKind::AmbiguousOption { candidates, .. } = err.kind() else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(candidates, &["--verbose", "--version-check"]);
    }

    #[test]
    fn negative_numbers_bind_as_values() {
        let mut cmd = Command::new("calc");
        cmd.add_option(OptionSpec {
            value_type: ValueType::Float,
            ..OptionSpec::value("offset", &["--offset"])
        })
        .unwrap()
        .add_positional(PositionalSpec {
            value_type: ValueType::Integer,
            ..PositionalSpec::new("n", Arity::Fixed(1))
        })
        .unwrap();

        let m = matches(&cmd, &["--offset", "-2.5", "-7"]);
        assert_eq!(m.get_float("offset"), Some(-2.5));
        assert_eq!(m.get_int("n"), Some(-7));
    }

    #[test]
    fn env_sits_between_argv_and_default() {
        let mut cmd = Command::new("srv");
        cmd.add_option(OptionSpec {
            value_type: ValueType::Integer,
            env: Some("SRV_PORT".to_string()),
            default: Some(Value::Int(80)),
            ..OptionSpec::value("port", &["--port"])
        })
        .unwrap()
        .add_option(OptionSpec {
            env: Some("SRV_DEBUG".to_string()),
            ..OptionSpec::flag("debug", &["--debug"])
        })
        .unwrap();

        let parser = Parser::new(&cmd).with_env([("SRV_PORT", "8080"), ("SRV_DEBUG", "yes")]);
        let Ok(ParseOutcome::Matches(m)) = parser.parse(&[] as &[&str]) else {
            panic!("env should bind");
        };
        assert_eq!(m.get_int("port"), Some(8080));
        assert_eq!(m.source("port"), Some(ValueSource::Env));
        assert!(m.flag("debug"));

        let Ok(ParseOutcome::Matches(m)) = parser.parse(&["--port", "9"]) else {
            panic!("argv should bind");
        };
        assert_eq!(m.get_int("port"), Some(9));
        assert!(m.is_explicit("port"));

        let m = matches(&cmd, &[] as &[&str]);
        assert_eq!(m.get_int("port"), Some(80));
    }

    #[test]
    fn multi_value_env_must_match_arity() {
        let mut cmd = Command::new("plot");
        cmd.add_option(OptionSpec {
            arity: Arity::Fixed(2),
            value_type: ValueType::Integer,
            env: Some("PT".to_string()),
            ..OptionSpec::value("point", &["--point"])
        })
        .unwrap()
        .add_option(OptionSpec {
            arity: Arity::Variadic { min: 1 },
            env: Some("TAGS".to_string()),
            ..OptionSpec::value("tags", &["--tags"])
        })
        .unwrap();

        let parser = Parser::new(&cmd).with_env([("PT", "3 4"), ("TAGS", "a b c")]);
        let Ok(ParseOutcome::Matches(m)) = parser.parse(&[] as &[&str]) else {
            panic!("env should bind");
        };
        assert_eq!(
            m.get_list("point"),
            Some(&[Value::Int(3), Value::Int(4)][..])
        );
        assert_eq!(m.get_list("tags").map(<[Value]>::len), Some(3));

        let parser = Parser::new(&cmd).with_env([("PT", "5")]);
        let Err(Error::Parse(err)) = parser.parse(&[] as &[&str]) else {
            panic!("one value for a two-value option");
        };
        assert_eq!(err.failures().len(), 1);
        assert!(matches!(
            err.kind(),
            ParseErrorKind::ArityMismatch { name, expected, found: 1 }
                if name == "--point" && expected == "2"
        ));

        let parser = Parser::new(&cmd).with_env([("TAGS", "  ")]);
        let Err(Error::Parse(err)) = parser.parse(&[] as &[&str]) else {
            panic!("blank env for a non-empty list");
        };
        assert!(matches!(
            err.kind(),
            ParseErrorKind::ArityMismatch { name, found: 0, .. } if name == "--tags"
        ));
    }

    #[test]
    fn empty_argv_reports_missing_required_option() {
        let mut cmd = Command::new("login");
        cmd.add_option(OptionSpec {
            required: true,
            ..OptionSpec::value("user", &["-u", "--user"])
        })
        .unwrap();

        let err = parse_error(&cmd, &[] as &[&str]);
        assert_eq!(err.failures().len(), 1);
        assert!(matches!(
            err.kind(),
            ParseErrorKind::MissingRequiredOption { name } if name == "--user"
        ));
        assert_eq!(err.command_path(), &["login".to_string()]);
    }

    #[test]
    fn field_errors_are_aggregated() {
        let mut cmd = Command::new("job");
        cmd.add_option(OptionSpec {
            required: true,
            ..OptionSpec::value("name", &["--name"])
        })
        .unwrap()
        .add_option(OptionSpec {
            value_type: ValueType::Integer,
            ..OptionSpec::value("retries", &["--retries"])
        })
        .unwrap()
        .add_option(OptionSpec {
            value_type: ValueType::Integer,
            validators: vec![Validator::range(1.0, 10.0)],
            ..OptionSpec::value("level", &["--level"])
        })
        .unwrap();

        let err = parse_error(&cmd, &["--retries", "many", "--level", "42"]);
        let kinds: Vec<_> = err.failures().iter().map(|f| &f.kind).collect();
        assert_eq!(kinds.len(), 3, "{err}");
        assert!(matches!(kinds[0], ParseErrorKind::MissingRequiredOption { name } if name == "--name"));
        assert!(matches!(kinds[1], ParseErrorKind::Conversion { value, .. } if value == "many"));
        assert!(matches!(kinds[2], ParseErrorKind::Validation { name, .. } if name == "--level"));
    }

    #[test]
    fn structural_errors_stop_immediately() {
        let root = build();
        let err = parse_error(&root, &["--nope", "--count", "x"]);
        assert_eq!(err.failures().len(), 1);
        assert!(matches!(err.kind(), ParseErrorKind::UnknownOption { name } if name == "--nope"));

        let err = parse_error(&root, &["--verbose=yes"]);
        assert!(matches!(err.kind(), ParseErrorKind::UnexpectedValue { .. }));

        let err = parse_error(&root, &["--count"]);
        assert!(matches!(
            err.kind(),
            ParseErrorKind::ArityMismatch { found: 0, .. }
        ));
    }

    #[test]
    fn subcommand_errors() {
        let mut root = build();
        let err = parse_error(&root, &["deploy"]);
        let ParseErrorKind::UnknownSubcommand { name, available } = err.kind() else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(name, "deploy");
        assert_eq!(available, &["build"]);

        root.subcommand_required = true;
        let err = parse_error(&root, &["-v"]);
        assert!(matches!(err.kind(), ParseErrorKind::MissingSubcommand { .. }));
        assert_eq!(err.command_path(), &["tool".to_string()]);

        let err = parse_error(&root, &["build", "--bogus"]);
        assert_eq!(err.command_path(), &["tool".to_string(), "build".to_string()]);
    }

    #[test]
    fn positionals_split_around_variadic() {
        let mut cmd = Command::new("cp");
        cmd.add_positional(PositionalSpec::new("src", Arity::Variadic { min: 1 }))
            .unwrap()
            .add_positional(PositionalSpec::new("dest", Arity::Fixed(1)))
            .unwrap();

        let m = matches(&cmd, &["a", "b", "c", "out"]);
        assert_eq!(
            m.get_list("src"),
            Some(&[Value::from("a"), Value::from("b"), Value::from("c")][..])
        );
        assert_eq!(m.get_str("dest"), Some("out"));

        let err = parse_error(&cmd, &["only"]);
        assert!(matches!(
            err.kind(),
            ParseErrorKind::MissingRequiredArgument { name } if name == "<DEST>"
        ));
    }

    #[test]
    fn short_positionals_still_convert_what_was_given() {
        let mut cmd = Command::new("cp");
        cmd.add_positional(PositionalSpec {
            value_type: ValueType::Integer,
            ..PositionalSpec::new("n", Arity::Fixed(1))
        })
        .unwrap()
        .add_positional(PositionalSpec::new("dest", Arity::Fixed(1)))
        .unwrap();

        let err = parse_error(&cmd, &["abc"]);
        let kinds: Vec<_> = err.failures().iter().map(|f| &f.kind).collect();
        assert_eq!(kinds.len(), 2, "{err}");
        assert!(matches!(
            kinds[0],
            ParseErrorKind::Conversion { name, value, .. } if name == "<N>" && value == "abc"
        ));
        assert!(matches!(
            kinds[1],
            ParseErrorKind::MissingRequiredArgument { name } if name == "<DEST>"
        ));
        assert_eq!(err.failures()[0].position, Some(0));
    }

    #[test]
    fn variadic_option_stops_at_subcommand_name() {
        let mut root = build();
        root.add_option(OptionSpec {
            arity: Arity::Variadic { min: 1 },
            ..OptionSpec::value("tags", &["--tags"])
        })
        .unwrap();

        let m = matches(&root, &["--tags", "a", "b", "build", "-r"]);
        assert_eq!(
            m.get_list("tags"),
            Some(&[Value::from("a"), Value::from("b")][..])
        );
        assert_eq!(m.subcommand_path(), vec!["build"]);
        assert!(m.leaf().flag("release"));

        let err = parse_error(&root, &["--tags", "build"]);
        assert!(matches!(
            err.kind(),
            ParseErrorKind::ArityMismatch { name, found: 0, .. } if name == "--tags"
        ));
    }

    #[test]
    fn separator_and_passthrough() {
        let mut cmd = Command::new("exec");
        cmd.allow_passthrough = true;
        cmd.add_option(OptionSpec::flag("quiet", &["-q"]))
            .unwrap()
            .add_positional(PositionalSpec::new("program", Arity::Fixed(1)))
            .unwrap();

        let m = matches(&cmd, &["-q", "--", "ls", "-la", "--color"]);
        assert!(m.flag("quiet"));
        assert_eq!(m.get_str("program"), Some("ls"));
        assert_eq!(m.rest(), &["-la".to_string(), "--color".to_string()]);

        cmd.allow_passthrough = false;
        let err = parse_error(&cmd, &["ls", "extra"]);
        assert!(matches!(
            err.kind(),
            ParseErrorKind::UnexpectedArgument { value } if value == "extra"
        ));
    }

    #[test]
    fn relations_between_explicit_options() {
        let mut cmd = Command::new("fmt");
        cmd.add_option(OptionSpec {
            conflicts_with: vec!["check".to_string()],
            ..OptionSpec::flag("write", &["--write"])
        })
        .unwrap()
        .add_option(OptionSpec {
            conflicts_with: vec!["write".to_string()],
            ..OptionSpec::flag("check", &["--check"])
        })
        .unwrap()
        .add_option(OptionSpec {
            requires: vec!["check".to_string()],
            ..OptionSpec::flag("diff", &["--diff"])
        })
        .unwrap();

        let err = parse_error(&cmd, &["--write", "--check"]);
        assert_eq!(err.failures().len(), 1);
        assert!(matches!(err.kind(), ParseErrorKind::Conflict { name, other } if name == "--write" && other == "--check"));

        let err = parse_error(&cmd, &["--diff"]);
        assert!(matches!(err.kind(), ParseErrorKind::MissingDependency { .. }));

        assert!(parse(&cmd, &["--diff", "--check"]).is_ok());
    }

    #[test]
    fn help_stops_the_scan() {
        let root = build();
        let Ok(ParseOutcome::Help(text)) = parse(&root, &["-h", "--bogus", "extra"]) else {
            panic!("expected help");
        };
        assert!(text.starts_with("tool"), "{text}");

        let err = parse_error(&root, &["--bogus", "-h"]);
        assert!(matches!(err.kind(), ParseErrorKind::UnknownOption { .. }));
    }

    #[test]
    fn help_renders_for_reached_command() {
        let root = build();
        let Ok(ParseOutcome::Help(text)) = parse(&root, &["build", "--help"]) else {
            panic!("expected help");
        };
        assert!(text.contains("Usage: tool build"), "{text}");

        let Ok(ParseOutcome::Version(text)) = parse(&root, &["-V", "--nope"]) else {
            panic!("expected version");
        };
        assert!(text.contains("1.2.0"));

        let parser = Parser::new(&root).with_settings(ParserSettings {
            help_flags: false,
            ..Default::default()
        });
        assert!(parser.parse(&["--help"]).is_err());
    }

    #[test]
    fn unknown_configuration_reference_fails_before_parsing() {
        let mut cmd = Command::new("app");
        cmd.add_option(OptionSpec {
            requires: vec!["ghost".to_string()],
            ..OptionSpec::flag("a", &["-a"])
        })
        .unwrap();
        let err = parse(&cmd, &[] as &[&str]).unwrap_err();
        assert_eq!(err.exit_code(), 1);
        assert!(matches!(err, Error::Configuration(_)));
    }
}
