//! Token classification for raw argv.
//!
//! Classification never fails: unknown option names are reported later by the
//! parser, which knows what each option expects.

use crate::command::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind<'a> {
    /// `--name` or `--name=value` (name without the dashes).
    Long {
        name: &'a str,
        value: Option<&'a str>,
    },
    /// `-abc` (cluster without the dash).
    Short { cluster: &'a str },
    Positional(&'a str),
    /// The literal `--`; everything after it is positional.
    Separator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
    pub raw: &'a str,
    /// Index in the full argv (not the slice being lexed).
    pub position: usize,
}

/// Lazily classifies `args` against the options of one command.
///
/// When the parser descends into a subcommand it starts a fresh lexer over
/// [`Lexer::remaining`] with the child command's option table.
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    args: &'a [String],
    cursor: usize,
    offset: usize,
    command: &'a Command,
    positional_only: bool,
}

impl<'a> Lexer<'a> {
    /// `offset` is the argv position of `args[0]`.
    pub fn new(args: &'a [String], offset: usize, command: &'a Command) -> Self {
        Self {
            args,
            cursor: 0,
            offset,
            command,
            positional_only: false,
        }
    }

    pub fn classify(&self, raw: &'a str) -> TokenKind<'a> {
        if self.positional_only {
            return TokenKind::Positional(raw);
        }
        if raw == "--" {
            return TokenKind::Separator;
        }
        if let Some(body) = raw.strip_prefix("--") {
            return match body.split_once('=') {
                Some((name, value)) => TokenKind::Long {
                    name,
                    value: Some(value),
                },
                None => TokenKind::Long {
                    name: body,
                    value: None,
                },
            };
        }
        if let Some(cluster) = raw.strip_prefix('-') {
            if cluster.is_empty() {
                return TokenKind::Positional(raw);
            }
            if is_negative_number(raw) && !self.claims_number(raw, cluster) {
                return TokenKind::Positional(raw);
            }
            return TokenKind::Short { cluster };
        }
        TokenKind::Positional(raw)
    }

    /// A negative number stays an option when the command declares it.
    fn claims_number(&self, raw: &str, cluster: &str) -> bool {
        self.command.has_alias(raw) || cluster.chars().next().is_some_and(|c| self.command.has_short(c))
    }

    /// Next raw token as an option value. The separator is never a value and
    /// is left in place.
    pub fn next_value(&mut self) -> Option<(usize, &'a str)> {
        let raw = self.args.get(self.cursor)?.as_str();
        if !self.positional_only && raw == "--" {
            return None;
        }
        let position = self.offset + self.cursor;
        self.cursor += 1;
        Some((position, raw))
    }

    /// Whether the next token would classify as an option or separator.
    pub fn peek_is_option(&self) -> bool {
        self.args
            .get(self.cursor)
            .is_some_and(|raw| !matches!(self.classify(raw), TokenKind::Positional(_)))
    }

    /// Whether the next token names a subcommand of this lexer's command.
    pub fn peek_is_subcommand(&self) -> bool {
        !self.positional_only
            && self
                .args
                .get(self.cursor)
                .is_some_and(|raw| self.command.subcommand(raw).is_some())
    }

    /// Unconsumed tokens and the argv position of the first one.
    pub fn remaining(&self) -> (&'a [String], usize) {
        (&self.args[self.cursor..], self.offset + self.cursor)
    }

    pub fn is_positional_only(&self) -> bool {
        self.positional_only
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let raw = self.args.get(self.cursor)?.as_str();
        let kind = self.classify(raw);
        let position = self.offset + self.cursor;
        self.cursor += 1;
        if kind == TokenKind::Separator {
            self.positional_only = true;
        }
        tracing::trace!(position, ?kind, "token");
        Some(Token {
            kind,
            raw,
            position,
        })
    }
}

fn is_negative_number(raw: &str) -> bool {
    let mut chars = raw.chars().skip(1);
    matches!(chars.next(), Some(c) if c.is_ascii_digit() || c == '.') && raw.parse::<f64>().is_ok()
}
