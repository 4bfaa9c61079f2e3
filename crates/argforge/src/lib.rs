//! Declarative command-line parsing.
//!
//! Declare a [`Command`] tree once (options, positionals, nested
//! subcommands), then parse any number of argv vectors against it:
//!
//! - [`lexer`] classifies raw tokens (long/short/positional/separator).
//! - [`parser`] binds tokens to declarations, applying env and defaults.
//! - [`value`] and [`validate`] convert and check bound values.
//! - [`help`] renders usage, help pages and error reports.
//!
//! ```
//! use argforge::{Command, OptionSpec, ParseOutcome, ValueType, parse};
//!
//! let mut cmd = Command::new("tool");
//! cmd.add_option(OptionSpec {
//!     value_type: ValueType::Integer,
//!     ..OptionSpec::value("count", &["-c", "--count"])
//! })
//! .unwrap();
//!
//! let ParseOutcome::Matches(m) = parse(&cmd, &["-c", "3"]).unwrap() else {
//!     unreachable!();
//! };
//! assert_eq!(m.get_int("count"), Some(3));
//! ```

pub mod command;
pub mod error;
pub mod help;
pub mod lexer;
pub mod matches;
pub mod parser;
pub mod validate;
pub mod value;

pub use command::{Arity, Command, Multiplicity, OptionSpec, PositionalSpec};
pub use error::{ConfigurationError, Error, Failure, ParseError, ParseErrorKind};
pub use matches::{Bound, Matches, ValueSource};
pub use parser::{ParseOutcome, Parser, ParserSettings, parse};
pub use validate::{Validator, validate};
pub use value::{BoolLiterals, Converter, PathCheck, PathKind, Value, ValueType};
