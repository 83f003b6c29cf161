//! Parser for BRUCE/KYLIE command files.
//!
//! A command file is a sequence of commands, each a `#name` marker
//! followed by one `{ ... }` parameter block:
//!
//! ```text
//! #waveband
//! {
//!   start_wavelength:5000  wavelength_resolution:2
//!   finish_wavelength:5010
//! }
//! ```
//!
//! Inside a block, `param:value` sets a parameter (the value coerced with
//! [`Value::coerce`]) and a bare word sets a flag to `true`. A command may
//! repeat; each occurrence becomes one more entry in its list.

pub mod lexer;

use std::path::Path;

use tracing::debug;

use crate::error::{CardinalityViolation, KylieError, KylieResult};
use crate::model::{CommandFile, ParamMap, Value};
use lexer::{Lexer, Token};

/// Allowed number of occurrences of one command. `None` means unbounded;
/// a `min` of any value makes the command required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cardinality {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl Cardinality {
    pub fn exactly(n: usize) -> Self {
        Self {
            min: Some(n),
            max: Some(n),
        }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }
}

/// Cardinality rules, checked in insertion order.
#[derive(Debug, Clone, Default)]
pub struct GrammarRules {
    rules: Vec<(String, Cardinality)>,
}

impl GrammarRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(mut self, command: &str, cardinality: Cardinality) -> Self {
        self.rules.push((command.to_string(), cardinality));
        self
    }

    pub fn check(&self, comms: &CommandFile, origin: &str) -> KylieResult<()> {
        for (command, card) in &self.rules {
            let found = comms.count(command);
            let violation = match (card.min, card.max) {
                (Some(_), _) if !comms.contains(command) => Some(CardinalityViolation::Missing),
                (Some(min), _) if found < min => Some(CardinalityViolation::TooFew { found, min }),
                (_, Some(max)) if found > max => Some(CardinalityViolation::TooMany { found, max }),
                _ => None,
            };
            if let Some(violation) = violation {
                return Err(KylieError::Validation {
                    origin: origin.to_string(),
                    command: command.clone(),
                    violation,
                });
            }
        }
        Ok(())
    }
}

/// Read and parse a command file from disk.
pub fn parse_comm_file(path: &Path, rules: Option<&GrammarRules>) -> KylieResult<CommandFile> {
    let src = std::fs::read_to_string(path).map_err(|e| KylieError::io(path, e))?;
    parse_commands(&src, &path.display().to_string(), rules)
}

/// Parse command-file source. `origin` names the source in error messages.
pub fn parse_commands(
    src: &str,
    origin: &str,
    rules: Option<&GrammarRules>,
) -> KylieResult<CommandFile> {
    let comms = Parser::new(origin).parse(src)?;
    debug!("parsed {} distinct commands from {}", comms.iter().count(), origin);

    if let Some(rules) = rules {
        rules.check(&comms, origin)?;
    }
    Ok(comms)
}

enum State<'a> {
    TopLevel,
    /// Saw `#name`, waiting for its `{`
    Command(&'a str),
    Block(&'a str, ParamMap),
}

struct Parser<'o> {
    origin: &'o str,
    comms: CommandFile,
}

impl<'o> Parser<'o> {
    fn new(origin: &'o str) -> Self {
        Self {
            origin,
            comms: CommandFile::new(),
        }
    }

    fn error(&self, command: Option<&str>, line: usize, message: &str) -> KylieError {
        KylieError::Syntax {
            origin: self.origin.to_string(),
            command: command.map(str::to_string),
            message: format!("line {line}: {message}"),
        }
    }

    fn parse(mut self, src: &str) -> KylieResult<CommandFile> {
        let mut state = State::TopLevel;
        let mut line = 0;

        for spanned in Lexer::new(src) {
            line = spanned.line;
            state = match (state, spanned.token) {
                (State::TopLevel, Token::Command("")) => {
                    return Err(self.error(None, line, "empty command name after #"));
                }
                (State::TopLevel, Token::Command(name)) => State::Command(name),
                (State::TopLevel, tok) => {
                    return Err(self.error(None, line, &format!("missing # before {tok:?}")));
                }

                (State::Command(name), Token::Open) => State::Block(name, ParamMap::new()),
                (State::Command(name), Token::Command(_)) => {
                    return Err(self.error(Some(name), line, "misplaced #"));
                }
                (State::Command(name), Token::Close) => {
                    return Err(self.error(Some(name), line, "misplaced }"));
                }
                (State::Command(name), Token::Word(w)) => {
                    return Err(self.error(Some(name), line, &format!("expected {{, found `{w}`")));
                }

                (State::Block(name, params), Token::Close) => {
                    self.comms.push(name, params);
                    State::TopLevel
                }
                (State::Block(name, mut params), Token::Word(w)) => {
                    let (param, value) = split_param(w);
                    params.insert(param, value);
                    State::Block(name, params)
                }
                (State::Block(name, _), Token::Open) => {
                    return Err(self.error(Some(name), line, "misplaced {"));
                }
                (State::Block(name, _), Token::Command(_)) => {
                    return Err(self.error(Some(name), line, "misplaced #"));
                }
            };
        }

        match state {
            State::TopLevel => Ok(self.comms),
            State::Command(name) => Err(self.error(Some(name), line, "end of input before {")),
            State::Block(name, _) => Err(self.error(Some(name), line, "end of input before }")),
        }
    }
}

/// `param:value` with exactly one colon, otherwise a `true` flag.
fn split_param(word: &str) -> (&str, Value) {
    match word.split_once(':') {
        Some((param, value)) if !value.contains(':') => (param, Value::coerce(value)),
        _ => (word, Value::Bool(true)),
    }
}
