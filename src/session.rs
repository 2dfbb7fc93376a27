use log::{debug, warn};
use miette::SourceSpan;

use crate::env::{Environment, Namespace};
use crate::error::{CalcError, Outcome};
use crate::expr::Expression;
use crate::lexer::{Lexer, TokenKind};
use crate::number::Number;
use crate::parser::parse;

/// What a line produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Blank line.
    Empty,
    Exit,
    /// `key=description` lines of one namespace.
    Listing(Vec<String>),
    Assigned { name: String, description: String },
    /// `value` is `None` while the expression still has free variables.
    Evaluated {
        description: String,
        value: Option<Number>,
    },
}

impl std::fmt::Display for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reply::Empty | Reply::Exit => Ok(()),
            Reply::Listing(lines) => write!(f, "{}", lines.join("\n")),
            Reply::Assigned { name, description } => write!(f, "{name}={description}"),
            Reply::Evaluated {
                description,
                value: Some(value),
            } => write!(f, "{description} = {value}"),
            Reply::Evaluated {
                description,
                value: None,
            } => write!(f, "{description}"),
        }
    }
}

/// One calculator session: the namespace tables plus the line commands that
/// read and update them.
#[derive(Debug, Default)]
pub struct Session {
    env: Environment,
}

impl Session {
    pub fn new() -> Self {
        Self {
            env: Environment::new(),
        }
    }

    pub fn with_environment(env: Environment) -> Self {
        Self { env }
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Runs one line. Errors never end the session; the caller reports them
    /// and moves on to the next line.
    pub fn execute(&mut self, line: &str) -> Outcome<Reply> {
        let command = line.trim();
        if command.is_empty() {
            return Ok(Reply::Empty);
        }
        if command.starts_with("exit") {
            return Ok(Reply::Exit);
        }

        if let Some(index) = line.find("list ") {
            return self.list(line, index + "list ".len());
        }
        if let Some(index) = line.find("<<") {
            return self.assign(line, index);
        }

        let expr = parse(line, &self.env)?;
        let value = if expr.free_variables().is_empty() {
            Some(expr.value()?)
        } else {
            None
        };
        Ok(Reply::Evaluated {
            description: expr.description(),
            value,
        })
    }

    fn list(&self, line: &str, at: usize) -> Outcome<Reply> {
        let prefix: String = line[at..].chars().take(1).collect();
        let namespace = Namespace::from_prefix(&prefix).ok_or_else(|| CalcError::UnknownReference {
            name: prefix.clone(),
            span: Some(SourceSpan::from((at, prefix.len()))),
        })?;

        let lines = self
            .env
            .entries(namespace)
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        Ok(Reply::Listing(lines))
    }

    /// `target << expression`. Only user variables can be assigned; any other
    /// target namespace falls back to `u.` with a warning.
    fn assign(&mut self, line: &str, at: usize) -> Outcome<Reply> {
        let target = &line[..at];
        let offset = target.len() - target.trim_start().len();
        let target_span = SourceSpan::from((offset, target.trim().len()));

        let (namespace, key) = self.env.resolve(target, target_span)?;
        if !is_identifier(&key) {
            let err = CalcError::InvalidAssignmentTarget {
                target: target.trim().to_string(),
                span: target_span,
            };
            debug!("{err}");
            return Err(err);
        }

        // Blank out the target so spans in parse errors still point into `line`.
        let masked = format!("{}{}", " ".repeat(at + 2), &line[at + 2..]);
        let value = parse(&masked, &self.env)?;

        // A bare `name` resolves to the function table; it is a user variable here.
        if !matches!(namespace, Namespace::UserVariables | Namespace::Functions) {
            warn!("can't assign to constant namespace, assigning to u.{key} instead");
        }
        debug!("u.{key} << {value}");

        let description = value.description();
        self.env.assign(key.clone(), value);
        Ok(Reply::Assigned {
            name: format!("u.{key}"),
            description,
        })
    }

    /// Looks up a user variable, mainly for callers embedding the calculator.
    pub fn variable(&self, key: &str) -> Option<&Expression> {
        self.env.lookup(Namespace::UserVariables, key)
    }
}

/// Whether `key` lexes as exactly one identifier.
fn is_identifier(key: &str) -> bool {
    let mut tokens = Lexer::new(key);
    matches!(
        (tokens.next(), tokens.next()),
        (Some(token), None) if token.kind == TokenKind::Ident && token.slice == key
    )
}
