use std::collections::BTreeMap;

use miette::SourceSpan;

use crate::error::{CalcError, Outcome};
use crate::expr::{Expression, LogBase};
use crate::number::Number;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Mathematics,
    Chemistry,
    Physics,
    UserVariables,
    Functions,
}

impl Namespace {
    /// The namespace named by the part before the `.` of a reference.
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "u" => Some(Namespace::UserVariables),
            "m" => Some(Namespace::Mathematics),
            "c" => Some(Namespace::Chemistry),
            "p" => Some(Namespace::Physics),
            _ => None,
        }
    }

    pub fn prefix(self) -> &'static str {
        match self {
            Namespace::UserVariables => "u",
            Namespace::Mathematics => "m",
            Namespace::Chemistry => "c",
            Namespace::Physics => "p",
            Namespace::Functions => "",
        }
    }
}

/// The named tables a line is parsed against.
///
/// The calculator core only reads from it. The driver owns it and is the only
/// place that assigns user variables, between lines.
#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    mathematics: BTreeMap<String, Expression>,
    chemistry: BTreeMap<String, Expression>,
    physics: BTreeMap<String, Expression>,
    user_variables: BTreeMap<String, Expression>,
    functions: BTreeMap<String, Expression>,
    selected: Namespace,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    /// An environment holding the built-in constants and functions.
    pub fn new() -> Self {
        let mut env = Self::empty();

        let ln = Expression::logarithm(LogBase::Natural, Expression::free_variable("a"));
        let lg = Expression::logarithm(LogBase::Decimal, Expression::free_variable("a"));
        env.functions.insert("ln".into(), ln);
        env.functions.insert("lg".into(), lg);

        let constant = |value, figures| Expression::constant(Number::measured(value, figures));
        define_aliased(&mut env.chemistry, &["R", "r"], constant(8.3144, 5));
        define_aliased(&mut env.chemistry, &["F", "f"], constant(96485.33, 7));
        define_aliased(&mut env.physics, &["C", "c"], constant(299792458.0, 9));
        define_aliased(&mut env.physics, &["G", "g"], constant(9.80665, 6));
        env.mathematics.insert("pi".into(), constant(std::f64::consts::PI, 15));
        env.mathematics.insert("e".into(), constant(std::f64::consts::E, 15));

        env
    }

    /// No constants, no functions, no variables.
    pub fn empty() -> Self {
        Self {
            mathematics: BTreeMap::new(),
            chemistry: BTreeMap::new(),
            physics: BTreeMap::new(),
            user_variables: BTreeMap::new(),
            functions: BTreeMap::new(),
            selected: Namespace::UserVariables,
        }
    }

    /// Splits a reference into namespace and key.
    ///
    /// `name` without a dot refers to the function table, `.name` to the
    /// selected namespace and `p.name` to the namespace with prefix `p`.
    pub fn resolve(&self, dotted: &str, span: SourceSpan) -> Outcome<(Namespace, String)> {
        let fields: Vec<&str> = dotted.trim().split('.').collect();
        match fields.as_slice() {
            [key] => Ok((Namespace::Functions, key.to_string())),
            [prefix, key] => {
                let namespace = if prefix.is_empty() {
                    self.selected
                } else {
                    Namespace::from_prefix(prefix).ok_or_else(|| CalcError::UnknownReference {
                        name: prefix.to_string(),
                        span: Some(span),
                    })?
                };
                Ok((namespace, key.to_string()))
            }
            _ => Err(CalcError::MalformedNamespaceReference {
                name: dotted.to_string(),
                span,
            }),
        }
    }

    pub fn lookup(&self, namespace: Namespace, key: &str) -> Option<&Expression> {
        self.table(namespace).get(key)
    }

    /// Stores `value` as the user variable `key`, replacing any previous one.
    pub fn assign(&mut self, key: impl Into<String>, value: Expression) {
        self.user_variables.insert(key.into(), value);
    }

    /// Entries of `namespace` in key order.
    pub fn entries(&self, namespace: Namespace) -> impl Iterator<Item = (&String, &Expression)> {
        self.table(namespace).iter()
    }

    fn table(&self, namespace: Namespace) -> &BTreeMap<String, Expression> {
        match namespace {
            Namespace::Mathematics => &self.mathematics,
            Namespace::Chemistry => &self.chemistry,
            Namespace::Physics => &self.physics,
            Namespace::UserVariables => &self.user_variables,
            Namespace::Functions => &self.functions,
        }
    }
}

fn define_aliased(table: &mut BTreeMap<String, Expression>, names: &[&str], value: Expression) {
    for name in names {
        table.insert(name.to_string(), value.clone());
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Namespace::Functions => write!(f, "<functions>"),
            _ => write!(f, "{}.", self.prefix()),
        }
    }
}
