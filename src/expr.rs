use std::collections::BTreeMap;
use std::fmt;

use crate::error::{CalcError, Outcome};
use crate::number::Number;

/// Values substituted for free variables, keyed by variable name.
pub type Bindings = BTreeMap<String, Expression>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogBase {
    Natural,
    Decimal,
}

impl LogBase {
    pub fn name(self) -> &'static str {
        match self {
            LogBase::Natural => "ln",
            LogBase::Decimal => "lg",
        }
    }
}

/// An immutable expression tree.
///
/// Trees are only ever built through the constructors below and are never
/// mutated afterwards, so a template stored in a namespace can be called any
/// number of times.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Const(Number),
    FreeVariable(String),
    /// Explicit parentheses. Only affects rendering.
    Grouped(Box<Expression>),
    Negated(Box<Expression>),
    Power(Box<Expression>, Box<Expression>),
    Product(Box<Expression>, Box<Expression>),
    Quotient(Box<Expression>, Box<Expression>),
    Sum(Box<Expression>, Box<Expression>),
    Difference(Box<Expression>, Box<Expression>),
    Logarithm(LogBase, Box<Expression>),
    /// A template together with values for some of its free variables.
    Bound(Box<Expression>, Bindings),
}

const SUM: u8 = 1;
const PRODUCT: u8 = 2;
const POWER: u8 = 3;
const ATOM: u8 = 4;

impl Expression {
    pub fn constant(number: Number) -> Self {
        Expression::Const(number)
    }

    pub fn free_variable(name: impl Into<String>) -> Self {
        Expression::FreeVariable(name.into())
    }

    pub fn group(inner: Expression) -> Self {
        Expression::Grouped(Box::new(inner))
    }

    pub fn negate(inner: Expression) -> Self {
        Expression::Negated(Box::new(inner))
    }

    pub fn power(base: Expression, exponent: Expression) -> Self {
        Expression::Power(Box::new(base), Box::new(exponent))
    }

    pub fn product(lhs: Expression, rhs: Expression) -> Self {
        Expression::Product(Box::new(lhs), Box::new(rhs))
    }

    pub fn quotient(lhs: Expression, rhs: Expression) -> Self {
        Expression::Quotient(Box::new(lhs), Box::new(rhs))
    }

    pub fn sum(lhs: Expression, rhs: Expression) -> Self {
        Expression::Sum(Box::new(lhs), Box::new(rhs))
    }

    pub fn difference(lhs: Expression, rhs: Expression) -> Self {
        Expression::Difference(Box::new(lhs), Box::new(rhs))
    }

    pub fn logarithm(base: LogBase, inner: Expression) -> Self {
        Expression::Logarithm(base, Box::new(inner))
    }

    /// Evaluates the tree bottom-up. A free variable that nothing binds makes
    /// the whole evaluation fail with [`CalcError::UnboundVariable`].
    pub fn value(&self) -> Outcome<Number> {
        match self {
            Expression::Const(n) => Ok(*n),
            Expression::FreeVariable(name) => Err(CalcError::UnboundVariable { name: name.clone() }),
            Expression::Grouped(inner) => inner.value(),
            Expression::Negated(inner) => inner.value()?.negate(),
            Expression::Power(a, b) => a.value()?.pow(b.value()?),
            Expression::Product(a, b) => a.value()?.multiply(b.value()?),
            Expression::Quotient(a, b) => a.value()?.divide(b.value()?),
            Expression::Sum(a, b) => a.value()?.add(b.value()?),
            Expression::Difference(a, b) => a.value()?.subtract(b.value()?),
            Expression::Logarithm(LogBase::Natural, inner) => inner.value()?.ln(),
            Expression::Logarithm(LogBase::Decimal, inner) => inner.value()?.lg(),
            Expression::Bound(..) => self.expand().value(),
        }
    }

    /// Names of the free variables, in order of first appearance from left to right.
    pub fn free_variables(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.expand().collect_free_variables(&mut names);
        names
    }

    /// Binds free variables by name. Names that aren't free in `self` are
    /// dropped; variables without a binding stay free. `self` is untouched.
    pub fn call(&self, mut bindings: Bindings) -> Expression {
        let free = self.free_variables();
        bindings.retain(|name, _| free.contains(name));
        if bindings.is_empty() {
            return self.clone();
        }
        Expression::Bound(Box::new(self.clone()), bindings)
    }

    /// Textual form using the input grammar.
    pub fn description(&self) -> String {
        self.to_string()
    }

    /// The equivalent tree with every `Bound` node substituted away.
    pub fn expand(&self) -> Expression {
        self.substitute(&Bindings::new())
    }

    /// Replaces free variables found in `scope`. Values in `scope` must already
    /// be expanded; they are inserted as they are, never substituted again.
    fn substitute(&self, scope: &Bindings) -> Expression {
        match self {
            Expression::FreeVariable(name) => scope.get(name).cloned().unwrap_or_else(|| self.clone()),
            Expression::Bound(template, bindings) => {
                // Binding values belong to the caller, so they resolve in the outer scope.
                let mut inner = scope.clone();
                for (name, value) in bindings {
                    inner.insert(name.clone(), value.substitute(scope));
                }
                template.substitute(&inner)
            }
            _ => self.map_children(|child| child.substitute(scope)),
        }
    }

    fn map_children(&self, mut f: impl FnMut(&Expression) -> Expression) -> Expression {
        match self {
            Expression::Const(_) | Expression::FreeVariable(_) => self.clone(),
            Expression::Grouped(inner) => Expression::Grouped(Box::new(f(inner))),
            Expression::Negated(inner) => Expression::Negated(Box::new(f(inner))),
            Expression::Logarithm(base, inner) => Expression::Logarithm(*base, Box::new(f(inner))),
            Expression::Power(a, b) => Expression::Power(Box::new(f(a)), Box::new(f(b))),
            Expression::Product(a, b) => Expression::Product(Box::new(f(a)), Box::new(f(b))),
            Expression::Quotient(a, b) => Expression::Quotient(Box::new(f(a)), Box::new(f(b))),
            Expression::Sum(a, b) => Expression::Sum(Box::new(f(a)), Box::new(f(b))),
            Expression::Difference(a, b) => Expression::Difference(Box::new(f(a)), Box::new(f(b))),
            Expression::Bound(template, bindings) => {
                Expression::Bound(Box::new(f(template)), bindings.clone())
            }
        }
    }

    fn collect_free_variables(&self, names: &mut Vec<String>) {
        match self {
            Expression::Const(_) => {}
            Expression::FreeVariable(name) => {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
            Expression::Grouped(inner) | Expression::Negated(inner) | Expression::Logarithm(_, inner) => {
                inner.collect_free_variables(names)
            }
            Expression::Power(a, b)
            | Expression::Product(a, b)
            | Expression::Quotient(a, b)
            | Expression::Sum(a, b)
            | Expression::Difference(a, b) => {
                a.collect_free_variables(names);
                b.collect_free_variables(names);
            }
            Expression::Bound(..) => self.expand().collect_free_variables(names),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expression::Sum(..) | Expression::Difference(..) => SUM,
            Expression::Product(..) | Expression::Quotient(..) | Expression::Negated(_) => PRODUCT,
            Expression::Const(n) if n.is_negative() || n.renders_as_product() => PRODUCT,
            Expression::Power(..) => POWER,
            Expression::Bound(template, _) => template.precedence(),
            _ => ATOM,
        }
    }

    fn render(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Const(n) => write!(f, "{n}"),
            Expression::FreeVariable(name) => f.write_str(name),
            Expression::Grouped(inner) => {
                f.write_str("(")?;
                inner.render(f)?;
                f.write_str(")")
            }
            Expression::Logarithm(base, inner) => {
                write!(f, "{}(", base.name())?;
                inner.render(f)?;
                f.write_str(")")
            }
            Expression::Negated(inner) => {
                f.write_str("-")?;
                inner.render_wrapped(f, inner.precedence() < POWER)
            }
            Expression::Power(a, b) => self.render_binary(f, a, "^", b),
            Expression::Product(a, b) => self.render_binary(f, a, "*", b),
            Expression::Quotient(a, b) => self.render_binary(f, a, "/", b),
            Expression::Sum(a, b) => self.render_binary(f, a, "+", b),
            Expression::Difference(a, b) => self.render_binary(f, a, "-", b),
            Expression::Bound(..) => self.expand().render(f),
        }
    }

    /// Every level folds left to right, so only the right operand needs
    /// parentheses at equal precedence.
    fn render_binary(
        &self,
        f: &mut fmt::Formatter<'_>,
        lhs: &Expression,
        op: &str,
        rhs: &Expression,
    ) -> fmt::Result {
        let own = self.precedence();
        lhs.render_wrapped(f, lhs.precedence() < own)?;
        f.write_str(op)?;
        rhs.render_wrapped(f, rhs.precedence() <= own)
    }

    fn render_wrapped(&self, f: &mut fmt::Formatter<'_>, parenthesize: bool) -> fmt::Result {
        if parenthesize {
            f.write_str("(")?;
            self.render(f)?;
            f.write_str(")")
        } else {
            self.render(f)
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.expand().render(f)
    }
}
