use log::{trace, warn};
use miette::SourceSpan;

use crate::error::{CalcError, Outcome};
use crate::expr::Expression;

/// A binary operator between two operands. The `Negated*` forms negate the
/// right operand first; they come from a trailing `-` such as `*-`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Power,
    NegatedPower,
    Multiply,
    NegatedMultiply,
    Divide,
    NegatedDivide,
    Add,
    Subtract,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Power,
    Product,
    Sum,
}

impl Operator {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '^' => Some(Operator::Power),
            '*' => Some(Operator::Multiply),
            '/' => Some(Operator::Divide),
            '+' => Some(Operator::Add),
            '-' => Some(Operator::Subtract),
            _ => None,
        }
    }

    /// What one more `-` turns this operator into.
    fn toggled(self) -> Self {
        match self {
            Operator::Power => Operator::NegatedPower,
            Operator::NegatedPower => Operator::Power,
            Operator::Multiply => Operator::NegatedMultiply,
            Operator::NegatedMultiply => Operator::Multiply,
            Operator::Divide => Operator::NegatedDivide,
            Operator::NegatedDivide => Operator::Divide,
            Operator::Add => Operator::Subtract,
            Operator::Subtract => Operator::Add,
        }
    }

    fn tier(self) -> Tier {
        match self {
            Operator::Power | Operator::NegatedPower => Tier::Power,
            Operator::Multiply
            | Operator::NegatedMultiply
            | Operator::Divide
            | Operator::NegatedDivide => Tier::Product,
            Operator::Add | Operator::Subtract => Tier::Sum,
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Operator::Power => "^",
                Operator::NegatedPower => "^-",
                Operator::Multiply => "*",
                Operator::NegatedMultiply => "*-",
                Operator::Divide => "/",
                Operator::NegatedDivide => "/-",
                Operator::Add => "+",
                Operator::Subtract => "-",
            }
        )
    }
}

/// Classifies the text between two operands.
///
/// `offset` is where `text` starts in the line and `leading` marks the slot
/// before the first operand, where blank text means "no operator" instead of
/// implicit multiplication.
pub fn resolve_operator(text: &str, offset: usize, leading: bool) -> Outcome<Option<Operator>> {
    let invalid = || {
        let start = offset + (text.len() - text.trim_start().len());
        CalcError::InvalidOperator {
            text: text.trim().to_string(),
            span: SourceSpan::from((start, text.trim().len())),
        }
    };

    let mut found: Option<Operator> = None;
    for c in text.chars().filter(|c| !c.is_whitespace()) {
        found = match found {
            None => Some(Operator::from_char(c).ok_or_else(invalid)?),
            Some(op) if c == '-' => Some(op.toggled()),
            Some(_) => return Err(invalid()),
        };
    }

    if found.is_none() && !leading {
        return Ok(Some(Operator::Multiply));
    }
    Ok(found)
}

/// One operand and the operator that precedes it.
#[derive(Debug)]
pub struct Term {
    pub operator: Option<Operator>,
    pub operand: Outcome<Expression>,
}

/// Folds terms into a single expression: powers, then products and
/// quotients, then the leading sign, then sums and differences. Each pass
/// runs left to right, so every level is left-associative.
///
/// Returns `None` when there are no terms at all.
pub fn reduce(terms: Vec<Term>) -> Option<Outcome<Expression>> {
    let terms = collapse(terms, Tier::Power);
    let mut terms = collapse(terms, Tier::Product).into_iter();

    let first = terms.next()?;
    let first = Term {
        operator: None,
        operand: apply_leading_sign(first),
    };
    let terms: Vec<Term> = std::iter::once(first).chain(terms).collect();

    collapse(terms, Tier::Sum)
        .into_iter()
        .next()
        .map(|term| term.operand)
}

fn apply_leading_sign(term: Term) -> Outcome<Expression> {
    match term.operator {
        None => term.operand,
        Some(Operator::Subtract) => term.operand.map(Expression::negate),
        Some(op) => {
            warn!("ignoring operator \"{op}\" preceding expression");
            term.operand
        }
    }
}

fn collapse(terms: Vec<Term>, tier: Tier) -> Vec<Term> {
    let mut out: Vec<Term> = Vec::with_capacity(terms.len());
    for term in terms {
        match (term.operator, out.pop()) {
            (Some(op), Some(prev)) if op.tier() == tier => {
                trace!("folding {op} at {tier:?} tier");
                out.push(Term {
                    operator: prev.operator,
                    operand: combine(op, prev.operand, term.operand),
                });
            }
            (_, prev) => {
                out.extend(prev);
                out.push(term);
            }
        }
    }
    out
}

/// The leftmost failure wins.
fn combine(op: Operator, lhs: Outcome<Expression>, rhs: Outcome<Expression>) -> Outcome<Expression> {
    let lhs = lhs?;
    let rhs = rhs?;
    Ok(match op {
        Operator::Power => Expression::power(lhs, rhs),
        Operator::NegatedPower => Expression::power(lhs, Expression::negate(rhs)),
        Operator::Multiply => Expression::product(lhs, rhs),
        Operator::NegatedMultiply => Expression::product(lhs, Expression::negate(rhs)),
        Operator::Divide => Expression::quotient(lhs, rhs),
        Operator::NegatedDivide => Expression::quotient(lhs, Expression::negate(rhs)),
        Operator::Add => Expression::sum(lhs, rhs),
        Operator::Subtract => Expression::difference(lhs, rhs),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::number::Number;
    use pretty_assertions::assert_eq;

    fn int(n: i64) -> Expression {
        Expression::constant(Number::integer(n))
    }

    fn terms(first: Option<Operator>, rest: &[(Operator, i64)], head: i64) -> Vec<Term> {
        let mut out = vec![Term {
            operator: first,
            operand: Ok(int(head)),
        }];
        out.extend(rest.iter().map(|&(op, n)| Term {
            operator: Some(op),
            operand: Ok(int(n)),
        }));
        out
    }

    #[test]
    fn test_resolve_plain_operators() {
        assert_eq!(resolve_operator("^", 0, false), Ok(Some(Operator::Power)));
        assert_eq!(resolve_operator(" * ", 0, false), Ok(Some(Operator::Multiply)));
        assert_eq!(resolve_operator("/", 0, false), Ok(Some(Operator::Divide)));
        assert_eq!(resolve_operator("+", 0, false), Ok(Some(Operator::Add)));
        assert_eq!(resolve_operator("-", 0, false), Ok(Some(Operator::Subtract)));
    }

    #[test]
    fn test_resolve_blank_text() {
        assert_eq!(resolve_operator("", 0, true), Ok(None));
        assert_eq!(resolve_operator("  ", 0, true), Ok(None));
        assert_eq!(resolve_operator("", 3, false), Ok(Some(Operator::Multiply)));
        assert_eq!(resolve_operator(" ", 3, false), Ok(Some(Operator::Multiply)));
    }

    #[test]
    fn test_resolve_toggles_with_minus() {
        assert_eq!(resolve_operator("*-", 0, false), Ok(Some(Operator::NegatedMultiply)));
        assert_eq!(resolve_operator("*--", 0, false), Ok(Some(Operator::Multiply)));
        assert_eq!(resolve_operator("^ -", 0, false), Ok(Some(Operator::NegatedPower)));
        assert_eq!(resolve_operator("/-", 0, false), Ok(Some(Operator::NegatedDivide)));
        assert_eq!(resolve_operator("--", 0, false), Ok(Some(Operator::Add)));
        assert_eq!(resolve_operator("+-", 0, false), Ok(Some(Operator::Subtract)));
    }

    #[test]
    fn test_resolve_rejects_other_characters() {
        assert_eq!(
            resolve_operator(" $ ", 4, false),
            Err(CalcError::InvalidOperator {
                text: "$".to_string(),
                span: SourceSpan::from((5, 1)),
            })
        );
        assert!(matches!(
            resolve_operator("*+", 0, false),
            Err(CalcError::InvalidOperator { .. })
        ));
    }

    #[test]
    fn test_reduce_empty() {
        assert!(reduce(vec![]).is_none());
    }

    #[test]
    fn test_reduce_power_is_left_associative() {
        let expr = reduce(terms(None, &[(Operator::Power, 3), (Operator::Power, 2)], 2))
            .unwrap()
            .unwrap();
        assert_eq!(expr, Expression::power(Expression::power(int(2), int(3)), int(2)));
        assert_eq!(expr.value(), Ok(Number::integer(64)));
    }

    #[test]
    fn test_reduce_precedence_tiers() {
        // 1 + 2 * 3 ^ 2
        let expr = reduce(terms(
            None,
            &[(Operator::Add, 2), (Operator::Multiply, 3), (Operator::Power, 2)],
            1,
        ))
        .unwrap()
        .unwrap();
        assert_eq!(expr.value(), Ok(Number::integer(19)));
        assert_eq!(expr.description(), "1+2*3^2");
    }

    #[test]
    fn test_reduce_negated_variants() {
        let expr = reduce(terms(None, &[(Operator::NegatedMultiply, 3)], 2))
            .unwrap()
            .unwrap();
        assert_eq!(expr, Expression::product(int(2), Expression::negate(int(3))));
        assert_eq!(expr.value(), Ok(Number::integer(-6)));
    }

    #[test]
    fn test_reduce_leading_minus_applies_after_products() {
        // -2^2 * 3 + 1
        let expr = reduce(terms(
            Some(Operator::Subtract),
            &[(Operator::Power, 2), (Operator::Multiply, 3), (Operator::Add, 1)],
            2,
        ))
        .unwrap()
        .unwrap();
        assert_eq!(expr.value(), Ok(Number::integer(-11)));
    }

    #[test]
    fn test_reduce_ignores_other_leading_operators() {
        let expr = reduce(terms(Some(Operator::Multiply), &[(Operator::Add, 1)], 2))
            .unwrap()
            .unwrap();
        assert_eq!(expr.value(), Ok(Number::integer(3)));
    }

    #[test]
    fn test_reduce_keeps_leftmost_failure() {
        let items = vec![
            Term {
                operator: None,
                operand: Ok(int(1)),
            },
            Term {
                operator: Some(Operator::Add),
                operand: Err(CalcError::DivisionByZero),
            },
            Term {
                operator: Some(Operator::Multiply),
                operand: Err(CalcError::Overflow),
            },
        ];
        assert_eq!(reduce(items), Some(Err(CalcError::DivisionByZero)));
    }
}
