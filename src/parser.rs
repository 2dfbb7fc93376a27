use log::{debug, warn};
use miette::SourceSpan;

use crate::env::{Environment, Namespace};
use crate::error::{CalcError, Outcome};
use crate::expr::{Bindings, Expression};
use crate::lexer::{Lexer, Token, TokenKind};
use crate::number::Number;
use crate::reducer::{reduce, resolve_operator, Term};

/// Parses one line against `env`.
pub fn parse(line: &str, env: &Environment) -> Outcome<Expression> {
    Parser::new(line, env).parse()
}

/// What ends the operand sequence being parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Line,
    Group,
    Argument,
}

/// Call arguments before they are matched against the callee's free variables.
#[derive(Debug, Default)]
struct Arguments {
    named: Vec<(String, Outcome<Expression>)>,
    positional: Vec<Outcome<Expression>>,
}

fn span(start: usize, end: usize) -> SourceSpan {
    SourceSpan::from((start, end - start))
}

/// Turns a line into an expression.
///
/// Operands (parenthesised groups, function calls, namespace references,
/// free variables and literals) are read from the token stream; whatever
/// source text lies between two operands is handed to the operator resolver,
/// and the resulting terms are folded by the reducer. A bad operand doesn't
/// stop the scan: it becomes a failed term that poisons the folded result.
pub struct Parser<'a, 'e> {
    source: &'a str,
    lexer: Lexer<'a>,
    env: &'e Environment,
}

impl<'a, 'e> Parser<'a, 'e> {
    pub fn new(input: &'a str, env: &'e Environment) -> Self {
        Self {
            source: input,
            lexer: Lexer::new(input),
            env,
        }
    }

    pub fn parse(&mut self) -> Outcome<Expression> {
        let outcome = self.parse_sequence(Context::Line, 0);
        if let Ok(expr) = &outcome {
            debug!("parsed \"{}\" as {expr}", self.source.trim());
        }
        outcome
    }

    fn parse_sequence(&mut self, context: Context, start: usize) -> Outcome<Expression> {
        let mut terms = Vec::new();
        let mut gap_start = start;
        let mut failure = None;

        while let Some(&token) = self.lexer.peek() {
            match token.kind {
                TokenKind::RightParen if context != Context::Line => break,
                TokenKind::Comma | TokenKind::Equal if context == Context::Argument => break,
                kind if kind.starts_operand() => {
                    let text = &self.source[gap_start..token.offset];
                    let operator = resolve_operator(text, gap_start, terms.is_empty());
                    let (operand, end) = self.parse_operand();
                    match operator {
                        Ok(operator) => terms.push(Term { operator, operand }),
                        Err(err) => {
                            debug!("{err}");
                            failure.get_or_insert(err);
                        }
                    }
                    gap_start = end;
                }
                // operator text, picked up from the source once the next operand shows up
                _ => {
                    self.lexer.next();
                }
            }
        }

        if let Some(err) = failure {
            return Err(err);
        }

        let end = self.lexer.peek().map_or(self.source.len(), |t| t.offset);
        let expr = reduce(terms).unwrap_or_else(|| {
            Err(CalcError::InvalidOperand {
                span: Some(span(start, end)),
            })
        })?;

        let trailing = &self.source[gap_start..end];
        if !trailing.trim().is_empty() {
            let offset = gap_start + (trailing.len() - trailing.trim_start().len());
            let err = CalcError::InvalidOperand {
                span: Some(span(offset, offset + trailing.trim().len())),
            };
            debug!("{err}");
            return Err(err);
        }
        Ok(expr)
    }

    /// Reads one operand and returns it with the offset just past it.
    fn parse_operand(&mut self) -> (Outcome<Expression>, usize) {
        let Some(token) = self.lexer.next() else {
            return (Err(CalcError::InvalidOperand { span: None }), self.source.len());
        };

        match token.kind {
            TokenKind::LeftParen => self.parse_group(token),
            TokenKind::Dot => self.parse_reference(None, token),
            TokenKind::Ident => {
                if let Some(dot) = self.lexer.next_if_adjacent(TokenKind::Dot, token.end()) {
                    self.parse_reference(Some(token), dot)
                } else if let Some(open) =
                    self.lexer.next_if_adjacent(TokenKind::LeftParen, token.end())
                {
                    self.parse_function_call(token, open)
                } else {
                    (Ok(Expression::free_variable(token.slice)), token.end())
                }
            }
            TokenKind::Decimal => (self.decimal(token), token.end()),
            TokenKind::Integer => (self.integer(token), token.end()),
            _ => (
                Err(CalcError::InvalidOperand {
                    span: Some(span(token.offset, token.end())),
                }),
                token.end(),
            ),
        }
    }

    fn parse_group(&mut self, open: Token<'a>) -> (Outcome<Expression>, usize) {
        if let Some(close) = self.lexer.next_if(TokenKind::RightParen) {
            let err = CalcError::EmptyParenthesisBody {
                span: span(open.offset, close.end()),
            };
            debug!("{err}");
            return (Err(err), close.end());
        }

        let inner = self.parse_sequence(Context::Group, open.end());
        match self.lexer.next_if(TokenKind::RightParen) {
            Some(close) => (inner.map(Expression::group), close.end()),
            None => (Err(self.unclosed(open)), self.source.len()),
        }
    }

    /// `prefix.name`, `.name`, optionally followed by call arguments.
    fn parse_reference(&mut self, prefix: Option<Token<'a>>, dot: Token<'a>) -> (Outcome<Expression>, usize) {
        let start = prefix.map_or(dot.offset, |t| t.offset);
        let mut end = dot.end();

        let name = self.lexer.next_if_adjacent(TokenKind::Ident, end);
        if let Some(name) = name {
            end = name.end();
        }
        let mut dots = 1;
        while let Some(extra) = self.lexer.next_if_adjacent(TokenKind::Dot, end) {
            dots += 1;
            end = extra.end();
            if let Some(name) = self.lexer.next_if_adjacent(TokenKind::Ident, end) {
                end = name.end();
            }
        }

        let text = &self.source[start..end];
        let reference = span(start, end);
        let target = match (dots, name, prefix) {
            (1, Some(_), _) => self
                .env
                .resolve(text, reference)
                .and_then(|(namespace, key)| self.lookup(namespace, &key, text, reference)),
            (1, None, Some(_)) => Err(CalcError::UnknownReference {
                name: text.to_string(),
                span: Some(reference),
            }),
            (1, None, None) => Err(CalcError::InvalidOperand {
                span: Some(reference),
            }),
            _ => Err(CalcError::MalformedNamespaceReference {
                name: text.to_string(),
                span: reference,
            }),
        };
        if let Err(err) = &target {
            debug!("{err}");
        }

        match self.lexer.next_if_adjacent(TokenKind::LeftParen, end) {
            Some(open) => self.apply_call(target, open),
            None => (target, end),
        }
    }

    fn parse_function_call(&mut self, name: Token<'a>, open: Token<'a>) -> (Outcome<Expression>, usize) {
        let target = self.lookup(
            Namespace::Functions,
            name.slice,
            name.slice,
            span(name.offset, name.end()),
        );
        if let Err(err) = &target {
            debug!("{err}");
        }
        self.apply_call(target, open)
    }

    fn apply_call(&mut self, target: Outcome<Expression>, open: Token<'a>) -> (Outcome<Expression>, usize) {
        let (arguments, end) = self.parse_arguments(open);
        let called = target.and_then(|template| {
            let bindings = bind_arguments(&template.free_variables(), arguments?)?;
            Ok(template.call(bindings))
        });
        (called, end)
    }

    /// Reads `arg, name = arg, ...)` after an opening parenthesis.
    fn parse_arguments(&mut self, open: Token<'a>) -> (Outcome<Arguments>, usize) {
        let mut arguments = Arguments::default();
        if let Some(close) = self.lexer.next_if(TokenKind::RightParen) {
            return (Ok(arguments), close.end());
        }

        let mut cursor = open.end();
        loop {
            let named = self.named_argument();
            let value_start = named.as_ref().map_or(cursor, |(_, start)| *start);
            let value = self.parse_sequence(Context::Argument, value_start);

            if let Some(equal) = self.lexer.next_if(TokenKind::Equal) {
                let name = self.source[cursor..equal.offset].trim();
                warn!("ignoring argument \"{name}\": not a free variable of the callee");
                self.skip_argument();
            } else {
                match named {
                    Some((name, _)) => arguments.named.push((name, value)),
                    None => arguments.positional.push(value),
                }
            }

            match self.lexer.next() {
                Some(t) if t.kind == TokenKind::Comma => cursor = t.end(),
                Some(close) => return (Ok(arguments), close.end()),
                None => return (Err(self.unclosed(open)), self.source.len()),
            }
        }
    }

    /// Drops tokens up to the `,` or `)` that ends the current argument.
    fn skip_argument(&mut self) {
        let mut depth = 0usize;
        while let Some(kind) = self.lexer.peek().map(|t| t.kind) {
            match kind {
                TokenKind::Comma | TokenKind::RightParen if depth == 0 => return,
                TokenKind::LeftParen => depth += 1,
                TokenKind::RightParen => depth -= 1,
                _ => {}
            }
            self.lexer.next();
        }
    }

    /// Consumes `name =` if that is how the next argument starts.
    fn named_argument(&mut self) -> Option<(String, usize)> {
        let mut probe = self.lexer.clone();
        let name = probe.next_if(TokenKind::Ident)?;
        let equal = probe.next_if(TokenKind::Equal)?;
        self.lexer = probe;
        Some((name.slice.to_string(), equal.end()))
    }

    fn lookup(&self, namespace: Namespace, key: &str, text: &str, at: SourceSpan) -> Outcome<Expression> {
        self.env
            .lookup(namespace, key)
            .cloned()
            .ok_or_else(|| CalcError::UnknownReference {
                name: text.to_string(),
                span: Some(at),
            })
    }

    fn integer(&self, token: Token<'a>) -> Outcome<Expression> {
        token
            .slice
            .parse::<i64>()
            .map(|n| Expression::constant(Number::integer(n)))
            .map_err(|_| self.out_of_range(token))
    }

    /// Every digit written counts as significant, leading zeros included.
    fn decimal(&self, token: Token<'a>) -> Outcome<Expression> {
        let figures = token.slice.bytes().filter(u8::is_ascii_digit).count() as u32;
        match token.slice.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(Expression::constant(Number::measured(value, figures))),
            _ => Err(self.out_of_range(token)),
        }
    }

    fn out_of_range(&self, token: Token<'a>) -> CalcError {
        let err = CalcError::NumericLiteralOutOfRange {
            literal: token.slice.to_string(),
            span: span(token.offset, token.end()),
        };
        debug!("{err}");
        err
    }

    fn unclosed(&self, open: Token<'a>) -> CalcError {
        let err = CalcError::UnclosedParenthesis {
            span: span(open.offset, open.end()),
        };
        debug!("{err}");
        err
    }
}

/// Named arguments bind first. The rest go, in order, to the free variables
/// still unbound, in the callee's own order.
fn bind_arguments(free: &[String], arguments: Arguments) -> Outcome<Bindings> {
    let mut bindings = Bindings::new();
    for (name, value) in arguments.named {
        if free.contains(&name) {
            bindings.insert(name, value?);
        } else {
            warn!("ignoring argument \"{name}\": not a free variable of the callee");
        }
    }

    let mut positional = arguments.positional.into_iter();
    for name in free {
        if bindings.contains_key(name) {
            continue;
        }
        let Some(value) = positional.next() else {
            break;
        };
        bindings.insert(name.clone(), value?);
    }

    let extra = positional.count();
    if extra > 0 {
        warn!("ignoring {extra} extra argument(s)");
    }
    Ok(bindings)
}
