use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

/// Everything that can keep a line from producing a value.
///
/// Parse-time variants carry a span into the input line; attach the line with
/// [`miette::Report::with_source_code`] to render it.
#[derive(Diagnostic, Debug, Clone, PartialEq, Error)]
pub enum CalcError {
    #[error("invalid operator: \"{text}\"")]
    #[diagnostic(help("operators start with one of ^ * / + - and may be followed by - only"))]
    InvalidOperator {
        text: String,
        #[label("this operator")]
        span: SourceSpan,
    },

    #[error("expected an operand")]
    InvalidOperand {
        #[label("nothing to apply this to")]
        span: Option<SourceSpan>,
    },

    #[error("unknown expression: {name}")]
    UnknownReference {
        name: String,
        #[label("not found")]
        span: Option<SourceSpan>,
    },

    #[error("a reference to an expression can't contain more than one \".\": {name}")]
    MalformedNamespaceReference {
        name: String,
        #[label("this reference")]
        span: SourceSpan,
    },

    #[error("empty parenthesis")]
    #[diagnostic(help("type something between the parentheses"))]
    EmptyParenthesisBody {
        #[label("nothing in here")]
        span: SourceSpan,
    },

    #[error("unclosed parenthesis")]
    UnclosedParenthesis {
        #[label("opened here")]
        span: SourceSpan,
    },

    #[error("numeric literal out of range: {literal}")]
    NumericLiteralOutOfRange {
        literal: String,
        #[label("this numeric literal")]
        span: SourceSpan,
    },

    #[error("can't assign to \"{target}\"")]
    #[diagnostic(help("assign to a name such as `x` or `u.x`"))]
    InvalidAssignmentTarget {
        target: String,
        #[label("not a variable name")]
        span: SourceSpan,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("arithmetic overflow")]
    Overflow,

    #[error("{operation} has no real result")]
    Undefined { operation: &'static str },

    #[error("unbound variable: {name}")]
    UnboundVariable { name: String },
}

/// The outcome of building or evaluating anything in the calculator.
pub type Outcome<T> = Result<T, CalcError>;
