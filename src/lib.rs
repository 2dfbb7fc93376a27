pub mod env;
pub mod error;
pub mod expr;
pub mod lexer;
pub mod number;
pub mod parser;
pub mod reducer;
pub mod session;

pub use env::{Environment, Namespace};
pub use error::{CalcError, Outcome};
pub use expr::{Bindings, Expression, LogBase};
pub use lexer::*;
pub use number::{Number, Precision};
pub use parser::{parse, Parser};
pub use session::{Reply, Session};
