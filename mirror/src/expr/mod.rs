//! Sandboxed expression language for conditional anonymisation rules.
//!
//! Rules are compiled once per table and column and evaluated per row against
//! a fixed environment; there is no I/O and no way to reach outside the row
//! under evaluation. A rule must produce an option value: `Some(v)` replaces
//! the cell, `None` keeps it.
//!
//! ```
//! use mirror::expr::{compile, Value};
//! use mirror::types::{Cell, Row};
//!
//! let program = compile(r#"IsNil(row, "email") ? Literal("N/A") : Skip()"#).unwrap();
//! let row = Row::from_pairs([("email", Cell::Null)]);
//! let result = program.run(&row, &Cell::Null).unwrap();
//! assert_eq!(
//!     result,
//!     Value::Option(Some(Box::new(Value::Str("N/A".to_owned()))))
//! );
//! ```

mod eval;
mod lexer;
mod parser;

pub use eval::Value;

use crate::error::{ErrorKind, MirrorError, MirrorResult};
use crate::mirror_error;
use crate::types::{Cell, Row};

/// A compiled rule expression.
#[derive(Debug, Clone)]
pub struct Program {
    expr: parser::Expr,
    source: String,
}

impl Program {
    /// Returns the source the program was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluates the program against a row and the cell under evaluation.
    pub fn run(&self, row: &Row, column: &Cell) -> MirrorResult<Value> {
        eval::eval(&self.expr, row, column).map_err(|err| {
            mirror_error!(
                ErrorKind::RuleEvaluationFailed,
                "conditional rule evaluation failed",
                err
            )
        })
    }
}

/// Compiles a rule expression.
pub fn compile(source: &str) -> MirrorResult<Program> {
    let tokens = lexer::tokenize(source).map_err(compile_error)?;
    let expr = parser::parse(&tokens).map_err(compile_error)?;

    Ok(Program {
        expr,
        source: source.to_owned(),
    })
}

fn compile_error(err: String) -> MirrorError {
    mirror_error!(
        ErrorKind::RuleCompilationFailed,
        "conditional rule compilation failed",
        err
    )
}
