use super::parser::{BinaryOp, Expr, UnaryOp};
use crate::anonymiser::faker;
use crate::types::{Cell, Row};

/// Runtime value of a rule expression.
///
/// `Option` is the rule result type: `Some(v)` replaces the cell under
/// evaluation, `None` leaves it untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Row(Row),
    Option(Option<Box<Value>>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Row(_) => "row",
            Value::Option(_) => "option",
        }
    }

    /// Converts a scalar value into a replacement [`Cell`].
    ///
    /// Rows and options have no cell form and yield `None`.
    pub fn into_cell(self) -> Option<Cell> {
        match self {
            Value::Nil => Some(Cell::Null),
            Value::Bool(value) => Some(Cell::Bool(value)),
            Value::Int(value) => Some(Cell::I64(value)),
            Value::Float(value) => Some(Cell::F64(value)),
            Value::Str(value) => Some(Cell::String(value)),
            Value::Row(_) | Value::Option(_) => None,
        }
    }
}

fn cell_to_value(cell: &Cell) -> Value {
    match cell {
        Cell::Null => Value::Nil,
        Cell::Bool(value) => Value::Bool(*value),
        Cell::I64(value) => Value::Int(*value),
        Cell::U64(value) => match i64::try_from(*value) {
            Ok(value) => Value::Int(value),
            Err(_) => Value::Float(*value as f64),
        },
        Cell::F32(value) => Value::Float(f64::from(*value)),
        Cell::F64(value) => Value::Float(*value),
        Cell::String(value) => Value::Str(value.clone()),
        other => Value::Str(other.as_text()),
    }
}

/// Evaluates an expression against the fixed rule environment.
///
/// The environment binds `row` to the current row, `column` to the cell under
/// evaluation, and exposes the `Value`, `IsNil`, `Anon`, `Literal` and `Skip`
/// functions. Nothing else is reachable.
pub fn eval(expr: &Expr, row: &Row, column: &Cell) -> Result<Value, String> {
    match expr {
        Expr::Int(value) => Ok(Value::Int(*value)),
        Expr::Float(value) => Ok(Value::Float(*value)),
        Expr::Str(value) => Ok(Value::Str(value.clone())),
        Expr::Bool(value) => Ok(Value::Bool(*value)),
        Expr::Nil => Ok(Value::Nil),
        Expr::Ident(name) => match name.as_str() {
            "row" => Ok(Value::Row(row.clone())),
            "column" => Ok(cell_to_value(column)),
            other => Err(format!("unknown identifier '{other}'")),
        },
        Expr::Unary { op, expr } => {
            let value = eval(expr, row, column)?;
            apply_unary(*op, value)
        }
        Expr::Binary { op, lhs, rhs } => apply_binary(*op, lhs, rhs, row, column),
        Expr::Ternary {
            cond,
            then,
            otherwise,
        } => match eval(cond, row, column)? {
            Value::Bool(true) => eval(then, row, column),
            Value::Bool(false) => eval(otherwise, row, column),
            other => Err(format!(
                "conditional expects a bool condition, got {}",
                other.type_name()
            )),
        },
        Expr::Index { target, index } => {
            let target = eval(target, row, column)?;
            let index = eval(index, row, column)?;
            match (target, index) {
                (Value::Row(row), Value::Str(name)) => Ok(row
                    .get(&name)
                    .map(cell_to_value)
                    .unwrap_or(Value::Nil)),
                (target, index) => Err(format!(
                    "cannot index {} with {}",
                    target.type_name(),
                    index.type_name()
                )),
            }
        }
        Expr::Call { function, args } => {
            let args = args
                .iter()
                .map(|arg| eval(arg, row, column))
                .collect::<Result<Vec<_>, _>>()?;
            call_function(function, args)
        }
    }
}

fn apply_unary(op: UnaryOp, value: Value) -> Result<Value, String> {
    match (op, value) {
        (UnaryOp::Not, Value::Bool(value)) => Ok(Value::Bool(!value)),
        (UnaryOp::Neg, Value::Int(value)) => Ok(Value::Int(-value)),
        (UnaryOp::Neg, Value::Float(value)) => Ok(Value::Float(-value)),
        (op, value) => Err(format!("cannot apply {op:?} to {}", value.type_name())),
    }
}

fn apply_binary(
    op: BinaryOp,
    lhs: &Expr,
    rhs: &Expr,
    row: &Row,
    column: &Cell,
) -> Result<Value, String> {
    // Logical operators short-circuit, everything else is strict.
    if matches!(op, BinaryOp::And | BinaryOp::Or) {
        let lhs = expect_bool(eval(lhs, row, column)?)?;
        match (op, lhs) {
            (BinaryOp::And, false) => return Ok(Value::Bool(false)),
            (BinaryOp::Or, true) => return Ok(Value::Bool(true)),
            _ => {}
        }
        let rhs = expect_bool(eval(rhs, row, column)?)?;
        return Ok(Value::Bool(rhs));
    }

    let lhs = eval(lhs, row, column)?;
    let rhs = eval(rhs, row, column)?;

    match op {
        BinaryOp::Eq => Ok(Value::Bool(values_equal(&lhs, &rhs))),
        BinaryOp::Ne => Ok(Value::Bool(!values_equal(&lhs, &rhs))),
        BinaryOp::Add => match (lhs, rhs) {
            (Value::Str(lhs), Value::Str(rhs)) => Ok(Value::Str(lhs + &rhs)),
            (lhs, rhs) => numeric_op(op, lhs, rhs),
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => numeric_op(op, lhs, rhs),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => compare_op(op, lhs, rhs),
        BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
    }
}

fn expect_bool(value: Value) -> Result<bool, String> {
    match value {
        Value::Bool(value) => Ok(value),
        other => Err(format!(
            "logical operator expects bool operands, got {}",
            other.type_name()
        )),
    }
}

fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Int(lhs), Value::Float(rhs)) => (*lhs as f64) == *rhs,
        (Value::Float(lhs), Value::Int(rhs)) => *lhs == (*rhs as f64),
        (lhs, rhs) => lhs == rhs,
    }
}

fn numeric_op(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, String> {
    match (&lhs, &rhs) {
        (Value::Int(a), Value::Int(b)) => {
            let (a, b) = (*a, *b);
            let result = match op {
                BinaryOp::Add => a.checked_add(b),
                BinaryOp::Sub => a.checked_sub(b),
                BinaryOp::Mul => a.checked_mul(b),
                BinaryOp::Div => a.checked_div(b),
                BinaryOp::Rem => a.checked_rem(b),
                _ => unreachable!("not a numeric operator"),
            };
            result
                .map(Value::Int)
                .ok_or_else(|| format!("integer {op:?} failed for {a} and {b}"))
        }
        _ => {
            let a = as_float(&lhs)?;
            let b = as_float(&rhs)?;
            let result = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                BinaryOp::Rem => a % b,
                _ => unreachable!("not a numeric operator"),
            };
            Ok(Value::Float(result))
        }
    }
}

fn compare_op(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, String> {
    let ordering = match (&lhs, &rhs) {
        (Value::Str(a), Value::Str(b)) => a.cmp(b),
        _ => {
            let a = as_float(&lhs)?;
            let b = as_float(&rhs)?;
            a.partial_cmp(&b)
                .ok_or_else(|| "cannot order non-finite floats".to_owned())?
        }
    };

    let result = match op {
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::Le => ordering.is_le(),
        BinaryOp::Gt => ordering.is_gt(),
        BinaryOp::Ge => ordering.is_ge(),
        _ => unreachable!("not a comparison operator"),
    };

    Ok(Value::Bool(result))
}

fn as_float(value: &Value) -> Result<f64, String> {
    match value {
        Value::Int(value) => Ok(*value as f64),
        Value::Float(value) => Ok(*value),
        other => Err(format!(
            "arithmetic expects numeric operands, got {}",
            other.type_name()
        )),
    }
}

fn call_function(function: &str, mut args: Vec<Value>) -> Result<Value, String> {
    match function {
        "Value" => {
            let (row, name) = row_and_column_args(function, args)?;
            match row.get(&name) {
                Some(cell) => Ok(Value::Str(cell.as_text())),
                None => Err(format!("Value: unknown column '{name}'")),
            }
        }
        "IsNil" => {
            let (row, name) = row_and_column_args(function, args)?;
            match row.get(&name) {
                Some(cell) => Ok(Value::Bool(cell.is_null())),
                None => Err(format!("IsNil: unknown column '{name}'")),
            }
        }
        "Anon" => {
            let name = single_string_arg(function, args)?;
            Ok(Value::Option(Some(Box::new(Value::Str(faker::anonymise(
                &name,
            ))))))
        }
        "Literal" => {
            if args.len() != 1 {
                return Err(format!("Literal expects 1 argument, got {}", args.len()));
            }
            Ok(Value::Option(Some(Box::new(args.remove(0)))))
        }
        "Skip" => {
            if !args.is_empty() {
                return Err(format!("Skip expects no arguments, got {}", args.len()));
            }
            Ok(Value::Option(None))
        }
        other => Err(format!("unknown function '{other}'")),
    }
}

fn row_and_column_args(function: &str, mut args: Vec<Value>) -> Result<(Row, String), String> {
    if args.len() != 2 {
        return Err(format!(
            "{function} expects (row, column) arguments, got {}",
            args.len()
        ));
    }

    let name = match args.pop() {
        Some(Value::Str(name)) => name,
        Some(other) => {
            return Err(format!(
                "{function} expects a column name string, got {}",
                other.type_name()
            ))
        }
        None => unreachable!("length checked above"),
    };
    let row = match args.pop() {
        Some(Value::Row(row)) => row,
        Some(other) => {
            return Err(format!(
                "{function} expects a row, got {}",
                other.type_name()
            ))
        }
        None => unreachable!("length checked above"),
    };

    Ok((row, name))
}

fn single_string_arg(function: &str, mut args: Vec<Value>) -> Result<String, String> {
    if args.len() != 1 {
        return Err(format!("{function} expects 1 argument, got {}", args.len()));
    }

    match args.pop() {
        Some(Value::Str(value)) => Ok(value),
        Some(other) => Err(format!(
            "{function} expects a string, got {}",
            other.type_name()
        )),
        None => unreachable!("length checked above"),
    }
}
