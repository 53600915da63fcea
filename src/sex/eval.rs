//! SEX evaluator (C6): evaluates an expression tree against a record,
//! producing a typed value or a typed error (`spec.md §4.6`).
//!
//! Evaluation is total: every type mismatch produces [`Value::Error`]
//! rather than a panic or a `Result::Err`, per the design note in
//! `spec.md §9` ("Tagged unions for values and errors").

use regex::Regex;

use crate::descriptor::TypeSpec;
use crate::error::EvalErrorKind;
use crate::record::Record;
use crate::sex::parser::{BinOp, Expr, ExprNode};

/// The result of evaluating an expression: a tagged union of the four
/// value kinds plus an in-band error (`spec.md §3`).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Real(f64),
    String(String),
    Bool(bool),
    Error(EvalErrorKind),
}

/// The outcome of applying a filter expression's result at the top level
/// of the query driver (`spec.md §4.6`, "Top-level truthiness").
#[derive(Debug, Clone, PartialEq)]
pub enum Truthiness {
    /// The record passes the filter.
    Pass,
    /// The record is excluded, with no error to report (includes
    /// `Error(MissingField)`, which is falsey rather than diagnosable).
    Fail,
    /// The record is excluded *and* the evaluation raised an error other
    /// than `MissingField`; the driver should record it in its
    /// diagnostic channel.
    Diagnostic(EvalErrorKind),
}

/// Classifies `value` per the top-level truthiness rules used by filters
/// (`spec.md §4.6`).
pub fn truthy(value: &Value) -> Truthiness {
    match value {
        Value::Bool(true) => Truthiness::Pass,
        Value::Bool(false) => Truthiness::Fail,
        Value::Int(0) => Truthiness::Fail,
        Value::Int(_) => Truthiness::Pass,
        Value::Real(f) if *f == 0.0 => Truthiness::Fail,
        Value::Real(_) => Truthiness::Pass,
        Value::String(s) if s.is_empty() => Truthiness::Fail,
        Value::String(_) => Truthiness::Pass,
        Value::Error(EvalErrorKind::MissingField) => Truthiness::Fail,
        Value::Error(e) => Truthiness::Diagnostic(e.clone()),
    }
}

/// Evaluates `expr` against `record`, using case-sensitive string
/// comparisons.
pub fn evaluate(expr: &Expr, record: &Record) -> Value {
    evaluate_with(expr, record, false)
}

/// Evaluates `expr` against `record`. When `case_insensitive` is set,
/// string equality (and the query driver's quick-search) is case-folded,
/// per `spec.md §4.6`'s note on the query driver's case-insensitive mode.
pub fn evaluate_with(expr: &Expr, record: &Record, case_insensitive: bool) -> Value {
    eval_node(&expr.node, record, case_insensitive)
}

fn eval_node(node: &ExprNode, record: &Record, ci: bool) -> Value {
    match node {
        ExprNode::Int(n) => Value::Int(*n),
        ExprNode::Real(f) => Value::Real(*f),
        ExprNode::Str(s) => Value::String(s.clone()),
        ExprNode::Field(name, index) => eval_field(record, name, *index),
        ExprNode::Count(name) => Value::Int(record.field_count(name) as i64),
        ExprNode::Neg(inner) => eval_neg(eval_node(inner, record, ci)),
        ExprNode::Not(inner) => eval_not(eval_node(inner, record, ci)),
        ExprNode::Ternary(cond, then_branch, else_branch) => {
            match truthy_coerce(&eval_node(cond, record, ci)) {
                BoolCoerce::Propagate(e) => Value::Error(e),
                BoolCoerce::Bool(true) => eval_node(then_branch, record, ci),
                BoolCoerce::Bool(false) => eval_node(else_branch, record, ci),
            }
        }
        ExprNode::BinOp(op, lhs, rhs) => eval_binop(*op, lhs, rhs, record, ci),
    }
}

/// Field reference semantics (`spec.md §4.6`): the first (or k-th)
/// occurrence, coerced per the descriptor's declared type if any,
/// otherwise left as a string; absent ⇒ `Error(MissingField)`.
fn eval_field(record: &Record, name: &str, index: Option<usize>) -> Value {
    let raw = match index {
        Some(k) => record.get_field_at(name, k),
        None => record.get_field(name),
    };
    let Some(raw) = raw else {
        return Value::Error(EvalErrorKind::MissingField);
    };
    let type_spec = record.descriptor().and_then(|d| d.type_of(name));
    coerce_field_value(type_spec, raw)
}

fn coerce_field_value(type_spec: Option<&TypeSpec>, raw: &str) -> Value {
    match type_spec {
        Some(TypeSpec::Int) | Some(TypeSpec::Range(_, _)) => match raw.parse::<i64>() {
            Ok(n) => Value::Int(n),
            Err(_) => Value::Error(EvalErrorKind::TypeMismatch(format!(
                "expected an integer, found {raw:?}"
            ))),
        },
        Some(TypeSpec::Real) => match raw.parse::<f64>() {
            Ok(n) => Value::Real(n),
            Err(_) => Value::Error(EvalErrorKind::TypeMismatch(format!(
                "expected a real number, found {raw:?}"
            ))),
        },
        Some(TypeSpec::Bool) => match raw.to_ascii_lowercase().as_str() {
            "yes" | "true" | "1" => Value::Bool(true),
            "no" | "false" | "0" => Value::Bool(false),
            _ => Value::Error(EvalErrorKind::TypeMismatch(format!(
                "expected a boolean, found {raw:?}"
            ))),
        },
        _ => Value::String(raw.to_string()),
    }
}

fn eval_neg(v: Value) -> Value {
    match coerce_numeric(&v) {
        Some(Numeric::Int(n)) => Value::Int(-n),
        Some(Numeric::Real(f)) => Value::Real(-f),
        None => match v {
            Value::Error(e) => Value::Error(e),
            _ => Value::Error(EvalErrorKind::TypeMismatch("unary - requires a numeric operand".to_string())),
        },
    }
}

fn eval_not(v: Value) -> Value {
    match truthy_coerce(&v) {
        BoolCoerce::Bool(b) => Value::Bool(!b),
        BoolCoerce::Propagate(e) => Value::Error(e),
    }
}

enum BoolCoerce {
    Bool(bool),
    Propagate(EvalErrorKind),
}

/// Boolean coercion used by `&&`, `||`, `=>`, `!`, and the ternary
/// condition (`spec.md §4.6`, "Logical"). `MissingField` demotes to
/// `false`; any other error propagates.
fn truthy_coerce(v: &Value) -> BoolCoerce {
    match v {
        Value::Bool(b) => BoolCoerce::Bool(*b),
        Value::Int(n) => BoolCoerce::Bool(*n != 0),
        Value::Real(f) => BoolCoerce::Bool(*f != 0.0),
        Value::String(s) => BoolCoerce::Bool(!s.is_empty()),
        Value::Error(EvalErrorKind::MissingField) => BoolCoerce::Bool(false),
        Value::Error(e) => BoolCoerce::Propagate(e.clone()),
    }
}

enum Numeric {
    Int(i64),
    Real(f64),
}

impl Numeric {
    fn as_f64(&self) -> f64 {
        match self {
            Numeric::Int(n) => *n as f64,
            Numeric::Real(f) => *f,
        }
    }
}

fn coerce_numeric(v: &Value) -> Option<Numeric> {
    match v {
        Value::Int(n) => Some(Numeric::Int(*n)),
        Value::Real(f) => Some(Numeric::Real(*f)),
        Value::String(s) => {
            if let Ok(n) = s.parse::<i64>() {
                Some(Numeric::Int(n))
            } else if let Ok(f) = s.parse::<f64>() {
                Some(Numeric::Real(f))
            } else {
                None
            }
        }
        Value::Bool(_) | Value::Error(_) => None,
    }
}

fn stringify(v: &Value) -> String {
    match v {
        Value::Int(n) => n.to_string(),
        Value::Real(f) => f.to_string(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Error(_) => String::new(),
    }
}

/// Returns the first `Error` among `lv`/`rv`, for operators that are not
/// logical (those have their own `MissingField`-demoting coercion).
fn first_error(lv: &Value, rv: &Value) -> Option<EvalErrorKind> {
    match lv {
        Value::Error(e) => return Some(e.clone()),
        _ => {}
    }
    match rv {
        Value::Error(e) => return Some(e.clone()),
        _ => {}
    }
    None
}

fn eval_binop(op: BinOp, lhs: &ExprNode, rhs: &ExprNode, record: &Record, ci: bool) -> Value {
    match op {
        BinOp::And => eval_short_circuit(lhs, rhs, record, ci, true),
        BinOp::Or => eval_short_circuit(lhs, rhs, record, ci, false),
        BinOp::Implies => {
            // `A => B` is `!A || B` (spec.md §4.5).
            let lv = eval_node(lhs, record, ci);
            match truthy_coerce(&lv) {
                BoolCoerce::Propagate(e) => Value::Error(e),
                BoolCoerce::Bool(false) => Value::Bool(true),
                BoolCoerce::Bool(true) => match truthy_coerce(&eval_node(rhs, record, ci)) {
                    BoolCoerce::Bool(b) => Value::Bool(b),
                    BoolCoerce::Propagate(e) => Value::Error(e),
                },
            }
        }
        BinOp::Concat => {
            let lv = eval_node(lhs, record, ci);
            let rv = eval_node(rhs, record, ci);
            match first_error(&lv, &rv) {
                Some(e) => Value::Error(e),
                None => Value::String(format!("{}{}", stringify(&lv), stringify(&rv))),
            }
        }
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => {
            let lv = eval_node(lhs, record, ci);
            let rv = eval_node(rhs, record, ci);
            eval_arith(op, lv, rv)
        }
        BinOp::Eq | BinOp::Ne => {
            let lv = eval_node(lhs, record, ci);
            let rv = eval_node(rhs, record, ci);
            eval_equality(op, lv, rv, ci)
        }
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let lv = eval_node(lhs, record, ci);
            let rv = eval_node(rhs, record, ci);
            eval_ordering(op, lv, rv)
        }
        BinOp::Match | BinOp::NotMatch => {
            let lv = eval_node(lhs, record, ci);
            let rv = eval_node(rhs, record, ci);
            eval_regex(op, lv, rv)
        }
    }
}

/// `&&`/`||` short-circuit: the right side is only evaluated when the
/// left side doesn't already settle the result.
fn eval_short_circuit(lhs: &ExprNode, rhs: &ExprNode, record: &Record, ci: bool, is_and: bool) -> Value {
    let lv = eval_node(lhs, record, ci);
    match truthy_coerce(&lv) {
        BoolCoerce::Propagate(e) => Value::Error(e),
        BoolCoerce::Bool(b) if b == !is_and => Value::Bool(b),
        BoolCoerce::Bool(_) => match truthy_coerce(&eval_node(rhs, record, ci)) {
            BoolCoerce::Bool(b) => Value::Bool(b),
            BoolCoerce::Propagate(e) => Value::Error(e),
        },
    }
}

fn eval_arith(op: BinOp, lv: Value, rv: Value) -> Value {
    if let Some(e) = first_error(&lv, &rv) {
        return Value::Error(e);
    }
    let (l, r) = match (coerce_numeric(&lv), coerce_numeric(&rv)) {
        (Some(l), Some(r)) => (l, r),
        _ => {
            return Value::Error(EvalErrorKind::TypeMismatch(
                "arithmetic requires numeric operands".to_string(),
            ))
        }
    };
    let is_real = matches!(l, Numeric::Real(_)) || matches!(r, Numeric::Real(_));
    if is_real {
        let (lf, rf) = (l.as_f64(), r.as_f64());
        match op {
            BinOp::Add => Value::Real(lf + rf),
            BinOp::Sub => Value::Real(lf - rf),
            BinOp::Mul => Value::Real(lf * rf),
            BinOp::Div if rf == 0.0 => Value::Error(EvalErrorKind::DivideByZero),
            BinOp::Div => Value::Real(lf / rf),
            BinOp::Mod if rf == 0.0 => Value::Error(EvalErrorKind::DivideByZero),
            BinOp::Mod => Value::Real(lf % rf),
            _ => unreachable!("eval_arith only called for arithmetic ops"),
        }
    } else {
        let (Numeric::Int(li), Numeric::Int(ri)) = (l, r) else {
            unreachable!("is_real is false iff both operands are Int");
        };
        match op {
            BinOp::Add => Value::Int(li.wrapping_add(ri)),
            BinOp::Sub => Value::Int(li.wrapping_sub(ri)),
            BinOp::Mul => Value::Int(li.wrapping_mul(ri)),
            BinOp::Div if ri == 0 => Value::Error(EvalErrorKind::DivideByZero),
            BinOp::Div => Value::Int(li / ri),
            BinOp::Mod if ri == 0 => Value::Error(EvalErrorKind::DivideByZero),
            BinOp::Mod => Value::Int(li % ri),
            _ => unreachable!("eval_arith only called for arithmetic ops"),
        }
    }
}

/// `= !=`: numeric only when both sides coerce to the *same* numeric tag;
/// otherwise string comparison, case-folded when `ci` is set (`spec.md
/// §4.6`).
fn eval_equality(op: BinOp, lv: Value, rv: Value, ci: bool) -> Value {
    if let Some(e) = first_error(&lv, &rv) {
        return Value::Error(e);
    }
    let eq = match (coerce_numeric(&lv), coerce_numeric(&rv)) {
        (Some(Numeric::Int(a)), Some(Numeric::Int(b))) => a == b,
        (Some(Numeric::Real(a)), Some(Numeric::Real(b))) => a == b,
        _ => {
            let (a, b) = (stringify(&lv), stringify(&rv));
            if ci {
                a.eq_ignore_ascii_case(&b)
            } else {
                a == b
            }
        }
    };
    Value::Bool(if op == BinOp::Eq { eq } else { !eq })
}

/// `< <= > >=`: numeric whenever both sides coerce (mixed int/real
/// allowed, unlike equality), otherwise lexicographic on strings.
fn eval_ordering(op: BinOp, lv: Value, rv: Value) -> Value {
    if let Some(e) = first_error(&lv, &rv) {
        return Value::Error(e);
    }
    let ordering = match (coerce_numeric(&lv), coerce_numeric(&rv)) {
        (Some(l), Some(r)) => l.as_f64().partial_cmp(&r.as_f64()),
        _ => Some(stringify(&lv).cmp(&stringify(&rv))),
    };
    let Some(ordering) = ordering else {
        return Value::Error(EvalErrorKind::TypeMismatch("cannot compare NaN".to_string()));
    };
    let b = match op {
        BinOp::Lt => ordering.is_lt(),
        BinOp::Le => ordering.is_le(),
        BinOp::Gt => ordering.is_gt(),
        BinOp::Ge => ordering.is_ge(),
        _ => unreachable!("eval_ordering only called for ordering ops"),
    };
    Value::Bool(b)
}

/// `~ !~`: the right operand is a regex pattern matched unanchored
/// ("find" semantics) against the left operand's stringified value
/// (`spec.md §4.6`).
fn eval_regex(op: BinOp, lv: Value, rv: Value) -> Value {
    if let Some(e) = first_error(&lv, &rv) {
        return Value::Error(e);
    }
    let pattern = stringify(&rv);
    let re = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(err) => return Value::Error(EvalErrorKind::BadRegex(err.to_string())),
    };
    let is_match = re.is_match(&stringify(&lv));
    Value::Bool(if op == BinOp::Match { is_match } else { !is_match })
}
