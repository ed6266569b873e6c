//! Evaluates a parsed [`Expr`] against a message. Total: never panics,
//! every error path folds into `false` (spec §4.B).

use super::lexer::CompareOp;
use super::parser::{Expr, Literal, Operand};
use crate::model::Message;

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Null,
    Str(String),
    Num(f64),
    Bool(bool),
}

pub fn evaluate(expr: &Expr, message: &Message) -> bool {
    eval_expr(expr, message)
}

fn eval_expr(expr: &Expr, message: &Message) -> bool {
    match expr {
        Expr::And(l, r) => eval_expr(l, message) && eval_expr(r, message),
        Expr::Or(l, r) => eval_expr(l, message) || eval_expr(r, message),
        Expr::Not(inner) => !eval_expr(inner, message),
        Expr::Compare(l, op, r) => eval_compare(l, *op, r, message),
        Expr::In(l, literals) => eval_in(l, literals, message),
    }
}

fn eval_compare(left: &Operand, op: CompareOp, right: &Operand, message: &Message) -> bool {
    let lv = resolve(left, message);
    let rv = resolve(right, message);

    if lv == Value::Null || rv == Value::Null {
        return false;
    }

    if let (Some(ln), Some(rn)) = (as_number(&lv), as_number(&rv)) {
        return compare_ordering(ln.partial_cmp(&rn), op);
    }

    let ls = as_string(&lv);
    let rs = as_string(&rv);
    compare_ordering(ls.partial_cmp(&rs), op)
}

fn compare_ordering(ord: Option<std::cmp::Ordering>, op: CompareOp) -> bool {
    use std::cmp::Ordering::*;
    let Some(ord) = ord else { return false };
    match op {
        CompareOp::Eq => ord == Equal,
        CompareOp::Ne => ord != Equal,
        CompareOp::Lt => ord == Less,
        CompareOp::Le => ord != Greater,
        CompareOp::Gt => ord == Greater,
        CompareOp::Ge => ord != Less,
    }
}

fn eval_in(left: &Operand, literals: &[Literal], message: &Message) -> bool {
    let lv = resolve(left, message);
    if lv == Value::Null {
        return false;
    }
    let ls = as_string(&lv);
    literals.iter().any(|lit| literal_to_string(lit) == ls)
}

/// `None` if the value is not numeric. Booleans are explicitly non-numeric
/// (spec §4.B: "with boolean treated as non-numeric").
fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Num(n) => Some(*n),
        Value::Str(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(_) | Value::Null => None,
    }
}

fn as_string(v: &Value) -> String {
    match v {
        Value::Str(s) => s.clone(),
        Value::Num(n) => {
            if n.fract() == 0.0 {
                format!("{}", *n as i64)
            } else {
                n.to_string()
            }
        }
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
    }
}

fn literal_to_string(lit: &Literal) -> String {
    match lit {
        Literal::Str(s) => s.clone(),
        Literal::Int(v) => v.to_string(),
        Literal::Dec(v) => v.to_string(),
        Literal::Bool(v) => v.to_string(),
    }
}

fn resolve(operand: &Operand, message: &Message) -> Value {
    match operand {
        Operand::Literal(lit) => match lit {
            Literal::Str(s) => Value::Str(s.clone()),
            Literal::Int(v) => Value::Num(*v as f64),
            Literal::Dec(v) => Value::Num(*v),
            Literal::Bool(v) => Value::Bool(*v),
        },
        Operand::Ident(name) => resolve_ident(name, message),
    }
}

fn resolve_ident(name: &str, message: &Message) -> Value {
    if let Some(field) = name.strip_prefix("sys.") {
        let value = match field {
            "Label" => message.label.clone(),
            "MessageId" => Some(message.message_id.clone()),
            "ContentType" => message.content_type.clone(),
            "CorrelationId" => message.correlation_id.clone(),
            "To" => message.to.clone(),
            "ReplyTo" => message.reply_to.clone(),
            "SessionId" => message.session_id.clone(),
            _ => None,
        };
        return value.map(Value::Str).unwrap_or(Value::Null);
    }

    message
        .user_properties
        .get(name)
        .cloned()
        .map(Value::Str)
        .unwrap_or(Value::Null)
}
