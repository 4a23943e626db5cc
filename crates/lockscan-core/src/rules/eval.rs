//! Expression evaluation over named JSON bindings.
//!
//! The report payloads are opaque trees; member access on a missing key
//! yields `null` so rules can probe optional structure without blowing up,
//! while operations on mismatched types are hard errors naming the problem.

use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;

use super::expr::{BinaryOp, Expr, UnaryOp};

/// Builtin functions rules may call.
pub const BUILTIN_FUNCTIONS: &[&str] = &["count"];

/// The report sections, bound by name.
pub type Bindings = HashMap<String, Value>;

#[derive(Debug, Error, PartialEq)]
pub enum EvalError {
    #[error("unknown variable \"{0}\"")]
    UnknownVariable(String),

    #[error("unknown function \"{0}\"")]
    UnknownFunction(String),

    #[error("{0}")]
    Type(String),

    #[error("division by zero")]
    DivisionByZero,
}

pub fn evaluate(expr: &Expr, bindings: &Bindings) -> Result<Value, EvalError> {
    match expr {
        Expr::Null => Ok(Value::Null),
        Expr::Bool(value) => Ok(Value::Bool(*value)),
        Expr::Number(value) => Ok(number(*value)),
        Expr::Str(value) => Ok(Value::String(value.clone())),
        Expr::Array(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(evaluate(item, bindings)?);
            }
            Ok(Value::Array(values))
        }
        Expr::Var(name) => bindings
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::UnknownVariable(name.clone())),
        Expr::Member(base, name) => {
            let base = evaluate(base, bindings)?;
            match base {
                Value::Object(map) => Ok(map.get(name).cloned().unwrap_or(Value::Null)),
                Value::Null => Ok(Value::Null),
                other => Err(EvalError::Type(format!(
                    "cannot access member \"{name}\" on {}",
                    type_name(&other)
                ))),
            }
        }
        Expr::Index(base, index) => {
            let base = evaluate(base, bindings)?;
            let index = evaluate(index, bindings)?;
            match (&base, &index) {
                (Value::Array(items), Value::Number(n)) => {
                    let position = n.as_f64().unwrap_or(-1.0);
                    if position < 0.0 || position.fract() != 0.0 {
                        return Err(EvalError::Type(format!(
                            "invalid array index {position}"
                        )));
                    }
                    Ok(items.get(position as usize).cloned().unwrap_or(Value::Null))
                }
                (Value::Object(map), Value::String(key)) => {
                    Ok(map.get(key).cloned().unwrap_or(Value::Null))
                }
                (Value::Null, _) => Ok(Value::Null),
                (other, _) => Err(EvalError::Type(format!(
                    "cannot index into {}",
                    type_name(other)
                ))),
            }
        }
        Expr::Call(name, args) => {
            if !BUILTIN_FUNCTIONS.contains(&name.as_str()) {
                return Err(EvalError::UnknownFunction(name.clone()));
            }
            if args.len() != 1 {
                return Err(EvalError::Type(format!(
                    "count() takes one argument, got {}",
                    args.len()
                )));
            }
            let value = evaluate(&args[0], bindings)?;
            let count = match &value {
                Value::Array(items) => items.len(),
                Value::Object(map) => map.len(),
                Value::String(s) => s.chars().count(),
                Value::Null => 0,
                other => {
                    return Err(EvalError::Type(format!(
                        "count() cannot be applied to {}",
                        type_name(other)
                    )));
                }
            };
            Ok(number(count as f64))
        }
        Expr::Unary(op, inner) => {
            let value = evaluate(inner, bindings)?;
            match op {
                UnaryOp::Not => match value {
                    Value::Bool(b) => Ok(Value::Bool(!b)),
                    other => Err(EvalError::Type(format!(
                        "\"!\" expects a boolean, got {}",
                        type_name(&other)
                    ))),
                },
                UnaryOp::Neg => match as_number(&value) {
                    Some(n) => Ok(number(-n)),
                    None => Err(EvalError::Type(format!(
                        "\"-\" expects a number, got {}",
                        type_name(&value)
                    ))),
                },
            }
        }
        Expr::Binary(op, left, right) => evaluate_binary(*op, left, right, bindings),
    }
}

fn evaluate_binary(
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    bindings: &Bindings,
) -> Result<Value, EvalError> {
    // Short-circuit the logical operators before touching the right side.
    if matches!(op, BinaryOp::And | BinaryOp::Or) {
        let left = expect_bool(op, evaluate(left, bindings)?)?;
        return match (op, left) {
            (BinaryOp::And, false) => Ok(Value::Bool(false)),
            (BinaryOp::Or, true) => Ok(Value::Bool(true)),
            _ => {
                let right = expect_bool(op, evaluate(right, bindings)?)?;
                Ok(Value::Bool(right))
            }
        };
    }

    let left = evaluate(left, bindings)?;
    let right = evaluate(right, bindings)?;
    match op {
        BinaryOp::Eq => Ok(Value::Bool(loose_eq(&left, &right))),
        BinaryOp::Ne => Ok(Value::Bool(!loose_eq(&left, &right))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = compare(op, &left, &right)?;
            Ok(Value::Bool(ordering))
        }
        BinaryOp::In => Ok(Value::Bool(contains(&right, &left, op)?)),
        BinaryOp::NotIn => Ok(Value::Bool(!contains(&right, &left, op)?)),
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            let (a, b) = match (as_number(&left), as_number(&right)) {
                (Some(a), Some(b)) => (a, b),
                _ => {
                    return Err(EvalError::Type(format!(
                        "\"{op}\" expects numbers, got {} and {}",
                        type_name(&left),
                        type_name(&right)
                    )));
                }
            };
            let result = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => {
                    if b == 0.0 {
                        return Err(EvalError::DivisionByZero);
                    }
                    a / b
                }
                BinaryOp::Rem => {
                    if b == 0.0 {
                        return Err(EvalError::DivisionByZero);
                    }
                    a % b
                }
                _ => unreachable!("arithmetic operators handled above"),
            };
            Ok(number(result))
        }
        BinaryOp::And | BinaryOp::Or => unreachable!("logical operators handled above"),
    }
}

fn expect_bool(op: BinaryOp, value: Value) -> Result<bool, EvalError> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(EvalError::Type(format!(
            "\"{op}\" expects booleans, got {}",
            type_name(&other)
        ))),
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> Result<bool, EvalError> {
    if let (Some(a), Some(b)) = (as_number(left), as_number(right)) {
        return Ok(match op {
            BinaryOp::Lt => a < b,
            BinaryOp::Le => a <= b,
            BinaryOp::Gt => a > b,
            BinaryOp::Ge => a >= b,
            _ => unreachable!("caller matched a comparison"),
        });
    }
    if let (Value::String(a), Value::String(b)) = (left, right) {
        return Ok(match op {
            BinaryOp::Lt => a < b,
            BinaryOp::Le => a <= b,
            BinaryOp::Gt => a > b,
            BinaryOp::Ge => a >= b,
            _ => unreachable!("caller matched a comparison"),
        });
    }
    Err(EvalError::Type(format!(
        "\"{op}\" cannot compare {} and {}",
        type_name(left),
        type_name(right)
    )))
}

/// Membership test: arrays by element, strings by substring, objects by key.
fn contains(haystack: &Value, needle: &Value, op: BinaryOp) -> Result<bool, EvalError> {
    match haystack {
        Value::Array(items) => Ok(items.iter().any(|item| loose_eq(item, needle))),
        Value::String(s) => match needle {
            Value::String(sub) => Ok(s.contains(sub.as_str())),
            other => Err(EvalError::Type(format!(
                "\"{op}\" on a string expects a string, got {}",
                type_name(other)
            ))),
        },
        Value::Object(map) => match needle {
            Value::String(key) => Ok(map.contains_key(key)),
            other => Err(EvalError::Type(format!(
                "\"{op}\" on an object expects a string key, got {}",
                type_name(other)
            ))),
        },
        other => Err(EvalError::Type(format!(
            "\"{op}\" expects an array, string or object, got {}",
            type_name(other)
        ))),
    }
}

/// Equality with numeric coercion: `1 == 1.0` regardless of JSON encoding.
fn loose_eq(left: &Value, right: &Value) -> bool {
    match (as_number(left), as_number(right)) {
        (Some(a), Some(b)) => a == b,
        _ => left == right,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    value.as_f64()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn number(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::expr::parse;
    use serde_json::json;

    fn bindings() -> Bindings {
        let mut bindings = Bindings::new();
        bindings.insert(
            "summary".to_string(),
            json!({"advisories": {"total": 2, "critical": 0}, "packages": 14}),
        );
        bindings.insert(
            "advisories".to_string(),
            json!({"advisories": {"acme/http": [{"cve": "CVE-2024-21045"}]}}),
        );
        bindings.insert(
            "sbom".to_string(),
            json!({"packages": [
                {"name": "acme/http", "flags": ["outdated"]},
                {"name": "acme/yaml", "flags": []}
            ]}),
        );
        bindings.insert("details".to_string(), json!({"licenses": ["MIT", "BSD-2-Clause"]}));
        bindings
    }

    fn eval(input: &str) -> Result<Value, EvalError> {
        evaluate(&parse(input).unwrap(), &bindings())
    }

    #[test]
    fn test_member_access_and_comparison() {
        assert_eq!(eval("summary.advisories.total == 2").unwrap(), json!(true));
        assert_eq!(eval("summary.advisories.critical > 0").unwrap(), json!(false));
        assert_eq!(eval("summary.packages <= 14").unwrap(), json!(true));
    }

    #[test]
    fn test_missing_member_is_null() {
        assert_eq!(eval("summary.missing").unwrap(), Value::Null);
        assert_eq!(eval("summary.missing == null").unwrap(), json!(true));
        // probing through a missing branch stays null instead of erroring
        assert_eq!(eval("summary.missing.deeper == null").unwrap(), json!(true));
    }

    #[test]
    fn test_count_builtin() {
        assert_eq!(eval("count(sbom.packages) == 2").unwrap(), json!(true));
        assert_eq!(eval("count(details.licenses)").unwrap(), json!(2.0));
        assert_eq!(eval("count(summary.missing)").unwrap(), json!(0.0));
    }

    #[test]
    fn test_index_access() {
        assert_eq!(
            eval("sbom.packages[0].name == \"acme/http\"").unwrap(),
            json!(true)
        );
        assert_eq!(eval("sbom.packages[9]").unwrap(), Value::Null);
        assert_eq!(
            eval("summary[\"packages\"] == 14").unwrap(),
            json!(true)
        );
    }

    #[test]
    fn test_in_operator() {
        assert_eq!(eval("\"MIT\" in details.licenses").unwrap(), json!(true));
        assert_eq!(
            eval("\"GPL-3.0\" not in details.licenses").unwrap(),
            json!(true)
        );
        // object membership is by key
        assert_eq!(
            eval("\"acme/http\" in advisories.advisories").unwrap(),
            json!(true)
        );
        // string membership is substring
        assert_eq!(eval("\"acme\" in sbom.packages[0].name").unwrap(), json!(true));
    }

    #[test]
    fn test_logical_operators_short_circuit() {
        assert_eq!(eval("false && (1 / 0 == 0)").unwrap(), json!(false));
        assert_eq!(eval("true || (1 / 0 == 0)").unwrap(), json!(true));
        assert_eq!(eval("!false").unwrap(), json!(true));
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("1 + 2 * 3 == 7").unwrap(), json!(true));
        assert_eq!(eval("10 % 3 == 1").unwrap(), json!(true));
        assert_eq!(eval("-summary.packages == -14").unwrap(), json!(true));
        assert_eq!(eval("1 / 0"), Err(EvalError::DivisionByZero));
    }

    #[test]
    fn test_unknown_variable() {
        assert_eq!(
            eval("nonsense == 1"),
            Err(EvalError::UnknownVariable("nonsense".to_string()))
        );
    }

    #[test]
    fn test_unknown_function() {
        assert_eq!(
            eval("size(details.licenses)"),
            Err(EvalError::UnknownFunction("size".to_string()))
        );
    }

    #[test]
    fn test_type_errors() {
        assert!(matches!(eval("summary && true"), Err(EvalError::Type(_))));
        assert!(matches!(eval("!summary"), Err(EvalError::Type(_))));
        assert!(matches!(eval("\"a\" + 1"), Err(EvalError::Type(_))));
        assert!(matches!(eval("1 in 2"), Err(EvalError::Type(_))));
        assert!(matches!(eval("count(1)"), Err(EvalError::Type(_))));
    }

    #[test]
    fn test_array_literal_membership() {
        assert_eq!(
            eval("sbom.packages[0].name in [\"acme/http\", \"acme/cli\"]").unwrap(),
            json!(true)
        );
    }
}
