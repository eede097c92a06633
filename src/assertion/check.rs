use crate::assertion::model::{Assertion, AssertionVerdict};
use crate::errors::EngineError;
use crate::expression::{loose_decode, resolve_response};
use crate::json_compare;
use crate::logbook::CaseLog;
use serde_json::Value;
use std::collections::BTreeMap;

/// Evaluates every assertion against the response tree. A side that fails to
/// resolve or an operator mismatch is a recorded verdict; an operator applied
/// to a value it cannot work on (a membership test against a number, say) is
/// a crash that aborts the whole run.
pub fn evaluate(
    asserts: &[Assertion],
    tree: &Value,
    log: &CaseLog,
) -> Result<(BTreeMap<String, AssertionVerdict>, bool), EngineError> {
    let mut verdicts = BTreeMap::new();
    let mut passed = true;
    if asserts.is_empty() {
        log.append("no assertions set, case run passes");
        return Ok((verdicts, true));
    }
    for assertion in asserts {
        let id = assertion.id.to_string();
        let expected = match resolve_response(tree, &assertion.expected, log) {
            Ok(value) => value,
            Err(detail) => {
                passed = false;
                verdicts.insert(
                    id,
                    AssertionVerdict::failed(format!("variable resolution failed: {}", detail)),
                );
                continue;
            }
        };
        let actually = match resolve_response(tree, &assertion.actually, log) {
            Ok(value) => value,
            Err(detail) => {
                passed = false;
                verdicts.insert(
                    id,
                    AssertionVerdict::failed(format!("variable resolution failed: {}", detail)),
                );
                continue;
            }
        };
        let expected = loose_decode(expected);
        let actually = loose_decode(actually);
        match ops(&assertion.assert_type, &expected, &actually) {
            Ok(verdict) => {
                if !verdict.passed {
                    passed = false;
                }
                verdicts.insert(id, verdict);
            }
            Err(detail) => {
                return Err(EngineError::AssertionCrash {
                    expression: format!(
                        "{} {} {}",
                        assertion.expected, assertion.assert_type, assertion.actually
                    ),
                    detail,
                });
            }
        }
    }
    Ok((verdicts, passed))
}

/// Applies one operator tag to the decoded sides. Ok is a verdict either way;
/// Err means the operator could not be evaluated at all.
pub fn ops(
    assert_type: &str,
    expected: &Value,
    actually: &Value,
) -> Result<AssertionVerdict, String> {
    match assert_type {
        "equal" => Ok(if expected == actually {
            AssertionVerdict::passed(format!("expected {} equals actual {}", expected, actually))
        } else {
            AssertionVerdict::failed(format!(
                "expected {} does not equal actual {}",
                expected, actually
            ))
        }),
        "not_equal" => Ok(if expected != actually {
            AssertionVerdict::passed(format!(
                "expected {} does not equal actual {}",
                expected, actually
            ))
        } else {
            AssertionVerdict::failed(format!("expected {} equals actual {}", expected, actually))
        }),
        "in" => {
            let contained = value_contains(actually, expected)?;
            Ok(if contained {
                AssertionVerdict::passed(format!("{} is a member of {}", expected, actually))
            } else {
                AssertionVerdict::failed(format!("{} is not a member of {}", expected, actually))
            })
        }
        "not_in" => {
            let contained = value_contains(actually, expected)?;
            Ok(if !contained {
                AssertionVerdict::passed(format!("{} is not a member of {}", expected, actually))
            } else {
                AssertionVerdict::failed(format!("{} is a member of {}", expected, actually))
            })
        }
        "contain" => {
            let contained = value_contains(expected, actually)?;
            Ok(if contained {
                AssertionVerdict::passed(format!("{} contains {}", expected, actually))
            } else {
                AssertionVerdict::failed(format!("{} does not contain {}", expected, actually))
            })
        }
        "not_contain" => {
            let contained = value_contains(expected, actually)?;
            Ok(if !contained {
                AssertionVerdict::passed(format!("{} does not contain {}", expected, actually))
            } else {
                AssertionVerdict::failed(format!("{} contains {}", expected, actually))
            })
        }
        "length_eq" => check_length(expected, actually, |len, count| len == count),
        "length_gt" => check_length(expected, actually, |len, count| len > count),
        "length_ge" => check_length(expected, actually, |len, count| len >= count),
        "length_le" => check_length(expected, actually, |len, count| len <= count),
        "length_lt" => check_length(expected, actually, |len, count| len < count),
        "json_equal" => {
            let diffs = json_compare::compare(expected, actually);
            Ok(if diffs.is_empty() {
                AssertionVerdict::passed("expected JSON equals actual JSON")
            } else {
                AssertionVerdict::failed(format!(
                    "JSON trees differ: {}",
                    json_compare::render_diffs(&diffs)
                ))
            })
        }
        _ => Ok(AssertionVerdict::failed("unsupported operator")),
    }
}

/// Compares the actual value's length against the expected count.
fn check_length(
    expected: &Value,
    actually: &Value,
    compare: fn(usize, usize) -> bool,
) -> Result<AssertionVerdict, String> {
    let count = expected
        .as_u64()
        .ok_or_else(|| format!("expected count {} is not an integer", expected))?
        as usize;
    let len = value_length(actually)?;
    Ok(if compare(len, count) {
        AssertionVerdict::passed(format!("expected count {} vs actual length {}", count, len))
    } else {
        AssertionVerdict::failed(format!("expected count {} vs actual length {}", count, len))
    })
}

fn value_contains(container: &Value, member: &Value) -> Result<bool, String> {
    match container {
        Value::Array(items) => Ok(items.contains(member)),
        Value::String(text) => Ok(match member {
            Value::String(needle) => text.contains(needle),
            other => text.contains(&other.to_string()),
        }),
        Value::Object(map) => match member {
            Value::String(key) => Ok(map.contains_key(key)),
            // Keys are always strings, so any other member is simply absent.
            _ => Ok(false),
        },
        other => Err(format!("{} is not a container", other)),
    }
}

fn value_length(value: &Value) -> Result<usize, String> {
    match value {
        Value::Array(items) => Ok(items.len()),
        Value::Object(map) => Ok(map.len()),
        Value::String(text) => Ok(text.chars().count()),
        other => Err(format!("{} has no length", other)),
    }
}
