use serde_json::Value;
use std::fmt;

/// One difference between two JSON trees, addressed by a dotted path.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffEntry {
    pub path: String,
    pub detail: String,
}

impl fmt::Display for DiffEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "$" } else { &self.path };
        write!(f, "[{}] {}", path, self.detail)
    }
}

/// Structural diff of two JSON values. An empty result means the trees are
/// equal. Objects are compared by key union, arrays index by index.
pub fn compare(expected: &Value, actual: &Value) -> Vec<DiffEntry> {
    let mut diffs = Vec::new();
    compare_at(expected, actual, "", &mut diffs);
    diffs
}

pub fn render_diffs(diffs: &[DiffEntry]) -> String {
    diffs
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<String>>()
        .join("; ")
}

fn compare_at(expected: &Value, actual: &Value, path: &str, diffs: &mut Vec<DiffEntry>) {
    match (expected, actual) {
        (Value::Object(left), Value::Object(right)) => {
            for (key, left_value) in left {
                let child = join_path(path, key);
                match right.get(key) {
                    Some(right_value) => compare_at(left_value, right_value, &child, diffs),
                    None => diffs.push(DiffEntry {
                        path: child,
                        detail: format!("missing in actual, expected {}", left_value),
                    }),
                }
            }
            for (key, right_value) in right {
                if !left.contains_key(key) {
                    diffs.push(DiffEntry {
                        path: join_path(path, key),
                        detail: format!("unexpected value {}", right_value),
                    });
                }
            }
        }
        (Value::Array(left), Value::Array(right)) => {
            if left.len() != right.len() {
                diffs.push(DiffEntry {
                    path: path.to_string(),
                    detail: format!("length {} != {}", left.len(), right.len()),
                });
            }
            for (index, (left_item, right_item)) in left.iter().zip(right.iter()).enumerate() {
                compare_at(left_item, right_item, &format!("{}[{}]", path, index), diffs);
            }
        }
        (left, right) => {
            if left != right {
                diffs.push(DiffEntry {
                    path: path.to_string(),
                    detail: format!("{} != {}", left, right),
                });
            }
        }
    }
}

fn join_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}
