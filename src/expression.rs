use crate::errors::EngineError;
use crate::logbook::CaseLog;
use crate::store::{ConfigKind, GlobalConfig};
use regex::Regex;
use serde_json::{Map, Value};

/// Matches `${path}` tokens, shortest match, all occurrences.
pub fn el_pattern() -> Regex {
    Regex::new(r"\$\{(.+?)\}").unwrap()
}

/// Inner paths of every `${...}` token in the input, in order of appearance.
pub fn extract_tokens(input: &str) -> Vec<String> {
    el_pattern()
        .captures_iter(input)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Index(usize),
    Key(String),
}

/// A path is dot separated. A segment parsing as a non-negative integer is an
/// array index, anything else is a map key.
pub fn parse_path(path: &str) -> Vec<Segment> {
    path.split('.')
        .map(|part| match part.parse::<usize>() {
            Ok(index) => Segment::Index(index),
            Err(_) => Segment::Key(part.to_string()),
        })
        .collect()
}

/// Walks a path against a value tree. A string met mid walk is re-parsed as
/// JSON before continuing, which is what makes doubly encoded values (a JSON
/// document stored inside a string field) addressable. A string that does not
/// parse stops the walk and is returned as is. A missing key or index yields
/// None.
pub fn walk_value(root: &Value, segments: &[Segment], log: &CaseLog) -> Option<Value> {
    let mut current = root.clone();
    for segment in segments {
        if let Value::String(text) = &current {
            match serde_json::from_str::<Value>(text) {
                Ok(parsed) => current = parsed,
                Err(err) => {
                    log.append(format!("value is not JSON, stopping walk at [{}]: {}", text, err));
                    return Some(current);
                }
            }
        }
        let next = match segment {
            Segment::Index(index) => current.get(index),
            Segment::Key(key) => current.get(key.as_str()),
        };
        match next {
            Some(value) => current = value.clone(),
            None => return None,
        }
    }
    Some(current)
}

/// Text form used when substituting a resolved value back into a field:
/// strings keep their raw content, everything else becomes JSON text.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Resolves one token path against a parameter map. The first segment must be
/// a key present in the map, otherwise the token is left alone. A dead end in
/// the walk is logged and skipped rather than failed.
pub fn resolve_token(path: &str, params: &Map<String, Value>, log: &CaseLog) -> Option<String> {
    let segments = parse_path(path);
    match segments.first() {
        Some(Segment::Key(first)) if params.contains_key(first) => {}
        _ => return None,
    }
    match walk_value(&Value::Object(params.clone()), &segments, log) {
        Some(value) => Some(value_to_text(&value)),
        None => {
            log.append(format!("variable substitution skipped, no data at [{}]", path));
            None
        }
    }
}

/// Rewrites every resolvable `${...}` token in a text field. Returns the new
/// text when at least one substitution happened.
pub fn rewrite_text(field: &str, params: &Map<String, Value>, log: &CaseLog) -> Option<String> {
    let mut result = field.to_string();
    let mut changed = false;
    for token in extract_tokens(field) {
        if let Some(text) = resolve_token(&token, params, log) {
            result = result.replace(&format!("${{{}}}", token), &text);
            changed = true;
        }
    }
    changed.then_some(result)
}

/// Decodes a global config entry and walks the remaining path segments into
/// it. Unlike context resolution, any failure here is an error: global
/// variables are configuration and must resolve.
pub fn decode_config(config: &GlobalConfig, path: &str) -> Result<String, EngineError> {
    let segments = parse_path(path);
    let rest = &segments[1..];
    let root = match config.kind {
        ConfigKind::String => return Ok(config.value.clone()),
        ConfigKind::Json => serde_json::from_str::<Value>(&config.value)
            .map_err(|err| EngineError::Config(format!("invalid JSON for [{}]: {}", path, err)))?,
        ConfigKind::Yaml => serde_yaml::from_str::<Value>(&config.value)
            .map_err(|err| EngineError::Config(format!("invalid YAML for [{}]: {}", path, err)))?,
    };
    let silent = CaseLog::new();
    match walk_value(&root, rest, &silent) {
        Some(value) => Ok(value_to_text(&value)),
        None => Err(EngineError::Config(format!("no data at [{}]", path))),
    }
}

/// Resolves one side of an assertion against the response tree. Only the first
/// token is considered; an expression without tokens is returned verbatim as a
/// string value. A dead end is an error the caller turns into a failed
/// verdict.
pub fn resolve_response(tree: &Value, expression: &str, log: &CaseLog) -> Result<Value, String> {
    let tokens = extract_tokens(expression);
    let token = match tokens.first() {
        None => return Ok(Value::String(expression.to_string())),
        Some(token) => token,
    };
    let segments = parse_path(token);
    match walk_value(tree, &segments, log) {
        Some(value) => Ok(value),
        None => Err(format!("no data at [{}]", token)),
    }
}

/// Best effort JSON decode: strings that parse become structure, everything
/// else (including strings that do not parse) is kept as is.
pub fn loose_decode(value: Value) -> Value {
    match value {
        Value::String(text) => match serde_json::from_str::<Value>(&text) {
            Ok(parsed) => parsed,
            Err(_) => Value::String(text),
        },
        other => other,
    }
}
