//! Reading node parameters out of the run state.

use serde_json::Value;
use threadline_node::NodeError;
use threadline_workflow::State;

/// Read a positive integer parameter, accepting numbers and numeric strings.
pub(crate) fn positive(state: &State, key: &str, default: usize) -> Result<usize, NodeError> {
  let value = match state.get(key) {
    None | Some(Value::Null) => return Ok(default),
    Some(Value::Number(n)) => n.as_u64().or_else(|| whole(n.as_f64()?)).map(|n| n as usize),
    Some(Value::String(s)) => s.trim().parse::<usize>().ok(),
    Some(_) => None,
  };

  match value {
    Some(n) if n > 0 => Ok(n),
    _ => Err(NodeError::new(format!(
      "'{}' must be a positive integer, got {}",
      key,
      state.get(key).map(Value::to_string).unwrap_or_default()
    ))),
  }
}

fn whole(f: f64) -> Option<u64> {
  (f.fract() == 0.0 && f >= 0.0 && f <= u64::MAX as f64).then(|| f as u64)
}

/// Read an optional positive integer parameter.
pub(crate) fn optional_positive(state: &State, key: &str) -> Result<Option<usize>, NodeError> {
  match state.get(key) {
    None | Some(Value::Null) => Ok(None),
    Some(_) => positive(state, key, 1).map(Some),
  }
}

/// Read a string field, treating a missing field as empty.
pub(crate) fn text<'a>(state: &'a State, key: &str) -> Result<&'a str, NodeError> {
  match state.get(key) {
    None | Some(Value::Null) => Ok(""),
    Some(Value::String(s)) => Ok(s.as_str()),
    Some(other) => Err(NodeError::new(format!(
      "'{}' must be a string, got {}",
      key, other
    ))),
  }
}

/// Read a list of strings, treating a missing field as empty.
pub(crate) fn strings(state: &State, key: &str) -> Result<Vec<String>, NodeError> {
  match state.get(key) {
    None | Some(Value::Null) => Ok(Vec::new()),
    Some(Value::Array(items)) => items
      .iter()
      .map(|item| {
        item
          .as_str()
          .map(str::to_string)
          .ok_or_else(|| NodeError::new(format!("'{}' must only contain strings", key)))
      })
      .collect(),
    Some(other) => Err(NodeError::new(format!(
      "'{}' must be a list of strings, got {}",
      key, other
    ))),
  }
}
