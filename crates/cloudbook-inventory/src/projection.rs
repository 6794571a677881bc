//! Projection from raw provider JSON to table rows
//!
//! Paths are dotted field names. On the items path, a segment ending in `[]`
//! flattens an array, so `Reservations[].Instances[]` yields every instance of
//! every reservation. Column paths are resolved relative to one item, and the
//! empty path selects the item itself.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::InventoryError;
use crate::types::Row;

/// Post-processing applied to a column value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "separator", rename_all = "snake_case")]
pub enum ValueTransform {
    /// Value as returned
    #[default]
    Raw,
    /// Last segment of a string after the separator (`arn:...:topic` → `topic`)
    ArnSuffix(char),
    /// Number of elements of an array or object
    Length,
}

impl ValueTransform {
    fn apply(self, value: Value) -> Value {
        match self {
            ValueTransform::Raw => value,
            ValueTransform::ArnSuffix(separator) => match value {
                Value::String(s) => {
                    Value::String(s.rsplit(separator).next().unwrap_or_default().to_string())
                }
                other => other,
            },
            ValueTransform::Length => match value {
                Value::Array(items) => Value::from(items.len()),
                Value::Object(map) => Value::from(map.len()),
                Value::Null => Value::from(0),
                _ => Value::Null,
            },
        }
    }
}

/// One output column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column header
    pub header: String,
    /// Dotted path relative to an item
    pub path: String,
    /// Post-processing
    #[serde(default)]
    pub transform: ValueTransform,
}

/// How a response becomes rows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projection {
    /// Path to the items inside the response
    pub items: String,
    /// Columns in output order
    pub columns: Vec<ColumnSpec>,
}

impl Projection {
    /// Column headers in order
    #[must_use]
    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.header.clone()).collect()
    }

    /// Apply the projection to a provider response
    ///
    /// # Errors
    /// Returns `MalformedResponse` when the response does not have the shape the
    /// items path expects. Missing fields are not errors: an absent items path
    /// yields no rows and an absent column yields `null`.
    pub fn apply(&self, response: &Value) -> Result<Vec<Row>, InventoryError> {
        let items = select_items(response, &self.items)?;

        Ok(items
            .into_iter()
            .map(|item| {
                Row::from_pairs(self.columns.iter().map(|column| {
                    let value = lookup(item, &column.path).cloned().unwrap_or(Value::Null);
                    (column.header.clone(), column.transform.apply(value))
                }))
            })
            .collect())
    }
}

/// Walk the items path, flattening `[]` segments
fn select_items<'a>(root: &'a Value, path: &str) -> Result<Vec<&'a Value>, InventoryError> {
    let mut current = vec![root];

    if path.is_empty() {
        return Ok(current.into_iter().filter(|v| !v.is_null()).collect());
    }

    for segment in path.split('.') {
        let (name, flatten) = match segment.strip_suffix("[]") {
            Some(name) => (name, true),
            None => (segment, false),
        };

        let mut next = Vec::new();
        for value in current {
            let field = if name.is_empty() {
                Some(value)
            } else {
                match value {
                    Value::Object(map) => map.get(name),
                    Value::Null => None,
                    other => {
                        return Err(InventoryError::MalformedResponse(format!(
                            "expected an object holding `{name}`, found {}",
                            type_name(other)
                        )));
                    }
                }
            };

            match (field, flatten) {
                (None | Some(Value::Null), _) => {}
                (Some(Value::Array(items)), true) => next.extend(items.iter()),
                (Some(other), true) => {
                    return Err(InventoryError::MalformedResponse(format!(
                        "expected `{name}` to be an array, found {}",
                        type_name(other)
                    )));
                }
                (Some(value), false) => next.push(value),
            }
        }
        current = next;
    }

    Ok(current)
}

/// Resolve a dotted path relative to one item
fn lookup<'a>(item: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(item);
    }
    path.split('.')
        .try_fold(item, |value, segment| value.as_object()?.get(segment))
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
