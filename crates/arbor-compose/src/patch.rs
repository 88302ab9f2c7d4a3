//! JSON patch (RFC 6902) for feedback state updates.
//!
//! Supports `add`, `remove`, `replace`, `move`, `copy` and `test`. Paths
//! are JSON pointers; `-` appends to an array.

use arbor_core::PatchError;
use serde_json::Value;

/// Apply `patch` to a copy of `doc`. Either every operation applies or
/// `doc` is left as it was.
pub fn apply_patch(doc: &Value, patch: &Value) -> Result<Value, PatchError> {
    let ops = patch.as_array().ok_or(PatchError::NotAnArray)?;
    let mut doc = doc.clone();

    for (index, op) in ops.iter().enumerate() {
        let name = field(op, "op", index)?;
        let path = field(op, "path", index)?;
        match name {
            "add" => add(&mut doc, path, value_of(op, index)?)?,
            "remove" => {
                remove(&mut doc, path)?;
            }
            "replace" => {
                let value = value_of(op, index)?;
                let target = doc.pointer_mut(path).ok_or_else(|| missing(path))?;
                *target = value;
            }
            "move" => {
                let from = field(op, "from", index)?;
                let value = remove(&mut doc, from)?;
                add(&mut doc, path, value)?;
            }
            "copy" => {
                let from = field(op, "from", index)?;
                let value = doc.pointer(from).cloned().ok_or_else(|| missing(from))?;
                add(&mut doc, path, value)?;
            }
            "test" => {
                if doc.pointer(path) != Some(&value_of(op, index)?) {
                    return Err(PatchError::TestFailed { path: path.to_string() });
                }
            }
            other => {
                return Err(PatchError::Malformed {
                    index,
                    reason: format!("unknown op `{other}`"),
                });
            }
        }
    }
    Ok(doc)
}

fn field<'a>(op: &'a Value, key: &str, index: usize) -> Result<&'a str, PatchError> {
    op.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| PatchError::Malformed {
            index,
            reason: format!("missing `{key}`"),
        })
}

fn value_of(op: &Value, index: usize) -> Result<Value, PatchError> {
    op.get("value").cloned().ok_or_else(|| PatchError::Malformed {
        index,
        reason: "missing `value`".to_string(),
    })
}

fn missing(path: &str) -> PatchError {
    PatchError::MissingPath { path: path.to_string() }
}

/// Parent pointer and unescaped last token.
fn split_last(path: &str) -> Result<(&str, String), PatchError> {
    let at = path.rfind('/').ok_or_else(|| missing(path))?;
    let token = path[at + 1..].replace("~1", "/").replace("~0", "~");
    Ok((&path[..at], token))
}

fn add(doc: &mut Value, path: &str, value: Value) -> Result<(), PatchError> {
    if path.is_empty() {
        *doc = value;
        return Ok(());
    }
    let (parent, token) = split_last(path)?;
    match doc.pointer_mut(parent) {
        Some(Value::Object(map)) => {
            map.insert(token, value);
            Ok(())
        }
        Some(Value::Array(items)) => {
            if token == "-" {
                items.push(value);
                return Ok(());
            }
            match token.parse::<usize>() {
                Ok(i) if i <= items.len() => {
                    items.insert(i, value);
                    Ok(())
                }
                _ => Err(missing(path)),
            }
        }
        _ => Err(missing(path)),
    }
}

fn remove(doc: &mut Value, path: &str) -> Result<Value, PatchError> {
    let (parent, token) = split_last(path)?;
    match doc.pointer_mut(parent) {
        Some(Value::Object(map)) => map.remove(&token).ok_or_else(|| missing(path)),
        Some(Value::Array(items)) => match token.parse::<usize>() {
            Ok(i) if i < items.len() => Ok(items.remove(i)),
            _ => Err(missing(path)),
        },
        _ => Err(missing(path)),
    }
}
