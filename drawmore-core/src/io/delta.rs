//! # Delta packing
//!
//! Consecutive drawing commands tend to differ in a field or two (a new point, same brush,
//! same color...). Each object command with a `"type"` is stored as only the fields that changed
//! since the previous command of that same type.
//!
//! Packed entries:
//! * An object without a type, or the first of its type: the object itself.
//! * An object of an already-seen type: `[type, {changed}]`, or `[type, {changed}, [removed]]`.
//! * Any other non-null value: `[value]`.
//! * `null`: `null`, left alone so that validation downstream can reject it.

use hashbrown::HashMap;
use serde_json::{Map, Value};

/// Field naming the kind of a command.
pub const KIND_FIELD: &str = "type";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DeltaError {
    #[error("packed draw array is not an array")]
    NotAnArray,
    #[error("entry {0} is malformed")]
    Malformed(usize),
    #[error("entry {0} is a delta of a kind with no prior command")]
    UnknownBase(usize),
}

/// Key for the last-seen table. The kind may be any JSON value, so key by its serialized text.
fn kind_key(kind: &Value) -> String {
    kind.to_string()
}

/// Delta-pack a sequence of commands into a single JSON array.
#[must_use]
pub fn pack(commands: &[Value]) -> Value {
    let mut last_of_kind = HashMap::<String, &Map<String, Value>>::new();
    let packed = commands
        .iter()
        .map(|command| {
            let object = match command {
                Value::Null => return Value::Null,
                Value::Object(object) => object,
                other => return Value::Array(vec![other.clone()]),
            };
            let Some(kind) = object.get(KIND_FIELD) else {
                return command.clone();
            };
            let key = kind_key(kind);
            let Some(previous) = last_of_kind.insert(key, object) else {
                // First of its kind, nothing to diff against.
                return command.clone();
            };

            let changed: Map<String, Value> = object
                .iter()
                .filter(|(field, value)| previous.get(*field) != Some(*value))
                .map(|(field, value)| (field.clone(), value.clone()))
                .collect();
            let removed: Vec<Value> = previous
                .keys()
                .filter(|field| !object.contains_key(*field))
                .map(|field| Value::String(field.clone()))
                .collect();

            let mut delta = vec![kind.clone(), Value::Object(changed)];
            if !removed.is_empty() {
                delta.push(Value::Array(removed));
            }
            Value::Array(delta)
        })
        .collect();
    Value::Array(packed)
}

/// Reverse of [`pack`].
/// # Errors
/// If `packed` was not produced by [`pack`] (or was damaged since).
pub fn unpack(packed: Value) -> Result<Vec<Value>, DeltaError> {
    let Value::Array(entries) = packed else {
        return Err(DeltaError::NotAnArray);
    };
    let mut last_of_kind = HashMap::<String, Map<String, Value>>::new();
    let mut commands = Vec::with_capacity(entries.len());

    for (idx, entry) in entries.into_iter().enumerate() {
        let command = match entry {
            Value::Null => Value::Null,
            Value::Object(object) => {
                if let Some(kind) = object.get(KIND_FIELD) {
                    last_of_kind.insert(kind_key(kind), object.clone());
                }
                Value::Object(object)
            }
            Value::Array(mut parts) => match parts.len() {
                1 => parts.pop().ok_or(DeltaError::Malformed(idx))?,
                2 | 3 => {
                    let removed = if parts.len() == 3 { parts.pop() } else { None };
                    let Some(Value::Object(changed)) = parts.pop() else {
                        return Err(DeltaError::Malformed(idx));
                    };
                    let kind = parts.pop().ok_or(DeltaError::Malformed(idx))?;
                    let key = kind_key(&kind);
                    let mut object = last_of_kind
                        .get(&key)
                        .cloned()
                        .ok_or(DeltaError::UnknownBase(idx))?;

                    match removed {
                        None => (),
                        Some(Value::Array(removed)) => {
                            for field in removed {
                                let Value::String(field) = field else {
                                    return Err(DeltaError::Malformed(idx));
                                };
                                object.remove(&field);
                            }
                        }
                        Some(_) => return Err(DeltaError::Malformed(idx)),
                    }
                    object.extend(changed);
                    // Deltas can't change the kind, that would have been a different base.
                    if object.get(KIND_FIELD) != Some(&kind) {
                        return Err(DeltaError::Malformed(idx));
                    }

                    last_of_kind.insert(key, object.clone());
                    Value::Object(object)
                }
                _ => return Err(DeltaError::Malformed(idx)),
            },
            _ => return Err(DeltaError::Malformed(idx)),
        };
        commands.push(command);
    }

    Ok(commands)
}
