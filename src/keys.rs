//! Key Canonicalization
//!
//! Turns structured query options into stable cache keys.
//!
//! Keys have the form `{namespace}:{canonical-json}` where object members are
//! sorted by name at every depth and array order is kept. Two option values
//! that differ only in member insertion order produce the same key; any
//! structural difference produces a different one.

use serde::Serialize;
use serde_json::Value;

use crate::error::Result;

// == Generate Key ==
/// Derives the cache key for `options` under `namespace`.
///
/// Fails only when the `Serialize` impl of `options` itself fails, e.g. a map
/// whose keys are not strings.
///
/// # Example
/// ```
/// use serde_json::json;
/// use kb_cache::keys::generate_key;
///
/// let a = generate_key("entries", &json!({"page": 1, "sortBy": "title"})).unwrap();
/// let b = generate_key("entries", &json!({"sortBy": "title", "page": 1})).unwrap();
/// assert_eq!(a, b);
/// ```
pub fn generate_key<T>(namespace: &str, options: &T) -> Result<String>
where
    T: Serialize + ?Sized,
{
    let value = serde_json::to_value(options)?;
    Ok(key_for_value(namespace, &value))
}

/// Derives the cache key for an already-built JSON value.
pub fn key_for_value(namespace: &str, options: &Value) -> String {
    let mut key = String::with_capacity(namespace.len() + 64);
    key.push_str(namespace);
    key.push(':');
    write_canonical(options, &mut key);
    key
}

// == Canonicalize ==
/// Serializes `value` as compact JSON with object members sorted by name.
pub fn canonicalize(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

/// Pending output while walking a value.
enum Step<'a> {
    Value(&'a Value),
    Name(&'a str),
    Punct(char),
}

// Walks with an explicit stack so nesting depth is bounded by the heap, not
// the thread stack.
fn write_canonical(value: &Value, out: &mut String) {
    let mut pending = vec![Step::Value(value)];

    while let Some(step) = pending.pop() {
        match step {
            Step::Punct(c) => out.push(c),
            Step::Name(name) => out.push_str(&Value::from(name).to_string()),
            Step::Value(Value::Object(map)) => {
                let mut members: Vec<(&String, &Value)> = map.iter().collect();
                members.sort_unstable_by(|a, b| a.0.cmp(b.0));

                out.push('{');
                pending.push(Step::Punct('}'));
                for (i, (name, member)) in members.into_iter().enumerate().rev() {
                    pending.push(Step::Value(member));
                    pending.push(Step::Punct(':'));
                    pending.push(Step::Name(name));
                    if i > 0 {
                        pending.push(Step::Punct(','));
                    }
                }
            }
            Step::Value(Value::Array(items)) => {
                out.push('[');
                pending.push(Step::Punct(']'));
                for (i, item) in items.iter().enumerate().rev() {
                    pending.push(Step::Value(item));
                    if i > 0 {
                        pending.push(Step::Punct(','));
                    }
                }
            }
            Step::Value(scalar) => out.push_str(&scalar.to_string()),
        }
    }
}
