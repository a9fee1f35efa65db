use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::context::CoachContext;

/// Derive the cache key for one coaching request: a hex SHA-256 over
/// `(user_id, context, canonical payload)`.
///
/// The fingerprint is a pure function of the inputs that affect the
/// response - no wall-clock time. Any change to the user's underlying
/// data changes the payload, which changes the key and bypasses the
/// stale entry automatically.
pub fn fingerprint(user_id: &Uuid, context: CoachContext, payload: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hasher.update(b"|");
    hasher.update(context.as_tag().as_bytes());
    hasher.update(b"|");
    hasher.update(canonical_json(payload).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Serialize with object keys sorted recursively, so semantically equal
/// payloads hash identically regardless of map insertion order.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // serde_json string escaping for the key
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
