use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScalarKind {
    Bool,
    Int,
    Float,
    Str,
}

fn scalar_kind(v: &Value) -> Option<ScalarKind> {
    match v {
        Value::Bool(_) => Some(ScalarKind::Bool),
        Value::Number(n) if n.is_f64() => Some(ScalarKind::Float),
        Value::Number(_) => Some(ScalarKind::Int),
        Value::String(_) => Some(ScalarKind::Str),
        _ => None,
    }
}

fn is_scalar_or_null(v: &Value) -> bool {
    matches!(
        v,
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_)
    )
}

/// Fold `edited` onto `baseline` without changing the container shapes the
/// external encoder expects: tag/value pairing, dict key sets, and list
/// lengths all come from the baseline. Irreconcilable spots keep the
/// baseline verbatim (logged, never raised) since the baseline is
/// encoder-safe by construction.
pub fn merge(baseline: &Value, edited: &Value) -> Value {
    merge_at(baseline, edited, "$")
}

fn merge_at(baseline: &Value, edited: &Value, path: &str) -> Value {
    // Tagged node: only the payload is editable, the tag is re-emitted as-is.
    if let Value::Object(base_map) = baseline
        && base_map.get("tag").is_some_and(is_scalar_or_null)
        && base_map.contains_key("value")
    {
        let edited_payload = match edited {
            Value::Object(em) if em.contains_key("value") => &em["value"],
            other => other,
        };
        let new_val = if edited_payload.is_null() {
            base_map["value"].clone()
        } else {
            merge_at(&base_map["value"], edited_payload, &format!("{path}.value"))
        };
        let mut out = serde_json::Map::with_capacity(2);
        out.insert("tag".into(), base_map["tag"].clone());
        out.insert("value".into(), new_val);
        return Value::Object(out);
    }

    match (baseline, edited) {
        (Value::Object(base_map), Value::Object(edited_map)) => {
            let mut out = base_map.clone();
            for (k, v) in edited_map {
                match base_map.get(k) {
                    Some(bv) => {
                        out.insert(k.clone(), merge_at(bv, v, &format!("{path}.{k}")));
                    }
                    None => {
                        // never invent keys the baseline schema lacks
                        debug!(path, key = %k, "dropping edited-only key");
                    }
                }
            }
            Value::Object(out)
        }
        (Value::Array(base_items), Value::Array(edited_items)) => {
            // length is schema-significant: cap at the baseline's length
            let mut out = base_items.clone();
            let n = base_items.len().min(edited_items.len());
            for i in 0..n {
                out[i] = merge_at(&base_items[i], &edited_items[i], &format!("{path}[{i}]"));
            }
            Value::Array(out)
        }
        (b, e) if is_scalar_or_null(b) && is_scalar_or_null(e) => {
            if b.is_null() || scalar_kind(b) == scalar_kind(e) {
                e.clone()
            } else {
                debug!(path, "scalar type mismatch, keeping baseline");
                b.clone()
            }
        }
        (b, _) => {
            debug!(path, "structural divergence, keeping baseline");
            b.clone()
        }
    }
}
