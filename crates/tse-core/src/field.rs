use serde_json::{Map, Value, json};

pub const INT32_MAX: i64 = (1 << 31) - 1;

/// Clamp to the `[0, i32::MAX]` range the binary encoder accepts for
/// IntProperty values.
pub fn clamp_i32(v: i64) -> i64 {
    v.clamp(0, INT32_MAX)
}

/// Uppercase an enum-like value and fold `::`, `-`, and spaces to `_`.
pub fn norm_enum(s: &str) -> String {
    s.trim()
        .replace("::", "_")
        .replace(['-', ' '], "_")
        .to_uppercase()
}

/// Rewrite only the portion of an enum-like value after the last `E_`
/// marker, keeping whatever prefix convention the save already uses
/// (`ELQuestState::`, `ELQUESTSTATE_`, or none) byte-for-byte. The marker
/// must start a segment (string start, or after `::`/`_`/`-`/space) so the
/// trailing `E` of a namespace like `ELQUESTSTATE_` is not mistaken for it.
pub fn retarget_enum_like(current_raw: &str, canonical_raw: &str) -> String {
    let cur = current_raw.trim();
    let canon = norm_enum(canonical_raw);
    let bytes = cur.as_bytes();
    let mut marker = None;
    for i in 0..bytes.len().saturating_sub(1) {
        if bytes[i].eq_ignore_ascii_case(&b'e')
            && bytes[i + 1] == b'_'
            && (i == 0 || matches!(bytes[i - 1], b'_' | b'-' | b' ' | b':'))
        {
            marker = Some(i);
        }
    }
    match marker {
        Some(i) => format!("{}{}", &cur[..i], canon),
        None => canon,
    }
}

fn as_i64_lenient(v: &Value) -> i64 {
    match v {
        Value::Number(n) => n.as_i64().unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Is this leaf an integer or an integer-looking string? Booleans are not
/// integers here.
pub fn is_int_like(v: &Value) -> bool {
    match v {
        Value::Number(n) => n.is_i64() || n.is_u64(),
        Value::String(s) => {
            let s = s.trim();
            let s = s.strip_prefix(['+', '-']).unwrap_or(s);
            !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
        }
        _ => false,
    }
}

/// Write a clamped integer into an existing `Int`/`Int64` slot, preferring
/// whichever is present and rewriting the tag to match; creates `Int` when
/// neither exists. With `apply = false` nothing is mutated but the return
/// value still reports whether a change would occur.
pub fn set_int(node: &mut Map<String, Value>, value: i64, apply: bool) -> bool {
    let v = clamp_i32(value);

    if node.contains_key("Int") {
        if as_i64_lenient(&node["Int"]) == v {
            return false;
        }
        if apply {
            node.insert("Int".into(), json!(v));
            node.insert("tag".into(), json!({"data": {"Other": "IntProperty"}}));
        }
        return true;
    }

    if node.contains_key("Int64") {
        if as_i64_lenient(&node["Int64"]) == v {
            return false;
        }
        if apply {
            node.insert("Int64".into(), json!(v));
            node.insert("tag".into(), json!({"data": {"Other": "Int64Property"}}));
        }
        return true;
    }

    // no numeric slot present, create Int
    if apply {
        node.insert("Int".into(), json!(v));
        node.insert("tag".into(), json!({"data": {"Other": "IntProperty"}}));
    }
    true
}

pub fn set_bool(node: &mut Map<String, Value>, value: bool, apply: bool) -> bool {
    if node.get("Bool").and_then(Value::as_bool) == Some(value) {
        return false;
    }
    if apply {
        node.insert("Bool".into(), json!(value));
        if !node.contains_key("tag") {
            node.insert("tag".into(), json!({"data": {"Other": "BoolProperty"}}));
        }
    }
    true
}

/// Ensure the node holds `Type::Value`. A caller-supplied value that already
/// carries a namespace is used as-is. Change detection is an exact string
/// compare; no case folding at this layer.
pub fn set_enum(node: &mut Map<String, Value>, enum_type: &str, enum_value: &str, apply: bool) -> bool {
    let target = if enum_value.contains("::") {
        enum_value.to_string()
    } else {
        format!("{}::{}", enum_type, enum_value)
    };
    if node.get("Enum").and_then(Value::as_str) == Some(target.as_str()) {
        return false;
    }
    if apply {
        node.insert("Enum".into(), json!(target));
        node.insert("tag".into(), json!({"data": {"Enum": [enum_type, Value::Null]}}));
    }
    true
}

fn ensure_map<'a>(parent: &'a mut Map<String, Value>, key: &str) -> &'a mut Map<String, Value> {
    if !parent.get(key).is_some_and(Value::is_object) {
        parent.insert(key.to_string(), json!({}));
    }
    parent
        .get_mut(key)
        .and_then(Value::as_object_mut)
        .expect("just inserted an object")
}

pub fn ensure_int_property<'a>(
    parent: &'a mut Map<String, Value>,
    key: &str,
) -> &'a mut Map<String, Value> {
    let node = ensure_map(parent, key);
    // prefer Int; normalize if only Int64 present
    if !node.contains_key("Int") && node.contains_key("Int64") {
        let v = as_i64_lenient(&node["Int64"]);
        node.insert("Int".into(), json!(v));
        node.remove("Int64");
    }
    node.entry("tag")
        .or_insert_with(|| json!({"data": {"Other": "IntProperty"}}));
    node.entry("Int").or_insert_with(|| json!(0));
    node
}

pub fn ensure_bool_property<'a>(
    parent: &'a mut Map<String, Value>,
    key: &str,
) -> &'a mut Map<String, Value> {
    let node = ensure_map(parent, key);
    node.entry("tag")
        .or_insert_with(|| json!({"data": {"Other": "BoolProperty"}}));
    node.entry("Bool").or_insert_with(|| json!(false));
    node
}

pub fn ensure_enum_property<'a>(
    parent: &'a mut Map<String, Value>,
    key: &str,
    enum_type: &str,
) -> &'a mut Map<String, Value> {
    let node = ensure_map(parent, key);
    node.insert("tag".into(), json!({"data": {"Enum": [enum_type, Value::Null]}}));
    node.entry("Enum")
        .or_insert_with(|| json!(format!("{}::", enum_type)));
    node
}
