use serde_json::Value;

use crate::path::{Token, TreePath, ci_get, ci_key};

/// Generic wrapper keys tried after `Array`, in priority order. The
/// Array-first ordering matters: an Array-wrapped entity list must win over
/// descending into a sibling `Struct` layer.
const WRAPPER_KEYS: [&str; 4] = ["struct", "value", "data", "tag"];

pub const DEFAULT_MAX_DEPTH: usize = 12;

fn array_payload<'a>(arr_node: &'a Value) -> Option<&'a Value> {
    // Array.Struct.value (preferred), then Array.value
    let map = arr_node.as_object()?;
    if let Some(Value::Object(sv)) = ci_get(map, "struct")
        && let Some(inner @ Value::Array(_)) = ci_get(sv, "value")
    {
        return Some(inner);
    }
    if let Some(inner @ Value::Array(_)) = ci_get(map, "value") {
        return Some(inner);
    }
    None
}

/// Strip container wrappers until the payload is reached, the shape is no
/// longer recognized, or `max_depth` is exhausted.
pub fn unwrap_node(node: &Value, max_depth: usize) -> &Value {
    let mut cur = node;
    let mut depth = 0;
    while depth < max_depth {
        let Value::Object(map) = cur else { break };

        if let Some(ak) = ci_key(map, "array")
            && map[ak].is_object()
        {
            let arr = &map[ak];
            if let Some(list) = array_payload(arr) {
                return list;
            }
            cur = arr;
            depth += 1;
            continue;
        }

        let mut advanced = false;
        for want in WRAPPER_KEYS {
            if let Some(wk) = ci_key(map, want)
                && (map[wk].is_object() || map[wk].is_array())
            {
                cur = &map[wk];
                depth += 1;
                advanced = true;
                break;
            }
        }
        if !advanced {
            break;
        }
    }
    cur
}

/// Like [`unwrap_node`], additionally tracking the absolute path of the
/// returned node. `base` is the absolute path of `node` itself.
pub fn unwrap_with_path<'a>(
    node: &'a Value,
    base: &[Token],
    max_depth: usize,
) -> (&'a Value, TreePath) {
    let mut cur = node;
    let mut path: TreePath = base.to_vec();
    let mut depth = 0;
    while depth < max_depth {
        let Value::Object(map) = cur else { break };

        if let Some(ak) = ci_key(map, "array")
            && let Some(arr) = map[ak].as_object()
        {
            path.push(Token::key(ak));
            if let Some(sk) = ci_key(arr, "struct")
                && let Some(sv) = arr[sk].as_object()
                && let Some(vk) = ci_key(sv, "value")
                && sv[vk].is_array()
            {
                path.push(Token::key(sk));
                path.push(Token::key(vk));
                return (&sv[vk], path);
            }
            if let Some(vk) = ci_key(arr, "value")
                && arr[vk].is_array()
            {
                path.push(Token::key(vk));
                return (&arr[vk], path);
            }
            cur = &map[ak];
            depth += 1;
            continue;
        }

        let mut advanced = false;
        for want in WRAPPER_KEYS {
            if let Some(wk) = ci_key(map, want)
                && (map[wk].is_object() || map[wk].is_array())
            {
                path.push(Token::key(wk));
                cur = &map[wk];
                depth += 1;
                advanced = true;
                break;
            }
        }
        if !advanced {
            break;
        }
    }
    (cur, path)
}
