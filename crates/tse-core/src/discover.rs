use serde_json::{Value, json};

use crate::field::{is_int_like, norm_enum, retarget_enum_like};
use crate::path::{Token, TreePath, ci_get, ci_key, get, set};
use crate::unwrap::{DEFAULT_MAX_DEPTH, unwrap_node, unwrap_with_path};

/// Save variants disagree on the exact key spelling at every level, so each
/// hop is tried against a small alias list, case-insensitively.
const CONTAINER_ALIASES: [&str; 4] = [
    "questsavedata_0",
    "questsavedata",
    "quest_save_data_0",
    "quest_save_data",
];
const LIST_ALIASES: [&str; 4] = ["questlist_0", "questlist", "quests", "storyquests"];

pub const STATE_KEYS: [&str; 6] = [
    "QuestState_0",
    "State",
    "QuestState",
    "ElQuestState",
    "EQuestState",
    "Quest_State_0",
];
pub const NAME_KEYS: [&str; 6] = [
    "QuestCodeName_0",
    "QuestName_0",
    "Name",
    "CodeName",
    "QuestId_0",
    "QuestID",
];

/// One integer leaf discovered under an entity.
#[derive(Debug, Clone)]
pub struct ProgressObject {
    pub path_abs: TreePath,
    pub label: String,
    pub sig: String,
    pub value: i64,
}

/// One discovered entity, in absolute-path terms so writes stay valid even
/// if the caller rebuilds its own view of the tree.
#[derive(Debug, Clone)]
pub struct EntityRow {
    pub name: String,
    pub state: String,
    pub state_path_abs: Option<TreePath>,
    pub progress_objects: Vec<ProgressObject>,
    pub elem_base_abs: TreePath,
}

#[derive(Debug, Clone)]
pub struct DiscoveryReport {
    pub list_path: String,
    pub strategy: String,
    pub count: usize,
}

fn root_container<'a>(data: &'a Value) -> Option<(&'a Value, &'a str)> {
    let root = data.as_object()?.get("root")?.as_object()?;
    let props = root.get("properties")?.as_object()?;
    for alias in CONTAINER_ALIASES {
        if let Some(k) = ci_key(props, alias) {
            return Some((&props[k], k));
        }
    }
    None
}

/// Known-path attempt: container key, up to three nested Struct layers, an
/// optional named sub-list, then the Array payload.
fn find_array_known_path(data: &Value) -> Option<(TreePath, String)> {
    let (container, ckey) = root_container(data)?;
    let mut path: TreePath = vec![Token::key("root"), Token::key("properties"), Token::key(ckey)];
    let mut cur = container;

    for _ in 0..3 {
        if let Value::Object(map) = cur
            && let Some(sk) = ci_key(map, "struct")
            && (map[sk].is_object() || map[sk].is_array())
        {
            path.push(Token::key(sk));
            cur = &map[sk];
        } else {
            break;
        }
    }

    if let Value::Object(map) = cur {
        for alias in LIST_ALIASES {
            if let Some(lk) = ci_key(map, alias)
                && map[lk].is_object()
            {
                path.push(Token::key(lk));
                cur = &map[lk];
                break;
            }
        }
    }

    if let Value::Object(map) = cur
        && let Some(ak) = ci_key(map, "array")
        && let Some(arr) = map[ak].as_object()
    {
        if let Some(sk) = ci_key(arr, "struct")
            && let Some(sv) = arr[sk].as_object()
            && let Some(vk) = ci_key(sv, "value")
            && sv[vk].is_array()
        {
            path.extend([Token::key(ak), Token::key(sk), Token::key(vk)]);
            return Some((path, "Array.Struct.value".into()));
        }
        if let Some(vk) = ci_key(arr, "value")
            && arr[vk].is_array()
        {
            path.extend([Token::key(ak), Token::key(vk)]);
            return Some((path, "Array.value".into()));
        }
    }

    // last resort under the known container: generic unwrap
    let (u, upath) = unwrap_with_path(
        container,
        &[Token::key("root"), Token::key("properties"), Token::key(ckey)],
        DEFAULT_MAX_DEPTH,
    );
    if u.is_array() {
        return Some((upath, "generic unwrap".into()));
    }
    None
}

fn has_any_key(map: &serde_json::Map<String, Value>, aliases: &[&str]) -> bool {
    aliases.iter().any(|a| ci_key(map, a).is_some())
}

fn looks_like_entity(elem: &Value) -> bool {
    let e = unwrap_node(elem, DEFAULT_MAX_DEPTH);
    let Value::Object(map) = e else { return false };
    let state_aliases = [
        "queststate_0",
        "state",
        "queststate",
        "equeststate",
        "quest_state_0",
    ];
    let name_aliases = [
        "questcodename_0",
        "questname_0",
        "name",
        "codename",
        "questid_0",
        "questid",
    ];
    has_any_key(map, &state_aliases) && has_any_key(map, &name_aliases)
}

fn deep_candidate_scan(node: &Value, base: &[Token], hits: &mut Vec<(TreePath, usize)>) {
    if let Value::Array(items) = node
        && let Some(first) = items.first()
        && looks_like_entity(first)
    {
        hits.push((base.to_vec(), items.len()));
    }
    match node {
        Value::Object(map) => {
            for (k, v) in map {
                let mut p = base.to_vec();
                p.push(Token::key(k));
                deep_candidate_scan(v, &p, hits);
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                let mut p = base.to_vec();
                p.push(Token::Index(i));
                deep_candidate_scan(v, &p, hits);
            }
        }
        _ => {}
    }
}

/// Locate the entity array: known path first (precision over recall), then a
/// deep structural scan ranked by candidate length.
pub fn find_entity_array(data: &Value) -> Option<(TreePath, String)> {
    if let Some((path, how)) = find_array_known_path(data)
        && get(data, &path).and_then(Value::as_array).is_some_and(|a| !a.is_empty())
    {
        return Some((path, how));
    }
    let root = data.as_object()?.get("root")?;
    let mut hits = Vec::new();
    deep_candidate_scan(root, &[Token::key("root")], &mut hits);
    hits.sort_by(|a, b| b.1.cmp(&a.1));
    hits.into_iter().next().map(|(p, _)| (p, "deep-scan".into()))
}

/// Depth-first search for the first key matching one of `names`
/// (case-insensitively); returns the path relative to `node`.
pub fn dfs_find_key(node: &Value, names: &[&str]) -> Option<TreePath> {
    match node {
        Value::Object(map) => {
            for want in names {
                if let Some(k) = ci_key(map, want) {
                    return Some(vec![Token::key(k)]);
                }
            }
            for (k, v) in map {
                if let Some(mut rest) = dfs_find_key(v, names) {
                    let mut p = vec![Token::key(k)];
                    p.append(&mut rest);
                    return Some(p);
                }
            }
            None
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                if let Some(mut rest) = dfs_find_key(v, names) {
                    let mut p = vec![Token::Index(i)];
                    p.append(&mut rest);
                    return Some(p);
                }
            }
            None
        }
        _ => None,
    }
}

/// Fallback state search: any string leaf that looks like a quest-state enum.
pub(crate) fn dfs_find_enum_value(node: &Value) -> Option<TreePath> {
    match node {
        Value::String(s) if s.contains("QuestState::") || s.starts_with("E_") => Some(Vec::new()),
        Value::Object(map) => {
            for (k, v) in map {
                if let Some(mut rest) = dfs_find_enum_value(v) {
                    let mut p = vec![Token::key(k)];
                    p.append(&mut rest);
                    return Some(p);
                }
            }
            None
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                if let Some(mut rest) = dfs_find_enum_value(v) {
                    let mut p = vec![Token::Index(i)];
                    p.append(&mut rest);
                    return Some(p);
                }
            }
            None
        }
        _ => None,
    }
}

fn first_string(node: &Value, depth: usize) -> Option<&str> {
    if depth == 0 {
        return None;
    }
    match node {
        Value::String(s) => Some(s),
        Value::Object(map) => {
            // conventional string-holding keys first
            for key in ["name", "string", "str", "value"] {
                if let Some(Value::String(s)) = ci_get(map, key) {
                    return Some(s);
                }
            }
            map.values().find_map(|v| first_string(v, depth - 1))
        }
        Value::Array(items) => items.iter().find_map(|v| first_string(v, depth - 1)),
        _ => None,
    }
}

/// Name values are sometimes wrapped containers; recurse for the first
/// plausible string.
pub fn coerce_name(val: &Value) -> String {
    match val {
        Value::String(s) => s.clone(),
        other => first_string(other, 8).unwrap_or_default().to_string(),
    }
}

fn extract_state_value(node: &Value) -> String {
    if let Value::Object(map) = node {
        for key in ["enum", "name"] {
            match ci_get(map, key) {
                Some(Value::String(s)) => return s.clone(),
                Some(Value::Number(n)) => return n.to_string(),
                _ => {}
            }
        }
    }
    match node {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => "Inactive".to_string(),
    }
}

/// Readable label from the trailing path segments, with wrapper tokens
/// skipped and list indices folded into brackets.
pub fn pretty_label(path: &[Token]) -> String {
    const SKIP: [&str; 7] = ["Array", "Struct", "value", "Value", "Int", "Int32", "Int64"];
    let mut parts: Vec<String> = Vec::new();
    for tok in path {
        let s = tok.to_string();
        if SKIP.contains(&s.as_str()) {
            continue;
        }
        parts.push(s);
    }
    if parts.is_empty() {
        return "value".to_string();
    }
    let tail = &parts[parts.len().saturating_sub(3)..];
    let mut out: Vec<String> = Vec::new();
    for p in tail {
        if p.bytes().all(|b| b.is_ascii_digit()) && !out.is_empty() {
            let last = out.last_mut().unwrap();
            *last = format!("{}[{}]", last, p);
        } else {
            out.push(p.clone());
        }
    }
    out.join(".")
}

/// Lossy matching key from the last two path segments.
pub fn path_sig(path: &[Token]) -> String {
    path[path.len().saturating_sub(2)..]
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join("/")
        .to_lowercase()
}

fn collect_progress(node: &Value, rel: &[Token], out: &mut Vec<(TreePath, i64)>) {
    match node {
        Value::Object(map) => {
            for (k, v) in map {
                let mut p = rel.to_vec();
                p.push(Token::key(k));
                collect_progress(v, &p, out);
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                let mut p = rel.to_vec();
                p.push(Token::Index(i));
                collect_progress(v, &p, out);
            }
        }
        leaf if is_int_like(leaf) => {
            let v = match leaf {
                Value::Number(n) => n.as_i64().unwrap_or(0),
                Value::String(s) => s.trim().parse().unwrap_or(0),
                _ => 0,
            };
            out.push((rel.to_vec(), v));
        }
        _ => {}
    }
}

/// All int-like leaves under an (unwrapped) entity node, relative paths.
pub fn collect_progress_objects(node: &Value) -> Vec<(TreePath, i64)> {
    let mut out = Vec::new();
    collect_progress(unwrap_node(node, DEFAULT_MAX_DEPTH), &[], &mut out);
    out
}

/// Discover the entity rows in the tree. Best effort: an unrecognized tree
/// shape yields an empty row set, never an error.
pub fn discover_entities(data: &Value) -> (Vec<EntityRow>, Option<DiscoveryReport>) {
    let Some((list_path, how)) = find_entity_array(data) else {
        return (Vec::new(), None);
    };
    let Some(list) = get(data, &list_path).and_then(Value::as_array) else {
        return (Vec::new(), None);
    };
    let report = DiscoveryReport {
        list_path: crate::path::join_dotted(&list_path),
        strategy: how,
        count: list.len(),
    };

    let mut rows = Vec::with_capacity(list.len());
    for (idx, raw_elem) in list.iter().enumerate() {
        let mut elem_path = list_path.clone();
        elem_path.push(Token::Index(idx));
        let (node, elem_base) = unwrap_with_path(raw_elem, &elem_path, DEFAULT_MAX_DEPTH);

        let state_rel = dfs_find_key(node, &STATE_KEYS).or_else(|| dfs_find_enum_value(node));
        let name_rel = dfs_find_key(node, &NAME_KEYS);

        let state = match &state_rel {
            Some(rel) => get(node, rel).map(extract_state_value).unwrap_or_else(|| "Inactive".into()),
            None => "Inactive".to_string(),
        };
        let name = match &name_rel {
            Some(rel) => {
                let n = get(node, rel).map(coerce_name).unwrap_or_default();
                if n.is_empty() { coerce_name(node) } else { n }
            }
            None => coerce_name(node),
        };

        let mut progress_objects = Vec::new();
        for (rel, value) in collect_progress_objects(node) {
            let mut path_abs = elem_base.clone();
            path_abs.extend(rel.iter().cloned());
            progress_objects.push(ProgressObject {
                label: pretty_label(&rel),
                sig: path_sig(&path_abs),
                path_abs,
                value,
            });
        }

        rows.push(EntityRow {
            name,
            state,
            state_path_abs: state_rel.map(|rel| {
                let mut p = elem_base.clone();
                p.extend(rel);
                p
            }),
            progress_objects,
            elem_base_abs: elem_base,
        });
    }
    (rows, Some(report))
}

/// Resolve the leaf under a state wrapper where the value actually lives
/// (`Enum` or `Name` subkey when present).
pub fn state_leaf_path(data: &Value, path: &[Token]) -> TreePath {
    let mut out = path.to_vec();
    if let Some(Value::Object(map)) = get(data, path) {
        for key in ["enum", "name"] {
            if let Some(k) = ci_key(map, key) {
                out.push(Token::key(k));
                return out;
            }
        }
    }
    out
}

/// Map a canonical state to the ordinal used by saves that store the state
/// as a bare integer.
pub fn state_ordinal(canon: &str, current: i64) -> i64 {
    if canon.contains("E_INACTIVE") {
        0
    } else if canon.contains("E_IN_PROGRESS") {
        1
    } else if canon.contains("E_COMPLETE_SUCCESS") {
        2
    } else if canon.contains("E_COMPLETE_FAIL") {
        3
    } else {
        current
    }
}

/// Write state and/or one progress value onto a discovered row, targeting
/// the leaf the game actually reads.
pub fn apply_entity_edit(
    data: &mut Value,
    row: &EntityRow,
    new_state: Option<&str>,
    new_progress: Option<i64>,
    progress_path_override: Option<&[Token]>,
) -> bool {
    let mut changed = false;

    if let (Some(state), Some(state_path)) = (new_state, &row.state_path_abs) {
        let leaf = state_leaf_path(data, state_path);
        let canon = norm_enum(state);
        let val = match get(data, &leaf) {
            Some(Value::String(cur)) => json!(retarget_enum_like(cur, &canon)),
            Some(Value::Number(n)) => json!(state_ordinal(&canon, n.as_i64().unwrap_or(0))),
            _ => json!(canon),
        };
        changed |= set(data, &leaf, val);
    }

    let target = progress_path_override
        .map(|p| p.to_vec())
        .or_else(|| row.progress_objects.first().map(|o| o.path_abs.clone()));
    if let (Some(v), Some(path)) = (new_progress, target) {
        changed |= set(data, &path, json!(v));
    }

    changed
}
