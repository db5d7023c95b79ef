use std::collections::{HashMap, HashSet, VecDeque};

use serde_json::{Value, json};
use tracing::debug;

use crate::discover::{
    EntityRow, NAME_KEYS, STATE_KEYS, discover_entities, find_entity_array, state_leaf_path,
    state_ordinal,
};
use crate::export::ExportRow;
use crate::field::{norm_enum, retarget_enum_like};
use crate::path::{Token, TreePath, get, get_mut, set};
use crate::unwrap::{DEFAULT_MAX_DEPTH, unwrap_with_path};

/// Normalize a name for cross-save matching: lowercase, punctuation,
/// whitespace, and underscores stripped.
pub fn norm_name(s: &str) -> String {
    s.trim()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn scalar_of(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

/// DFS under `base_path` for an integer leaf whose immediate parent key
/// matches `key_lower`, directly or through a one-level wrapper such as
/// `{"Int": 1}`. Returns the absolute path to the leaf.
pub fn dfs_find_int_by_key(data: &Value, base_path: &[Token], key_lower: &str) -> Option<TreePath> {
    fn walk(node: &Value, p: &[Token], key_lower: &str) -> Option<TreePath> {
        match node {
            Value::Object(map) => {
                for (k, v) in map {
                    let mut kp = p.to_vec();
                    kp.push(Token::key(k));
                    if k.to_lowercase() == key_lower {
                        if v.is_i64() || v.is_u64() {
                            return Some(kp);
                        }
                        if let Value::Object(inner) = v {
                            for (ik, iv) in inner {
                                if iv.is_i64() || iv.is_u64() {
                                    kp.push(Token::key(ik));
                                    return Some(kp);
                                }
                            }
                        }
                    }
                    if let Some(found) = walk(v, &kp, key_lower) {
                        return Some(found);
                    }
                }
                None
            }
            Value::Array(items) => {
                for (i, v) in items.iter().enumerate() {
                    let mut ip = p.to_vec();
                    ip.push(Token::Index(i));
                    if let Some(found) = walk(v, &ip, key_lower) {
                        return Some(found);
                    }
                }
                None
            }
            _ => None,
        }
    }
    let root = get(data, base_path)?;
    walk(root, base_path, key_lower)
}

/// Clone a structural template entity and patch only the leaves we can
/// identify: name, retargeted state, and progress ints by parent-key match.
fn build_from_template(
    template: &Value,
    name: &str,
    state_canon: &str,
    progress: &[crate::export::ProgressEntry],
) -> Value {
    let mut new_elem = template.clone();
    let (name_rel, state_rel, base_abs) = {
        let (unwrapped, base_abs) = unwrap_with_path(&new_elem, &[], DEFAULT_MAX_DEPTH);
        (
            crate::discover::dfs_find_key(unwrapped, &NAME_KEYS),
            crate::discover::dfs_find_key(unwrapped, &STATE_KEYS)
                .or_else(|| crate::discover::dfs_find_enum_value(unwrapped)),
            base_abs,
        )
    };

    if let Some(rel) = name_rel {
        let mut p = base_abs.clone();
        p.extend(rel);
        set(&mut new_elem, &p, json!(name));
    }

    if let Some(rel) = state_rel {
        let mut p = base_abs.clone();
        p.extend(rel);
        let leaf = state_leaf_path(&new_elem, &p);
        let val = match get(&new_elem, &leaf) {
            Some(Value::String(cur)) => json!(retarget_enum_like(cur, state_canon)),
            Some(Value::Number(n)) => json!(state_ordinal(state_canon, n.as_i64().unwrap_or(0))),
            _ => json!(state_canon),
        };
        set(&mut new_elem, &leaf, val);
    }

    for entry in progress {
        let label_lc = entry.label.trim().to_lowercase();
        if label_lc.is_empty() {
            continue;
        }
        if let Some(abs) = dfs_find_int_by_key(&new_elem, &base_abs, &label_lc) {
            set(&mut new_elem, &abs, json!(entry.value));
        }
    }

    new_elem
}

fn pop_unused(queue: &mut VecDeque<usize>, used: &HashSet<usize>) -> Option<usize> {
    while let Some(&front) = queue.front() {
        if used.contains(&front) {
            queue.pop_front();
        } else {
            return queue.pop_front();
        }
    }
    None
}

/// Reconcile previously exported rows against the entities discovered in the
/// current tree. Entities match by normalized name in first-seen FIFO order;
/// progress values fall through six strictly ordered tiers. With
/// `add_missing`, unmatched names are synthesized from a structural template
/// and appended to the live entity array.
///
/// Returns `(entities_touched, progress_values_set)`.
pub fn reconcile(data: &mut Value, imported: &[ExportRow], add_missing: bool) -> (usize, usize) {
    let (cur_rows, _) = discover_entities(data);

    let mut by_name: HashMap<String, VecDeque<EntityRow>> = HashMap::new();
    for r in cur_rows {
        let nm = norm_name(&r.name);
        if !nm.is_empty() {
            by_name.entry(nm).or_default().push_back(r);
        }
    }

    let array_path = find_entity_array(data).map(|(p, _)| p);
    let template = array_path.as_ref().and_then(|p| {
        let mut first = p.clone();
        first.push(Token::Index(0));
        get(data, &first).cloned()
    });

    let mut applied_rows = 0usize;
    let mut applied_prog = 0usize;
    let mut added = 0usize;

    for src in imported {
        let nm = norm_name(&src.name);
        if nm.is_empty() {
            continue;
        }

        let Some(dst) = by_name.get_mut(&nm).and_then(|q| q.pop_front()) else {
            // no current entity with this name
            if add_missing
                && let (Some(list_path), Some(tmpl)) = (&array_path, &template)
            {
                let canon = if src.state.is_empty() {
                    "E_IN_PROGRESS".to_string()
                } else {
                    norm_enum(&src.state)
                };
                let new_elem = build_from_template(tmpl, &src.name, &canon, &src.progress);
                if let Some(Value::Array(arr)) = get_mut(data, list_path) {
                    arr.push(new_elem);
                    added += 1;
                    debug!(name = %src.name, "appended entity from template");
                    // re-register so later import rows can hit the new entity
                    let (new_rows, _) = discover_entities(data);
                    if let Some(r) = new_rows.into_iter().find(|r| norm_name(&r.name) == nm) {
                        by_name.entry(nm).or_default().push_back(r);
                    }
                }
            }
            continue;
        };

        // ---- state: retarget onto the save's existing prefix convention ----
        if !src.state.is_empty()
            && let Some(state_path) = &dst.state_path_abs
        {
            let leaf = state_leaf_path(data, state_path);
            let cur = get(data, &leaf).map(scalar_of).unwrap_or_default();
            let target = retarget_enum_like(&cur, &src.state);
            if set(data, &leaf, json!(target)) {
                applied_rows += 1;
            }
        }

        // ---- progress tiers ----
        if src.progress.is_empty() {
            continue;
        }
        let dst_objs = dst.progress_objects;
        let mut by_lab: HashMap<String, VecDeque<usize>> = HashMap::new();
        let mut by_nlab: HashMap<String, VecDeque<usize>> = HashMap::new();
        let mut by_sig: HashMap<String, VecDeque<usize>> = HashMap::new();
        for (i, o) in dst_objs.iter().enumerate() {
            by_lab.entry(o.label.clone()).or_default().push_back(i);
            by_nlab.entry(norm_name(&o.label)).or_default().push_back(i);
            by_sig.entry(o.sig.clone()).or_default().push_back(i);
        }

        let mut used: HashSet<usize> = HashSet::new();
        let mut done = vec![false; src.progress.len()];

        // tier 1: exact absolute path carried by the export
        for (si, p) in src.progress.iter().enumerate() {
            if let Some(path) = &p.path_abs
                && set(data, path, json!(p.value))
            {
                applied_prog += 1;
                done[si] = true;
            }
        }

        // tier 2: exact label
        for (si, p) in src.progress.iter().enumerate() {
            if done[si] {
                continue;
            }
            if let Some(queue) = by_lab.get_mut(&p.label)
                && let Some(i) = pop_unused(queue, &used)
            {
                used.insert(i);
                if set(data, &dst_objs[i].path_abs, json!(p.value)) {
                    applied_prog += 1;
                }
                done[si] = true;
            }
        }

        // tier 3: normalized label
        for (si, p) in src.progress.iter().enumerate() {
            if done[si] {
                continue;
            }
            if let Some(queue) = by_nlab.get_mut(&norm_name(&p.label))
                && let Some(i) = pop_unused(queue, &used)
            {
                used.insert(i);
                if set(data, &dst_objs[i].path_abs, json!(p.value)) {
                    applied_prog += 1;
                }
                done[si] = true;
            }
        }

        // tier 4: path signature
        for (si, p) in src.progress.iter().enumerate() {
            if done[si] || p.sig.is_empty() {
                continue;
            }
            if let Some(queue) = by_sig.get_mut(&p.sig)
                && let Some(i) = pop_unused(queue, &used)
            {
                used.insert(i);
                if set(data, &dst_objs[i].path_abs, json!(p.value)) {
                    applied_prog += 1;
                }
                done[si] = true;
            }
        }

        // tier 5: positional fallback over unclaimed objects
        let mut di = 0usize;
        for (si, p) in src.progress.iter().enumerate() {
            if done[si] {
                continue;
            }
            while di < dst_objs.len() && used.contains(&di) {
                di += 1;
            }
            if di >= dst_objs.len() {
                break;
            }
            if set(data, &dst_objs[di].path_abs, json!(p.value)) {
                applied_prog += 1;
            }
            used.insert(di);
            di += 1;
            done[si] = true;
        }

        // tier 6: deep key search within this entity's subtree; survives
        // index drift and wrapper-shape changes across save versions
        for (si, p) in src.progress.iter().enumerate() {
            if done[si] {
                continue;
            }
            let label_lc = p.label.trim().to_lowercase();
            if label_lc.is_empty() {
                continue;
            }
            let Some(target) = dfs_find_int_by_key(data, &dst.elem_base_abs, &label_lc) else {
                continue;
            };
            if set(data, &target, json!(p.value)) {
                applied_prog += 1;
            }
            done[si] = true;
        }
    }

    (applied_rows + added, applied_prog)
}
