use serde_json::{Map, Value, json};

use crate::field::{
    INT32_MAX, clamp_i32, ensure_bool_property, ensure_enum_property, ensure_int_property,
    set_bool, set_enum, set_int,
};
use crate::path::{Token, TreePath, ci_key, get_mut};

fn char_struct_path() -> TreePath {
    ["root", "properties", "CharacterSaveData_0", "Struct", "Struct"]
        .into_iter()
        .map(Token::from)
        .collect()
}

fn char_struct_mut(data: &mut Value) -> Option<&mut Map<String, Value>> {
    get_mut(data, &char_struct_path()).and_then(Value::as_object_mut)
}

/// The inventory array lives under one of two container layouts depending on
/// save version.
fn items_array_mut(data: &mut Value) -> Option<&mut Vec<Value>> {
    let bases = [
        vec![
            "root",
            "properties",
            "CharacterSaveData_0",
            "Struct",
            "Struct",
            "CharacterItem_0",
            "Struct",
            "Struct",
        ],
        vec!["root", "properties", "CharacterItem_0", "Struct", "Struct"],
    ];
    let tails: [&[&str]; 2] = [
        &["PlayerItems_0", "Array", "Struct", "value"],
        &["PlayerItems_0", "Array", "value"],
    ];
    for base in bases {
        for tail in tails {
            let path: TreePath = base
                .iter()
                .chain(tail.iter())
                .map(|s| Token::from(*s))
                .collect();
            // resolve twice: once to probe, once to hand back the borrow
            if get_mut(data, &path).and_then(Value::as_array_mut).is_some() {
                return get_mut(data, &path).and_then(Value::as_array_mut);
            }
        }
    }
    None
}

fn item_code(entry: &Value) -> String {
    entry
        .as_object()
        .and_then(|e| e.get("Struct"))
        .and_then(Value::as_object)
        .and_then(|st| st.get("FirstCodeName_0"))
        .and_then(Value::as_object)
        .and_then(|nm| nm.get("Name"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn new_item_entry(code: &str) -> Value {
    json!({"Struct": {
        "FirstCodeName_0": {"tag": {"data": {"Other": "NameProperty"}}, "Name": code},
        "Count_0": {"tag": {"data": {"Other": "IntProperty"}}, "Int": 0},
        "EquipItemSlotType_0": {"tag": {"data": {"Enum": ["ELEquipSlotType", null]}}, "Enum": "ELEquipSlotType::E_NONE"},
    }})
}

fn set_count(entry: &mut Value, value: i64, apply: bool) -> bool {
    let Some(obj) = entry.as_object_mut() else {
        return false;
    };
    if !obj.get("Struct").is_some_and(Value::is_object) {
        obj.insert("Struct".into(), json!({}));
    }
    let st = obj
        .get_mut("Struct")
        .and_then(Value::as_object_mut)
        .expect("just ensured");
    let node = ensure_int_property(st, "Count_0");
    set_int(node, value, apply)
}

fn norm_code(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Max out health on both key spellings seen in the wild. Returns the number
/// of fields changed (or that would change with `dry_run`).
pub fn godmode(data: &mut Value, dry_run: bool) -> usize {
    let Some(ch) = char_struct_mut(data) else {
        return 0;
    };
    let mut changed = 0;
    for key in ["SecondStat_HeadthPoint_0", "SecondStat_HealthPoint_0"] {
        let node = ensure_int_property(ch, key);
        if set_int(node, INT32_MAX, !dry_run) {
            changed += 1;
        }
    }
    changed
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatCounters {
    pub character: usize,
    pub stats_primary: usize,
    pub stats_secondary: usize,
}

fn set_primary_stats(data: &mut Value, value: i64, dry_run: bool) -> usize {
    let mut path: TreePath = char_struct_path();
    path.extend(["FirstStatSimpleList_0", "Array", "Struct", "value"].map(Token::from));
    let arr = match get_mut(data, &path).and_then(Value::as_array_mut) {
        Some(a) => a,
        None => {
            let mut alt: TreePath = char_struct_path();
            alt.extend(["FirstStatSimpleList_0", "Array", "value"].map(Token::from));
            match get_mut(data, &alt).and_then(Value::as_array_mut) {
                Some(a) => a,
                None => return 0,
            }
        }
    };
    let mut changed = 0;
    for e in arr {
        if let Some(node) = e
            .as_object_mut()
            .and_then(|m| m.get_mut("Struct"))
            .and_then(Value::as_object_mut)
            .and_then(|st| st.get_mut("StatData_0"))
            .and_then(Value::as_object_mut)
            && set_int(node, value, !dry_run)
        {
            changed += 1;
        }
    }
    changed
}

/// Super-charge the per-character stat records.
pub fn insane_stats(data: &mut Value, dry_run: bool) -> StatCounters {
    let mut counters = StatCounters::default();
    counters.stats_primary = set_primary_stats(data, 100, dry_run);

    let Some(ch) = char_struct_mut(data) else {
        return counters;
    };

    for (key, val) in [
        ("PlayerLevel_0", 999),
        ("AcquisitionSoul_0", 999_999_999),
        ("NextLevelUpRequireSoul_0", 0),
        ("HumanityLevel_0", 999),
        ("AcquisitionHumanity_0", 999_999_999),
        ("NewGamePlus_Round_0", 999),
    ] {
        if set_int(ensure_int_property(ch, key), val, !dry_run) {
            counters.character += 1;
        }
    }

    // playtime resets to 0.0 (DoubleProperty, handled inline)
    if !ch.get("CharacterPlayTime_0").is_some_and(Value::is_object) {
        ch.insert(
            "CharacterPlayTime_0".into(),
            json!({"tag": {"data": {"Other": "DoubleProperty"}}, "Double": 0.0}),
        );
    }
    if let Some(pt) = ch.get_mut("CharacterPlayTime_0").and_then(Value::as_object_mut) {
        let cur = pt.get("Double").and_then(Value::as_f64).unwrap_or(0.0);
        if cur != 0.0 {
            if !dry_run {
                pt.insert("Double".into(), json!(0.0));
            }
            counters.character += 1;
        }
    }

    for key in ["YouDieCount_0", "TotalReceiveDamage_0"] {
        if set_int(ensure_int_property(ch, key), 0, !dry_run) {
            counters.character += 1;
        }
    }

    for key in [
        "SecondStat_HeadthPoint_0",
        "SecondStat_HealthPoint_0",
        "SecondStat_FrenzyPoint_0",
        "SecondStat_SlaveMagazinePoint_0",
        "SecondStat_SlaveMagazine_0",
        "SecondStat_PulseRechargePoint_0",
        "SecondStat_PulseRecharge_0",
    ] {
        if set_int(ensure_int_property(ch, key), 999_999_999, !dry_run) {
            counters.stats_secondary += 1;
        }
    }

    counters
}

/// Currency-like item code families, matched on normalized codes. Boss ergo
/// codes interleave other words between the two markers, so they get a
/// containment pair instead of a single pattern.
const CURRENCY_PATTERNS: [&str; 7] = [
    "reinforceslavearm",
    "consumeetcplatinumcoin",
    "venigni",
    "legionplug",
    "goldcoinfruit",
    "goldencoinfruit",
    "namelessergo",
];
const CURRENCY_CANON: [&str; 11] = [
    "quartz",
    "Reinforce_SlaveArm_G1",
    "Reinforce_SlaveArm_G2",
    "Reinforce_SlaveArm_G3",
    "Reinforce_SlaveArm_G4",
    "Exchange_SlaveArm_Parts_4",
    "Exchange_GoldenFruit",
    "VenigniCommemorativeCoin",
    "Consume_Etc_Platinumcoin_Fancy",
    "Consume_Etc_Platinumcoin_Hidden",
    "Consume_Etc_Platinumcoin_Low",
];

fn is_currency_code(code: &str) -> bool {
    let n = norm_code(code);
    n == "quartz"
        || CURRENCY_PATTERNS.iter().any(|p| n.contains(p))
        || (n.contains("boss") && n.contains("ergo"))
        || CURRENCY_CANON.iter().any(|c| norm_code(c) == n)
}

/// Raise souls and currency-like inventory stacks to `max_value`, creating
/// canonical entries that are missing when `create_missing` is set. Returns
/// the number of item/field updates.
pub fn max_currency(
    data: &mut Value,
    max_value: i64,
    create_missing: bool,
    dry_run: bool,
) -> usize {
    let v = clamp_i32(max_value);
    let mut changed = 0;

    if let Some(ch) = char_struct_mut(data) {
        let souls = ensure_int_property(ch, "AcquisitionSoul_0");
        if set_int(souls, v, !dry_run) {
            changed += 1;
        }
    }

    let Some(items) = items_array_mut(data) else {
        return changed;
    };

    let mut present: Vec<String> = Vec::new();
    for e in items.iter() {
        present.push(norm_code(&item_code(e)));
    }

    for e in items.iter_mut() {
        let code = item_code(e);
        if !code.is_empty() && is_currency_code(&code) && set_count(e, v, !dry_run) {
            changed += 1;
        }
    }

    if create_missing {
        for code in CURRENCY_CANON {
            if present.iter().any(|p| p == &norm_code(code)) {
                continue;
            }
            let mut entry = new_item_entry(code);
            if set_count(&mut entry, v, !dry_run) {
                changed += 1;
            }
            if !dry_run {
                items.push(entry);
            }
        }
    }

    changed
}

/// Set every teleport spot to active/idle and flip the spawn flags that gate
/// it. Returns the number of fields updated.
pub fn unlock_all_locations(data: &mut Value, dry_run: bool) -> usize {
    let mut path: TreePath = ["root", "properties", "SpotSaveData_0", "Struct", "Struct"]
        .into_iter()
        .map(Token::from)
        .collect();
    path.extend(["TeleportObjectSpotList_0", "Array", "Struct", "value"].map(Token::from));
    let arr = match get_mut(data, &path).and_then(Value::as_array_mut) {
        Some(a) => a,
        None => {
            path.truncate(5);
            path.extend(["TeleportObjectSpotList_0", "Array", "value"].map(Token::from));
            match get_mut(data, &path).and_then(Value::as_array_mut) {
                Some(a) => a,
                None => return 0,
            }
        }
    };

    let mut changed = 0;
    for e in arr {
        let Some(st) = e
            .as_object_mut()
            .and_then(|m| m.get_mut("Struct"))
            .and_then(Value::as_object_mut)
        else {
            continue;
        };
        let en = ensure_enum_property(st, "StargazerType_0", "ELStargazerType");
        if set_enum(en, "ELStargazerType", "E_ACTIVE_IDLE", !dry_run) {
            changed += 1;
        }
        for (key, value) in [
            ("ActorSpawnable_0", true),
            ("ReserveActorSpawn_0", false),
            ("ReserveActorDespawn_0", false),
            ("TorsionCoilActivate_0", true),
        ] {
            if set_bool(ensure_bool_property(st, key), value, !dry_run) {
                changed += 1;
            }
        }
    }
    changed
}

/// Recursively set scalar BoolProperties to true. Bool *lists* are handled
/// separately by the status-list pass.
fn flip_bools_in_map(map: &mut Map<String, Value>, apply: bool) -> usize {
    let mut changed = 0;
    if map.get("Bool").is_some_and(Value::is_boolean) && set_bool(map, true, apply) {
        changed += 1;
    }
    for v in map.values_mut() {
        changed += flip_all_bools(v, apply);
    }
    changed
}

fn flip_all_bools(node: &mut Value, apply: bool) -> usize {
    match node {
        Value::Object(map) => flip_bools_in_map(map, apply),
        Value::Array(items) => items.iter_mut().map(|v| flip_all_bools(v, apply)).sum(),
        _ => 0,
    }
}

fn set_statuslist_true(status_node: &mut Value, apply: bool) -> usize {
    let mut changed = 0;
    let Some(arr) = status_node
        .as_object_mut()
        .and_then(|m| m.get_mut("Array"))
        .and_then(Value::as_object_mut)
    else {
        return 0;
    };
    if let Some(bl) = arr
        .get_mut("Base")
        .and_then(Value::as_object_mut)
        .and_then(|b| b.get_mut("Bool"))
        .and_then(Value::as_array_mut)
    {
        for b in bl {
            if b.as_bool() != Some(true) {
                if apply {
                    *b = json!(true);
                }
                changed += 1;
            }
        }
    }
    if let Some(bl) = arr.get_mut("Bool").and_then(Value::as_array_mut) {
        for b in bl {
            if b.as_bool() != Some(true) {
                if apply {
                    *b = json!(true);
                }
                changed += 1;
            }
        }
    }
    changed
}

/// Complete every achievement record: any subtree carrying an achievement
/// code name gets its scalar bools flipped true, and every status list gets
/// its bool arrays set to all-true. Returns (found_any, bools_changed).
pub fn auto_plat_achievements(data: &mut Value, dry_run: bool) -> (bool, usize) {
    fn walk(node: &mut Value, apply: bool, found: &mut bool, changed: &mut usize) {
        match node {
            Value::Object(map) => {
                if ci_key(map, "achievementcodename_0").is_some() {
                    *found = true;
                    *changed += flip_bools_in_map(map, apply);
                }
                if let Some(k) = ci_key(map, "statuslist_0").map(str::to_string)
                    && let Some(sl) = map.get_mut(&k)
                {
                    *changed += set_statuslist_true(sl, apply);
                }
                for v in map.values_mut() {
                    walk(v, apply, found, changed);
                }
            }
            Value::Array(items) => {
                for v in items {
                    walk(v, apply, found, changed);
                }
            }
            _ => {}
        }
    }

    let mut found = false;
    let mut changed = 0;
    walk(data, !dry_run, &mut found, &mut changed);
    (found, changed)
}
