use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// One hop of a tree path: a mapping key or a sequence index.
///
/// Serializes untagged so a path round-trips through export files as a plain
/// JSON array of strings and integers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Token {
    Index(usize),
    Key(String),
}

impl Token {
    pub fn key(s: impl Into<String>) -> Self {
        Token::Key(s.into())
    }

    pub fn as_key(&self) -> Option<&str> {
        match self {
            Token::Key(s) => Some(s),
            Token::Index(_) => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Key(s) => f.write_str(s),
            Token::Index(i) => write!(f, "{}", i),
        }
    }
}

impl From<&str> for Token {
    fn from(s: &str) -> Self {
        Token::Key(s.to_string())
    }
}

impl From<String> for Token {
    fn from(s: String) -> Self {
        Token::Key(s)
    }
}

impl From<usize> for Token {
    fn from(i: usize) -> Self {
        Token::Index(i)
    }
}

/// Ordered path from the tree root (or an entity base, where stated).
pub type TreePath = Vec<Token>;

/// Parse a dotted path (`root.properties.QuestList.3`) into tokens.
/// All-digit segments become indices.
pub fn parse_dotted(s: &str) -> TreePath {
    s.split('.')
        .filter(|seg| !seg.is_empty())
        .map(|seg| match seg.parse::<usize>() {
            Ok(i) => Token::Index(i),
            Err(_) => Token::Key(seg.to_string()),
        })
        .collect()
}

pub fn join_dotted(path: &[Token]) -> String {
    path.iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

/// Find the original-cased key matching `want` case-insensitively.
pub fn ci_key<'a>(map: &'a serde_json::Map<String, Value>, want: &str) -> Option<&'a str> {
    map.keys()
        .find(|k| k.eq_ignore_ascii_case(want))
        .map(|k| k.as_str())
}

pub fn ci_get<'a>(map: &'a serde_json::Map<String, Value>, want: &str) -> Option<&'a Value> {
    ci_key(map, want).map(|k| &map[k])
}

/// Case-insensitive path lookup. Out-of-range or type-mismatched hops yield
/// `None`; never mutates.
pub fn get<'a>(root: &'a Value, path: &[Token]) -> Option<&'a Value> {
    let mut cur = root;
    for tok in path {
        cur = match (cur, tok) {
            (Value::Object(map), Token::Key(k)) => ci_get(map, k)?,
            (Value::Array(arr), Token::Index(i)) => arr.get(*i)?,
            _ => return None,
        };
    }
    Some(cur)
}

pub fn get_mut<'a>(root: &'a mut Value, path: &[Token]) -> Option<&'a mut Value> {
    let mut cur = root;
    for tok in path {
        cur = match (cur, tok) {
            (Value::Object(map), Token::Key(k)) => {
                let key = ci_key(map, k)?.to_string();
                map.get_mut(&key)?
            }
            (Value::Array(arr), Token::Index(i)) => arr.get_mut(*i)?,
            _ => return None,
        };
    }
    Some(cur)
}

/// Write `new_val` at `path`. Returns true iff every intermediate hop
/// resolved and the leaf was written. The final key may be created in the
/// terminal mapping (matching an existing key case-insensitively if one
/// exists); intermediate containers are never created and sequences are
/// never resized.
pub fn set(root: &mut Value, path: &[Token], new_val: Value) -> bool {
    let Some((last, parents)) = path.split_last() else {
        return false;
    };
    let Some(parent) = get_mut(root, parents) else {
        return false;
    };
    match (parent, last) {
        (Value::Object(map), Token::Key(k)) => {
            let key = ci_key(map, k).map(str::to_string).unwrap_or_else(|| k.clone());
            map.insert(key, new_val);
            true
        }
        (Value::Array(arr), Token::Index(i)) => {
            if let Some(slot) = arr.get_mut(*i) {
                *slot = new_val;
                true
            } else {
                false
            }
        }
        _ => false,
    }
}
