//! Shape-tolerant parsing of social API payloads
//!
//! The upstream API has returned replies under several field names and
//! author ids as both numbers and strings, and it is inconsistent about hash
//! prefixes and case. Everything that inspects reply or reaction payloads
//! goes through this module so matching logic only ever sees [`Reply`] and
//! plain `u64` ids.

use serde_json::Value;

/// Reply to a cast, reduced to what verification needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub author_id: u64,
    pub parent_hash: Option<String>,
}

/// Fields that hold lists of replies
const REPLY_LIST_FIELDS: &[&str] = &[
    "direct_replies",
    "directReplies",
    "thread",
    "replies",
    "casts",
    "messages",
];

/// Envelope fields that wrap the interesting part of a response
const WRAPPER_FIELDS: &[&str] = &["conversation", "cast", "result", "data"];

/// Envelopes nest at most a few levels deep in practice
const MAX_DEPTH: usize = 6;

/// Parse a numeric id given as a JSON number or a decimal string.
pub fn parse_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.get(key))
}

fn first_id(value: &Value, paths: &[&[&str]]) -> Option<u64> {
    paths
        .iter()
        .find_map(|path| lookup(value, path).and_then(parse_id))
}

fn first_str(value: &Value, paths: &[&[&str]]) -> Option<String> {
    paths.iter().find_map(|path| {
        lookup(value, path)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

/// Author id of a cast or hub message.
pub fn author_id(item: &Value) -> Option<u64> {
    first_id(
        item,
        &[
            &["author", "fid"],
            &["author_fid"],
            &["authorFid"],
            &["fid"],
            &["data", "fid"],
            &["user", "fid"],
        ],
    )
}

/// Parent hash of a cast or hub message.
pub fn parent_hash(item: &Value) -> Option<String> {
    first_str(
        item,
        &[
            &["parent_hash"],
            &["parentHash"],
            &["parent", "hash"],
            &["data", "castAddBody", "parentCastId", "hash"],
        ],
    )
}

fn reply_from(item: &Value) -> Option<Reply> {
    Some(Reply {
        author_id: author_id(item)?,
        parent_hash: parent_hash(item),
    })
}

fn collect_replies(value: &Value, depth: usize, out: &mut Vec<Reply>) {
    if depth > MAX_DEPTH {
        return;
    }

    match value {
        Value::Array(items) => out.extend(items.iter().filter_map(reply_from)),
        Value::Object(map) => {
            for field in REPLY_LIST_FIELDS {
                if let Some(Value::Array(items)) = map.get(*field) {
                    out.extend(items.iter().filter_map(reply_from));
                }
            }
            for field in WRAPPER_FIELDS {
                if let Some(inner @ Value::Object(_)) = map.get(*field) {
                    collect_replies(inner, depth + 1, out);
                }
            }
        }
        _ => {}
    }
}

/// Every reply found anywhere in a conversation or replies response.
///
/// A reply listed under more than one field appears once per listing;
/// callers only test membership.
pub fn normalize_replies(value: &Value) -> Vec<Reply> {
    let mut replies = Vec::new();
    collect_replies(value, 0, &mut replies);
    replies
}

/// User ids of everyone in a reactions response.
pub fn normalize_reactor_ids(value: &Value) -> Vec<u64> {
    let items = ["reactions", "likes", "recasts", "messages"]
        .iter()
        .find_map(|field| value.get(*field).and_then(Value::as_array))
        .or_else(|| value.as_array());

    items
        .map(|items| items.iter().filter_map(author_id).collect())
        .unwrap_or_default()
}

/// Pagination cursor for the next page, if any.
pub fn next_cursor(value: &Value) -> Option<String> {
    first_str(value, &[&["next", "cursor"], &["nextPageToken"], &["cursor"]])
}

// =============================================================================
// Hash forms
// =============================================================================

/// Hex digits of a hash without any `0x` prefix, lower-cased.
pub fn strip_hash_prefix(hash: &str) -> String {
    let trimmed = hash.trim();
    trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed)
        .to_ascii_lowercase()
}

/// The textual forms a hash may arrive in: as given, `0x`-prefixed, and bare.
pub fn hash_forms(hash: &str) -> [String; 3] {
    let stripped = strip_hash_prefix(hash);
    [
        hash.trim().to_ascii_lowercase(),
        format!("0x{stripped}"),
        stripped,
    ]
}

/// Case-insensitive hash equality across prefixed and bare forms.
pub fn hashes_match(candidate: &str, target: &str) -> bool {
    let candidate = candidate.trim().to_ascii_lowercase();
    !candidate.is_empty() && hash_forms(target).contains(&candidate)
}

/// Canonical `0x` + 40 lower-case hex form of a full-length post hash.
pub fn canonical_post_hash(hash: &str) -> Option<String> {
    let stripped = strip_hash_prefix(hash);
    if stripped.len() == 40 && stripped.bytes().all(|b| b.is_ascii_hexdigit()) {
        Some(format!("0x{stripped}"))
    } else {
        None
    }
}
