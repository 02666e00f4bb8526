// Attribute-list utilities for the projection rewriter.
//
// Attribute lists travel through expressions as delimited strings
// ("id;name;salary"); conditions carry attribute references between
// escape characters ("`salary` > 4000"). Everything here is pure string
// manipulation over those two encodings.

/// Splits a delimited attribute list into names, dropping empties.
pub fn tokenize(list: &str, delimiter: char) -> Vec<String> {
    list.split(delimiter)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Renders attribute names back into a delimited list.
pub fn join(attributes: &[String], delimiter: char) -> String {
    attributes.join(&delimiter.to_string())
}

/// True if every element of `a` occurs in `b`.
///
/// Sorts a copy of `b` and resolves membership by binary search; a longer
/// `a` can never be a subset.
pub fn is_subset(a: &[String], b: &[String]) -> bool {
    if a.len() > b.len() {
        return false;
    }
    let mut sorted: Vec<&String> = b.iter().collect();
    sorted.sort();
    a.iter().all(|name| sorted.binary_search(&name).is_ok())
}

/// Extracts attribute names delimited by `escape` from a condition.
///
/// `` `a` = `c` `` yields `["a", "c"]`. An unterminated reference is
/// dropped rather than guessed at.
pub fn condition_attrs(condition: &str, escape: char) -> Vec<String> {
    let mut attributes = Vec::new();
    let mut current = String::new();
    let mut inside = false;
    for ch in condition.chars() {
        if ch == escape {
            if inside {
                attributes.push(std::mem::take(&mut current));
            }
            inside = !inside;
        } else if inside {
            current.push(ch);
        }
    }
    attributes
}

/// Removes duplicates, keeping first-occurrence order.
pub fn dedup(attributes: Vec<String>) -> Vec<String> {
    let mut unique = Vec::with_capacity(attributes.len());
    for name in attributes {
        if !unique.contains(&name) {
            unique.push(name);
        }
    }
    unique
}

/// Retains only the attributes that exist in `schema`, preserving order.
pub fn filter_to_schema(attributes: &[String], schema: &[String]) -> Vec<String> {
    attributes
        .iter()
        .filter(|name| schema.contains(name))
        .cloned()
        .collect()
}
