use std::collections::BTreeMap;

/// Canonical SKU: the ASCII digits of `raw`, in order. Leading zeros are
/// kept. Input with no digits yields an empty string.
pub fn normalize_sku(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Canonical brand name. The trimmed input is looked up upper-cased in
/// `aliases`; unmatched brands pass through trimmed.
pub fn normalize_brand(raw: &str, aliases: &BTreeMap<String, String>) -> String {
    let trimmed = raw.trim();
    match aliases.get(&trimmed.to_uppercase()) {
        Some(canonical) => canonical.clone(),
        None => trimmed.to_string(),
    }
}
