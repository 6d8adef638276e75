use crate::model::PartRef;

/// Separator between `groupId:value` pairs in a canonical key
pub const KEY_SEPARATOR: &str = "|";

/// Sort parts by `(group_id, value)` and derive the canonical key.
///
/// Pure and total: any permutation of the same parts yields the same key.
/// Used for freshly generated combinations and for rows loaded from the
/// backend alike, so both sides merge on the same identity.
pub fn canonicalize(mut parts: Vec<PartRef>) -> (Vec<PartRef>, String) {
    parts.sort_by(|a, b| {
        a.group_id
            .cmp(&b.group_id)
            .then_with(|| a.value.cmp(&b.value))
    });
    let key = canonical_key(&parts);
    (parts, key)
}

/// Key for parts that are already in canonical order
pub fn canonical_key(parts: &[PartRef]) -> String {
    parts
        .iter()
        .map(|p| format!("{}:{}", p.group_id, p.value))
        .collect::<Vec<_>>()
        .join(KEY_SEPARATOR)
}
