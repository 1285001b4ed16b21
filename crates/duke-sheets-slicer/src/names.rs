//! Slicer cache names
//!
//! A cache name doubles as a workbook-scoped defined name, so it must follow
//! the defined-name grammar and must not collide with any existing name.

/// Prefix of every generated cache name
pub const NAME_PREFIX: &str = "Slicer_";

/// Map a label onto the defined-name alphabet.
///
/// Letters are kept. ASCII digits and `.` are kept except in first position.
/// Everything else becomes `_`.
pub fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .enumerate()
        .map(|(i, c)| {
            if c.is_alphabetic() || (i > 0 && (c.is_ascii_digit() || c == '.')) {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Derive a cache name from `label` that collides with none of `existing`.
///
/// The bare `Slicer_{label}` is tried first, then `Slicer_{label}1`,
/// `Slicer_{label}2`, ... Names compare case-insensitively.
pub fn unique_defined_name<S: AsRef<str>>(label: &str, existing: &[S]) -> String {
    let base = format!("{NAME_PREFIX}{}", sanitize_label(label));
    let taken = |candidate: &str| {
        existing
            .iter()
            .any(|name| name.as_ref().to_lowercase() == candidate.to_lowercase())
    };

    if !taken(&base) {
        return base;
    }
    (1u32..)
        .map(|n| format!("{base}{n}"))
        .find(|candidate| !taken(candidate))
        .unwrap_or(base)
}
