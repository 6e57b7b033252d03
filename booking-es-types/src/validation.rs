//! Shared validation predicates for domain types.

/// Validation predicate: reject glob metacharacters.
///
/// Stream identifiers reserve glob metacharacters (*, ?, [, ]) so stream
/// keys can later be matched by pattern without escaping.
pub(crate) fn no_glob_metacharacters(s: &str) -> bool {
    !s.contains(['*', '?', '[', ']'])
}
