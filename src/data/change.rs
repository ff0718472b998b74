use super::DataSnapshot;

/// Whether `next` differs from the previously accepted snapshot.
///
/// Timestamps are ignored. With no previous snapshot every reading counts as
/// a change. Values compare exactly: numbers by `==`, price cells field by
/// field, and a value that changed kind counts as a change.
pub fn has_changed(next: &DataSnapshot, previous: Option<&DataSnapshot>) -> bool {
    let Some(previous) = previous else {
        return true;
    };
    if next.len() != previous.len() {
        return true;
    }
    next.iter()
        .any(|(key, value)| previous.get(key) != Some(value))
}
