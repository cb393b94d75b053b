//! Ordering helpers for emitted results

use std::cmp::Ordering;

/// Compare hierarchical test names
///
/// Names are split on `/` and compared component by component. When one
/// name is a strict component prefix of the other, the shorter one sorts
/// first, so a parent test always precedes its subtests.
///
/// ```
/// use std::cmp::Ordering;
/// use testlens_core::ordering::compare_test_names;
///
/// assert_eq!(compare_test_names("T/a", "T/a/b"), Ordering::Less);
/// assert_eq!(compare_test_names("T/b", "T/a/b"), Ordering::Greater);
/// ```
#[must_use]
pub fn compare_test_names(a: &str, b: &str) -> Ordering {
    a.split('/').cmp(b.split('/'))
}

/// Remove trailing line breaks from accumulated text in place
pub(crate) fn trim_trailing_newlines(text: &mut String) {
    let trimmed = text.trim_end_matches(['\n', '\r']).len();
    text.truncate(trimmed);
}
