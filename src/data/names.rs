//! Near-duplicate professor name detection.
//!
//! Registration refuses a new professor when an existing name in the same
//! faculty is within a small edit distance of the candidate ("Juan Perz" vs
//! "Juan Perez"). Names are expected without diacritics by convention, but
//! this is not enforced, so comparison works on Unicode scalar values.

use unicode_normalization::UnicodeNormalization;

/// Maximum edit distance at which two names are considered the same professor.
pub const DUPLICATE_THRESHOLD: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("a first and last name is required")]
    Empty,
}

/// An existing name that is within the duplicate threshold of a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimilarName {
    pub name: String,
    pub distance: usize,
}

/// Case-insensitive Levenshtein distance: the minimum number of
/// single-character insertions, deletions and substitutions turning `a` into `b`.
pub fn edit_distance(a: &str, b: &str) -> usize {
    strsim::levenshtein(&a.to_lowercase(), &b.to_lowercase())
}

/// Trim a candidate name, rejecting names that are empty after trimming.
pub fn validate_name(candidate: &str) -> Result<&str, NameError> {
    let trimmed = candidate.trim();
    if trimmed.is_empty() {
        return Err(NameError::Empty);
    }
    Ok(trimmed)
}

/// Every existing name within `threshold` edits of `candidate`, closest first.
///
/// Both sides are trimmed before comparing. Ties keep the order of `existing`.
pub fn find_similar<S: AsRef<str>>(
    candidate: &str,
    existing: &[S],
    threshold: usize,
) -> Result<Vec<SimilarName>, NameError> {
    let candidate = validate_name(candidate)?;

    let mut similar: Vec<SimilarName> = existing
        .iter()
        .map(|name| name.as_ref().trim())
        .filter_map(|name| {
            let distance = edit_distance(candidate, name);
            (distance <= threshold).then(|| SimilarName {
                name: name.to_owned(),
                distance,
            })
        })
        .collect();

    // Stable: equal distances keep input order.
    similar.sort_by_key(|s| s.distance);
    Ok(similar)
}

/// Whether any existing name is within `threshold` edits of `candidate`.
pub fn is_duplicate<S: AsRef<str>>(
    candidate: &str,
    existing: &[S],
    threshold: usize,
) -> Result<bool, NameError> {
    let candidate = validate_name(candidate)?;
    Ok(existing
        .iter()
        .any(|name| edit_distance(candidate, name.as_ref().trim()) <= threshold))
}

/// Lowercase and strip combining marks, for accent-insensitive text search.
///
/// ```
/// use rankprof::data::names::fold_for_search;
///
/// assert_eq!(fold_for_search("José García"), "jose garcia");
/// assert_eq!(fold_for_search("MÜLLER"), "muller");
/// ```
pub fn fold_for_search(s: &str) -> String {
    s.nfd()
        .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}
