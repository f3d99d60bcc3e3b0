//! Fuzzy matching for "did you mean" hints on undefined variables

/// Maximum Levenshtein distance to consider for suggestions
const MAX_SUGGESTION_DISTANCE: usize = 3;

/// Suggestion result with its edit distance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    /// The suggested correction
    pub text: String,
    /// Levenshtein distance (lower = better match)
    pub distance: usize,
}

/// Calculate Levenshtein distance between two strings
pub fn levenshtein(a: &str, b: &str) -> usize {
    strsim::levenshtein(a, b)
}

/// Find closest matches from a list of candidates
///
/// Exact matches are skipped. Ties keep candidate order, so callers that
/// want a stable answer should pass sorted candidates.
pub fn find_closest_matches(input: &str, candidates: &[&str], max_results: usize) -> Vec<Suggestion> {
    let mut suggestions: Vec<Suggestion> = candidates
        .iter()
        .filter_map(|&candidate| {
            let distance = levenshtein(input, candidate);
            if distance <= MAX_SUGGESTION_DISTANCE && distance > 0 {
                Some(Suggestion {
                    text: candidate.to_string(),
                    distance,
                })
            } else {
                None
            }
        })
        .collect();

    // Sort by distance (best matches first)
    suggestions.sort_by_key(|s| s.distance);
    suggestions.truncate(max_results);
    suggestions
}

/// Best single suggestion for a missing key among the keys of a map
pub fn closest_key<'a, I>(input: &str, keys: I) -> Option<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut candidates: Vec<&str> = keys.into_iter().map(|k| k.as_str()).collect();
    candidates.sort_unstable();
    find_closest_matches(input, &candidates, 1)
        .into_iter()
        .next()
        .map(|s| s.text)
}
