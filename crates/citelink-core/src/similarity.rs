use rapidfuzz::distance::levenshtein;

/// Distance assigned when neither title is known.
pub const MISSING_TITLES_PENALTY: usize = 200;

/// Edit distance between a candidate and a reference title, and the
/// similarity derived from it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TitleScore {
    pub distance: usize,
    /// `1 - distance / len(reference)`. Not clamped, so it goes negative when
    /// the distance exceeds the reference length. `None` when the reference
    /// title is absent, since the ratio has no denominator.
    pub similarity: Option<f64>,
}

fn present(title: Option<&str>) -> Option<&str> {
    title.filter(|t| !t.is_empty())
}

/// Case-insensitive character edit distance between two optional titles.
///
/// When only one title is known the distance is its length; when neither is
/// known it is [`MISSING_TITLES_PENALTY`].
pub fn title_distance(candidate: Option<&str>, reference: Option<&str>) -> usize {
    match (present(candidate), present(reference)) {
        (Some(a), Some(b)) => {
            let a = a.to_lowercase();
            let b = b.to_lowercase();
            levenshtein::distance(a.chars(), b.chars())
        }
        (Some(only), None) | (None, Some(only)) => only.chars().count(),
        (None, None) => MISSING_TITLES_PENALTY,
    }
}

/// Similarity ratio for `distance` relative to the reference title length.
pub fn title_similarity(distance: usize, reference: Option<&str>) -> Option<f64> {
    let len = present(reference)?.chars().count();
    Some(1.0 - distance as f64 / len as f64)
}

/// Score a candidate title (as cited in a document) against a reference
/// title (from curated metadata).
pub fn score_titles(candidate: Option<&str>, reference: Option<&str>) -> TitleScore {
    let distance = title_distance(candidate, reference);
    TitleScore {
        distance,
        similarity: title_similarity(distance, reference),
    }
}
