//! Selection of one extracted version per citing document.
//!
//! The same citing paper is often downloaded several times (preprint,
//! publisher copy, ...). Each copy is extracted separately, and only the copy
//! that yielded the most citation contexts is kept.

use std::collections::{BTreeMap, HashMap};

use crate::identifier::{DocId, parse_doc_id};
use crate::CitationContext;

/// A citation context tagged with its parsed document id.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedContext {
    pub doc: DocId,
    /// Number of contexts extracted from the same (scholar id, version).
    pub num_refs: usize,
    pub context: CitationContext,
}

impl VersionedContext {
    pub fn citing_id(&self) -> &str {
        &self.doc.scholar_id
    }
}

/// Contexts whose `doc_id` could not be parsed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MalformedIds {
    pub count: usize,
    pub examples: Vec<String>,
}

const MAX_MALFORMED_EXAMPLES: usize = 5;

/// Parse every context's `doc_id` and attach the per-version reference
/// count. Contexts with a malformed id are skipped and counted.
pub fn tag_versions(contexts: Vec<CitationContext>) -> (Vec<VersionedContext>, MalformedIds) {
    let mut malformed = MalformedIds::default();
    let mut parsed = Vec::with_capacity(contexts.len());

    for context in contexts {
        match parse_doc_id(&context.doc_id) {
            Ok(doc) => parsed.push((doc, context)),
            Err(e) => {
                tracing::warn!(error = %e, "skipping citation context");
                malformed.count += 1;
                if malformed.examples.len() < MAX_MALFORMED_EXAMPLES {
                    malformed.examples.push(context.doc_id);
                }
            }
        }
    }

    let mut counts: HashMap<DocId, usize> = HashMap::new();
    for (doc, _) in &parsed {
        *counts.entry(doc.clone()).or_default() += 1;
    }

    let tagged = parsed
        .into_iter()
        .map(|(doc, context)| VersionedContext {
            num_refs: counts[&doc],
            doc,
            context,
        })
        .collect();
    (tagged, malformed)
}

/// For each scholar id, the version with the most references.
///
/// Ties go to the lexicographically smallest version so the choice does not
/// depend on row order.
pub fn max_versions(rows: &[VersionedContext]) -> HashMap<&str, &str> {
    let mut per_doc: HashMap<&str, BTreeMap<&str, usize>> = HashMap::new();
    for row in rows {
        per_doc
            .entry(row.doc.scholar_id.as_str())
            .or_default()
            .insert(row.doc.version.as_str(), row.num_refs);
    }

    per_doc
        .into_iter()
        .filter_map(|(scholar_id, versions)| {
            let mut best: Option<(&str, usize)> = None;
            for (version, num_refs) in versions {
                if best.is_none_or(|(_, n)| num_refs > n) {
                    best = Some((version, num_refs));
                }
            }
            best.map(|(version, _)| (scholar_id, version))
        })
        .collect()
}

/// Keep only the rows belonging to each document's selected version.
/// Input order is preserved.
pub fn select_versions(rows: Vec<VersionedContext>) -> Vec<VersionedContext> {
    let selected: HashMap<String, String> = max_versions(&rows)
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    let before = rows.len();
    let kept: Vec<VersionedContext> = rows
        .into_iter()
        .filter(|row| {
            selected
                .get(&row.doc.scholar_id)
                .is_some_and(|v| *v == row.doc.version)
        })
        .collect();

    tracing::debug!(
        documents = selected.len(),
        kept = kept.len(),
        dropped = before - kept.len(),
        "selected document versions"
    );
    kept
}
