//! Inner joins between typed tables.
//!
//! Output order follows the left table; for each left row, every matching
//! right row is emitted in right-table order. Rows without a partner on the
//! other side are dropped and only counted.

use std::collections::{HashMap, HashSet};

use crate::versions::VersionedContext;
use crate::{CitationContext, CitationLink, PaperMetadata, ScholarIdRecord};

/// Row counts for one join.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinReport {
    pub left_rows: usize,
    pub right_rows: usize,
    pub joined_rows: usize,
    /// Left rows whose key had no match on the right.
    pub unmatched_left: usize,
    /// Right rows whose key had no match on the left.
    pub unmatched_right: usize,
}

/// Join `left` and `right` on string keys, combining each matching pair.
pub fn inner_join<L, R, O>(
    left: &[L],
    right: &[R],
    left_key: impl for<'a> Fn(&'a L) -> &'a str,
    right_key: impl for<'a> Fn(&'a R) -> &'a str,
    mut combine: impl FnMut(&L, &R) -> O,
) -> (Vec<O>, JoinReport) {
    let mut index: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, row) in right.iter().enumerate() {
        index.entry(right_key(row)).or_default().push(i);
    }

    let mut report = JoinReport {
        left_rows: left.len(),
        right_rows: right.len(),
        ..Default::default()
    };
    let mut matched_keys: HashSet<&str> = HashSet::new();
    let mut out = Vec::new();

    for l in left {
        let key = left_key(l);
        match index.get(key) {
            Some(partners) => {
                matched_keys.insert(key);
                out.extend(partners.iter().map(|&i| combine(l, &right[i])));
            }
            None => report.unmatched_left += 1,
        }
    }

    report.unmatched_right = right
        .iter()
        .filter(|r| !matched_keys.contains(right_key(*r)))
        .count();
    report.joined_rows = out.len();
    (out, report)
}

/// A curated paper with its scholar id attached.
#[derive(Debug, Clone, PartialEq)]
pub struct KnownPaper {
    pub cited_id: String,
    pub doi: String,
    pub scholar_title: Option<String>,
    pub meta_cited_title: Option<String>,
    pub meta_cited_authors: Option<String>,
}

/// A citation link to a known paper.
#[derive(Debug, Clone, PartialEq)]
pub struct KnownCitation {
    pub cited_id: String,
    pub citing_id: String,
    pub meta_cited_authors: Option<String>,
    pub meta_cited_title: Option<String>,
}

/// A citation context paired with one known paper its citing document cites.
///
/// The pairing is by citing document only, so a context is paired with every
/// known paper its document cites; the title score decides which pairing is
/// real.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkedContext {
    pub cited_id: String,
    pub citing_id: String,
    pub citing_version: String,
    pub num_refs: usize,
    pub meta_cited_authors: Option<String>,
    pub meta_cited_title: Option<String>,
    pub context: CitationContext,
}

/// Metadata ⋈ scholar ids on DOI.
pub fn join_metadata(
    metadata: &[PaperMetadata],
    scholar_ids: &[ScholarIdRecord],
) -> (Vec<KnownPaper>, JoinReport) {
    inner_join(
        metadata,
        scholar_ids,
        |m| m.meta_cited_doi.as_str(),
        |s| s.doi.as_str(),
        |m, s| KnownPaper {
            cited_id: s.cited_id.clone(),
            doi: s.doi.clone(),
            scholar_title: s.scholar_title.clone(),
            meta_cited_title: m.meta_cited_title.clone(),
            meta_cited_authors: m.meta_cited_authors.clone(),
        },
    )
}

/// Citation links ⋈ known papers on cited id.
pub fn join_citations(
    links: &[CitationLink],
    papers: &[KnownPaper],
) -> (Vec<KnownCitation>, JoinReport) {
    inner_join(
        links,
        papers,
        |l| l.cited_id.as_str(),
        |p| p.cited_id.as_str(),
        |l, p| KnownCitation {
            cited_id: l.cited_id.clone(),
            citing_id: l.citing_id.clone(),
            meta_cited_authors: p.meta_cited_authors.clone(),
            meta_cited_title: p.meta_cited_title.clone(),
        },
    )
}

/// Known citations ⋈ citation contexts on citing id.
pub fn join_contexts(
    citations: &[KnownCitation],
    contexts: &[VersionedContext],
) -> (Vec<LinkedContext>, JoinReport) {
    inner_join(
        citations,
        contexts,
        |c| c.citing_id.as_str(),
        |v| v.citing_id(),
        |c, v| LinkedContext {
            cited_id: c.cited_id.clone(),
            citing_id: c.citing_id.clone(),
            citing_version: v.doc.version.clone(),
            num_refs: v.num_refs,
            meta_cited_authors: c.meta_cited_authors.clone(),
            meta_cited_title: c.meta_cited_title.clone(),
            context: v.context.clone(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inner_join_many_to_many_order() {
        let left = vec![("k1", "l1"), ("k2", "l2"), ("k1", "l3"), ("k9", "l4")];
        let right = vec![("k1", "r1"), ("k1", "r2"), ("k2", "r3"), ("k7", "r4")];

        let (out, report) = inner_join(
            &left,
            &right,
            |l| l.0,
            |r| r.0,
            |l, r| format!("{}{}", l.1, r.1),
        );

        assert_eq!(out, vec!["l1r1", "l1r2", "l2r3", "l3r1", "l3r2"]);
        assert_eq!(
            report,
            JoinReport {
                left_rows: 4,
                right_rows: 4,
                joined_rows: 5,
                unmatched_left: 1,
                unmatched_right: 1,
            }
        );
    }

    #[test]
    fn test_join_metadata_on_doi() {
        let metadata = vec![
            PaperMetadata {
                meta_cited_doi: "10.1/a".into(),
                meta_cited_title: Some("Paper A".into()),
                meta_cited_authors: Some("Ann".into()),
            },
            PaperMetadata {
                meta_cited_doi: "10.1/unknown".into(),
                meta_cited_title: None,
                meta_cited_authors: None,
            },
        ];
        let scholar = vec![ScholarIdRecord {
            cited_id: "S1".into(),
            doi: "10.1/a".into(),
            scholar_title: None,
        }];

        let (papers, report) = join_metadata(&metadata, &scholar);
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].cited_id, "S1");
        assert_eq!(papers[0].meta_cited_title.as_deref(), Some("Paper A"));
        assert_eq!(report.unmatched_left, 1);
    }

    #[test]
    fn test_join_citations_drops_unknown_papers() {
        let links = vec![
            CitationLink {
                cited_id: "S1".into(),
                citing_id: "C1".into(),
            },
            CitationLink {
                cited_id: "S2".into(),
                citing_id: "C1".into(),
            },
        ];
        let papers = vec![KnownPaper {
            cited_id: "S1".into(),
            doi: "10.1/a".into(),
            scholar_title: None,
            meta_cited_title: Some("Paper A".into()),
            meta_cited_authors: None,
        }];

        let (cites, report) = join_citations(&links, &papers);
        assert_eq!(cites.len(), 1);
        assert_eq!(cites[0].citing_id, "C1");
        assert_eq!(report.unmatched_left, 1);
        assert_eq!(report.unmatched_right, 0);
    }
}
