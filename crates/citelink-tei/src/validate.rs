//! Assumption checks over parsed TEI documents.
//!
//! GROBID output is not schema-validated. These checks catch the cases that
//! make a document useless for linking: no title to report, no bibliography
//! to resolve refs against, or no segmented body text.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::parser::{TeiDocument, parse_tei_file};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Violation {
    MissingTitle,
    EmptyBibliography,
    NoBodySentences,
    /// A bibliographic ref points at an id absent from `<listBibl>`.
    DanglingRef,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Violation::MissingTitle => "missing header title",
            Violation::EmptyBibliography => "empty bibliography",
            Violation::NoBodySentences => "no body sentences",
            Violation::DanglingRef => "ref target not in bibliography",
        })
    }
}

/// Soft checks on a document that parsed. Each violation is reported once.
pub fn check_document(doc: &TeiDocument) -> Vec<Violation> {
    let mut violations = Vec::new();
    if doc.title.is_none() {
        violations.push(Violation::MissingTitle);
    }
    if doc.bibliography.is_empty() {
        violations.push(Violation::EmptyBibliography);
    }
    if doc.sentence_count() == 0 {
        violations.push(Violation::NoBodySentences);
    }
    let dangling = doc
        .paragraphs
        .iter()
        .flatten()
        .flat_map(|s| &s.refs)
        .filter_map(|r| r.target.as_deref())
        .any(|t| !doc.bibliography.contains_key(t));
    if dangling {
        violations.push(Violation::DanglingRef);
    }
    violations
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Files that parsed.
    pub checked: usize,
    /// Files that failed to parse; these are skipped downstream.
    pub unparseable: Vec<PathBuf>,
    pub violations: BTreeMap<Violation, usize>,
}

impl ValidationReport {
    pub fn record(&mut self, path: &Path, violations: &[Violation]) {
        self.checked += 1;
        for v in violations {
            tracing::warn!(file = %path.display(), violation = %v, "TEI assumption violated");
            *self.violations.entry(*v).or_default() += 1;
        }
    }

    pub fn record_unparseable(&mut self, path: &Path, error: &crate::TeiError) {
        tracing::warn!(file = %path.display(), error = %error, "skipping unparseable TEI file");
        self.unparseable.push(path.to_path_buf());
    }

    pub fn count(&self, violation: Violation) -> usize {
        self.violations.get(&violation).copied().unwrap_or(0)
    }

    pub fn is_clean(&self) -> bool {
        self.unparseable.is_empty() && self.violations.is_empty()
    }
}

/// Parse and check every file without extracting anything.
pub fn validate_files(files: &[PathBuf]) -> ValidationReport {
    let mut report = ValidationReport::default();
    for path in files {
        match parse_tei_file(path) {
            Ok(doc) => report.record(path, &check_document(&doc)),
            Err(e) => report.record_unparseable(path, &e),
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{BiblEntry, InlineRef, Sentence};

    fn complete_doc() -> TeiDocument {
        let mut doc = TeiDocument {
            title: Some("Citing".into()),
            paragraphs: vec![vec![Sentence {
                text: "See [1].".into(),
                refs: vec![InlineRef {
                    text: "[1]".into(),
                    target: Some("b0".into()),
                }],
            }]],
            ..Default::default()
        };
        doc.bibliography.insert("b0".into(), BiblEntry::default());
        doc
    }

    #[test]
    fn test_complete_document_passes() {
        assert!(check_document(&complete_doc()).is_empty());
    }

    #[test]
    fn test_empty_document_fails_every_structural_check() {
        assert_eq!(
            check_document(&TeiDocument::default()),
            vec![
                Violation::MissingTitle,
                Violation::EmptyBibliography,
                Violation::NoBodySentences
            ]
        );
    }

    #[test]
    fn test_dangling_ref_reported_once() {
        let mut doc = complete_doc();
        for target in ["b7", "b8"] {
            doc.paragraphs[0][0].refs.push(InlineRef {
                text: "[x]".into(),
                target: Some(target.into()),
            });
        }
        assert_eq!(check_document(&doc), vec![Violation::DanglingRef]);
    }

    #[test]
    fn test_validate_files_counts_unparseable() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("A.1.xml");
        let bad = dir.path().join("B.1.xml");
        std::fs::write(&good, "<TEI><text><body><p><s>Hi.</s></p></body></text></TEI>").unwrap();
        std::fs::write(&bad, "<TEI><text></body></TEI>").unwrap();

        let report = validate_files(&[good, bad.clone()]);
        assert_eq!(report.checked, 1);
        assert_eq!(report.unparseable, vec![bad]);
        assert_eq!(report.count(Violation::MissingTitle), 1);
        assert_eq!(report.count(Violation::EmptyBibliography), 1);
        assert_eq!(report.count(Violation::NoBodySentences), 0);
        assert!(!report.is_clean());
    }
}
