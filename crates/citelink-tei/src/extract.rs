use std::path::{Path, PathBuf};

use citelink_core::parse_doc_id;
use citelink_core::table::write_rows;

use crate::TeiError;
use crate::parser::{TeiDocument, parse_tei_file};
use crate::validate::{ValidationReport, check_document};

/// Column order of the citation-context table.
pub const CONTEXT_COLUMNS: [&str; 10] = [
    "doc_id",
    "citing_id",
    "cited_id",
    "citing_author",
    "citing_title",
    "cited_author",
    "cited_title",
    "citation_ref",
    "citation_sent",
    "citation_context",
];

/// One in-text bibliographic reference with its surrounding text.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContextRow {
    pub doc_id: String,
    pub citing_id: String,
    /// Bibliography entry id, e.g. `b12`. Empty when the ref has no target.
    pub cited_id: String,
    pub citing_author: String,
    pub citing_title: String,
    pub cited_author: String,
    pub cited_title: String,
    pub citation_ref: String,
    pub citation_sent: String,
    pub citation_context: String,
}

impl ContextRow {
    fn fields(&self) -> [&str; 10] {
        [
            &self.doc_id,
            &self.citing_id,
            &self.cited_id,
            &self.citing_author,
            &self.citing_title,
            &self.cited_author,
            &self.cited_title,
            &self.citation_ref,
            &self.citation_sent,
            &self.citation_context,
        ]
    }
}

/// Build one row per bibliographic ref in the document body.
///
/// The context window is the previous, current and next sentence of the
/// same paragraph.
pub fn contexts_from_document(doc_id: &str, doc: &TeiDocument) -> Vec<ContextRow> {
    let citing_id = match parse_doc_id(doc_id) {
        Ok(id) => id.scholar_id,
        Err(_) => Path::new(doc_id)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };
    let citing_author = doc.authors.join("; ");
    let citing_title = doc.title.clone().unwrap_or_default();

    let mut rows = Vec::new();
    for paragraph in &doc.paragraphs {
        for (i, sentence) in paragraph.iter().enumerate() {
            if sentence.refs.is_empty() {
                continue;
            }
            let start = i.saturating_sub(1);
            let end = (i + 2).min(paragraph.len());
            let context = paragraph[start..end]
                .iter()
                .map(|s| s.text.as_str())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ");

            for r in &sentence.refs {
                let entry = r.target.as_deref().and_then(|t| doc.bibliography.get(t));
                rows.push(ContextRow {
                    doc_id: doc_id.to_string(),
                    citing_id: citing_id.clone(),
                    cited_id: r.target.clone().unwrap_or_default(),
                    citing_author: citing_author.clone(),
                    citing_title: citing_title.clone(),
                    cited_author: entry.map(|e| e.authors.join("; ")).unwrap_or_default(),
                    cited_title: entry.and_then(|e| e.title.clone()).unwrap_or_default(),
                    citation_ref: r.text.clone(),
                    citation_sent: sentence.text.clone(),
                    citation_context: context.clone(),
                });
            }
        }
    }
    rows
}

/// All `*.xml` files directly under `dir`, sorted by name.
pub fn find_tei_files(dir: &Path) -> Result<Vec<PathBuf>, TeiError> {
    let io_err = |source| TeiError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file()
            && path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
        {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Progress events emitted by [`extract_directory`].
#[derive(Debug, Clone)]
pub enum ExtractProgress {
    Started { files: usize },
    FileDone { path: PathBuf, contexts: usize },
    FileSkipped { path: PathBuf },
}

#[derive(Debug, Clone, Default)]
pub struct ExtractReport {
    pub validation: ValidationReport,
    pub contexts_written: usize,
    /// Rows whose ref has no bibliography target.
    pub untargeted_refs: usize,
    /// Refs outside every sentence of a segmented paragraph. No row is
    /// written for them.
    pub unplaced_refs: usize,
}

/// Extract citation contexts from every TEI file in `tei_dir` and write them
/// as a TSV table to `output`. Unparseable files are skipped and counted.
pub fn extract_directory(
    tei_dir: &Path,
    output: &Path,
    mut progress: impl FnMut(ExtractProgress),
) -> Result<ExtractReport, TeiError> {
    let files = find_tei_files(tei_dir)?;
    tracing::info!(dir = %tei_dir.display(), files = files.len(), "extracting citation contexts");
    progress(ExtractProgress::Started { files: files.len() });

    let mut report = ExtractReport::default();
    let mut rows = Vec::new();
    for path in files {
        let doc = match parse_tei_file(&path) {
            Ok(doc) => doc,
            Err(e) => {
                report.validation.record_unparseable(&path, &e);
                progress(ExtractProgress::FileSkipped { path });
                continue;
            }
        };
        report.validation.record(&path, &check_document(&doc));

        let doc_rows = contexts_from_document(&path.to_string_lossy(), &doc);
        tracing::debug!(file = %path.display(), contexts = doc_rows.len(), "extracted");
        report.untargeted_refs += doc_rows.iter().filter(|r| r.cited_id.is_empty()).count();
        if doc.unplaced_refs > 0 {
            tracing::warn!(
                file = %path.display(),
                refs = doc.unplaced_refs,
                "refs outside sentences have no context"
            );
            report.unplaced_refs += doc.unplaced_refs;
        }
        progress(ExtractProgress::FileDone {
            path,
            contexts: doc_rows.len(),
        });
        rows.extend(doc_rows);
    }

    report.contexts_written = write_rows(
        output,
        b'\t',
        &CONTEXT_COLUMNS,
        rows.iter().map(ContextRow::fields),
    )?;
    tracing::info!(
        output = %output.display(),
        contexts = report.contexts_written,
        skipped = report.validation.unparseable.len(),
        "wrote citation contexts"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{BiblEntry, InlineRef, Sentence};

    fn sentence(text: &str, refs: &[(&str, Option<&str>)]) -> Sentence {
        Sentence {
            text: text.into(),
            refs: refs
                .iter()
                .map(|(t, target)| InlineRef {
                    text: (*t).into(),
                    target: target.map(Into::into),
                })
                .collect(),
        }
    }

    fn doc() -> TeiDocument {
        let mut doc = TeiDocument {
            title: Some("Citing Paper".into()),
            authors: vec!["Ann Lee".into(), "Carl Ray".into()],
            paragraphs: vec![
                vec![
                    sentence("One.", &[]),
                    sentence("Two [1].", &[("[1]", Some("b0"))]),
                    sentence("Three.", &[]),
                    sentence("Four.", &[]),
                ],
                vec![sentence("Alone [1,2].", &[("[1]", Some("b0")), ("[2]", None)])],
            ],
            ..Default::default()
        };
        doc.bibliography.insert(
            "b0".into(),
            BiblEntry {
                title: Some("Cited Paper".into()),
                authors: vec!["John Smith".into(), "Jane Doe".into()],
            },
        );
        doc
    }

    #[test]
    fn test_one_row_per_bibliographic_ref() {
        let rows = contexts_from_document("tei/ABC.2.xml", &doc());
        assert_eq!(rows.len(), 3);

        let first = &rows[0];
        assert_eq!(first.doc_id, "tei/ABC.2.xml");
        assert_eq!(first.citing_id, "ABC");
        assert_eq!(first.cited_id, "b0");
        assert_eq!(first.citing_author, "Ann Lee; Carl Ray");
        assert_eq!(first.citing_title, "Citing Paper");
        assert_eq!(first.cited_author, "John Smith; Jane Doe");
        assert_eq!(first.cited_title, "Cited Paper");
        assert_eq!(first.citation_ref, "[1]");
        assert_eq!(first.citation_sent, "Two [1].");
    }

    #[test]
    fn test_context_window_stays_in_paragraph() {
        let rows = contexts_from_document("ABC.1.xml", &doc());
        assert_eq!(rows[0].citation_context, "One. Two [1]. Three.");
        // Sole sentence of its paragraph
        assert_eq!(rows[1].citation_context, "Alone [1,2].");
    }

    #[test]
    fn test_untargeted_ref_has_empty_cited_fields() {
        let rows = contexts_from_document("ABC.1.xml", &doc());
        let untargeted = &rows[2];
        assert_eq!(untargeted.citation_ref, "[2]");
        assert_eq!(untargeted.cited_id, "");
        assert_eq!(untargeted.cited_author, "");
        assert_eq!(untargeted.cited_title, "");
    }

    #[test]
    fn test_citing_id_falls_back_to_file_stem() {
        let rows = contexts_from_document("dir/unversioned", &doc());
        assert_eq!(rows[0].citing_id, "unversioned");
    }

    #[test]
    fn test_find_tei_files_sorted_xml_only() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.1.xml", "a.1.XML", "notes.txt"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        std::fs::create_dir(dir.path().join("sub.xml")).unwrap();

        let files = find_tei_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.1.XML", "b.1.xml"]);
    }
}
