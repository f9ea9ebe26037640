//! Column mappings applied to each input table before it is joined.
//!
//! The inputs come from different tools and reuse the same column names for
//! different things (`title`, `cited_id`, `citing_id`). Each table gets a
//! [`ColumnMap`] that renames or drops columns so joined rows never collide.

use crate::table::Table;
use crate::{
    CitationContext, CitationLink, CoreError, PaperMetadata, ScholarIdRecord, non_empty,
};

/// Rename and drop rules for one input table.
#[derive(Debug, Clone, Copy)]
pub struct ColumnMap {
    pub renames: &'static [(&'static str, &'static str)],
    pub drops: &'static [&'static str],
}

/// Scholar search results: `result_id` is the cited paper id used in the
/// citation links.
pub const SCHOLAR_IDS: ColumnMap = ColumnMap {
    renames: &[("result_id", "cited_id"), ("title", "scholar_title")],
    drops: &[],
};

/// Curated paper metadata, prefixed so it cannot collide with the
/// bibliography fields extracted from citing documents.
pub const METADATA: ColumnMap = ColumnMap {
    renames: &[
        ("DOI", "meta_cited_doi"),
        ("title", "meta_cited_title"),
        ("authors", "meta_cited_authors"),
    ],
    drops: &[],
};

/// Citation links are used as-is.
pub const CITATIONS: ColumnMap = ColumnMap {
    renames: &[],
    drops: &[],
};

/// Extracted citation contexts. The extractor's `citing_id` is recomputed
/// from `doc_id`, and its `cited_id` is a bibliography entry id local to the
/// TEI document, not a scholar id.
pub const CONTEXTS: ColumnMap = ColumnMap {
    renames: &[("cited_id", "cited_bibl_id")],
    drops: &["citing_id"],
};

impl ColumnMap {
    /// The name a column carries after mapping, or `None` if it is dropped.
    pub fn mapped_name<'a>(&self, column: &'a str) -> Option<&'a str> {
        if self.drops.contains(&column) {
            return None;
        }
        Some(
            self.renames
                .iter()
                .find(|(from, _)| *from == column)
                .map(|(_, to)| *to)
                .unwrap_or(column),
        )
    }

    /// Apply the mapping to a loaded table.
    pub fn apply(&self, mut table: Table) -> Table {
        let keep: Vec<Option<String>> = table
            .headers()
            .iter()
            .map(|h| self.mapped_name(h).map(str::to_string))
            .collect();

        if keep.iter().any(Option::is_none) {
            for row in table.rows_mut().iter_mut() {
                let mut cells = keep.iter();
                row.retain(|_| cells.next().is_some_and(Option::is_some));
            }
        }
        *table.headers_mut() = keep.into_iter().flatten().collect();
        table
    }
}

/// Typed view over one row of a mapped table.
struct Cells<'a> {
    row: &'a [String],
}

impl<'a> Cells<'a> {
    fn text(&self, idx: usize) -> String {
        self.row[idx].clone()
    }

    fn optional(&self, idx: Option<usize>) -> Option<String> {
        idx.and_then(|i| non_empty(&self.row[i]))
    }
}

/// Build scholar-ID records from a table mapped with [`SCHOLAR_IDS`].
pub fn scholar_ids(table: &Table) -> Result<Vec<ScholarIdRecord>, CoreError> {
    let cited_id = table.require("cited_id")?;
    let doi = table.require("doi")?;
    let title = table.column("scholar_title");

    Ok(table
        .rows()
        .iter()
        .map(|row| {
            let cells = Cells { row };
            ScholarIdRecord {
                cited_id: cells.text(cited_id),
                doi: cells.text(doi),
                scholar_title: cells.optional(title),
            }
        })
        .collect())
}

/// Build metadata records from a table mapped with [`METADATA`].
pub fn paper_metadata(table: &Table) -> Result<Vec<PaperMetadata>, CoreError> {
    let doi = table.require("meta_cited_doi")?;
    let title = table.require("meta_cited_title")?;
    let authors = table.require("meta_cited_authors")?;

    Ok(table
        .rows()
        .iter()
        .map(|row| {
            let cells = Cells { row };
            PaperMetadata {
                meta_cited_doi: cells.text(doi),
                meta_cited_title: cells.optional(Some(title)),
                meta_cited_authors: cells.optional(Some(authors)),
            }
        })
        .collect())
}

/// Build citation links from a table mapped with [`CITATIONS`].
pub fn citation_links(table: &Table) -> Result<Vec<CitationLink>, CoreError> {
    let cited_id = table.require("cited_id")?;
    let citing_id = table.require("citing_id")?;

    Ok(table
        .rows()
        .iter()
        .map(|row| {
            let cells = Cells { row };
            CitationLink {
                cited_id: cells.text(cited_id),
                citing_id: cells.text(citing_id),
            }
        })
        .collect())
}

/// Build citation contexts from a table mapped with [`CONTEXTS`].
pub fn citation_contexts(table: &Table) -> Result<Vec<CitationContext>, CoreError> {
    let doc_id = table.require("doc_id")?;
    let citing_author = table.require("citing_author")?;
    let citing_title = table.require("citing_title")?;
    let cited_author = table.require("cited_author")?;
    let cited_title = table.require("cited_title")?;
    let citation_ref = table.require("citation_ref")?;
    let citation_sent = table.require("citation_sent")?;
    let citation_context = table.require("citation_context")?;
    let cited_bibl_id = table.column("cited_bibl_id");

    Ok(table
        .rows()
        .iter()
        .map(|row| {
            let cells = Cells { row };
            CitationContext {
                doc_id: cells.text(doc_id),
                cited_bibl_id: cells.optional(cited_bibl_id),
                citing_author: cells.optional(Some(citing_author)),
                citing_title: cells.optional(Some(citing_title)),
                cited_author: cells.optional(Some(cited_author)),
                cited_title: cells.optional(Some(cited_title)),
                citation_ref: cells.optional(Some(citation_ref)),
                citation_sent: cells.optional(Some(citation_sent)),
                citation_context: cells.optional(Some(citation_context)),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: &[&[&str]]) -> Table {
        let mut t = Table::new("test", headers.iter().map(|h| h.to_string()).collect());
        for row in rows {
            t.push_row(row.iter().map(|c| c.to_string()).collect());
        }
        t
    }

    #[test]
    fn test_scholar_ids_renamed() {
        let t = SCHOLAR_IDS.apply(table(
            &["result_id", "title", "doi"],
            &[&["R1", "Some Title", "10.1/x"]],
        ));
        assert_eq!(t.headers(), ["cited_id", "scholar_title", "doi"]);

        let records = scholar_ids(&t).unwrap();
        assert_eq!(
            records,
            vec![ScholarIdRecord {
                cited_id: "R1".into(),
                doi: "10.1/x".into(),
                scholar_title: Some("Some Title".into()),
            }]
        );
    }

    #[test]
    fn test_contexts_drop_citing_id_and_rename_cited_id() {
        let t = CONTEXTS.apply(table(
            &["doc_id", "citing_id", "cited_id", "citation_ref"],
            &[&["d/a.1.xml", "a", "b3", "[3]"]],
        ));
        assert_eq!(t.headers(), ["doc_id", "cited_bibl_id", "citation_ref"]);
        assert_eq!(t.rows()[0], vec!["d/a.1.xml", "b3", "[3]"]);
    }

    #[test]
    fn test_metadata_keeps_annotation_flags() {
        let t = METADATA.apply(table(
            &["DOI", "title", "authors", "background"],
            &[&["10.1/x", "T", "A", "1"]],
        ));
        assert_eq!(
            t.headers(),
            [
                "meta_cited_doi",
                "meta_cited_title",
                "meta_cited_authors",
                "background"
            ]
        );
    }

    #[test]
    fn test_missing_required_column() {
        let t = CITATIONS.apply(table(&["cited_id"], &[&["R1"]]));
        let err = citation_links(&t).unwrap_err();
        assert!(matches!(err, CoreError::MissingColumn { ref column, .. } if column == "citing_id"));
    }

    #[test]
    fn test_empty_cells_become_none() {
        let t = METADATA.apply(table(
            &["DOI", "title", "authors"],
            &[&["10.1/x", "", "Smith"]],
        ));
        let records = paper_metadata(&t).unwrap();
        assert_eq!(records[0].meta_cited_title, None);
        assert_eq!(records[0].meta_cited_authors.as_deref(), Some("Smith"));
    }

    #[test]
    fn test_contexts_without_bibl_id_column() {
        let t = CONTEXTS.apply(table(
            &[
                "doc_id",
                "citing_author",
                "citing_title",
                "cited_author",
                "cited_title",
                "citation_ref",
                "citation_sent",
                "citation_context",
            ],
            &[&["p/a.1.xml", "Ann", "Citing", "Bob", "Cited", "[1]", "S.", "C."]],
        ));
        let contexts = citation_contexts(&t).unwrap();
        assert_eq!(contexts[0].cited_bibl_id, None);
        assert_eq!(contexts[0].cited_title.as_deref(), Some("Cited"));
    }
}
