//! Linking engine for citation contexts.
//!
//! Loads the scholar-ID map, paper metadata, citation links and extracted
//! citation contexts, keeps one extracted version per citing document, joins
//! everything on shared identifiers and scores how well each cited
//! bibliography title matches the known paper title.

use std::path::PathBuf;

use thiserror::Error;

pub mod config_file;
pub mod filter;
pub mod identifier;
pub mod join;
pub mod merge;
pub mod pipeline;
pub mod schema;
pub mod similarity;
pub mod table;
pub mod versions;

// Re-export for convenience
pub use filter::{Projection, TITLE_SIM_THRESHOLD, passes_threshold};
pub use identifier::{DocId, IdentifierError, parse_doc_id};
pub use pipeline::{Delimiters, LinkInputs, LinkReport, LoadedTables, link_tables, run_link};
pub use similarity::{MISSING_TITLES_PENALTY, TitleScore, score_titles};
pub use table::Table;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("table error on {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("{table} table has no `{column}` column")]
    MissingColumn { table: String, column: String },
}

/// One row of the scholar-ID map after renaming (`result_id` → `cited_id`).
#[derive(Debug, Clone, PartialEq)]
pub struct ScholarIdRecord {
    pub cited_id: String,
    pub doi: String,
    pub scholar_title: Option<String>,
}

/// A known cited paper from the curated metadata table.
#[derive(Debug, Clone, PartialEq)]
pub struct PaperMetadata {
    pub meta_cited_doi: String,
    pub meta_cited_title: Option<String>,
    pub meta_cited_authors: Option<String>,
}

/// Edge between a cited paper and a paper citing it.
#[derive(Debug, Clone, PartialEq)]
pub struct CitationLink {
    pub cited_id: String,
    pub citing_id: String,
}

/// A citation sentence extracted from one TEI document.
///
/// `cited_author` and `cited_title` describe the bibliography entry the
/// in-text reference points at, as the document itself spells them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CitationContext {
    pub doc_id: String,
    pub cited_bibl_id: Option<String>,
    pub citing_author: Option<String>,
    pub citing_title: Option<String>,
    pub cited_author: Option<String>,
    pub cited_title: Option<String>,
    pub citation_ref: Option<String>,
    pub citation_sent: Option<String>,
    pub citation_context: Option<String>,
}

/// Convert a raw table cell into an optional value. Empty cells are absent.
pub(crate) fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
