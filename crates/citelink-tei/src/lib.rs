//! Citation context extraction from GROBID TEI documents.
//!
//! GROBID turns each citing PDF into a TEI file with a header (title,
//! authors), a sentence-segmented body and a bibliography. Every in-text
//! bibliographic reference in the body becomes one citation context row.

use std::path::PathBuf;

use thiserror::Error;

pub mod extract;
pub mod parser;
pub mod validate;

// Re-export for convenience
pub use extract::{
    CONTEXT_COLUMNS, ContextRow, ExtractProgress, ExtractReport, contexts_from_document,
    extract_directory, find_tei_files,
};
pub use parser::{BiblEntry, InlineRef, Sentence, TeiDocument, parse_tei, parse_tei_file};
pub use validate::{ValidationReport, Violation, check_document, validate_files};

#[derive(Error, Debug)]
pub enum TeiError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("XML error in {path} at byte {position}: {message}")]
    Xml {
        path: PathBuf,
        position: u64,
        message: String,
    },
    #[error(transparent)]
    Core(#[from] citelink_core::CoreError),
}
