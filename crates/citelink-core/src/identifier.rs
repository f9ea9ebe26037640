use std::fmt;

use thiserror::Error;

/// A citing document identifier split out of its extracted file name.
///
/// Extracted TEI files are named `<scholar_id>.<version>.<...>`, so several
/// files (versions) can belong to the same scholar record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocId {
    pub scholar_id: String,
    pub version: String,
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.scholar_id, self.version)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("document id {0:?} has no version segment")]
    MissingVersion(String),
}

/// Parse a composite document id such as `papers/abc123.v2.pdf`.
///
/// Everything up to the last `/` is a directory prefix and is discarded. The
/// remaining file name must have at least two `.`-separated segments; any
/// segments after the second are ignored.
pub fn parse_doc_id(doc_id: &str) -> Result<DocId, IdentifierError> {
    let file_name = doc_id.rsplit('/').next().unwrap_or(doc_id);
    let mut segments = file_name.split('.');

    match (segments.next(), segments.next()) {
        (Some(scholar_id), Some(version)) => Ok(DocId {
            scholar_id: scholar_id.to_string(),
            version: version.to_string(),
        }),
        _ => Err(IdentifierError::MissingVersion(doc_id.to_string())),
    }
}
