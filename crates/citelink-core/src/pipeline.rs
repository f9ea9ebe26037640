//! End-to-end linking of citation contexts to curated paper metadata.

use std::path::{Path, PathBuf};

use crate::filter::{Projection, ScoredContext, write_linked};
use crate::join::{JoinReport, join_citations, join_contexts, join_metadata};
use crate::table::{Table, delimiter_for_path, read_table};
use crate::versions::{MalformedIds, select_versions, tag_versions};
use crate::{
    CitationContext, CitationLink, CoreError, PaperMetadata, ScholarIdRecord, schema,
};

/// Per-table field delimiters. `None` infers the delimiter from the file
/// extension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delimiters {
    pub scholar_ids: Option<u8>,
    pub metadata: Option<u8>,
    pub citations: Option<u8>,
    pub contexts: Option<u8>,
}

impl Delimiters {
    /// The same delimiter for every table.
    pub fn uniform(delimiter: u8) -> Self {
        Self {
            scholar_ids: Some(delimiter),
            metadata: Some(delimiter),
            citations: Some(delimiter),
            contexts: Some(delimiter),
        }
    }

    /// Fill unset tables from `fallback`.
    pub fn or(self, fallback: Delimiters) -> Self {
        Self {
            scholar_ids: self.scholar_ids.or(fallback.scholar_ids),
            metadata: self.metadata.or(fallback.metadata),
            citations: self.citations.or(fallback.citations),
            contexts: self.contexts.or(fallback.contexts),
        }
    }
}

/// Locations of the four input tables.
#[derive(Debug, Clone)]
pub struct LinkInputs {
    pub scholar_ids: PathBuf,
    pub metadata: PathBuf,
    pub citations: PathBuf,
    pub contexts: PathBuf,
    pub delimiters: Delimiters,
}

/// The four inputs, mapped and typed.
#[derive(Debug, Clone, Default)]
pub struct LoadedTables {
    pub scholar_ids: Vec<ScholarIdRecord>,
    pub metadata: Vec<PaperMetadata>,
    pub citations: Vec<CitationLink>,
    pub contexts: Vec<CitationContext>,
    /// Input rows skipped because their cell count did not match the header.
    pub misaligned_rows: usize,
}

/// Row counts collected across a linking run.
#[derive(Debug, Clone, Default)]
pub struct LinkReport {
    /// Input rows skipped for a cell count not matching their header.
    pub misaligned_rows: usize,
    pub contexts_loaded: usize,
    pub malformed_ids: MalformedIds,
    /// Contexts left after keeping one version per citing document.
    pub contexts_selected: usize,
    pub metadata_join: JoinReport,
    pub citation_join: JoinReport,
    pub context_join: JoinReport,
    /// Linked rows whose known paper has no title, so no similarity.
    pub undefined_similarity: usize,
    pub above_threshold: usize,
}

impl LinkReport {
    /// Citation links to known papers.
    pub fn citations(&self) -> usize {
        self.citation_join.joined_rows
    }

    /// Contexts paired with a known paper before thresholding.
    pub fn linked_contexts(&self) -> usize {
        self.context_join.joined_rows
    }
}

fn require_file(path: &Path) -> Result<(), CoreError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(CoreError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "input file not found"),
        })
    }
}

/// Read and type all inputs. Any missing file or column is fatal.
pub fn load_inputs(inputs: &LinkInputs) -> Result<LoadedTables, CoreError> {
    for path in [
        &inputs.scholar_ids,
        &inputs.metadata,
        &inputs.citations,
        &inputs.contexts,
    ] {
        require_file(path)?;
    }

    let d = &inputs.delimiters;
    let mut misaligned_rows = 0;
    let mut load = |path: &Path, delimiter: Option<u8>| -> Result<Table, CoreError> {
        let table = read_table(path, delimiter.unwrap_or_else(|| delimiter_for_path(path)))?;
        misaligned_rows += table.misaligned_rows();
        Ok(table)
    };

    let scholar_ids = schema::scholar_ids(
        &schema::SCHOLAR_IDS.apply(load(inputs.scholar_ids.as_path(), d.scholar_ids)?),
    )?;
    let metadata =
        schema::paper_metadata(&schema::METADATA.apply(load(inputs.metadata.as_path(), d.metadata)?))?;
    let citations =
        schema::citation_links(&schema::CITATIONS.apply(load(inputs.citations.as_path(), d.citations)?))?;
    let contexts =
        schema::citation_contexts(&schema::CONTEXTS.apply(load(inputs.contexts.as_path(), d.contexts)?))?;

    tracing::info!(
        scholar_ids = scholar_ids.len(),
        metadata = metadata.len(),
        citations = citations.len(),
        contexts = contexts.len(),
        misaligned_rows,
        "loaded inputs"
    );

    Ok(LoadedTables {
        scholar_ids,
        metadata,
        citations,
        contexts,
        misaligned_rows,
    })
}

/// Link loaded tables and score every linked context.
///
/// Returns all scored rows (including those below the threshold) so callers
/// can inspect or re-project them.
pub fn link_tables(tables: &LoadedTables) -> (Vec<ScoredContext>, LinkReport) {
    let mut report = LinkReport {
        misaligned_rows: tables.misaligned_rows,
        contexts_loaded: tables.contexts.len(),
        ..Default::default()
    };

    let (papers, metadata_join) = join_metadata(&tables.metadata, &tables.scholar_ids);
    report.metadata_join = metadata_join;
    tracing::debug!(?metadata_join, "joined paper metadata with scholar ids");

    let (citations, citation_join) = join_citations(&tables.citations, &papers);
    report.citation_join = citation_join;
    tracing::info!(citations = citation_join.joined_rows, "merged paper and citation metadata");

    let (tagged, malformed) = tag_versions(tables.contexts.clone());
    if malformed.count > 0 {
        tracing::warn!(
            count = malformed.count,
            examples = ?malformed.examples,
            "skipped citation contexts with malformed document ids"
        );
    }
    report.malformed_ids = malformed;

    let selected = select_versions(tagged);
    report.contexts_selected = selected.len();

    let (linked, context_join) = join_contexts(&citations, &selected);
    report.context_join = context_join;
    tracing::info!(
        contexts = context_join.joined_rows,
        "merged citation metadata with citation contexts"
    );

    let scored: Vec<ScoredContext> = linked.into_iter().map(ScoredContext::score).collect();
    report.undefined_similarity = scored
        .iter()
        .filter(|r| r.score.similarity.is_none())
        .count();
    if report.undefined_similarity > 0 {
        tracing::warn!(
            count = report.undefined_similarity,
            "linked contexts whose known paper has no title cannot be scored"
        );
    }
    report.above_threshold = scored.iter().filter(|r| r.passes()).count();

    (scored, report)
}

/// Load, link, score, filter and write the linked contexts to `output`.
pub fn run_link(
    inputs: &LinkInputs,
    output: &Path,
    projection: Projection,
) -> Result<LinkReport, CoreError> {
    let tables = load_inputs(inputs)?;
    let (scored, report) = link_tables(&tables);

    let written = write_linked(output, b'\t', &scored, projection)?;
    tracing::info!(
        above_threshold = written,
        output = %output.display(),
        "wrote linked citation contexts"
    );
    Ok(report)
}
