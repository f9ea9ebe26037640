//! Merge hand-annotated citation contexts with the one-hot paper metadata.
//!
//! Annotated contexts carry a scholar `cited_id`; the scholar-ID map turns it
//! into a DOI, which keys the metadata table.

use std::collections::HashMap;
use std::path::Path;

use crate::table::{Table, read_table, write_table};
use crate::{CoreError, schema};

/// Flag columns of an annotated context. A context counts as annotated when
/// any of them is `1`.
pub const ANNOTATION_CATEGORIES: [&str; 10] = [
    "background",
    "uses_data",
    "uses_design",
    "uses_infrastructure",
    "similarities",
    "differences",
    "disagreement",
    "motivation",
    "extension",
    "future_work",
];

/// Metadata columns never copied onto merged contexts.
pub const DROPPED_METADATA_FIELDS: [&str; 8] = [
    "zotero_ID",
    "DOI",
    "authors",
    "title",
    "pages",
    "codes",
    "keywords",
    "abstract",
];

/// Metadata columns appended to every context in the extended output.
pub const EXTENDED_FIELDS: [&str; 5] = [
    "type",
    "year",
    "design__type__resource_paper",
    "design__type__experimental",
    "design__type__theoretical",
];

/// A context row that could not be matched to metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedContext {
    pub cited_id: String,
    pub doi: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MergeReport {
    pub contexts: usize,
    pub annotated: usize,
    pub merged: usize,
    pub dropped: Vec<DroppedContext>,
    pub extended: usize,
    pub extended_skipped: usize,
    /// Input rows skipped for a cell count not matching their header.
    pub misaligned_rows: usize,
}

/// `result_id` → DOI from the raw scholar-ID table.
pub fn id_mappings(scholar_ids: &Table) -> Result<HashMap<String, String>, CoreError> {
    let mapped = schema::SCHOLAR_IDS.apply(scholar_ids.clone());
    Ok(schema::scholar_ids(&mapped)?
        .into_iter()
        .map(|r| (r.cited_id, r.doi))
        .collect())
}

fn is_annotated(row: &[String], flags: &[usize]) -> bool {
    flags.iter().any(|&i| row[i] == "1")
}

/// Keep annotated contexts that resolve to a metadata row and append that
/// row's columns (except [`DROPPED_METADATA_FIELDS`]).
pub fn merge_annotations(
    contexts: &Table,
    ids: &HashMap<String, String>,
    metadata: &Table,
) -> Result<(Table, Vec<DroppedContext>), CoreError> {
    let cited_id = contexts.require("cited_id")?;
    let flags = ANNOTATION_CATEGORIES
        .iter()
        .map(|c| contexts.require(c))
        .collect::<Result<Vec<_>, _>>()?;
    let by_doi = metadata.index_by(metadata.require("DOI")?);

    // Metadata columns to carry over, and where each lands in the output.
    let mut headers = contexts.headers().to_vec();
    let mut carried: Vec<(usize, usize)> = Vec::new();
    for (src, name) in metadata.headers().iter().enumerate() {
        if DROPPED_METADATA_FIELDS.contains(&name.as_str()) {
            continue;
        }
        let dst = match headers.iter().position(|h| h == name) {
            Some(existing) => existing,
            None => {
                headers.push(name.clone());
                headers.len() - 1
            }
        };
        carried.push((src, dst));
    }

    let mut merged = Table::new("merged", headers);
    let mut dropped = Vec::new();

    for row in contexts.rows() {
        if !is_annotated(row, &flags) {
            continue;
        }
        let doi = ids.get(&row[cited_id]);
        match doi.and_then(|d| by_doi.get(d.as_str())) {
            Some(meta) => {
                let mut out = row.clone();
                out.resize(merged.headers().len(), String::new());
                for &(src, dst) in &carried {
                    out[dst] = meta[src].clone();
                }
                merged.push_row(out);
            }
            None => {
                tracing::warn!(
                    cited_id = %row[cited_id],
                    doi = doi.map(String::as_str).unwrap_or("<unmapped>"),
                    "annotated context has no paper metadata"
                );
                dropped.push(DroppedContext {
                    cited_id: row[cited_id].clone(),
                    doi: doi.cloned(),
                });
            }
        }
    }

    Ok((merged, dropped))
}

/// Append [`EXTENDED_FIELDS`] to every context. Contexts that cannot be
/// resolved to metadata are skipped; the skip count is returned.
pub fn extend_contexts(
    contexts: &Table,
    ids: &HashMap<String, String>,
    metadata: &Table,
) -> Result<(Table, usize), CoreError> {
    let cited_id = contexts.require("cited_id")?;
    let by_doi = metadata.index_by(metadata.require("DOI")?);
    let fields = EXTENDED_FIELDS
        .iter()
        .map(|f| metadata.require(f))
        .collect::<Result<Vec<_>, _>>()?;

    let mut headers = contexts.headers().to_vec();
    headers.extend(EXTENDED_FIELDS.iter().map(|f| f.to_string()));
    let mut extended = Table::new("extended", headers);
    let mut skipped = 0;

    for row in contexts.rows() {
        let meta = ids
            .get(&row[cited_id])
            .and_then(|doi| by_doi.get(doi.as_str()));
        match meta {
            Some(meta) => {
                let mut out = row.clone();
                out.extend(fields.iter().map(|&i| meta[i].clone()));
                extended.push_row(out);
            }
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        tracing::warn!(skipped, "contexts without paper metadata left out of extended table");
    }
    Ok((extended, skipped))
}

/// Input and output locations for [`run_merge`].
#[derive(Debug, Clone)]
pub struct MergePaths<'a> {
    /// Comma-delimited annotated contexts.
    pub contexts: &'a Path,
    /// Tab-delimited scholar-ID map.
    pub scholar_ids: &'a Path,
    /// Tab-delimited one-hot metadata.
    pub metadata: &'a Path,
    /// Directory receiving `citation-contexts-merged.csv` and
    /// `citation-contexts-extended.csv`.
    pub out_dir: &'a Path,
}

pub const MERGED_FILE: &str = "citation-contexts-merged.csv";
pub const EXTENDED_FILE: &str = "citation-contexts-extended.csv";

/// Produce the merged and extended context tables.
pub fn run_merge(paths: &MergePaths<'_>) -> Result<MergeReport, CoreError> {
    let contexts = read_table(paths.contexts, b',')?;
    let ids_table = read_table(paths.scholar_ids, b'\t')?;
    let ids = id_mappings(&ids_table)?;
    let metadata = read_table(paths.metadata, b'\t')?;

    let (merged, dropped) = merge_annotations(&contexts, &ids, &metadata)?;
    write_table(&paths.out_dir.join(MERGED_FILE), b',', &merged)?;

    let (extended, extended_skipped) = extend_contexts(&contexts, &ids, &metadata)?;
    write_table(&paths.out_dir.join(EXTENDED_FILE), b',', &extended)?;

    let report = MergeReport {
        contexts: contexts.len(),
        annotated: merged.len() + dropped.len(),
        merged: merged.len(),
        dropped,
        extended: extended.len(),
        extended_skipped,
        misaligned_rows: contexts.misaligned_rows()
            + ids_table.misaligned_rows()
            + metadata.misaligned_rows(),
    };
    tracing::info!(
        merged = report.merged,
        dropped = report.dropped.len(),
        extended = report.extended,
        "merged annotated contexts"
    );
    Ok(report)
}
