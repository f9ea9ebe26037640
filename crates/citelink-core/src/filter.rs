use std::path::Path;

use crate::CoreError;
use crate::join::LinkedContext;
use crate::similarity::{TitleScore, score_titles};
use crate::table::write_rows;

/// Minimum title similarity (exclusive) for a context to count as citing the
/// known paper.
pub const TITLE_SIM_THRESHOLD: f64 = 0.6;

/// Output columns, in order.
pub const OUTPUT_COLUMNS: [&str; 10] = [
    "cited_id",
    "cited_author",
    "cited_title",
    "citing_id",
    "citing_author",
    "citing_title",
    "citation_ref",
    "citation_sent",
    "citation_context",
    "title_sim",
];

/// Whether a similarity clears the threshold. Undefined similarities never do.
pub fn passes_threshold(similarity: Option<f64>) -> bool {
    similarity.is_some_and(|s| s > TITLE_SIM_THRESHOLD)
}

/// A linked context with its title score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredContext {
    pub linked: LinkedContext,
    pub score: TitleScore,
}

impl ScoredContext {
    /// Score the context's cited bibliography title against the known paper
    /// title.
    pub fn score(linked: LinkedContext) -> Self {
        let score = score_titles(
            linked.context.cited_title.as_deref(),
            linked.meta_cited_title.as_deref(),
        );
        Self { linked, score }
    }

    pub fn passes(&self) -> bool {
        passes_threshold(self.score.similarity)
    }
}

/// Which columns to write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Projection {
    #[default]
    Standard,
    /// Standard columns plus `title_dist` before `title_sim`.
    WithTitleDist,
}

impl Projection {
    pub fn columns(&self) -> Vec<&'static str> {
        let mut columns = OUTPUT_COLUMNS.to_vec();
        if *self == Projection::WithTitleDist {
            columns.insert(columns.len() - 1, "title_dist");
        }
        columns
    }

    /// Cell values for one row, aligned with [`Projection::columns`].
    pub fn project(&self, row: &ScoredContext) -> Vec<String> {
        let ctx = &row.linked.context;
        let text = |v: &Option<String>| v.clone().unwrap_or_default();

        let mut cells = vec![
            row.linked.cited_id.clone(),
            text(&ctx.cited_author),
            text(&ctx.cited_title),
            row.linked.citing_id.clone(),
            text(&ctx.citing_author),
            text(&ctx.citing_title),
            text(&ctx.citation_ref),
            text(&ctx.citation_sent),
            text(&ctx.citation_context),
        ];
        if *self == Projection::WithTitleDist {
            cells.push(row.score.distance.to_string());
        }
        cells.push(row.score.similarity.map(format_ratio).unwrap_or_default());
        cells
    }
}

/// Format a float the way a dataframe export does: integral values keep a
/// trailing `.0`, others use the shortest round-trip representation.
pub fn format_ratio(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

/// Rows that pass the threshold, in input order.
pub fn above_threshold(rows: &[ScoredContext]) -> impl Iterator<Item = &ScoredContext> {
    rows.iter().filter(|r| r.passes())
}

/// Write rows passing the threshold. Returns the number written.
pub fn write_linked(
    path: &Path,
    delimiter: u8,
    rows: &[ScoredContext],
    projection: Projection,
) -> Result<usize, CoreError> {
    let columns = projection.columns();
    write_rows(
        path,
        delimiter,
        &columns,
        above_threshold(rows).map(|r| projection.project(r)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CitationContext;

    fn scored(meta_title: Option<&str>, cited_title: Option<&str>) -> ScoredContext {
        ScoredContext::score(LinkedContext {
            cited_id: "S1".into(),
            citing_id: "C1".into(),
            citing_version: "1".into(),
            num_refs: 1,
            meta_cited_authors: None,
            meta_cited_title: meta_title.map(String::from),
            context: CitationContext {
                doc_id: "tei/C1.1.xml".into(),
                cited_title: cited_title.map(String::from),
                cited_author: Some("Smith".into()),
                citation_sent: Some("As shown in [1].".into()),
                ..Default::default()
            },
        })
    }

    #[test]
    fn test_threshold_is_strict() {
        assert!(!passes_threshold(Some(0.6)));
        assert!(passes_threshold(Some(0.60001)));
        assert!(!passes_threshold(Some(-1.0)));
        assert!(!passes_threshold(None));
    }

    #[test]
    fn test_case_difference_passes() {
        let row = scored(Some("Information Retrieval"), Some("information retrieval"));
        assert_eq!(row.score.distance, 0);
        assert!(row.passes());
    }

    #[test]
    fn test_absent_candidate_fails() {
        let row = scored(Some("Search"), None);
        assert_eq!(row.score.distance, 6);
        assert_eq!(row.score.similarity, Some(0.0));
        assert!(!row.passes());
    }

    #[test]
    fn test_absent_reference_fails() {
        let row = scored(None, Some("Search"));
        assert_eq!(row.score.similarity, None);
        assert!(!row.passes());
    }

    #[test]
    fn test_projection_columns() {
        assert_eq!(Projection::Standard.columns(), OUTPUT_COLUMNS.to_vec());
        let with_dist = Projection::WithTitleDist.columns();
        assert_eq!(with_dist.len(), 11);
        assert_eq!(with_dist[9], "title_dist");
        assert_eq!(with_dist[10], "title_sim");
    }

    #[test]
    fn test_project_row_values() {
        let row = scored(Some("Search Engines"), Some("search engines"));
        let cells = Projection::WithTitleDist.project(&row);
        assert_eq!(cells[0], "S1");
        assert_eq!(cells[1], "Smith");
        assert_eq!(cells[2], "search engines");
        assert_eq!(cells[3], "C1");
        assert_eq!(cells[4], "");
        assert_eq!(cells[7], "As shown in [1].");
        assert_eq!(cells[9], "0");
        assert_eq!(cells[10], "1.0");
    }

    #[test]
    fn test_format_ratio() {
        assert_eq!(format_ratio(1.0), "1.0");
        assert_eq!(format_ratio(0.0), "0.0");
        assert_eq!(format_ratio(0.75), "0.75");
        assert_eq!(format_ratio(-2.0), "-2.0");
    }

    #[test]
    fn test_write_linked_only_writes_passing_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("linked.tsv");
        let rows = vec![
            scored(Some("Search Engines"), Some("Search engines")),
            scored(Some("Search Engines"), Some("Completely unrelated")),
        ];

        let written = write_linked(&path, b'\t', &rows, Projection::Standard).unwrap();
        assert_eq!(written, 1);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("cited_id\tcited_author\tcited_title"));
        assert!(lines[1].ends_with("\t1.0"));
    }
}
