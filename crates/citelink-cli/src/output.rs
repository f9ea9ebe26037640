use std::io::Write;

use citelink_core::LinkReport;
use citelink_core::join::JoinReport;
use citelink_core::merge::MergeReport;
use citelink_tei::{ExtractReport, ValidationReport};
use owo_colors::OwoColorize;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

fn heading(w: &mut dyn Write, text: &str, color: ColorMode) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "{}", text.bold())
    } else {
        writeln!(w, "{}", text)
    }
}

/// A count that should draw attention when non-zero.
fn warn_line(w: &mut dyn Write, label: &str, count: usize, color: ColorMode) -> std::io::Result<()> {
    let line = format!("  {:<28} {}", label, count);
    if count > 0 && color.enabled() {
        writeln!(w, "{}", line.yellow())
    } else {
        writeln!(w, "{}", line)
    }
}

fn join_line(w: &mut dyn Write, label: &str, join: &JoinReport) -> std::io::Result<()> {
    writeln!(
        w,
        "  {:<28} {} ({} x {}, {} unmatched left)",
        label, join.joined_rows, join.left_rows, join.right_rows, join.unmatched_left
    )
}

/// Print the summary after `link`.
pub fn print_link_summary(
    w: &mut dyn Write,
    report: &LinkReport,
    output: &std::path::Path,
    color: ColorMode,
) -> std::io::Result<()> {
    heading(w, "Linking summary", color)?;
    warn_line(w, "misaligned rows (skipped)", report.misaligned_rows, color)?;
    writeln!(w, "  {:<28} {}", "contexts loaded", report.contexts_loaded)?;
    warn_line(w, "malformed doc ids", report.malformed_ids.count, color)?;
    if !report.malformed_ids.examples.is_empty() {
        let examples = report.malformed_ids.examples.join(", ");
        if color.enabled() {
            writeln!(w, "    {}", format!("e.g. {}", examples).dimmed())?;
        } else {
            writeln!(w, "    e.g. {}", examples)?;
        }
    }
    writeln!(w, "  {:<28} {}", "contexts after versioning", report.contexts_selected)?;
    join_line(w, "known papers", &report.metadata_join)?;
    join_line(w, "citations of known papers", &report.citation_join)?;
    join_line(w, "linked contexts", &report.context_join)?;
    warn_line(w, "untitled known papers", report.undefined_similarity, color)?;

    let kept = format!(
        "  {:<28} {} -> {}",
        "above threshold",
        report.above_threshold,
        output.display()
    );
    if color.enabled() {
        writeln!(w, "{}", kept.green())?;
    } else {
        writeln!(w, "{}", kept)?;
    }
    Ok(())
}

pub fn print_validation_summary(
    w: &mut dyn Write,
    report: &ValidationReport,
    color: ColorMode,
) -> std::io::Result<()> {
    heading(w, "TEI checks", color)?;
    writeln!(w, "  {:<28} {}", "files parsed", report.checked)?;
    warn_line(w, "unparseable (skipped)", report.unparseable.len(), color)?;
    for (violation, count) in &report.violations {
        warn_line(w, &violation.to_string(), *count, color)?;
    }
    if report.is_clean() && color.enabled() {
        writeln!(w, "  {}", "all assumptions hold".green())?;
    } else if report.is_clean() {
        writeln!(w, "  all assumptions hold")?;
    }
    Ok(())
}

/// Print the summary after `extract`.
pub fn print_extract_summary(
    w: &mut dyn Write,
    report: &ExtractReport,
    output: &std::path::Path,
    color: ColorMode,
) -> std::io::Result<()> {
    print_validation_summary(w, &report.validation, color)?;
    writeln!(w)?;
    heading(w, "Extraction summary", color)?;
    warn_line(w, "refs without target", report.untargeted_refs, color)?;
    warn_line(w, "refs outside sentences", report.unplaced_refs, color)?;
    let written = format!(
        "  {:<28} {} -> {}",
        "contexts written",
        report.contexts_written,
        output.display()
    );
    if color.enabled() {
        writeln!(w, "{}", written.green())?;
    } else {
        writeln!(w, "{}", written)?;
    }
    Ok(())
}

/// Print the summary after `merge`, listing every dropped context.
pub fn print_merge_summary(
    w: &mut dyn Write,
    report: &MergeReport,
    color: ColorMode,
) -> std::io::Result<()> {
    for dropped in &report.dropped {
        let doi = dropped.doi.as_deref().unwrap_or("<no DOI>");
        if color.enabled() {
            writeln!(w, "{} {}", dropped.cited_id.dimmed(), doi.dimmed())?;
        } else {
            writeln!(w, "{} {}", dropped.cited_id, doi)?;
        }
    }
    heading(w, "Merge summary", color)?;
    warn_line(w, "misaligned rows (skipped)", report.misaligned_rows, color)?;
    writeln!(w, "  {:<28} {}", "contexts", report.contexts)?;
    writeln!(w, "  {:<28} {}", "annotated", report.annotated)?;
    writeln!(w, "  {:<28} {}", "merged", report.merged)?;
    warn_line(w, "dropped", report.dropped.len(), color)?;
    writeln!(w, "  {:<28} {}", "extended", report.extended)?;
    warn_line(w, "extended skipped", report.extended_skipped, color)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use citelink_core::merge::DroppedContext;

    fn render(f: impl FnOnce(&mut dyn Write) -> std::io::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_merge_summary_lists_dropped_contexts() {
        let report = MergeReport {
            contexts: 4,
            annotated: 3,
            merged: 1,
            dropped: vec![
                DroppedContext {
                    cited_id: "S9".into(),
                    doi: Some("10.9/x".into()),
                },
                DroppedContext {
                    cited_id: "S8".into(),
                    doi: None,
                },
            ],
            extended: 3,
            extended_skipped: 1,
            misaligned_rows: 2,
        };
        let out = render(|w| print_merge_summary(w, &report, ColorMode(false)));
        assert!(out.starts_with("S9 10.9/x\nS8 <no DOI>\n"));
        assert!(out.contains("dropped"));
        assert!(
            out.lines()
                .any(|l| l.contains("misaligned rows (skipped)") && l.ends_with(" 2"))
        );
        assert!(!out.contains('\u{1b}'));
    }

    #[test]
    fn test_link_summary_plain_has_no_escape_codes() {
        let report = LinkReport {
            above_threshold: 7,
            ..Default::default()
        };
        let out = render(|w| {
            print_link_summary(w, &report, std::path::Path::new("out.tsv"), ColorMode(false))
        });
        assert!(out.contains("7 -> out.tsv"));
        assert!(!out.contains('\u{1b}'));
    }

    #[test]
    fn test_extract_summary_counts_unplaced_refs() {
        let report = ExtractReport {
            contexts_written: 3,
            unplaced_refs: 2,
            ..Default::default()
        };
        let out = render(|w| {
            print_extract_summary(w, &report, std::path::Path::new("c.tsv"), ColorMode(false))
        });
        assert!(
            out.lines()
                .any(|l| l.contains("refs outside sentences") && l.ends_with(" 2"))
        );
        assert!(out.contains("3 -> c.tsv"));
    }

    #[test]
    fn test_clean_validation_summary() {
        let report = ValidationReport {
            checked: 2,
            ..Default::default()
        };
        let out = render(|w| print_validation_summary(w, &report, ColorMode(false)));
        assert!(out.contains("all assumptions hold"));
    }
}
