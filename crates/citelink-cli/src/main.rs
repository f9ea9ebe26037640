use std::path::{Path, PathBuf};

use citelink_core::config_file;
use citelink_core::merge::{MergePaths, run_merge};
use citelink_core::{Delimiters, LinkInputs, Projection, run_link};
use citelink_tei::{ExtractProgress, extract_directory, find_tei_files, validate_files};
use clap::{Parser, Subcommand};

mod output;

use output::ColorMode;

/// Citation context linker - Link citation sentences extracted from papers
/// to the known papers they cite
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Link extracted citation contexts to known cited papers
    Link {
        /// Scholar-ID map (result_id, doi, title)
        #[arg(long)]
        scholar_ids: Option<PathBuf>,

        /// Known paper metadata (DOI, title, authors, ...)
        #[arg(long)]
        metadata: Option<PathBuf>,

        /// Citation links (cited_id, citing_id)
        #[arg(long)]
        citations: Option<PathBuf>,

        /// Extracted citation contexts
        #[arg(long)]
        contexts: Option<PathBuf>,

        /// Path to the linked contexts output
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Field delimiter for every input (a single character, or `tab`).
        /// Without it, `.csv` inputs are comma-delimited and others tab-delimited
        #[arg(long)]
        delimiter: Option<String>,

        /// Field delimiter of the scholar-ID map
        #[arg(long)]
        scholar_ids_delimiter: Option<String>,

        /// Field delimiter of the metadata table
        #[arg(long)]
        metadata_delimiter: Option<String>,

        /// Field delimiter of the citation links
        #[arg(long)]
        citations_delimiter: Option<String>,

        /// Field delimiter of the citation contexts
        #[arg(long)]
        contexts_delimiter: Option<String>,

        /// Also write the raw edit distance column
        #[arg(long)]
        with_title_dist: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// Extract citation contexts from a directory of GROBID TEI files
    Extract {
        /// Directory containing `<scholar_id>.<version>.xml` TEI files
        tei_dir: PathBuf,

        /// Path to the citation contexts output
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// Check TEI files against the assumptions extraction relies on
    Validate {
        /// Directory containing TEI files
        tei_dir: PathBuf,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// Merge hand-annotated contexts with one-hot paper metadata
    Merge {
        /// Annotated contexts (comma-delimited)
        #[arg(long)]
        contexts: Option<PathBuf>,

        /// Scholar-ID map (result_id, doi)
        #[arg(long)]
        scholar_ids: Option<PathBuf>,

        /// One-hot metadata keyed by DOI
        #[arg(long)]
        metadata: Option<PathBuf>,

        /// Directory for the merged and extended outputs
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = config_file::load_config();

    match cli.command {
        Command::Link {
            scholar_ids,
            metadata,
            citations,
            contexts,
            output,
            delimiter,
            scholar_ids_delimiter,
            metadata_delimiter,
            citations_delimiter,
            contexts_delimiter,
            with_title_dist,
            no_color,
        } => {
            // Resolve configuration: CLI flags > env vars > config file > defaults
            let shared = delimiter.or_else(|| std::env::var("CITELINK_DELIMITER").ok());
            let delimiters = Delimiters {
                scholar_ids: resolve_delimiter(
                    scholar_ids_delimiter,
                    "CITELINK_SCHOLAR_IDS_DELIMITER",
                    shared.as_deref(),
                )?,
                metadata: resolve_delimiter(
                    metadata_delimiter,
                    "CITELINK_METADATA_DELIMITER",
                    shared.as_deref(),
                )?,
                citations: resolve_delimiter(
                    citations_delimiter,
                    "CITELINK_CITATIONS_DELIMITER",
                    shared.as_deref(),
                )?,
                contexts: resolve_delimiter(
                    contexts_delimiter,
                    "CITELINK_CONTEXTS_DELIMITER",
                    shared.as_deref(),
                )?,
            }
            .or(config.delimiters());
            let inputs = LinkInputs {
                scholar_ids: resolve(scholar_ids, "CITELINK_SCHOLAR_IDS", || config.scholar_ids()),
                metadata: resolve(metadata, "CITELINK_METADATA", || config.metadata()),
                citations: resolve(citations, "CITELINK_CITATIONS", || config.citations()),
                contexts: resolve(contexts, "CITELINK_CONTEXTS", || config.contexts()),
                delimiters,
            };
            let output = resolve(output, "CITELINK_OUTPUT", || config.linked_contexts());
            let projection = if with_title_dist || config.with_title_dist() {
                Projection::WithTitleDist
            } else {
                Projection::Standard
            };
            link(&inputs, &output, projection, ColorMode(!no_color))
        }
        Command::Extract {
            tei_dir,
            output,
            no_color,
        } => {
            let output = resolve(output, "CITELINK_CONTEXTS", || config.contexts());
            extract(&tei_dir, &output, ColorMode(!no_color))
        }
        Command::Validate { tei_dir, no_color } => validate(&tei_dir, ColorMode(!no_color)),
        Command::Merge {
            contexts,
            scholar_ids,
            metadata,
            out_dir,
            no_color,
        } => {
            let contexts = resolve(contexts, "CITELINK_MERGE_CONTEXTS", || {
                config.merge_contexts()
            });
            let scholar_ids = resolve(scholar_ids, "CITELINK_MERGE_SCHOLAR_IDS", || {
                config.merge_scholar_ids()
            });
            let metadata = resolve(metadata, "CITELINK_MERGE_METADATA", || {
                config.merge_metadata()
            });
            let out_dir = resolve(out_dir, "CITELINK_MERGE_OUT_DIR", || config.merge_out_dir());
            merge(
                &MergePaths {
                    contexts: &contexts,
                    scholar_ids: &scholar_ids,
                    metadata: &metadata,
                    out_dir: &out_dir,
                },
                ColorMode(!no_color),
            )
        }
    }
}

/// CLI flag, then environment variable, then config/default.
fn resolve(flag: Option<PathBuf>, env: &str, fallback: impl FnOnce() -> PathBuf) -> PathBuf {
    flag.or_else(|| std::env::var(env).ok().map(PathBuf::from))
        .unwrap_or_else(fallback)
}

/// Table flag, then table environment variable, then the shared delimiter.
/// `None` leaves the choice to the config file or the file extension.
fn resolve_delimiter(
    flag: Option<String>,
    env: &str,
    shared: Option<&str>,
) -> anyhow::Result<Option<u8>> {
    let value = flag
        .or_else(|| std::env::var(env).ok())
        .or_else(|| shared.map(str::to_string));
    value
        .map(|d| {
            config_file::parse_delimiter(&d)
                .ok_or_else(|| anyhow::anyhow!("invalid delimiter {:?}", d))
        })
        .transpose()
}

fn link(
    inputs: &LinkInputs,
    output: &Path,
    projection: Projection,
    color: ColorMode,
) -> anyhow::Result<()> {
    tracing::debug!(?inputs, output = %output.display(), "resolved link paths");
    let report = run_link(inputs, output, projection)?;
    output::print_link_summary(&mut std::io::stdout(), &report, output, color)?;
    Ok(())
}

fn extract(tei_dir: &Path, output: &Path, color: ColorMode) -> anyhow::Result<()> {
    use indicatif::{ProgressBar, ProgressStyle};

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg} [{bar:40.green/dim}] {pos}/{len}")?
            .progress_chars("=> "),
    );

    let report = extract_directory(tei_dir, output, |event| match event {
        ExtractProgress::Started { files } => {
            bar.set_length(files as u64);
            bar.set_message("Extracting");
        }
        ExtractProgress::FileDone { path, .. } | ExtractProgress::FileSkipped { path } => {
            if let Some(name) = path.file_name() {
                bar.set_message(name.to_string_lossy().into_owned());
            }
            bar.inc(1);
        }
    });
    bar.finish_and_clear();

    let report = report?;
    output::print_extract_summary(&mut std::io::stdout(), &report, output, color)?;
    Ok(())
}

fn validate(tei_dir: &Path, color: ColorMode) -> anyhow::Result<()> {
    let files = find_tei_files(tei_dir)?;
    if files.is_empty() {
        anyhow::bail!("No TEI files found in {}", tei_dir.display());
    }
    let report = validate_files(&files);
    output::print_validation_summary(&mut std::io::stdout(), &report, color)?;
    Ok(())
}

fn merge(paths: &MergePaths<'_>, color: ColorMode) -> anyhow::Result<()> {
    let report = run_merge(paths)?;
    output::print_merge_summary(&mut std::io::stdout(), &report, color)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flag_wins_over_fallback() {
        let path = resolve(
            Some(PathBuf::from("flag.tsv")),
            "CITELINK_TEST_UNSET_VARIABLE",
            || PathBuf::from("default.tsv"),
        );
        assert_eq!(path, PathBuf::from("flag.tsv"));
    }

    #[test]
    fn test_fallback_used_when_flag_and_env_absent() {
        let path = resolve(None, "CITELINK_TEST_UNSET_VARIABLE", || {
            PathBuf::from("default.tsv")
        });
        assert_eq!(path, PathBuf::from("default.tsv"));
    }

    #[test]
    fn test_table_delimiter_flag_beats_shared() {
        let d = resolve_delimiter(
            Some(",".into()),
            "CITELINK_TEST_UNSET_VARIABLE",
            Some("tab"),
        )
        .unwrap();
        assert_eq!(d, Some(b','));

        let d = resolve_delimiter(None, "CITELINK_TEST_UNSET_VARIABLE", Some("tab")).unwrap();
        assert_eq!(d, Some(b'\t'));

        let d = resolve_delimiter(None, "CITELINK_TEST_UNSET_VARIABLE", None).unwrap();
        assert_eq!(d, None);

        assert!(resolve_delimiter(Some("ab".into()), "CITELINK_TEST_UNSET_VARIABLE", None).is_err());
    }

    #[test]
    fn test_link_subcommand_parses() {
        let cli = Cli::try_parse_from([
            "citelink",
            "link",
            "--contexts",
            "c.tsv",
            "-o",
            "out.tsv",
            "--with-title-dist",
        ])
        .unwrap();
        match cli.command {
            Command::Link {
                contexts,
                output,
                with_title_dist,
                scholar_ids,
                ..
            } => {
                assert_eq!(contexts, Some(PathBuf::from("c.tsv")));
                assert_eq!(output, Some(PathBuf::from("out.tsv")));
                assert!(with_title_dist);
                assert_eq!(scholar_ids, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
