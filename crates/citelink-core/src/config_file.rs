use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::pipeline::Delimiters;

pub const DEFAULT_SCHOLAR_IDS: &str = "citation_data/scholar-ids.tsv";
pub const DEFAULT_METADATA: &str = "citation_data/all-data.tsv";
pub const DEFAULT_CITATIONS: &str = "citation_data/citing-docs.tsv";
pub const DEFAULT_CONTEXTS: &str = "citation_contexts/citation_contexts.tsv";
pub const DEFAULT_LINKED_CONTEXTS: &str = "citation_contexts/linked-citation_contexts.tsv";
pub const DEFAULT_ANNOTATED_CONTEXTS: &str = "citation-contexts.csv";
pub const DEFAULT_MERGE_SCHOLAR_IDS: &str = "chiir2024.all-scholar-IDs.tsv";
pub const DEFAULT_ONE_HOT_METADATA: &str = "all-data.one-hot.tsv";

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub inputs: Option<InputsConfig>,
    pub output: Option<OutputConfig>,
    pub merge: Option<MergeConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputsConfig {
    pub scholar_ids: Option<String>,
    pub metadata: Option<String>,
    pub citations: Option<String>,
    pub contexts: Option<String>,
    /// Delimiter for every input table. Unset tables infer theirs from the
    /// file extension (`.csv` is comma, anything else tab).
    pub delimiter: Option<String>,
    pub scholar_ids_delimiter: Option<String>,
    pub metadata_delimiter: Option<String>,
    pub citations_delimiter: Option<String>,
    pub contexts_delimiter: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    pub linked_contexts: Option<String>,
    pub with_title_dist: Option<bool>,
}

/// Inputs of the annotation merge, which uses its own file set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeConfig {
    pub contexts: Option<String>,
    pub scholar_ids: Option<String>,
    pub metadata: Option<String>,
    pub out_dir: Option<String>,
}

/// Platform config directory path: `<config_dir>/citelink/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("citelink").join("config.toml"))
}

/// Load config by cascading CWD `.citelink.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".citelink.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparseable config file");
            None
        }
    }
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    let base_in = base.inputs.unwrap_or_default();
    let over_in = overlay.inputs.unwrap_or_default();
    let base_out = base.output.unwrap_or_default();
    let over_out = overlay.output.unwrap_or_default();
    let base_merge = base.merge.unwrap_or_default();
    let over_merge = overlay.merge.unwrap_or_default();

    ConfigFile {
        inputs: Some(InputsConfig {
            scholar_ids: over_in.scholar_ids.or(base_in.scholar_ids),
            metadata: over_in.metadata.or(base_in.metadata),
            citations: over_in.citations.or(base_in.citations),
            contexts: over_in.contexts.or(base_in.contexts),
            delimiter: over_in.delimiter.or(base_in.delimiter),
            scholar_ids_delimiter: over_in
                .scholar_ids_delimiter
                .or(base_in.scholar_ids_delimiter),
            metadata_delimiter: over_in.metadata_delimiter.or(base_in.metadata_delimiter),
            citations_delimiter: over_in.citations_delimiter.or(base_in.citations_delimiter),
            contexts_delimiter: over_in.contexts_delimiter.or(base_in.contexts_delimiter),
        }),
        output: Some(OutputConfig {
            linked_contexts: over_out.linked_contexts.or(base_out.linked_contexts),
            with_title_dist: over_out.with_title_dist.or(base_out.with_title_dist),
        }),
        merge: Some(MergeConfig {
            contexts: over_merge.contexts.or(base_merge.contexts),
            scholar_ids: over_merge.scholar_ids.or(base_merge.scholar_ids),
            metadata: over_merge.metadata.or(base_merge.metadata),
            out_dir: over_merge.out_dir.or(base_merge.out_dir),
        }),
    }
}

/// Parse a delimiter setting. Accepts a single byte or the escapes `\t`
/// and `tab`.
pub fn parse_delimiter(value: &str) -> Option<u8> {
    match value {
        "\\t" | "tab" => Some(b'\t'),
        s if s.len() == 1 => s.bytes().next(),
        _ => None,
    }
}

impl ConfigFile {
    pub fn scholar_ids(&self) -> PathBuf {
        self.input(|i| i.scholar_ids.as_deref(), DEFAULT_SCHOLAR_IDS)
    }

    pub fn metadata(&self) -> PathBuf {
        self.input(|i| i.metadata.as_deref(), DEFAULT_METADATA)
    }

    pub fn citations(&self) -> PathBuf {
        self.input(|i| i.citations.as_deref(), DEFAULT_CITATIONS)
    }

    pub fn contexts(&self) -> PathBuf {
        self.input(|i| i.contexts.as_deref(), DEFAULT_CONTEXTS)
    }

    /// Per-table delimiters; a table-specific key beats the shared
    /// `delimiter`. Unparseable values are ignored.
    pub fn delimiters(&self) -> Delimiters {
        let Some(inputs) = self.inputs.as_ref() else {
            return Delimiters::default();
        };
        let pick = |specific: &Option<String>| {
            specific
                .as_deref()
                .or(inputs.delimiter.as_deref())
                .and_then(parse_delimiter)
        };
        Delimiters {
            scholar_ids: pick(&inputs.scholar_ids_delimiter),
            metadata: pick(&inputs.metadata_delimiter),
            citations: pick(&inputs.citations_delimiter),
            contexts: pick(&inputs.contexts_delimiter),
        }
    }

    pub fn linked_contexts(&self) -> PathBuf {
        PathBuf::from(
            self.output
                .as_ref()
                .and_then(|o| o.linked_contexts.as_deref())
                .unwrap_or(DEFAULT_LINKED_CONTEXTS),
        )
    }

    pub fn with_title_dist(&self) -> bool {
        self.output
            .as_ref()
            .and_then(|o| o.with_title_dist)
            .unwrap_or(false)
    }

    pub fn merge_contexts(&self) -> PathBuf {
        self.merge_input(|m| m.contexts.as_deref(), DEFAULT_ANNOTATED_CONTEXTS)
    }

    pub fn merge_scholar_ids(&self) -> PathBuf {
        self.merge_input(|m| m.scholar_ids.as_deref(), DEFAULT_MERGE_SCHOLAR_IDS)
    }

    pub fn merge_metadata(&self) -> PathBuf {
        self.merge_input(|m| m.metadata.as_deref(), DEFAULT_ONE_HOT_METADATA)
    }

    /// Defaults to the working directory.
    pub fn merge_out_dir(&self) -> PathBuf {
        self.merge_input(|m| m.out_dir.as_deref(), ".")
    }

    fn merge_input(&self, get: impl Fn(&MergeConfig) -> Option<&str>, default: &str) -> PathBuf {
        PathBuf::from(self.merge.as_ref().and_then(get).unwrap_or(default))
    }

    fn input(&self, get: impl Fn(&InputsConfig) -> Option<&str>, default: &str) -> PathBuf {
        PathBuf::from(self.inputs.as_ref().and_then(get).unwrap_or(default))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inputs_round_trip_toml() {
        let config = ConfigFile {
            inputs: Some(InputsConfig {
                contexts: Some("/tmp/contexts.tsv".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: ConfigFile = toml::from_str(&toml_str).unwrap();
        assert_eq!(
            parsed.inputs.unwrap().contexts.unwrap(),
            "/tmp/contexts.tsv"
        );
    }

    #[test]
    fn absent_sections_fall_back_to_defaults() {
        let parsed: ConfigFile = toml::from_str("[output]\nwith_title_dist = true\n").unwrap();
        assert!(parsed.with_title_dist());
        assert_eq!(parsed.scholar_ids(), PathBuf::from(DEFAULT_SCHOLAR_IDS));
        assert_eq!(parsed.linked_contexts(), PathBuf::from(DEFAULT_LINKED_CONTEXTS));
        assert_eq!(parsed.delimiters(), Delimiters::default());
    }

    #[test]
    fn merge_overlay_wins() {
        let base = ConfigFile {
            inputs: Some(InputsConfig {
                metadata: Some("/base/meta.tsv".to_string()),
                citations: Some("/base/cites.tsv".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let overlay = ConfigFile {
            inputs: Some(InputsConfig {
                metadata: Some("/overlay/meta.tsv".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let merged = merge(base, overlay);
        assert_eq!(merged.metadata(), PathBuf::from("/overlay/meta.tsv"));
        assert_eq!(merged.citations(), PathBuf::from("/base/cites.tsv"));
    }

    #[test]
    fn merge_base_preserved_when_overlay_absent() {
        let base = ConfigFile {
            output: Some(OutputConfig {
                with_title_dist: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };
        let merged = merge(base, ConfigFile::default());
        assert!(merged.with_title_dist());
    }

    #[test]
    fn merge_section_overrides_defaults() {
        let parsed: ConfigFile =
            toml::from_str("[merge]\nmetadata = \"/data/one-hot.tsv\"\n").unwrap();
        assert_eq!(parsed.merge_metadata(), PathBuf::from("/data/one-hot.tsv"));
        assert_eq!(
            parsed.merge_contexts(),
            PathBuf::from(DEFAULT_ANNOTATED_CONTEXTS)
        );
        assert_eq!(parsed.merge_out_dir(), PathBuf::from("."));
    }

    #[test]
    fn table_delimiter_beats_shared_delimiter() {
        let parsed: ConfigFile = toml::from_str(
            "[inputs]\ndelimiter = \"tab\"\ncontexts_delimiter = \",\"\n",
        )
        .unwrap();
        let delimiters = parsed.delimiters();
        assert_eq!(delimiters.contexts, Some(b','));
        assert_eq!(delimiters.metadata, Some(b'\t'));
        assert_eq!(delimiters.scholar_ids, Some(b'\t'));
    }

    #[test]
    fn delimiter_parsing() {
        assert_eq!(parse_delimiter("\\t"), Some(b'\t'));
        assert_eq!(parse_delimiter("tab"), Some(b'\t'));
        assert_eq!(parse_delimiter("\t"), Some(b'\t'));
        assert_eq!(parse_delimiter(","), Some(b','));
        assert_eq!(parse_delimiter(",;"), None);
    }

    #[test]
    fn load_from_path_ignores_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[inputs\nbroken").unwrap();
        assert!(load_from_path(&path).is_none());

        std::fs::write(&path, "[inputs]\ndelimiter = \",\"\n").unwrap();
        assert_eq!(
            load_from_path(&path).unwrap().delimiters(),
            Delimiters::uniform(b',')
        );
    }
}
