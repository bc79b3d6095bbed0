//! Run configuration: CLI/env flags, the optional JSON config file and the
//! output directory layout.

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::catalog::CandidateSource;

pub const DEFAULT_DOWNLOAD_URL: &str = "https://www.baldor.com/api/products/download/?value=";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("the unique config must be a list of product ids, not {0}")]
    CandidateIdsNotSequence(Value),

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Parser)]
#[command(name = "catalog-scraper", about = "Extract product records from the vendor catalog")]
pub struct Cli {
    /// JSON config file; flags below override its values
    #[arg(short, long, env = "SCRAPER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Randomly sample this many products from the catalog
    #[arg(short = 'n', long, env = "SCRAPING_LIMIT")]
    pub limit: Option<usize>,

    /// Scrape exactly these product ids (comma separated)
    #[arg(long, env = "PRODUCT_IDS", value_delimiter = ',')]
    pub ids: Option<Vec<String>>,

    /// Skip products that already have a metadata file
    #[arg(long, env = "ONLY_NEW")]
    pub only_new: bool,

    /// Log to stderr instead of showing a progress bar
    #[arg(short, long, env = "LOG_VERBOSE")]
    pub verbose: bool,

    /// Also write log lines to this file
    #[arg(long, env = "LOG_OUTPUT")]
    pub log_output: Option<PathBuf>,

    /// Base URL for CAD downloads; the file key is appended
    #[arg(long, env = "DOWNLOAD_URL")]
    pub download_url: Option<String>,

    /// Root of the metadata/ and assets/ trees
    #[arg(long, env = "OUTPUT_ROOT")]
    pub output_root: Option<PathBuf>,
}

/// Shape of the JSON config file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub scraping_limit: Option<usize>,
    pub unique: Option<Value>,
    pub only_new: bool,
    pub log_verbose: bool,
    pub log_output: Option<PathBuf>,
    pub default_url_download: Option<String>,
    pub output_root: Option<PathBuf>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Validated settings for one run.
#[derive(Debug, Clone)]
pub struct Config {
    pub source: CandidateSource,
    pub only_new: bool,
    pub log_verbose: bool,
    pub log_output: Option<PathBuf>,
    pub download_url: String,
    pub layout: OutputLayout,
}

impl Config {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::merge(cli, file)
    }

    fn merge(cli: Cli, file: FileConfig) -> Result<Self, ConfigError> {
        let explicit = match cli.ids {
            Some(ids) => Some(ids),
            None => file.unique.as_ref().map(explicit_ids_from_value).transpose()?.flatten(),
        };
        let source = match explicit {
            Some(ids) => CandidateSource::Explicit(ids),
            None => CandidateSource::Catalog {
                limit: cli.limit.or(file.scraping_limit),
            },
        };

        let root = cli
            .output_root
            .or(file.output_root)
            .unwrap_or_else(|| PathBuf::from("output"));

        Ok(Self {
            source,
            only_new: cli.only_new || file.only_new,
            log_verbose: cli.verbose || file.log_verbose,
            log_output: cli.log_output.or(file.log_output),
            download_url: cli
                .download_url
                .or(file.default_url_download)
                .unwrap_or_else(|| DEFAULT_DOWNLOAD_URL.to_string()),
            layout: OutputLayout::new(root),
        })
    }
}

/// Validates the `unique` config value: null means "use the catalog",
/// otherwise it must be an array of strings.
pub fn explicit_ids_from_value(value: &Value) -> Result<Option<Vec<String>>, ConfigError> {
    match value {
        Value::Null => Ok(None),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(id) => Ok(id.clone()),
                _ => Err(ConfigError::CandidateIdsNotSequence(value.clone())),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        other => Err(ConfigError::CandidateIdsNotSequence(other.clone())),
    }
}

/// True when `name` is one plain path component: not empty, no separators,
/// not `.` or `..`.
pub fn is_plain_component(name: &str) -> bool {
    let path = Path::new(name);
    path.file_name().is_some_and(|file| file == path.as_os_str())
}

/// `<root>/metadata/<id>.json` and `<root>/assets/<id>/...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    pub root: PathBuf,
    pub assets: PathBuf,
    pub metadata: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            assets: root.join("assets"),
            metadata: root.join("metadata"),
            root,
        }
    }

    /// Creates the output directories. Safe to call repeatedly.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.assets)?;
        std::fs::create_dir_all(&self.metadata)
    }

    pub fn product_assets(&self, product_id: &str) -> PathBuf {
        self.assets.join(product_id)
    }

    pub fn metadata_file(&self, product_id: &str) -> PathBuf {
        self.metadata.join(format!("{product_id}.json"))
    }

    /// Path relative to the output root with `/` separators, as stored in records.
    pub fn relative(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("catalog-scraper").chain(args.iter().copied()))
    }

    #[test]
    fn unique_accepts_string_arrays_and_null() {
        assert_eq!(
            explicit_ids_from_value(&json!(["A", "B"])).unwrap(),
            Some(vec!["A".to_string(), "B".to_string()])
        );
        assert_eq!(explicit_ids_from_value(&Value::Null).unwrap(), None);
    }

    #[test]
    fn unique_rejects_non_sequences() {
        for bad in [json!("M3211T"), json!({"id": "A"}), json!(3), json!(["A", 1])] {
            assert!(matches!(
                explicit_ids_from_value(&bad),
                Err(ConfigError::CandidateIdsNotSequence(_))
            ));
        }
    }

    #[test]
    fn explicit_ids_ignore_the_limit() {
        let file = FileConfig {
            scraping_limit: Some(5),
            unique: Some(json!(["A"])),
            ..FileConfig::default()
        };
        let config = Config::merge(cli(&[]), file).unwrap();
        assert_eq!(config.source, CandidateSource::Explicit(vec!["A".to_string()]));
    }

    #[test]
    fn flags_override_file_values() {
        let file = FileConfig {
            scraping_limit: Some(5),
            output_root: Some(PathBuf::from("from-file")),
            ..FileConfig::default()
        };
        let config = Config::merge(cli(&["-n", "2", "--output-root", "out"]), file).unwrap();

        assert_eq!(config.source, CandidateSource::Catalog { limit: Some(2) });
        assert_eq!(config.layout.root, PathBuf::from("out"));
        assert_eq!(config.download_url, DEFAULT_DOWNLOAD_URL);
    }

    #[test]
    fn ids_flag_splits_on_commas() {
        let config = Config::merge(cli(&["--ids", "A,B"]), FileConfig::default()).unwrap();
        assert_eq!(
            config.source,
            CandidateSource::Explicit(vec!["A".to_string(), "B".to_string()])
        );
    }

    #[test]
    fn plain_components_exclude_separators_and_dot_dirs() {
        assert!(is_plain_component("M3211T"));
        assert!(is_plain_component("M3211T.stp"));
        for bad in ["", ".", "..", "../x", "a/b", "/abs", "a/"] {
            assert!(!is_plain_component(bad), "{bad:?} accepted");
        }
    }

    #[test]
    fn relative_paths_drop_the_output_root() {
        let layout = OutputLayout::new("output");
        let img = layout.product_assets("M3211T").join("img.jpg");
        assert_eq!(layout.relative(&img), "assets/M3211T/img.jpg");
    }
}
