use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub mod catalog;
pub mod config_file;
pub mod driver;
pub mod fetch;
pub mod likes;
pub mod matching;
pub mod session;

// Re-export for convenience
pub use catalog::{CatalogEntry, load_catalog, parse_catalog};
pub use driver::{
    DriverEvent, ItemReport, ItemStatus, LikedPapers, RunOptions, RunSummary, SkipReason,
    download_liked_papers,
};
pub use fetch::{FetchError, FetchOutcome, FetchSettings, HttpPdfSource, PdfSource, fetch};
pub use likes::{PaperId, PaperIndex, PaperRecord};
pub use matching::{
    MatchFlags, MatchOptions, MatchThresholds, RankedCandidate, Resolution, ScoreUnit, resolve,
    resolve_with,
};
pub use session::{Credentials, Session};

/// Default Confer instance.
pub const DEFAULT_CONFER_URL: &str = "http://confer.csail.mit.edu";
/// Default conference slug on Confer.
pub const DEFAULT_CONFERENCE: &str = "ijcai2016";
/// Default proceedings index listing every published paper.
pub const DEFAULT_PROCEEDINGS_URL: &str = "http://ijcai.org/proceedings/2016";
/// Default PDF location; `{id}` is replaced by the zero-padded paper number.
pub const DEFAULT_PDF_URL_TEMPLATE: &str = "http://ijcai.org/Proceedings/16/Papers/{id}.pdf";

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("parse error: {0}")]
    Parse(String),
}

/// Runtime configuration, resolved from defaults, config files, env and flags.
#[derive(Debug, Clone)]
pub struct Config {
    pub confer_url: String,
    pub conference: String,
    pub proceedings_url: String,
    pub pdf_url_template: String,
    /// Zero-padding width for the paper number in `pdf_url_template`.
    pub id_width: usize,
    pub download_dir: PathBuf,
    pub download_timeout_secs: u64,
    /// Replace characters that are not allowed in file names. Off by default:
    /// titles are used verbatim.
    pub sanitize_filenames: bool,
    pub match_options: MatchOptions,
    /// Confer user name taken from the config file, if any.
    pub user: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            confer_url: DEFAULT_CONFER_URL.to_string(),
            conference: DEFAULT_CONFERENCE.to_string(),
            proceedings_url: DEFAULT_PROCEEDINGS_URL.to_string(),
            pdf_url_template: DEFAULT_PDF_URL_TEMPLATE.to_string(),
            id_width: 3,
            download_dir: PathBuf::from("./papers"),
            download_timeout_secs: 60,
            sanitize_filenames: false,
            match_options: MatchOptions::default(),
            user: None,
        }
    }
}

impl Config {
    /// Apply the values present in `file` over the built-in defaults.
    pub fn from_file(file: &config_file::ConfigFile) -> Result<Self, CoreError> {
        let mut config = Config::default();

        if let Some(confer) = &file.confer {
            if let Some(url) = &confer.base_url {
                config.confer_url = url.trim_end_matches('/').to_string();
            }
            if let Some(conference) = &confer.conference {
                config.conference = conference.clone();
            }
            config.user = confer.user.clone();
        }

        if let Some(proceedings) = &file.proceedings {
            if let Some(url) = &proceedings.index_url {
                config.proceedings_url = url.clone();
            }
            if let Some(template) = &proceedings.pdf_url_template {
                if !template.contains("{id}") {
                    return Err(CoreError::InvalidInput(format!(
                        "pdf_url_template must contain {{id}}: {template}"
                    )));
                }
                config.pdf_url_template = template.clone();
            }
            if let Some(width) = proceedings.id_width {
                config.id_width = width;
            }
        }

        if let Some(matching) = &file.matching {
            let options = &mut config.match_options;
            if let Some(unit) = matching.score_unit {
                options.unit = unit;
            }
            if let Some(fold) = matching.fold_titles {
                options.fold_titles = fold;
            }
            if let Some(threshold) = matching.low_confidence_threshold {
                options.thresholds.low_confidence =
                    unit_interval("low_confidence_threshold", threshold)?;
            }
            if let Some(margin) = matching.ambiguity_margin {
                options.thresholds.ambiguity_margin = unit_interval("ambiguity_margin", margin)?;
            }
        }

        if let Some(download) = &file.download {
            if let Some(dir) = &download.directory {
                config.download_dir = PathBuf::from(dir);
            }
            if let Some(secs) = download.timeout_secs {
                config.download_timeout_secs = secs;
            }
            if let Some(sanitize) = download.sanitize_filenames {
                config.sanitize_filenames = sanitize;
            }
        }

        Ok(config)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs.max(1))
    }
}

fn unit_interval(name: &str, value: f64) -> Result<f64, CoreError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(CoreError::InvalidInput(format!(
            "{name} must be between 0 and 1, got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_file::{ConfigFile, DownloadConfig, MatchingConfig, ProceedingsConfig};

    #[test]
    fn empty_file_yields_defaults() {
        let config = Config::from_file(&ConfigFile::default()).unwrap();
        assert_eq!(config.confer_url, DEFAULT_CONFER_URL);
        assert_eq!(config.download_dir, PathBuf::from("./papers"));
        assert_eq!(config.id_width, 3);
        assert_eq!(config.match_options.unit, ScoreUnit::Bytes);
        assert!(!config.sanitize_filenames);
    }

    #[test]
    fn file_values_override_defaults() {
        let file = ConfigFile {
            matching: Some(MatchingConfig {
                score_unit: Some(ScoreUnit::Chars),
                ambiguity_margin: Some(0.05),
                ..Default::default()
            }),
            download: Some(DownloadConfig {
                directory: Some("/tmp/papers".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let config = Config::from_file(&file).unwrap();
        assert_eq!(config.match_options.unit, ScoreUnit::Chars);
        assert_eq!(config.match_options.thresholds.ambiguity_margin, 0.05);
        assert_eq!(config.match_options.thresholds.low_confidence, 0.6);
        assert_eq!(config.download_dir, PathBuf::from("/tmp/papers"));
    }

    #[test]
    fn out_of_range_threshold_rejected() {
        let file = ConfigFile {
            matching: Some(MatchingConfig {
                low_confidence_threshold: Some(1.5),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(matches!(
            Config::from_file(&file),
            Err(CoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn template_without_placeholder_rejected() {
        let file = ConfigFile {
            proceedings: Some(ProceedingsConfig {
                pdf_url_template: Some("http://example.org/paper.pdf".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(Config::from_file(&file).is_err());
    }
}
