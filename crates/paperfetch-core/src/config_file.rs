use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::matching::ScoreUnit;

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub confer: Option<ConferConfig>,
    pub proceedings: Option<ProceedingsConfig>,
    pub matching: Option<MatchingConfig>,
    pub download: Option<DownloadConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConferConfig {
    pub base_url: Option<String>,
    pub conference: Option<String>,
    pub user: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProceedingsConfig {
    pub index_url: Option<String>,
    pub pdf_url_template: Option<String>,
    pub id_width: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchingConfig {
    pub score_unit: Option<ScoreUnit>,
    pub fold_titles: Option<bool>,
    pub low_confidence_threshold: Option<f64>,
    pub ambiguity_margin: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DownloadConfig {
    pub directory: Option<String>,
    pub timeout_secs: Option<u64>,
    pub sanitize_filenames: Option<bool>,
}

/// Platform config directory path: `<config_dir>/paperfetch/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("paperfetch").join("config.toml"))
}

/// Load config by cascading CWD `.paperfetch.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".paperfetch.toml"));

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
            tracing::warn!(path = %path.display(), error = %e, "ignoring malformed config file");
            None
        }
    }
}

/// Value from `overlay` if set there, else from `base`.
fn pick<S, T>(overlay: Option<&S>, base: Option<&S>, field: impl Fn(&S) -> Option<T>) -> Option<T> {
    overlay.and_then(&field).or_else(|| base.and_then(&field))
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    let (bc, oc) = (base.confer.as_ref(), overlay.confer.as_ref());
    let (bp, op) = (base.proceedings.as_ref(), overlay.proceedings.as_ref());
    let (bm, om) = (base.matching.as_ref(), overlay.matching.as_ref());
    let (bd, od) = (base.download.as_ref(), overlay.download.as_ref());

    ConfigFile {
        confer: Some(ConferConfig {
            base_url: pick(oc, bc, |c| c.base_url.clone()),
            conference: pick(oc, bc, |c| c.conference.clone()),
            user: pick(oc, bc, |c| c.user.clone()),
        }),
        proceedings: Some(ProceedingsConfig {
            index_url: pick(op, bp, |p| p.index_url.clone()),
            pdf_url_template: pick(op, bp, |p| p.pdf_url_template.clone()),
            id_width: pick(op, bp, |p| p.id_width),
        }),
        matching: Some(MatchingConfig {
            score_unit: pick(om, bm, |m| m.score_unit),
            fold_titles: pick(om, bm, |m| m.fold_titles),
            low_confidence_threshold: pick(om, bm, |m| m.low_confidence_threshold),
            ambiguity_margin: pick(om, bm, |m| m.ambiguity_margin),
        }),
        download: Some(DownloadConfig {
            directory: pick(od, bd, |d| d.directory.clone()),
            timeout_secs: pick(od, bd, |d| d.timeout_secs),
            sanitize_filenames: pick(od, bd, |d| d.sanitize_filenames),
        }),
    }
}
