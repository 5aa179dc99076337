//! Download of resolved papers into the destination directory.
//!
//! A download is staged in a temp file next to its destination and renamed
//! into place once complete, so an interrupted run never leaves a truncated
//! PDF under the final name. An existing destination is never re-fetched.

pub mod mock;

use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::Duration;

use futures_util::StreamExt;
use thiserror::Error;

use crate::Config;
use crate::session::Session;

/// Why a single paper could not be fetched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("could not download {url}: HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("could not download {url}: {message}")]
    Transport { url: String, message: String },
    /// A write failed before the destination path was known to the source.
    #[error("write error: {0}")]
    Io(String),
    #[error("could not write to {}: {message}", path.display())]
    Write { path: PathBuf, message: String },
}

impl FetchError {
    fn at_path(self, path: &Path) -> Self {
        match self {
            FetchError::Io(message) => FetchError::Write {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        }
    }
}

/// Result of fetching one paper. Failures are values, not errors, so one
/// bad download never stops the rest of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Written { path: PathBuf, bytes: u64 },
    SkippedExisting { path: PathBuf },
    Failed { path: PathBuf, reason: FetchError },
}

/// A remote that can stream a PDF into a writer.
pub trait PdfSource: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Download `url` into `dest`, returning the number of bytes written.
    fn download<'a>(
        &'a self,
        url: &'a str,
        dest: &'a mut (dyn Write + Send),
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<u64, FetchError>> + Send + 'a>>;
}

/// Downloads over HTTP with the session's client.
pub struct HttpPdfSource {
    client: reqwest::Client,
}

impl HttpPdfSource {
    pub fn new(session: &Session) -> Self {
        Self {
            client: session.client().clone(),
        }
    }
}

impl PdfSource for HttpPdfSource {
    fn name(&self) -> &str {
        "HTTP"
    }

    fn download<'a>(
        &'a self,
        url: &'a str,
        dest: &'a mut (dyn Write + Send),
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<u64, FetchError>> + Send + 'a>> {
        Box::pin(async move {
            let transport = |e: reqwest::Error| FetchError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            };

            let resp = self
                .client
                .get(url)
                .timeout(timeout)
                .send()
                .await
                .map_err(transport)?;

            if !resp.status().is_success() {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: resp.status().as_u16(),
                });
            }

            let mut stream = resp.bytes_stream();
            let mut written: u64 = 0;
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(transport)?;
                dest.write_all(&chunk)
                    .map_err(|e| FetchError::Io(e.to_string()))?;
                written += chunk.len() as u64;
            }
            dest.flush().map_err(|e| FetchError::Io(e.to_string()))?;
            Ok(written)
        })
    }
}

/// How resolved papers map to URLs and files.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// PDF URL with an `{id}` placeholder.
    pub pdf_url_template: String,
    pub id_width: usize,
    pub timeout: Duration,
    pub sanitize_filenames: bool,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for FetchSettings {
    fn from(config: &Config) -> Self {
        Self {
            pdf_url_template: config.pdf_url_template.clone(),
            id_width: config.id_width,
            timeout: config.download_timeout(),
            sanitize_filenames: config.sanitize_filenames,
        }
    }
}

impl FetchSettings {
    /// PDF URL for a paper number, zero-padded to `id_width`.
    pub fn paper_url(&self, external_id: u32) -> String {
        let id = format!("{:0width$}", external_id, width = self.id_width);
        self.pdf_url_template.replace("{id}", &id)
    }

    /// `dest_dir/<title>.pdf`.
    pub fn destination(&self, dest_dir: &Path, title: &str) -> PathBuf {
        let name = if self.sanitize_filenames {
            sanitize_file_name(title)
        } else {
            title.to_string()
        };
        dest_dir.join(format!("{name}.pdf"))
    }
}

/// Replace characters that common filesystems reject in file names.
pub fn sanitize_file_name(title: &str) -> String {
    let replaced: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = replaced.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Fetch paper `external_id` into `dest_dir/<title>.pdf`.
///
/// Skips without any network I/O when the destination already exists.
/// Creates `dest_dir` and any missing parents on demand, and removes every
/// directory it created again when the download fails.
pub async fn fetch(
    source: &dyn PdfSource,
    settings: &FetchSettings,
    external_id: u32,
    title: &str,
    dest_dir: &Path,
) -> FetchOutcome {
    let path = settings.destination(dest_dir, title);
    if path.exists() {
        tracing::debug!(path = %path.display(), "skipping: file already exists");
        return FetchOutcome::SkippedExisting { path };
    }

    let url = settings.paper_url(external_id);
    let created_root = first_missing_dir(dest_dir);
    let failed = |path: PathBuf, reason: FetchError| {
        if let Some(root) = &created_root {
            remove_created_dirs(dest_dir, root);
        }
        tracing::warn!(url = %url, path = %path.display(), error = %reason, "fetch failed");
        FetchOutcome::Failed { path, reason }
    };

    if let Err(e) = std::fs::create_dir_all(dest_dir) {
        let reason = FetchError::Write {
            path: dest_dir.to_path_buf(),
            message: e.to_string(),
        };
        return failed(path, reason);
    }

    let mut staged = match tempfile::Builder::new()
        .prefix(".paperfetch-")
        .suffix(".part")
        .tempfile_in(dest_dir)
    {
        Ok(file) => file,
        Err(e) => {
            let reason = FetchError::Write {
                path: dest_dir.to_path_buf(),
                message: e.to_string(),
            };
            return failed(path, reason);
        }
    };

    tracing::debug!(source = source.name(), url = %url, "downloading");
    let downloaded = source
        .download(&url, staged.as_file_mut(), settings.timeout)
        .await;
    let bytes = match downloaded {
        Ok(bytes) => bytes,
        Err(reason) => {
            drop(staged);
            return failed(path.clone(), reason.at_path(&path));
        }
    };

    match staged.persist_noclobber(&path) {
        Ok(_) => {
            tracing::info!(path = %path.display(), bytes, "saved paper");
            FetchOutcome::Written { path, bytes }
        }
        Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
            FetchOutcome::SkippedExisting { path }
        }
        Err(e) => {
            let reason = FetchError::Write {
                path: path.clone(),
                message: e.error.to_string(),
            };
            drop(e.file);
            failed(path, reason)
        }
    }
}

/// Outermost ancestor of `dir` (or `dir` itself) that does not exist yet.
fn first_missing_dir(dir: &Path) -> Option<PathBuf> {
    dir.ancestors()
        .take_while(|d| !d.as_os_str().is_empty() && !d.exists())
        .last()
        .map(Path::to_path_buf)
}

/// Remove `dir` and its parents up to and including `root`.
/// Stops at the first directory that is not empty.
fn remove_created_dirs(dir: &Path, root: &Path) {
    for d in dir.ancestors() {
        if std::fs::remove_dir(d).is_err() || d == root {
            break;
        }
    }
}
