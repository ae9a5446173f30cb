//! Download links for source documents.
//!
//! Retrieved chunks carry the path of the processed file they came from,
//! which rarely matches the original file users can download. The resolver
//! maps a source path back to a file under the public data directory.

use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use walkdir::WalkDir;

/// Keywords tried when no name-based match exists.
const FALLBACK_KEYWORDS: &[&str] = &[
    "requirement",
    "spec",
    "contract",
    "template",
    "manual",
    "process",
    "workflow",
];

const RAW_DATA_PREFIX: &str = "data_raw_data_";

/// Last path segment, accepting both `/` and `\` separators.
fn basename(source: &str) -> &str {
    source.rsplit(['/', '\\']).next().unwrap_or(source)
}

fn strip_md(name: &str) -> &str {
    name.strip_suffix(".md").unwrap_or(name)
}

/// The name shown to users for a source path.
///
/// Basename without a trailing `.md` and without the `data_raw_data_` prefix.
pub fn display_name(source: &str) -> String {
    let name = strip_md(basename(source));
    name.strip_prefix(RAW_DATA_PREFIX).unwrap_or(name).to_string()
}

/// Maps source paths to files under the public data directory.
#[derive(Debug, Clone)]
pub struct DownloadResolver {
    public_dir: PathBuf,
}

impl DownloadResolver {
    pub fn new(public_dir: impl Into<PathBuf>) -> Self {
        Self {
            public_dir: public_dir.into(),
        }
    }

    pub fn public_dir(&self) -> &Path {
        &self.public_dir
    }

    /// Every file below the public directory as `(relative path, file name)`.
    fn files(&self) -> Vec<(String, String)> {
        WalkDir::new(&self.public_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                let rel = e.path().strip_prefix(&self.public_dir).ok()?;
                let rel = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                Some((rel, e.file_name().to_string_lossy().into_owned()))
            })
            .collect()
    }

    /// Relative path (with `/`) of the downloadable file for `source`.
    ///
    /// Tries an exact name match, then the underscore-separated suffixes of a
    /// processed name (`prefix_prefix_Name.xlsx` gives `Name.xlsx`), then the
    /// first file sharing a fallback keyword with the source name.
    pub fn resolve(&self, source: &str) -> Option<String> {
        let name = strip_md(basename(source));
        if name.is_empty() {
            return None;
        }
        let files = self.files();
        if files.is_empty() {
            return None;
        }

        if let Some((rel, _)) = files.iter().find(|(_, file)| file == name) {
            return Some(rel.clone());
        }

        let parts: Vec<&str> = name.split('_').collect();
        for i in 1..parts.len() {
            let candidate = parts[i..].join("_");
            if !candidate.contains('.') {
                continue;
            }
            if let Some((rel, _)) = files.iter().find(|(_, file)| *file == candidate) {
                return Some(rel.clone());
            }
        }

        let lower = name.to_lowercase();
        for keyword in FALLBACK_KEYWORDS.iter().filter(|k| lower.contains(*k)) {
            if let Some((rel, _)) = files
                .iter()
                .find(|(_, file)| file.to_lowercase().contains(keyword))
            {
                return Some(rel.clone());
            }
        }

        None
    }

    /// Resolve a user-supplied download name to a file inside the directory.
    ///
    /// `..` sequences and leading `/` are removed first; the result must still
    /// lie inside the public directory.
    pub fn locate(&self, filename: &str) -> Result<PathBuf, DownloadError> {
        let clean = filename.replace("..", "");
        let clean = clean.trim_start_matches(['/', '\\']);
        if clean.is_empty() {
            return Err(DownloadError::InvalidPath);
        }

        let relative = Path::new(clean);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(DownloadError::InvalidPath);
        }

        let path = self.public_dir.join(relative);
        if !path.exists() {
            return Err(DownloadError::NotFound(clean.to_string()));
        }

        let root = self
            .public_dir
            .canonicalize()
            .map_err(|_| DownloadError::NotFound(clean.to_string()))?;
        let resolved = path
            .canonicalize()
            .map_err(|_| DownloadError::NotFound(clean.to_string()))?;
        if !resolved.starts_with(&root) {
            return Err(DownloadError::InvalidPath);
        }

        if !resolved.is_file() {
            return Err(DownloadError::NotAFile(clean.to_string()));
        }

        Ok(resolved)
    }

    /// Files directly inside the public directory.
    pub fn list(&self) -> Vec<FileEntry> {
        let Ok(entries) = std::fs::read_dir(&self.public_dir) else {
            return Vec::new();
        };

        let mut files: Vec<FileEntry> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let meta = entry.metadata().ok()?;
                if !meta.is_file() {
                    return None;
                }
                let modified = meta
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                    .map(|d| d.as_secs_f64())
                    .unwrap_or_default();
                Some(FileEntry {
                    filename: entry.file_name().to_string_lossy().into_owned(),
                    size: meta.len(),
                    modified,
                })
            })
            .collect();
        files.sort_by(|a, b| a.filename.cmp(&b.filename));
        files
    }
}

/// One row of the download listing.
#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    pub filename: String,
    pub size: u64,
    /// Seconds since the Unix epoch
    pub modified: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("Invalid file path")]
    InvalidPath,

    #[error("File '{0}' not found")]
    NotFound(String),

    #[error("'{0}' is not a valid file")]
    NotAFile(String),
}
