//! Source identifiers and raw byte access.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};
use crate::fetch::{HttpClient, fetch_bytes};

/// Where a spreadsheet comes from. Also the cache key for loaded tables.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceId {
    Local(PathBuf),
    Remote(String),
}

impl SourceId {
    /// `http://` and `https://` strings are remote, anything else is a path.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            SourceId::Remote(trimmed.to_string())
        } else {
            SourceId::Local(PathBuf::from(trimmed))
        }
    }

    /// Last path segment, used to name the source in messages.
    pub fn file_name(&self) -> String {
        match self {
            SourceId::Local(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            SourceId::Remote(url) => url_path(url)
                .rsplit('/')
                .find(|s| !s.is_empty())
                .unwrap_or(url)
                .to_string(),
        }
    }

    /// Lowercased extension, query string ignored.
    pub fn extension(&self) -> Option<String> {
        let name = match self {
            SourceId::Local(path) => return extension_of(path),
            SourceId::Remote(_) => self.file_name(),
        };
        extension_of(Path::new(&name))
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceId::Local(path) => write!(f, "{}", path.display()),
            SourceId::Remote(url) => f.write_str(url),
        }
    }
}

fn url_path(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Xlsx,
}

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

impl SourceFormat {
    /// Extension first, then content sniffing (XLSX files are zip archives).
    pub fn detect(id: &SourceId, bytes: &[u8]) -> Self {
        match id.extension().as_deref() {
            Some("xlsx" | "xlsm") => SourceFormat::Xlsx,
            Some("csv" | "txt") => SourceFormat::Csv,
            _ if bytes.starts_with(ZIP_MAGIC) => SourceFormat::Xlsx,
            _ => SourceFormat::Csv,
        }
    }
}

/// Loads source bytes from a local file or fetches them over HTTP.
#[tracing::instrument(skip(client), fields(source = %id))]
pub async fn read_source<C: HttpClient>(client: &C, id: &SourceId) -> Result<Vec<u8>> {
    match id {
        SourceId::Remote(url) => fetch_bytes(client, url)
            .await
            .map_err(|e| PipelineError::fetch(url.clone(), format!("{e:#}"))),
        SourceId::Local(path) => std::fs::read(path).map_err(|e| {
            PipelineError::fetch(path.display().to_string(), e)
        }),
    }
}
