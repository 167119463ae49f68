//! Input resolution: a user-supplied path or URL → a local, checked PDF.
//!
//! URLs are downloaded into a `TempDir` that lives as long as the
//! [`ResolvedInput`], so pdfium and the analyzer can both work from a plain
//! path and the download is removed on drop. The `%PDF` magic is checked
//! before anything is sent to the analysis service.

use crate::error::Layout2JsonError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// The resolved input: a local path or a downloaded temp file.
#[derive(Debug)]
pub enum ResolvedInput {
    Local(PathBuf),
    /// The `TempDir` is kept alive until processing completes.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }

    /// File name reported in the output metadata.
    pub fn file_name(&self) -> String {
        self.path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string())
    }

    /// File stem used to name the JSON result.
    pub fn stem(&self) -> String {
        self.path()
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "document".to_string())
    }

    /// Read the whole PDF into memory for the analysis request.
    pub async fn read_bytes(&self) -> Result<Vec<u8>, Layout2JsonError> {
        let path = self.path();
        tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => Layout2JsonError::PermissionDenied {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::NotFound => Layout2JsonError::FileNotFound {
                path: path.to_path_buf(),
            },
            _ => Layout2JsonError::Internal(format!("Failed to read {}: {e}", path.display())),
        })
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local PDF file path.
pub async fn resolve_input(
    input: &str,
    timeout_secs: u64,
) -> Result<ResolvedInput, Layout2JsonError> {
    if input.trim().is_empty() {
        return Err(Layout2JsonError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

fn resolve_local(path_str: &str) -> Result<ResolvedInput, Layout2JsonError> {
    let path = PathBuf::from(path_str);

    if !path.is_file() {
        return Err(Layout2JsonError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != PDF_MAGIC {
                return Err(Layout2JsonError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Layout2JsonError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(Layout2JsonError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, Layout2JsonError> {
    info!("Downloading PDF from: {}", url);

    let failed = |reason: String| Layout2JsonError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Layout2JsonError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let temp_dir = TempDir::new().map_err(|e| Layout2JsonError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(filename_from_url(url));

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;

    if bytes.len() >= 4 && &bytes[..4] != PDF_MAGIC {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[..4]);
        return Err(Layout2JsonError::NotAPdf {
            path: file_path,
            magic,
        });
    }

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| Layout2JsonError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded {} bytes to: {}", bytes.len(), file_path.display());

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

/// Last path segment of the URL when it looks like a file name.
fn filename_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|last| !last.is_empty() && last.contains('.'))
        .unwrap_or_else(|| "downloaded.pdf".to_string())
}
