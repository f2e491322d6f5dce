use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;

use crate::error::ExtractError;

/// Return the text after the last "." of a file name or URL
pub fn get_suffix(name: &str) -> Result<String> {
    match name.rfind('.') {
        Some(index) if index + 1 < name.len() => Ok(name[index + 1..].to_string()),
        _ => Err(ExtractError::MissingSuffix(name.to_string()).into()),
    }
}

/// Suffix of a URL's path, ignoring any query string or fragment
pub fn get_url_suffix(url: &str) -> Result<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    get_suffix(path).map_err(|_| ExtractError::MissingSuffix(url.to_string()).into())
}

/// Size in bytes of a file on disk
pub fn count_size(file_path: impl AsRef<Path>) -> Result<u64> {
    let file_path = file_path.as_ref();
    let metadata = fs::metadata(file_path)
        .with_context(|| format!("Failed to stat file: {}", file_path.display()))?;
    Ok(metadata.len())
}

/// Lowercase hex MD5 digest of a string
pub fn md5_hex(input: &str) -> String {
    format!("{:x}", md5::compute(input.as_bytes()))
}

/// Name used for a URL download: `temporary<md5(url)>.<suffix>`
pub fn temp_file_name(url: &str, suffix: &str) -> String {
    format!("temporary{}.{}", md5_hex(url), suffix)
}

/// A downloaded file that is removed when the guard goes out of scope
#[derive(Debug)]
pub struct TempDownload {
    path: PathBuf,
}

impl TempDownload {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempDownload {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => log::debug!("Removed temporary file {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Failed to remove temporary file {}: {}", self.path.display(), e),
        }
    }
}

/// Download `url` into `temp_dir` and return a guard owning the file.
///
/// The partially written file is removed if any step fails.
pub async fn download_to_temp(
    client: &reqwest::Client,
    url: &str,
    suffix: &str,
    temp_dir: &Path,
) -> Result<TempDownload> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to download: {}", url))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ExtractError::DownloadFailed {
            url: url.to_string(),
            status: status.as_u16(),
        }
        .into());
    }

    let bytes = response
        .bytes()
        .await
        .with_context(|| format!("Failed to read download body: {}", url))?;

    let guard = TempDownload::new(temp_dir.join(temp_file_name(url, suffix)));
    let mut file = tokio::fs::File::create(guard.path())
        .await
        .with_context(|| format!("Failed to create temporary file: {}", guard.path().display()))?;
    file.write_all(&bytes)
        .await
        .with_context(|| format!("Failed to write temporary file: {}", guard.path().display()))?;
    file.flush().await?;

    log::debug!("Downloaded {} ({} bytes) to {}", url, bytes.len(), guard.path().display());
    Ok(guard)
}
