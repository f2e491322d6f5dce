use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use serde::{Deserialize, Serialize};

use crate::config::ConverterConfig;
use crate::error::ExtractError;
use crate::powerpoint_parser::extract_presentation_text;
use crate::shared_utils::{count_size, download_to_temp, get_suffix, get_url_suffix};

/// Document family, selected from a file suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentKind {
    Spreadsheet,
    WordProcessor,
    Presentation,
    PlainText,
}

impl DocumentKind {
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix.to_lowercase().as_str() {
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Some(Self::Spreadsheet),
            "docx" => Some(Self::WordProcessor),
            "pptx" => Some(Self::Presentation),
            "txt" | "text" | "csv" | "md" | "log" => Some(Self::PlainText),
            _ => None,
        }
    }

    /// Run the matching extractor on a local file
    pub fn extract(self, file_path: &Path) -> Result<String> {
        match self {
            Self::Spreadsheet => extract_spreadsheet_text(file_path),
            Self::WordProcessor => extract_word_text(file_path),
            Self::Presentation => extract_presentation_text(file_path),
            Self::PlainText => extract_plain_text(file_path),
        }
    }
}

/// Text pulled out of one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub text: String,
    pub suffix: String,
    /// Size of the source file on disk, in bytes
    pub size: u64,
}

/// Concatenate every cell of every sheet, each followed by a space.
///
/// Within a row, cells from column A up to the last non-empty cell count, so
/// a missing cell contributes a lone space. Rows with no content contribute
/// nothing.
pub fn extract_spreadsheet_text(file_path: impl AsRef<Path>) -> Result<String> {
    let file_path = file_path.as_ref();
    let mut workbook = open_workbook_auto(file_path)
        .with_context(|| format!("Failed to open Excel file: {}", file_path.display()))?;

    let mut text = String::new();
    for sheet_name in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&sheet_name)
            .with_context(|| format!("Failed to read sheet '{}' of {}", sheet_name, file_path.display()))?;

        // the range is dense from its first used column, not from column A
        let leading_columns = range.start().map_or(0, |(_, column)| column as usize);
        for row in range.rows() {
            push_row_text(&mut text, row, leading_columns);
        }
    }

    Ok(text)
}

fn push_row_text(text: &mut String, row: &[Data], leading_columns: usize) {
    let Some(last) = row.iter().rposition(|cell| !matches!(cell, Data::Empty)) else {
        return;
    };

    for _ in 0..leading_columns {
        text.push(' ');
    }
    for cell in &row[..=last] {
        if !matches!(cell, Data::Empty) {
            text.push_str(&cell.to_string());
        }
        text.push(' ');
    }
}

/// Concatenate the text of every run of every body paragraph
pub fn extract_word_text(file_path: impl AsRef<Path>) -> Result<String> {
    let file_path = file_path.as_ref();
    let buffer = fs::read(file_path)
        .with_context(|| format!("Failed to open DOCX file: {}", file_path.display()))?;

    let docx = docx_rs::read_docx(&buffer)
        .map_err(|e| anyhow::anyhow!("Failed to parse DOCX content: {}", e))?;

    let mut text = String::new();
    for child in &docx.document.children {
        if let docx_rs::DocumentChild::Paragraph(paragraph) = child {
            for paragraph_child in &paragraph.children {
                if let docx_rs::ParagraphChild::Run(run) = paragraph_child {
                    push_run_text(&mut text, run);
                }
            }
        }
    }

    Ok(text)
}

fn push_run_text(text: &mut String, run: &docx_rs::Run) {
    for run_child in &run.children {
        match run_child {
            docx_rs::RunChild::Text(t) => text.push_str(&t.text),
            docx_rs::RunChild::Tab(_) => text.push('\t'),
            _ => {}
        }
    }
}

/// Read a text file and flatten its newlines to spaces
pub fn extract_plain_text(file_path: impl AsRef<Path>) -> Result<String> {
    let file_path = file_path.as_ref();
    let content = fs::read(file_path)
        .with_context(|| format!("Failed to read text file: {}", file_path.display()))?;
    Ok(String::from_utf8_lossy(&content).replace('\n', " "))
}

/// Spreadsheet text only, without suffix or size
pub fn excel_to_word(file_path: impl AsRef<Path>) -> Result<String> {
    extract_spreadsheet_text(file_path)
}

/// Converts local or remote documents to text
#[derive(Debug, Clone)]
pub struct DocumentConverter {
    http: reqwest::Client,
    temp_dir: PathBuf,
}

impl DocumentConverter {
    pub fn new(config: ConverterConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;
        Ok(Self::with_client(http, config))
    }

    /// Use a caller-supplied HTTP client for downloads
    pub fn with_client(http: reqwest::Client, config: ConverterConfig) -> Self {
        Self {
            http,
            temp_dir: config.temp_dir,
        }
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Convert a local file, picking the format from its suffix
    pub fn convert_file(&self, file_path: impl AsRef<Path>) -> Result<ConversionResult> {
        let file_path = file_path.as_ref();
        let suffix = get_suffix(&file_path.to_string_lossy())?;
        let kind = DocumentKind::from_suffix(&suffix)
            .ok_or_else(|| ExtractError::UnsupportedFormat(suffix.clone()))?;
        self.convert_file_as(file_path, kind)
    }

    /// Convert a local file with an explicit format
    pub fn convert_file_as(&self, file_path: impl AsRef<Path>, kind: DocumentKind) -> Result<ConversionResult> {
        let file_path = file_path.as_ref();
        let suffix = get_suffix(&file_path.to_string_lossy())?;
        let size = count_size(file_path)?;
        let text = kind.extract(file_path)?;

        log::debug!("Converted {} as {:?}: {} bytes -> {} chars", file_path.display(), kind, size, text.chars().count());
        Ok(ConversionResult { text, suffix, size })
    }

    /// Download and convert a remote file, picking the format from the URL suffix
    pub async fn convert_url(&self, url: &str) -> Result<ConversionResult> {
        let suffix = get_url_suffix(url)?;
        let kind = DocumentKind::from_suffix(&suffix)
            .ok_or_else(|| ExtractError::UnsupportedFormat(suffix.clone()))?;
        self.convert_url_as(url, kind).await
    }

    /// Download and convert a remote file with an explicit format.
    ///
    /// The download is removed before this returns, whether parsing succeeded
    /// or not.
    pub async fn convert_url_as(&self, url: &str, kind: DocumentKind) -> Result<ConversionResult> {
        let suffix = get_url_suffix(url)?;
        let download = download_to_temp(&self.http, url, &suffix, &self.temp_dir).await?;
        let size = count_size(download.path())?;

        let path = download.path().to_path_buf();
        let text = tokio::task::spawn_blocking(move || kind.extract(&path))
            .await
            .context("Document parsing task failed")??;

        log::debug!("Converted {} as {:?}: {} bytes -> {} chars", url, kind, size, text.chars().count());
        Ok(ConversionResult { text, suffix, size })
    }

    pub fn excel_to_content(&self, file_path: impl AsRef<Path>) -> Result<ConversionResult> {
        self.convert_file_as(file_path, DocumentKind::Spreadsheet)
    }

    pub async fn excel_url_to_content(&self, url: &str) -> Result<ConversionResult> {
        self.convert_url_as(url, DocumentKind::Spreadsheet).await
    }

    pub fn word_to_content(&self, file_path: impl AsRef<Path>) -> Result<ConversionResult> {
        self.convert_file_as(file_path, DocumentKind::WordProcessor)
    }

    pub async fn word_url_to_content(&self, url: &str) -> Result<ConversionResult> {
        self.convert_url_as(url, DocumentKind::WordProcessor).await
    }

    pub fn ppt_to_content(&self, file_path: impl AsRef<Path>) -> Result<ConversionResult> {
        self.convert_file_as(file_path, DocumentKind::Presentation)
    }

    pub async fn ppt_url_to_content(&self, url: &str) -> Result<ConversionResult> {
        self.convert_url_as(url, DocumentKind::Presentation).await
    }

    pub fn txt_to_content(&self, file_path: impl AsRef<Path>) -> Result<ConversionResult> {
        self.convert_file_as(file_path, DocumentKind::PlainText)
    }

    pub async fn txt_url_to_content(&self, url: &str) -> Result<ConversionResult> {
        self.convert_url_as(url, DocumentKind::PlainText).await
    }
}
