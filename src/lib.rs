//! Office Text Extract - plain-text extraction from office documents and images
//! Spreadsheets, DOCX, PPTX and text files are parsed locally; images and PDFs go to a cloud OCR API

pub mod cache_system;
pub mod config;
pub mod document_parser;
pub mod error;
pub mod logging;
pub mod ocr_client;
pub mod powerpoint_parser;
pub mod shared_utils;

/// Re-export document conversion
pub use document_parser::{
    ConversionResult,
    DocumentConverter,
    DocumentKind,
    excel_to_word,
    extract_plain_text,
    extract_spreadsheet_text,
    extract_word_text,
};

/// Re-export PowerPoint functionality
pub use powerpoint_parser::{extract_presentation_text, get_presentation_slide_count};

/// Re-export the OCR client
pub use ocr_client::{OcrClient, MAX_ENCODED_BYTES, MAX_URL_BYTES};

/// Re-export token caching
pub use cache_system::{MemoryTokenCache, TokenCache};

/// Re-export configuration, errors and logging setup
pub use config::{ConverterConfig, LogConfig, OcrConfig};
pub use error::ExtractError;
pub use logging::init_logging;

/// Re-export shared utilities
pub use shared_utils::{count_size, get_suffix, get_url_suffix, md5_hex};
