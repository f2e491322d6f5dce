use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

use crate::error::ExtractError;

pub const DEFAULT_TOKEN_URL: &str = "https://aip.baidubce.com/oauth/2.0/token";
pub const DEFAULT_OCR_URL: &str = "https://aip.baidubce.com/rest/2.0/ocr/v1/general_basic";

/// Configuration for the OCR client
#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub api_key: String,
    pub api_secret: String,
    pub token_url: String,
    pub ocr_url: String,
    /// `None` keeps the HTTP client's default behaviour
    pub request_timeout: Option<Duration>,
    /// Report vendor-rejected requests as errors instead of empty results
    pub strict_vendor_errors: bool,
}

impl OcrConfig {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            ocr_url: DEFAULT_OCR_URL.to_string(),
            request_timeout: None,
            strict_vendor_errors: false,
        }
    }

    /// Build from `OCR_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let api_key = env_nonempty("OCR_API_KEY")
            .ok_or(ExtractError::MissingCredentials("OCR_API_KEY"))?;
        let api_secret = env_nonempty("OCR_API_SECRET")
            .ok_or(ExtractError::MissingCredentials("OCR_API_SECRET"))?;

        let mut config = Self::new(api_key, api_secret);
        if let Some(url) = env_nonempty("OCR_TOKEN_URL") {
            config.token_url = url;
        }
        if let Some(url) = env_nonempty("OCR_ENDPOINT_URL") {
            config.ocr_url = url;
        }
        config.request_timeout = env_secs("OCR_REQUEST_TIMEOUT");
        config.strict_vendor_errors = env_nonempty("OCR_STRICT_VENDOR_ERRORS")
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);
        Ok(config)
    }

    pub fn with_endpoints(mut self, token_url: impl Into<String>, ocr_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self.ocr_url = ocr_url.into();
        self
    }

    pub fn with_strict_vendor_errors(mut self, strict: bool) -> Self {
        self.strict_vendor_errors = strict;
        self
    }
}

/// Configuration for the document converter
#[derive(Debug, Clone)]
pub struct ConverterConfig {
    /// Where URL downloads are staged before parsing
    pub temp_dir: PathBuf,
    pub request_timeout: Option<Duration>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            temp_dir: env::temp_dir(),
            request_timeout: None,
        }
    }
}

impl ConverterConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(dir) = env_nonempty("EXTRACT_TEMP_DIR") {
            config.temp_dir = PathBuf::from(dir);
        }
        config.request_timeout = env_secs("EXTRACT_REQUEST_TIMEOUT");
        config
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }
}

/// Configuration for `logging::init_logging`
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: log::LevelFilter,
    pub log_file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: log::LevelFilter::Info,
            log_file: None,
        }
    }
}

impl LogConfig {
    pub fn from_env() -> Self {
        let level = env_nonempty("EXTRACT_LOG_LEVEL")
            .or_else(|| env_nonempty("RUST_LOG"))
            .and_then(|v| v.parse::<log::LevelFilter>().ok())
            .unwrap_or(log::LevelFilter::Info);
        Self {
            level,
            log_file: env_nonempty("EXTRACT_LOG_FILE").map(PathBuf::from),
        }
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_secs(key: &str) -> Option<Duration> {
    env_nonempty(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
