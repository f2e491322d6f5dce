use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Deserialize;

use crate::cache_system::TokenCache;
use crate::config::OcrConfig;
use crate::error::ExtractError;
use crate::logging::redact;
use crate::shared_utils::md5_hex;

/// Largest accepted base64 payload
pub const MAX_ENCODED_BYTES: usize = 8 * 1024 * 1024;
/// Longest accepted image URL
pub const MAX_URL_BYTES: usize = 1024;

const TOKEN_KEY_PREFIX: &str = "kpai:baiduocr:";

const OCR_FLAGS: [(&str, &str); 4] = [
    ("detect_direction", "false"),
    ("detect_language", "false"),
    ("paragraph", "false"),
    ("probability", "false"),
];

/// Body of the token endpoint reply
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub session_key: String,
    #[serde(default)]
    pub session_secret: String,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub error_description: String,
}

/// Body of the word-recognition endpoint reply
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WordsResponse {
    #[serde(default)]
    pub log_id: u64,
    #[serde(default)]
    pub words_result_num: u64,
    #[serde(default)]
    pub words_result: Vec<WordsItem>,
    #[serde(default)]
    pub error_code: Option<serde_json::Value>,
    #[serde(default)]
    pub error_msg: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WordsItem {
    #[serde(default)]
    pub words: String,
}

impl WordsResponse {
    /// Recognized word groups joined with commas
    pub fn joined_words(&self) -> String {
        self.words_result
            .iter()
            .map(|item| item.words.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Which form field carries the OCR input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Payload {
    Image,
    Url,
    Pdf,
}

impl Payload {
    fn field(self) -> &'static str {
        match self {
            Payload::Image => "image",
            Payload::Url => "url",
            Payload::Pdf => "pdf_file",
        }
    }
}

/// Client for the cloud OCR API
#[derive(Clone)]
pub struct OcrClient {
    http: reqwest::Client,
    config: OcrConfig,
    cache: Arc<dyn TokenCache>,
}

impl std::fmt::Debug for OcrClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcrClient")
            .field("token_url", &self.config.token_url)
            .field("ocr_url", &self.config.ocr_url)
            .finish_non_exhaustive()
    }
}

impl OcrClient {
    /// Build a client; no network traffic until the first call
    pub fn new(config: OcrConfig, cache: Arc<dyn TokenCache>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;
        Ok(Self::with_client(http, config, cache))
    }

    pub fn with_client(http: reqwest::Client, config: OcrConfig, cache: Arc<dyn TokenCache>) -> Self {
        Self { http, config, cache }
    }

    /// Build a client and fetch a token up front
    pub async fn connect(config: OcrConfig, cache: Arc<dyn TokenCache>) -> Result<Self> {
        let client = Self::new(config, cache)?;
        client.get_access_token().await?;
        Ok(client)
    }

    pub fn config(&self) -> &OcrConfig {
        &self.config
    }

    /// Cache key for this client's API key
    pub fn token_cache_key(&self) -> String {
        format!("{}{}", TOKEN_KEY_PREFIX, md5_hex(&self.config.api_key))
    }

    /// Return a cached access token, or fetch and cache a fresh one.
    ///
    /// A vendor-reported error yields an empty token and `Ok` unless
    /// `strict_vendor_errors` is set.
    pub async fn get_access_token(&self) -> Result<String> {
        let key = self.token_cache_key();
        match self.cache.get(&key) {
            Ok(Some(token)) if !token.is_empty() => {
                log::debug!("Using cached access token {}", redact(&token));
                return Ok(token);
            }
            Ok(_) => {}
            Err(e) => log::warn!("Token cache read failed for {}: {:#}", key, e),
        }

        let response = self
            .http
            .post(&self.config.token_url)
            .query(&[
                ("client_id", self.config.api_key.as_str()),
                ("client_secret", self.config.api_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .send()
            .await
            .context("Token request failed")?;

        let body = response.text().await.context("Failed to read token response")?;
        let token_response: TokenResponse = serde_json::from_str(&body)
            .with_context(|| format!("Token response is not valid JSON: {}", body))?;

        if !token_response.error.is_empty() {
            log::warn!(
                "Token endpoint rejected credentials: {} {}",
                token_response.error,
                token_response.error_description
            );
            if self.config.strict_vendor_errors {
                return Err(ExtractError::VendorRejected {
                    code: token_response.error,
                    message: token_response.error_description,
                }
                .into());
            }
            return Ok(String::new());
        }

        let token = token_response.access_token;
        if !token.is_empty() {
            self.cache
                .set(&key, &token, Duration::from_secs(token_response.expires_in))
                .with_context(|| format!("Failed to cache access token under {}", key))?;
            log::info!(
                "Fetched access token {} valid for {}s",
                redact(&token),
                token_response.expires_in
            );
        }
        Ok(token)
    }

    /// Recognize text in a local image file
    pub async fn image_to_word(&self, image_path: impl AsRef<Path>) -> Result<String> {
        let encoded = encode_file(image_path.as_ref()).await?;
        self.recognize(Payload::Image, encoded).await
    }

    /// Recognize text in an image the vendor fetches from `image_url`
    pub async fn image_url_to_word(&self, image_url: &str) -> Result<String> {
        check_url_len(image_url)?;
        self.recognize(Payload::Url, image_url.to_string()).await
    }

    /// Recognize text in a local PDF file
    pub async fn pdf_to_word(&self, pdf_path: impl AsRef<Path>) -> Result<String> {
        let encoded = encode_file(pdf_path.as_ref()).await?;
        self.recognize(Payload::Pdf, encoded).await
    }

    async fn recognize(&self, payload: Payload, value: String) -> Result<String> {
        let token = self.get_access_token().await?;

        let mut form: Vec<(&str, &str)> = Vec::with_capacity(OCR_FLAGS.len() + 1);
        form.push((payload.field(), value.as_str()));
        form.extend_from_slice(&OCR_FLAGS);

        let response = self
            .http
            .post(&self.config.ocr_url)
            .query(&[("access_token", token.as_str())])
            .header(ACCEPT, "application/json")
            .form(&form)
            .send()
            .await
            .context("OCR request failed")?;

        let status = response.status();
        let body = response.text().await.context("Failed to read OCR response")?;
        let words: WordsResponse = serde_json::from_str(&body)
            .with_context(|| format!("OCR response is not valid JSON (status {})", status))?;

        if words.error_code.is_some() || !status.is_success() {
            let code = words
                .error_code
                .as_ref()
                .map(|c| match c {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .unwrap_or_else(|| status.as_u16().to_string());
            let message = words.error_msg.clone().unwrap_or_default();
            log::warn!("OCR request rejected ({:?}): {} {}", payload, code, message);
            if self.config.strict_vendor_errors {
                return Err(ExtractError::VendorRejected { code, message }.into());
            }
            return Ok(String::new());
        }

        log::debug!(
            "OCR log_id {} returned {} word groups",
            words.log_id,
            words.words_result_num
        );
        Ok(words.joined_words())
    }
}

async fn encode_file(file_path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(file_path)
        .await
        .with_context(|| format!("Failed to read file for OCR: {}", file_path.display()))?;
    let encoded = STANDARD.encode(bytes);
    if encoded.len() > MAX_ENCODED_BYTES {
        return Err(ExtractError::PayloadTooLarge {
            size: encoded.len(),
            limit: MAX_ENCODED_BYTES,
        }
        .into());
    }
    Ok(encoded)
}

fn check_url_len(url: &str) -> Result<()> {
    if url.len() > MAX_URL_BYTES {
        return Err(ExtractError::UrlTooLong {
            len: url.len(),
            limit: MAX_URL_BYTES,
        }
        .into());
    }
    Ok(())
}
