use thiserror::Error;

/// Error kinds a caller may want to match on.
///
/// These travel inside `anyhow::Error`; use `err.downcast_ref::<ExtractError>()`
/// to inspect them. I/O, parse and network failures stay as plain `anyhow`
/// errors with context attached.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("no file suffix or name ends with a dot: {0}")]
    MissingSuffix(String),

    #[error("encoded payload is {size} bytes, limit is {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("url is {len} bytes, limit is {limit} bytes")]
    UrlTooLong { len: usize, limit: usize },

    #[error("unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("download of {url} failed with status {status}")]
    DownloadFailed { url: String, status: u16 },

    #[error("vendor rejected request: {code} {message}")]
    VendorRejected { code: String, message: String },

    #[error("missing credential: {0}")]
    MissingCredentials(&'static str),
}
