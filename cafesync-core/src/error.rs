use std::path::PathBuf;

/// Top-level cafesync error type.
///
/// All fallible operations in `cafesync-core` return [`Result<T, CafeError>`](Result).
/// Each variant wraps a domain-specific error enum, so callers can tell a
/// fatal persistence failure apart from a per-record enrichment failure.
#[derive(thiserror::Error, Debug)]
pub enum CafeError {
    /// Error from the social-media source (network, error envelope).
    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    /// Error reading or writing one of the persisted JSON files.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Error in configuration parsing or validation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error communicating with an LLM provider.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Error communicating with the geocoding service.
    #[error("Geocode error: {0}")]
    Geocode(#[from] GeocodeError),

    /// Error writing CSV exports.
    #[error("Export error: {0}")]
    Export(#[from] ExportError),
}

/// Errors from the paginated social-media API.
#[derive(thiserror::Error, Debug)]
pub enum UpstreamError {
    /// Network-level failure reaching the API.
    #[error("Network error: {0}")]
    Network(String),

    /// The API answered with an explicit `error` envelope.
    #[error("API returned error payload: {0}")]
    Api(String),

    /// The API answered with a non-success HTTP status and no usable body.
    #[error("HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body text.
        body: String,
    },

    /// A page could not be decoded as the expected envelope.
    #[error("Malformed page: {0}")]
    Parse(String),
}

/// Errors from the JSON file store. Always fatal for the running command.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// A required file does not exist.
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Filesystem I/O failed.
    #[error("IO error on {}: {source}", path.display())]
    Io {
        /// File being read or written.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// File contents are not the expected JSON shape.
    #[error("Malformed JSON in {}: {source}", path.display())]
    Serialization {
        /// File being decoded or encoded.
        path: PathBuf,
        /// Underlying serde error.
        source: serde_json::Error,
    },
}

/// Errors in cafesync configuration parsing and validation.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Config file not readable: {0}")]
    NotFound(String),

    /// Configuration values are present but semantically invalid.
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// Configuration file syntax could not be parsed (TOML error).
    #[error("Parse error: {0}")]
    Parse(String),

    /// A secret named by the configuration is not set in the environment.
    #[error("Missing secret: environment variable {0} is not set")]
    MissingSecret(String),
}

/// Errors from LLM provider interactions.
#[derive(thiserror::Error, Debug)]
pub enum LlmError {
    /// Network-level failure connecting to the LLM provider.
    #[error("Network error: {0}")]
    Network(String),

    /// LLM API returned a non-success HTTP status.
    #[error("API error (HTTP {status}): {body}")]
    ApiError {
        /// HTTP status code from the provider.
        status: u16,
        /// Response body text.
        body: String,
    },

    /// The provider envelope (not the model text) could not be decoded.
    #[error("Response parse error: {0}")]
    Parse(String),

    /// LLM configuration is missing or invalid (API key, model, etc.).
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors from the geocoding service. An empty or malformed answer is not
/// an error; it resolves to "not found".
#[derive(thiserror::Error, Debug)]
pub enum GeocodeError {
    /// Network-level failure reaching the geocoder.
    #[error("Network error: {0}")]
    Network(String),

    /// Geocoder returned a non-success HTTP status.
    #[error("API error (HTTP {status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Response body text.
        body: String,
    },
}

/// Errors while writing CSV exports.
#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    /// CSV encoding or writing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Filesystem I/O error writing the export.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn serde(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Serialization {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias for `Result<T, CafeError>`.
pub type Result<T> = std::result::Result<T, CafeError>;
