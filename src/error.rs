//! Error types for the CWA weather query engine

use thiserror::Error;

/// Main error type for CWA weather queries
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The requested query type is not one of the four recognized kinds
    #[error("Unknown query type: '{0}'")]
    UnknownQueryType(String),

    /// A parameter the endpoint requires was not supplied
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    /// Every supplied place name failed to resolve
    #[error("No matching location among: {}", names.join(", "))]
    NoMatchingLocation { names: Vec<String> },

    /// The upstream API did not respond within the configured timeout
    #[error("Upstream request timed out after {attempts} attempt(s)")]
    Timeout { attempts: u32 },

    /// The upstream API answered with a non-success HTTP status
    #[error("Upstream returned HTTP {status} after {attempts} attempt(s)")]
    HttpError { status: u16, attempts: u32 },

    /// The API credential is absent or was rejected upstream
    #[error("API credential is missing or was rejected upstream")]
    AuthError,

    /// Syntactically valid response carrying zero records
    #[error("Upstream returned an empty result set")]
    EmptyPayload,

    /// The response is missing structural fields a normalizer depends on
    #[error("Malformed upstream response: {0}")]
    MalformedResponse(String),

    /// Network-level failure that is not a timeout
    #[error("Transport error: {0}")]
    Transport(String),
}

impl Error {
    /// Get a user-friendly error message suitable for relaying to an assistant
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Error::Config(_) => {
                "Configuration error. Please check your config file and API key.".to_string()
            }
            Error::UnknownQueryType(kind) => format!(
                "'{kind}' is not a supported query type. \
                 Use one of: forecast, warnings, rainfall, observation."
            ),
            Error::MissingParameter(name) => {
                format!("The query is missing the required parameter '{name}'.")
            }
            Error::NoMatchingLocation { names } => format!(
                "None of the requested locations ({}) match a known Taiwan county or city.",
                names.join(", ")
            ),
            Error::Timeout { .. } => {
                "The weather service did not respond in time. Please try again later.".to_string()
            }
            Error::HttpError { status, .. } => {
                format!("The weather service request failed with HTTP status {status}.")
            }
            Error::AuthError => {
                "The CWA API key is missing or invalid. Set CWA_UPSTREAM__API_KEY.".to_string()
            }
            Error::EmptyPayload => {
                "The weather service returned no data for this query.".to_string()
            }
            Error::MalformedResponse(_) => {
                "The weather service returned data in an unexpected format.".to_string()
            }
            Error::Transport(_) => {
                "Unable to reach the weather service. Please check your internet connection."
                    .to_string()
            }
        }
    }

    /// Whether the upstream fault is transient and worth retrying
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Timeout { .. }
                | Error::HttpError {
                    status: 500..=599,
                    ..
                }
        )
    }
}
