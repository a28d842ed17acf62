//! Error types for rack-core

use thiserror::Error;

/// Result type alias using rack-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in rack-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record or document not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The remote store could not be reached (offline, DNS, timeout).
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// A credential for the remote store could not be obtained or was refused.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The remote store refused the request (validation, quota, permissions).
    #[error("Remote rejected request ({status}): {message}")]
    RemoteRejected { status: u16, message: String },

    /// A remote document could not be mapped to a record.
    #[error("Malformed document {id}: {message}")]
    Decode { id: String, message: String },
}

impl Error {
    /// Whether the failure is transient and the write should be queued.
    pub const fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity(_))
    }

    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Errors the user must see as a persistent notice.
    pub const fn is_unrecoverable(&self) -> bool {
        matches!(self, Self::Auth(_) | Self::RemoteRejected { .. })
    }

    pub(crate) fn decode(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            id: id.into(),
            message: message.into(),
        }
    }
}

impl Error {
    /// A remote response whose body did not match the expected payload.
    fn malformed_body(source: Option<&str>, error: &dyn std::fmt::Display) -> Self {
        Self::decode(
            source.unwrap_or("response body"),
            format!("invalid response body: {error}"),
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        if error.is_connect() || error.is_timeout() || error.is_request() {
            return Self::Connectivity(error.to_string());
        }
        if error.is_decode() {
            let source = error.url().map(reqwest::Url::as_str);
            return Self::malformed_body(source, &error);
        }
        match error.status() {
            Some(status) => Self::RemoteRejected {
                status: status.as_u16(),
                message: error.to_string(),
            },
            None => Self::Connectivity(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_connectivity() {
        assert!(Error::Connectivity("offline".to_string()).is_connectivity());
        assert!(!Error::Auth("denied".to_string()).is_connectivity());
    }

    #[test]
    fn auth_and_rejected_are_unrecoverable() {
        assert!(Error::Auth("denied".to_string()).is_unrecoverable());
        assert!(Error::RemoteRejected {
            status: 400,
            message: "bad field".to_string()
        }
        .is_unrecoverable());
        assert!(!Error::NotFound("abc".to_string()).is_unrecoverable());
    }

    #[test]
    fn malformed_body_is_a_decode_failure() {
        let error = Error::malformed_body(
            Some("https://firestore.googleapis.com/v1/x"),
            &"expected value at line 1 column 1",
        );

        match &error {
            Error::Decode { id, message } => {
                assert_eq!(id, "https://firestore.googleapis.com/v1/x");
                assert!(message.contains("expected value"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!error.is_connectivity());
        assert!(matches!(
            Error::malformed_body(None, &"eof"),
            Error::Decode { id, .. } if id == "response body"
        ));
    }

    #[test]
    fn rejected_display_includes_status() {
        let error = Error::RemoteRejected {
            status: 429,
            message: "quota".to_string(),
        };
        assert_eq!(error.to_string(), "Remote rejected request (429): quota");
    }
}
