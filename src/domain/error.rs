use thiserror::Error;

/// A queue entry that cannot be encoded or decoded.
///
/// Retrying never helps with these, so consumers discard the entry.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("malformed payload: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("payload could not be encoded: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("payload field `{field}` is invalid: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

impl PayloadError {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }
}
