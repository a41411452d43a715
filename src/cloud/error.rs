use thiserror::Error;

/// Failures reported by a cloud provider client
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CloudError {
    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("cloud API error {code}: {message}")]
    Api { code: u16, message: String },

    #[error("cloud transport error: {message}")]
    Transport { message: String },
}

impl CloudError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// True for explicit not-found errors and for HTTP 404 responses.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Api { code: 404, .. })
    }
}

pub type CloudResult<T> = Result<T, CloudError>;

/// Turns a not-found error into `None`.
pub fn found<T>(result: CloudResult<T>) -> CloudResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}
