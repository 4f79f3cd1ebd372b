//! Error taxonomy for local (non-gateway) operations.

/// Errors raised by validation, storage and the record library.
#[derive(Debug, thiserror::Error)]
pub enum StudioError {
    #[error("Invalid input: {message}")]
    Validation { message: String },

    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl StudioError {
    pub fn validation(message: impl Into<String>) -> Self {
        StudioError::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(what: &'static str, id: impl Into<String>) -> Self {
        StudioError::NotFound {
            what,
            id: id.into(),
        }
    }

    /// Validation errors are raised before anything leaves the process.
    pub fn is_validation(&self) -> bool {
        matches!(self, StudioError::Validation { .. })
    }
}

impl From<std::io::Error> for StudioError {
    fn from(err: std::io::Error) -> Self {
        StudioError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_context() {
        let err = StudioError::not_found("image", "abc");
        assert_eq!(err.to_string(), "image not found: abc");

        let err = StudioError::validation("Please upload an image file");
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "Invalid input: Please upload an image file");
    }
}
