use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Malformed entry '{token}' at byte offset {offset}")]
    MalformedEntry { token: String, offset: usize },

    #[error("Source too large: {size} bytes exceeds maximum {max}")]
    SourceTooLarge { size: u64, max: u64 },

    #[error("Queue is closed")]
    QueueClosed,

    #[error("Consistency violation: produced {produced} items but consumed {consumed}")]
    ConsistencyViolation { produced: u64, consumed: u64 },

    #[error("{role} thread panicked")]
    ThreadPanicked { role: &'static str },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Io(err.to_string())
    }
}

impl PipelineError {
    /// Errors raised while reading items; the producer recovers from these.
    #[inline]
    pub fn is_source_error(&self) -> bool {
        matches!(
            self,
            PipelineError::MalformedEntry { .. }
                | PipelineError::SourceTooLarge { .. }
                | PipelineError::Io(_)
        )
    }

    #[inline]
    pub fn is_malformed(&self) -> bool {
        matches!(self, PipelineError::MalformedEntry { .. })
    }

    #[inline]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::ThreadPanicked { .. } | PipelineError::InvalidArgument(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion_keeps_message() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = PipelineError::from(io);
        assert_eq!(err, PipelineError::Io("no such file".to_string()));
        assert!(err.is_source_error());
    }

    #[test]
    fn test_classification_helpers() {
        let malformed = PipelineError::MalformedEntry {
            token: "12x".into(),
            offset: 4,
        };
        assert!(malformed.is_malformed());
        assert!(!malformed.is_fatal());

        let panicked = PipelineError::ThreadPanicked { role: "worker" };
        assert!(panicked.is_fatal());
        assert!(!panicked.is_source_error());
    }

    #[test]
    fn test_display_messages() {
        let err = PipelineError::ConsistencyViolation {
            produced: 10,
            consumed: 9,
        };
        assert_eq!(
            err.to_string(),
            "Consistency violation: produced 10 items but consumed 9"
        );
    }
}
