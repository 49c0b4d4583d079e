/// Result alias that carries the custom [`StageError`] type.
pub type Result<T> = std::result::Result<T, StageError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// A clip identifier could not be resolved into a skeleton and clip.
    /// Reported per rig; the rig never enters the registry.
    #[error("clip load error ({url}) for `{source_id}`: {reason}")]
    Load {
        source_id: String,
        url: String,
        reason: String,
    },
    /// The handle handed to `duplicate` is not something this engine built.
    #[error("invalid duplication source: {0}")]
    InvalidDuplicate(String),
    /// Syntax error while reading a BVH document.
    #[error("bvh parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl StageError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    /// Identifier of the clip source this error is about, if any.
    pub fn source_id(&self) -> Option<&str> {
        match self {
            Self::Load { source_id, .. } => Some(source_id),
            _ => None,
        }
    }
}

impl From<&str> for StageError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for StageError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_errors_name_their_source() {
        let err = StageError::Load {
            source_id: "dance".to_string(),
            url: "./assets/dance.bvh".to_string(),
            reason: "file not found".to_string(),
        };

        assert_eq!(err.source_id(), Some("dance"));
        let text = err.to_string();
        assert!(text.contains("./assets/dance.bvh"));
        assert!(text.contains("file not found"));
    }

    #[test]
    fn parse_errors_report_line_numbers() {
        let err = StageError::parse(12, "expected OFFSET");
        assert_eq!(err.to_string(), "bvh parse error on line 12: expected OFFSET");
        assert!(err.source_id().is_none());
    }
}
