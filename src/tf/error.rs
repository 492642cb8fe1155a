use std::time::Duration;

use thiserror::Error;

use crate::common::Time;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TfError {
    #[error("invalid frame id \"{0}\"")]
    InvalidFrameId(String),

    #[error("frame \"{0}\" does not exist")]
    UnknownFrame(String),

    #[error("could not find a connection between \"{target_frame}\" and \"{source_frame}\"")]
    Connectivity {
        target_frame: String,
        source_frame: String,
    },

    #[error(
        "lookup would require extrapolation at time {requested} for frame \"{frame}\", \
         data is available between {earliest} and {latest}"
    )]
    Extrapolation {
        frame: String,
        requested: Time,
        earliest: Time,
        latest: Time,
    },

    #[error("frame \"{frame}\" exceeded the maximum tree depth, the frame graph has a loop")]
    Loop { frame: String },

    #[error(
        "timed out after {timeout:?} looking up \"{target_frame}\" <- \"{source_frame}\": {cause}"
    )]
    Timeout {
        target_frame: String,
        source_frame: String,
        timeout: Duration,
        cause: Box<TfError>,
    },

    #[error("invalid transform: {0}")]
    InvalidTransform(String),
}

impl TfError {
    /// True for errors raised while answering a lookup, false for rejected inserts.
    pub fn is_lookup_failure(&self) -> bool {
        !matches!(self, TfError::InvalidTransform(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_includes_cause() {
        let err = TfError::Timeout {
            target_frame: "base_link".into(),
            source_frame: "laser".into(),
            timeout: Duration::from_millis(200),
            cause: Box::new(TfError::UnknownFrame("laser".into())),
        };
        let msg = err.to_string();
        assert!(msg.contains("200ms"));
        assert!(msg.contains("frame \"laser\" does not exist"));
        assert!(err.is_lookup_failure());
    }

    #[test]
    fn test_invalid_transform_is_not_lookup_failure() {
        assert!(!TfError::InvalidTransform("nan".into()).is_lookup_failure());
    }
}
