use std::path::PathBuf;

use thiserror::Error;

/// Failures that stop a run or reject its configuration.
///
/// Per-row and per-detection problems (malformed tensor rows, out-of-range
/// class ids, degenerate zones) are recovered where they occur and never show
/// up here.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("frame source unreadable: {reason}")]
    FrameSourceUnreadable { reason: String },

    #[error("output sink unwritable: {reason}")]
    OutputSinkUnwritable { reason: String },

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("cannot load class names from {}: {reason}", path.display())]
    InvalidNames { path: PathBuf, reason: String },

    #[error("analysis worker panicked on frame {frame}")]
    WorkerPanicked { frame: u64 },
}

impl PipelineError {
    pub fn source_unreadable(reason: impl Into<String>) -> Self {
        Self::FrameSourceUnreadable {
            reason: reason.into(),
        }
    }

    pub fn sink_unwritable(reason: impl Into<String>) -> Self {
        Self::OutputSinkUnwritable {
            reason: reason.into(),
        }
    }

    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// True for the errors that move the driver into `Aborted`.
    pub fn is_fatal_io(&self) -> bool {
        matches!(
            self,
            Self::FrameSourceUnreadable { .. }
                | Self::OutputSinkUnwritable { .. }
                | Self::WorkerPanicked { .. }
        )
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_are_fatal_and_config_errors_are_not() {
        assert!(PipelineError::source_unreadable("eof mid-packet").is_fatal_io());
        assert!(PipelineError::sink_unwritable("disk full").is_fatal_io());
        assert!(PipelineError::WorkerPanicked { frame: 7 }.is_fatal_io());
        assert!(!PipelineError::invalid_config("nms_threshold 1.5").is_fatal_io());
    }

    #[test]
    fn messages_carry_the_specific_reason() {
        let err = PipelineError::sink_unwritable("permission denied on out/000001.png");
        assert_eq!(
            err.to_string(),
            "output sink unwritable: permission denied on out/000001.png"
        );
    }
}
