// THEORY:
// Every failure the detector can produce is funnelled into one `EclosionError`.
// The variants follow the run's failure taxonomy: configuration problems are
// fatal and surface before any frame is touched, `NoObjectsFound` and `NoEvents`
// are terminal "nothing to do" conditions, and `MeasurementFailure` is recovered
// per object by the analyzer. Everything else is an I/O or decoding fault of the
// frame source or the artifact writers and aborts the run.

use thiserror::Error;

/// Errors produced while detecting eclosion events.
#[derive(Error, Debug)]
pub enum EclosionError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("no objects found on the reference frame")]
    NoObjectsFound,

    #[error("no eclosion events to report")]
    NoEvents,

    #[error("object {object_id} cannot be measured on frame {frame}: {reason}")]
    MeasurementFailure {
        object_id: usize,
        frame: usize,
        reason: String,
    },

    #[error("region cannot be measured on frame {frame}: {reason}")]
    Unmeasurable { frame: usize, reason: String },

    #[error("frame {index} is outside the stack (1..={count})")]
    FrameOutOfRange { index: usize, count: usize },

    #[error("the image stack contains no frames")]
    EmptyStack,

    #[error("mosaic error: {0}")]
    Mosaic(String),

    #[error("analysis worker failed: {0}")]
    Worker(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl EclosionError {
    /// Shorthand for building a `Configuration` error from anything printable.
    pub fn config(message: impl Into<String>) -> Self {
        EclosionError::Configuration(message.into())
    }

    /// True for the conditions a run treats as "nothing to do" rather than a fault.
    pub fn is_nothing_to_do(&self) -> bool {
        matches!(self, EclosionError::NoObjectsFound | EclosionError::NoEvents)
    }
}

pub type Result<T> = std::result::Result<T, EclosionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nothing_to_do_conditions_are_not_faults() {
        assert!(EclosionError::NoObjectsFound.is_nothing_to_do());
        assert!(EclosionError::NoEvents.is_nothing_to_do());
        assert!(!EclosionError::config("bad").is_nothing_to_do());
    }

    #[test]
    fn measurement_failure_names_object_and_frame() {
        let err = EclosionError::MeasurementFailure {
            object_id: 7,
            frame: 120,
            reason: "region outside frame".into(),
        };
        assert_eq!(
            err.to_string(),
            "object 7 cannot be measured on frame 120: region outside frame"
        );
    }
}
