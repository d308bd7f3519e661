use thiserror::Error;

/// Status codes reported by the tracker layer.
///
/// Each status carries a stable numeric code, a symbolic name and a human
/// explanation; all three are surfaced verbatim in device-level error
/// replies on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerStatus {
    Ok,
    NotConnected,
    NoTrackerFound,
    InvalidParameter,
    NotSupported,
    LicenseError,
    InternalError,
}

impl TrackerStatus {
    pub fn code(&self) -> i32 {
        match self {
            TrackerStatus::Ok => 0,
            TrackerStatus::NotConnected => 1,
            TrackerStatus::NoTrackerFound => 2,
            TrackerStatus::InvalidParameter => 3,
            TrackerStatus::NotSupported => 4,
            TrackerStatus::LicenseError => 5,
            TrackerStatus::InternalError => 6,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            TrackerStatus::Ok => "STATUS_OK",
            TrackerStatus::NotConnected => "STATUS_NOT_CONNECTED",
            TrackerStatus::NoTrackerFound => "STATUS_NO_TRACKER_FOUND",
            TrackerStatus::InvalidParameter => "STATUS_INVALID_PARAMETER",
            TrackerStatus::NotSupported => "STATUS_NOT_SUPPORTED",
            TrackerStatus::LicenseError => "STATUS_LICENSE_ERROR",
            TrackerStatus::InternalError => "STATUS_INTERNAL_ERROR",
        }
    }

    pub fn explanation(&self) -> &'static str {
        match self {
            TrackerStatus::Ok => "The operation completed successfully.",
            TrackerStatus::NotConnected => "No eye tracker is connected.",
            TrackerStatus::NoTrackerFound => "No eye tracker could be found.",
            TrackerStatus::InvalidParameter => {
                "A parameter was out of range or not accepted by the device."
            }
            TrackerStatus::NotSupported => "The operation is not supported by this device.",
            TrackerStatus::LicenseError => "The license could not be validated or applied.",
            TrackerStatus::InternalError => "An internal error occurred in the tracker layer.",
        }
    }
}

/// Errors surfaced by the device wrapper
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("{context}: {}", .status.explanation())]
    Device {
        status: TrackerStatus,
        context: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TrackerError {
    pub fn device(status: TrackerStatus, context: impl Into<String>) -> Self {
        Self::Device {
            status,
            context: context.into(),
        }
    }

    /// Status for wire-level reporting; IO failures map to an internal error.
    pub fn status(&self) -> TrackerStatus {
        match self {
            TrackerError::Device { status, .. } => *status,
            TrackerError::Io(_) => TrackerStatus::InternalError,
        }
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_are_distinct() {
        let all = [
            TrackerStatus::Ok,
            TrackerStatus::NotConnected,
            TrackerStatus::NoTrackerFound,
            TrackerStatus::InvalidParameter,
            TrackerStatus::NotSupported,
            TrackerStatus::LicenseError,
            TrackerStatus::InternalError,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a.code(), b.code());
                assert_ne!(a.symbol(), b.symbol());
            }
        }
    }

    #[test]
    fn io_errors_report_internal_status() {
        let err = TrackerError::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(err.status(), TrackerStatus::InternalError);
    }
}
