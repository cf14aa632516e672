use sea_orm::DbErr;

use crate::face::FaceError;

/// Every failure an attendance operation can surface to a caller.
///
/// Messages are user-facing. `Database` and `Internal` are the only variants the
/// HTTP layer hides behind a generic message.
#[derive(Debug, thiserror::Error)]
pub enum AttendanceError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error("You are outside the geofence area. You are {distance:.2} meters away from the allowed location.")]
    GeofenceRejected { distance: f64 },

    #[error("Face authentication failed. Similarity score {score:.2} is below the required threshold.")]
    FaceAuthRejected { score: f32 },

    #[error("No active attendance schedule for this room at this time")]
    NoActiveWindow,

    #[error("You have already marked attendance for the current schedule")]
    AlreadyMarked,

    #[error("Face verification timed out. Please try again.")]
    Timeout,

    #[error("No face detected in the image")]
    NoFaceDetected,

    #[error("No registered face found. Please register your face first.")]
    NoEnrollment,

    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AttendanceError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn forbidden(why: impl Into<String>) -> Self {
        Self::Forbidden(why.into())
    }

    pub fn conflict(why: impl Into<String>) -> Self {
        Self::Conflict(why.into())
    }

    pub fn validation(why: impl Into<String>) -> Self {
        Self::Validation(why.into())
    }
}

impl From<FaceError> for AttendanceError {
    fn from(err: FaceError) -> Self {
        match err {
            FaceError::NoFaceDetected => Self::NoFaceDetected,
            FaceError::NoEnrollment => Self::NoEnrollment,
            FaceError::InvalidImage(msg) => Self::Validation(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}
