use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AttendError {
    #[error("Invalid student ID format")]
    InvalidFormat,

    #[error("Student not found")]
    StudentNotFound,

    #[error("IP rule not found")]
    RuleNotFound,

    #[error("Attendance system is currently disabled")]
    SystemDisabled,

    #[error("Check-in is not allowed from this network")]
    UnauthorizedNetwork,

    #[error("You already marked attendance for today")]
    AlreadyMarked,

    #[error("IP address already exists")]
    DuplicateRule,

    #[error("{0}")]
    Validation(String),

    #[error("Store is busy, try again")]
    TransientStore(#[source] rusqlite::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AttendError {
    /// Stable machine-readable kind carried in the IPC error payload.
    pub fn code(&self) -> &'static str {
        match self {
            AttendError::InvalidFormat => "invalid_format",
            AttendError::StudentNotFound | AttendError::RuleNotFound => "not_found",
            AttendError::SystemDisabled => "system_disabled",
            AttendError::UnauthorizedNetwork => "unauthorized_network",
            AttendError::AlreadyMarked => "already_marked",
            AttendError::DuplicateRule => "duplicate_rule",
            AttendError::Validation(_) => "validation_error",
            AttendError::TransientStore(_) => "transient_store_error",
            AttendError::Internal(_) => "internal_error",
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, AttendError::TransientStore(_))
    }

    /// Message safe to show the end user. Internal details stay in the log.
    pub fn user_message(&self) -> String {
        match self {
            AttendError::Internal(_) => "Internal error".to_string(),
            other => other.to_string(),
        }
    }
}

pub fn is_busy(e: &rusqlite::Error) -> bool {
    matches!(
        e.sqlite_error_code(),
        Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked)
    )
}

pub fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(e.sqlite_error_code(), Some(ErrorCode::ConstraintViolation))
}

impl From<rusqlite::Error> for AttendError {
    fn from(e: rusqlite::Error) -> Self {
        if is_busy(&e) {
            AttendError::TransientStore(e)
        } else {
            AttendError::Internal(e.to_string())
        }
    }
}

pub type AttendResult<T> = Result<T, AttendError>;
