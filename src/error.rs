use crate::dates::InvalidDateLabel;

#[derive(Debug, thiserror::Error)]
pub enum AttendanceError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("a session already exists for this date ({date})")]
    DuplicateSession { course_id: String, date: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("no valid attendance entries remained after filtering")]
    EmptyBatch,

    #[error("no attendance records to export")]
    NoRecords,

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl AttendanceError {
    /// Error code carried in IPC error objects.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "bad_params",
            Self::DuplicateSession { .. } => "duplicate_session",
            Self::NotFound { .. } => "not_found",
            Self::EmptyBatch => "empty_batch",
            Self::NoRecords => "no_records",
            Self::StoreUnavailable(_) => "store_unavailable",
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<rusqlite::Error> for AttendanceError {
    fn from(e: rusqlite::Error) -> Self {
        Self::StoreUnavailable(e.to_string())
    }
}

impl From<InvalidDateLabel> for AttendanceError {
    fn from(e: InvalidDateLabel) -> Self {
        Self::Validation(e.to_string())
    }
}

pub type AttendanceResult<T> = Result<T, AttendanceError>;
