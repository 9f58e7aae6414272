use thiserror::Error;

use crate::error::AppError;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Invalid cron expression '{expression}': {message}")]
    InvalidCronExpression { expression: String, message: String },

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job already exists: {0}")]
    AlreadyExists(String),

    #[error("Job {0:?} is already running")]
    AlreadyRunning(String),
}

pub type JobResult<T> = Result<T, JobError>;

impl From<JobError> for AppError {
    fn from(error: JobError) -> Self {
        match error {
            JobError::NotFound(name) => AppError::NotFound {
                entity: "Job".to_string(),
                field: "name".to_string(),
                value: name,
            },
            JobError::InvalidCronExpression { expression, message } => AppError::Validation {
                field: "when".to_string(),
                reason: format!("{}: {}", expression, message),
            },
            e @ (JobError::AlreadyExists(_) | JobError::AlreadyRunning(_)) => AppError::Conflict {
                message: e.to_string(),
            },
        }
    }
}
