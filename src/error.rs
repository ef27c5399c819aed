use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for the scoring pipeline.
///
/// `Record` errors are recovered inside the batch loop (the row is skipped);
/// `Input` errors reject a submission before any row work starts; `Database`
/// errors during persistence are logged and never block the scoring response.
#[derive(Error, Debug)]
pub enum Error {
    /// The submission itself is unusable: missing file, empty table, no header.
    #[error("input error: {0}")]
    Input(String),

    /// One row could not be normalized; scoped to a single field.
    #[error("row {row}: invalid value for {field}: {message}")]
    Record {
        row: usize,
        field: &'static str,
        message: String,
    },

    /// Lifecycle operation on an upload id that does not exist.
    #[error("upload not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Error {
    pub fn record(row: usize, field: &'static str, message: impl Into<String>) -> Self {
        Error::Record {
            row,
            field,
            message: message.into(),
        }
    }
}
