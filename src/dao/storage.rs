use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors surfaced by a statistics store.
///
/// The engine treats every storage failure as non-fatal: a settled match is
/// still announced, only the `stored` flag on the settlement event flips.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backing store cannot be reached or rejected the write.
    #[error("stats store unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },
}
