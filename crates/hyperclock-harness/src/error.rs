use hyperclock_core::ConnectionError;

/// Errors that stop a harness run before any invocation is dispatched.
///
/// Failures of individual invocations never surface here; they are counted
/// in the [`RunReport`](crate::RunReport).
#[derive(thiserror::Error, Debug)]
pub enum HarnessError {
    #[error("max_concurrency must be at least 1")]
    InvalidConcurrency,

    /// The shared connection could not be opened.
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}
