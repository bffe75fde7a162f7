use thiserror::Error;

/// Errors raised while reading inspection data.
///
/// The rule evaluator never lets these escape; each one becomes a
/// low-priority `system_error` alert for the check that hit it.
#[derive(Debug, Error)]
pub enum DataError {
    /// The backing store could not be reached
    #[error("data source unavailable: {0}")]
    Unavailable(String),

    /// The database rejected or failed a query
    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),

    /// An offline CSV snapshot could not be read
    #[error("csv snapshot unreadable: {0}")]
    Csv(#[from] csv::Error),

    /// A look-back window reaches outside the supported calendar
    #[error("window of {days} days is out of range")]
    InvalidWindow { days: i64 },
}

impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::Unavailable(err.to_string())
            }
            other => Self::Query(other),
        }
    }
}
