use common::OrderId;
use domain::ValidationError;
use sqlx::error::ErrorKind;
use thiserror::Error;

/// Constraint that makes `order_uid` the natural key of an order.
pub const ORDER_UID_CONSTRAINT: &str = "orders_order_uid_key";

/// Errors that can occur when interacting with the order store.
///
/// Operation failures name the operation that produced them (`op`) and keep
/// the driver error as their source, so callers can match on the variant
/// instead of the message text.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No complete order exists for the id.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// An order with the same `order_uid` is already stored.
    #[error("Order already exists: {order_uid}")]
    Duplicate { order_uid: String },

    /// A database call failed.
    #[error("{op}: database error: {source}")]
    Database {
        op: &'static str,
        #[source]
        source: sqlx::Error,
    },

    /// The store could not serve the call (used by non-SQL backends).
    #[error("{op}: store unavailable: {reason}")]
    Unavailable { op: &'static str, reason: String },

    /// The connection pool could not be established.
    #[error("Connection error: {0}")]
    Connect(#[source] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The order was rejected before reaching the store.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl StoreError {
    /// Wraps a driver error with the name of the failing operation.
    pub fn database(op: &'static str, source: sqlx::Error) -> Self {
        StoreError::Database { op, source }
    }

    /// Returns true if the order does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    /// Returns true if the order was already stored.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::Duplicate { .. })
    }

    /// Returns true if repeating the call may succeed.
    ///
    /// Lookups that found nothing, duplicates, rejected orders and rows the
    /// database refuses are permanent; I/O and pool failures are transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Database { source, .. } => is_transient(source),
            StoreError::Unavailable { .. } | StoreError::Connect(_) => true,
            StoreError::NotFound(_)
            | StoreError::Duplicate { .. }
            | StoreError::Migration(_)
            | StoreError::Validation(_) => false,
        }
    }
}

/// SQLSTATE classes that repeating the statement cannot fix: data
/// exceptions, integrity violations, and syntax or access errors.
const PERMANENT_SQLSTATE_CLASSES: [&str; 3] = ["22", "23", "42"];

fn is_transient(source: &sqlx::Error) -> bool {
    match source {
        sqlx::Error::Database(db_err) => match db_err.kind() {
            ErrorKind::UniqueViolation
            | ErrorKind::ForeignKeyViolation
            | ErrorKind::NotNullViolation
            | ErrorKind::CheckViolation => false,
            _ => !db_err.code().is_some_and(|code| {
                PERMANENT_SQLSTATE_CLASSES
                    .iter()
                    .any(|class| code.starts_with(class))
            }),
        },
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::WorkerCrashed => true,
        _ => false,
    }
}

/// Result type for order store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Attaches an operation name to sqlx results.
pub(crate) trait DbResultExt<T> {
    fn op(self, op: &'static str) -> Result<T>;
}

impl<T> DbResultExt<T> for std::result::Result<T, sqlx::Error> {
    fn op(self, op: &'static str) -> Result<T> {
        self.map_err(|e| StoreError::database(op, e))
    }
}
