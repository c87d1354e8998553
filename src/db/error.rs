use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique-constraint violation. The webhook flow treats this as a benign
    /// creation race: re-fetch the existing row and continue.
    #[error("Conflict: {0}")]
    Conflict(String),
}
