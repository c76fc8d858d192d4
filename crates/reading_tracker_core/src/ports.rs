//! crates/reading_tracker_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the reading tracker core.
//! These traits form the boundary between the pure reconciliation logic and
//! whatever backend actually stores books and sessions.

use async_trait::async_trait;
use crate::domain::{
    Book, BookId, NewBook, NewSession, Session, SessionFilter, SessionId, UpdateSessionCommand,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from the backing store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflicting change: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The command surface the progress-correction flow talks to.
#[async_trait]
pub trait SessionCommandService: Send + Sync {
    async fn list_sessions(&self, filter: SessionFilter) -> PortResult<Vec<Session>>;

    /// Persists a corrected session and returns it as stored.
    async fn update_session(&self, command: UpdateSessionCommand) -> PortResult<Session>;

    async fn delete_session(&self, id: SessionId) -> PortResult<()>;

    async fn get_book(&self, id: BookId) -> PortResult<Book>;
}

/// Creation and listing of the records the correction flow works on.
#[async_trait]
pub trait LibraryService: Send + Sync {
    async fn create_book(&self, book: NewBook) -> PortResult<Book>;

    async fn list_books(&self) -> PortResult<Vec<Book>>;

    /// Stores a new session; `pages_read` is derived from its page range.
    async fn create_session(&self, session: NewSession) -> PortResult<Session>;
}
