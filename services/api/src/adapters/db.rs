//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `SessionCommandService` and `LibraryService` ports from the core crate.
//! It handles all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use reading_tracker_core::domain::{
    derive_pages_read, Book, BookId, NewBook, NewSession, Session, SessionFilter, SessionId,
    UpdateSessionCommand,
};
use reading_tracker_core::ports::{
    LibraryService, PortError, PortResult, SessionCommandService,
};
use sqlx::{FromRow, PgPool};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the store ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

/// Maps a driver error onto the port taxonomy.
fn port_error(e: sqlx::Error) -> PortError {
    match &e {
        sqlx::Error::RowNotFound => PortError::NotFound(e.to_string()),
        // foreign_key_violation
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23503") => {
            PortError::Conflict(db.message().to_string())
        }
        _ => PortError::Unexpected(e.to_string()),
    }
}

const SESSION_COLUMNS: &str = "id, book_id, session_date, start_time, end_time, start_page, \
     end_page, pages_read, minutes_read, notes, created_at";

const BOOK_COLUMNS: &str = "id, title, author, total_pages, created_at";

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct BookRecord {
    id: i64,
    title: String,
    author: Option<String>,
    total_pages: Option<i32>,
    created_at: DateTime<Utc>,
}
impl BookRecord {
    fn to_domain(self) -> Book {
        Book {
            id: self.id,
            title: self.title,
            author: self.author,
            total_pages: self.total_pages,
            created_at: Some(self.created_at),
        }
    }
}

#[derive(FromRow)]
struct SessionRecord {
    id: i64,
    book_id: i64,
    session_date: NaiveDate,
    start_time: Option<NaiveTime>,
    end_time: Option<NaiveTime>,
    start_page: Option<i32>,
    end_page: Option<i32>,
    pages_read: Option<i32>,
    minutes_read: Option<i32>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}
impl SessionRecord {
    fn to_domain(self) -> Session {
        Session {
            id: Some(self.id),
            book_id: self.book_id,
            session_date: self.session_date,
            start_time: self.start_time,
            end_time: self.end_time,
            start_page: self.start_page,
            end_page: self.end_page,
            pages_read: self.pages_read,
            minutes_read: self.minutes_read,
            notes: self.notes,
            created_at: Some(self.created_at),
        }
    }
}

//=========================================================================================
// `SessionCommandService` Trait Implementation
//=========================================================================================

#[async_trait]
impl SessionCommandService for DbAdapter {
    async fn list_sessions(&self, filter: SessionFilter) -> PortResult<Vec<Session>> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM reading_sessions \
             WHERE ($1::BIGINT IS NULL OR book_id = $1) \
               AND ($2::DATE IS NULL OR session_date >= $2) \
               AND ($3::DATE IS NULL OR session_date <= $3) \
             ORDER BY session_date DESC, created_at DESC"
        );
        let records = sqlx::query_as::<_, SessionRecord>(&sql)
            .bind(filter.book_id)
            .bind(filter.start_date)
            .bind(filter.end_date)
            .fetch_all(&self.pool)
            .await
            .map_err(port_error)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn update_session(&self, command: UpdateSessionCommand) -> PortResult<Session> {
        // pages_read follows the page range when it is complete and ordered,
        // otherwise the stored value is kept.
        let sql = format!(
            "UPDATE reading_sessions SET \
                 session_date = $2, start_time = $3, end_time = $4, \
                 start_page = $5, end_page = $6, minutes_read = $7, \
                 pages_read = CASE \
                     WHEN $5::INTEGER IS NOT NULL AND $6::INTEGER IS NOT NULL AND $6::INTEGER >= $5::INTEGER \
                     THEN $6::INTEGER - $5::INTEGER \
                     ELSE pages_read END, \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {SESSION_COLUMNS}"
        );
        let record = sqlx::query_as::<_, SessionRecord>(&sql)
            .bind(command.id)
            .bind(command.session_date)
            .bind(command.start_time)
            .bind(command.end_time)
            .bind(command.start_page)
            .bind(command.end_page)
            .bind(command.minutes_read)
            .fetch_optional(&self.pool)
            .await
            .map_err(port_error)?
            .ok_or_else(|| PortError::NotFound(format!("Session {} not found", command.id)))?;

        Ok(record.to_domain())
    }

    async fn delete_session(&self, id: SessionId) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM reading_sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(port_error)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Session {} not found", id)));
        }
        Ok(())
    }

    async fn get_book(&self, id: BookId) -> PortResult<Book> {
        let sql = format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = $1");
        let record = sqlx::query_as::<_, BookRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(port_error)?
            .ok_or_else(|| PortError::NotFound(format!("Book {} not found", id)))?;

        Ok(record.to_domain())
    }
}

//=========================================================================================
// `LibraryService` Trait Implementation
//=========================================================================================

#[async_trait]
impl LibraryService for DbAdapter {
    async fn create_book(&self, book: NewBook) -> PortResult<Book> {
        let sql = format!(
            "INSERT INTO books (title, author, total_pages) VALUES ($1, $2, $3) \
             RETURNING {BOOK_COLUMNS}"
        );
        let record = sqlx::query_as::<_, BookRecord>(&sql)
            .bind(book.title)
            .bind(book.author)
            .bind(book.total_pages)
            .fetch_one(&self.pool)
            .await
            .map_err(port_error)?;

        Ok(record.to_domain())
    }

    async fn list_books(&self) -> PortResult<Vec<Book>> {
        let sql = format!("SELECT {BOOK_COLUMNS} FROM books ORDER BY created_at DESC");
        let records = sqlx::query_as::<_, BookRecord>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(port_error)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn create_session(&self, session: NewSession) -> PortResult<Session> {
        let sql = format!(
            "INSERT INTO reading_sessions \
                 (book_id, session_date, start_time, end_time, start_page, end_page, \
                  pages_read, minutes_read, notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {SESSION_COLUMNS}"
        );
        let record = sqlx::query_as::<_, SessionRecord>(&sql)
            .bind(session.book_id)
            .bind(session.session_date)
            .bind(session.start_time)
            .bind(session.end_time)
            .bind(session.start_page)
            .bind(session.end_page)
            .bind(derive_pages_read(session.start_page, session.end_page))
            .bind(session.minutes_read)
            .bind(session.notes)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match port_error(e) {
                PortError::Conflict(_) => {
                    PortError::NotFound(format!("Book {} not found", session.book_id))
                }
                other => other,
            })?;

        Ok(record.to_domain())
    }
}
