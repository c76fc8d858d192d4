//! crates/reading_tracker_core/src/domain.rs
//!
//! Defines the pure, core data structures for the reading tracker.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

pub type SessionId = i64;
pub type BookId = i64;

/// A single recorded reading event, tied to exactly one book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Present for every session that has been persisted.
    pub id: Option<SessionId>,
    pub book_id: BookId,
    pub session_date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub start_page: Option<i32>,
    pub end_page: Option<i32>,
    pub pages_read: Option<i32>,
    /// Used for audio books and other duration-tracked reading.
    pub minutes_read: Option<i32>,
    pub notes: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn has_inverted_range(&self) -> bool {
        matches!((self.start_page, self.end_page), (Some(start), Some(end)) if end < start)
    }
}

/// Computes the pages covered by a page range, if it is complete, not
/// inverted, and its length fits in an `i32`.
pub fn derive_pages_read(start_page: Option<i32>, end_page: Option<i32>) -> Option<i32> {
    match (start_page, end_page) {
        (Some(start), Some(end)) if end >= start => end.checked_sub(start),
        _ => None,
    }
}

/// A book being tracked. Only `total_pages` matters to session validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: Option<String>,
    pub total_pages: Option<i32>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Narrows a session listing. Date bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFilter {
    pub book_id: Option<BookId>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl SessionFilter {
    pub fn for_book(book_id: BookId) -> Self {
        Self {
            book_id: Some(book_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, session: &Session) -> bool {
        self.book_id.map_or(true, |id| session.book_id == id)
            && self.start_date.map_or(true, |d| session.session_date >= d)
            && self.end_date.map_or(true, |d| session.session_date <= d)
    }
}

/// The payload sent to the store when a corrected session is persisted.
/// Notes are not part of a progress correction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateSessionCommand {
    pub id: SessionId,
    pub session_date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub start_page: Option<i32>,
    pub end_page: Option<i32>,
    pub minutes_read: Option<i32>,
}

impl UpdateSessionCommand {
    pub fn from_session(id: SessionId, session: &Session) -> Self {
        Self {
            id,
            session_date: session.session_date,
            start_time: session.start_time,
            end_time: session.end_time,
            start_page: session.start_page,
            end_page: session.end_page,
            minutes_read: session.minutes_read,
        }
    }
}

/// A session that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSession {
    pub book_id: BookId,
    pub session_date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub start_page: Option<i32>,
    pub end_page: Option<i32>,
    pub minutes_read: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBook {
    pub title: String,
    pub author: Option<String>,
    pub total_pages: Option<i32>,
}
