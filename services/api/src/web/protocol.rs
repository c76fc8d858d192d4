//! services/api/src/web/protocol.rs
//!
//! Defines the JSON payloads exchanged between the desktop front end and the
//! API server, and their conversions to and from the core domain types.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use reading_tracker_core::{
    validation::INVERTED_RANGE_MESSAGE, Book, BookId, BookProgress, NewBook, NewSession,
    SaveReport, Session, SessionEdit, SessionId, UpdateSessionCommand, ValidationReport,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

//=========================================================================================
// Books
//=========================================================================================

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct BookDto {
    pub id: BookId,
    pub title: String,
    pub author: Option<String>,
    pub total_pages: Option<i32>,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<Book> for BookDto {
    fn from(book: Book) -> Self {
        Self {
            id: book.id,
            title: book.title,
            author: book.author,
            total_pages: book.total_pages,
            created_at: book.created_at,
        }
    }
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct CreateBookRequest {
    pub title: String,
    pub author: Option<String>,
    pub total_pages: Option<i32>,
}

impl CreateBookRequest {
    /// Checks the request and converts it into a domain value.
    pub fn into_domain(self) -> Result<NewBook, String> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err("Title must not be empty".to_string());
        }
        if matches!(self.total_pages, Some(total) if total <= 0) {
            return Err("Total pages must be positive".to_string());
        }
        Ok(NewBook {
            title,
            author: self.author.filter(|a| !a.trim().is_empty()),
            total_pages: self.total_pages,
        })
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, ToSchema)]
pub struct BookProgressDto {
    pub book_id: BookId,
    pub current_page: Option<i32>,
    pub pages_read: i32,
    pub minutes_read: i32,
    pub session_count: usize,
    pub percent_complete: Option<f64>,
    pub finished: bool,
    #[schema(value_type = Option<String>, format = Date)]
    pub last_session_date: Option<NaiveDate>,
}

impl BookProgressDto {
    pub fn new(book_id: BookId, progress: BookProgress) -> Self {
        Self {
            book_id,
            current_page: progress.current_page,
            pages_read: progress.pages_read,
            minutes_read: progress.minutes_read,
            session_count: progress.session_count,
            percent_complete: progress.percent_complete,
            finished: progress.is_finished(),
            last_session_date: progress.last_session_date,
        }
    }
}

//=========================================================================================
// Sessions
//=========================================================================================

fn check_pages(start_page: Option<i32>, end_page: Option<i32>) -> Result<(), String> {
    if start_page.is_some_and(|p| p < 0) || end_page.is_some_and(|p| p < 0) {
        return Err("Page numbers must not be negative".to_string());
    }
    Ok(())
}

fn check_minutes(minutes_read: Option<i32>) -> Result<(), String> {
    if minutes_read.is_some_and(|m| m < 0) {
        return Err("Minutes read must not be negative".to_string());
    }
    Ok(())
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct SessionDto {
    pub id: Option<SessionId>,
    pub book_id: BookId,
    #[schema(value_type = String, format = Date)]
    pub session_date: NaiveDate,
    #[schema(value_type = Option<String>)]
    pub start_time: Option<NaiveTime>,
    #[schema(value_type = Option<String>)]
    pub end_time: Option<NaiveTime>,
    pub start_page: Option<i32>,
    pub end_page: Option<i32>,
    pub pages_read: Option<i32>,
    pub minutes_read: Option<i32>,
    pub notes: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<Session> for SessionDto {
    fn from(session: Session) -> Self {
        Self {
            id: session.id,
            book_id: session.book_id,
            session_date: session.session_date,
            start_time: session.start_time,
            end_time: session.end_time,
            start_page: session.start_page,
            end_page: session.end_page,
            pages_read: session.pages_read,
            minutes_read: session.minutes_read,
            notes: session.notes,
            created_at: session.created_at,
        }
    }
}

/// Query parameters for listing sessions. Date bounds are inclusive.
#[derive(Deserialize, Debug, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListSessionsQuery {
    pub book_id: Option<BookId>,
    #[param(value_type = Option<String>, format = Date)]
    pub start_date: Option<NaiveDate>,
    #[param(value_type = Option<String>, format = Date)]
    pub end_date: Option<NaiveDate>,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct CreateSessionRequest {
    pub book_id: BookId,
    #[schema(value_type = String, format = Date)]
    pub session_date: NaiveDate,
    #[schema(value_type = Option<String>)]
    pub start_time: Option<NaiveTime>,
    #[schema(value_type = Option<String>)]
    pub end_time: Option<NaiveTime>,
    pub start_page: Option<i32>,
    pub end_page: Option<i32>,
    pub minutes_read: Option<i32>,
    pub notes: Option<String>,
}

impl CreateSessionRequest {
    /// Checks the page range and converts the request into a domain value.
    pub fn into_domain(self) -> Result<NewSession, String> {
        check_pages(self.start_page, self.end_page)?;
        check_minutes(self.minutes_read)?;
        if matches!((self.start_page, self.end_page), (Some(s), Some(e)) if e < s) {
            return Err(INVERTED_RANGE_MESSAGE.to_string());
        }
        Ok(NewSession {
            book_id: self.book_id,
            session_date: self.session_date,
            start_time: self.start_time,
            end_time: self.end_time,
            start_page: self.start_page,
            end_page: self.end_page,
            minutes_read: self.minutes_read,
            notes: self.notes,
        })
    }
}

/// Body of `PUT /sessions/{id}`; the id comes from the path.
#[derive(Deserialize, Debug, ToSchema)]
pub struct UpdateSessionRequest {
    #[schema(value_type = String, format = Date)]
    pub session_date: NaiveDate,
    #[schema(value_type = Option<String>)]
    pub start_time: Option<NaiveTime>,
    #[schema(value_type = Option<String>)]
    pub end_time: Option<NaiveTime>,
    pub start_page: Option<i32>,
    pub end_page: Option<i32>,
    pub minutes_read: Option<i32>,
}

impl UpdateSessionRequest {
    pub fn into_command(self, id: SessionId) -> Result<UpdateSessionCommand, String> {
        check_pages(self.start_page, self.end_page)?;
        check_minutes(self.minutes_read)?;
        Ok(UpdateSessionCommand {
            id,
            session_date: self.session_date,
            start_time: self.start_time,
            end_time: self.end_time,
            start_page: self.start_page,
            end_page: self.end_page,
            minutes_read: self.minutes_read,
        })
    }
}

//=========================================================================================
// Progress Correction
//=========================================================================================

/// A single field change, e.g. `{"field": "end_page", "value": 90}`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum FieldChange {
    SessionDate(NaiveDate),
    StartTime(Option<NaiveTime>),
    EndTime(Option<NaiveTime>),
    StartPage(Option<i32>),
    EndPage(Option<i32>),
    MinutesRead(Option<i32>),
    Notes(Option<String>),
}

impl FieldChange {
    /// Rejects values no session can hold. Range checks are left to validation.
    pub fn check(&self) -> Result<(), String> {
        match self {
            Self::StartPage(page) | Self::EndPage(page) => check_pages(*page, None),
            Self::MinutesRead(minutes) => check_minutes(*minutes),
            _ => Ok(()),
        }
    }
}

impl From<FieldChange> for SessionEdit {
    fn from(change: FieldChange) -> Self {
        match change {
            FieldChange::SessionDate(v) => Self::SessionDate(v),
            FieldChange::StartTime(v) => Self::StartTime(v),
            FieldChange::EndTime(v) => Self::EndTime(v),
            FieldChange::StartPage(v) => Self::StartPage(v),
            FieldChange::EndPage(v) => Self::EndPage(v),
            FieldChange::MinutesRead(v) => Self::MinutesRead(v),
            FieldChange::Notes(v) => Self::Notes(v),
        }
    }
}

/// The changes made to one session, applied in order.
#[derive(Deserialize, Serialize, Debug, Clone, ToSchema)]
pub struct SessionChanges {
    pub id: SessionId,
    #[schema(value_type = Vec<Object>)]
    pub changes: Vec<FieldChange>,
}

/// Everything staged on the progress-correction page.
#[derive(Deserialize, Serialize, Debug, Clone, Default, ToSchema)]
pub struct CorrectionRequest {
    #[serde(default)]
    pub edits: Vec<SessionChanges>,
    #[serde(default)]
    pub deletions: Vec<SessionId>,
}

/// A book's sessions together with their validation findings.
#[derive(Serialize, Debug, Clone, PartialEq, ToSchema)]
pub struct CorrectionView {
    pub book: Option<BookDto>,
    pub sessions: Vec<SessionDto>,
    pub pending_deletions: Vec<SessionId>,
    pub errors: BTreeMap<SessionId, String>,
    pub warnings: BTreeMap<SessionId, String>,
    pub can_save: bool,
}

impl CorrectionView {
    pub fn new(
        book: Option<Book>,
        sessions: Vec<Session>,
        pending_deletions: Vec<SessionId>,
        report: &ValidationReport,
    ) -> Self {
        Self {
            book: book.map(BookDto::from),
            sessions: sessions.into_iter().map(SessionDto::from).collect(),
            pending_deletions,
            errors: report.errors.clone(),
            warnings: report.warnings.clone(),
            can_save: !report.has_errors(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, ToSchema)]
pub struct SaveResponse {
    pub book_id: BookId,
    pub updated: Vec<SessionId>,
    pub deleted: Vec<SessionId>,
}

impl From<SaveReport> for SaveResponse {
    fn from(report: SaveReport) -> Self {
        Self {
            book_id: report.book_id,
            updated: report.updated,
            deleted: report.deleted,
        }
    }
}

/// Returned when saving is refused because sessions have validation errors.
///
/// An error on a session that is only marked for deletion still blocks;
/// such ids are listed in `pending_deletions` too.
#[derive(Serialize, Debug, Clone, PartialEq, ToSchema)]
pub struct ValidationFailure {
    pub message: String,
    pub count: usize,
    pub errors: BTreeMap<SessionId, String>,
    pub pending_deletions: Vec<SessionId>,
}

/// Returned when the store rejected a command partway through a save.
#[derive(Serialize, Debug, Clone, PartialEq, ToSchema)]
pub struct PartialSaveFailure {
    pub message: String,
    pub failed_step: String,
    pub failed_session: SessionId,
    pub updated: Vec<SessionId>,
    pub deleted: Vec<SessionId>,
}
