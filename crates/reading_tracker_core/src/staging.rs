//! crates/reading_tracker_core/src/staging.rs
//!
//! The edit staging buffer: pending per-field edits and pending deletions for a
//! book's sessions, held as overlays on top of the loaded sessions. The loaded
//! sessions themselves are never mutated.

use chrono::{NaiveDate, NaiveTime};

use crate::domain::{derive_pages_read, Session, SessionId};
use crate::ordering::sorted_sessions;

/// The fields a staged edit can touch. `PagesRead` is never edited directly;
/// it changes as a consequence of a page edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionField {
    SessionDate,
    StartTime,
    EndTime,
    StartPage,
    EndPage,
    PagesRead,
    MinutesRead,
    Notes,
}

/// One field edit, carrying its new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEdit {
    SessionDate(NaiveDate),
    StartTime(Option<NaiveTime>),
    EndTime(Option<NaiveTime>),
    StartPage(Option<i32>),
    EndPage(Option<i32>),
    MinutesRead(Option<i32>),
    Notes(Option<String>),
}

impl SessionEdit {
    pub fn field(&self) -> SessionField {
        match self {
            Self::SessionDate(_) => SessionField::SessionDate,
            Self::StartTime(_) => SessionField::StartTime,
            Self::EndTime(_) => SessionField::EndTime,
            Self::StartPage(_) => SessionField::StartPage,
            Self::EndPage(_) => SessionField::EndPage,
            Self::MinutesRead(_) => SessionField::MinutesRead,
            Self::Notes(_) => SessionField::Notes,
        }
    }
}

/// Field overrides for one session. An outer `None` means "unchanged"; for
/// nullable fields `Some(None)` means "cleared".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionPatch {
    pub session_date: Option<NaiveDate>,
    pub start_time: Option<Option<NaiveTime>>,
    pub end_time: Option<Option<NaiveTime>>,
    pub start_page: Option<Option<i32>>,
    pub end_page: Option<Option<i32>>,
    pub pages_read: Option<Option<i32>>,
    pub minutes_read: Option<Option<i32>>,
    pub notes: Option<Option<String>>,
}

impl SessionPatch {
    pub fn set(&mut self, edit: SessionEdit) {
        match edit {
            SessionEdit::SessionDate(v) => self.session_date = Some(v),
            SessionEdit::StartTime(v) => self.start_time = Some(v),
            SessionEdit::EndTime(v) => self.end_time = Some(v),
            SessionEdit::StartPage(v) => self.start_page = Some(v),
            SessionEdit::EndPage(v) => self.end_page = Some(v),
            SessionEdit::MinutesRead(v) => self.minutes_read = Some(v),
            SessionEdit::Notes(v) => self.notes = Some(v),
        }
    }

    pub fn apply_to(&self, base: &Session) -> Session {
        let mut session = base.clone();
        if let Some(v) = self.session_date {
            session.session_date = v;
        }
        if let Some(v) = self.start_time {
            session.start_time = v;
        }
        if let Some(v) = self.end_time {
            session.end_time = v;
        }
        if let Some(v) = self.start_page {
            session.start_page = v;
        }
        if let Some(v) = self.end_page {
            session.end_page = v;
        }
        if let Some(v) = self.pages_read {
            session.pages_read = v;
        }
        if let Some(v) = self.minutes_read {
            session.minutes_read = v;
        }
        if let Some(v) = &self.notes {
            session.notes = v.clone();
        }
        session
    }

    pub fn changed_fields(&self) -> Vec<SessionField> {
        [
            (self.session_date.is_some(), SessionField::SessionDate),
            (self.start_time.is_some(), SessionField::StartTime),
            (self.end_time.is_some(), SessionField::EndTime),
            (self.start_page.is_some(), SessionField::StartPage),
            (self.end_page.is_some(), SessionField::EndPage),
            (self.pages_read.is_some(), SessionField::PagesRead),
            (self.minutes_read.is_some(), SessionField::MinutesRead),
            (self.notes.is_some(), SessionField::Notes),
        ]
        .into_iter()
        .filter_map(|(changed, field)| changed.then_some(field))
        .collect()
    }
}

/// A pending edit: the session as loaded plus the fields changed since.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedEdit {
    id: SessionId,
    base: Session,
    overrides: SessionPatch,
}

impl StagedEdit {
    fn new(id: SessionId, base: Session) -> Self {
        Self {
            id,
            base,
            overrides: SessionPatch::default(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn base(&self) -> &Session {
        &self.base
    }

    pub fn overrides(&self) -> &SessionPatch {
        &self.overrides
    }

    /// The session as it would be saved.
    pub fn current(&self) -> Session {
        self.overrides.apply_to(&self.base)
    }

    pub fn changed_fields(&self) -> Vec<SessionField> {
        self.overrides.changed_fields()
    }

    fn apply(&mut self, edit: SessionEdit) {
        let touches_pages = matches!(
            edit.field(),
            SessionField::StartPage | SessionField::EndPage
        );
        self.overrides.set(edit);
        if touches_pages {
            let current = self.current();
            // An incomplete or inverted range leaves the previous value alone.
            if let Some(pages) = derive_pages_read(current.start_page, current.end_page) {
                self.overrides.pages_read = Some(Some(pages));
            }
        }
    }
}

/// Pending edits and deletions for one book's sessions.
#[derive(Debug, Clone, Default)]
pub struct StagingBuffer {
    sorted: Vec<Session>,
    editing: Vec<StagedEdit>,
    deleting: Vec<SessionId>,
}

impl StagingBuffer {
    pub fn new(sessions: Vec<Session>) -> Self {
        Self {
            sorted: sorted_sessions(sessions),
            editing: Vec::new(),
            deleting: Vec::new(),
        }
    }

    /// The loaded sessions, newest first, without any staged changes.
    pub fn sorted_sessions(&self) -> &[Session] {
        &self.sorted
    }

    /// Replaces the loaded sessions. Pending edits and deletions are kept.
    pub fn reload(&mut self, sessions: Vec<Session>) {
        self.sorted = sorted_sessions(sessions);
    }

    /// Stages one field edit. Returns false if no loaded session has `id`.
    pub fn edit_session(&mut self, id: SessionId, edit: SessionEdit) -> bool {
        let index = match self.editing.iter().position(|e| e.id == id) {
            Some(index) => index,
            None => {
                let Some(base) = self.sorted.iter().find(|s| s.id == Some(id)) else {
                    return false;
                };
                self.editing.push(StagedEdit::new(id, base.clone()));
                self.editing.len() - 1
            }
        };
        self.editing[index].apply(edit);
        true
    }

    pub fn delete_session(&mut self, id: SessionId) {
        if !self.deleting.contains(&id) {
            self.deleting.push(id);
        }
    }

    pub fn cancel_delete(&mut self, id: SessionId) {
        self.deleting.retain(|&d| d != id);
    }

    pub fn clear(&mut self) {
        self.editing.clear();
        self.deleting.clear();
    }

    /// Drops the staged edit for `id`, if any.
    pub fn discard_edit(&mut self, id: SessionId) {
        self.editing.retain(|e| e.id != id);
    }

    /// Staged edits in the order they were first made.
    pub fn editing_sessions(&self) -> &[StagedEdit] {
        &self.editing
    }

    pub fn staged(&self, id: SessionId) -> Option<&StagedEdit> {
        self.editing.iter().find(|e| e.id == id)
    }

    /// Ids marked for deletion in the order they were marked.
    pub fn deleting_sessions(&self) -> &[SessionId] {
        &self.deleting
    }

    pub fn is_deleting(&self, id: SessionId) -> bool {
        self.deleting.contains(&id)
    }

    pub fn has_changes(&self) -> bool {
        !self.editing.is_empty() || !self.deleting.is_empty()
    }

    /// The sessions as they would look after saving: staged edits applied,
    /// sessions marked for deletion left out, re-sorted.
    pub fn working_sessions(&self) -> Vec<Session> {
        let working = self
            .sorted
            .iter()
            .filter(|s| !s.id.is_some_and(|id| self.is_deleting(id)))
            .map(|s| match s.id.and_then(|id| self.staged(id)) {
                Some(staged) => staged.current(),
                None => s.clone(),
            })
            .collect();
        sorted_sessions(working)
    }
}
