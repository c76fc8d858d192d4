//! crates/reading_tracker_core/src/reconcile.rs
//!
//! The reconciliation session: one book's session history, the edits and
//! deletions staged against it, and the validation snapshot that gates saving.
//! `save_all` commits the staged changes through a `SessionCommandService`.

use std::fmt;

use chrono::NaiveDate;
use tracing::{debug, error, info, warn};

use crate::domain::{Book, BookId, Session, SessionFilter, SessionId, UpdateSessionCommand};
use crate::ports::{PortError, SessionCommandService};
use crate::staging::{SessionEdit, StagingBuffer};
use crate::validation::{validate, ValidationReport, INVERTED_RANGE_MESSAGE};

//=========================================================================================
// Save Outcome Types
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStep {
    Update,
    Delete,
}

impl fmt::Display for SaveStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Update => f.write_str("update"),
            Self::Delete => f.write_str("delete"),
        }
    }
}

/// The ids committed by a save, in the order the commands were issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub book_id: BookId,
    pub updated: Vec<SessionId>,
    pub deleted: Vec<SessionId>,
}

impl SaveReport {
    fn new(book_id: BookId) -> Self {
        Self {
            book_id,
            updated: Vec::new(),
            deleted: Vec::new(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    /// Nothing was sent to the store.
    #[error("Cannot save: {count} session(s) have validation errors")]
    Validation { count: usize },

    /// The store rejected a command. Everything in `committed` was stored and
    /// has been dropped from the staging buffer; the rest is still staged.
    #[error("Failed to {step} session {id}: {source}")]
    Persistence {
        step: SaveStep,
        id: SessionId,
        committed: SaveReport,
        #[source]
        source: PortError,
    },

    /// All changes were stored but the session list could not be reloaded.
    #[error("Changes saved, but reloading sessions failed: {0}")]
    Refresh(#[source] PortError),
}

//=========================================================================================
// ReconciliationSession
//=========================================================================================

/// The working set of the progress-correction flow for a single book.
#[derive(Debug, Clone)]
pub struct ReconciliationSession {
    book_id: BookId,
    book: Option<Book>,
    staging: StagingBuffer,
    report: ValidationReport,
    today: NaiveDate,
}

impl ReconciliationSession {
    /// Loads the book and its sessions from the store and validates them.
    pub async fn load(
        service: &dyn SessionCommandService,
        book_id: BookId,
        today: NaiveDate,
    ) -> Result<Self, PortError> {
        let book = service.get_book(book_id).await?;
        let sessions = service.list_sessions(SessionFilter::for_book(book_id)).await?;
        debug!("Loaded {} sessions for book {}", sessions.len(), book_id);
        Ok(Self::from_parts(book_id, Some(book), sessions, today))
    }

    pub fn from_parts(
        book_id: BookId,
        book: Option<Book>,
        sessions: Vec<Session>,
        today: NaiveDate,
    ) -> Self {
        let mut reconciliation = Self {
            book_id,
            book,
            staging: StagingBuffer::new(sessions),
            report: ValidationReport::default(),
            today,
        };
        reconciliation.revalidate();
        reconciliation
    }

    pub fn book_id(&self) -> BookId {
        self.book_id
    }

    pub fn book(&self) -> Option<&Book> {
        self.book.as_ref()
    }

    pub fn staging(&self) -> &StagingBuffer {
        &self.staging
    }

    pub fn report(&self) -> &ValidationReport {
        &self.report
    }

    pub fn sorted_sessions(&self) -> &[Session] {
        self.staging.sorted_sessions()
    }

    pub fn working_sessions(&self) -> Vec<Session> {
        self.staging.working_sessions()
    }

    /// Saving is offered only while the snapshot holds no errors.
    pub fn can_save(&self) -> bool {
        !self.report.has_errors()
    }

    /// Stages a field edit and drops any error shown for that session until
    /// the next `revalidate`. Returns false if the session is unknown.
    pub fn edit_session(&mut self, id: SessionId, edit: SessionEdit) -> bool {
        if !self.staging.edit_session(id, edit) {
            return false;
        }
        self.report.clear_error(id);
        true
    }

    pub fn delete_session(&mut self, id: SessionId) {
        self.staging.delete_session(id);
    }

    pub fn cancel_delete(&mut self, id: SessionId) {
        self.staging.cancel_delete(id);
    }

    /// Discards all staged edits and deletions.
    pub fn cancel(&mut self) {
        self.staging.clear();
        self.revalidate();
    }

    /// Recomputes the snapshot from the sessions as they would be saved.
    pub fn revalidate(&mut self) {
        self.report = validate(&self.staging.working_sessions(), self.book.as_ref(), self.today);
    }

    /// Commits staged edits, then staged deletions, one command at a time.
    ///
    /// Before any command is issued every staged edit is re-checked for an
    /// inverted page range, including edits on sessions marked for deletion.
    /// Only that rule is re-checked; a page beyond the book's total does not
    /// stop the save. Once the save goes ahead, a session marked for deletion
    /// is deleted and never updated.
    /// On the first rejected command the save stops; see [`SaveError::Persistence`].
    pub async fn save_all(
        &mut self,
        service: &dyn SessionCommandService,
    ) -> Result<SaveReport, SaveError> {
        let count = self.preflight();
        if count > 0 {
            warn!("Save for book {} blocked by {} validation errors", self.book_id, count);
            return Err(SaveError::Validation { count });
        }

        let updates: Vec<UpdateSessionCommand> = self
            .staging
            .editing_sessions()
            .iter()
            .filter(|staged| !self.staging.is_deleting(staged.id()))
            .map(|staged| UpdateSessionCommand::from_session(staged.id(), &staged.current()))
            .collect();
        let deletions = self.staging.deleting_sessions().to_vec();

        let mut committed = SaveReport::new(self.book_id);

        for command in updates {
            let id = command.id;
            debug!("Updating session {}", id);
            if let Err(source) = service.update_session(command).await {
                return Err(self.abort(SaveStep::Update, id, committed, source));
            }
            committed.updated.push(id);
        }

        for id in deletions {
            debug!("Deleting session {}", id);
            if let Err(source) = service.delete_session(id).await {
                return Err(self.abort(SaveStep::Delete, id, committed, source));
            }
            committed.deleted.push(id);
        }

        self.staging.clear();
        info!(
            "Saved book {}: {} updated, {} deleted",
            self.book_id,
            committed.updated.len(),
            committed.deleted.len()
        );

        let sessions = service
            .list_sessions(SessionFilter::for_book(self.book_id))
            .await
            .map_err(SaveError::Refresh)?;
        self.staging.reload(sessions);
        self.revalidate();

        Ok(committed)
    }

    /// Records an inverted-range error for every staged edit and returns how
    /// many were found.
    fn preflight(&mut self) -> usize {
        let inverted: Vec<SessionId> = self
            .staging
            .editing_sessions()
            .iter()
            .filter(|staged| staged.current().has_inverted_range())
            .map(|staged| staged.id())
            .collect();

        for &id in &inverted {
            self.report.set_error(id, INVERTED_RANGE_MESSAGE);
        }
        inverted.len()
    }

    fn abort(
        &mut self,
        step: SaveStep,
        id: SessionId,
        committed: SaveReport,
        source: PortError,
    ) -> SaveError {
        error!(
            "Failed to {} session {} for book {}: {} ({} updated, {} deleted before failure)",
            step,
            id,
            self.book_id,
            source,
            committed.updated.len(),
            committed.deleted.len()
        );
        for &done in &committed.updated {
            self.staging.discard_edit(done);
        }
        for &done in &committed.deleted {
            self.staging.cancel_delete(done);
            self.staging.discard_edit(done);
        }
        SaveError::Persistence {
            step,
            id,
            committed,
            source,
        }
    }
}
