//! crates/reading_tracker_core/src/validation.rs
//!
//! The validation engine: a pure, full recomputation of per-session errors
//! (which block saving) and warnings (which don't) over a book's session list.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::domain::{Book, Session, SessionId};
use crate::ordering::sorted_sessions;

/// A page jump larger than this between consecutive sessions is flagged.
pub const LARGE_GAP_THRESHOLD: i64 = 50;

pub const INVERTED_RANGE_MESSAGE: &str = "End page cannot be less than start page";
pub const FUTURE_DATE_MESSAGE: &str = "Session date is in the future";

pub fn large_gap_message(gap: i64) -> String {
    format!("Large gap: {} pages since previous session", gap)
}

pub fn exceeds_total_message(end_page: i32, total_pages: i32) -> String {
    format!(
        "End page ({}) exceeds total pages ({})",
        end_page, total_pages
    )
}

/// At most one error and one warning per session id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: BTreeMap<SessionId, String>,
    pub warnings: BTreeMap<SessionId, String>,
}

impl ValidationReport {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn error_for(&self, id: SessionId) -> Option<&str> {
        self.errors.get(&id).map(String::as_str)
    }

    pub fn warning_for(&self, id: SessionId) -> Option<&str> {
        self.warnings.get(&id).map(String::as_str)
    }

    pub fn set_error(&mut self, id: SessionId, message: impl Into<String>) {
        self.errors.insert(id, message.into());
    }

    /// Returns true if an error was present.
    pub fn clear_error(&mut self, id: SessionId) -> bool {
        self.errors.remove(&id).is_some()
    }
}

/// Validates a session list against its book.
///
/// The list is sorted newest first before the rules run, so "previous
/// session" always means the next-older one. Rules run in a fixed order and a
/// later match replaces an earlier one in the same category:
///
/// 1. error: inverted page range
/// 2. warning: session dated after `today`
/// 3. warning: gap above [`LARGE_GAP_THRESHOLD`] since the previous session's end page
/// 4. error: end page beyond the book's total
///
/// Rules 3 and 4 only apply when the book has a page total. Sessions without
/// an id are skipped.
pub fn validate(sessions: &[Session], book: Option<&Book>, today: NaiveDate) -> ValidationReport {
    let sorted = sorted_sessions(sessions.to_vec());
    let total_pages = book.and_then(|b| b.total_pages);
    let mut report = ValidationReport::default();

    for (index, session) in sorted.iter().enumerate() {
        let Some(id) = session.id else {
            continue;
        };

        if session.has_inverted_range() {
            report.errors.insert(id, INVERTED_RANGE_MESSAGE.to_string());
        }

        if session.session_date > today {
            report.warnings.insert(id, FUTURE_DATE_MESSAGE.to_string());
        }

        if let Some(total) = total_pages {
            let previous_end = sorted.get(index + 1).and_then(|prev| prev.end_page);
            if let (Some(start), Some(prev_end)) = (session.start_page, previous_end) {
                // Widened so extreme page numbers cannot overflow.
                let gap = i64::from(start) - i64::from(prev_end);
                if gap > LARGE_GAP_THRESHOLD {
                    report.warnings.insert(id, large_gap_message(gap));
                }
            }

            if let Some(end) = session.end_page.filter(|&end| end > total) {
                report.errors.insert(id, exceeds_total_message(end, total));
            }
        }
    }

    report
}
