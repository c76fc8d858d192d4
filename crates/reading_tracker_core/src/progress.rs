//! Reading progress derived from a book's session history.

use chrono::NaiveDate;

use crate::domain::{Book, Session};

#[derive(Debug, Clone, PartialEq)]
pub struct BookProgress {
    /// Furthest end page reached in any session.
    pub current_page: Option<i32>,
    pub pages_read: i32,
    pub minutes_read: i32,
    pub session_count: usize,
    /// `None` when the book has no page total.
    pub percent_complete: Option<f64>,
    pub last_session_date: Option<NaiveDate>,
}

impl BookProgress {
    pub fn from_sessions(book: &Book, sessions: &[Session]) -> Self {
        let current_page = sessions.iter().filter_map(|s| s.end_page).max();
        let percent_complete = match (current_page, book.total_pages) {
            (Some(page), Some(total)) if total > 0 => {
                Some((f64::from(page) / f64::from(total) * 100.0).min(100.0))
            }
            (None, Some(total)) if total > 0 => Some(0.0),
            _ => None,
        };

        Self {
            current_page,
            pages_read: saturating_total(sessions.iter().filter_map(|s| s.pages_read)),
            minutes_read: saturating_total(sessions.iter().filter_map(|s| s.minutes_read)),
            session_count: sessions.len(),
            percent_complete,
            last_session_date: sessions.iter().map(|s| s.session_date).max(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.percent_complete.is_some_and(|p| p >= 100.0)
    }
}

fn saturating_total(values: impl Iterator<Item = i32>) -> i32 {
    values.fold(0, i32::saturating_add)
}
