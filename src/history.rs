use std::io::Write;

use chrono::{DateTime, Datelike, Local, TimeZone, Timelike};
use itertools::Itertools;
use serde::Serialize;

use crate::error::StoreError;
use crate::session::Session;
use crate::store::score;

const MONTHS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

/// Which past session the review screen shows. Starts at the most recent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryCursor {
    index: Option<usize>,
    len: usize,
}

impl HistoryCursor {
    pub fn latest(sessions: &[Session]) -> Self {
        Self {
            index: sessions.len().checked_sub(1),
            len: sessions.len(),
        }
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn has_previous(&self) -> bool {
        matches!(self.index, Some(i) if i > 0)
    }

    pub fn has_next(&self) -> bool {
        matches!(self.index, Some(i) if i + 1 < self.len)
    }

    pub fn previous(&mut self) {
        if self.has_previous() {
            self.index = self.index.map(|i| i - 1);
        }
    }

    pub fn next(&mut self) {
        if self.has_next() {
            self.index = self.index.map(|i| i + 1);
        }
    }

    pub fn selected<'a>(&self, sessions: &'a [Session]) -> Option<&'a Session> {
        self.index.and_then(|i| sessions.get(i))
    }
}

/// One line of the review table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRow {
    pub number: usize,
    pub questions: String,
    pub answer: String,
    /// Blank until the row has a numeric answer.
    pub expected: String,
    pub duration: String,
    pub correct: bool,
}

pub fn review_rows(session: &Session) -> Vec<ReviewRow> {
    session
        .questions
        .iter()
        .enumerate()
        .map(|(i, q)| {
            let answered = i < session.answers.len();
            let answer = session.answer(i);
            ReviewRow {
                number: i + 1,
                questions: q.iter().join(","),
                answer: match answer {
                    Some(a) => a.to_string(),
                    None if answered => "?".to_string(),
                    None => String::new(),
                },
                expected: answer
                    .and(session.expected(i))
                    .map(|e| e.to_string())
                    .unwrap_or_default(),
                duration: session
                    .duration_ms(i)
                    .map(|d| d.to_string())
                    .unwrap_or_default(),
                correct: session.is_correct(i),
            }
        })
        .collect()
}

/// `D-MON-YYYY H:M` without zero padding, e.g. `5-MAR-2024 9:7`.
pub fn format_date<Tz: TimeZone>(date: &DateTime<Tz>) -> String {
    format!(
        "{}-{}-{} {}:{}",
        date.day(),
        MONTHS[date.month0() as usize],
        date.year(),
        date.hour(),
        date.minute()
    )
}

pub fn format_start(session: &Session) -> String {
    session
        .start
        .map(|s| format_date(&s.with_timezone(&Local)))
        .unwrap_or_default()
}

#[derive(Debug, Serialize)]
struct ExportRecord<'a> {
    start: &'a str,
    end: &'a str,
    score: u32,
    row: usize,
    questions: &'a str,
    answer: &'a str,
    expected: Option<i64>,
    duration_ms: Option<u64>,
}

/// Write every row of every session as CSV, one record per row.
pub fn export_csv<W: Write>(sessions: &[Session], writer: W) -> Result<(), StoreError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for session in sessions {
        let start = session.start.map(|t| t.to_rfc3339()).unwrap_or_default();
        let end = session.end.map(|t| t.to_rfc3339()).unwrap_or_default();
        let score = score(session);
        for row in review_rows(session) {
            let i = row.number - 1;
            wtr.serialize(ExportRecord {
                start: &start,
                end: &end,
                score,
                row: row.number,
                questions: &row.questions,
                answer: &row.answer,
                expected: session.expected(i),
                duration_ms: session.duration_ms(i),
            })?;
        }
    }
    wtr.flush()?;
    Ok(())
}
