use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::GenerateError;
use crate::question::{row_sum, QuestionSet, QuestionSetGenerator};
use crate::store::AppContext;

/// One attempt at a drill. `start` is the identity key in the history,
/// `end` stays empty until every row has an answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(from = "StoredSession")]
pub struct Session {
    #[serde(with = "stamp", default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub questions: QuestionSet,
    /// Index-aligned with `questions`. `None` is either a row not reached
    /// yet or an answer that was not a number.
    #[serde(default)]
    pub answers: Vec<Option<i64>>,
    /// Milliseconds from the answer prompt appearing to submission.
    #[serde(default)]
    pub durations: Vec<Option<u64>>,
    #[serde(with = "stamp", default)]
    pub end: Option<DateTime<Utc>>,
}

/// On-disk shape. Only an `end` key that is present and empty marks a
/// session as resumable; a record without the key is treated as closed.
#[derive(Deserialize)]
struct StoredSession {
    #[serde(with = "stamp", default)]
    start: Option<DateTime<Utc>>,
    #[serde(default)]
    questions: QuestionSet,
    #[serde(default)]
    answers: Vec<Option<i64>>,
    #[serde(default)]
    durations: Vec<Option<u64>>,
    #[serde(default, deserialize_with = "stamp::present")]
    end: Option<Option<DateTime<Utc>>>,
}

impl From<StoredSession> for Session {
    fn from(s: StoredSession) -> Self {
        Self {
            end: s.end.unwrap_or(s.start),
            start: s.start,
            questions: s.questions,
            answers: s.answers,
            durations: s.durations,
        }
    }
}

impl Session {
    pub fn new(questions: QuestionSet, now: DateTime<Utc>) -> Self {
        Self {
            start: Some(now),
            questions,
            answers: vec![],
            durations: vec![],
            end: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.end.is_some()
    }

    /// Row the drill continues from: the first one past the recorded answers.
    pub fn next_row(&self) -> usize {
        self.answers.len()
    }

    pub fn expected(&self, row: usize) -> Option<i64> {
        self.questions.get(row).and_then(|q| row_sum(q))
    }

    pub fn answer(&self, row: usize) -> Option<i64> {
        self.answers.get(row).copied().flatten()
    }

    pub fn duration_ms(&self, row: usize) -> Option<u64> {
        self.durations.get(row).copied().flatten()
    }

    pub fn is_correct(&self, row: usize) -> bool {
        match (self.expected(row), self.answer(row)) {
            (Some(expected), Some(given)) => expected == given,
            _ => false,
        }
    }

    /// Store the answer for `row` and close the session once every row is
    /// answered. Finished sessions and out-of-range rows are left untouched.
    pub fn record_answer(
        mut self,
        row: usize,
        answer: Option<i64>,
        elapsed_ms: u64,
        now: DateTime<Utc>,
    ) -> Self {
        if self.is_complete() {
            warn!(row, "ignoring answer for a finished session");
            return self;
        }
        if row >= self.questions.len() {
            warn!(row, rows = self.questions.len(), "ignoring answer past the last row");
            return self;
        }

        if self.answers.len() <= row {
            self.answers.resize(row + 1, None);
        }
        if self.durations.len() <= row {
            self.durations.resize(row + 1, None);
        }
        self.answers[row] = answer;
        self.durations[row] = Some(elapsed_ms);
        debug!(row, ?answer, elapsed_ms, correct = self.is_correct(row), "answer recorded");

        if self.answers.len() == self.questions.len() {
            self.end = Some(now);
            info!(rows = self.questions.len(), "session finished");
        }
        self
    }
}

/// Resume the first unfinished session in the history, or start a fresh one
/// with newly generated questions.
pub fn initiate<R: Rng + ?Sized>(
    ctx: &AppContext,
    generator: &QuestionSetGenerator,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Result<Session, GenerateError> {
    let mut unfinished = ctx.sessions.iter().filter(|s| !s.is_complete());
    if let Some(session) = unfinished.next() {
        let others = unfinished.count();
        if others > 0 {
            warn!(others, "history holds more than one unfinished session, resuming the first");
        }
        info!(start = ?session.start, row = session.next_row(), "resuming session");
        return Ok(session.clone());
    }

    let questions = generator.generate(&ctx.config, rng)?;
    info!(rows = questions.len(), "starting new session");
    Ok(Session::new(questions, now))
}

/// Parse typed input. Anything that is not an integer is recorded as `None`
/// and scores as wrong.
pub fn parse_answer(input: &str) -> Option<i64> {
    input.trim().parse::<i64>().ok()
}

/// Timestamps are stored as RFC 3339 strings; the empty string means unset.
mod stamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(t) => serializer.serialize_str(&t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref() {
            None | Some("") => Ok(None),
            Some(s) => DateTime::parse_from_rfc3339(s)
                .map(|t| Some(t.with_timezone(&Utc)))
                .map_err(serde::de::Error::custom),
        }
    }

    /// Tells a missing key (outer `None`) from an empty one.
    pub fn present<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Option<DateTime<Utc>>>, D::Error> {
        deserialize(deserializer).map(Some)
    }
}
