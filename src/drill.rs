use std::time::Instant;

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{info, warn};

use crate::audio::AudioDevice;
use crate::error::GenerateError;
use crate::playback::{progress_percent, Cue, DelayTimer, PlaybackSequencer};
use crate::question::QuestionSetGenerator;
use crate::runtime::DrillEvent;
use crate::session::{initiate, parse_answer, Session};
use crate::store::{score, ContextHandle};

/// Where the drill stands after handling an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrillStatus {
    Running,
    Finished,
}

/// Everything the drill screen needs to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct DrillView {
    pub row: usize,
    pub total_rows: usize,
    pub progress: u16,
    pub value: Option<i64>,
    pub awaiting_answer: bool,
    pub input: String,
}

/// A running session: the questions and answers so far plus the sequencer
/// reading the active row out.
pub struct Drill<A: AudioDevice, T: DelayTimer> {
    session: Session,
    sequencer: PlaybackSequencer<A, T>,
    input: String,
    prompted_at: Option<Instant>,
}

impl<A: AudioDevice, T: DelayTimer> Drill<A, T> {
    /// Resume the unfinished session in `ctx` or create a new one, save it,
    /// and start reading its next row.
    pub fn start<R: Rng + ?Sized>(
        ctx: &mut ContextHandle,
        generator: &QuestionSetGenerator,
        rng: &mut R,
        audio: A,
        timer: T,
        now: DateTime<Utc>,
    ) -> Result<Self, GenerateError> {
        let session = initiate(ctx.snapshot(), generator, rng, now)?;
        if let Err(err) = ctx.save_session(&session) {
            warn!(%err, "could not save new session");
        }

        let config = &ctx.snapshot().config;
        let sequencer =
            PlaybackSequencer::new(audio, timer, config.playback_rate, config.delay());
        let mut drill = Self {
            session,
            sequencer,
            input: String::new(),
            prompted_at: None,
        };
        drill.begin_row();
        Ok(drill)
    }

    fn begin_row(&mut self) {
        let row = self.session.next_row();
        self.input.clear();
        self.prompted_at = None;
        if let Some(values) = self.session.questions.get(row) {
            self.sequencer.start_row(row, values);
        }
        self.note_prompt();
    }

    fn note_prompt(&mut self) {
        if self.prompted_at.is_none() && self.is_awaiting_answer() {
            self.prompted_at = Some(Instant::now());
        }
    }

    /// Feed a playback or timer event. Returns whether anything changed.
    pub fn handle(&mut self, event: &DrillEvent) -> bool {
        let changed = match *event {
            DrillEvent::ClipEnded(cue) => self.on_clip_ended(cue),
            DrillEvent::DelayElapsed(cue) => self.on_delay_elapsed(cue),
            _ => false,
        };
        self.note_prompt();
        changed
    }

    fn on_clip_ended(&mut self, cue: Cue) -> bool {
        self.sequencer.on_clip_ended(cue)
    }

    fn on_delay_elapsed(&mut self, cue: Cue) -> bool {
        self.sequencer.on_delay_elapsed(cue)
    }

    pub fn is_awaiting_answer(&self) -> bool {
        self.sequencer.is_awaiting_answer(self.session.is_complete())
    }

    pub fn push_char(&mut self, c: char) {
        if self.is_awaiting_answer() && (c.is_ascii_digit() || c == '-') {
            self.input.push(c);
        }
    }

    pub fn backspace(&mut self) {
        self.input.pop();
    }

    /// Record the typed answer for the active row, persist the session and
    /// move on. Does nothing until the row has been read out.
    pub fn submit(&mut self, ctx: &mut ContextHandle, now: DateTime<Utc>) -> DrillStatus {
        if !self.is_awaiting_answer() {
            return self.status();
        }

        let row = self.sequencer.row();
        let elapsed_ms = self
            .prompted_at
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or_default();
        let answer = parse_answer(&self.input);
        let session = std::mem::replace(&mut self.session, Session::new(vec![], now));
        self.session = session.record_answer(row, answer, elapsed_ms, now);

        if let Err(err) = ctx.save_session(&self.session) {
            warn!(%err, row, "could not save answer");
        }

        if self.session.is_complete() {
            self.sequencer.stop();
            info!(score = score(&self.session), "drill complete");
        } else {
            self.begin_row();
        }
        self.status()
    }

    /// Leave the drill. The session stays unfinished in the history and is
    /// resumed next time.
    pub fn abandon(&mut self) {
        self.sequencer.stop();
        info!(row = self.sequencer.row(), "drill abandoned");
    }

    pub fn status(&self) -> DrillStatus {
        if self.session.is_complete() {
            DrillStatus::Finished
        } else {
            DrillStatus::Running
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn sequencer(&self) -> &PlaybackSequencer<A, T> {
        &self.sequencer
    }

    pub fn view(&self) -> DrillView {
        let total_rows = self.session.questions.len();
        let row = self.sequencer.row();
        DrillView {
            row,
            total_rows,
            progress: progress_percent(row, total_rows),
            value: self.sequencer.current_value(),
            awaiting_answer: self.is_awaiting_answer(),
            input: self.input.clone(),
        }
    }
}
