use std::time::Duration;

use tracing::{debug, trace};

use crate::audio::{AudioDevice, ClipStatus};

/// Identifies one number being read out. `epoch` changes every time a row
/// starts or playback stops, so callbacks for an older row are recognised
/// and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cue {
    pub epoch: u64,
    pub row: usize,
    pub col: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Phase {
    Idle,
    Playing,
    Delaying,
    AwaitingAnswer,
    Stopped,
}

/// Schedules the pause between two numbers.
pub trait DelayTimer {
    /// Deliver `cue` back to the sequencer after `after` has passed.
    fn schedule(&self, after: Duration, cue: Cue);
}

/// Reads one row out number by number: play, wait for the clip to end,
/// pause, move on, and finally wait for the answer.
pub struct PlaybackSequencer<A: AudioDevice, T: DelayTimer> {
    audio: A,
    timer: T,
    rate: f32,
    delay: Duration,
    epoch: u64,
    row: usize,
    col: usize,
    values: Vec<i64>,
    phase: Phase,
}

impl<A: AudioDevice, T: DelayTimer> PlaybackSequencer<A, T> {
    pub fn new(audio: A, timer: T, rate: f32, delay: Duration) -> Self {
        Self {
            audio,
            timer,
            rate,
            delay,
            epoch: 0,
            row: 0,
            col: 0,
            values: vec![],
            phase: Phase::Idle,
        }
    }

    /// Begin reading `values` as row `row`. Any pending callback from the
    /// previous row becomes stale.
    pub fn start_row(&mut self, row: usize, values: &[i64]) {
        self.audio.stop();
        self.epoch += 1;
        self.row = row;
        self.col = 0;
        self.values = values.to_vec();
        debug!(row, columns = self.values.len(), "starting row");
        self.advance();
    }

    fn cue(&self) -> Cue {
        Cue {
            epoch: self.epoch,
            row: self.row,
            col: self.col,
        }
    }

    /// Play the current column, skipping straight past columns that have
    /// no clip. Once every column is done the row waits for an answer.
    fn advance(&mut self) {
        while self.col < self.values.len() {
            let value = self.values[self.col];
            match self.audio.play(value, self.rate, self.cue()) {
                ClipStatus::Started => {
                    self.phase = Phase::Playing;
                    return;
                }
                ClipStatus::Unavailable => {
                    debug!(value, col = self.col, "no clip, advancing immediately");
                    self.col += 1;
                }
            }
        }
        self.phase = Phase::AwaitingAnswer;
    }

    fn is_current(&self, cue: Cue, expected: Phase) -> bool {
        let current = self.phase == expected && cue == self.cue();
        if !current {
            trace!(?cue, phase = %self.phase, "dropping stale playback event");
        }
        current
    }

    /// Returns false when the event belongs to an earlier row or column.
    pub fn on_clip_ended(&mut self, cue: Cue) -> bool {
        if !self.is_current(cue, Phase::Playing) {
            return false;
        }
        self.phase = Phase::Delaying;
        self.timer.schedule(self.delay, cue);
        true
    }

    /// Returns false when the event belongs to an earlier row or column.
    pub fn on_delay_elapsed(&mut self, cue: Cue) -> bool {
        if !self.is_current(cue, Phase::Delaying) {
            return false;
        }
        self.col += 1;
        self.advance();
        true
    }

    /// Silence the device and invalidate everything still in flight.
    pub fn stop(&mut self) {
        self.audio.stop();
        self.epoch += 1;
        self.phase = Phase::Stopped;
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn col(&self) -> usize {
        self.col
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn columns(&self) -> usize {
        self.values.len()
    }

    /// The number on screen while it is being read out.
    pub fn current_value(&self) -> Option<i64> {
        match self.phase {
            Phase::Playing | Phase::Delaying => self.values.get(self.col).copied(),
            _ => None,
        }
    }

    pub fn is_awaiting_answer(&self, session_ended: bool) -> bool {
        self.phase == Phase::AwaitingAnswer
            && is_awaiting_answer(self.col, self.values.len(), session_ended)
    }
}

pub fn is_awaiting_answer(col: usize, columns_each_row: usize, session_ended: bool) -> bool {
    col == columns_each_row && !session_ended
}

/// Share of rows reached, counting the active one.
pub fn progress_percent(active_row: usize, total_rows: usize) -> u16 {
    if total_rows == 0 {
        return 0;
    }
    (((active_row + 1) as f64 / total_rows as f64) * 100.0).round() as u16
}
