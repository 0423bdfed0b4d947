use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyEvent};
use tracing::trace;

use crate::playback::{Cue, DelayTimer};

/// Unified event type consumed by the app runner
#[derive(Clone, Debug)]
pub enum DrillEvent {
    Key(KeyEvent),
    Resize,
    Tick,
    /// The clip for `cue` finished playing.
    ClipEnded(Cue),
    /// The pause after the clip for `cue` is over.
    DelayElapsed(Cue),
}

/// Source of events (keyboard, resize, playback callbacks)
pub trait DrillEventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&self, timeout: Duration) -> Result<DrillEvent, RecvTimeoutError>;
}

/// Event source backed by a channel. Terminal input, audio devices and
/// timers all feed the same sender so the runner sees one ordered stream.
pub struct ChannelEventSource {
    rx: Receiver<DrillEvent>,
}

impl ChannelEventSource {
    pub fn new(rx: Receiver<DrillEvent>) -> Self {
        Self { rx }
    }

    /// A fresh channel: the sender for producers and the source for the runner.
    pub fn channel() -> (Sender<DrillEvent>, Self) {
        let (tx, rx) = mpsc::channel();
        (tx, Self::new(rx))
    }
}

impl DrillEventSource for ChannelEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<DrillEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Forward crossterm key and resize events into `tx` from a background thread.
pub fn spawn_terminal_reader(tx: Sender<DrillEvent>) {
    std::thread::spawn(move || loop {
        let ev = match event::read() {
            Ok(CtEvent::Key(key)) => DrillEvent::Key(key),
            Ok(CtEvent::Resize(_, _)) => DrillEvent::Resize,
            Ok(_) => continue,
            Err(_) => break,
        };
        if tx.send(ev).is_err() {
            break;
        }
    });
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Runner that advances the application one event/tick at a time
pub struct Runner<E: DrillEventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: DrillEventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    /// Blocks up to tick interval and returns the next event, or Tick on timeout
    pub fn step(&self) -> DrillEvent {
        match self.event_source.recv_timeout(self.ticker.interval()) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => DrillEvent::Tick,
        }
    }
}

/// Delay timer that sleeps on a short-lived thread and posts
/// `DelayElapsed` back to the event channel. There is no cancellation;
/// the sequencer drops cues from an older epoch.
#[derive(Clone, Debug)]
pub struct ThreadTimer {
    tx: Sender<DrillEvent>,
}

impl ThreadTimer {
    pub fn new(tx: Sender<DrillEvent>) -> Self {
        Self { tx }
    }
}

impl DelayTimer for ThreadTimer {
    fn schedule(&self, after: Duration, cue: Cue) {
        let tx = self.tx.clone();
        std::thread::spawn(move || {
            if !after.is_zero() {
                std::thread::sleep(after);
            }
            if tx.send(DrillEvent::DelayElapsed(cue)).is_err() {
                trace!(?cue, "event channel closed before delay elapsed");
            }
        });
    }
}
