use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::Duration;

use tracing::trace;

use crate::playback::Cue;
use crate::runtime::DrillEvent;

/// Outcome of asking a device to read a number out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipStatus {
    /// Playback began; a `ClipEnded` event follows when it is done.
    Started,
    /// Nothing to play for this value.
    Unavailable,
}

/// Plays the clip for a number and reports completion as
/// `DrillEvent::ClipEnded(cue)`.
pub trait AudioDevice {
    fn play(&mut self, value: i64, rate: f32, cue: Cue) -> ClipStatus;
    /// Cut off whatever is playing. Devices without state ignore this.
    fn stop(&mut self) {}
}

impl<D: AudioDevice + ?Sized> AudioDevice for Box<D> {
    fn play(&mut self, value: i64, rate: f32, cue: Cue) -> ClipStatus {
        (**self).play(value, rate, cue)
    }

    fn stop(&mut self) {
        (**self).stop()
    }
}

/// Directory of recorded numbers, one `<value>.wav` per clip.
#[derive(Debug, Clone)]
pub struct ClipLibrary {
    dir: PathBuf,
}

impl ClipLibrary {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, value: i64) -> PathBuf {
        self.dir.join(format!("{}.wav", value))
    }

    pub fn find(&self, value: i64) -> Option<PathBuf> {
        let path = self.path_for(value);
        path.is_file().then_some(path)
    }

    pub fn is_available(&self) -> bool {
        self.dir.is_dir()
    }
}

/// Device with no clips at all: every number advances immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAudio;

impl AudioDevice for NoAudio {
    fn play(&mut self, _value: i64, _rate: f32, _cue: Cue) -> ClipStatus {
        ClipStatus::Unavailable
    }
}

/// Silent stand-in that keeps each number on screen for `hold / rate`,
/// so the drill stays usable as a visual exercise without sound.
#[derive(Debug, Clone)]
pub struct PacedDisplay {
    tx: Sender<DrillEvent>,
    hold: Duration,
}

impl PacedDisplay {
    pub const DEFAULT_HOLD: Duration = Duration::from_millis(900);

    pub fn new(tx: Sender<DrillEvent>, hold: Duration) -> Self {
        Self { tx, hold }
    }
}

impl AudioDevice for PacedDisplay {
    fn play(&mut self, _value: i64, rate: f32, cue: Cue) -> ClipStatus {
        let hold = self.hold.div_f32(rate.max(f32::EPSILON));
        let tx = self.tx.clone();
        std::thread::spawn(move || {
            std::thread::sleep(hold);
            if tx.send(DrillEvent::ClipEnded(cue)).is_err() {
                trace!(?cue, "event channel closed before clip ended");
            }
        });
        ClipStatus::Started
    }
}

#[cfg(feature = "audio")]
pub use speaker::Speaker;

#[cfg(feature = "audio")]
mod speaker {
    use std::fs::File;
    use std::io::BufReader;
    use std::sync::mpsc::Sender;
    use std::sync::Arc;

    use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
    use tracing::{debug, trace, warn};

    use super::{AudioDevice, ClipLibrary, ClipStatus};
    use crate::error::AudioError;
    use crate::playback::Cue;
    use crate::runtime::DrillEvent;

    /// Plays clips from a `ClipLibrary` on the default output device.
    /// Values without a readable clip report `Unavailable`.
    pub struct Speaker {
        _stream: OutputStream,
        handle: OutputStreamHandle,
        library: ClipLibrary,
        tx: Sender<DrillEvent>,
        current: Option<Arc<Sink>>,
    }

    impl Speaker {
        pub fn open(library: ClipLibrary, tx: Sender<DrillEvent>) -> Result<Self, AudioError> {
            let (stream, handle) =
                OutputStream::try_default().map_err(|e| AudioError::Output(e.to_string()))?;
            Ok(Self {
                _stream: stream,
                handle,
                library,
                tx,
                current: None,
            })
        }

        fn start(&mut self, value: i64, rate: f32, cue: Cue) -> Result<ClipStatus, AudioError> {
            let Some(path) = self.library.find(value) else {
                debug!(value, "clip not found");
                return Ok(ClipStatus::Unavailable);
            };
            let source = Decoder::new(BufReader::new(File::open(&path)?)).map_err(|e| {
                AudioError::Decode {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                }
            })?;
            let sink = Sink::try_new(&self.handle).map_err(|e| AudioError::Output(e.to_string()))?;
            sink.set_speed(rate);
            sink.append(source);

            let sink = Arc::new(sink);
            self.current = Some(sink.clone());
            let tx = self.tx.clone();
            std::thread::spawn(move || {
                sink.sleep_until_end();
                if tx.send(DrillEvent::ClipEnded(cue)).is_err() {
                    trace!(?cue, "event channel closed before clip ended");
                }
            });
            Ok(ClipStatus::Started)
        }
    }

    impl AudioDevice for Speaker {
        fn play(&mut self, value: i64, rate: f32, cue: Cue) -> ClipStatus {
            self.start(value, rate, cue).unwrap_or_else(|err| {
                warn!(value, %err, "clip failed to play, skipping");
                ClipStatus::Unavailable
            })
        }

        fn stop(&mut self) {
            if let Some(sink) = self.current.take() {
                sink.stop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{ChannelEventSource, DrillEventSource};
    use assert_matches::assert_matches;
    use tempfile::tempdir;

    const CUE: Cue = Cue {
        epoch: 1,
        row: 0,
        col: 0,
    };

    #[test]
    fn library_resolves_clip_by_value() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("-42.wav"), b"RIFF").unwrap();
        let lib = ClipLibrary::new(dir.path());

        assert!(lib.is_available());
        assert_eq!(lib.path_for(123), dir.path().join("123.wav"));
        assert_eq!(lib.find(-42), Some(dir.path().join("-42.wav")));
        assert_eq!(lib.find(42), None);
    }

    #[test]
    fn missing_directory_is_not_available() {
        let dir = tempdir().unwrap();
        assert!(!ClipLibrary::new(dir.path().join("nope")).is_available());
    }

    #[test]
    fn no_audio_never_starts() {
        assert_eq!(NoAudio.play(5, 1.0, CUE), ClipStatus::Unavailable);
    }

    #[test]
    fn paced_display_reports_clip_end() {
        let (tx, es) = ChannelEventSource::channel();
        let mut device = PacedDisplay::new(tx, Duration::from_millis(10));
        assert_eq!(device.play(7, 2.0, CUE), ClipStatus::Started);

        let ev = es.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_matches!(ev, DrillEvent::ClipEnded(c) if c == CUE);
    }
}
