// Library surface for the binary and the headless integration tests.
pub mod app_dirs;
pub mod audio;
pub mod config;
pub mod drill;
pub mod error;
pub mod history;
pub mod logging;
pub mod playback;
pub mod question;
pub mod runtime;
pub mod session;
pub mod store;
pub mod ui;

/// Redraw interval while nothing else happens
pub const TICK_RATE_MS: u64 = 100;
