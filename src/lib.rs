//! # Retro Deck
//!
//! A hub of retro console launchers. MS-DOS is the only one that actually
//! runs anything; the rest are placeholders in the catalog.
//!
//! ## Design
//!
//! * the emulation itself is somebody else's problem: an external engine
//!   behind the `EngineFactory`/`EngineHandle` traits (DOSBox, out of process)
//! * one session at a time, one engine handle at most, owned by the session
//!   controller and nobody else
//! * the startup command is guessed from the zip: shallowest launchable file,
//!   then `.exe` over `.bat` over `.com`, then names that look like launchers
//! * the surface's backing buffer is only ever resized before a boot (or when
//!   explicitly forced); presentation is stretched to the container always
//! * Esc belongs to the game while fullscreen; Shift+Esc always gets you out
//! * every port is a trait with a real implementation and a dummy one, so the
//!   controller can be tested without a terminal or an emulator
//!
//! Model
//!
//! App (terminal front end)
//!  |-- hub catalog
//!  `-- DOS launcher view
//!       `-- session controller
//!            |-- archive decoder + inspector
//!            |-- engine factory -> engine handle (0 or 1)
//!            |-- display reconciler + schedule -> render surface
//!            |-- capture manager -> fullscreen port
//!            |-- preference store (last startup command)
//!            `-- event log (ring, newest first) + clock
pub mod app;
pub mod archive;
pub mod config;
pub mod display;
pub mod engine;
pub mod error;
pub mod event_log;
pub mod hub;
pub mod input;
pub mod prefs;
pub mod session;

pub use error::LauncherError;
pub use session::{Ports, SessionController, SessionState};
