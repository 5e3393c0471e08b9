use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::debug;

use crate::error::LauncherError;

/// the key that normally dismisses fullscreen, and which DOS games want
pub const CANCEL_KEY: KeyCode = KeyCode::Esc;

/// host fullscreen and key reservation. both are optional capabilities
pub trait FullscreenPort {
    /// make the session's shell the fullscreen target
    fn request_fullscreen(&mut self) -> Result<(), LauncherError>;

    fn exit_fullscreen(&mut self) -> Result<(), LauncherError>;

    /// true only while the session's shell is the fullscreen target
    fn is_fullscreen(&self) -> bool;

    /// reserve `key` so it reaches the session; false when unsupported or refused
    fn capture_key(&mut self, key: KeyCode) -> bool;

    fn release_keys(&mut self);
}

/// where a key press ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDisposition {
    /// Shift+Esc: fullscreen forced off and capture released
    EscapeHatch,
    /// uncaptured Esc in fullscreen; the host took it and left fullscreen
    ExitedFullscreen,
    /// not ours; goes on to the session or the front end
    Forward,
}

/// Keeps the cancel key reserved exactly while the session is fullscreen,
/// with Shift+Esc always available as a way out.
pub struct CaptureManager {
    port: Box<dyn FullscreenPort>,
    is_fullscreen: bool,
    escape_captured: bool,
    // capture is asked for once per fullscreen entry
    capture_attempted: bool,
}

impl CaptureManager {
    pub fn new(port: Box<dyn FullscreenPort>) -> Self {
        CaptureManager {
            port,
            is_fullscreen: false,
            escape_captured: false,
            capture_attempted: false,
        }
    }

    pub fn is_fullscreen(&self) -> bool {
        self.is_fullscreen
    }

    pub fn escape_captured(&self) -> bool {
        self.escape_captured
    }

    /// does the session currently own the host's fullscreen target
    pub fn owns_fullscreen(&self) -> bool {
        self.port.is_fullscreen()
    }

    pub fn enter_fullscreen_capture(&mut self) -> Result<(), LauncherError> {
        self.port.request_fullscreen()?;
        self.sync();
        Ok(())
    }

    pub fn exit_fullscreen_capture(&mut self) -> Result<(), LauncherError> {
        let exited = if self.port.is_fullscreen() {
            self.port.exit_fullscreen()
        } else {
            Ok(())
        };
        self.sync();
        self.release();
        exited
    }

    /// returns whether fullscreen is now on
    pub fn toggle(&mut self) -> Result<bool, LauncherError> {
        if self.port.is_fullscreen() {
            self.exit_fullscreen_capture()?;
        } else {
            self.enter_fullscreen_capture()?;
        }
        Ok(self.is_fullscreen)
    }

    /// re-read fullscreen state from the host, capturing or releasing to
    /// match. true when the state changed
    pub fn sync(&mut self) -> bool {
        let active = self.port.is_fullscreen();
        let changed = active != self.is_fullscreen;
        self.is_fullscreen = active;
        if changed {
            self.capture_attempted = false;
        }
        if active {
            if !self.capture_attempted {
                self.capture_attempted = true;
                self.escape_captured = self.port.capture_key(CANCEL_KEY);
                debug!(captured = self.escape_captured, "fullscreen entered");
            }
        } else if changed || self.escape_captured {
            self.release();
        }
        changed
    }

    pub fn release(&mut self) {
        self.port.release_keys();
        self.escape_captured = false;
        self.capture_attempted = false;
    }

    pub fn handle_key(&mut self, key: &KeyEvent) -> KeyDisposition {
        if key.code != CANCEL_KEY {
            return KeyDisposition::Forward;
        }
        if key.modifiers.contains(KeyModifiers::SHIFT) {
            // works whether or not capture ever succeeded
            if let Err(err) = self.exit_fullscreen_capture() {
                debug!(%err, "escape hatch could not exit fullscreen");
            }
            return KeyDisposition::EscapeHatch;
        }
        if self.is_fullscreen && !self.escape_captured {
            if let Err(err) = self.exit_fullscreen_capture() {
                debug!(%err, "host could not exit fullscreen");
            }
            return KeyDisposition::ExitedFullscreen;
        }
        KeyDisposition::Forward
    }
}

/// fullscreen for the terminal: the screen panel takes the whole terminal.
/// clones share state with the renderer
#[derive(Clone)]
pub struct TermFullscreen {
    zoomed: Rc<Cell<bool>>,
    captured: Rc<Cell<bool>>,
}

impl TermFullscreen {
    pub fn new() -> Self {
        TermFullscreen {
            zoomed: Rc::new(Cell::new(false)),
            captured: Rc::new(Cell::new(false)),
        }
    }

    pub fn is_zoomed(&self) -> bool {
        self.zoomed.get()
    }

    pub fn is_captured(&self) -> bool {
        self.captured.get()
    }
}

impl Default for TermFullscreen {
    fn default() -> Self {
        Self::new()
    }
}

impl FullscreenPort for TermFullscreen {
    fn request_fullscreen(&mut self) -> Result<(), LauncherError> {
        self.zoomed.set(true);
        Ok(())
    }

    fn exit_fullscreen(&mut self) -> Result<(), LauncherError> {
        self.zoomed.set(false);
        Ok(())
    }

    fn is_fullscreen(&self) -> bool {
        self.zoomed.get()
    }

    fn capture_key(&mut self, key: KeyCode) -> bool {
        // raw mode already delivers every key to us; we just agree to forward it
        self.captured.set(key == CANCEL_KEY);
        self.captured.get()
    }

    fn release_keys(&mut self) {
        self.captured.set(false);
    }
}

/// what happened to a `DummyFullscreen`
#[derive(Debug, Default)]
pub struct FullscreenRecord {
    pub active: bool,
    pub requests: usize,
    pub exits: usize,
    pub captures: usize,
    pub releases: usize,
}

/// dummy port for testing; capabilities can be switched off
#[derive(Clone)]
pub struct DummyFullscreen {
    pub supports_fullscreen: bool,
    pub supports_capture: bool,
    record: Rc<RefCell<FullscreenRecord>>,
}

impl DummyFullscreen {
    pub fn new(supports_fullscreen: bool, supports_capture: bool) -> Self {
        DummyFullscreen {
            supports_fullscreen,
            supports_capture,
            record: Rc::new(RefCell::new(FullscreenRecord::default())),
        }
    }

    pub fn record(&self) -> std::cell::Ref<'_, FullscreenRecord> {
        self.record.borrow()
    }

    /// the host left fullscreen on its own (e.g. the user hit its own control)
    pub fn drop_fullscreen(&self) {
        self.record.borrow_mut().active = false;
    }
}

impl FullscreenPort for DummyFullscreen {
    fn request_fullscreen(&mut self) -> Result<(), LauncherError> {
        let mut r = self.record.borrow_mut();
        r.requests += 1;
        if !self.supports_fullscreen {
            return Err(LauncherError::Fullscreen("not supported".to_string()));
        }
        r.active = true;
        Ok(())
    }

    fn exit_fullscreen(&mut self) -> Result<(), LauncherError> {
        let mut r = self.record.borrow_mut();
        r.exits += 1;
        r.active = false;
        Ok(())
    }

    fn is_fullscreen(&self) -> bool {
        self.record.borrow().active
    }

    fn capture_key(&mut self, _key: KeyCode) -> bool {
        self.record.borrow_mut().captures += 1;
        self.supports_capture
    }

    fn release_keys(&mut self) {
        self.record.borrow_mut().releases += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn esc(modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(KeyCode::Esc, modifiers)
    }

    #[test]
    fn test_enter_captures_escape() -> Result<(), LauncherError> {
        let port = DummyFullscreen::new(true, true);
        let mut m = CaptureManager::new(Box::new(port.clone()));
        m.enter_fullscreen_capture()?;
        assert!(m.is_fullscreen());
        assert!(m.escape_captured());
        assert_eq!(m.handle_key(&esc(KeyModifiers::NONE)), KeyDisposition::Forward);
        assert!(port.record().active);
        Ok(())
    }

    #[test]
    fn test_missing_capture_is_not_an_error() -> Result<(), LauncherError> {
        let port = DummyFullscreen::new(true, false);
        let mut m = CaptureManager::new(Box::new(port.clone()));
        m.enter_fullscreen_capture()?;
        assert!(m.is_fullscreen());
        assert!(!m.escape_captured());

        // without capture the host takes plain Esc
        assert_eq!(
            m.handle_key(&esc(KeyModifiers::NONE)),
            KeyDisposition::ExitedFullscreen
        );
        assert!(!m.is_fullscreen());
        Ok(())
    }

    #[test]
    fn test_failed_capture_not_retried_every_sync() -> Result<(), LauncherError> {
        let port = DummyFullscreen::new(true, false);
        let mut m = CaptureManager::new(Box::new(port.clone()));
        m.enter_fullscreen_capture()?;
        for _ in 0..5 {
            assert!(!m.sync());
        }
        assert_eq!(port.record().captures, 1);

        // leaving and coming back asks again
        port.drop_fullscreen();
        assert!(m.sync());
        m.enter_fullscreen_capture()?;
        assert_eq!(port.record().captures, 2);
        Ok(())
    }

    #[test]
    fn test_refused_fullscreen_propagates() {
        let port = DummyFullscreen::new(false, true);
        let mut m = CaptureManager::new(Box::new(port));
        assert!(matches!(
            m.enter_fullscreen_capture(),
            Err(LauncherError::Fullscreen(_))
        ));
        assert!(!m.is_fullscreen());
        assert!(!m.escape_captured());
    }

    #[test]
    fn test_escape_hatch_exits_and_releases() -> Result<(), LauncherError> {
        let port = DummyFullscreen::new(true, true);
        let mut m = CaptureManager::new(Box::new(port.clone()));
        m.enter_fullscreen_capture()?;
        assert_eq!(
            m.handle_key(&esc(KeyModifiers::SHIFT)),
            KeyDisposition::EscapeHatch
        );
        assert!(!m.is_fullscreen());
        assert!(!m.escape_captured());
        assert_eq!(port.record().exits, 1);
        assert!(port.record().releases >= 1);
        Ok(())
    }

    #[test]
    fn test_escape_hatch_outside_fullscreen_still_releases() {
        let port = DummyFullscreen::new(true, true);
        let mut m = CaptureManager::new(Box::new(port.clone()));
        assert_eq!(
            m.handle_key(&esc(KeyModifiers::SHIFT)),
            KeyDisposition::EscapeHatch
        );
        assert_eq!(port.record().exits, 0);
        assert!(port.record().releases >= 1);
    }

    #[test]
    fn test_host_exit_releases_on_sync() -> Result<(), LauncherError> {
        let port = DummyFullscreen::new(true, true);
        let mut m = CaptureManager::new(Box::new(port.clone()));
        m.enter_fullscreen_capture()?;
        port.drop_fullscreen();
        assert!(m.sync());
        assert!(!m.escape_captured());
        assert!(!m.sync());
        Ok(())
    }

    #[test]
    fn test_toggle() -> Result<(), LauncherError> {
        let mut m = CaptureManager::new(Box::new(TermFullscreen::new()));
        assert!(m.toggle()?);
        assert!(m.escape_captured());
        assert!(!m.toggle()?);
        assert!(!m.escape_captured());
        Ok(())
    }

    #[test]
    fn test_other_keys_forwarded() {
        let mut m = CaptureManager::new(Box::new(DummyFullscreen::new(true, true)));
        let k = KeyEvent::new(KeyCode::Char('x'), KeyModifiers::SHIFT);
        assert_eq!(m.handle_key(&k), KeyDisposition::Forward);
    }
}
