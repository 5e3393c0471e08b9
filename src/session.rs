//! # session
//!
//! One DOS launcher session: load a zip, work out what to run, boot it in the
//! engine, stop or reset it, and keep the display and key capture in step the
//! whole time.
//!
//!  Idle --load--> Loaded --start--> Booted
//!                   ^  \__reset/stop__/ |
//!                   |                   | start (restart)
//!                   `-------------------'
//!  any --teardown--> Idle
//!
//! Every failure is caught here and written to the session log; the `Result`
//! each operation returns is only there for callers that want to react.
use crossterm::event::KeyEvent;
use tracing::{debug, error, info, warn};
use tui::layout::Rect;

use crate::archive::{select_startup_command, ArchiveDecoder, ArchiveSource, StartupCommand};
use crate::config::{LauncherConfig, DEFAULT_COMMAND, STARTUP_COMMAND_KEY};
use crate::display::{self, ReconcileOptions, ReconcileSchedule, Reconciled, RenderSurface};
use crate::engine::{dos_args, EngineConfig, EngineFactory, EngineHandle, SurfaceBinding};
use crate::error::LauncherError;
use crate::event_log::{Clock, EventLog, Severity};
use crate::input::{CaptureManager, FullscreenPort, KeyDisposition};
use crate::prefs::PreferenceStore;

pub const READY_MESSAGE: &str = "Ready. Drop a MS-DOS game ZIP or click Load.";
pub const STOP_MESSAGE: &str = "Emulator stopped. Press Start to run again.";
pub const RESET_MESSAGE: &str =
    "Emulator reset. Loaded ZIP kept in memory; press Start to run again.";
pub const EXIT_MESSAGE: &str = "Emulator exited. Press Start to run again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Loaded,
    Booted,
}

/// shown in the status panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveMeta {
    pub name: String,
    pub size_kb: usize,
}

/// everything the controller talks to outside itself
pub struct Ports {
    pub decoder: Box<dyn ArchiveDecoder>,
    pub engines: Box<dyn EngineFactory>,
    pub fullscreen: Box<dyn FullscreenPort>,
    pub prefs: Box<dyn PreferenceStore>,
    pub clock: Box<dyn Clock>,
    pub surface: Box<dyn RenderSurface>,
}

pub struct SessionController {
    decoder: Box<dyn ArchiveDecoder>,
    engines: Box<dyn EngineFactory>,
    prefs: Box<dyn PreferenceStore>,
    clock: Box<dyn Clock>,
    surface: Box<dyn RenderSurface>,
    capture: CaptureManager,
    schedule: ReconcileSchedule,
    engine_config: EngineConfig,
    log: EventLog,
    container: Rect,
    mounted: bool,
    overlay_open: bool,
    archive: Option<Vec<u8>>,
    archive_meta: Option<ArchiveMeta>,
    command: String,
    running_command: Option<String>,
    // only ever Some while booted
    engine: Option<Box<dyn EngineHandle>>,
}

impl SessionController {
    pub fn new(ports: Ports, config: &LauncherConfig) -> Self {
        SessionController {
            decoder: ports.decoder,
            engines: ports.engines,
            prefs: ports.prefs,
            clock: ports.clock,
            surface: ports.surface,
            capture: CaptureManager::new(ports.fullscreen),
            schedule: ReconcileSchedule::new(config.settle_delay()),
            engine_config: EngineConfig {
                boot_resource: config.engine_binary.clone(),
            },
            log: EventLog::new(config.log_capacity),
            container: Rect::default(),
            mounted: false,
            overlay_open: false,
            archive: None,
            archive_meta: None,
            command: DEFAULT_COMMAND.to_string(),
            running_command: None,
            engine: None,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.engine.is_some() {
            SessionState::Booted
        } else if self.archive.is_some() {
            SessionState::Loaded
        } else {
            SessionState::Idle
        }
    }

    pub fn is_booted(&self) -> bool {
        self.engine.is_some()
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn set_command(&mut self, command: &str) {
        self.command = command.to_string();
    }

    /// the command line of the live session, if booted
    pub fn running_command(&self) -> Option<&str> {
        self.running_command.as_deref()
    }

    pub fn archive_meta(&self) -> Option<&ArchiveMeta> {
        self.archive_meta.as_ref()
    }

    pub fn archive_bytes(&self) -> Option<&[u8]> {
        self.archive.as_deref()
    }

    pub fn overlay_open(&self) -> bool {
        self.overlay_open
    }

    pub fn is_fullscreen(&self) -> bool {
        self.capture.is_fullscreen()
    }

    pub fn escape_captured(&self) -> bool {
        self.capture.escape_captured()
    }

    pub fn container(&self) -> Rect {
        self.container
    }

    /// the launcher view appeared; `container` is where the surface lives
    pub fn mount(&mut self, container: Rect) {
        self.mounted = true;
        self.container = container;
        if let Some(saved) = self.prefs.get(STARTUP_COMMAND_KEY) {
            if !saved.trim().is_empty() {
                self.command = saved;
            }
        }
        self.record(READY_MESSAGE, Severity::Info);
        let booted = self.is_booted();
        self.reconcile(!booted);
    }

    /// the container's content box changed
    pub fn resize(&mut self, container: Rect) {
        if container != self.container {
            self.container = container;
            self.reconcile(false);
        }
    }

    /// the host window changed size; the container may not have
    pub fn window_resized(&mut self) {
        self.reconcile(false);
    }

    pub fn set_overlay(&mut self, open: bool) {
        if open != self.overlay_open {
            self.overlay_open = open;
            self.schedule.settle_from(self.clock.instant());
        }
    }

    pub fn toggle_overlay(&mut self) {
        self.set_overlay(!self.overlay_open);
    }

    pub fn toggle_fullscreen(&mut self) -> Result<bool, LauncherError> {
        let leaving = self.capture.owns_fullscreen();
        match self.capture.toggle() {
            Ok(active) => {
                self.schedule.next_frame();
                Ok(active)
            }
            Err(err) => {
                let msg = if leaving {
                    format!("Could not exit fullscreen: {}", err)
                } else {
                    format!("Fullscreen not available: {}", err)
                };
                Err(self.fail(err, msg))
            }
        }
    }

    /// the host changed fullscreen behind our back
    pub fn fullscreen_changed(&mut self) {
        if self.capture.sync() {
            self.schedule.next_frame();
        }
    }

    /// every key goes through here before the front end looks at it
    pub fn handle_key(&mut self, key: &KeyEvent) -> KeyDisposition {
        let disposition = self.capture.handle_key(key);
        match disposition {
            KeyDisposition::EscapeHatch => {
                self.set_overlay(false);
                self.schedule.next_frame();
            }
            KeyDisposition::ExitedFullscreen => self.schedule.next_frame(),
            KeyDisposition::Forward => {}
        }
        disposition
    }

    /// once per frame: pending reconciles, fullscreen drift, engine exit
    pub fn tick(&mut self) {
        self.fullscreen_changed();
        let exited = self.engine.as_mut().map_or(false, |e| e.has_exited());
        if exited {
            self.stop(Some(EXIT_MESSAGE));
        }
        if self.schedule.take_due(self.clock.instant()) {
            self.reconcile(false);
        }
    }

    pub fn load_archive(&mut self, source: ArchiveSource) -> Result<(), LauncherError> {
        if !source.is_zip() {
            let err = LauncherError::UnsupportedFormat {
                name: source.name.clone(),
            };
            return Err(self.fail(
                err,
                "Only .zip files are supported. Please provide a MS-DOS game archive.",
            ));
        }

        let meta = ArchiveMeta {
            name: source.name.clone(),
            size_kb: source.size_kb(),
        };
        self.record(
            format!("ZIP \"{}\" loaded ({} KB).", meta.name, meta.size_kb),
            Severity::Ok,
        );
        let picked = select_startup_command(self.decoder.as_ref(), &source.bytes);
        self.archive = Some(source.bytes);
        self.archive_meta = Some(meta);

        match picked {
            Ok(StartupCommand::Detected(path)) => {
                self.remember_command(&path);
                self.record(format!("Startup command auto-set to \"{}\".", path), Severity::Ok);
                self.command = path;
            }
            Ok(StartupCommand::Fallback) => {
                self.command = DEFAULT_COMMAND.to_string();
                self.record("No executable found in ZIP; defaulting to `dir`.", Severity::Info);
            }
            Err(err) => {
                self.command = DEFAULT_COMMAND.to_string();
                self.remember_command(DEFAULT_COMMAND);
                self.record(
                    format!(
                        "Could not inspect ZIP for executables; using \"{}\". ({})",
                        DEFAULT_COMMAND, err
                    ),
                    Severity::Error,
                );
            }
        }
        Ok(())
    }

    /// boot the loaded archive with `command`; restarts if already booted
    pub fn start(&mut self, command: &str) -> Result<(), LauncherError> {
        if self.archive.is_none() {
            return Err(self.fail(
                LauncherError::NoArchive,
                "No game ZIP loaded. Load one before starting.",
            ));
        }

        self.reconcile(true);
        let cmd = resolve_command(command);
        self.command = cmd.clone();
        self.remember_command(&cmd);

        let mut handle = self.init_engine()?;
        match self.boot(handle.as_mut(), &cmd) {
            Ok(()) => {
                self.engine = Some(handle);
                self.reconcile(false);
                self.record(format!("Emulator started with command: {}.", cmd), Severity::Ok);
                self.running_command = Some(cmd);
                Ok(())
            }
            Err(err) => {
                if let Err(dispose_err) = handle.dispose() {
                    debug!(%dispose_err, "failed engine did not dispose cleanly");
                }
                let msg = format!("Emulator failed to start: {}", err);
                Err(self.fail(err, msg))
            }
        }
    }

    /// safe to call any number of times; the archive stays loaded
    pub fn stop(&mut self, reason: Option<&str>) {
        self.dispose_engine("Could not stop previous emulator cleanly.");
        if self.capture.owns_fullscreen() {
            if let Err(err) = self.capture.exit_fullscreen_capture() {
                debug!(%err, "could not leave fullscreen on stop");
            }
        }
        self.surface.clear();
        self.reconcile(true);
        if let Some(reason) = reason {
            self.record(reason, Severity::Info);
        }
    }

    pub fn reset(&mut self) {
        self.stop(Some(RESET_MESSAGE));
    }

    /// leaving the launcher: stop, forget the archive, let go of the keyboard
    pub fn teardown(&mut self) {
        self.stop(None);
        self.archive = None;
        self.archive_meta = None;
        self.overlay_open = false;
        self.capture.release();
        self.mounted = false;
    }

    /// the picked file couldn't be read at all; nothing changes
    pub fn report_read_error(&mut self, err: &LauncherError) {
        self.record(
            format!("Could not read the file. Please try again. ({})", err),
            Severity::Error,
        );
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    pub fn snapshot_log(&mut self) {
        self.record("Log snapshot saved.", Severity::Info);
    }

    fn init_engine(&mut self) -> Result<Box<dyn EngineHandle>, LauncherError> {
        // only one handle may ever exist
        self.dispose_engine("Previous emulator instance could not be closed cleanly.");

        if !self.mounted {
            return Err(self.fail(
                LauncherError::EngineUnavailable("display surface not mounted".to_string()),
                "Display surface not ready yet.",
            ));
        }

        self.reconcile(true);
        self.surface.clear();
        let binding = SurfaceBinding {
            buffer: self.surface.buffer_size(),
        };
        match self.engines.create(binding, &self.engine_config) {
            Ok(handle) => Ok(handle),
            Err(err) => {
                let msg = format!("Emulator failed to start: {}", err);
                Err(self.fail(err, msg))
            }
        }
    }

    fn boot(&mut self, handle: &mut dyn EngineHandle, cmd: &str) -> Result<(), LauncherError> {
        handle.ready()?;
        let bytes = self.archive.as_deref().ok_or(LauncherError::NoArchive)?;
        handle.extract(bytes)?;
        self.record("Game ZIP extracted. Booting...", Severity::Ok);
        handle.run(&dos_args(cmd))
    }

    fn dispose_engine(&mut self, failure: &str) {
        self.running_command = None;
        if let Some(mut handle) = self.engine.take() {
            if let Some(layer) = handle.root_layer() {
                layer.detach();
            }
            if let Err(err) = handle.dispose() {
                self.record(format!("{} ({})", failure, err), Severity::Error);
            }
        }
    }

    fn reconcile(&mut self, force_resize: bool) -> Reconciled {
        let opts = ReconcileOptions {
            booted: self.engine.is_some(),
            force_resize,
        };
        let layer = match self.engine.as_mut() {
            Some(engine) => engine.root_layer(),
            None => None,
        };
        display::reconcile(self.container, self.surface.as_mut(), layer, opts)
    }

    fn remember_command(&mut self, cmd: &str) {
        if let Err(err) = self.prefs.set(STARTUP_COMMAND_KEY, cmd) {
            warn!(%err, "could not persist startup command");
        }
    }

    fn fail(&mut self, err: LauncherError, message: impl Into<String>) -> LauncherError {
        self.record(message, Severity::Error);
        err
    }

    fn record(&mut self, message: impl Into<String>, severity: Severity) {
        let message = message.into();
        match severity {
            Severity::Error => error!("{}", message),
            Severity::Info | Severity::Ok => info!("{}", message),
        }
        let now = self.clock.now();
        self.log.push(message, severity, now);
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if self.engine.is_some() {
            self.dispose_engine("Could not stop emulator cleanly.");
        }
        self.capture.release();
    }
}

/// trimmed; blank means the default listing
fn resolve_command(command: &str) -> String {
    match command.trim() {
        "" => DEFAULT_COMMAND.to_string(),
        cmd => cmd.to_string(),
    }
}
