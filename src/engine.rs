//! The emulation engine seam.
//!
//! The launcher never emulates anything itself. An [`EngineFactory`] hands out
//! one [`EngineHandle`] per boot; the handle takes the archive into its own
//! filesystem, runs a DOS command line, and is disposed when the session stops.

use std::cell::RefCell;
use std::env;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::rc::Rc;
use tempfile::TempDir;
use tracing::{debug, info};

use crate::display::{Layer, Size};
use crate::error::LauncherError;

/// where the engine's boot resources live (for the process engine, its binary)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub boot_resource: String,
}

/// the surface a new engine instance is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceBinding {
    pub buffer: Size,
}

pub trait EngineFactory {
    /// fails with `EngineUnavailable` when the engine can't be found
    fn create(
        &mut self,
        surface: SurfaceBinding,
        config: &EngineConfig,
    ) -> Result<Box<dyn EngineHandle>, LauncherError>;
}

/// one running engine instance
pub trait EngineHandle {
    /// wait until the engine can take a filesystem and a command line
    fn ready(&mut self) -> Result<(), LauncherError>;

    /// unpack a zip into the engine's filesystem root
    fn extract(&mut self, archive: &[u8]) -> Result<(), LauncherError>;

    fn run(&mut self, args: &[String]) -> Result<(), LauncherError>;

    /// whatever the engine layered over the surface
    fn root_layer(&mut self) -> Option<&mut dyn Layer> {
        None
    }

    /// the emulated program quit by itself
    fn has_exited(&mut self) -> bool {
        false
    }

    fn dispose(&mut self) -> Result<(), LauncherError>;
}

/// mount the extracted archive as C: and run `command` from there
pub fn dos_args(command: &str) -> Vec<String> {
    ["-c", "mount c .", "-c", "c:", "-c", command]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// runs an external DOSBox against a temp directory holding the archive
pub struct DosboxFactory;

impl EngineFactory for DosboxFactory {
    fn create(
        &mut self,
        surface: SurfaceBinding,
        config: &EngineConfig,
    ) -> Result<Box<dyn EngineHandle>, LauncherError> {
        let binary = locate(&config.boot_resource).ok_or_else(|| {
            LauncherError::EngineUnavailable(format!(
                "{} not found. Install DOSBox or set RETRO_DECK_ENGINE",
                config.boot_resource
            ))
        })?;
        debug!(binary = %binary.display(), ?surface, "engine created");
        Ok(Box::new(DosboxProcess {
            binary,
            workdir: None,
            child: None,
        }))
    }
}

fn locate(binary: &str) -> Option<PathBuf> {
    let path = Path::new(binary);
    if path.components().count() > 1 {
        return path.is_file().then(|| path.to_path_buf());
    }
    env::var_os("PATH").and_then(|paths| {
        env::split_paths(&paths)
            .map(|dir| dir.join(binary))
            .find(|candidate| candidate.is_file())
    })
}

pub struct DosboxProcess {
    binary: PathBuf,
    workdir: Option<TempDir>,
    child: Option<Child>,
}

impl DosboxProcess {
    fn workdir(&self) -> Result<&Path, LauncherError> {
        self.workdir
            .as_ref()
            .map(TempDir::path)
            .ok_or_else(|| LauncherError::EngineRuntime("engine is not ready".to_string()))
    }
}

impl EngineHandle for DosboxProcess {
    fn ready(&mut self) -> Result<(), LauncherError> {
        if self.workdir.is_none() {
            let dir = tempfile::Builder::new()
                .prefix("retro-deck-")
                .tempdir()
                .map_err(|err| LauncherError::EngineRuntime(format!("no scratch filesystem: {}", err)))?;
            self.workdir = Some(dir);
        }
        Ok(())
    }

    fn extract(&mut self, archive: &[u8]) -> Result<(), LauncherError> {
        let dir = self.workdir()?.to_path_buf();
        zip::ZipArchive::new(Cursor::new(archive))
            .and_then(|mut zip| zip.extract(&dir))
            .map_err(|err| LauncherError::EngineRuntime(format!("extract failed: {}", err)))
    }

    fn run(&mut self, args: &[String]) -> Result<(), LauncherError> {
        let dir = self.workdir()?;
        let child = Command::new(&self.binary)
            .args(args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| {
                LauncherError::EngineRuntime(format!(
                    "could not launch {}: {}",
                    self.binary.display(),
                    err
                ))
            })?;
        info!(pid = child.id(), "engine running");
        self.child = Some(child);
        Ok(())
    }

    fn has_exited(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(Some(_))),
            None => false,
        }
    }

    fn dispose(&mut self) -> Result<(), LauncherError> {
        if let Some(mut child) = self.child.take() {
            match child.kill() {
                Ok(()) => {}
                // already gone
                Err(err) if err.kind() == io::ErrorKind::InvalidInput => {}
                Err(err) => return Err(LauncherError::EngineRuntime(err.to_string())),
            }
            child
                .wait()
                .map_err(|err| LauncherError::EngineRuntime(err.to_string()))?;
        }
        if let Some(dir) = self.workdir.take() {
            dir.close()
                .map_err(|err| LauncherError::EngineRuntime(err.to_string()))?;
        }
        Ok(())
    }
}

impl Drop for DosboxProcess {
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// steps a `DummyEngine` can be told to fail at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStage {
    Create,
    Ready,
    Extract,
    Run,
    Dispose,
}

/// what the dummy engines have been asked to do, across all instances
#[derive(Debug, Default)]
pub struct EngineRecord {
    pub created: usize,
    pub disposed: usize,
    pub live: usize,
    pub bindings: Vec<SurfaceBinding>,
    pub extracted: Vec<Vec<u8>>,
    pub runs: Vec<Vec<String>>,
    pub layer_fills: usize,
    pub layers_detached: usize,
    pub exited: bool,
}

/// engine for testing the session without a real emulator
#[derive(Clone, Default)]
pub struct DummyEngineFactory {
    pub fail_at: Option<EngineStage>,
    record: Rc<RefCell<EngineRecord>>,
}

impl DummyEngineFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_at(stage: EngineStage) -> Self {
        DummyEngineFactory {
            fail_at: Some(stage),
            ..Self::default()
        }
    }

    pub fn record(&self) -> std::cell::Ref<'_, EngineRecord> {
        self.record.borrow()
    }

    /// make the running program quit
    pub fn exit_program(&self) {
        self.record.borrow_mut().exited = true;
    }
}

impl EngineFactory for DummyEngineFactory {
    fn create(
        &mut self,
        surface: SurfaceBinding,
        _config: &EngineConfig,
    ) -> Result<Box<dyn EngineHandle>, LauncherError> {
        if self.fail_at == Some(EngineStage::Create) {
            return Err(LauncherError::EngineUnavailable(
                "emulator script not loaded yet".to_string(),
            ));
        }
        let mut r = self.record.borrow_mut();
        r.created += 1;
        r.live += 1;
        r.exited = false;
        r.bindings.push(surface);
        Ok(Box::new(DummyEngine {
            fail_at: self.fail_at,
            layer: DummyLayer {
                record: Rc::clone(&self.record),
            },
            record: Rc::clone(&self.record),
        }))
    }
}

pub struct DummyEngine {
    fail_at: Option<EngineStage>,
    layer: DummyLayer,
    record: Rc<RefCell<EngineRecord>>,
}

impl DummyEngine {
    fn check(&self, stage: EngineStage) -> Result<(), LauncherError> {
        if self.fail_at == Some(stage) {
            return Err(LauncherError::EngineRuntime(format!("{:?} failed", stage)));
        }
        Ok(())
    }
}

impl EngineHandle for DummyEngine {
    fn ready(&mut self) -> Result<(), LauncherError> {
        self.check(EngineStage::Ready)
    }

    fn extract(&mut self, archive: &[u8]) -> Result<(), LauncherError> {
        self.check(EngineStage::Extract)?;
        self.record.borrow_mut().extracted.push(archive.to_vec());
        Ok(())
    }

    fn run(&mut self, args: &[String]) -> Result<(), LauncherError> {
        self.check(EngineStage::Run)?;
        self.record.borrow_mut().runs.push(args.to_vec());
        Ok(())
    }

    fn root_layer(&mut self) -> Option<&mut dyn Layer> {
        Some(&mut self.layer)
    }

    fn has_exited(&mut self) -> bool {
        self.record.borrow().exited
    }

    fn dispose(&mut self) -> Result<(), LauncherError> {
        let mut r = self.record.borrow_mut();
        r.disposed += 1;
        r.live = r.live.saturating_sub(1);
        drop(r);
        self.check(EngineStage::Dispose)
    }
}

struct DummyLayer {
    record: Rc<RefCell<EngineRecord>>,
}

impl Layer for DummyLayer {
    fn fill_container(&mut self) {
        self.record.borrow_mut().layer_fills += 1;
    }

    fn detach(&mut self) {
        self.record.borrow_mut().layers_detached += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::zip_fixture;

    #[test]
    fn test_dos_args() {
        assert_eq!(
            dos_args("KEEN4E.EXE"),
            ["-c", "mount c .", "-c", "c:", "-c", "KEEN4E.EXE"]
        );
    }

    #[test]
    fn test_missing_binary_is_unavailable() {
        let config = EngineConfig {
            boot_resource: "/nonexistent/retro-deck/dosbox".to_string(),
        };
        let binding = SurfaceBinding {
            buffer: Size::new(80, 25),
        };
        assert!(matches!(
            DosboxFactory.create(binding, &config),
            Err(LauncherError::EngineUnavailable(_))
        ));
    }

    #[test]
    fn test_process_engine_extracts_into_scratch_dir() -> Result<(), LauncherError> {
        let mut engine = DosboxProcess {
            binary: PathBuf::from("dosbox"),
            workdir: None,
            child: None,
        };
        assert!(engine.extract(&[]).is_err());
        engine.ready()?;
        engine.extract(&zip_fixture(&["GAME/", "GAME/PLAY.EXE"]))?;
        let dir = engine.workdir()?.to_path_buf();
        assert!(dir.join("GAME").join("PLAY.EXE").is_file());
        engine.dispose()?;
        assert!(!dir.exists());
        Ok(())
    }

    #[test]
    fn test_process_engine_reports_bad_zip_as_runtime_error() -> Result<(), LauncherError> {
        let mut engine = DosboxProcess {
            binary: PathBuf::from("dosbox"),
            workdir: None,
            child: None,
        };
        engine.ready()?;
        assert!(matches!(
            engine.extract(b"junk"),
            Err(LauncherError::EngineRuntime(_))
        ));
        engine.dispose()
    }

    #[test]
    fn test_dummy_engine_tracks_instances() -> Result<(), LauncherError> {
        let mut factory = DummyEngineFactory::new();
        let config = EngineConfig {
            boot_resource: "dummy".to_string(),
        };
        let binding = SurfaceBinding {
            buffer: Size::new(640, 400),
        };
        let mut h = factory.create(binding, &config)?;
        h.ready()?;
        h.run(&dos_args("dir"))?;
        assert_eq!(factory.record().live, 1);
        h.dispose()?;
        assert_eq!(factory.record().live, 0);
        assert_eq!(factory.record().runs.len(), 1);
        Ok(())
    }
}
