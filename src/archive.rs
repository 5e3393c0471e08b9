use std::fs;
use std::io::Cursor;
use std::path::Path;

use crate::config::DEFAULT_COMMAND;
use crate::error::LauncherError;

/// mime types the launcher treats as a zip, alongside the `.zip` extension
const ZIP_CONTENT_TYPES: [&str; 2] = ["application/zip", "application/x-zip-compressed"];

/// extensions DOS can launch, best first
const LAUNCHABLE_EXTENSIONS: [(&str, u8); 3] = [("exe", 0), ("bat", 1), ("com", 2)];

/// a path containing any of these is probably the thing to run
const HINT_WORDS: [&str; 5] = ["start", "run", "play", "game", "dos"];

/// one entry from a decoded archive, with `/` separators
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub path: String,
    pub is_directory: bool,
}

impl ArchiveEntry {
    pub fn file(path: &str) -> Self {
        ArchiveEntry {
            path: path.to_string(),
            is_directory: false,
        }
    }

    pub fn directory(path: &str) -> Self {
        ArchiveEntry {
            path: path.to_string(),
            is_directory: true,
        }
    }
}

/// lists the contents of an archive container
pub trait ArchiveDecoder {
    fn entries(&self, bytes: &[u8]) -> Result<Vec<ArchiveEntry>, LauncherError>;
}

/// the real thing, backed by the `zip` crate
pub struct ZipDecoder;

impl ArchiveDecoder for ZipDecoder {
    fn entries(&self, bytes: &[u8]) -> Result<Vec<ArchiveEntry>, LauncherError> {
        let mut zip = zip::ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = Vec::with_capacity(zip.len());
        for i in 0..zip.len() {
            let file = zip.by_index(i)?;
            entries.push(ArchiveEntry {
                path: file.name().to_string(),
                is_directory: file.is_dir(),
            });
        }
        Ok(entries)
    }
}

/// canned decoder for testing the inspector and session without real zips
pub struct DummyDecoder {
    entries: Option<Vec<ArchiveEntry>>,
}

impl DummyDecoder {
    pub fn new(entries: Vec<ArchiveEntry>) -> Self {
        DummyDecoder {
            entries: Some(entries),
        }
    }

    /// every decode fails
    pub fn corrupt() -> Self {
        DummyDecoder { entries: None }
    }
}

impl ArchiveDecoder for DummyDecoder {
    fn entries(&self, _bytes: &[u8]) -> Result<Vec<ArchiveEntry>, LauncherError> {
        self.entries
            .clone()
            .ok_or_else(|| LauncherError::Decode("invalid or unsupported zip data".to_string()))
    }
}

/// an archive as handed over by the picker: name, optional mime type, bytes
#[derive(Debug, Clone)]
pub struct ArchiveSource {
    pub name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ArchiveSource {
    pub fn new(name: &str, content_type: Option<&str>, bytes: Vec<u8>) -> Self {
        ArchiveSource {
            name: name.to_string(),
            content_type: content_type.map(str::to_string),
            bytes,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, LauncherError> {
        let bytes = fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(ArchiveSource {
            name,
            content_type: None,
            bytes,
        })
    }

    pub fn is_zip(&self) -> bool {
        self.name.to_lowercase().ends_with(".zip")
            || self
                .content_type
                .as_deref()
                .map_or(false, |t| ZIP_CONTENT_TYPES.contains(&t))
    }

    /// rounded to the nearest KB
    pub fn size_kb(&self) -> usize {
        (self.bytes.len() + 512) / 1024
    }
}

/// what the inspector settled on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupCommand {
    Detected(String),
    /// nothing launchable in the archive
    Fallback,
}

impl StartupCommand {
    pub fn as_str(&self) -> &str {
        match self {
            StartupCommand::Detected(path) => path,
            StartupCommand::Fallback => DEFAULT_COMMAND,
        }
    }
}

/// scoring tuple for one launchable entry; lower sorts first
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Candidate<'a> {
    depth: usize,
    extension_rank: u8,
    keyword_rank: u8,
    path_len: usize,
    path: &'a str,
}

impl<'a> Candidate<'a> {
    fn from_path(path: &'a str) -> Option<Self> {
        let lower = path.to_lowercase();
        let (_, ext) = lower.rsplit_once('.')?;
        let extension_rank = LAUNCHABLE_EXTENSIONS
            .iter()
            .find(|(e, _)| *e == ext)
            .map(|(_, rank)| *rank)?;
        let keyword_rank = if HINT_WORDS.iter().any(|w| lower.contains(w)) {
            0
        } else {
            1
        };
        Some(Candidate {
            depth: path.matches('/').count(),
            extension_rank,
            keyword_rank,
            path_len: path.len(),
            path,
        })
    }
}

/// best launchable path among the entries, if there is one. shallow paths win
/// first, then extension, then hint words, then shorter paths, then plain order
pub fn best_executable(entries: &[ArchiveEntry]) -> Option<&str> {
    entries
        .iter()
        .filter(|e| !e.is_directory)
        .filter_map(|e| Candidate::from_path(&e.path))
        .min()
        .map(|c| c.path)
}

/// decode the archive and pick what to run at boot
pub fn select_startup_command(
    decoder: &dyn ArchiveDecoder,
    bytes: &[u8],
) -> Result<StartupCommand, LauncherError> {
    let entries = decoder.entries(bytes)?;
    Ok(match best_executable(&entries) {
        Some(path) => StartupCommand::Detected(path.to_string()),
        None => StartupCommand::Fallback,
    })
}

#[cfg(test)]
pub(crate) fn zip_fixture(files: &[&str]) -> Vec<u8> {
    use std::io::Write;
    use zip::write::FileOptions;

    let mut w = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for name in files {
        if name.ends_with('/') {
            w.add_directory(*name, FileOptions::default()).unwrap();
        } else {
            w.start_file(*name, FileOptions::default()).unwrap();
            w.write_all(b"MZ").unwrap();
        }
    }
    w.finish().unwrap().into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(paths: &[&str]) -> Vec<ArchiveEntry> {
        paths.iter().map(|p| ArchiveEntry::file(p)).collect()
    }

    #[test]
    fn test_no_executables_falls_back_to_dir() -> Result<(), LauncherError> {
        let d = DummyDecoder::new(files(&["README.TXT", "DATA/LEVEL1.DAT"]));
        let cmd = select_startup_command(&d, &[])?;
        assert_eq!(cmd, StartupCommand::Fallback);
        assert_eq!(cmd.as_str(), "dir");
        Ok(())
    }

    #[test]
    fn test_shallow_beats_extension_rank() {
        let e = files(&["sub/dir/launcher.bat", "GAME.EXE"]);
        assert_eq!(best_executable(&e), Some("GAME.EXE"));

        let e = files(&["sub/setup.exe", "go.com"]);
        assert_eq!(best_executable(&e), Some("go.com"));
    }

    #[test]
    fn test_extension_rank_before_keyword() {
        let e = files(&["demo.com", "run.bat"]);
        assert_eq!(best_executable(&e), Some("run.bat"));

        let e = files(&["play.com", "x.bat"]);
        assert_eq!(best_executable(&e), Some("x.bat"));
    }

    #[test]
    fn test_keyword_breaks_tie() {
        let e = files(&["b/boot.exe", "a/start.exe"]);
        assert_eq!(best_executable(&e), Some("a/start.exe"));
    }

    #[test]
    fn test_shorter_path_then_lexicographic() {
        let e = files(&["setup.exe", "fx.exe"]);
        assert_eq!(best_executable(&e), Some("fx.exe"));

        let e = files(&["b.exe", "a.exe"]);
        assert_eq!(best_executable(&e), Some("a.exe"));
    }

    #[test]
    fn test_directories_and_unknown_extensions_ignored() {
        let e = vec![
            ArchiveEntry::directory("game.exe/"),
            ArchiveEntry::file("GAME"),
            ArchiveEntry::file("notes.txt"),
            ArchiveEntry::file("tools/ed.COM"),
        ];
        assert_eq!(best_executable(&e), Some("tools/ed.COM"));
    }

    #[test]
    fn test_corrupt_archive_is_decode_error() {
        let d = DummyDecoder::corrupt();
        assert!(matches!(
            select_startup_command(&d, &[]),
            Err(LauncherError::Decode(_))
        ));
    }

    #[test]
    fn test_zip_decoder_lists_entries() -> Result<(), LauncherError> {
        let bytes = zip_fixture(&["KEEN/", "KEEN/KEEN4E.EXE", "KEEN/README.TXT"]);
        let entries = ZipDecoder.entries(&bytes)?;
        assert_eq!(entries.len(), 3);
        assert!(entries[0].is_directory);
        assert_eq!(entries[1], ArchiveEntry::file("KEEN/KEEN4E.EXE"));
        Ok(())
    }

    #[test]
    fn test_zip_decoder_picks_root_executable() -> Result<(), LauncherError> {
        let bytes = zip_fixture(&["sub/dir/launcher.bat", "GAME.EXE"]);
        let cmd = select_startup_command(&ZipDecoder, &bytes)?;
        assert_eq!(cmd, StartupCommand::Detected("GAME.EXE".to_string()));
        Ok(())
    }

    #[test]
    fn test_zip_decoder_rejects_garbage() {
        assert!(matches!(
            ZipDecoder.entries(b"definitely not a zip"),
            Err(LauncherError::Decode(_))
        ));
    }

    #[test]
    fn test_source_validation() {
        assert!(ArchiveSource::new("DOOM.ZIP", None, vec![]).is_zip());
        assert!(ArchiveSource::new("blob", Some("application/x-zip-compressed"), vec![]).is_zip());
        assert!(!ArchiveSource::new("doom.rar", Some("application/x-rar"), vec![]).is_zip());
    }

    #[test]
    fn test_size_kb_rounds() {
        assert_eq!(ArchiveSource::new("a.zip", None, vec![0; 1536]).size_kb(), 2);
        assert_eq!(ArchiveSource::new("a.zip", None, vec![0; 1535]).size_kb(), 1);
    }
}
