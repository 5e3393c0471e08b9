/// launchers shown on the hub. only MS-DOS is wired up so far
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ready,
    Wip,
}

impl Status {
    pub fn label(&self) -> &'static str {
        match self {
            Status::Ready => "Ready",
            Status::Wip => "WIP",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Launcher {
    Dos,
}

#[derive(Debug)]
pub struct Emulator {
    pub id: &'static str,
    pub name: &'static str,
    pub status: Status,
    pub description: &'static str,
    pub tags: &'static [&'static str],
    pub launcher: Option<Launcher>,
}

pub static CATALOG: [Emulator; 6] = [
    Emulator {
        id: "dos",
        name: "MS-DOS",
        status: Status::Ready,
        description: "Run classic PC titles via DOSBox. Load a ZIP and boot instantly.",
        tags: &["PC", "DOS"],
        launcher: Some(Launcher::Dos),
    },
    Emulator {
        id: "gba",
        name: "Game Boy Advance",
        status: Status::Wip,
        description: "WIP: core with save states and fast-forward.",
        tags: &["Nintendo", "GBA"],
        launcher: None,
    },
    Emulator {
        id: "nes",
        name: "NES / Famicom",
        status: Status::Wip,
        description: "8-bit nostalgia with shader presets and CRT vibes.",
        tags: &["Nintendo", "8-bit"],
        launcher: None,
    },
    Emulator {
        id: "snes",
        name: "SNES",
        status: Status::Wip,
        description: "Super Nintendo core with planned rewind and pixel-perfect scaling.",
        tags: &["Nintendo", "16-bit"],
        launcher: None,
    },
    Emulator {
        id: "psx",
        name: "PlayStation",
        status: Status::Wip,
        description: "PS1 classics with texture filtering and dual-shock mapping.",
        tags: &["Sony", "32-bit"],
        launcher: None,
    },
    Emulator {
        id: "n64",
        name: "Nintendo 64",
        status: Status::Wip,
        description: "Early 3D gems with planned Rumble Pak support.",
        tags: &["Nintendo", "3D"],
        launcher: None,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_ready_entries_have_launchers() {
        for emu in CATALOG.iter() {
            assert_eq!(emu.status == Status::Ready, emu.launcher.is_some(), "{}", emu.id);
        }
    }

    #[test]
    fn test_ids_unique() {
        for (i, emu) in CATALOG.iter().enumerate() {
            assert!(CATALOG[i + 1..].iter().all(|other| other.id != emu.id), "{}", emu.id);
        }
        assert_eq!(CATALOG[0].launcher, Some(Launcher::Dos));
    }
}
