//! Terminal front end: the hub, the coming-soon page and the DOS launcher.
//!
//! Rendering is TUI on a crossterm backend. Input is polled without blocking,
//! then the frame sleeps (spin_sleep) to keep a steady refresh.

use crossterm::event::{poll, read, Event, KeyCode, KeyEvent};
use crossterm::execute;
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use std::error::Error;
use std::io;
use std::path::Path;
use std::time::Duration;
use tracing::warn;
use tui::backend::{Backend, CrosstermBackend};
use tui::layout::{Constraint, Direction, Layout, Rect};
use tui::style::{Color, Modifier, Style};
use tui::text::{Span, Spans};
use tui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use tui::{Frame, Terminal};

use crate::archive::{ArchiveSource, ZipDecoder};
use crate::config::LauncherConfig;
use crate::display::TermSurface;
use crate::engine::DosboxFactory;
use crate::event_log::{Severity, SystemClock};
use crate::hub::{Emulator, Launcher, Status, CATALOG};
use crate::input::{KeyDisposition, TermFullscreen, CANCEL_KEY};
use crate::prefs::{FilePreferences, MemoryPreferences, PreferenceStore};
use crate::session::{Ports, SessionController, SessionState};

const ESC_HINT: &str = "Esc goes to the game. Use Shift+Esc to exit view.";
const KEY_HELP: &str =
    "[l]oad zip  [e]dit command  [s]tart  [r]eset  [v] big view  [f]ullscreen  [c]lear log  [p] snapshot  [b]ack";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PromptKind {
    ArchivePath,
    Command,
}

struct Prompt {
    kind: PromptKind,
    buffer: String,
}

struct DosView {
    controller: SessionController,
    surface: TermSurface,
    fullscreen: TermFullscreen,
    prompt: Option<Prompt>,
}

enum View {
    Hub(ListState),
    ComingSoon(&'static Emulator),
    Dos(Box<DosView>),
}

pub struct App {
    config: LauncherConfig,
    view: View,
    // used when there's no preference file, so the command survives between sessions
    memory_prefs: MemoryPreferences,
    quit: bool,
}

/// take over the terminal, run until the user quits, then give it back
pub fn run(config: LauncherConfig) -> Result<(), Box<dyn Error>> {
    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut term = Terminal::new(CrosstermBackend::new(stdout))?;

    let result = App::new(config).main_loop(&mut term);

    terminal::disable_raw_mode()?;
    execute!(term.backend_mut(), LeaveAlternateScreen)?;
    term.show_cursor()?;
    result
}

impl App {
    pub fn new(config: LauncherConfig) -> Self {
        App {
            config,
            view: hub_view(0),
            memory_prefs: MemoryPreferences::new(),
            quit: false,
        }
    }

    fn main_loop<B: Backend>(&mut self, term: &mut Terminal<B>) -> Result<(), Box<dyn Error>> {
        let frame = self.config.frame_interval();
        while !self.quit {
            self.draw(term)?;
            while poll(Duration::from_millis(0))? {
                match read()? {
                    Event::Key(key) => self.handle_key(key),
                    Event::Resize(_, _) => {
                        if let View::Dos(dos) = &mut self.view {
                            dos.controller.window_resized();
                        }
                    }
                    _ => {}
                }
            }
            if let View::Dos(dos) = &mut self.view {
                dos.controller.tick();
            }
            spin_sleep::sleep(frame);
        }
        Ok(())
    }

    fn draw<B: Backend>(&mut self, term: &mut Terminal<B>) -> io::Result<()> {
        let mut container = None;
        let view = &mut self.view;
        term.draw(|f| match view {
            View::Hub(state) => draw_hub(f, state),
            View::ComingSoon(emu) => draw_coming_soon(f, emu),
            View::Dos(dos) => container = Some(draw_dos(f, dos)),
        })?;
        if let (View::Dos(dos), Some(container)) = (&mut self.view, container) {
            dos.controller.resize(container);
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) {
        let next = match &mut self.view {
            View::Hub(state) => {
                let selected = state.selected().unwrap_or(0);
                match key.code {
                    KeyCode::Up | KeyCode::Char('k') => {
                        state.select(Some(selected.saturating_sub(1)));
                        None
                    }
                    KeyCode::Down | KeyCode::Char('j') => {
                        state.select(Some((selected + 1).min(CATALOG.len() - 1)));
                        None
                    }
                    KeyCode::Enter => Some(self.open(selected)),
                    KeyCode::Esc | KeyCode::Char('q') => {
                        self.quit = true;
                        None
                    }
                    _ => None,
                }
            }
            View::ComingSoon(_) => match key.code {
                KeyCode::Enter | KeyCode::Esc | KeyCode::Char('b') => Some(hub_view(0)),
                _ => None,
            },
            View::Dos(dos) => {
                if dos.handle_key(key) {
                    dos.controller.teardown();
                    Some(hub_view(0))
                } else {
                    None
                }
            }
        };
        if let Some(view) = next {
            self.view = view;
        }
    }

    fn open(&self, index: usize) -> View {
        let emu = &CATALOG[index];
        match emu.launcher {
            Some(Launcher::Dos) => View::Dos(Box::new(self.dos_view())),
            None => View::ComingSoon(emu),
        }
    }

    fn dos_view(&self) -> DosView {
        let surface = TermSurface::new();
        let fullscreen = TermFullscreen::new();
        let ports = Ports {
            decoder: Box::new(ZipDecoder),
            engines: Box::new(DosboxFactory),
            fullscreen: Box::new(fullscreen.clone()),
            prefs: self.prefs(),
            clock: Box::new(SystemClock),
            surface: Box::new(surface.clone()),
        };
        let mut controller = SessionController::new(ports, &self.config);
        // real geometry arrives with the first frame
        controller.mount(Rect::default());
        DosView {
            controller,
            surface,
            fullscreen,
            prompt: None,
        }
    }

    fn prefs(&self) -> Box<dyn PreferenceStore> {
        match &self.config.prefs_path {
            Some(path) => match FilePreferences::open(path.clone()) {
                Ok(prefs) => Box::new(prefs),
                Err(err) => {
                    warn!(%err, path = %path.display(), "preferences unreadable; keeping them in memory");
                    Box::new(self.memory_prefs.clone())
                }
            },
            None => Box::new(self.memory_prefs.clone()),
        }
    }
}

fn hub_view(selected: usize) -> View {
    let mut state = ListState::default();
    state.select(Some(selected));
    View::Hub(state)
}

impl DosView {
    /// true when the user asked to go back to the hub
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if self.controller.handle_key(&key) != KeyDisposition::Forward {
            return false;
        }

        if let Some(prompt) = self.prompt.as_mut() {
            match key.code {
                KeyCode::Char(c) => prompt.buffer.push(c),
                KeyCode::Backspace => {
                    prompt.buffer.pop();
                }
                KeyCode::Esc => self.prompt = None,
                KeyCode::Enter => {
                    if let Some(prompt) = self.prompt.take() {
                        self.submit(prompt);
                    }
                }
                _ => {}
            }
            return false;
        }

        // a captured Esc belongs to the game
        if key.code == CANCEL_KEY && self.controller.is_fullscreen() {
            return false;
        }

        match key.code {
            KeyCode::Char('l') => {
                self.prompt = Some(Prompt {
                    kind: PromptKind::ArchivePath,
                    buffer: String::new(),
                })
            }
            KeyCode::Char('e') => {
                self.prompt = Some(Prompt {
                    kind: PromptKind::Command,
                    buffer: self.controller.command().to_string(),
                })
            }
            KeyCode::Char('s') => {
                let cmd = self.controller.command().to_string();
                let _ = self.controller.start(&cmd);
            }
            KeyCode::Char('r') => self.controller.reset(),
            KeyCode::Char('v') => self.controller.toggle_overlay(),
            KeyCode::Char('f') => {
                let _ = self.controller.toggle_fullscreen();
            }
            KeyCode::Char('c') => self.controller.clear_log(),
            KeyCode::Char('p') => self.controller.snapshot_log(),
            KeyCode::Char('b') | KeyCode::Esc => return true,
            _ => {}
        }
        false
    }

    fn submit(&mut self, prompt: Prompt) {
        match prompt.kind {
            PromptKind::Command => self.controller.set_command(prompt.buffer.trim()),
            PromptKind::ArchivePath => {
                // dropping a file on most terminals pastes its quoted path
                let raw = prompt.buffer.trim().trim_matches(|c| c == '\'' || c == '"');
                if raw.is_empty() {
                    return;
                }
                match ArchiveSource::from_path(Path::new(raw)) {
                    Ok(source) => {
                        let _ = self.controller.load_archive(source);
                    }
                    Err(err) => self.controller.report_read_error(&err),
                }
            }
        }
    }
}

fn draw_hub<B: Backend>(f: &mut Frame<B>, state: &mut ListState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(0)].as_ref())
        .split(f.size());

    let hero = Paragraph::new(vec![
        Spans::from(Span::styled(
            "Pick Your Emulator",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Spans::from("Local emulation hub. Load ROMs, boot instantly, no uploads."),
    ])
    .block(Block::default().title("Retro Deck").borders(Borders::ALL));
    f.render_widget(hero, chunks[0]);

    let items: Vec<ListItem> = CATALOG
        .iter()
        .map(|emu| {
            let colour = match emu.status {
                Status::Ready => Color::Green,
                Status::Wip => Color::Yellow,
            };
            ListItem::new(vec![
                Spans::from(vec![
                    Span::styled(format!("[{}] ", emu.status.label()), Style::default().fg(colour)),
                    Span::styled(emu.name, Style::default().add_modifier(Modifier::BOLD)),
                    Span::styled(
                        format!("  {}", emu.tags.join(" · ")),
                        Style::default().fg(Color::DarkGray),
                    ),
                ]),
                Spans::from(format!("    {}", emu.description)),
            ])
        })
        .collect();
    let list = List::new(items)
        .block(Block::default().title("Launchers").borders(Borders::ALL))
        .highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol("> ");
    f.render_stateful_widget(list, chunks[1], state);
}

fn draw_coming_soon<B: Backend>(f: &mut Frame<B>, emu: &Emulator) {
    let text = vec![
        Spans::from(Span::styled(emu.name, Style::default().add_modifier(Modifier::BOLD))),
        Spans::from(emu.description),
        Spans::from(""),
        Spans::from("We're wiring this emulator up. Core integration, controller mappings,"),
        Spans::from("and save-state plumbing are in progress."),
        Spans::from(""),
        Spans::from(Span::styled("[b] Back to hub", Style::default().fg(Color::Cyan))),
    ];
    let page = Paragraph::new(text)
        .block(Block::default().title("Coming soon").borders(Borders::ALL))
        .wrap(Wrap { trim: true });
    f.render_widget(page, f.size());
}

/// returns the screen's content box, which is the surface's container
fn draw_dos<B: Backend>(f: &mut Frame<B>, dos: &DosView) -> Rect {
    let ctl = &dos.controller;
    let area = f.size();

    let screen = if dos.fullscreen.is_zoomed() {
        area
    } else if ctl.overlay_open() {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(1)].as_ref())
            .split(area);
        f.render_widget(
            Paragraph::new("[v] Close big view  [f] Fullscreen"),
            chunks[1],
        );
        chunks[0]
    } else {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0), Constraint::Length(1)].as_ref())
            .split(area);
        let header = Paragraph::new("Play your own MS-DOS games. Nothing leaves this machine.")
            .block(Block::default().title("MS-DOS Player").borders(Borders::ALL));
        f.render_widget(header, rows[0]);
        f.render_widget(
            Paragraph::new(Spans::from(Span::styled(
                KEY_HELP,
                Style::default().fg(Color::DarkGray),
            ))),
            rows[2],
        );

        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)].as_ref())
            .split(rows[1]);
        let side = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(8), Constraint::Min(0)].as_ref())
            .split(cols[1]);
        draw_controls(f, dos, side[0]);
        draw_log(f, ctl, side[1]);
        cols[0]
    };

    dos.surface.draw(f, screen, ctl.running_command());
    Block::default().borders(Borders::ALL).inner(screen)
}

fn draw_controls<B: Backend>(f: &mut Frame<B>, dos: &DosView, area: Rect) {
    let ctl = &dos.controller;
    let status = match ctl.archive_meta() {
        Some(meta) => Spans::from(vec![
            Span::styled("● ", Style::default().fg(Color::Green)),
            Span::raw(format!("ZIP loaded: {} ({} KB)", meta.name, meta.size_kb)),
        ]),
        None => Spans::from(vec![
            Span::styled("● ", Style::default().fg(Color::DarkGray)),
            Span::raw("No game loaded"),
        ]),
    };
    let state = match ctl.state() {
        SessionState::Idle => "idle",
        SessionState::Loaded => "loaded",
        SessionState::Booted => "running",
    };
    let input = match &dos.prompt {
        Some(p) if p.kind == PromptKind::ArchivePath => format!("ZIP path: {}_", p.buffer),
        Some(p) => format!("Startup command: {}_", p.buffer),
        None => format!("Startup command: {}", ctl.command()),
    };
    let lines = vec![
        status,
        Spans::from(format!("Session: {}", state)),
        Spans::from(Span::styled(input, Style::default().fg(Color::Cyan))),
        Spans::from(""),
        Spans::from(Span::styled(ESC_HINT, Style::default().fg(Color::DarkGray))),
    ];
    let panel = Paragraph::new(lines)
        .block(Block::default().title("Load & Launch").borders(Borders::ALL))
        .wrap(Wrap { trim: true });
    f.render_widget(panel, area);
}

fn draw_log<B: Backend>(f: &mut Frame<B>, ctl: &SessionController, area: Rect) {
    let items: Vec<ListItem> = if ctl.log().is_empty() {
        vec![ListItem::new(Spans::from(Span::styled(
            "Idle. Waiting for actions...",
            Style::default().fg(Color::DarkGray),
        )))]
    } else {
        ctl.log()
            .iter()
            .map(|entry| {
                let colour = match entry.severity {
                    Severity::Info => Color::Gray,
                    Severity::Ok => Color::Green,
                    Severity::Error => Color::Red,
                };
                ListItem::new(Spans::from(vec![
                    Span::styled(
                        format!("{} ", entry.time_label()),
                        Style::default().fg(Color::DarkGray),
                    ),
                    Span::styled(entry.message.clone(), Style::default().fg(colour)),
                ]))
            })
            .collect()
    };
    let log = List::new(items).block(Block::default().title("Status & Log").borders(Borders::ALL));
    f.render_widget(log, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::DummyEngineFactory;
    use crate::event_log::ManualClock;
    use crossterm::event::KeyModifiers;

    fn dos_view() -> DosView {
        let surface = TermSurface::new();
        let fullscreen = TermFullscreen::new();
        let ports = Ports {
            decoder: Box::new(ZipDecoder),
            engines: Box::new(DummyEngineFactory::new()),
            fullscreen: Box::new(fullscreen.clone()),
            prefs: Box::new(MemoryPreferences::new()),
            clock: Box::new(ManualClock::new()),
            surface: Box::new(surface.clone()),
        };
        let mut controller = SessionController::new(ports, &LauncherConfig::default());
        controller.mount(Rect::new(0, 0, 80, 25));
        DosView {
            controller,
            surface,
            fullscreen,
            prompt: None,
        }
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(dos: &mut DosView, text: &str) {
        for c in text.chars() {
            dos.handle_key(key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn test_edit_command() {
        let mut dos = dos_view();
        dos.handle_key(key(KeyCode::Char('e')));
        for _ in 0..3 {
            dos.handle_key(key(KeyCode::Backspace));
        }
        type_text(&mut dos, "KEEN4E.EXE");
        dos.handle_key(key(KeyCode::Enter));
        assert_eq!(dos.controller.command(), "KEEN4E.EXE");
        assert!(dos.prompt.is_none());
    }

    #[test]
    fn test_missing_path_is_logged() {
        let mut dos = dos_view();
        dos.handle_key(key(KeyCode::Char('l')));
        type_text(&mut dos, "'/nonexistent/doom.zip'");
        dos.handle_key(key(KeyCode::Enter));
        assert_eq!(dos.controller.log().count(Severity::Error), 1);
        assert_eq!(dos.controller.state(), SessionState::Idle);
    }

    #[test]
    fn test_back_and_captured_escape() {
        let mut dos = dos_view();
        dos.handle_key(key(KeyCode::Char('f')));
        assert!(dos.fullscreen.is_zoomed());
        assert!(dos.fullscreen.is_captured());
        // Esc goes to the game, not back to the hub
        assert!(!dos.handle_key(key(CANCEL_KEY)));
        assert!(dos.fullscreen.is_zoomed());

        assert!(!dos.handle_key(KeyEvent::new(CANCEL_KEY, KeyModifiers::SHIFT)));
        assert!(!dos.fullscreen.is_zoomed());
        assert!(dos.handle_key(key(KeyCode::Char('b'))));
    }

    #[test]
    fn test_hub_navigation() {
        let mut app = App::new(LauncherConfig::default());
        app.handle_key(key(KeyCode::Down));
        app.handle_key(key(KeyCode::Enter));
        assert!(matches!(app.view, View::ComingSoon(emu) if emu.id == "gba"));
        app.handle_key(key(KeyCode::Char('b')));
        assert!(matches!(app.view, View::Hub(_)));
        app.handle_key(key(KeyCode::Char('q')));
        assert!(app.quit);
    }
}
