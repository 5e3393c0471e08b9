use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tui::backend::Backend;
use tui::layout::{Alignment, Rect};
use tui::style::{Color, Modifier, Style};
use tui::text::{Span, Spans};
use tui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use tui::Frame;

/// pixel (or cell) dimensions of a surface's backing buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: u16,
    pub height: u16,
}

impl Size {
    pub fn new(width: u16, height: u16) -> Self {
        Size { width, height }
    }

    /// content box of a container
    pub fn of(area: Rect) -> Self {
        Size::new(area.width, area.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// The bitmap target the engine draws into. Writing the buffer size throws
/// away whatever is currently drawn, so only the reconciler does it.
pub trait RenderSurface {
    fn buffer_size(&self) -> Size;

    /// resize the backing buffer; destroys current contents
    fn set_buffer_size(&mut self, size: Size);

    /// stretch the presented box to 100% of the container, leaving pixels alone
    fn fill_container(&mut self);

    /// blank the buffer
    fn clear(&mut self);
}

/// something the engine injected around the surface (wrapper plus whatever is
/// nested in it)
pub trait Layer {
    /// stretch this layer and its nested layers to the container
    fn fill_container(&mut self);

    /// take the layer out of the container
    fn detach(&mut self);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileOptions {
    pub booted: bool,
    /// rewrite the buffer even though a session is live
    pub force_resize: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// container not laid out yet
    Skipped,
    /// boxes stretched, buffer untouched
    Stretched,
    /// buffer rewritten to this size, boxes stretched
    Resized(Size),
}

/// bring the surface (and any engine layer) in line with the container
pub fn reconcile(
    container: Rect,
    surface: &mut dyn RenderSurface,
    layer: Option<&mut dyn Layer>,
    opts: ReconcileOptions,
) -> Reconciled {
    let target = Size::of(container);
    if target.is_empty() {
        return Reconciled::Skipped;
    }

    // a live buffer must not be resized unless asked, or the frame is lost
    let resized = !opts.booted || opts.force_resize;
    if resized {
        surface.set_buffer_size(target);
    }

    surface.fill_container();
    if let Some(layer) = layer {
        layer.fill_container();
    }

    if resized {
        Reconciled::Resized(target)
    } else {
        Reconciled::Stretched
    }
}

/// Pending reconciles that can't run straight away: one on the next frame,
/// and one after the layout has had time to settle. Rescheduling replaces
/// whatever was pending.
#[derive(Debug)]
pub struct ReconcileSchedule {
    next_frame: bool,
    settle_at: Option<Instant>,
    settle_delay: Duration,
}

impl ReconcileSchedule {
    pub fn new(settle_delay: Duration) -> Self {
        ReconcileSchedule {
            next_frame: false,
            settle_at: None,
            settle_delay,
        }
    }

    pub fn next_frame(&mut self) {
        self.next_frame = true;
    }

    /// next frame and again once the settle delay has passed
    pub fn settle_from(&mut self, now: Instant) {
        self.next_frame = true;
        self.settle_at = Some(now + self.settle_delay);
    }

    /// called once per frame; true when a reconcile is owed
    pub fn take_due(&mut self, now: Instant) -> bool {
        let mut due = std::mem::take(&mut self.next_frame);
        if let Some(at) = self.settle_at {
            if at <= now {
                self.settle_at = None;
                due = true;
            }
        }
        due
    }

    pub fn is_idle(&self) -> bool {
        !self.next_frame && self.settle_at.is_none()
    }
}

/// what the terminal front end needs to paint the surface
#[derive(Debug, Default)]
pub struct SurfaceState {
    pub buffer: Size,
    pub fills_container: bool,
    /// bumps whenever the content is wiped (clear or buffer resize)
    pub generation: u64,
    // last generation painted
    shown: u64,
}

/// terminal rendering surface. the state is shared with the renderer
#[derive(Clone, Default)]
pub struct TermSurface {
    state: Rc<RefCell<SurfaceState>>,
}

impl TermSurface {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn state(&self) -> Rc<RefCell<SurfaceState>> {
        Rc::clone(&self.state)
    }

    /// where the screen goes inside `area`: all of it once stretched,
    /// otherwise the buffer's own size, centred
    pub fn presented_area(&self, area: Rect) -> Rect {
        let state = self.state.borrow();
        if state.fills_container || state.buffer.is_empty() {
            return area;
        }
        let width = state.buffer.width.min(area.width);
        let height = state.buffer.height.min(area.height);
        Rect::new(
            area.x + (area.width - width) / 2,
            area.y + (area.height - height) / 2,
            width,
            height,
        )
    }

    /// true once after every wipe
    fn take_stale(&self) -> bool {
        let mut state = self.state.borrow_mut();
        let stale = state.shown != state.generation;
        state.shown = state.generation;
        stale
    }

    /// paint the surface into `area`, with a status line for whatever is running
    pub fn draw<B: Backend>(&self, f: &mut Frame<B>, area: Rect, running: Option<&str>) {
        let screen = self.presented_area(area);
        let block = Block::default()
            .title("MS-DOS")
            .borders(Borders::ALL)
            .style(Style::default().bg(Color::Black));
        f.render_widget(Clear, area);
        if self.take_stale() {
            // wiped since the last frame; nothing old survives it
            f.render_widget(block, screen);
            return;
        }

        let buffer = self.state.borrow().buffer;
        let lines = match running {
            None => vec![
                Spans::from(""),
                Spans::from(Span::styled(
                    "Load a game ZIP to boot MS-DOS",
                    Style::default().fg(Color::DarkGray),
                )),
            ],
            Some(command) => vec![
                Spans::from(""),
                Spans::from(Span::styled(
                    format!("C:\\> {}", command),
                    Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
                )),
                Spans::from(Span::styled(
                    format!("{}x{}", buffer.width, buffer.height),
                    Style::default().fg(Color::DarkGray),
                )),
            ],
        };
        let screen_text = Paragraph::new(lines)
            .block(block)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        f.render_widget(screen_text, screen);
    }
}

impl RenderSurface for TermSurface {
    fn buffer_size(&self) -> Size {
        self.state.borrow().buffer
    }

    fn set_buffer_size(&mut self, size: Size) {
        let mut state = self.state.borrow_mut();
        state.buffer = size;
        state.generation += 1;
    }

    fn fill_container(&mut self) {
        self.state.borrow_mut().fills_container = true;
    }

    fn clear(&mut self) {
        self.state.borrow_mut().generation += 1;
    }
}

/// what happened to a `DummySurface`
#[derive(Debug, Default)]
pub struct SurfaceRecord {
    pub buffer: Size,
    pub buffer_writes: usize,
    pub fills: usize,
    pub clears: usize,
}

/// useful for testing non-display routines; clones share one record
#[derive(Clone, Default)]
pub struct DummySurface {
    record: Rc<RefCell<SurfaceRecord>>,
}

impl DummySurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self) -> std::cell::Ref<'_, SurfaceRecord> {
        self.record.borrow()
    }
}

impl RenderSurface for DummySurface {
    fn buffer_size(&self) -> Size {
        self.record.borrow().buffer
    }

    fn set_buffer_size(&mut self, size: Size) {
        let mut r = self.record.borrow_mut();
        r.buffer = size;
        r.buffer_writes += 1;
    }

    fn fill_container(&mut self) {
        self.record.borrow_mut().fills += 1;
    }

    fn clear(&mut self) {
        self.record.borrow_mut().clears += 1;
    }
}
