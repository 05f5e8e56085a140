//! Terminal rendition of a preview: every view is drawn as a box at its
//! scaled position, pointer and wheel input are translated to pixels.

use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::Result;
use log::debug;
use ratatui::{
    Frame as TermFrame, Terminal,
    layout::Rect as CellRect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use crate::context::{ContextId, Lifecycle, RenderContext};
use crate::event_source::{Event, EventSource, KeyCode, KeyEventKind, MouseEventKind};
use crate::frame::Platform;
use crate::layout::packing::Size;
use crate::layout::scroller::WheelDelta;
use crate::layout::{InputEvent, PlacedContext};
use crate::preview::Preview;
use crate::readiness::DetectorTimings;
use crate::sim::SimPlatform;
use crate::state::{AppState, DisplayMode};
use crate::timer::Millis;

/// Pixels covered by one terminal cell
pub const CELL_WIDTH: f64 = 8.0;
pub const CELL_HEIGHT: f64 = 16.0;

/// Pixels scrolled per mouse wheel notch
const WHEEL_STEP: f64 = 120.0;

/// Key holding the device wall's pan/zoom layer
const LAYER_TOGGLE: char = 'z';

pub struct PreviewApp {
    platform: Rc<SimPlatform>,
    preview: Preview,
    state: AppState,
    layer_held: bool,
    should_quit: bool,
}

impl PreviewApp {
    pub fn new(platform: Rc<SimPlatform>, state: AppState, timings: DetectorTimings) -> Self {
        let shared: Rc<dyn Platform> = platform.clone();
        Self {
            preview: Preview::new(shared, timings),
            platform,
            state,
            layer_held: false,
            should_quit: false,
        }
    }

    pub fn preview(&self) -> &Preview {
        &self.preview
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Mount into a terminal area of the given size
    pub fn start(&mut self, area: CellRect, now: Millis) {
        self.platform.clock().set(now);
        self.preview.update(&self.state, now);
        self.preview.mount(container_size(area), now);
    }

    pub fn tick(&mut self, now: Millis) {
        self.platform.clock().set(now);
        self.preview.poll(now);
    }

    pub fn handle_event(&mut self, event: &Event, now: Millis) {
        self.platform.clock().set(now);
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
                KeyCode::Char('m') => self.toggle_mode(now),
                KeyCode::Char(c) if c == LAYER_TOGGLE => self.toggle_layer(now),
                KeyCode::Char('j') => self.scroll_host(1.0),
                KeyCode::Char('k') => self.scroll_host(-1.0),
                KeyCode::Char('r') => self.reload_host(),
                _ => {}
            },
            Event::Mouse(mouse) => {
                let x = f64::from(mouse.column) * CELL_WIDTH;
                let y = f64::from(mouse.row) * CELL_HEIGHT;
                let input = match mouse.kind {
                    MouseEventKind::Moved | MouseEventKind::Drag(_) => {
                        Some(InputEvent::PointerMove { x, y })
                    }
                    MouseEventKind::Down(_) => Some(InputEvent::PointerDown { x, y }),
                    MouseEventKind::Up(_) => Some(InputEvent::PointerUp { x, y }),
                    MouseEventKind::ScrollDown => Some(wheel(x, y, 0.0, WHEEL_STEP)),
                    MouseEventKind::ScrollUp => Some(wheel(x, y, 0.0, -WHEEL_STEP)),
                    MouseEventKind::ScrollRight => Some(wheel(x, y, WHEEL_STEP, 0.0)),
                    MouseEventKind::ScrollLeft => Some(wheel(x, y, -WHEEL_STEP, 0.0)),
                };
                if let Some(input) = input {
                    self.preview.handle_input(input, now);
                }
            }
            Event::Resize(columns, rows) => {
                let area = CellRect::new(0, 0, *columns, *rows);
                self.preview.resize(container_size(area), now);
            }
            _ => {}
        }
    }

    fn toggle_mode(&mut self, now: Millis) {
        let next = match self.state.mode() {
            Some(DisplayMode::Breakpoints) => DisplayMode::DeviceWall,
            _ => DisplayMode::Breakpoints,
        };
        debug!("switching to {}", next.as_str());
        self.state.set_mode(next);
        self.preview.update(&self.state, now);
    }

    fn toggle_layer(&mut self, now: Millis) {
        let key = self.state.options.activate_key;
        self.layer_held = !self.layer_held;
        let event = if self.layer_held {
            InputEvent::KeyDown(key)
        } else {
            InputEvent::KeyUp(key)
        };
        self.preview.handle_input(event, now);
    }

    fn host(&self) -> Option<ContextId> {
        self.preview.engine()?.sync()?.host()
    }

    /// Scroll the synchronised document by a tenth of its range
    fn scroll_host(&self, direction: f64) {
        let Some(frame) = self.host().and_then(|id| self.platform.frame(id)) else {
            return;
        };
        let (left, top) = frame.scroll();
        frame.scroll_to(left, (top + direction * 200.0).max(0.0));
    }

    fn reload_host(&self) {
        if let Some(frame) = self.host().and_then(|id| self.platform.frame(id)) {
            frame.reload();
        }
    }

    pub fn draw(&self, f: &mut TermFrame) {
        let area = f.area();
        let view_area = CellRect {
            height: area.height.saturating_sub(1),
            ..area
        };
        let status_area = CellRect {
            y: area.y + view_area.height,
            height: area.height.min(1),
            ..area
        };

        if let Some(engine) = self.preview.engine() {
            let host = self.host();
            for placed in engine.placements() {
                let Some(ctx) = engine.contexts().iter().find(|c| c.id() == placed.id) else {
                    continue;
                };
                let Some(cells) = to_cells(&placed, view_area) else {
                    continue;
                };
                self.draw_context(f, ctx, &placed, cells, host == Some(placed.id));
            }
        }

        f.render_widget(Paragraph::new(self.status_line()), status_area);
    }

    fn draw_context(
        &self,
        f: &mut TermFrame,
        ctx: &RenderContext,
        placed: &PlacedContext,
        cells: CellRect,
        is_host: bool,
    ) {
        let border = match ctx.lifecycle() {
            _ if is_host => Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
            Lifecycle::Ready => Style::default().fg(Color::Green),
            Lifecycle::Available | Lifecycle::Mounting => Style::default().fg(Color::Cyan),
            _ => Style::default().fg(Color::DarkGray),
        };
        let border = if placed.opacity < 0.5 {
            border.add_modifier(Modifier::DIM)
        } else {
            border
        };

        let mut body = vec![Line::from(Span::raw(ctx.lifecycle().as_str()))];
        if (ctx.scale() - 1.0).abs() > f64::EPSILON {
            body.push(Line::from(format!("{:.0}%", ctx.scale() * 100.0)));
        }
        if let Some(frame) = self.platform.frame(ctx.id()) {
            let (_, top) = frame.scroll();
            body.push(Line::from(format!("scroll {top:.0}")));
        }
        if let Some(err) = ctx.last_error() {
            body.push(Line::from(Span::styled(
                err.to_string(),
                Style::default().fg(Color::Red),
            )));
        }

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border)
            .title(format!(" {} ", ctx.label()));
        f.render_widget(Paragraph::new(body).block(block), cells);
    }

    fn status_line(&self) -> Line<'static> {
        let mode = self
            .preview
            .snapshot()
            .and_then(|s| s.mode)
            .map_or("none", |m| m.as_str());
        let host = self
            .host()
            .map_or_else(|| "-".to_string(), |id| id.to_string());
        let mut spans = vec![
            Span::styled(
                " viewreel ",
                Style::default().fg(Color::Black).bg(Color::Cyan),
            ),
            Span::raw(format!(
                " {mode} | {} | host {host} | m: mode  z: pan/zoom  j/k: scroll  q: quit",
                self.preview.phase().as_str()
            )),
        ];
        let now = self.platform.clock().now();
        if let Some(opacity) = self.preview.engine().and_then(|e| e.overlay_opacity(now)) {
            let style = Style::default().fg(Color::Black).bg(Color::Magenta);
            let style = if opacity < 0.5 {
                style.add_modifier(Modifier::DIM)
            } else {
                style
            };
            spans.push(Span::raw(" "));
            spans.push(Span::styled(" ZOOM ", style));
        }
        Line::from(spans)
    }
}

fn wheel(x: f64, y: f64, dx: f64, dy: f64) -> InputEvent {
    InputEvent::Wheel {
        x,
        y,
        delta: WheelDelta::pixels(dx, dy),
    }
}

/// Pixel size of the view area, leaving one row for the status line
pub fn container_size(area: CellRect) -> Size {
    Size::new(
        f64::from(area.width) * CELL_WIDTH,
        f64::from(area.height.saturating_sub(1)) * CELL_HEIGHT,
    )
}

/// Clip a placement to the view area, in cells
fn to_cells(placed: &PlacedContext, area: CellRect) -> Option<CellRect> {
    let left = (placed.rect.x / CELL_WIDTH).floor().max(0.0);
    let top = (placed.rect.y / CELL_HEIGHT).floor().max(0.0);
    let right = ((placed.rect.right()) / CELL_WIDTH)
        .ceil()
        .min(f64::from(area.width));
    let bottom = ((placed.rect.y + placed.rect.height) / CELL_HEIGHT)
        .ceil()
        .min(f64::from(area.height));
    if right - left < 2.0 || bottom - top < 2.0 {
        return None;
    }
    Some(CellRect::new(
        area.x + left as u16,
        area.y + top as u16,
        (right - left) as u16,
        (bottom - top) as u16,
    ))
}

pub fn run_preview<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut PreviewApp,
    event_source: &mut dyn EventSource,
) -> Result<()>
where
    B::Error: Send + Sync + 'static,
{
    let started = Instant::now();
    let now = || started.elapsed().as_millis() as Millis;
    let tick_rate = Duration::from_millis(16);

    let size = terminal.size()?;
    app.start(CellRect::new(0, 0, size.width, size.height), now());

    loop {
        let mut processed = 0;
        while processed < 50 && event_source.poll(Duration::ZERO)? {
            let event = event_source.read()?;
            app.handle_event(&event, now());
            processed += 1;
        }
        if app.should_quit() {
            break;
        }

        app.tick(now());
        terminal.draw(|f| app.draw(f))?;

        event_source.poll(tick_rate)?;
    }

    app.preview.destroy(now());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimClock;
    use crate::state::ViewSpec;
    use ratatui::backend::TestBackend;

    fn app() -> PreviewApp {
        let platform = Rc::new(SimPlatform::new(SimClock::default()));
        let state = AppState {
            page_url: "http://localhost:3000/".into(),
            breakpoints: vec![ViewSpec::with_width(320.0), ViewSpec::with_width(480.0)],
            ..AppState::default()
        };
        PreviewApp::new(platform, state, DetectorTimings::default())
    }

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        buffer
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect::<String>()
    }

    #[test]
    fn test_renders_reel_views_and_status() {
        let mut app = app();
        let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
        app.start(CellRect::new(0, 0, 120, 30), 0);
        for now in (0..=3000).step_by(50) {
            app.tick(now);
        }
        assert_eq!(app.preview().phase().as_str(), "idle");

        terminal.draw(|f| app.draw(f)).unwrap();
        let text = buffer_text(&terminal);
        assert!(text.contains("viewreel"));
        assert!(text.contains("breakpoints"));
        assert!(text.contains("idle"));
        assert!(text.contains("320"));
    }

    #[test]
    fn test_keys_drive_mode_and_quit() {
        use crate::event_source::SimulatedEventSource;

        let mut app = app();
        app.start(CellRect::new(0, 0, 120, 30), 0);
        app.handle_event(&SimulatedEventSource::char_key('m'), 10);
        assert_eq!(app.state().mode(), Some(DisplayMode::DeviceWall));

        app.handle_event(&SimulatedEventSource::char_key('q'), 20);
        assert!(app.should_quit());
    }

    #[test]
    fn test_zoom_overlay_shows_in_status() {
        use crate::event_source::SimulatedEventSource;
        use crate::state::{DeviceWallPicker, DisplaySelector, SelectorKind};

        let mut state = AppState {
            page_url: "http://localhost:3000/".into(),
            devices: vec![ViewSpec::device("iphone", "iPhone", 375.0, 667.0)],
            device_wall_picker: DeviceWallPicker {
                display: Some(DisplaySelector {
                    kind: SelectorKind::Device,
                    id: "iphone".into(),
                }),
            },
            ..AppState::default()
        };
        state.set_mode(DisplayMode::DeviceWall);
        let platform = Rc::new(SimPlatform::new(SimClock::default()));
        let mut app = PreviewApp::new(platform, state, DetectorTimings::default());
        let mut terminal = Terminal::new(TestBackend::new(140, 30)).unwrap();
        app.start(CellRect::new(0, 0, 140, 30), 0);
        for now in (0..=3000).step_by(50) {
            app.tick(now);
        }
        assert_eq!(app.preview().phase().as_str(), "idle");

        terminal.draw(|f| app.draw(f)).unwrap();
        assert!(!buffer_text(&terminal).contains("ZOOM"));

        app.handle_event(&SimulatedEventSource::char_key(LAYER_TOGGLE), 3000);
        app.tick(3400);
        terminal.draw(|f| app.draw(f)).unwrap();
        assert!(buffer_text(&terminal).contains("ZOOM"));

        app.handle_event(&SimulatedEventSource::char_key(LAYER_TOGGLE), 3500);
        terminal.draw(|f| app.draw(f)).unwrap();
        assert!(!buffer_text(&terminal).contains("ZOOM"));
    }

    #[test]
    fn test_to_cells_clips_offscreen_views() {
        let area = CellRect::new(0, 0, 40, 10);
        let placed = PlacedContext {
            id: ContextId::new(1),
            rect: crate::layout::Rect {
                x: -800.0,
                y: 0.0,
                width: 400.0,
                height: 160.0,
            },
            scale: 1.0,
            opacity: 1.0,
        };
        assert_eq!(to_cells(&placed, area), None);

        let visible = PlacedContext {
            rect: crate::layout::Rect {
                x: 80.0,
                ..placed.rect
            },
            ..placed
        };
        assert_eq!(to_cells(&visible, area), Some(CellRect::new(10, 0, 30, 10)));
    }
}
