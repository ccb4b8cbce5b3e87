//! Ratatui-based terminal dashboard.
//!
//! The TUI provides a settings panel for choosing a county and year range,
//! then renders one chart group at a time with its own absolute/percentage
//! toggle.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use plotters::style::RGBColor;
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph},
};

use crate::app::pipeline::Engine;
use crate::domain::{DEFAULT_YEAR_MAX, DEFAULT_YEAR_MIN, Mode, SelectionWindow, SeriesCollection, SeriesGroup, SeriesRole};
use crate::error::AppError;

mod plotters_chart;

use plotters_chart::{ChartLine, SeriesChart};

/// Entity series colors, cycled.
const PALETTE: [(u8, u8, u8); 6] = [
    (0, 255, 255),
    (0, 255, 0),
    (255, 85, 85),
    (255, 255, 0),
    (255, 0, 255),
    (85, 170, 255),
];
const REFERENCE_COLOR: (u8, u8, u8) = (160, 160, 160);

/// Windows kept in the collection cache; year stepping creates one per key press.
const CACHE_CAPACITY: usize = 32;

const FIELD_COUNTY: usize = 0;
const FIELD_FROM: usize = 1;
const FIELD_TO: usize = 2;

/// Start the TUI.
pub fn run(engine: Engine, county: Option<String>) -> Result<(), AppError> {
    let mut app = App::new(engine, county)?;

    let _guard = TerminalGuard::new()?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal =
        Terminal::new(backend).map_err(|e| AppError::runtime(format!("Failed to initialize terminal: {e}")))?;

    app.event_loop(&mut terminal)
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::runtime(format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::runtime(format!("Failed to enter alternate screen: {e}")));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

/// Collections are pure functions of the window, so they can be reused until
/// evicted. Least recently used windows go first.
struct CollectionCache {
    capacity: usize,
    entries: HashMap<SelectionWindow, SeriesCollection>,
    order: VecDeque<SelectionWindow>,
}

impl CollectionCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn get(&self, window: &SelectionWindow) -> Option<&SeriesCollection> {
        self.entries.get(window)
    }

    /// Mark a cached window as most recently used; `false` if absent.
    fn touch(&mut self, window: &SelectionWindow) -> bool {
        if !self.entries.contains_key(window) {
            return false;
        }
        self.order.retain(|w| w != window);
        self.order.push_back(window.clone());
        true
    }

    fn insert(&mut self, window: SelectionWindow, collection: SeriesCollection) {
        self.order.retain(|w| *w != window);
        while self.order.len() >= self.capacity {
            if let Some(old) = self.order.pop_front() {
                self.entries.remove(&old);
            }
        }
        self.order.push_back(window.clone());
        self.entries.insert(window, collection);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

struct App {
    engine: Engine,
    counties: Vec<String>,
    county_idx: usize,
    year_min: i32,
    year_max: i32,
    selected_field: usize,
    group_idx: usize,
    /// Active view per group id; absent means the group's default.
    modes: HashMap<String, Mode>,
    cache: CollectionCache,
    status: String,
}

impl App {
    fn new(engine: Engine, county: Option<String>) -> Result<Self, AppError> {
        let counties: Vec<String> = engine.counties().into_iter().map(str::to_string).collect();
        if counties.is_empty() {
            return Err(AppError::no_data("No selectable counties in the dataset"));
        }
        let county_idx = match county {
            Some(name) => counties
                .iter()
                .position(|c| *c == name)
                .ok_or_else(|| AppError::input(format!("Unknown county '{name}'")))?,
            None => 0,
        };

        let mut app = Self {
            engine,
            counties,
            county_idx,
            year_min: DEFAULT_YEAR_MIN,
            year_max: DEFAULT_YEAR_MAX,
            selected_field: FIELD_COUNTY,
            group_idx: 0,
            modes: HashMap::new(),
            cache: CollectionCache::new(CACHE_CAPACITY),
            status: String::new(),
        };
        app.refresh();
        Ok(app)
    }

    fn window(&self) -> SelectionWindow {
        SelectionWindow::new(self.counties[self.county_idx].as_str(), self.year_min, self.year_max)
    }

    /// Make sure the current window's collection is cached.
    fn refresh(&mut self) {
        let window = self.window();
        if self.cache.touch(&window) {
            self.status = format!("{} (cached)", window.entity_id);
            return;
        }
        let collection = self.engine.query(&window);
        self.status = if collection.is_empty() {
            format!("{}: no records in [{}, {}]", window.entity_id, window.year_min, window.year_max)
        } else {
            format!("{}: {} years", window.entity_id, collection.years.len())
        };
        self.cache.insert(window, collection);
    }

    fn collection(&self) -> Option<&SeriesCollection> {
        self.cache.get(&self.window())
    }

    fn current_group(&self) -> Option<&SeriesGroup> {
        self.collection().and_then(|c| c.groups.get(self.group_idx))
    }

    fn group_mode(&self, group: &SeriesGroup) -> Mode {
        let mode = self.modes.get(&group.id).copied().unwrap_or_else(|| group.default_mode());
        group.effective_mode(mode)
    }

    fn group_count(&self) -> usize {
        self.engine.catalog.charts.len()
    }

    fn event_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::runtime(format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100))
                .map_err(|e| AppError::runtime(format!("Event poll error: {e}")))?
            {
                continue;
            }

            match event::read().map_err(|e| AppError::runtime(format!("Event read error: {e}")))? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key.code) {
                        break;
                    }
                    needs_redraw = true;
                }
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Returns `true` when the user asked to quit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Up => self.selected_field = self.selected_field.saturating_sub(1),
            KeyCode::Down => self.selected_field = (self.selected_field + 1).min(FIELD_TO),
            KeyCode::Left => self.adjust_field(-1),
            KeyCode::Right => self.adjust_field(1),
            KeyCode::PageUp => self.adjust_field(-5),
            KeyCode::PageDown => self.adjust_field(5),
            KeyCode::Tab | KeyCode::Char('n') => self.step_group(1),
            KeyCode::BackTab | KeyCode::Char('p') => self.step_group(-1),
            KeyCode::Char('m') => self.toggle_mode(),
            KeyCode::Char('r') => {
                self.year_min = DEFAULT_YEAR_MIN;
                self.year_max = DEFAULT_YEAR_MAX;
                self.refresh();
            }
            _ => {}
        }
        false
    }

    fn adjust_field(&mut self, delta: i32) {
        match self.selected_field {
            FIELD_COUNTY => {
                let n = self.counties.len() as i64;
                let step = delta.signum() as i64;
                self.county_idx = (self.county_idx as i64 + step).rem_euclid(n) as usize;
            }
            // The range never inverts: each bound stops at the other.
            FIELD_FROM => {
                self.year_min = (self.year_min + delta).clamp(DEFAULT_YEAR_MIN, self.year_max);
            }
            FIELD_TO => {
                self.year_max = (self.year_max + delta).clamp(self.year_min, DEFAULT_YEAR_MAX);
            }
            _ => {}
        }
        self.refresh();
    }

    fn step_group(&mut self, delta: isize) {
        let n = self.group_count();
        if n == 0 {
            return;
        }
        self.group_idx = (self.group_idx as isize + delta).rem_euclid(n as isize) as usize;
    }

    fn toggle_mode(&mut self) {
        let Some((id, title, next)) = self
            .current_group()
            .map(|g| (g.id.clone(), g.title.clone(), g.has_percentage().then(|| self.group_mode(g).toggled())))
        else {
            return;
        };
        match next {
            Some(mode) => {
                self.status = format!("{title}: {}", mode.display_name());
                self.modes.insert(id, mode);
            }
            None => self.status = format!("{title}: no percentage view"),
        }
    }

    fn draw(&self, frame: &mut ratatui::Frame<'_>) {
        let size = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(4), Constraint::Min(0), Constraint::Length(3)])
            .split(size);

        self.draw_header(frame, chunks[0]);
        self.draw_body(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let mut lines: Vec<Line> = Vec::new();
        lines.push(Line::from(vec![
            Span::styled("edu", Style::default().fg(Color::Cyan)),
            Span::raw(" | NC public school data by county"),
        ]));

        let group = self.current_group();
        let group_text = group
            .map(|g| {
                format!(
                    "{} / {} [{}] ({}/{})",
                    g.section.display_name(),
                    g.title,
                    self.group_mode(g).display_name(),
                    self.group_idx + 1,
                    self.group_count()
                )
            })
            .unwrap_or_else(|| "-".to_string());
        lines.push(Line::from(Span::styled(
            format!(
                "county: {} | years: {}-{} | {group_text}",
                self.counties[self.county_idx], self.year_min, self.year_max
            ),
            Style::default().fg(Color::Gray),
        )));

        let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_body(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(0), Constraint::Length(34)])
            .split(area);

        self.draw_chart(frame, chunks[0]);

        let side = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(5), Constraint::Min(0)])
            .split(chunks[1]);
        self.draw_settings(frame, side[0]);
        self.draw_legend(frame, side[1]);
    }

    fn draw_chart(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let title = self.current_group().map(|g| g.title.as_str()).unwrap_or("Chart");
        let block = Block::default().title(title).borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(Clear, inner);

        let Some(group) = self.current_group() else {
            let msg = Paragraph::new("No chart for this selection.").style(Style::default().fg(Color::Yellow));
            frame.render_widget(msg, inner);
            return;
        };
        let mode = self.group_mode(group);
        let Some((lines, x_bounds, y_bounds)) = chart_lines(group, mode) else {
            let msg = Paragraph::new("No data for this county and year range.")
                .style(Style::default().fg(Color::Yellow));
            frame.render_widget(msg, inner);
            return;
        };

        let y_label = if mode == Mode::Percentage { "%" } else { group.y_label.as_str() };
        let (chart_rect, insets) = chart_layout(inner);
        let widget = SeriesChart {
            lines: &lines,
            x_bounds,
            y_bounds,
            x_label: "year",
            y_label,
            fmt_x: fmt_axis_year,
            fmt_y: fmt_axis_value,
        };
        frame.render_widget(widget, chart_rect);
        if let Some(insets) = insets {
            draw_axis_ticks(frame, inner, chart_rect, insets, x_bounds, y_bounds, y_label);
        }
    }

    fn draw_settings(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let items = vec![
            ListItem::new(format!("County: {}", self.counties[self.county_idx])),
            ListItem::new(format!("From: {}", self.year_min)),
            ListItem::new(format!("To: {}", self.year_max)),
        ];
        let list = List::new(items)
            .block(Block::default().title("Selection").borders(Borders::ALL))
            .highlight_style(Style::default().fg(Color::Black).bg(Color::White))
            .highlight_symbol("» ");

        let mut state = ratatui::widgets::ListState::default();
        state.select(Some(self.selected_field));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_legend(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let mut lines: Vec<Line> = Vec::new();
        if let Some(group) = self.current_group() {
            let mode = self.group_mode(group);
            let mut entity_idx = 0usize;
            for series in group.series_for(mode) {
                let (r, g, b) = match series.role {
                    SeriesRole::Reference => REFERENCE_COLOR,
                    SeriesRole::Entity => {
                        let c = PALETTE[entity_idx % PALETTE.len()];
                        entity_idx += 1;
                        c
                    }
                };
                let last = series
                    .present_points()
                    .last()
                    .map(|(year, v)| format!(" {v:.2} ({year})"))
                    .unwrap_or_else(|| " -".to_string());
                lines.push(Line::from(vec![
                    Span::styled("━━ ", Style::default().fg(Color::Rgb(r, g, b))),
                    Span::raw(series.label.clone()),
                    Span::styled(last, Style::default().fg(Color::Gray)),
                ]));
            }
        }
        let p = Paragraph::new(Text::from(lines)).block(Block::default().title("Legend").borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let help = "↑/↓ select  ←/→ adjust  Tab/n next chart  p prev  m abs/%  r reset years  q quit";
        let line = Line::from(vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(&self.status, Style::default().fg(Color::Yellow)),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

/// Chart lines plus padded bounds; `None` when no series has a present point.
fn chart_lines(group: &SeriesGroup, mode: Mode) -> Option<(Vec<ChartLine>, [f64; 2], [f64; 2])> {
    let mut lines = Vec::new();
    let mut entity_idx = 0usize;
    let (mut x_min, mut x_max) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut y_min, mut y_max) = (f64::INFINITY, f64::NEG_INFINITY);

    for series in group.series_for(mode) {
        let (r, g, b) = match series.role {
            SeriesRole::Reference => REFERENCE_COLOR,
            SeriesRole::Entity => {
                let c = PALETTE[entity_idx % PALETTE.len()];
                entity_idx += 1;
                c
            }
        };

        let segments = series.present_runs();
        for &(x, y) in segments.iter().flatten() {
            x_min = x_min.min(x);
            x_max = x_max.max(x);
            y_min = y_min.min(y);
            y_max = y_max.max(y);
        }
        lines.push(ChartLine {
            segments,
            color: RGBColor(r, g, b),
        });
    }

    if !x_min.is_finite() || !y_min.is_finite() {
        return None;
    }
    if x_max <= x_min {
        x_min -= 1.0;
        x_max += 1.0;
    }
    if y_max <= y_min {
        let pad = y_min.abs().max(1.0) * 0.05;
        y_min -= pad;
        y_max += pad;
    }
    let pad = (y_max - y_min) * 0.05;
    Some((lines, [x_min, x_max], [y_min - pad, y_max + pad]))
}

fn fmt_axis_year(v: f64) -> String {
    format!("{v:.0}")
}

fn fmt_axis_value(v: f64) -> String {
    if v.abs() >= 1000.0 {
        format!("{:.0}k", v / 1000.0)
    } else {
        format!("{v:.1}")
    }
}

#[derive(Debug, Clone, Copy)]
struct AxisInsets {
    left: u16,
    right: u16,
    top: u16,
    bottom: u16,
}

fn chart_layout(inner: Rect) -> (Rect, Option<AxisInsets>) {
    let insets = AxisInsets {
        left: 8,
        right: 2,
        top: 1,
        bottom: 2,
    };

    if inner.width <= insets.left + insets.right + 10 || inner.height <= insets.top + insets.bottom + 5 {
        return (inner, None);
    }

    let rect = Rect {
        x: inner.x + insets.left,
        y: inner.y + insets.top,
        width: inner.width - insets.left - insets.right,
        height: inner.height - insets.top - insets.bottom,
    };

    (rect, Some(insets))
}

fn draw_axis_ticks(
    frame: &mut ratatui::Frame<'_>,
    inner: Rect,
    chart: Rect,
    insets: AxisInsets,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
    y_label: &str,
) {
    let ticks = 5usize;
    let style = Style::default().fg(Color::Gray);

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let x_val = x_bounds[0] + u * (x_bounds[1] - x_bounds[0]);
        let x = chart.x + ((chart.width - 1) as f64 * u).round() as u16;
        let label = fmt_axis_year(x_val);
        let label_len = label.len() as u16;
        let start = x.saturating_sub(label_len / 2);
        let y = chart.y + chart.height;
        if y >= inner.y + inner.height - 1 {
            continue;
        }
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width: label_len,
                height: 1,
            },
        );
    }

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let y_val = y_bounds[0] + u * (y_bounds[1] - y_bounds[0]);
        let y = chart.y + (chart.height - 1) - ((chart.height - 1) as f64 * u).round() as u16;
        let label = fmt_axis_value(y_val);
        let label_len = label.len() as u16;
        let x = inner.x + insets.left.saturating_sub(1);
        let start = x.saturating_sub(label_len);
        if start < inner.x {
            continue;
        }
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width: label_len,
                height: 1,
            },
        );
    }

    let x_rect = Rect {
        x: chart.x,
        y: chart.y + chart.height + 1,
        width: chart.width,
        height: 1,
    };
    if x_rect.y < inner.y + inner.height {
        frame.render_widget(
            Paragraph::new("year").alignment(Alignment::Center).style(style),
            x_rect,
        );
    }

    let y_rect = Rect {
        x: inner.x,
        y: inner.y,
        width: insets.left.saturating_sub(1).max(1).min(inner.width),
        height: 1,
    };
    frame.render_widget(
        Paragraph::new(y_label.to_string()).style(style.add_modifier(Modifier::BOLD)),
        y_rect,
    );
}
