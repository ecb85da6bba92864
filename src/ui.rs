use crate::app::App;
use choromap::braille::BrailleCanvas;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
    Frame,
};

/// Split into map area and status bar
fn split(area: Rect) -> [Rect; 2] {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),    // Map
            Constraint::Length(1), // Status bar
        ])
        .split(area);
    [chunks[0], chunks[1]]
}

fn map_block(title: &str) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            format!(" {title} "),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ))
}

/// Canvas size in cells for a terminal of `area`
pub fn canvas_size(area: Rect) -> (usize, usize) {
    let [map, _] = split(area);
    let inner = map_block("").inner(map);
    (inner.width as usize, inner.height as usize)
}

/// Render the UI
pub fn render(frame: &mut Frame, app: &App) {
    let [map, status] = split(frame.area());

    let block = map_block(&app.title);
    let inner = block.inner(map);
    frame.render_widget(block, map);
    frame.render_widget(CanvasWidget { canvas: &app.canvas }, inner);

    render_status_bar(frame, app, status);
}

/// Draws canvas cells with their own colors
struct CanvasWidget<'a> {
    canvas: &'a BrailleCanvas,
}

fn to_term(color: choromap::map::Color) -> Color {
    Color::Rgb(color.r, color.g, color.b)
}

impl Widget for CanvasWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let rows = (self.canvas.height()).min(area.height as usize);
        let cols = (self.canvas.width()).min(area.width as usize);
        for cy in 0..rows {
            for cx in 0..cols {
                let Some(cell) = self.canvas.cell(cx, cy) else {
                    continue;
                };
                let target = &mut buf[(area.x + cx as u16, area.y + cy as u16)];
                target.set_char(cell.symbol());
                if let Some(bg) = cell.bg {
                    target.set_bg(to_term(bg));
                }
                if let Some(fg) = cell.foreground() {
                    target.set_fg(to_term(fg));
                }
            }
        }
    }
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let range = match app.range {
        Some((lo, hi)) => format!("{lo} .. {hi}"),
        None => "no values".to_string(),
    };
    let mut spans = vec![
        Span::styled(" Range: ", Style::default().fg(Color::DarkGray)),
        Span::styled(range, Style::default().fg(Color::Yellow)),
    ];
    if app.warnings > 0 {
        spans.push(Span::styled(" | ", Style::default().fg(Color::DarkGray)));
        spans.push(Span::styled(
            format!("{} warnings", app.warnings),
            Style::default().fg(Color::Magenta),
        ));
    }
    spans.push(Span::styled(" | q:quit", Style::default().fg(Color::DarkGray)));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
