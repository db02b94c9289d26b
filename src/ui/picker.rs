use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

use crate::app::{PickerRow, PickerState};
use crate::ui::{results::score_color, HORIZONTAL_MARGIN, VERTICAL_MARGIN};

fn present_row(row: &PickerRow, selected: bool) -> Line<'static> {
    let marker = if selected { "> " } else { "  " };
    let title_style = if selected {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };

    let mut spans = vec![
        Span::styled(format!("{marker}{}. {}", row.test_id, row.title), title_style),
        Span::styled(
            format!("  {} questions · {} min", row.questions, row.duration_minutes),
            Style::default().add_modifier(Modifier::DIM),
        ),
    ];
    if let Some(score) = row.latest_score {
        spans.push(Span::raw("  last "));
        spans.push(Span::styled(
            format!("{score}%"),
            Style::default().fg(score_color(score)),
        ));
    }
    Line::from(spans)
}

pub fn render_picker(picker: &PickerState, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Min(0),    // tests
            Constraint::Length(1), // legend
        ])
        .split(area);

    let rows: Vec<Line> = picker
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| present_row(row, i == picker.selected))
        .collect();

    Paragraph::new(rows)
        .block(Block::default().borders(Borders::ALL).title("Choose a test"))
        .render(chunks[0], buf);

    Paragraph::new(Span::styled(
        "(↑/↓) select / (enter) start / (h)istory / (esc)ape",
        Style::default().add_modifier(Modifier::ITALIC),
    ))
    .alignment(Alignment::Center)
    .render(chunks[1], buf);
}
