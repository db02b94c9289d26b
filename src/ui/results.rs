use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Cell, Chart, Dataset, GraphType, Paragraph, Row, Table, Widget},
};

use crate::app::ResultsState;
use crate::attempt::AttemptId;
use crate::results::{HistoryEntry, ResultsReport, TopicAccuracy};
use crate::ui::{charting, HORIZONTAL_MARGIN, VERTICAL_MARGIN};

const CHART_HEIGHT: u16 = 8;

pub fn score_color(percent: u8) -> Color {
    match percent {
        80..=u8::MAX => Color::Green,
        50..=79 => Color::Yellow,
        _ => Color::Red,
    }
}

fn present_topic(topic: &TopicAccuracy) -> Line<'static> {
    Line::from(vec![
        Span::styled(
            format!("{}: ", topic.topic),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("{}%", topic.percent),
            Style::default().fg(score_color(topic.percent)),
        ),
        Span::raw(format!(" ({}/{})", topic.correct, topic.total)),
    ])
}

/// Cell texts for one history row: test, score, local time
pub fn present_history_row(entry: &HistoryEntry) -> [String; 3] {
    [
        format!("Test {}", entry.test_id),
        format!("{}%", entry.score_percent),
        entry.local_time.clone(),
    ]
}

fn history_row(entry: &HistoryEntry, current: AttemptId) -> Row<'static> {
    let [test, score, time] = present_history_row(entry);
    let row = Row::new(vec![
        Cell::from(test),
        Cell::from(score).style(Style::default().fg(score_color(entry.score_percent))),
        Cell::from(time),
    ]);
    if entry.id == current {
        row.style(Style::default().add_modifier(Modifier::BOLD))
    } else {
        row
    }
}

pub fn render_results(report: &ResultsReport, state: &ResultsState, area: Rect, buf: &mut Buffer) {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let attempt = &report.attempt;
    let summary = &report.summary;
    let chart_height = if summary.scores.len() >= 2 {
        CHART_HEIGHT
    } else {
        0
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(1), // score
            Constraint::Length(report.topics.len() as u16 + 2), // weakness analysis
            Constraint::Length(1), // summary
            Constraint::Length(chart_height), // chart
            Constraint::Min(0), // history
            Constraint::Length(1), // legend
        ])
        .split(area);

    Paragraph::new(Line::from(vec![
        Span::styled(
            format!("Result - {}%", attempt.score_percent),
            Style::default()
                .patch(bold_style)
                .fg(score_color(attempt.score_percent)),
        ),
        Span::raw(format!(
            "   {}/{} correct",
            attempt.correct_count, attempt.total_count
        )),
    ]))
    .alignment(Alignment::Center)
    .render(chunks[0], buf);

    let topics: Vec<Line> = report.topics.iter().map(present_topic).collect();
    Paragraph::new(topics)
        .block(Block::default().borders(Borders::ALL).title("Weakness Analysis"))
        .render(chunks[1], buf);

    Paragraph::new(Span::styled(
        format!(
            "Test {}: {} attempts   {:.1}% mean   {:.2} sd",
            summary.test_id, summary.attempts, summary.mean_score, summary.std_dev
        ),
        Style::default().add_modifier(Modifier::DIM),
    ))
    .alignment(Alignment::Center)
    .render(chunks[2], buf);

    if chart_height > 0 {
        let points = charting::score_points(&summary.scores);
        let x_max = charting::compute_x_bound(&summary.scores);
        let datasets = vec![Dataset::default()
            .marker(ratatui::symbols::Marker::Braille)
            .style(Style::default().fg(Color::Magenta))
            .graph_type(GraphType::Line)
            .data(&points)];

        Chart::new(datasets)
            .x_axis(
                Axis::default()
                    .title("attempt")
                    .bounds([1.0, x_max])
                    .labels(vec![
                        Span::styled("1", bold_style),
                        Span::styled(charting::format_label(x_max), bold_style),
                    ]),
            )
            .y_axis(
                Axis::default()
                    .title("%")
                    .bounds([0.0, 100.0])
                    .labels(vec![
                        Span::styled("0", bold_style),
                        Span::styled("100", bold_style),
                    ]),
            )
            .render(chunks[3], buf);
    }

    let visible_rows: Vec<Row> = report
        .history
        .iter()
        .skip(state.scroll_offset)
        .map(|entry| history_row(entry, attempt.id))
        .collect();
    let header = Row::new(vec![Cell::from("Test"), Cell::from("Score"), Cell::from("Date")])
        .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));
    let widths = [
        Constraint::Length(10),
        Constraint::Length(8),
        Constraint::Min(19),
    ];
    Table::new(visible_rows, widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title("History"))
        .column_spacing(2)
        .render(chunks[4], buf);

    Paragraph::new(Span::styled(
        "(b)ack / (↑/↓) scroll / (esc)ape",
        Style::default().add_modifier(Modifier::ITALIC),
    ))
    .alignment(Alignment::Center)
    .render(chunks[5], buf);
}
