pub mod charting;
pub mod picker;
pub mod results;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::{
    app::{App, AppState},
    session::ExamSession,
    util::format_countdown,
};

pub const HORIZONTAL_MARGIN: u16 = 5;
pub const VERTICAL_MARGIN: u16 = 2;

/// Seconds left at which the countdown turns red
const LOW_TIME_SECS: i64 = 60;

pub fn draw(app: &App, f: &mut Frame) {
    f.render_widget(app, f.area());
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match &self.state {
            AppState::Loading => render_message(area, buf, &["Loading questions..."], None),
            AppState::Picker => picker::render_picker(&self.picker, area, buf),
            AppState::Exam => {
                if let Some(session) = &self.session {
                    render_exam(session, area, buf);
                }
            }
            AppState::NoQuestions { test_id, title } => render_message(
                area,
                buf,
                &[
                    format!("No questions found for Test {test_id}").as_str(),
                    title.as_str(),
                    "Add questions to the question bank",
                ],
                Some("(b)ack / (esc)ape"),
            ),
            AppState::Results => {
                if let Some(report) = &self.report {
                    results::render_results(report, &self.results_state, area, buf);
                }
            }
            AppState::NoAttempt => {
                render_message(area, buf, &["No attempt found."], Some("(b)ack / (esc)ape"))
            }
        }
    }
}

/// Centered informational screen with an optional legend line
fn render_message(area: Rect, buf: &mut Buffer, lines: &[&str], legend: Option<&str>) {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let text_height = lines.len() as u16 + if legend.is_some() { 2 } else { 0 };
    let pad = area.height.saturating_sub(text_height) / 2;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([Constraint::Length(pad), Constraint::Min(0)])
        .split(area);

    let mut text: Vec<Line> = lines
        .iter()
        .enumerate()
        .map(|(i, l)| {
            if i == 0 {
                Line::from(Span::styled(l.to_string(), bold_style))
            } else {
                Line::from(l.to_string())
            }
        })
        .collect();

    if let Some(legend) = legend {
        text.push(Line::from(""));
        text.push(Line::from(Span::styled(
            legend.to_string(),
            Style::default().add_modifier(Modifier::ITALIC),
        )));
    }

    Paragraph::new(text)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(chunks[1], buf);
}

fn render_exam(session: &ExamSession, area: Rect, buf: &mut Buffer) {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let dim_style = Style::default().add_modifier(Modifier::DIM);
    let selected_style = Style::default().patch(bold_style).fg(Color::Green);
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);

    let test = session.test();
    let index = session.current_index();
    let question = &test.questions[index];

    let max_chars_per_line = area.width.saturating_sub(HORIZONTAL_MARGIN * 2).max(1);
    let question_lines =
        ((question.question.width() as f64 / max_chars_per_line as f64).ceil() as u16).max(1);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(1), // header
            Constraint::Length(1), // padding
            Constraint::Length(question_lines), // question
            Constraint::Length(1), // padding
            Constraint::Length(question.options.len() as u16), // options
            Constraint::Min(0),
            Constraint::Length(1), // progress
            Constraint::Length(1), // legend
        ])
        .split(area);

    let header = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(6)])
        .split(chunks[0]);

    Paragraph::new(Line::from(vec![
        Span::styled(test.title.clone(), bold_style),
        Span::raw(format!(" - Question {}/{}", index + 1, test.questions.len())),
    ]))
    .render(header[0], buf);

    let remaining = session.remaining_secs();
    let timer_style = if remaining < LOW_TIME_SECS {
        Style::default().patch(bold_style).fg(Color::Red)
    } else {
        bold_style
    };
    Paragraph::new(Span::styled(format_countdown(remaining), timer_style))
        .alignment(Alignment::Right)
        .render(header[1], buf);

    Paragraph::new(question.question.clone())
        .wrap(Wrap { trim: true })
        .render(chunks[2], buf);

    let selected = session.current_answer();
    let options: Vec<Line> = question
        .options
        .iter()
        .enumerate()
        .map(|(i, opt)| {
            let label = format!("{}. {}", option_letter(i), opt);
            if selected == Some(i) {
                Line::from(Span::styled(format!("> {label}"), selected_style))
            } else {
                Line::from(Span::raw(format!("  {label}")))
            }
        })
        .collect();
    Paragraph::new(options).render(chunks[4], buf);

    Paragraph::new(Span::styled(
        format!(
            "{}/{} answered",
            session.answered_count(),
            test.questions.len()
        ),
        dim_style,
    ))
    .alignment(Alignment::Center)
    .render(chunks[6], buf);

    let control = |enabled: bool, text: &str| {
        Span::styled(
            text.to_string(),
            if enabled {
                italic_style
            } else {
                Style::default().patch(italic_style).add_modifier(Modifier::DIM)
            },
        )
    };
    let last_letter = option_letter(question.options.len().saturating_sub(1));
    Paragraph::new(Line::from(vec![
        control(session.has_previous(), "(←) previous"),
        Span::raw(" / "),
        control(session.has_next(), "(→) next"),
        Span::raw(" / "),
        control(true, &format!("(a-{}) answer", last_letter.to_ascii_lowercase())),
        Span::raw(" / "),
        control(true, "(enter) finish"),
        Span::raw(" / "),
        control(true, "(esc)ape"),
    ]))
    .render(chunks[7], buf);
}

/// `A`, `B`, ... for option indices
pub fn option_letter(index: usize) -> char {
    (b'A' + (index % 26) as u8) as char
}
