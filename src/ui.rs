use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Gauge, Paragraph, Row, Table, Widget},
};

use crate::{
    drill::DrillView,
    history::{format_start, review_rows, HistoryCursor},
    session::Session,
    store::score,
};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 1;

/// Review of past sessions, or a start prompt when there are none.
pub struct HomeScreen<'a> {
    pub sessions: &'a [Session],
    pub cursor: HistoryCursor,
}

impl Widget for &HomeScreen<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let italic_style = Style::default().add_modifier(Modifier::ITALIC);

        let Some(session) = self.cursor.selected(self.sessions) else {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Percentage(45),
                    Constraint::Length(1),
                    Constraint::Length(1),
                    Constraint::Min(0),
                ])
                .split(area);
            Paragraph::new(Span::styled("press <enter> to start a session", bold_style))
                .alignment(Alignment::Center)
                .render(chunks[1], buf);
            Paragraph::new(Span::styled("(esc)ape", italic_style))
                .alignment(Alignment::Center)
                .render(chunks[2], buf);
            return;
        };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Length(1), // prev / next
                Constraint::Length(1), // score
                Constraint::Length(1), // date
                Constraint::Min(3),    // table
                Constraint::Length(1), // legend
            ])
            .split(area);

        let dim = Style::default().add_modifier(Modifier::DIM);
        let nav = Line::from(vec![
            Span::styled(
                "< prev score",
                if self.cursor.has_previous() { bold_style } else { dim },
            ),
            Span::raw("   "),
            Span::styled(
                "next score >",
                if self.cursor.has_next() { bold_style } else { dim },
            ),
        ]);
        Paragraph::new(nav)
            .alignment(Alignment::Center)
            .render(chunks[0], buf);

        let title = if session.is_complete() {
            format!("{} %", score(session))
        } else {
            format!("{} %  (unfinished)", score(session))
        };
        Paragraph::new(Span::styled(
            title,
            Style::default().patch(bold_style).fg(Color::Green),
        ))
        .alignment(Alignment::Center)
        .render(chunks[1], buf);

        Paragraph::new(Span::styled(format_start(session), italic_style))
            .alignment(Alignment::Center)
            .render(chunks[2], buf);

        let header = Row::new(vec![
            Cell::from("No"),
            Cell::from("Questions"),
            Cell::from("Answers"),
            Cell::from("Duration"),
        ])
        .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));

        let rows: Vec<Row> = review_rows(session)
            .into_iter()
            .map(|r| {
                let answer_style = match (r.answer.is_empty(), r.correct) {
                    (true, _) => Style::default(),
                    (false, true) => Style::default().fg(Color::Green),
                    (false, false) => Style::default().fg(Color::Red),
                };
                Row::new(vec![
                    Cell::from(r.number.to_string()),
                    Cell::from(r.questions),
                    Cell::from(format!("{} / {}", r.answer, r.expected)).style(answer_style),
                    Cell::from(r.duration),
                ])
            })
            .collect();

        Table::new(
            rows,
            [
                Constraint::Length(4),
                Constraint::Min(12),
                Constraint::Length(16),
                Constraint::Length(10),
            ],
        )
        .header(header)
        .block(Block::default().borders(Borders::ALL).title("History"))
        .render(chunks[3], buf);

        Paragraph::new(Span::styled(
            "(enter) start session / (←) prev / (→) next / (esc)ape",
            italic_style,
        ))
        .render(chunks[4], buf);
    }
}

/// The active drill: progress, the number being read, and the answer box.
pub struct DrillScreen<'a> {
    pub view: &'a DrillView,
}

impl Widget for &DrillScreen<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let view = self.view;
        let bold_style = Style::default().add_modifier(Modifier::BOLD);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Percentage(40),
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(area);

        Gauge::default()
            .gauge_style(Style::default().fg(Color::Green))
            .percent(view.progress.min(100))
            .render(chunks[0], buf);

        if view.awaiting_answer {
            let input = Paragraph::new(Span::styled(
                format!("{}_", view.input),
                Style::default().patch(bold_style).fg(Color::Cyan),
            ))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title("total"));
            input.render(centered(chunks[2], 30), buf);
        } else if let Some(value) = view.value {
            Paragraph::new(Span::styled(
                value.to_string(),
                Style::default().patch(bold_style).fg(Color::Magenta),
            ))
            .alignment(Alignment::Center)
            .render(chunks[2].inner(ratatui::layout::Margin::new(0, 1)), buf);
        }

        Paragraph::new(Span::styled(
            format!("sum {}/{}   (esc) leave", view.row + 1, view.total_rows),
            Style::default().add_modifier(Modifier::ITALIC),
        ))
        .render(chunks[4], buf);
    }
}

fn centered(area: Rect, width: u16) -> Rect {
    let width = width.min(area.width);
    Rect {
        x: area.x + (area.width - width) / 2,
        width,
        ..area
    }
}
