//! UI rendering for the TUI

use ratatui::{
    layout::Flex,
    prelude::*,
    widgets::{Block, Borders, Paragraph},
};

use super::app::App;

const SPINNER: [char; 4] = ['|', '/', '-', '\\'];

/// Draw the entire UI
pub fn draw(frame: &mut Frame, app: &App) {
    let [title_area, _, button_area, status_area, _, help_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Fill(1),
        Constraint::Length(3),
        Constraint::Length(2),
        Constraint::Fill(1),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    frame.render_widget(
        Paragraph::new("Long Task Button")
            .style(Style::default().add_modifier(Modifier::BOLD))
            .alignment(Alignment::Center),
        title_area,
    );

    draw_button(frame, app, button_area);
    draw_status(frame, app, status_area);

    frame.render_widget(
        Paragraph::new("Enter/Space: click   q/Esc: quit")
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center),
        help_area,
    );
}

fn draw_button(frame: &mut Frame, app: &App, area: Rect) {
    let running = app.button.is_running();
    let label = &app.button.view().label;
    let text = if running {
        let spin = SPINNER[(app.tick_count as usize) % SPINNER.len()];
        format!("{} {}", spin, label)
    } else {
        label.clone()
    };

    // Border plus one column of padding on each side
    let width = u16::try_from(text.chars().count())
        .unwrap_or(u16::MAX)
        .saturating_add(4)
        .min(area.width);
    let [button_rect] = Layout::horizontal([Constraint::Length(width)])
        .flex(Flex::Center)
        .areas(area);

    let color = if running { Color::Yellow } else { Color::Green };
    frame.render_widget(
        Paragraph::new(text)
            .alignment(Alignment::Center)
            .style(Style::default().fg(color))
            .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(color))),
        button_rect,
    );
}

fn draw_status(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines = Vec::new();
    if let Some((message, is_error)) = &app.status_message {
        lines.push(status_line(message, *is_error));
    }
    if let Some((message, is_error)) = &app.button.view().last_outcome {
        lines.push(status_line(message, *is_error));
    }
    frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), area);
}

fn status_line(message: &str, is_error: bool) -> Line<'static> {
    let color = if is_error { Color::Red } else { Color::Gray };
    Line::styled(message.to_string(), Style::default().fg(color))
}
