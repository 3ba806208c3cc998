//! User interface components.
//!
//! Provides TUI widgets and drawing functions for the show runner's
//! terminal-based user interface using ratatui.

mod library;
mod show;

pub use library::draw_library;
pub use show::draw_show;

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Gauge, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, AppMode};

/// Render the full application UI to the terminal frame.
pub fn draw(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(3), // Command/status bar at bottom
        ])
        .split(f.size());

    match app.mode {
        AppMode::Library => draw_library(f, app, chunks[0]),
        AppMode::Show => draw_show(f, app, chunks[0]),
    }

    draw_command_bar(f, app, chunks[1]);

    if app.is_loading {
        draw_loading_indicator(f);
    }

    if app.exit_progress > 0 {
        draw_exit_progress(f, app.exit_progress);
    }

    if app.exit_prompt_open() {
        draw_exit_prompt(f);
    }

    if let Some(error) = &app.error_message {
        draw_error_message(f, error);
    }
}

fn draw_command_bar(f: &mut Frame, app: &App, area: Rect) {
    let (title, border_color) = if app.locator_input.is_some() {
        ("Open playlist", Color::Cyan)
    } else {
        ("Commands/Status", Color::Yellow)
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(Span::styled(title, Style::default().fg(border_color)));
    let inner_area = block.inner(area);
    f.render_widget(block, area);

    if let Some(buffer) = &app.locator_input {
        let prompt = Paragraph::new(format!(" {buffer}")).style(Style::default().fg(Color::Cyan));
        f.render_widget(prompt, inner_area);
        #[allow(clippy::cast_possible_truncation)]
        f.set_cursor(inner_area.left() + buffer.chars().count() as u16 + 1, inner_area.top());
        return;
    }

    let mut text = match app.mode {
        AppMode::Library => create_help_text(&[
            ("Enter", "Start show"),
            ("o", "Open locator"),
            ("r", "Reload"),
            ("d", "Delete"),
            ("q", "Quit"),
        ]),
        AppMode::Show => create_help_text(&[
            ("Enter", "Trigger"),
            ("a", "Auto-play"),
            ("s", "Emergency stop"),
            ("x (hold)", "Exit"),
        ]),
    };
    if let Some(notice) = &app.notice {
        text.push(Span::styled(format!(" | {notice}"), Style::default().fg(Color::Gray)));
    }

    f.render_widget(
        Paragraph::new(Line::from(text)).style(Style::default().fg(Color::Gray)),
        inner_area,
    );
}

/// Build styled help text spans from key-description pairs for the command bar.
pub fn create_help_text<'a>(commands: &[(&'a str, &'a str)]) -> Vec<Span<'a>> {
    let mut text = vec![Span::raw(" ")];

    for (i, (key, description)) in commands.iter().enumerate() {
        text.push(Span::styled(
            *key,
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ));
        text.push(Span::raw(format!(": {description}")));
        if i < commands.len() - 1 {
            text.push(Span::raw(" | "));
        }
    }

    text
}

/// Create a bordered block with a title, highlighted when focused.
pub fn create_titled_block(title: &str, is_focused: bool) -> Block<'_> {
    let title_style = if is_focused {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };

    let border_style = if is_focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };

    Block::default()
        .title(Span::styled(title, title_style))
        .borders(Borders::ALL)
        .border_style(border_style)
}

/// Centered rectangle of at most `width` x `height` within the frame.
fn centered(f: &Frame, width: u16, height: u16) -> Rect {
    let size = f.size();
    let width = width.min(size.width.saturating_sub(4));
    let height = height.min(size.height);
    Rect {
        x: (size.width.saturating_sub(width)) / 2,
        y: (size.height.saturating_sub(height)) / 2,
        width,
        height,
    }
}

fn draw_loading_indicator(f: &mut Frame) {
    let area = centered(f, 22, 3);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .style(Style::default().bg(Color::Black));
    let text = Paragraph::new("Loading...")
        .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
        .alignment(Alignment::Center);

    f.render_widget(Clear, area);
    let inner = block.inner(area);
    f.render_widget(block, area);
    f.render_widget(text, inner);
}

fn draw_exit_progress(f: &mut Frame, progress: u8) {
    let size = f.size();
    let area = Rect {
        x: size.width / 4,
        y: size.height.saturating_sub(6),
        width: size.width / 2,
        height: 3,
    };
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("Hold to exit"))
        .gauge_style(Style::default().fg(Color::Red).bg(Color::Black))
        .percent(u16::from(progress));

    f.render_widget(Clear, area);
    f.render_widget(gauge, area);
}

fn draw_exit_prompt(f: &mut Frame) {
    let area = centered(f, 40, 5);
    let block = Block::default()
        .title(Span::styled(
            "Exit show",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .style(Style::default().bg(Color::Black));
    let text = Paragraph::new(vec![
        Line::from("End the performance?"),
        Line::from(Span::styled("y: Exit | n: Stay", Style::default().fg(Color::Gray))),
    ])
    .alignment(Alignment::Center);

    f.render_widget(Clear, area);
    let inner = block.inner(area);
    f.render_widget(block, area);
    f.render_widget(text, inner);
}

// Draw an error message overlay
fn draw_error_message(f: &mut Frame, message: &str) {
    let area = centered(f, 50, 7);
    let block = Block::default()
        .title(Span::styled("Error", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .style(Style::default().bg(Color::Black));

    f.render_widget(Clear, area);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(inner);

    let text = Paragraph::new(message)
        .style(Style::default().fg(Color::White))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    f.render_widget(text, rows[0]);

    let hint = Paragraph::new("Press Esc to dismiss")
        .style(Style::default().fg(Color::Gray))
        .alignment(Alignment::Center);
    f.render_widget(hint, rows[1]);
}
