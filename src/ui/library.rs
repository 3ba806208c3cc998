use chrono::Local;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem, Paragraph, Wrap},
    Frame,
};

use crate::app::App;
use crate::ui::create_titled_block;

/// Stored playlists on the left, details of the selected one on the right.
pub fn draw_library(f: &mut Frame, app: &mut App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let selected = app.library_state.selected();
    let items: Vec<ListItem> = app
        .playlists
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let (prefix, style) = if Some(i) == selected {
                ("> ", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
            } else {
                ("  ", Style::default().fg(Color::White))
            };
            ListItem::new(Line::from(vec![
                Span::raw(prefix),
                Span::styled(entry.show_name.as_str(), style),
                Span::styled(format!("  {}", entry.theater_name), Style::default().fg(Color::Gray)),
            ]))
        })
        .collect();

    let title = if app.playlists.is_empty() { "Playlists (none stored)" } else { "Playlists" };
    let list = List::new(items).block(create_titled_block(title, true));
    f.render_stateful_widget(list, chunks[0], &mut app.library_state);

    let details = match selected.and_then(|i| app.playlists.get(i)) {
        Some(entry) => vec![
            Line::from(Span::styled(
                entry.show_name.as_str(),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )),
            Line::from(entry.theater_name.as_str()),
            Line::from(""),
            Line::from(format!("Id:         {}", entry.playlist_id)),
            Line::from(format!("Version:    {}", entry.version)),
            Line::from(format!(
                "Downloaded: {}",
                entry.downloaded_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
            )),
            Line::from(""),
            Line::from(Span::styled(
                format!("Cue source: {:?}", app.config.cue_source),
                Style::default().fg(Color::Gray),
            )),
        ],
        None => vec![Line::from(Span::styled(
            "Press 'o' and enter a playlist link to download a show.",
            Style::default().fg(Color::Gray),
        ))],
    };

    f.render_widget(
        Paragraph::new(details)
            .block(create_titled_block("Details", false))
            .wrap(Wrap { trim: true }),
        chunks[1],
    );
}
