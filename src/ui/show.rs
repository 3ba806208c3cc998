use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem, Paragraph},
    Frame,
};

use crate::app::App;
use crate::constants::ui::STAGE_LINES;
use crate::engine::console::StageOutput;
use crate::engine::output::MessageKind;
use crate::ui::create_titled_block;

/// Cue list on the left, simulator status and stage output on the right.
pub fn draw_show(f: &mut Frame, app: &mut App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);

    draw_cues(f, app, chunks[0]);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(1)])
        .split(chunks[1]);

    draw_status(f, app, right[0]);
    draw_stage(f, app, right[1]);
}

fn draw_cues(f: &mut Frame, app: &mut App, area: Rect) {
    let selected = app.cue_state.selected();
    let mut last_scene = None;
    let items: Vec<ListItem> = app
        .cue_rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let scene_label = if last_scene.as_ref() == Some(&row.scene) {
                "   ".to_string()
            } else {
                format!("{:>3}", row.scene.as_str())
            };
            last_scene = Some(row.scene.clone());

            let is_last = app.last_cue.as_ref() == Some(&row.cue_id);
            let style = match (Some(i) == selected, is_last) {
                (true, _) => Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                (false, true) => Style::default().fg(Color::Green),
                (false, false) => Style::default().fg(Color::White),
            };
            ListItem::new(Line::from(vec![
                Span::styled(scene_label, Style::default().fg(Color::Cyan)),
                Span::raw("  "),
                Span::styled(format!("{:<8}", row.cue_id.as_str()), style),
                Span::styled(row.summary.as_str(), Style::default().fg(Color::Gray)),
            ]))
        })
        .collect();

    let list = List::new(items).block(create_titled_block("Cues", true));
    f.render_stateful_widget(list, area, &mut app.cue_state);
}

fn draw_status(f: &mut Frame, app: &App, area: Rect) {
    let status = app.session().simulator().status();
    let show = status.show_name.unwrap_or_else(|| "-".to_string());
    let auto = if app.auto_playback { "running" } else { "off" };
    let last = app.last_cue.as_ref().map_or("-", |id| id.as_str());

    let lines = vec![
        Line::from(vec![
            Span::styled(show, Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
            Span::styled(
                format!("  ({:?})", app.config.cue_source),
                Style::default().fg(Color::Gray),
            ),
        ]),
        Line::from(format!(
            "Last cue: {last} | Auto-play: {auto} | Next: {}/{}",
            status.next_cue_index, status.total_cues
        )),
    ];
    f.render_widget(Paragraph::new(lines).block(create_titled_block("Show", false)), area);
}

fn draw_stage(f: &mut Frame, app: &App, area: Rect) {
    let visible = usize::from(area.height.saturating_sub(2)).min(STAGE_LINES);
    let lines: Vec<Line> = app.output.recent(visible).into_iter().map(stage_line).collect();
    f.render_widget(Paragraph::new(lines).block(create_titled_block("Stage output", false)), area);
}

fn stage_line(entry: StageOutput) -> Line<'static> {
    let (tag, color, text) = match entry {
        StageOutput::Speech { text, language } => {
            ("speak", Color::Green, format!("{text} [{language}]"))
        }
        StageOutput::SpeechStopped => ("speak", Color::DarkGray, "(interrupted)".to_string()),
        StageOutput::PlaybackStarted { kind, file, volume } => {
            ("play", Color::Magenta, format!("{kind} {file} @ {volume:.2}"))
        }
        StageOutput::PlaybackStopped { file } => ("stop", Color::DarkGray, file),
        StageOutput::PlaybackReleased { file } => ("free", Color::DarkGray, file),
        StageOutput::Message { kind: MessageKind::Subtitle, text } => ("sub", Color::White, text),
        StageOutput::Message { kind: MessageKind::Text, text } => ("text", Color::Cyan, text),
    };
    Line::from(vec![
        Span::styled(format!("{tag:>5} "), Style::default().fg(color).add_modifier(Modifier::BOLD)),
        Span::raw(text),
    ])
}
