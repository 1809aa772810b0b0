use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use super::grid;
use crate::midi::note_name;
use crate::pipeline::session::audible;
use crate::shared::DisplayState;

const HELP: [&str; 3] = [
    "[1-8] track  [Q] mute  [W] solo  [E] random  [L] lock  [ / ] density  - / = root",
    "[A/S] BPM -/+  [Z/X] energy -/+  [F] fill  [M] export  [SPACE] play/pause  [ESC] quit",
    "[V] save scene  [B] load scene  [N] clear scene  (then 1-9)",
];

pub fn render(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let track_rows = state.tracks.len() as u16 + 1;
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),              // header
            Constraint::Length(track_rows + 2), // tracks
            Constraint::Length(3),              // scenes
            Constraint::Length(3),              // status
            Constraint::Min(HELP.len() as u16), // help
        ])
        .split(area);

    draw_header(frame, sections[0], state);
    draw_tracks(frame, sections[1], state);
    draw_scenes(frame, sections[2], state);
    draw_status(frame, sections[3], state);
    draw_help(frame, sections[4]);
}

fn draw_header(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let mode = if state.playing { "JAM" } else { "PAUSED" };
    let text = format!(
        "BPM: {}   ENERGY: {}   MODE: {}   STEP: {:>2}/{}   SEED: {}",
        state.bpm,
        state.energy,
        mode,
        state.current_step + 1,
        state.steps,
        state.seed
    );
    let header = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("DARK MAQUINA"));
    frame.render_widget(header, area);
}

fn draw_tracks(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let states: Vec<_> = state.tracks.iter().map(|t| t.state).collect();
    let audible = audible(&states);
    // the playhead has already moved on; light the step that just played
    let played = (state.current_step + state.steps - 1) % state.steps.max(1);

    let mut lines = vec![{
        let mut ruler = vec![Span::raw(format!("{:<42}", ""))];
        ruler.extend(grid::playhead_row(state.steps, played).spans);
        Line::from(ruler)
    }];

    for (i, t) in state.tracks.iter().enumerate() {
        let cursor = if i == state.selected { ">" } else { " " };
        let lock = if t.state.locked { "L" } else { " " };
        let fill = if t.fill { "F" } else { " " };
        let info = format!(
            "{cursor}{} {:<6} {:<4} {:<7} {:<6} d{:.2} {:<4} {lock}{fill} ",
            i + 1,
            t.name,
            t.role.label(),
            t.mode,
            t.state.label(),
            t.density,
            note_name(t.root.clamp(0, 127) as u8),
        );
        let style = if i == state.selected {
            Style::default().add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        let mut spans = vec![Span::styled(format!("{info:<42}"), style)];
        spans.extend(grid::step_row(&t.hits, played, audible[i]).spans);
        lines.push(Line::from(spans));
    }

    let block = Block::default().borders(Borders::ALL).title("Tracks");
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_scenes(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let spans: Vec<Span> = state
        .scenes
        .iter()
        .enumerate()
        .map(|(i, summary)| {
            let slot = i as u8 + 1;
            let style = match (summary, state.current_scene == Some(slot)) {
                (Some(_), true) => Style::default().fg(Color::Black).bg(Color::LightMagenta),
                (Some(_), false) => Style::default().fg(Color::LightMagenta),
                (None, _) => Style::default().fg(Color::DarkGray),
            };
            Span::styled(format!(" [{slot}] "), style)
        })
        .collect();
    let title = match state.current_scene.and_then(|s| state.scenes[s as usize - 1].as_ref()) {
        Some(summary) => format!("Scenes - {summary}"),
        None => "Scenes".to_string(),
    };
    let block = Block::default().borders(Borders::ALL).title(title);
    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn draw_status(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let block = Block::default().borders(Borders::ALL);
    frame.render_widget(Paragraph::new(state.status.as_str()).block(block), area);
}

fn draw_help(frame: &mut Frame, area: Rect) {
    let lines: Vec<Line> = HELP.iter().map(|h| Line::from(*h)).collect();
    let help = Paragraph::new(lines).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, area);
}
