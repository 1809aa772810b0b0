use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

// One row of step cells for a track: lit where a note fired this cycle,
// the playhead drawn on top.
pub fn step_row(hits: &[bool], playhead: usize, audible: bool) -> Line<'static> {
    let spans: Vec<Span> = hits
        .iter()
        .enumerate()
        .map(|(i, &hit)| {
            let glyph = if hit { "■" } else { "·" };
            let mut style = if !audible {
                Style::default().fg(Color::DarkGray)
            } else if hit {
                Style::default().fg(Color::LightMagenta)
            } else {
                Style::default().fg(Color::Gray)
            };
            if i == playhead {
                style = style.bg(Color::Magenta).add_modifier(Modifier::BOLD);
            }
            // beat separators every four steps
            let sep = if i % 4 == 3 { "  " } else { " " };
            Span::styled(format!("{glyph}{sep}"), style)
        })
        .collect();
    Line::from(spans)
}

// the bare step ruler above the tracks
pub fn playhead_row(steps: usize, playhead: usize) -> Line<'static> {
    let spans: Vec<Span> = (0..steps)
        .map(|i| {
            let glyph = if i == playhead { "▓" } else { "░" };
            let sep = if i % 4 == 3 { "  " } else { " " };
            Span::raw(format!("{glyph}{sep}"))
        })
        .collect();
    Line::from(spans)
}
