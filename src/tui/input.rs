use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};

use super::mode::{SceneArm, TuiState};
use crate::shared::{InputEvent, BPM_STEP, DENSITY_STEP};

/// Spawns the one thread allowed to block on the keyboard. It only ever
/// pushes events; the loop decides what they mean. Exits after sending Quit
/// or once the loop hangs up.
pub fn spawn_input_thread(tx: Sender<InputEvent>) -> anyhow::Result<JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name("input".into())
        .spawn(move || {
            let mut ts = TuiState::default();
            loop {
                let key = match event::read() {
                    Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => key,
                    Ok(_) => continue,
                    Err(e) => {
                        // dropping tx tells the loop we're gone
                        tracing::warn!(error = %e, "keyboard read failed");
                        break;
                    }
                };
                let Some(ev) = handle_key(key.code, &mut ts) else {
                    continue;
                };
                let quit = ev == InputEvent::Quit;
                if tx.send(ev).is_err() || quit {
                    break;
                }
            }
        })?;
    Ok(handle)
}

// resolves a key press into a semantic event, tracking the scene arm state
pub fn handle_key(code: KeyCode, ts: &mut TuiState) -> Option<InputEvent> {
    if let Some(arm) = ts.scene_arm.take() {
        if let KeyCode::Char(c @ '1'..='9') = code {
            let slot = c as u8 - b'0';
            return Some(match arm {
                SceneArm::Save => InputEvent::SaveScene(slot),
                SceneArm::Load => InputEvent::LoadScene(slot),
                SceneArm::Clear => InputEvent::ClearScene(slot),
            });
        }
        // anything else just disarms, Esc included, so a stray Esc doesn't quit
        if code == KeyCode::Esc {
            return None;
        }
    }

    let ev = match code {
        KeyCode::Esc => InputEvent::Quit,
        KeyCode::Char(' ') => InputEvent::PlayPress,
        KeyCode::Char(c @ '1'..='8') => InputEvent::SelectTrack(c as u8 - b'1'),

        KeyCode::Char('a' | 'A') => InputEvent::AdjustBpm(-BPM_STEP),
        KeyCode::Char('s' | 'S') => InputEvent::AdjustBpm(BPM_STEP),
        KeyCode::Char('z' | 'Z') => InputEvent::AdjustEnergy(-1),
        KeyCode::Char('x' | 'X') => InputEvent::AdjustEnergy(1),

        KeyCode::Char('q' | 'Q') => InputEvent::ToggleMute,
        KeyCode::Char('w' | 'W') => InputEvent::ToggleSolo,
        KeyCode::Char('e' | 'E') => InputEvent::SoftRandomize,
        KeyCode::Char('l' | 'L') => InputEvent::ToggleLock,

        // knobs for the selected track
        KeyCode::Char('[') => InputEvent::AdjustDensity(-DENSITY_STEP),
        KeyCode::Char(']') => InputEvent::AdjustDensity(DENSITY_STEP),
        KeyCode::Char('-') => InputEvent::AdjustRoot(-1),
        KeyCode::Char('=') => InputEvent::AdjustRoot(1),

        KeyCode::Char('f' | 'F') => InputEvent::RequestFill,
        KeyCode::Char('m' | 'M') => InputEvent::ExportLoop,

        KeyCode::Char('v' | 'V') => return arm(ts, SceneArm::Save),
        KeyCode::Char('b' | 'B') => return arm(ts, SceneArm::Load),
        KeyCode::Char('n' | 'N') => return arm(ts, SceneArm::Clear),

        _ => return None,
    };
    Some(ev)
}

fn arm(ts: &mut TuiState, what: SceneArm) -> Option<InputEvent> {
    ts.scene_arm = Some(what);
    None
}
