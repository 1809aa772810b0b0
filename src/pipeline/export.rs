// Offline rendering of N bars from cloned engines, for dropping loops into a DAW.
use std::path::{Path, PathBuf};

use anyhow::Context;
use fastrand::Rng;

use crate::pattern::{PatternEngine, Role};
use crate::pipeline::session::MAX_STEPS;
use crate::pipeline::smf;

pub const TICKS_PER_BEAT: u16 = 480;
pub const TICKS_PER_STEP: u32 = TICKS_PER_BEAT as u32 / 4; // steps are sixteenths
const PAD_STEPS: u32 = 4;
/// Longest render; keeps every tick well inside u32.
pub const MAX_EXPORT_BARS: u32 = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExportEvent {
    pub tick: u32,
    pub pitch: u8,
    pub velocity: u8,
    pub is_onset: bool,
}

#[derive(Clone, Debug)]
pub struct RenderedTrack {
    pub name: String,
    pub events: Vec<ExportEvent>,
}

/// Plays `bars` cycles of `steps` through each engine and collects the notes.
/// The engines should be `clone_for_export()` copies; their bar counters get
/// advanced here. Events are sorted by tick with releases ahead of onsets.
/// `bars` is clamped to 1..=MAX_EXPORT_BARS and `steps` to 1..=MAX_STEPS.
pub fn render_loop(
    engines: &mut [PatternEngine],
    bars: u32,
    steps: usize,
    energy: u8,
    rng: &mut Rng,
) -> Vec<RenderedTrack> {
    let bars = bars.clamp(1, MAX_EXPORT_BARS);
    let steps = steps.clamp(1, MAX_STEPS);
    let total = bars as usize * steps;
    let mut tracks: Vec<RenderedTrack> = engines
        .iter()
        .map(|e| RenderedTrack {
            name: e.config().name.clone(),
            events: Vec::new(),
        })
        .collect();

    // step-major so the rng is consumed in the same order as the live loop
    for step in 0..total {
        let local = step % steps;
        for (engine, track) in engines.iter_mut().zip(tracks.iter_mut()) {
            let Some(pitch) = engine.decide_note(local, energy, rng) else {
                continue;
            };
            let Ok(pitch) = u8::try_from(pitch) else {
                continue;
            };
            if pitch > 127 {
                continue;
            }
            let role = engine.role();
            let start = step as u32 * TICKS_PER_STEP;
            let length = if role == Role::Pad { TICKS_PER_STEP * PAD_STEPS } else { TICKS_PER_STEP };
            let velocity = role.base_velocity() as u8;
            track.events.push(ExportEvent { tick: start, pitch, velocity, is_onset: true });
            track.events.push(ExportEvent {
                tick: start + length,
                pitch,
                velocity: 0,
                is_onset: false,
            });
        }
        if (step + 1) % steps == 0 {
            for engine in engines.iter_mut() {
                engine.advance_bar();
            }
        }
    }

    for track in &mut tracks {
        // stable sort keeps onset order within a tick
        track.events.sort_by_key(|e| (e.tick, e.is_onset));
    }
    tracks
}

/// Renders and writes `<out_dir>/loop_<timestamp>.mid`, returning the path.
pub fn export_loop(
    engines: &mut [PatternEngine],
    bars: u32,
    steps: usize,
    bpm: u32,
    energy: u8,
    rng: &mut Rng,
    out_dir: &Path,
) -> anyhow::Result<PathBuf> {
    anyhow::ensure!(!engines.is_empty(), "nothing to export, no tracks");
    let tracks = render_loop(engines, bars, steps, energy, rng);
    let bytes = smf::encode(&tracks, bpm, TICKS_PER_BEAT);

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let path = out_dir.join(format!("loop_{stamp}.mid"));
    std::fs::write(&path, bytes).with_context(|| format!("writing {}", path.display()))?;
    tracing::info!(path = %path.display(), bars, "exported loop");
    Ok(path)
}
