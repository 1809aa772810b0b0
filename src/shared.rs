// Types shared between the input thread, the sequencing loop and the view.
//
// Keys (resolved by tui/input.rs into the events below):
//   Space         //  PlayPress
//   1 .. 8        //  SelectTrack(0..7), or a scene slot when a scene key is armed
//   a / s         //  AdjustBpm(-2 / +2)
//   z / x         //  AdjustEnergy(-1 / +1)
//   q             //  ToggleMute (selected)
//   w             //  ToggleSolo (selected, exclusive)
//   e             //  SoftRandomize (selected, ignored when locked)
//   l             //  ToggleLock (selected)
//   [ / ]         //  AdjustDensity(-0.05 / +0.05)
//   - / =         //  AdjustRoot(-1 / +1)
//   f             //  RequestFill (all tracks)
//   m             //  ExportLoop
//   v / b / n     //  arm save / load / clear scene, then 1 .. 9 picks the slot
//   Esc           //  Quit
//
// The loop owns all session state; the view just draws whatever DisplayState
// it's handed each iteration.

use crate::pattern::Role;
use crate::pipeline::scenes::NUM_SCENES;
use crate::pipeline::session::TrackRuntime;

pub const BPM_STEP: i32 = 2;
pub const DENSITY_STEP: f32 = 0.05;
pub const EXPORT_BARS: u32 = 4;

#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    PlayPress,
    SelectTrack(u8),
    AdjustBpm(i32),
    AdjustEnergy(i8),
    ToggleMute,
    ToggleSolo,
    SoftRandomize,
    ToggleLock,
    AdjustDensity(f32),
    AdjustRoot(i32),
    RequestFill,
    SaveScene(u8),
    LoadScene(u8),
    ClearScene(u8),
    ExportLoop,
    Quit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

#[derive(Clone, Debug)]
pub struct TrackView {
    pub name: String,
    pub role: Role,
    pub mode: &'static str,
    pub state: TrackRuntime,
    pub density: f32,
    pub root: i32,
    pub hits: Vec<bool>, // steps that fired in the current cycle
    pub fill: bool,
}

#[derive(Clone, Debug)]
pub struct DisplayState {
    pub bpm: u32,
    pub energy: u8,
    pub playing: bool,
    pub current_step: usize,
    pub steps: usize,
    pub selected: usize,
    pub tracks: Vec<TrackView>,
    pub scenes: [Option<String>; NUM_SCENES], // summary per occupied slot
    pub current_scene: Option<u8>,
    pub status: String,
    pub seed: u64,
}
