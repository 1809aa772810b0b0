use fastrand::Rng;
use serde::{Deserialize, Serialize};

use super::pack;
use super::role::Role;
use super::scale;

pub const MIN_ROOT: i32 = 12;
pub const MAX_ROOT: i32 = 100;
pub const MIN_SOFT_DENSITY: f32 = 0.05;
const DENSITY_JITTER: f32 = 0.15;

const MOTIF: [i32; 4] = [0, 3, 5, 3];
const BAR_LEN: usize = 16; // anchors are laid out on a 16-step bar

/// Everything a generator needs to know about its track.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackConfig {
    pub name: String,
    pub role: Role,
    pub root: i32,
    pub scale: String,
    pub density: f32,
    pub steps: usize,
    pub style: String,
}

impl TrackConfig {
    pub fn set_root(&mut self, root: i32) {
        self.root = root.clamp(MIN_ROOT, MAX_ROOT);
    }

    pub fn set_density(&mut self, density: f32) {
        self.density = density.clamp(0.0, 1.0);
    }
}

/// Rhythmic variant. Only bass ever leaves `Base`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Base,
    Gallop,
    Rolling,
    Offbeat,
}

impl Mode {
    pub const BASS_MODES: [Mode; 4] = [Mode::Base, Mode::Gallop, Mode::Rolling, Mode::Offbeat];

    pub fn label(self) -> &'static str {
        match self {
            Mode::Base => "base",
            Mode::Gallop => "gallop",
            Mode::Rolling => "rolling",
            Mode::Offbeat => "offbeat",
        }
    }

    fn bass_anchor(self, pos: usize) -> bool {
        match self {
            Mode::Base => matches!(pos, 0 | 4 | 8 | 12),
            Mode::Gallop => matches!(pos, 0 | 3 | 4 | 8 | 11 | 12),
            Mode::Rolling => pos % 2 == 0,
            Mode::Offbeat => pos % 4 == 2,
        }
    }
}

// where an onset on this step would come from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Anchor {
    Skeleton, // pattern pack says hit, no dice roll
    Rule,     // role rule says likely hit
    Free,
}

/// One generator per track. Owns its config; the UI only ever sees copies.
///
/// Every random decision takes exactly one draw from the `Rng` handed in, so a
/// fixed seed and a fixed call sequence always give the same notes.
#[derive(Clone, Debug)]
pub struct PatternEngine {
    config: TrackConfig,
    scale: &'static [i32],
    skeleton: Option<Vec<bool>>,
    mode: Mode,
    motif_pos: usize,
    bar: u64,
    fill_requested: bool,
}

impl PatternEngine {
    pub fn new(config: TrackConfig) -> Self {
        let scale = scale::intervals(&config.scale);
        let skeleton = pack::skeleton(&config.style, config.role, config.steps);
        Self {
            config,
            scale,
            skeleton,
            mode: Mode::Base,
            motif_pos: 0,
            bar: 0,
            fill_requested: false,
        }
    }

    pub fn config(&self) -> &TrackConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut TrackConfig {
        &mut self.config
    }

    pub fn role(&self) -> Role {
        self.config.role
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    #[cfg(test)]
    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    #[cfg(test)]
    pub fn bar(&self) -> u64 {
        self.bar
    }

    #[cfg(test)]
    pub fn motif_pos(&self) -> usize {
        self.motif_pos
    }

    #[cfg(test)]
    pub fn motif(&self) -> &'static [i32] {
        &MOTIF
    }

    #[cfg(test)]
    pub fn scale(&self) -> &'static [i32] {
        self.scale
    }

    #[cfg(test)]
    pub fn has_skeleton(&self) -> bool {
        self.skeleton.is_some()
    }

    pub fn fill_requested(&self) -> bool {
        self.fill_requested
    }

    // Fills don't change generation yet; the flag lives for one bar and that's it.
    pub fn request_fill(&mut self) {
        self.fill_requested = true;
    }

    /// Called once per completed cycle, never per step.
    pub fn advance_bar(&mut self) {
        self.bar += 1;
        self.fill_requested = false;
    }

    pub fn randomize_mode(&mut self, rng: &mut Rng) {
        if self.config.role == Role::Bass {
            self.mode = Mode::BASS_MODES[rng.usize(..Mode::BASS_MODES.len())];
        } else {
            self.mode = Mode::Base;
        }
    }

    pub fn randomize_density_soft(&mut self, rng: &mut Rng) {
        let jitter = rng.f32() * 2.0 * DENSITY_JITTER - DENSITY_JITTER;
        self.config.density = (self.config.density + jitter).clamp(MIN_SOFT_DENSITY, 1.0);
    }

    /// Independent copy for offline rendering; advancing its bars never touches the jam.
    pub fn clone_for_export(&self) -> Self {
        self.clone()
    }

    /// Pitch to play on `step`, if any. Pitches are root + a scale or motif
    /// interval, sometimes lifted by octaves, and may fall outside 0..=127 for
    /// extreme roots; the scheduler drops those.
    pub fn decide_note(&mut self, step: usize, energy: u8, rng: &mut Rng) -> Option<i32> {
        let energy = energy.clamp(1, 5);
        match self.config.role {
            Role::Kick => self.kick(step, energy, rng),
            Role::Bass => self.bass(step, energy, rng),
            Role::Hats | Role::Perc => self.hats_perc(step, energy, rng),
            Role::Stab | Role::Lead => self.stab_lead(step, energy, rng),
            Role::Pad => self.pad(step, energy, rng),
            Role::Fx => self.fx(step, energy, rng),
            Role::Raw => self.raw(step, energy, rng),
        }
    }

    fn kick(&mut self, step: usize, energy: u8, rng: &mut Rng) -> Option<i32> {
        let root = self.config.root;
        let pos = step % BAR_LEN;
        if self.anchor(step, pos % 4 == 0) != Anchor::Free {
            return Some(root);
        }
        if energy >= 4 {
            let heavy = self.variation_bar();
            let ghost_slot = matches!(pos, 2 | 6 | 10 | 14) || (heavy && matches!(pos, 13 | 15));
            let p = if heavy { 0.45 } else { 0.3 };
            if ghost_slot && chance(rng, p) {
                return Some(root);
            }
        }
        None
    }

    fn bass(&mut self, step: usize, energy: u8, rng: &mut Rng) -> Option<i32> {
        let root = self.config.root;
        let pos = step % BAR_LEN;
        if self.anchor(step, self.mode.bass_anchor(pos)) != Anchor::Free {
            // gallop is the one bass mode that walks the motif
            let interval = if self.mode == Mode::Gallop {
                self.next_motif_interval()
            } else {
                self.scale_interval(rng)
            };
            return Some(root + interval);
        }
        if energy >= 3 {
            let p = if self.variation_bar() && energy >= 4 { 0.12 } else { 0.06 };
            if chance(rng, p) {
                return Some(root + self.scale_interval(rng));
            }
        }
        None
    }

    fn hats_perc(&mut self, step: usize, energy: u8, rng: &mut Rng) -> Option<i32> {
        let root = self.config.root;
        let density = self.config.density as f64;
        let anchor = self.anchor(step, step % BAR_LEN % 4 == 2);
        match anchor {
            Anchor::Skeleton => return Some(root),
            Anchor::Rule if chance(rng, 0.9) => return Some(root),
            _ => {}
        }
        if energy >= 3 && step % 2 == 1 && chance(rng, density) {
            // flam between the two lowest degrees
            let lower = self.scale.len().min(2);
            return Some(root + self.scale[rng.usize(..lower)]);
        }
        if anchor == Anchor::Free
            && self.variation_bar()
            && energy >= 4
            && step % 2 == 0
            && chance(rng, density * 0.5)
        {
            return Some(root);
        }
        None
    }

    fn stab_lead(&mut self, step: usize, energy: u8, rng: &mut Rng) -> Option<i32> {
        if energy < 2 {
            return None;
        }
        let root = self.config.root;
        let pos = step % BAR_LEN;
        match self.anchor(step, matches!(pos, 1 | 5 | 9 | 13)) {
            Anchor::Skeleton => {
                let interval = self.next_motif_interval();
                return Some(root + interval + octave(rng, 1));
            }
            Anchor::Rule if chance(rng, self.config.density as f64) => {
                let interval = self.next_motif_interval();
                return Some(root + interval + octave(rng, 1));
            }
            _ => {}
        }
        // short run up top at the tail of every fourth bar
        if self.variation_bar() && energy >= 3 && pos >= 14 && chance(rng, 0.5) {
            return Some(root + self.next_motif_interval() + 12);
        }
        if energy >= 4 && chance(rng, 0.03) {
            return Some(root + self.scale_interval(rng) + 12);
        }
        None
    }

    fn pad(&mut self, step: usize, energy: u8, rng: &mut Rng) -> Option<i32> {
        let root = self.config.root;
        match self.anchor(step, step == 0) {
            Anchor::Skeleton => return Some(root),
            Anchor::Rule if chance(rng, 0.9) => return Some(root),
            _ => {}
        }
        let half = self.config.steps / 2;
        if half > 0 && step == half && self.variation_bar() && energy >= 3 && chance(rng, 0.5) {
            return Some(root + self.scale_interval(rng));
        }
        None
    }

    fn fx(&mut self, step: usize, energy: u8, rng: &mut Rng) -> Option<i32> {
        let root = self.config.root;
        if self.anchor(step, false) == Anchor::Skeleton {
            return Some(root + self.scale_interval(rng) + octave(rng, 2));
        }
        if energy >= 3 {
            let p = if self.variation_bar() && energy >= 4 { 0.06 } else { 0.02 };
            if chance(rng, p) {
                return Some(root + self.scale_interval(rng) + octave(rng, 2));
            }
        }
        None
    }

    fn raw(&mut self, step: usize, energy: u8, rng: &mut Rng) -> Option<i32> {
        let root = self.config.root;
        if self.anchor(step, false) == Anchor::Skeleton {
            return Some(root + self.scale_interval(rng));
        }
        let p = self.config.density as f64 * (0.3 + 0.15 * energy as f64);
        if chance(rng, p) {
            return Some(root + self.scale_interval(rng));
        }
        None
    }

    // A skeleton, when there is one, replaces the rule anchors outright.
    fn anchor(&self, step: usize, rule_hit: bool) -> Anchor {
        match &self.skeleton {
            Some(sk) if sk.get(step).copied().unwrap_or(false) => Anchor::Skeleton,
            Some(_) => Anchor::Free,
            None if rule_hit => Anchor::Rule,
            None => Anchor::Free,
        }
    }

    fn variation_bar(&self) -> bool {
        self.bar % 4 == 3
    }

    fn scale_interval(&self, rng: &mut Rng) -> i32 {
        self.scale[rng.usize(..self.scale.len())]
    }

    fn next_motif_interval(&mut self) -> i32 {
        let iv = MOTIF[self.motif_pos];
        self.motif_pos = (self.motif_pos + 1) % MOTIF.len();
        iv
    }
}

fn chance(rng: &mut Rng, p: f64) -> bool {
    rng.f64() < p
}

// 0..=max_octaves octaves up, one draw
fn octave(rng: &mut Rng, max_octaves: usize) -> i32 {
    rng.usize(..=max_octaves) as i32 * 12
}
