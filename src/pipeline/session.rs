// Session-level data: what gets saved as a profile, plus the runtime flags
// that live only while jamming.

use serde::{Deserialize, Serialize};

use crate::clock::{MAX_BPM, MIN_BPM};
use crate::pattern::{Role, TrackConfig, MAX_ROOT, MIN_ROOT};

pub const MIN_ENERGY: u8 = 1;
pub const MAX_ENERGY: u8 = 5;
pub const MIN_STEPS: usize = 4;
pub const MAX_STEPS: usize = 64;
pub const MAX_TRACKS: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Theme {
    pub key: &'static str,
    pub label: &'static str,
    pub bpm: u32,
    pub steps: usize,
    pub energy: u8,
}

pub const THEMES: [Theme; 3] = [
    Theme { key: "dark_174", label: "Dark 174", bpm: 174, steps: 16, energy: 3 },
    Theme { key: "makina_180", label: "Makina 180", bpm: 180, steps: 16, energy: 4 },
    Theme { key: "industrial_172", label: "Industrial 172", bpm: 172, steps: 16, energy: 4 },
];

pub fn theme(key: &str) -> Option<&'static Theme> {
    THEMES.iter().find(|t| t.key == key)
}

/// One track as set up before the jam starts (the profile shape).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackSetup {
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub port_name: String,
    pub root: i32,
    pub scale: String,
    pub density: f32,
}

impl TrackSetup {
    pub fn for_role(name: &str, role: Role, port_name: &str) -> Self {
        let d = role.defaults();
        Self {
            name: name.to_string(),
            role,
            port_name: port_name.to_string(),
            root: d.root,
            scale: d.scale.to_string(),
            density: d.density,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub bpm: u32,
    pub steps: usize,
    pub energy: u8,
    #[serde(default = "default_theme")]
    pub theme: String,
    pub tracks: Vec<TrackSetup>,
}

fn default_theme() -> String {
    "custom".to_string()
}

impl SessionConfig {
    /// The four-track kick/bass/hats/lead rig everything starts from.
    pub fn quick_setup(theme_key: &str, port_name: &str) -> Self {
        let t = theme(theme_key).unwrap_or(&THEMES[0]);
        let tracks = vec![
            TrackSetup::for_role("KICK", Role::Kick, port_name),
            TrackSetup::for_role("BASS", Role::Bass, port_name),
            TrackSetup::for_role("HATS", Role::Hats, port_name),
            TrackSetup::for_role("LEAD", Role::Lead, port_name),
        ];
        Self {
            bpm: t.bpm,
            steps: t.steps,
            energy: t.energy,
            theme: theme_key.to_string(),
            tracks,
        }
    }

    // hand-edited profiles can say anything; pull it all back into range
    pub fn sanitized(mut self) -> Self {
        self.bpm = (self.bpm as i64).clamp(MIN_BPM as i64, MAX_BPM as i64) as u32;
        self.steps = self.steps.clamp(MIN_STEPS, MAX_STEPS);
        self.energy = self.energy.clamp(MIN_ENERGY, MAX_ENERGY);
        self.tracks.truncate(MAX_TRACKS);
        for t in &mut self.tracks {
            t.root = t.root.clamp(MIN_ROOT, MAX_ROOT);
            t.density = if t.density.is_finite() { t.density.clamp(0.0, 1.0) } else { 0.0 };
        }
        self
    }

    pub fn track_configs(&self) -> Vec<TrackConfig> {
        self.tracks
            .iter()
            .map(|t| TrackConfig {
                name: t.name.clone(),
                role: t.role,
                root: t.root,
                scale: t.scale.clone(),
                density: t.density,
                steps: self.steps,
                style: self.theme.clone(),
            })
            .collect()
    }
}

/// Per-track flags toggled live. Not part of the track's config.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRuntime {
    pub muted: bool,
    pub solo: bool,
    pub locked: bool,
}

impl TrackRuntime {
    pub fn label(&self) -> &'static str {
        if self.solo {
            "SOLO"
        } else if self.muted {
            "MUTED"
        } else {
            "ACTIVE"
        }
    }
}

/// Solo wins over everything: with any track soloed, only soloed tracks play,
/// whatever their mute flag says.
pub fn audible(states: &[TrackRuntime]) -> Vec<bool> {
    let any_solo = states.iter().any(|s| s.solo);
    states
        .iter()
        .map(|s| if any_solo { s.solo } else { !s.muted })
        .collect()
}
