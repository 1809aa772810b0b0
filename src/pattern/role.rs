use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What a track does musically. Closed set, every role has its own generator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Kick,
    Bass,
    Hats,
    Perc,
    Stab,
    Lead,
    Pad,
    Fx,
    Raw,
}

/// Setup defaults a fresh track of a given role starts from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RoleDefaults {
    pub root: i32,
    pub scale: &'static str,
    pub density: f32,
}

impl Role {
    pub const ALL: [Role; 9] = [
        Role::Kick,
        Role::Bass,
        Role::Hats,
        Role::Perc,
        Role::Stab,
        Role::Lead,
        Role::Pad,
        Role::Fx,
        Role::Raw,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Role::Kick => "kick",
            Role::Bass => "bass",
            Role::Hats => "hats",
            Role::Perc => "perc",
            Role::Stab => "stab",
            Role::Lead => "lead",
            Role::Pad => "pad",
            Role::Fx => "fx",
            Role::Raw => "raw",
        }
    }

    pub fn defaults(self) -> RoleDefaults {
        match self {
            Role::Kick => RoleDefaults { root: 36, scale: "darktech", density: 1.0 },
            Role::Bass => RoleDefaults { root: 42, scale: "darktech", density: 0.8 },
            Role::Hats | Role::Perc => RoleDefaults { root: 70, scale: "darktech", density: 0.6 },
            Role::Stab | Role::Lead => RoleDefaults { root: 60, scale: "phrygian", density: 0.3 },
            Role::Pad | Role::Fx | Role::Raw => {
                RoleDefaults { root: 48, scale: "darktech", density: 0.4 }
            }
        }
    }

    // velocity before the energy offset is applied
    pub fn base_velocity(self) -> i32 {
        match self {
            Role::Kick => 120,
            Role::Bass => 112,
            Role::Hats | Role::Perc => 70,
            Role::Stab | Role::Lead => 90,
            Role::Pad => 80,
            Role::Fx | Role::Raw => 90,
        }
    }

    /// Live velocity: role base shifted by 5 per energy level away from 3,
    /// doubled for hats/perc so the grid breathes with the energy knob.
    pub fn velocity(self, energy: u8) -> u8 {
        let mut offset = (energy as i32 - 3) * 5;
        if matches!(self, Role::Hats | Role::Perc) {
            offset *= 2;
        }
        (self.base_velocity() + offset).clamp(1, 127) as u8
    }

    pub fn note_length(self) -> Duration {
        let ms = match self {
            Role::Kick => 40,
            Role::Bass => 90,
            Role::Hats | Role::Perc => 20,
            Role::Stab | Role::Lead => 110,
            Role::Pad => 250,
            Role::Fx | Role::Raw => 80,
        };
        Duration::from_millis(ms)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Role::ALL
            .into_iter()
            .find(|r| r.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown role '{s}'"))
    }
}
