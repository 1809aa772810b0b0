// Nine scene slots: snapshots of the dynamic bits of a running session
// (tempo, energy, per-track flags and density/root), recallable mid-jam.
// Tracks are matched by list position only, never by name or role.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::Clock;
use crate::pattern::TrackConfig;
use crate::pipeline::session::{TrackRuntime, MAX_ENERGY, MIN_ENERGY};

pub const NUM_SCENES: usize = 9;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SceneError {
    #[error("scene slot {0} is out of range (1-9)")]
    InvalidSlot(u8),
    #[error("scene slot {0} is empty")]
    Empty(u8),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneTrack {
    pub muted: bool,
    pub solo: bool,
    pub locked: bool,
    pub density: Option<f32>, // None = leave whatever is live
    pub root: Option<i32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub bpm: Option<u32>,
    pub energy: u8,
    pub tracks: Vec<SceneTrack>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SceneManager {
    slots: [Option<Scene>; NUM_SCENES],
    #[serde(skip)]
    current: Option<u8>,
}

fn index(slot: u8) -> Result<usize, SceneError> {
    if (1..=NUM_SCENES as u8).contains(&slot) {
        Ok(slot as usize - 1)
    } else {
        Err(SceneError::InvalidSlot(slot))
    }
}

impl SceneManager {
    /// Overwrites whatever was in `slot`.
    pub fn save<'a, I>(
        &mut self,
        slot: u8,
        bpm: u32,
        energy: u8,
        states: &[TrackRuntime],
        configs: I,
    ) -> Result<(), SceneError>
    where
        I: IntoIterator<Item = &'a TrackConfig>,
    {
        let idx = index(slot)?;
        let tracks = states
            .iter()
            .zip(configs)
            .map(|(state, cfg)| SceneTrack {
                muted: state.muted,
                solo: state.solo,
                locked: state.locked,
                density: Some(cfg.density),
                root: Some(cfg.root),
            })
            .collect();
        self.slots[idx] = Some(Scene {
            bpm: Some(bpm),
            energy,
            tracks,
        });
        tracing::info!(slot, "scene saved");
        Ok(())
    }

    /// Applies a saved scene onto the live session. Only tracks present on both
    /// sides are touched; unset density/root leave the live value alone.
    pub fn load<'a, I>(
        &mut self,
        slot: u8,
        clock: &mut Clock,
        energy: &mut u8,
        states: &mut [TrackRuntime],
        configs: I,
    ) -> Result<(), SceneError>
    where
        I: IntoIterator<Item = &'a mut TrackConfig>,
    {
        let idx = index(slot)?;
        let scene = self.slots[idx].as_ref().ok_or(SceneError::Empty(slot))?;

        if let Some(bpm) = scene.bpm {
            clock.set_bpm(bpm as i32);
        }
        *energy = scene.energy.clamp(MIN_ENERGY, MAX_ENERGY);

        for ((saved, state), cfg) in scene.tracks.iter().zip(states.iter_mut()).zip(configs) {
            state.muted = saved.muted;
            state.solo = saved.solo;
            state.locked = saved.locked;
            if let Some(density) = saved.density {
                cfg.set_density(density);
            }
            if let Some(root) = saved.root {
                cfg.set_root(root);
            }
        }
        self.current = Some(slot);
        tracing::info!(slot, "scene loaded");
        Ok(())
    }

    pub fn clear(&mut self, slot: u8) -> bool {
        let Ok(idx) = index(slot) else {
            return false;
        };
        let existed = self.slots[idx].take().is_some();
        if existed && self.current == Some(slot) {
            self.current = None;
        }
        existed
    }

    pub fn has(&self, slot: u8) -> bool {
        self.get(slot).is_some()
    }

    pub fn get(&self, slot: u8) -> Option<&Scene> {
        index(slot).ok().and_then(|i| self.slots[i].as_ref())
    }

    pub fn current(&self) -> Option<u8> {
        self.current
    }

    // terse digest for the status row, e.g. "BPM:174 | E:3 | M:1"
    pub fn summary(&self, slot: u8) -> String {
        let Some(scene) = self.get(slot) else {
            return "empty".to_string();
        };
        let mut parts = Vec::new();
        if let Some(bpm) = scene.bpm {
            parts.push(format!("BPM:{bpm}"));
        }
        parts.push(format!("E:{}", scene.energy));
        let muted = scene.tracks.iter().filter(|t| t.muted).count();
        let solo = scene.tracks.iter().filter(|t| t.solo).count();
        let locked = scene.tracks.iter().filter(|t| t.locked).count();
        if muted > 0 {
            parts.push(format!("M:{muted}"));
        }
        if solo > 0 {
            parts.push(format!("S:{solo}"));
        }
        if locked > 0 {
            parts.push(format!("L:{locked}"));
        }
        parts.join(" | ")
    }

    #[cfg(test)]
    pub fn insert(&mut self, slot: u8, scene: Scene) -> Result<(), SceneError> {
        let idx = index(slot)?;
        self.slots[idx] = Some(scene);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::Role;

    fn cfgs() -> Vec<TrackConfig> {
        [Role::Kick, Role::Bass, Role::Hats, Role::Lead]
            .into_iter()
            .map(|role| {
                let d = role.defaults();
                TrackConfig {
                    name: role.label().into(),
                    role,
                    root: d.root,
                    scale: d.scale.into(),
                    density: d.density,
                    steps: 16,
                    style: "dark_174".into(),
                }
            })
            .collect()
    }

    #[test]
    fn save_then_load_restores_everything() {
        let mut scenes = SceneManager::default();
        let mut clock = Clock::new(174, 4);
        let mut energy = 3;
        let mut states = vec![TrackRuntime::default(); 4];
        states[1].muted = true;
        states[3].locked = true;
        let mut configs = cfgs();
        let saved_cfgs = configs.clone();
        let saved_states = states.clone();

        scenes.save(3, clock.bpm(), energy, &states, &configs).unwrap();

        clock.set_bpm(120);
        energy = 5;
        configs[0].set_density(0.2);
        configs[2].set_root(80);
        states[1].muted = false;
        states[0].solo = true;

        scenes
            .load(3, &mut clock, &mut energy, &mut states, configs.iter_mut())
            .unwrap();
        assert_eq!(clock.bpm(), 174);
        assert_eq!(energy, 3);
        assert_eq!(states, saved_states);
        assert_eq!(configs, saved_cfgs);
        assert_eq!(scenes.current(), Some(3));
    }

    #[test]
    fn unset_fields_leave_live_values() {
        let mut scenes = SceneManager::default();
        scenes
            .insert(
                1,
                Scene {
                    bpm: None,
                    energy: 2,
                    tracks: vec![
                        SceneTrack { density: Some(0.5), ..Default::default() },
                        SceneTrack { muted: true, root: None, density: None, ..Default::default() },
                    ],
                },
            )
            .unwrap();
        let mut clock = Clock::new(180, 4);
        let mut energy = 4;
        let mut states = vec![TrackRuntime::default(); 4];
        states[3].locked = true;
        let mut configs = cfgs();
        scenes
            .load(1, &mut clock, &mut energy, &mut states, configs.iter_mut())
            .unwrap();
        assert_eq!(clock.bpm(), 180);
        assert_eq!(energy, 2);
        assert_eq!(configs[0].density, 0.5);
        assert_eq!(configs[0].root, 36);
        assert_eq!(configs[1].density, 0.8);
        assert!(states[1].muted);
        // tracks beyond the scene's list are untouched
        assert!(states[3].locked);
    }

    #[test]
    fn bad_or_empty_slots_are_reported() {
        let mut scenes = SceneManager::default();
        let mut clock = Clock::default();
        let mut energy = 3;
        let mut states = vec![TrackRuntime::default(); 4];
        let mut configs = cfgs();
        assert_eq!(
            scenes.load(4, &mut clock, &mut energy, &mut states, configs.iter_mut()),
            Err(SceneError::Empty(4))
        );
        assert_eq!(
            scenes.load(0, &mut clock, &mut energy, &mut states, configs.iter_mut()),
            Err(SceneError::InvalidSlot(0))
        );
        assert_eq!(
            scenes.save(10, 174, 3, &states, &configs),
            Err(SceneError::InvalidSlot(10))
        );
    }

    #[test]
    fn clear_and_has() {
        let mut scenes = SceneManager::default();
        let states = vec![TrackRuntime::default(); 4];
        let configs = cfgs();
        scenes.save(9, 174, 3, &states, &configs).unwrap();
        assert!(scenes.has(9));
        assert!(!scenes.has(8));
        assert!(scenes.clear(9));
        assert!(!scenes.clear(9));
        assert!(!scenes.has(9));
        assert!(!scenes.clear(42));
    }

    #[test]
    fn clearing_the_current_scene_forgets_it() {
        let mut scenes = SceneManager::default();
        let mut states = vec![TrackRuntime::default(); 4];
        let mut configs = cfgs();
        scenes.save(2, 174, 3, &states, &configs).unwrap();
        let mut clock = Clock::default();
        let mut energy = 3;
        scenes
            .load(2, &mut clock, &mut energy, &mut states, configs.iter_mut())
            .unwrap();
        scenes.clear(2);
        assert_eq!(scenes.current(), None);
    }

    #[test]
    fn summary_counts_flags() {
        let mut scenes = SceneManager::default();
        let mut states = vec![TrackRuntime::default(); 4];
        states[0].muted = true;
        states[1].muted = true;
        states[2].solo = true;
        scenes.save(5, 172, 4, &states, &cfgs()).unwrap();
        assert_eq!(scenes.summary(5), "BPM:172 | E:4 | M:2 | S:1");
        assert_eq!(scenes.summary(6), "empty");
    }
}
