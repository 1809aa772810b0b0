use std::time::{Duration, Instant};

pub const MIN_BPM: i32 = 40;
pub const MAX_BPM: i32 = 260;
pub const DEFAULT_STEPS_PER_BEAT: u32 = 4; // sixteenth notes

/// Turns a tempo into a fixed step length. There's no timer in here, the loop
/// asks for the current step duration every iteration so tempo changes land on
/// the very next step.
#[derive(Clone, Debug)]
pub struct Clock {
    bpm: u32,
    steps_per_beat: u32,
    step_seconds: f64,
}

impl Clock {
    pub fn new(bpm: i32, steps_per_beat: u32) -> Self {
        let mut clock = Self {
            bpm: 0,
            steps_per_beat: 1,
            step_seconds: 0.0,
        };
        clock.configure(bpm, steps_per_beat);
        clock
    }

    pub fn configure(&mut self, bpm: i32, steps_per_beat: u32) {
        self.steps_per_beat = steps_per_beat.max(1);
        self.set_bpm(bpm);
    }

    // clamps rather than rejects, the performer can mash the tempo keys all they want
    pub fn set_bpm(&mut self, bpm: i32) {
        self.bpm = bpm.clamp(MIN_BPM, MAX_BPM) as u32;
        let seconds_per_beat = 60.0 / self.bpm as f64;
        self.step_seconds = seconds_per_beat / self.steps_per_beat as f64;
    }

    pub fn nudge_bpm(&mut self, delta: i32) {
        self.set_bpm(self.bpm as i32 + delta);
    }

    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    #[cfg(test)]
    pub fn step_seconds(&self) -> f64 {
        self.step_seconds
    }

    pub fn current_step_duration(&self) -> Duration {
        Duration::from_secs_f64(self.step_seconds)
    }

    /// What's left of this step's budget once processing that began at `started`
    /// has run until `now`. Overruns clamp to zero, we never try to catch up.
    pub fn remaining_budget(&self, started: Instant, now: Instant) -> Duration {
        self.current_step_duration()
            .saturating_sub(now.saturating_duration_since(started))
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(174, DEFAULT_STEPS_PER_BEAT)
    }
}
