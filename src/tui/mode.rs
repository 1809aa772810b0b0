// state local to the input thread: which scene action (if any) is waiting for
// its slot digit

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SceneArm {
    Save,
    Load,
    Clear,
}

#[derive(Clone, Debug, Default)]
pub struct TuiState {
    // press v/b/n once = armed, the next digit fires it; any other key disarms
    pub scene_arm: Option<SceneArm>,
}
