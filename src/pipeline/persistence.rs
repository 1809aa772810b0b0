// to be called on startup and quit; saves the last session, scenes and named
// profiles so the next jam picks up where this one stopped
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::pipeline::scenes::SceneManager;
use crate::pipeline::session::SessionConfig;

pub const APP_DIR: &str = ".darkmaquina";
const SESSION_FILE: &str = "last_session.json";
const SCENES_FILE: &str = "scenes.json";
const PROFILES_DIR: &str = "profiles";
pub const LOG_FILE: &str = "darkmaquina.log";

// <project_dir>/.darkmaquina/
pub fn app_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(APP_DIR)
}

fn profile_path(project_dir: &Path, name: &str) -> PathBuf {
    app_dir(project_dir).join(PROFILES_DIR).join(format!("{name}.json"))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let data = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&data) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable file");
            None
        }
    }
}

// Write JSON, making the parent folders if they don't exist already
fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

pub fn load_last_session(project_dir: &Path) -> Option<SessionConfig> {
    read_json::<SessionConfig>(&app_dir(project_dir).join(SESSION_FILE)).map(SessionConfig::sanitized)
}

pub fn save_last_session(project_dir: &Path, session: &SessionConfig) -> anyhow::Result<()> {
    write_json(&app_dir(project_dir).join(SESSION_FILE), session)
}

pub fn load_scenes(project_dir: &Path) -> Option<SceneManager> {
    read_json(&app_dir(project_dir).join(SCENES_FILE))
}

pub fn save_scenes(project_dir: &Path, scenes: &SceneManager) -> anyhow::Result<()> {
    write_json(&app_dir(project_dir).join(SCENES_FILE), scenes)
}

pub fn load_profile(project_dir: &Path, name: &str) -> Option<SessionConfig> {
    read_json::<SessionConfig>(&profile_path(project_dir, name)).map(SessionConfig::sanitized)
}

pub fn save_profile(project_dir: &Path, name: &str, session: &SessionConfig) -> anyhow::Result<()> {
    write_json(&profile_path(project_dir, name), session)
}

pub fn list_profiles(project_dir: &Path) -> Vec<String> {
    let dir = app_dir(project_dir).join(PROFILES_DIR);
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .collect();
    names.sort();
    names
}

pub fn delete_profile(project_dir: &Path, name: &str) -> bool {
    std::fs::remove_file(profile_path(project_dir, name)).is_ok()
}
