mod clock;
mod middle;
mod midi;
mod pattern;
mod pipeline;
mod shared;
mod tui;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use crossbeam_channel::TryRecvError;
use crossterm::terminal;
use fastrand::Rng;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tracing_subscriber::EnvFilter;

use middle::Middle;
use midi::MidiPort;
use pattern::PatternEngine;
use pipeline::persistence;
use pipeline::session::{SessionConfig, THEMES};
use shared::{Flow, InputEvent};

const INPUT_QUEUE: usize = 64;

/// Live generative step sequencer for MIDI gear.
#[derive(Parser, Debug)]
#[command(name = "darkmaquina", version)]
struct Cli {
    /// Where .darkmaquina/ and exported loops live
    #[arg(long, default_value = ".")]
    project_dir: PathBuf,

    /// Theme for a fresh quick setup (dark_174, makina_180, industrial_172)
    #[arg(long)]
    theme: Option<String>,

    /// Start from a saved profile instead of the last session
    #[arg(long, conflicts_with = "theme")]
    profile: Option<String>,

    /// Save the starting session as a profile under this name
    #[arg(long)]
    save_profile: Option<String>,

    /// Random seed; the same seed and the same moves give the same jam
    #[arg(long)]
    seed: Option<u64>,

    /// Output port for every track (exact name or substring)
    #[arg(long)]
    port: Option<String>,

    /// Starting energy, 1-5
    #[arg(long)]
    energy: Option<u8>,

    /// Delete a saved profile and exit
    #[arg(long, value_name = "NAME")]
    delete_profile: Option<String>,

    /// List MIDI output ports, profiles and themes, then exit
    #[arg(long)]
    list_ports: bool,

    /// Render this many bars (at most 256) to a MIDI file and exit, no ports needed
    #[arg(long, value_name = "BARS")]
    export: Option<u32>,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let project_dir = cli.project_dir.clone();
    init_logging(&project_dir)?;

    if cli.list_ports {
        return list(&project_dir);
    }
    if let Some(name) = &cli.delete_profile {
        anyhow::ensure!(persistence::delete_profile(&project_dir, name), "no profile named '{name}'");
        println!("deleted profile '{name}'");
        return Ok(());
    }

    let session = build_session(&cli, &project_dir)?;
    if let Some(name) = &cli.save_profile {
        persistence::save_profile(&project_dir, name, &session)?;
        println!("saved profile '{name}'");
    }

    let seed = cli.seed.unwrap_or_else(|| fastrand::u64(..));
    tracing::info!(seed, theme = %session.theme, tracks = session.tracks.len(), "session ready");

    if let Some(bars) = cli.export {
        return export_headless(&session, bars, seed, &project_dir);
    }

    // endpoints are opened before the terminal goes raw, a bad port stops us here
    let mut sinks = Vec::with_capacity(session.tracks.len());
    for track in &session.tracks {
        let port = MidiPort::open(&track.port_name)
            .with_context(|| format!("opening output for track {}", track.name))?;
        tracing::info!(track = %track.name, port = port.name(), "track routed");
        sinks.push(port);
    }

    let scenes = persistence::load_scenes(&project_dir).unwrap_or_default();
    let mut middle = Middle::new(session, sinks, scenes, seed, project_dir.join("out"))?;

    terminal::enable_raw_mode()?;
    let _ = crossterm::execute!(
        std::io::stdout(),
        crossterm::event::PushKeyboardEnhancementFlags(
            crossterm::event::KeyboardEnhancementFlags::REPORT_EVENT_TYPES
        )
    );
    let _guard = RawModeGuard; // auto drops when out of scope

    let backend = CrosstermBackend::new(std::io::stdout());
    let mut term = Terminal::new(backend)?;
    term.clear()?;

    let (tx, rx) = crossbeam_channel::bounded::<InputEvent>(INPUT_QUEUE);
    let _input = tui::input::spawn_input_thread(tx)?;

    loop {
        let started = Instant::now();
        // at most one command per step keeps the step cost bounded
        let event = match rx.try_recv() {
            Ok(ev) => Some(ev),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(InputEvent::Quit),
        };
        if middle.iterate(event, started) == Flow::Quit {
            break;
        }

        let ds = middle.display_state();
        term.draw(|frame| tui::view::render(frame, frame.area(), &ds))?;

        let rest = middle.clock().remaining_budget(started, Instant::now());
        if !rest.is_zero() {
            std::thread::sleep(rest);
        }
    }

    middle.shutdown();
    if let Err(e) = persistence::save_last_session(&project_dir, &middle.session_snapshot()) {
        tracing::warn!(error = %e, "could not save session");
    }
    if let Err(e) = persistence::save_scenes(&project_dir, middle.scenes()) {
        tracing::warn!(error = %e, "could not save scenes");
    }
    drop(term);
    Ok(())
}

// Logs go to a file; the terminal belongs to the UI.
fn init_logging(project_dir: &Path) -> anyhow::Result<()> {
    let dir = persistence::app_dir(project_dir);
    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    let file = std::fs::File::create(dir.join(persistence::LOG_FILE))?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(file))
        .init();
    Ok(())
}

// profile > last session > quick setup, then CLI overrides on top
fn build_session(cli: &Cli, project_dir: &Path) -> anyhow::Result<SessionConfig> {
    let mut session = match (&cli.profile, &cli.theme) {
        // clap rejects --profile together with --theme
        (Some(name), _) => persistence::load_profile(project_dir, name)
            .with_context(|| format!("no readable profile named '{name}'"))?,
        (None, Some(theme)) => SessionConfig::quick_setup(theme, ""),
        (None, None) => persistence::load_last_session(project_dir)
            .unwrap_or_else(|| SessionConfig::quick_setup(THEMES[0].key, "")),
    };
    if let Some(port) = &cli.port {
        for track in &mut session.tracks {
            track.port_name = port.clone();
        }
    }
    if let Some(energy) = cli.energy {
        session.energy = energy;
    }
    anyhow::ensure!(!session.tracks.is_empty(), "session has no tracks");
    Ok(session.sanitized())
}

fn export_headless(session: &SessionConfig, bars: u32, seed: u64, project_dir: &Path) -> anyhow::Result<()> {
    let mut engines: Vec<PatternEngine> = session
        .track_configs()
        .into_iter()
        .map(PatternEngine::new)
        .collect();
    let mut rng = Rng::with_seed(seed);
    let path = pipeline::export::export_loop(
        &mut engines,
        bars,
        session.steps,
        session.bpm,
        session.energy,
        &mut rng,
        &project_dir.join("out"),
    )?;
    println!("{}", path.display());
    Ok(())
}

fn list(project_dir: &Path) -> anyhow::Result<()> {
    println!("MIDI outputs:");
    let ports = midi::available_ports()?;
    if ports.is_empty() {
        println!("  (none)");
    }
    for (i, p) in ports.iter().enumerate() {
        println!("  {}. {}", i + 1, p);
    }
    println!("Themes:");
    for t in &THEMES {
        println!("  {} - {} ({} BPM, energy {})", t.key, t.label, t.bpm, t.energy);
    }
    println!("Scales: {}", pattern::scale::names().collect::<Vec<_>>().join(", "));
    println!("Pattern packs: {}", pattern::pack::styles().collect::<Vec<_>>().join(", "));
    println!("Profiles:");
    for name in persistence::list_profiles(project_dir) {
        println!("  {name}");
    }
    Ok(())
}

struct RawModeGuard;
impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = crossterm::execute!(
            std::io::stdout(),
            crossterm::event::PopKeyboardEnhancementFlags
        );
        let _ = terminal::disable_raw_mode();
    }
}
