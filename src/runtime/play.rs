use std::io::{self, BufRead, Write};

use anyhow::{Context, bail};
use tracing::info;

use segue::config::Settings;
use segue::import::ImportCoordinator;
use segue::library::PlaylistId;
use segue::playback::{PlayMode, PlaybackSnapshot, RodioTransport, SessionHandle, SessionState};

use super::commands::format_ms;

const HELP: &str =
    "n next | p previous | pause | resume | seek <secs> | mode [mode] | status | stop | q";

pub fn run(
    coord: &ImportCoordinator,
    settings: &Settings,
    id: &PlaylistId,
    mode: Option<PlayMode>,
) -> anyhow::Result<()> {
    let playlist = coord.playlist(id)?;
    let tracks = coord.playlist_tracks(id)?;
    let Some(first) = tracks.first().cloned() else {
        bail!("playlist {} is empty", playlist.name);
    };

    let mut playback = settings.playback.clone();
    if let Some(mode) = mode {
        playback.play_mode = mode;
    }
    let session = SessionHandle::spawn(RodioTransport::open_default, &playback)
        .context("failed to start playback worker")?;
    info!(playlist = %id, tracks = tracks.len(), "starting playback");
    session.play_track(first, tracks, Some(id.clone()))?;

    println!("{} - {HELP}", playlist.name);
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("failed to read command")?;
        let mut words = line.split_whitespace();
        match (words.next(), words.next()) {
            (None, _) => {}
            (Some("q" | "quit"), _) => break,
            (Some("n" | "next"), _) => session.next()?,
            (Some("p" | "prev" | "previous"), _) => session.previous()?,
            (Some("pause"), _) => session.pause()?,
            (Some("resume" | "play"), _) => session.resume()?,
            (Some("stop"), _) => session.stop()?,
            (Some("seek"), Some(secs)) => match secs.parse::<f64>() {
                Ok(s) if s >= 0.0 => session.seek((s * 1000.0) as u64)?,
                _ => println!("seek takes a number of seconds"),
            },
            (Some("mode"), None) => {
                let mode = session.snapshot().play_mode.cycle();
                session.set_play_mode(mode)?;
                println!("mode: {mode:?}");
            }
            (Some("mode"), Some(name)) => match PlayMode::parse(name) {
                Some(m) => session.set_play_mode(m)?,
                None => println!("modes: sequential, repeat-all, repeat-one, shuffle"),
            },
            (Some("status" | "s"), _) => print_status(&session.snapshot()),
            _ => println!("{HELP}"),
        }
        io::stdout().flush().ok();
    }

    session.shutdown();
    Ok(())
}

fn print_status(s: &PlaybackSnapshot) {
    let track = s
        .current_track
        .as_ref()
        .map(|t| t.display_name())
        .unwrap_or_else(|| "-".to_string());
    let index = s
        .current_index
        .map(|i| format!("{}/{}", i + 1, s.playlist.len()))
        .unwrap_or_default();
    println!(
        "{:?} {index} {track} {} / {} [{:?}]",
        s.state,
        format_ms(s.position_ms),
        format_ms(s.duration_ms),
        s.play_mode
    );
    if s.state == SessionState::Error {
        if let Some(err) = &s.last_error {
            println!("error: {err}");
        }
    }
    if !s.transport_bound {
        println!("no audio output");
    }
}
