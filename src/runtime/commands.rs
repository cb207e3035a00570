use std::path::Path;

use anyhow::Context;

use segue::config::Settings;
use segue::import::ImportCoordinator;
use segue::library::PlaylistId;

pub fn print_config(settings: &Settings) -> anyhow::Result<()> {
    let rendered = settings.to_toml().context("failed to render settings")?;
    print!("{rendered}");
    Ok(())
}

pub fn import(coord: &ImportCoordinator, dir: &Path, name: Option<&str>) -> anyhow::Result<()> {
    let id = coord
        .add_folder(dir, name)
        .with_context(|| format!("import of {} failed", dir.display()))?;
    let tracks = coord.playlist_tracks(&id)?;
    println!("{id}\t{} tracks", tracks.len());
    Ok(())
}

pub fn refresh(coord: &ImportCoordinator, id: &PlaylistId) -> anyhow::Result<()> {
    let count = coord
        .refresh_folder(id)
        .with_context(|| format!("refresh of {id} failed"))?;
    println!("{id}\t{count} tracks");
    Ok(())
}

pub fn list_playlists(coord: &ImportCoordinator) -> anyhow::Result<()> {
    for p in coord.playlists()? {
        let source = p
            .source_folder
            .as_deref()
            .map(|f| f.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}\t{}\t{}\t{}",
            p.id,
            p.name,
            source,
            p.updated_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

pub fn show(coord: &ImportCoordinator, id: &PlaylistId) -> anyhow::Result<()> {
    let playlist = coord.playlist(id)?;
    println!("{} ({})", playlist.name, playlist.id);
    for (i, t) in coord.playlist_tracks(id)?.iter().enumerate() {
        println!("{:>4}  {}  [{}]", i + 1, t.display_name(), format_ms(t.duration_ms));
    }
    Ok(())
}

pub fn delete(coord: &ImportCoordinator, id: &PlaylistId) -> anyhow::Result<()> {
    if coord.delete_playlist(id)? {
        println!("deleted {id}");
    } else {
        println!("no playlist {id}");
    }
    Ok(())
}

/// `m:ss`, as shown next to tracks and in the play status line.
pub fn format_ms(ms: u64) -> String {
    let secs = ms / 1000;
    format!("{}:{:02}", secs / 60, secs % 60)
}
