use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};

use segue::config::Settings;
use segue::import::ImportCoordinator;
use segue::library::{LibraryScanner, PlaylistId};
use segue::logging;
use segue::playback::PlayMode;
use segue::store::{LibraryStore, MemoryStore};

mod commands;
mod play;

const USAGE: &str = "\
usage: segue <command> [args]

commands:
  import <dir> [name]   scan a folder into a new playlist
  refresh <id>          rescan a folder-backed playlist
  playlists             list playlists, most recently updated first
  show <id>             list a playlist's tracks
  delete <id>           delete a playlist (tracks stay in the library)
  play <id> [mode]      play a playlist interactively
  config                print the effective configuration";

pub fn run() -> anyhow::Result<()> {
    let settings = load_settings();
    logging::init(&settings.logging);

    let args: Vec<String> = env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        println!("{USAGE}");
        return Ok(());
    };

    match (command.as_str(), rest) {
        ("config", []) => commands::print_config(&settings),
        ("import", [dir]) => commands::import(&coordinator(&settings)?, Path::new(dir), None),
        ("import", [dir, name]) => {
            commands::import(&coordinator(&settings)?, Path::new(dir), Some(name.as_str()))
        }
        ("refresh", [id]) => commands::refresh(&coordinator(&settings)?, &playlist_id(id)),
        ("playlists", []) => commands::list_playlists(&coordinator(&settings)?),
        ("show", [id]) => commands::show(&coordinator(&settings)?, &playlist_id(id)),
        ("delete", [id]) => commands::delete(&coordinator(&settings)?, &playlist_id(id)),
        ("play", [id]) => play::run(&coordinator(&settings)?, &settings, &playlist_id(id), None),
        ("play", [id, mode]) => {
            let Some(mode) = PlayMode::parse(mode) else {
                bail!("unknown play mode {mode:?}");
            };
            play::run(&coordinator(&settings)?, &settings, &playlist_id(id), Some(mode))
        }
        ("help" | "-h" | "--help", _) => {
            println!("{USAGE}");
            Ok(())
        }
        _ => bail!("unrecognised arguments: {}\n\n{USAGE}", args.join(" ")),
    }
}

fn playlist_id(arg: &str) -> PlaylistId {
    PlaylistId::from(arg.trim())
}

fn coordinator(settings: &Settings) -> anyhow::Result<ImportCoordinator> {
    let path: PathBuf = settings
        .library_path()
        .context("cannot determine where to keep the library; set storage.library_path")?;
    let store = MemoryStore::open(&path)
        .with_context(|| format!("failed to open library at {}", path.display()))?;
    let store: Arc<dyn LibraryStore> = Arc::new(store);
    let scanner = LibraryScanner::local(&settings.library);
    Ok(ImportCoordinator::new(store, scanner, settings.import.clone()))
}

/// Config is optional: a broken file or invalid values fall back to defaults.
/// Logging is not up yet at this point, hence stderr.
fn load_settings() -> Settings {
    Settings::load()
        .map_err(|e| format!("failed to load config: {e}"))
        .and_then(|s| match s.validate() {
            Ok(()) => Ok(s),
            Err(msg) => Err(format!("invalid config: {msg}")),
        })
        .unwrap_or_else(|msg| {
            eprintln!("segue: {msg}; using defaults");
            Settings::default()
        })
}
