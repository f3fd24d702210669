//! Practical helpers: opening websites and playing local music
//!
//! These are reached from the command line only; spoken commands always go
//! to the language model.

use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;

use crate::voice::AudioPlayback;
use crate::{Error, Result};

/// Sites that can be named instead of given as a URL
const KNOWN_SITES: &[(&str, &str)] = &[
    ("youtube", "https://www.youtube.com"),
    ("google", "https://www.google.com"),
    ("stackoverflow", "https://stackoverflow.com"),
];

/// Extensions recognized as music, compared case-insensitively
const MUSIC_EXTENSIONS: &[&str] = &["mp3", "wav", "flac"];

/// Map a known site name to its URL; anything else is returned as given
#[must_use]
pub fn resolve_site(site: &str) -> String {
    let key = site.trim().to_lowercase();
    KNOWN_SITES
        .iter()
        .find(|(name, _)| *name == key)
        .map_or_else(|| site.trim().to_string(), |(_, url)| (*url).to_string())
}

/// Open `site` in the default browser
///
/// Returns the URL that was opened.
///
/// # Errors
///
/// Returns error if no platform opener is installed or it fails to start
pub fn open_website(site: &str) -> Result<String> {
    let url = resolve_site(site);
    let (program, args) = platform_opener();

    let opener = which::which(program)
        .map_err(|e| Error::Practical(format!("cannot open {url}: {program} not found ({e})")))?;

    std::process::Command::new(opener)
        .args(args)
        .arg(&url)
        .spawn()
        .map_err(|e| Error::Practical(format!("could not open {url}: {e}")))?;

    tracing::info!(url, "opened website");
    Ok(url)
}

const fn platform_opener() -> (&'static str, &'static [&'static str]) {
    if cfg!(target_os = "macos") {
        ("open", &[])
    } else if cfg!(target_os = "windows") {
        ("cmd", &["/C", "start", ""])
    } else {
        ("xdg-open", &[])
    }
}

/// List music files in `dir`, sorted by file name
///
/// # Errors
///
/// Returns error if the directory is missing or unreadable
pub fn list_music(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::Practical(format!(
            "music directory not found: {}",
            dir.display()
        )));
    }

    let mut tracks: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_music(path))
        .collect();

    tracks.sort();
    Ok(tracks)
}

fn is_music(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| MUSIC_EXTENSIONS.iter().any(|m| ext.eq_ignore_ascii_case(m)))
}

/// Pick a track: the first whose file name contains `name`
/// (case-insensitive), or a random one when no name is given
///
/// # Errors
///
/// Returns error if there are no tracks or none matches `name`
pub fn select_track(tracks: &[PathBuf], name: Option<&str>) -> Result<PathBuf> {
    if tracks.is_empty() {
        return Err(Error::Practical("no music files found".to_string()));
    }

    let selected = match name {
        Some(name) => {
            let needle = name.to_lowercase();
            tracks.iter().find(|track| {
                track
                    .file_name()
                    .and_then(|f| f.to_str())
                    .is_some_and(|f| f.to_lowercase().contains(&needle))
            })
        }
        None => tracks.choose(&mut rand::thread_rng()),
    };

    selected
        .cloned()
        .ok_or_else(|| Error::Practical(format!("track {} not found", name.unwrap_or_default())))
}

/// Select a track from `dir` and play it to the end
///
/// Returns the path that was played.
///
/// # Errors
///
/// Returns error if no track can be selected or it cannot be decoded
/// (FLAC files are listed but not playable)
#[allow(clippy::future_not_send)]
pub async fn play_music(
    dir: &Path,
    name: Option<&str>,
    playback: &mut AudioPlayback,
) -> Result<PathBuf> {
    let tracks = list_music(dir)?;
    let track = select_track(&tracks, name)?;

    tracing::info!(track = %track.display(), "now playing");
    playback.play_file(&track).await?;

    Ok(track)
}
