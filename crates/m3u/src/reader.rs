use tracing::trace;

use crate::entry::{EXTINF_TAG, StreamEntry};

pub const PLAYLIST_HEADER: &str = "#EXTM3U";

/// Playlist-level tags that set request headers for every entry.
pub const GLOBAL_HEADER_TAGS: &[&str] = &["#EXT-X-USER-AGENT:", "#EXT-X-REFERER:", "#EXT-X-ORIGIN:"];

const DIRECTIVE_PREFIXES: &[&str] = &["#EXTVLCOPT:", "#KODIPROP:"];

/// The `#EXTM3U` line plus any playlist-wide header tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistHeader {
    pub line: String,
    pub directives: Vec<String>,
}

impl Default for PlaylistHeader {
    fn default() -> Self {
        Self {
            line: PLAYLIST_HEADER.to_string(),
            directives: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Playlist {
    pub header: PlaylistHeader,
    pub entries: Vec<StreamEntry>,
}

impl Playlist {
    /// Parses raw playlist bytes, replacing invalid UTF-8 sequences.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        parse_playlist(&String::from_utf8_lossy(bytes))
    }
}

/// Splits an extended M3U document into entries.
///
/// An `#EXTINF` line opens a new record; `#EXTVLCOPT:`/`#KODIPROP:` lines are
/// collected as directives and other `#EXT` tags as metadata until an
/// `http(s)://` line closes the record. A second `#EXTINF` before the URL
/// replaces the pending metadata but keeps its directives. Everything else
/// is skipped.
pub fn parse_playlist(text: &str) -> Playlist {
    let mut playlist = Playlist::default();
    let mut seen_header = false;
    let mut metadata: Vec<String> = Vec::new();
    let mut directives: Vec<String> = Vec::new();

    for (line_no, raw) in text.lines().enumerate() {
        let line = raw.trim_start_matches('\u{feff}').trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with(PLAYLIST_HEADER) {
            if !seen_header {
                playlist.header.line = line.to_string();
                seen_header = true;
            }
        } else if GLOBAL_HEADER_TAGS.iter().any(|tag| line.starts_with(tag)) {
            playlist.header.directives.push(line.to_string());
        } else if line.starts_with(EXTINF_TAG) {
            if metadata.iter().any(|m| m.starts_with(EXTINF_TAG)) {
                trace!(line = line_no + 1, "#EXTINF without URL, previous metadata dropped");
                metadata.clear();
            }
            metadata.push(line.to_string());
        } else if DIRECTIVE_PREFIXES.iter().any(|p| line.starts_with(p)) {
            directives.push(line.to_string());
        } else if line.starts_with("#EXT") {
            metadata.push(line.to_string());
        } else if line.starts_with('#') {
            continue;
        } else if is_http_url(line) {
            playlist.entries.push(StreamEntry {
                metadata_lines: std::mem::take(&mut metadata),
                directive_lines: std::mem::take(&mut directives),
                url: line.to_string(),
            });
        } else {
            trace!(line = line_no + 1, "Skipping non-HTTP locator");
        }
    }

    playlist
}

fn is_http_url(line: &str) -> bool {
    let lower = line.get(..8).unwrap_or(line).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
