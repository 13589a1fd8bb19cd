use crate::entry::StreamEntry;
use crate::reader::{Playlist, PlaylistHeader};

/// Renders a playlist in the same line-oriented shape it was read in.
pub fn render(header: &PlaylistHeader, entries: &[StreamEntry]) -> String {
    let mut lines: Vec<&str> = Vec::with_capacity(1 + header.directives.len() + entries.len() * 3);
    lines.push(&header.line);
    lines.extend(header.directives.iter().map(String::as_str));

    for entry in entries {
        lines.extend(entry.metadata_lines.iter().map(String::as_str));
        lines.extend(entry.directive_lines.iter().map(String::as_str));
        lines.push(&entry.url);
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

impl Playlist {
    pub fn to_m3u(&self) -> String {
        render(&self.header, &self.entries)
    }
}
