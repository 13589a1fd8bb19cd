// Extended M3U (IPTV playlist) handling
pub mod entry;
pub mod reader;
pub mod writer;

pub use entry::{Attribute, EXTINF_TAG, StreamEntry, split_extinf};
pub use reader::{GLOBAL_HEADER_TAGS, PLAYLIST_HEADER, Playlist, PlaylistHeader, parse_playlist};
pub use writer::render;
