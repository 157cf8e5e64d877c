use std::path::PathBuf;

mod date;
mod release_type;
mod separators;

pub use date::Date;
pub use release_type::{Refinement, ReleaseType};
pub use separators::{correct_whitespace, join_escaped, split_escaped, Separators};

// Accumulator for one audio file: the index reader fills the file-level
// fields, then exactly one of the cache fill stage or the tag interpreter
// fills the rest. Timestamps are epoch seconds; `path` is never cached.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RawSong {
    pub index_id: Option<u64>,
    pub date_added: Option<i64>,
    pub date_modified: Option<i64>,
    pub path: Option<PathBuf>,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub size: Option<u64>,
    pub duration_ms: Option<u64>,
    pub name: Option<String>,
    pub sort_name: Option<String>,
    pub track: Option<u32>,
    pub disc: Option<u32>,
    pub subtitle: Option<String>,
    pub date: Option<Date>,
    pub musicbrainz_id: Option<String>,
    pub album_name: Option<String>,
    pub album_sort_name: Option<String>,
    pub album_musicbrainz_id: Option<String>,
    pub release_types: Vec<String>,
    pub artist_names: Vec<String>,
    pub artist_sort_names: Vec<String>,
    pub artist_musicbrainz_ids: Vec<String>,
    pub album_artist_names: Vec<String>,
    pub album_artist_sort_names: Vec<String>,
    pub album_artist_musicbrainz_ids: Vec<String>,
    pub genre_names: Vec<String>,
    pub replaygain_track_adjustment: Option<f32>,
    pub replaygain_album_adjustment: Option<f32>,
    pub cover_key: Option<String>,
}

impl RawSong {
    pub fn new() -> Self {
        Self::default()
    }
}

pub fn stable_id(input: &str) -> u64 {
    let hash = blake3::hash(input.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}

pub fn content_key(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}
