use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::warn;
use walkdir::WalkDir;

use common::{stable_id, Date, RawSong};

// Artist sentinel some platform indexes report for untagged files.
const UNKNOWN_ARTIST: &str = "<unknown>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexCapabilities {
    pub has_volume_column: bool,
    pub has_relative_path: bool,
    pub has_cd_track_number: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TrackRow {
    pub id: u64,
    pub is_music: bool,
    pub size: Option<u64>,
    pub date_added: Option<i64>,
    pub date_modified: Option<i64>,
    pub display_name: Option<String>,
    pub mime_type: Option<String>,
    pub duration_ms: Option<u64>,
    pub title: Option<String>,
    pub year: Option<i32>,
    pub album: Option<String>,
    pub artist: Option<String>,
    pub album_artist: Option<String>,
    pub volume: Option<PathBuf>,
    pub relative_dir: Option<String>,
    pub data: Option<PathBuf>,
    // Legacy packed position, disc * 1000 + track.
    pub track: Option<i32>,
    pub cd_track_number: Option<String>,
    pub disc_number: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GenreRow {
    pub id: u64,
    pub name: Option<String>,
}

// Dumb row sources; filtering and field mapping live in the cursor.
pub trait MediaIndex {
    fn capabilities(&self) -> IndexCapabilities;
    fn tracks(&self) -> Result<Box<dyn Iterator<Item = TrackRow> + Send>, IndexError>;
    fn genres(&self) -> Result<Vec<GenreRow>, IndexError>;
    fn genre_members(&self, genre_id: u64) -> Result<Vec<u64>, IndexError>;
}

// An empty directory list disables filtering.
#[derive(Debug, Clone, Default)]
pub struct DirectoryFilter {
    pub dirs: Vec<PathBuf>,
    pub include: bool,
}

impl DirectoryFilter {
    pub fn allows(&self, path: &Path) -> bool {
        if self.dirs.is_empty() {
            return true;
        }
        let inside = self.dirs.iter().any(|dir| path.starts_with(dir));
        if self.include {
            inside
        } else {
            !inside
        }
    }
}

// The genre join is queried up front since the index has no per-track
// genre column; any failure here is fatal to the scan.
pub fn open(index: &dyn MediaIndex, filter: DirectoryFilter) -> Result<SongCursor, IndexError> {
    let mut genres_by_track: HashMap<u64, Vec<String>> = HashMap::new();
    for genre in index.genres()? {
        let name = match genre.name {
            Some(name) => name,
            None => continue,
        };
        for track_id in index.genre_members(genre.id)? {
            genres_by_track
                .entry(track_id)
                .or_default()
                .push(name.clone());
        }
    }

    Ok(SongCursor {
        rows: index.tracks()?,
        capabilities: index.capabilities(),
        filter,
        genres_by_track,
    })
}

pub struct SongCursor {
    rows: Box<dyn Iterator<Item = TrackRow> + Send>,
    capabilities: IndexCapabilities,
    filter: DirectoryFilter,
    genres_by_track: HashMap<u64, Vec<String>>,
}

impl SongCursor {
    pub fn next_stub(&mut self) -> Option<RawSong> {
        loop {
            let row = self.rows.next()?;
            if !row.is_music {
                continue;
            }
            let size = match row.size {
                Some(size) if size > 0 => size,
                _ => continue,
            };
            let path = match resolve_path(&row, &self.capabilities) {
                Some(path) => path,
                None => {
                    warn!("index row {} has no usable path; skipping", row.id);
                    continue;
                }
            };
            if !self.filter.allows(&path) {
                continue;
            }

            let (track, disc) = positions(&row, &self.capabilities);

            let mut song = RawSong::new();
            song.index_id = Some(row.id);
            song.date_added = row.date_added;
            song.date_modified = row.date_modified;
            song.file_name = row.display_name.or_else(|| {
                path.file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            });
            song.mime_type = row.mime_type;
            song.size = Some(size);
            song.duration_ms = row.duration_ms;
            song.name = row.title;
            song.track = track;
            song.disc = disc;
            song.date = row.year.and_then(Date::from_year);
            song.album_name = row.album;
            if let Some(artist) = row.artist {
                if artist != UNKNOWN_ARTIST {
                    song.artist_names = vec![artist];
                }
            }
            if let Some(artist) = row.album_artist {
                if artist != UNKNOWN_ARTIST {
                    song.album_artist_names = vec![artist];
                }
            }
            if let Some(genres) = self.genres_by_track.get(&row.id) {
                song.genre_names = genres.clone();
            }
            song.path = Some(path);
            return Some(song);
        }
    }
}

fn resolve_path(row: &TrackRow, capabilities: &IndexCapabilities) -> Option<PathBuf> {
    if capabilities.has_relative_path {
        if let (Some(volume), Some(relative_dir), Some(name)) =
            (&row.volume, &row.relative_dir, &row.display_name)
        {
            return Some(volume.join(relative_dir).join(name));
        }
    }
    row.data.clone()
}

fn positions(row: &TrackRow, capabilities: &IndexCapabilities) -> (Option<u32>, Option<u32>) {
    if capabilities.has_cd_track_number {
        (
            row.cd_track_number.as_deref().and_then(parse_position),
            row.disc_number.as_deref().and_then(parse_position),
        )
    } else {
        match row.track {
            Some(packed) => (accept_position(packed % 1000), accept_position(packed / 1000)),
            None => (None, None),
        }
    }
}

// Positions use the "NN/TT" convention; the total after the slash never
// rescues a zero position.
fn parse_position(value: &str) -> Option<u32> {
    let position = value.split('/').next()?.trim().parse::<u32>().ok()?;
    (position > 0).then_some(position)
}

fn accept_position(value: i32) -> Option<u32> {
    u32::try_from(value).ok().filter(|position| *position > 0)
}

// Ids derive from the path below the root, stable while files do not move.
pub struct FsMediaIndex {
    root: PathBuf,
}

impl FsMediaIndex {
    pub fn new(root: PathBuf) -> FsMediaIndex {
        FsMediaIndex { root }
    }
}

impl MediaIndex for FsMediaIndex {
    fn capabilities(&self) -> IndexCapabilities {
        IndexCapabilities {
            has_volume_column: true,
            has_relative_path: true,
            has_cd_track_number: false,
        }
    }

    fn tracks(&self) -> Result<Box<dyn Iterator<Item = TrackRow> + Send>, IndexError> {
        let root = self.root.clone();
        let rows = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter_map(move |entry| fs_row(&root, entry.path()));
        Ok(Box::new(rows))
    }

    fn genres(&self) -> Result<Vec<GenreRow>, IndexError> {
        Ok(Vec::new())
    }

    fn genre_members(&self, _genre_id: u64) -> Result<Vec<u64>, IndexError> {
        Ok(Vec::new())
    }
}

fn fs_row(root: &Path, path: &Path) -> Option<TrackRow> {
    let metadata = std::fs::metadata(path).ok()?;
    let relative = path.strip_prefix(root).ok()?;
    let mime = mime_guess::from_path(path).first();
    let is_music = mime
        .as_ref()
        .map(|mime| mime.type_() == mime_guess::mime::AUDIO)
        .unwrap_or(false);

    let date_modified = metadata.modified().ok().and_then(epoch_seconds);
    let date_added = metadata
        .created()
        .or_else(|_| metadata.modified())
        .ok()
        .and_then(epoch_seconds);

    Some(TrackRow {
        id: stable_id(&relative.to_string_lossy()),
        is_music,
        size: Some(metadata.len()),
        date_added,
        date_modified,
        display_name: path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned()),
        mime_type: mime.map(|mime| mime.to_string()),
        volume: Some(root.to_path_buf()),
        relative_dir: relative
            .parent()
            .map(|dir| dir.to_string_lossy().into_owned()),
        data: Some(path.to_path_buf()),
        ..TrackRow::default()
    })
}

fn epoch_seconds(time: SystemTime) -> Option<i64> {
    let elapsed = time.duration_since(UNIX_EPOCH).ok()?;
    i64::try_from(elapsed.as_secs()).ok()
}

#[derive(Debug)]
pub enum IndexError {
    Io(std::io::Error),
    Query(String),
}

impl std::fmt::Display for IndexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexError::Io(err) => write!(f, "io error: {}", err),
            IndexError::Query(message) => write!(f, "index query failed: {}", message),
        }
    }
}

impl std::error::Error for IndexError {}

impl From<std::io::Error> for IndexError {
    fn from(err: std::io::Error) -> Self {
        IndexError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;

    use common::stable_id;

    use super::{
        open, DirectoryFilter, FsMediaIndex, GenreRow, IndexCapabilities, IndexError, MediaIndex,
        TrackRow,
    };

    struct FakeIndex {
        capabilities: IndexCapabilities,
        rows: Vec<TrackRow>,
        genres: Vec<GenreRow>,
        members: HashMap<u64, Vec<u64>>,
    }

    impl FakeIndex {
        fn new(capabilities: IndexCapabilities, rows: Vec<TrackRow>) -> FakeIndex {
            FakeIndex {
                capabilities,
                rows,
                genres: Vec::new(),
                members: HashMap::new(),
            }
        }
    }

    impl MediaIndex for FakeIndex {
        fn capabilities(&self) -> IndexCapabilities {
            self.capabilities
        }

        fn tracks(&self) -> Result<Box<dyn Iterator<Item = TrackRow> + Send>, IndexError> {
            Ok(Box::new(self.rows.clone().into_iter()))
        }

        fn genres(&self) -> Result<Vec<GenreRow>, IndexError> {
            Ok(self.genres.clone())
        }

        fn genre_members(&self, genre_id: u64) -> Result<Vec<u64>, IndexError> {
            Ok(self.members.get(&genre_id).cloned().unwrap_or_default())
        }
    }

    fn legacy_caps() -> IndexCapabilities {
        IndexCapabilities {
            has_volume_column: false,
            has_relative_path: false,
            has_cd_track_number: false,
        }
    }

    fn modern_caps() -> IndexCapabilities {
        IndexCapabilities {
            has_volume_column: true,
            has_relative_path: true,
            has_cd_track_number: true,
        }
    }

    fn music_row(id: u64) -> TrackRow {
        TrackRow {
            id,
            is_music: true,
            size: Some(1024),
            date_added: Some(100),
            date_modified: Some(200),
            display_name: Some(format!("song{id}.mp3")),
            data: Some(PathBuf::from(format!("/music/song{id}.mp3"))),
            ..TrackRow::default()
        }
    }

    #[test]
    fn skips_non_music_and_empty_rows() {
        let mut video = music_row(1);
        video.is_music = false;
        let mut empty = music_row(2);
        empty.size = Some(0);

        let index = FakeIndex::new(legacy_caps(), vec![video, empty, music_row(3)]);
        let mut cursor = open(&index, DirectoryFilter::default()).unwrap();
        assert_eq!(cursor.next_stub().unwrap().index_id, Some(3));
        assert!(cursor.next_stub().is_none());
    }

    #[test]
    fn best_effort_fields_reach_the_stub() {
        let mut row = music_row(1);
        row.duration_ms = Some(180_000);
        row.title = Some("Elegy".to_string());
        row.year = Some(2001);
        row.album = Some("Collected".to_string());
        row.artist = Some("Queen".to_string());
        row.album_artist = Some("Various Artists".to_string());

        let index = FakeIndex::new(legacy_caps(), vec![row]);
        let mut cursor = open(&index, DirectoryFilter::default()).unwrap();
        let stub = cursor.next_stub().unwrap();

        assert_eq!(stub.index_id, Some(1));
        assert_eq!(stub.date_added, Some(100));
        assert_eq!(stub.date_modified, Some(200));
        assert_eq!(stub.file_name.as_deref(), Some("song1.mp3"));
        assert_eq!(stub.size, Some(1024));
        assert_eq!(stub.duration_ms, Some(180_000));
        assert_eq!(stub.name.as_deref(), Some("Elegy"));
        assert_eq!(stub.date.as_ref().map(|date| date.to_string()), Some("2001".to_string()));
        assert_eq!(stub.album_name.as_deref(), Some("Collected"));
        assert_eq!(stub.artist_names, vec!["Queen"]);
        assert_eq!(stub.album_artist_names, vec!["Various Artists"]);
        assert_eq!(stub.path, Some(PathBuf::from("/music/song1.mp3")));
    }

    #[test]
    fn unknown_artist_sentinel_is_dropped() {
        let mut row = music_row(1);
        row.artist = Some("<unknown>".to_string());
        row.album_artist = Some("<unknown>".to_string());

        let index = FakeIndex::new(legacy_caps(), vec![row]);
        let mut cursor = open(&index, DirectoryFilter::default()).unwrap();
        let stub = cursor.next_stub().unwrap();
        assert!(stub.artist_names.is_empty());
        assert!(stub.album_artist_names.is_empty());
    }

    #[test]
    fn legacy_packed_positions_unpack() {
        let mut packed = music_row(1);
        packed.track = Some(2003);
        let mut plain = music_row(2);
        plain.track = Some(7);
        let mut zero = music_row(3);
        zero.track = Some(0);

        let index = FakeIndex::new(legacy_caps(), vec![packed, plain, zero]);
        let mut cursor = open(&index, DirectoryFilter::default()).unwrap();

        let first = cursor.next_stub().unwrap();
        assert_eq!(first.track, Some(3));
        assert_eq!(first.disc, Some(2));

        let second = cursor.next_stub().unwrap();
        assert_eq!(second.track, Some(7));
        assert_eq!(second.disc, None);

        let third = cursor.next_stub().unwrap();
        assert_eq!(third.track, None);
        assert_eq!(third.disc, None);
    }

    #[test]
    fn cd_style_positions_parse() {
        let mut row = music_row(1);
        row.cd_track_number = Some("3/12".to_string());
        row.disc_number = Some("1/2".to_string());
        let mut zero = music_row(2);
        zero.cd_track_number = Some("0/4".to_string());

        let index = FakeIndex::new(modern_caps(), vec![row, zero]);
        let mut cursor = open(&index, DirectoryFilter::default()).unwrap();

        let first = cursor.next_stub().unwrap();
        assert_eq!(first.track, Some(3));
        assert_eq!(first.disc, Some(1));

        let second = cursor.next_stub().unwrap();
        assert_eq!(second.track, None);
    }

    #[test]
    fn resolves_path_from_volume_and_relative_dir() {
        let mut row = music_row(1);
        row.volume = Some(PathBuf::from("/storage"));
        row.relative_dir = Some("Music/Albums".to_string());

        let index = FakeIndex::new(modern_caps(), vec![row]);
        let mut cursor = open(&index, DirectoryFilter::default()).unwrap();
        let stub = cursor.next_stub().unwrap();
        assert_eq!(stub.path, Some(PathBuf::from("/storage/Music/Albums/song1.mp3")));

        // Without the volume column the absolute data column is used.
        let index = FakeIndex::new(modern_caps(), vec![music_row(2)]);
        let mut cursor = open(&index, DirectoryFilter::default()).unwrap();
        let stub = cursor.next_stub().unwrap();
        assert_eq!(stub.path, Some(PathBuf::from("/music/song2.mp3")));
    }

    #[test]
    fn directory_filter_applies_to_resolved_paths() {
        let mut keep = music_row(1);
        keep.data = Some(PathBuf::from("/music/keep/a.mp3"));
        let mut drop = music_row(2);
        drop.data = Some(PathBuf::from("/music/drop/b.mp3"));

        let include = DirectoryFilter {
            dirs: vec![PathBuf::from("/music/keep")],
            include: true,
        };
        let index = FakeIndex::new(legacy_caps(), vec![keep.clone(), drop.clone()]);
        let mut cursor = open(&index, include).unwrap();
        assert_eq!(cursor.next_stub().unwrap().index_id, Some(1));
        assert!(cursor.next_stub().is_none());

        let exclude = DirectoryFilter {
            dirs: vec![PathBuf::from("/music/drop")],
            include: false,
        };
        let index = FakeIndex::new(legacy_caps(), vec![keep, drop]);
        let mut cursor = open(&index, exclude).unwrap();
        assert_eq!(cursor.next_stub().unwrap().index_id, Some(1));
        assert!(cursor.next_stub().is_none());
    }

    #[test]
    fn genre_join_attaches_names() {
        let mut index = FakeIndex::new(legacy_caps(), vec![music_row(1), music_row(2)]);
        index.genres = vec![
            GenreRow {
                id: 9,
                name: Some("Rock".to_string()),
            },
            GenreRow { id: 10, name: None },
        ];
        index.members.insert(9, vec![1]);
        index.members.insert(10, vec![1, 2]);

        let mut cursor = open(&index, DirectoryFilter::default()).unwrap();
        assert_eq!(cursor.next_stub().unwrap().genre_names, vec!["Rock"]);
        assert!(cursor.next_stub().unwrap().genre_names.is_empty());
    }

    #[test]
    fn fs_index_walks_audio_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        std::fs::create_dir_all(root.join("album")).unwrap();
        std::fs::write(root.join("album/one.mp3"), b"audio").unwrap();
        std::fs::write(root.join("album/notes.txt"), b"text").unwrap();
        std::fs::write(root.join("album/empty.flac"), b"").unwrap();

        let index = FsMediaIndex::new(root.clone());
        let mut cursor = open(&index, DirectoryFilter::default()).unwrap();

        let stub = cursor.next_stub().unwrap();
        assert_eq!(stub.index_id, Some(stable_id("album/one.mp3")));
        assert_eq!(stub.file_name.as_deref(), Some("one.mp3"));
        assert_eq!(stub.mime_type.as_deref(), Some("audio/mpeg"));
        assert_eq!(stub.size, Some(5));
        assert_eq!(stub.path, Some(root.join("album/one.mp3")));
        assert!(stub.date_modified.is_some());
        assert!(cursor.next_stub().is_none());
    }
}
