use std::collections::HashMap;
use std::fs;
use std::path::Path;

use redb::{
    CommitError, Database, DatabaseError, ReadableTable, StorageError, TableDefinition, TableError,
    TableHandle, TransactionError, WriteTransaction,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use common::{join_escaped, split_escaped, Date, RawSong};

const CACHE_VERSION: u32 = 1;

const SONGS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("songs");
const META_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("meta");

const META_VERSION_KEY: &str = "version";

const LIST_DELIMITER: char = ';';

// File-level fields like the path are re-read from the index on every
// scan and are not stored here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedSong {
    id: u64,
    date_added: i64,
    date_modified: i64,
    duration_ms: Option<u64>,
    name: Option<String>,
    sort_name: Option<String>,
    track: Option<u32>,
    disc: Option<u32>,
    subtitle: Option<String>,
    date: Option<String>,
    musicbrainz_id: Option<String>,
    album_name: Option<String>,
    album_sort_name: Option<String>,
    album_musicbrainz_id: Option<String>,
    release_types: String,
    artist_names: String,
    artist_sort_names: String,
    artist_musicbrainz_ids: String,
    album_artist_names: String,
    album_artist_sort_names: String,
    album_artist_musicbrainz_ids: String,
    genre_names: String,
    replaygain_track_adjustment: Option<f32>,
    replaygain_album_adjustment: Option<f32>,
    cover_key: Option<String>,
}

impl CachedSong {
    pub fn from_raw(raw: &RawSong) -> Option<CachedSong> {
        let id = raw.index_id?;
        let date_added = raw.date_added?;
        let date_modified = raw.date_modified?;
        Some(CachedSong {
            id,
            date_added,
            date_modified,
            duration_ms: raw.duration_ms,
            name: raw.name.clone(),
            sort_name: raw.sort_name.clone(),
            track: raw.track,
            disc: raw.disc,
            subtitle: raw.subtitle.clone(),
            date: raw.date.as_ref().map(|date| date.to_string()),
            musicbrainz_id: raw.musicbrainz_id.clone(),
            album_name: raw.album_name.clone(),
            album_sort_name: raw.album_sort_name.clone(),
            album_musicbrainz_id: raw.album_musicbrainz_id.clone(),
            release_types: pack_list(&raw.release_types),
            artist_names: pack_list(&raw.artist_names),
            artist_sort_names: pack_list(&raw.artist_sort_names),
            artist_musicbrainz_ids: pack_list(&raw.artist_musicbrainz_ids),
            album_artist_names: pack_list(&raw.album_artist_names),
            album_artist_sort_names: pack_list(&raw.album_artist_sort_names),
            album_artist_musicbrainz_ids: pack_list(&raw.album_artist_musicbrainz_ids),
            genre_names: pack_list(&raw.genre_names),
            replaygain_track_adjustment: raw.replaygain_track_adjustment,
            replaygain_album_adjustment: raw.replaygain_album_adjustment,
            cover_key: raw.cover_key.clone(),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    // Any timestamp drift means the file changed and must be re-read.
    pub fn is_fresh(&self, raw: &RawSong) -> bool {
        raw.date_added == Some(self.date_added) && raw.date_modified == Some(self.date_modified)
    }

    pub fn fill_raw(&self, raw: &mut RawSong) {
        raw.duration_ms = self.duration_ms;
        raw.name = self.name.clone();
        raw.sort_name = self.sort_name.clone();
        raw.track = self.track;
        raw.disc = self.disc;
        raw.subtitle = self.subtitle.clone();
        raw.date = self.date.as_deref().and_then(Date::parse);
        raw.musicbrainz_id = self.musicbrainz_id.clone();
        raw.album_name = self.album_name.clone();
        raw.album_sort_name = self.album_sort_name.clone();
        raw.album_musicbrainz_id = self.album_musicbrainz_id.clone();
        raw.release_types = unpack_list(&self.release_types);
        raw.artist_names = unpack_list(&self.artist_names);
        raw.artist_sort_names = unpack_list(&self.artist_sort_names);
        raw.artist_musicbrainz_ids = unpack_list(&self.artist_musicbrainz_ids);
        raw.album_artist_names = unpack_list(&self.album_artist_names);
        raw.album_artist_sort_names = unpack_list(&self.album_artist_sort_names);
        raw.album_artist_musicbrainz_ids = unpack_list(&self.album_artist_musicbrainz_ids);
        raw.genre_names = unpack_list(&self.genre_names);
        raw.replaygain_track_adjustment = self.replaygain_track_adjustment;
        raw.replaygain_album_adjustment = self.replaygain_album_adjustment;
        raw.cover_key = self.cover_key.clone();
    }
}

fn pack_list(values: &[String]) -> String {
    join_escaped(values, LIST_DELIMITER)
}

fn unpack_list(packed: &str) -> Vec<String> {
    if packed.is_empty() {
        Vec::new()
    } else {
        split_escaped(packed, |ch| ch == LIST_DELIMITER)
    }
}

pub struct CacheStore {
    db: Database,
}

impl CacheStore {
    pub fn open(path: &Path) -> Result<CacheStore, CacheError> {
        let db = open_or_create_db(path)?;
        Ok(CacheStore { db })
    }

    // A cache written by an incompatible version reads as empty, which
    // misses every stub and gets the table rewritten after the scan.
    pub fn read_all(&self) -> Result<HashMap<u64, CachedSong>, CacheError> {
        match read_version(&self.db)? {
            Some(version) if version == CACHE_VERSION => {}
            Some(version) => {
                warn!("song cache version mismatch ({}); ignoring contents", version);
                return Ok(HashMap::new());
            }
            None => return Ok(HashMap::new()),
        }

        let read_txn = self.db.begin_read()?;
        let song_table = match read_txn.open_table(SONGS_TABLE) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(HashMap::new()),
            Err(err) => return Err(err.into()),
        };

        let mut songs = HashMap::new();
        for entry in song_table.iter()? {
            let entry = entry?;
            let song: CachedSong = decode_value(entry.1.value())?;
            songs.insert(entry.0.value(), song);
        }
        Ok(songs)
    }

    pub fn replace_all(&self, songs: &[CachedSong]) -> Result<(), CacheError> {
        let write_txn = self.db.begin_write()?;
        clear_table(&write_txn, SONGS_TABLE)?;
        clear_table(&write_txn, META_TABLE)?;
        {
            let mut song_table = write_txn.open_table(SONGS_TABLE)?;
            for song in songs {
                let bytes = encode_value(song)?;
                song_table.insert(song.id, bytes.as_slice())?;
            }

            let mut meta_table = write_txn.open_table(META_TABLE)?;
            let version_bytes = encode_value(&CACHE_VERSION)?;
            meta_table.insert(META_VERSION_KEY, version_bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

#[derive(Debug)]
pub enum CacheError {
    Io(std::io::Error),
    Redb(redb::Error),
    Bincode(Box<bincode::ErrorKind>),
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::Io(err) => write!(f, "io error: {}", err),
            CacheError::Redb(err) => write!(f, "db error: {}", err),
            CacheError::Bincode(err) => write!(f, "bincode error: {}", err),
        }
    }
}

impl std::error::Error for CacheError {}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Io(err)
    }
}

impl From<redb::Error> for CacheError {
    fn from(err: redb::Error) -> Self {
        CacheError::Redb(err)
    }
}

impl From<DatabaseError> for CacheError {
    fn from(err: DatabaseError) -> Self {
        CacheError::Redb(err.into())
    }
}

impl From<TableError> for CacheError {
    fn from(err: TableError) -> Self {
        CacheError::Redb(err.into())
    }
}

impl From<TransactionError> for CacheError {
    fn from(err: TransactionError) -> Self {
        CacheError::Redb(err.into())
    }
}

impl From<StorageError> for CacheError {
    fn from(err: StorageError) -> Self {
        CacheError::Redb(err.into())
    }
}

impl From<CommitError> for CacheError {
    fn from(err: CommitError) -> Self {
        CacheError::Redb(err.into())
    }
}

impl From<Box<bincode::ErrorKind>> for CacheError {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        CacheError::Bincode(err)
    }
}

fn open_or_create_db(path: &Path) -> Result<Database, CacheError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    if path.exists() {
        Ok(Database::open(path)?)
    } else {
        Ok(Database::create(path)?)
    }
}

fn read_version(db: &Database) -> Result<Option<u32>, CacheError> {
    let read_txn = db.begin_read()?;
    let table = match read_txn.open_table(META_TABLE) {
        Ok(table) => table,
        Err(TableError::TableDoesNotExist(_)) => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let version = match table.get(META_VERSION_KEY)? {
        Some(value) => Some(decode_value(value.value())?),
        None => None,
    };
    Ok(version)
}

fn clear_table(txn: &WriteTransaction, table: impl TableHandle) -> Result<(), CacheError> {
    match txn.delete_table(table) {
        Ok(_) => Ok(()),
        Err(TableError::TableDoesNotExist(_)) => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn encode_value<T: Serialize>(value: &T) -> Result<Vec<u8>, CacheError> {
    Ok(bincode::serialize(value)?)
}

fn decode_value<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, CacheError> {
    Ok(bincode::deserialize(bytes)?)
}
