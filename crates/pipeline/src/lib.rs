mod pool;

pub use pool::{TagWorkerPool, POOL_SIZE};

use std::collections::HashMap;
use std::time::Duration;

use tracing::{info, warn};

use cache::{CacheError, CacheStore, CachedSong};
use common::{RawSong, Separators};
use index::{DirectoryFilter, IndexError, MediaIndex};

const POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone)]
pub struct Settings {
    pub separators: Separators,
    pub directory_filter: DirectoryFilter,
    pub cache_enabled: bool,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            separators: Separators::from_chars(""),
            directory_filter: DirectoryFilter::default(),
            cache_enabled: true,
        }
    }
}

// Sticky: once any song fails to fill from the cache, the persisted cache
// no longer matches the library and must be rewritten after the run.
#[derive(Debug, Default)]
pub struct RunState {
    pub invalidated: bool,
}

pub enum FillOutcome {
    Filled(RawSong),
    Miss(RawSong),
}

pub struct CacheFillStage {
    snapshot: HashMap<u64, CachedSong>,
}

impl CacheFillStage {
    pub fn new(snapshot: HashMap<u64, CachedSong>) -> CacheFillStage {
        CacheFillStage { snapshot }
    }

    // A stub fills only when an entry exists for its id and both file
    // timestamps match exactly.
    pub fn try_fill(&self, state: &mut RunState, mut stub: RawSong) -> FillOutcome {
        match stub.index_id.and_then(|id| self.snapshot.get(&id)) {
            Some(cached) if cached.is_fresh(&stub) => {
                cached.fill_raw(&mut stub);
                FillOutcome::Filled(stub)
            }
            _ => {
                state.invalidated = true;
                FillOutcome::Miss(stub)
            }
        }
    }
}

// Receives every processed song exactly once. Cache hits arrive in index
// order; extracted songs arrive whenever their worker finishes.
pub trait SongSink {
    fn accept(&mut self, song: RawSong);
}

impl<F: FnMut(RawSong)> SongSink for F {
    fn accept(&mut self, song: RawSong) {
        self(song)
    }
}

pub trait SongCache {
    fn read_all(&self) -> Result<HashMap<u64, CachedSong>, CacheError>;
    fn replace_all(&self, songs: &[CachedSong]) -> Result<(), CacheError>;
}

impl SongCache for CacheStore {
    fn read_all(&self) -> Result<HashMap<u64, CachedSong>, CacheError> {
        CacheStore::read_all(self)
    }

    fn replace_all(&self, songs: &[CachedSong]) -> Result<(), CacheError> {
        CacheStore::replace_all(self, songs)
    }
}

// An absent store reads as empty and drops rewrites.
impl<C: SongCache> SongCache for Option<C> {
    fn read_all(&self) -> Result<HashMap<u64, CachedSong>, CacheError> {
        match self {
            Some(store) => store.read_all(),
            None => Ok(HashMap::new()),
        }
    }

    fn replace_all(&self, songs: &[CachedSong]) -> Result<(), CacheError> {
        match self {
            Some(store) => store.replace_all(songs),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanStats {
    pub songs: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub invalidated: bool,
}

pub struct Pipeline<I, C> {
    index: I,
    store: C,
    settings: Settings,
}

impl<I: MediaIndex, C: SongCache> Pipeline<I, C> {
    pub fn new(index: I, store: C, settings: Settings) -> Pipeline<I, C> {
        Pipeline {
            index,
            store,
            settings,
        }
    }

    // The only fatal error is failing to open the index reader; everything
    // else degrades per song or per run and is logged.
    pub async fn run(&self, sink: &mut dyn SongSink) -> Result<ScanStats, PipelineError> {
        let mut cursor = index::open(&self.index, self.settings.directory_filter.clone())?;

        let mut state = RunState::default();
        let snapshot = if self.settings.cache_enabled {
            match self.store.read_all() {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    warn!("song cache unreadable, extracting everything: {}", err);
                    state.invalidated = true;
                    HashMap::new()
                }
            }
        } else {
            HashMap::new()
        };
        let fill = CacheFillStage::new(snapshot);

        let mut pool = TagWorkerPool::new(self.settings.separators.clone());
        let mut stats = ScanStats::default();
        let mut processed: Vec<RawSong> = Vec::new();

        while let Some(stub) = cursor.next_stub() {
            match fill.try_fill(&mut state, stub) {
                FillOutcome::Filled(song) => {
                    stats.cache_hits += 1;
                    self.deliver(song, sink, &mut processed, &mut stats);
                }
                FillOutcome::Miss(mut song) => {
                    stats.cache_misses += 1;
                    loop {
                        match pool.push(song) {
                            Ok(()) => break,
                            Err(returned) => {
                                song = returned;
                                match pool.poll() {
                                    Some(done) => {
                                        self.deliver(done, sink, &mut processed, &mut stats)
                                    }
                                    None => tokio::time::sleep(POLL_INTERVAL).await,
                                }
                            }
                        }
                    }
                }
            }
        }

        while !pool.is_idle() {
            match pool.poll() {
                Some(done) => self.deliver(done, sink, &mut processed, &mut stats),
                None => tokio::time::sleep(POLL_INTERVAL).await,
            }
        }

        stats.invalidated = state.invalidated;
        if state.invalidated && self.settings.cache_enabled {
            let records: Vec<CachedSong> = processed.iter().filter_map(CachedSong::from_raw).collect();
            if let Err(err) = self.store.replace_all(&records) {
                warn!("failed to rewrite song cache: {}", err);
            }
        }

        info!(
            "scan complete: {} songs ({} cached, {} extracted)",
            stats.songs, stats.cache_hits, stats.cache_misses
        );
        Ok(stats)
    }

    fn deliver(
        &self,
        song: RawSong,
        sink: &mut dyn SongSink,
        processed: &mut Vec<RawSong>,
        stats: &mut ScanStats,
    ) {
        stats.songs += 1;
        if self.settings.cache_enabled {
            processed.push(song.clone());
        }
        sink.accept(song);
    }
}

#[derive(Debug)]
pub enum PipelineError {
    Index(IndexError),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Index(err) => write!(f, "index error: {}", err),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<IndexError> for PipelineError {
    fn from(err: IndexError) -> Self {
        PipelineError::Index(err)
    }
}
