use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::warn;

use common::{RawSong, Separators};

// Extraction is blocking I/O plus demuxing; more slots than this mostly
// adds seek contention.
pub const POOL_SIZE: usize = 8;

struct Slot {
    handle: JoinHandle<()>,
    cell: Arc<Mutex<Option<RawSong>>>,
}

// A slot is occupied from push until poll returns its song.
pub struct TagWorkerPool {
    slots: Vec<Option<Slot>>,
    separators: Separators,
}

impl TagWorkerPool {
    pub fn new(separators: Separators) -> TagWorkerPool {
        TagWorkerPool {
            slots: (0..POOL_SIZE).map(|_| None).collect(),
            separators,
        }
    }

    // When every slot is busy the stub is handed back for a later retry.
    pub fn push(&mut self, stub: RawSong) -> Result<(), RawSong> {
        let index = match self.free_slot() {
            Some(index) => index,
            None => return Err(stub),
        };
        let separators = self.separators.clone();
        self.spawn(index, move || extract(stub, &separators));
        Ok(())
    }

    pub fn poll(&mut self) -> Option<RawSong> {
        for index in 0..self.slots.len() {
            // The worker stores its result before the task finishes, so
            // the finished flag must be read before draining the cell. A
            // finished task with an empty cell can only be a dead worker.
            let (finished, completed) = match &self.slots[index] {
                Some(slot) => (slot.handle.is_finished(), slot.cell.lock().take()),
                None => continue,
            };
            if let Some(song) = completed {
                self.slots[index] = None;
                return Some(song);
            }
            if finished {
                warn!("tag worker exited without a result");
                self.slots[index] = None;
            }
        }
        None
    }

    pub fn is_idle(&self) -> bool {
        self.slots.iter().all(|slot| slot.is_none())
    }

    // A job already running on the blocking pool finishes on its own, but
    // its cell drops with the slot so the result can never surface.
    pub fn shutdown(&mut self) {
        for slot in self.slots.iter_mut() {
            if let Some(occupied) = slot.take() {
                occupied.handle.abort();
            }
        }
    }

    fn free_slot(&self) -> Option<usize> {
        self.slots.iter().position(|slot| slot.is_none())
    }

    fn spawn(&mut self, index: usize, job: impl FnOnce() -> RawSong + Send + 'static) {
        let cell = Arc::new(Mutex::new(None));
        let worker_cell = Arc::clone(&cell);
        let handle = tokio::task::spawn_blocking(move || {
            *worker_cell.lock() = Some(job());
        });
        self.slots[index] = Some(Slot { handle, cell });
    }

    #[cfg(test)]
    fn push_job(&mut self, job: impl FnOnce() -> RawSong + Send + 'static) -> bool {
        match self.free_slot() {
            Some(index) => {
                self.spawn(index, job);
                true
            }
            None => false,
        }
    }
}

impl Drop for TagWorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// Any failure leaves the stub with its file-level fields only; extraction
// never loses a song.
fn extract(mut stub: RawSong, separators: &Separators) -> RawSong {
    let path = match stub.path.clone() {
        Some(path) => path,
        None => return stub,
    };
    match metadata::read_file(&path) {
        Ok(parsed) => {
            if parsed.duration_ms.is_some() {
                stub.duration_ms = parsed.duration_ms;
            }
            if parsed.cover_key.is_some() {
                stub.cover_key = parsed.cover_key;
            }
            if let Some(tags) = &parsed.tags {
                metadata::interpret(&mut stub, tags, separators);
            }
            stub
        }
        Err(err) => {
            warn!("tag read failed for {}: {:?}", path.display(), err);
            stub
        }
    }
}
