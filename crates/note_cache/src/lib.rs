use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use core_types::{Note, NoteApi, NoteEdit, NoteId};
use futures::future::join_all;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::error;

/// Default trailing quiet window before a dirty note is persisted.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

struct PendingWrite {
    note: Note,
    /// Monotonic tag; a timer only consumes the entry whose generation it
    /// was spawned for, so a stale timer can never swallow a newer edit.
    generation: u64,
    timer: JoinHandle<()>,
}

/// Per-window cache of active notes, the last line between the view layer
/// and the bridge.
///
/// Edits mutate the local list immediately and are persisted through a
/// debounced write keyed by note id: rapid edits to one note coalesce into a
/// single update carrying the latest full record, while edits to different
/// notes never delay each other. Bridge failures are logged here and never
/// escape into the rendering context; the optimistic local state is left as
/// is (no rollback).
pub struct NoteCache {
    api: Arc<dyn NoteApi>,
    debounce: Duration,
    notes: Mutex<Vec<Note>>,
    pending: Arc<Mutex<HashMap<NoteId, PendingWrite>>>,
    write_generation: AtomicU64,
}

impl NoteCache {
    pub fn new(api: Arc<dyn NoteApi>, debounce: Duration) -> Self {
        Self {
            api,
            debounce,
            notes: Mutex::new(Vec::new()),
            pending: Arc::new(Mutex::new(HashMap::new())),
            write_generation: AtomicU64::new(0),
        }
    }

    /// Snapshot of the window's current note list, newest first.
    pub fn notes(&self) -> Vec<Note> {
        self.notes.lock().clone()
    }

    /// Replaces the whole local list with the store's active notes. Called
    /// once at window mount; there is no incremental refresh, so the list
    /// goes stale against edits from other windows until the next load.
    pub async fn load(&self) {
        match self.api.read_active_notes().await {
            Ok(records) => {
                *self.notes.lock() = records.iter().map(|record| record.to_note()).collect();
            }
            Err(err) => error!(error = %err, "failed to load notes"),
        }
    }

    /// Mounts a single note by id, the pinned-window variant of [`load`].
    ///
    /// [`load`]: NoteCache::load
    pub async fn load_one(&self, id: NoteId) {
        match self.api.read_note(id).await {
            Ok(Some(record)) => *self.notes.lock() = vec![record.to_note()],
            Ok(None) => *self.notes.lock() = Vec::new(),
            Err(err) => error!(note = %id, error = %err, "failed to load note"),
        }
    }

    /// Optimistically prepends the note, then persists it. On failure the
    /// local list keeps the entry and diverges from storage.
    pub async fn add(&self, note: Note) {
        self.notes.lock().insert(0, note.clone());
        if let Err(err) = self.api.create_note(&note).await {
            error!(note = %note.id, error = %err, "failed to add note");
        }
    }

    /// Applies a single-field edit to the cached note immediately and
    /// schedules the full record for a debounced write. A no-op when the id
    /// is not in this window's cache.
    pub fn apply_edit(&self, id: NoteId, edit: NoteEdit) {
        let updated = {
            let mut notes = self.notes.lock();
            let Some(note) = notes.iter_mut().find(|note| note.id == id) else {
                return;
            };
            edit.apply(note);
            note.clone()
        };
        self.schedule_write(updated);
    }

    fn schedule_write(&self, note: Note) {
        let id = note.id;
        let generation = self.write_generation.fetch_add(1, Ordering::Relaxed);
        let api = self.api.clone();
        let shared = self.pending.clone();
        let debounce = self.debounce;

        // The map lock is held across spawn and insert, so the timer cannot
        // observe the map before its entry is present.
        let mut pending = self.pending.lock();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            let write = {
                let mut pending = shared.lock();
                match pending.get(&id) {
                    Some(write) if write.generation == generation => pending.remove(&id),
                    _ => None,
                }
            };
            if let Some(write) = write {
                if let Err(err) = api.update_note(&write.note).await {
                    error!(note = %id, error = %err, "failed to persist note edit");
                }
            }
        });

        if let Some(previous) = pending.insert(
            id,
            PendingWrite {
                note,
                generation,
                timer,
            },
        ) {
            previous.timer.abort();
        }
    }

    /// Soft-deletes through the bridge, then removes the entry locally.
    /// Unlike add/edit this is not optimistic: the local list only changes
    /// after the remote acknowledgment.
    pub async fn delete(&self, id: NoteId) {
        if let Err(err) = self.api.delete_note(id).await {
            error!(note = %id, error = %err, "failed to delete note");
            return;
        }

        if let Some(write) = self.pending.lock().remove(&id) {
            write.timer.abort();
        }
        self.notes.lock().retain(|note| note.id != id);
    }

    /// Cancels the debounce timers and flushes every pending write. Called
    /// when the window closes so quiet-window edits are not lost.
    pub async fn dispose(&self) {
        let drained: Vec<Note> = {
            let mut pending = self.pending.lock();
            pending
                .drain()
                .map(|(_, write)| {
                    write.timer.abort();
                    write.note
                })
                .collect()
        };

        let api = &self.api;
        join_all(drained.iter().map(|note| async move {
            if let Err(err) = api.update_note(note).await {
                error!(note = %note.id, error = %err, "failed to flush pending edit");
            }
        }))
        .await;
    }
}
