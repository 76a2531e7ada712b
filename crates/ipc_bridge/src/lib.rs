use std::sync::Arc;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use core_types::{Note, NoteApi, NoteId, NoteRecord, WindowId, WindowManager};
use serde::{Deserialize, Serialize};
use storage_sqlite::NoteStorage;
use tracing::warn;

/// A request crossing the process boundary, one variant per channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "kebab-case")]
pub enum BridgeRequest {
    CreateNote { note: Note },
    ReadNote { id: NoteId },
    ReadActiveNotes,
    ReadAllNotes,
    UpdateNote { note: Note },
    DeleteNote { id: NoteId },
    DeleteNotePermanently { id: NoteId },
    PinNote { id: NoteId },
    TimerWindow,
    CloseWindow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeResponse {
    Ack { success: bool },
    Note { note: Option<NoteRecord> },
    Notes { notes: Vec<NoteRecord> },
}

/// Request/response relay between window contexts and the persistence
/// process. Performs no business logic: store channels forward to
/// [`NoteStorage`], window channels to the [`WindowManager`]. Failures cross
/// the boundary as strings, matching the IPC error channel.
pub struct NoteBridge {
    storage: NoteStorage,
    windows: Arc<dyn WindowManager>,
}

impl NoteBridge {
    pub fn new(storage: NoteStorage, windows: Arc<dyn WindowManager>) -> Self {
        Self { storage, windows }
    }

    /// Dispatches one request. `origin` identifies the requesting window and
    /// is only consulted by `CloseWindow`.
    pub async fn handle(
        &self,
        origin: WindowId,
        request: BridgeRequest,
    ) -> std::result::Result<BridgeResponse, String> {
        let outcome = match request {
            BridgeRequest::CreateNote { note } => self
                .storage
                .create_note(&note)
                .await
                .map(|_| BridgeResponse::Ack { success: true })
                .map_err(|e| e.to_string()),
            BridgeRequest::ReadNote { id } => self
                .storage
                .read_note(id)
                .await
                .map(|note| BridgeResponse::Note { note })
                .map_err(|e| e.to_string()),
            BridgeRequest::ReadActiveNotes => self
                .storage
                .read_active_notes()
                .await
                .map(|notes| BridgeResponse::Notes { notes })
                .map_err(|e| e.to_string()),
            BridgeRequest::ReadAllNotes => self
                .storage
                .read_all_notes()
                .await
                .map(|notes| BridgeResponse::Notes { notes })
                .map_err(|e| e.to_string()),
            BridgeRequest::UpdateNote { note } => self
                .storage
                .update_note(&note)
                .await
                .map(|_| BridgeResponse::Ack { success: true })
                .map_err(|e| e.to_string()),
            BridgeRequest::DeleteNote { id } => self
                .storage
                .soft_delete_note(id)
                .await
                .map(|_| BridgeResponse::Ack { success: true })
                .map_err(|e| e.to_string()),
            BridgeRequest::DeleteNotePermanently { id } => self
                .storage
                .hard_delete_note(id)
                .await
                .map(|_| BridgeResponse::Ack { success: true })
                .map_err(|e| e.to_string()),
            BridgeRequest::PinNote { id } => self
                .windows
                .open_pinned_note(id)
                .map(|_| BridgeResponse::Ack { success: true })
                .map_err(|e| e.to_string()),
            BridgeRequest::TimerWindow => self
                .windows
                .open_timer_window()
                .map(|_| BridgeResponse::Ack { success: true })
                .map_err(|e| e.to_string()),
            BridgeRequest::CloseWindow => self
                .windows
                .close_window(origin)
                .map(|_| BridgeResponse::Ack { success: true })
                .map_err(|e| e.to_string()),
        };

        if let Err(message) = &outcome {
            warn!(window = %origin, error = %message, "bridge request failed");
        }
        outcome
    }
}

/// Per-window typed handle over the bridge, the renderer-side API surface.
/// Marshals every call through [`NoteBridge::handle`] so the relay stays the
/// single crossing point.
#[derive(Clone)]
pub struct BridgeClient {
    bridge: Arc<NoteBridge>,
    window: WindowId,
}

impl BridgeClient {
    pub fn new(bridge: Arc<NoteBridge>, window: WindowId) -> Self {
        Self { bridge, window }
    }

    pub fn window(&self) -> WindowId {
        self.window
    }

    async fn request(&self, request: BridgeRequest) -> Result<BridgeResponse> {
        self.bridge
            .handle(self.window, request)
            .await
            .map_err(|message| anyhow!(message))
    }

    async fn expect_ack(&self, request: BridgeRequest) -> Result<()> {
        match self.request(request).await? {
            BridgeResponse::Ack { success: true } => Ok(()),
            BridgeResponse::Ack { success: false } => Err(anyhow!("bridge refused the request")),
            other => Err(anyhow!("unexpected bridge response: {other:?}")),
        }
    }
}

#[async_trait]
impl NoteApi for BridgeClient {
    async fn create_note(&self, note: &Note) -> Result<()> {
        self.expect_ack(BridgeRequest::CreateNote { note: note.clone() })
            .await
    }

    async fn read_note(&self, id: NoteId) -> Result<Option<NoteRecord>> {
        match self.request(BridgeRequest::ReadNote { id }).await? {
            BridgeResponse::Note { note } => Ok(note),
            other => Err(anyhow!("unexpected bridge response: {other:?}")),
        }
    }

    async fn read_active_notes(&self) -> Result<Vec<NoteRecord>> {
        match self.request(BridgeRequest::ReadActiveNotes).await? {
            BridgeResponse::Notes { notes } => Ok(notes),
            other => Err(anyhow!("unexpected bridge response: {other:?}")),
        }
    }

    async fn read_all_notes(&self) -> Result<Vec<NoteRecord>> {
        match self.request(BridgeRequest::ReadAllNotes).await? {
            BridgeResponse::Notes { notes } => Ok(notes),
            other => Err(anyhow!("unexpected bridge response: {other:?}")),
        }
    }

    async fn update_note(&self, note: &Note) -> Result<()> {
        self.expect_ack(BridgeRequest::UpdateNote { note: note.clone() })
            .await
    }

    async fn delete_note(&self, id: NoteId) -> Result<()> {
        self.expect_ack(BridgeRequest::DeleteNote { id }).await
    }

    async fn delete_note_permanently(&self, id: NoteId) -> Result<()> {
        self.expect_ack(BridgeRequest::DeleteNotePermanently { id })
            .await
    }

    async fn pin_note(&self, id: NoteId) -> Result<()> {
        self.expect_ack(BridgeRequest::PinNote { id }).await
    }

    async fn open_timer_window(&self) -> Result<()> {
        self.expect_ack(BridgeRequest::TimerWindow).await
    }

    async fn close_window(&self) -> Result<()> {
        self.expect_ack(BridgeRequest::CloseWindow).await
    }
}
