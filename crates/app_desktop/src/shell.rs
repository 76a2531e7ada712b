use std::collections::HashMap;

use anyhow::Result;
use core_types::{NoteId, WindowId, WindowKind, WindowManager};
use parking_lot::Mutex;
use tracing::info;
use uuid::Uuid;

/// Display configuration for one window, handed to the platform chrome.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSpec {
    pub kind: WindowKind,
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub always_on_top: bool,
    pub auto_hide_menu_bar: bool,
    pub frame: bool,
    pub transparent: bool,
    pub visible_on_all_workspaces: bool,
    /// Route the window renders, e.g. `pinnedNote/<id>` or `timer`.
    pub route: Option<String>,
    /// The note a pinned window is bound to.
    pub note: Option<NoteId>,
}

impl WindowSpec {
    pub fn main() -> Self {
        Self {
            kind: WindowKind::Main,
            title: "Notelet".to_string(),
            width: 600,
            height: 600,
            always_on_top: false,
            auto_hide_menu_bar: true,
            frame: true,
            transparent: false,
            visible_on_all_workspaces: false,
            route: None,
            note: None,
        }
    }

    pub fn pinned_note(note_id: NoteId) -> Self {
        Self {
            kind: WindowKind::PinnedNote,
            title: "Notelet".to_string(),
            width: 300,
            height: 400,
            always_on_top: true,
            auto_hide_menu_bar: true,
            frame: false,
            transparent: true,
            visible_on_all_workspaces: true,
            route: Some(format!("pinnedNote/{note_id}")),
            note: Some(note_id),
        }
    }

    pub fn timer() -> Self {
        Self {
            kind: WindowKind::Timer,
            title: "Notelet - Timer".to_string(),
            width: 300,
            height: 400,
            always_on_top: true,
            auto_hide_menu_bar: true,
            frame: true,
            transparent: false,
            visible_on_all_workspaces: true,
            route: Some("timer".to_string()),
            note: None,
        }
    }
}

/// In-process registry of open windows. Tracks which windows exist and with
/// what configuration; the actual display chrome is driven from here by the
/// platform layer.
#[derive(Default)]
pub struct WindowShell {
    windows: Mutex<HashMap<WindowId, WindowSpec>>,
}

impl WindowShell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_main(&self) -> WindowId {
        self.open(WindowSpec::main())
    }

    pub fn window(&self, id: WindowId) -> Option<WindowSpec> {
        self.windows.lock().get(&id).cloned()
    }

    pub fn open_windows(&self) -> Vec<(WindowId, WindowSpec)> {
        self.windows
            .lock()
            .iter()
            .map(|(id, spec)| (*id, spec.clone()))
            .collect()
    }

    fn open(&self, spec: WindowSpec) -> WindowId {
        let id = Uuid::new_v4();
        info!(window = %id, kind = ?spec.kind, "opening window");
        self.windows.lock().insert(id, spec);
        id
    }
}

impl WindowManager for WindowShell {
    fn open_pinned_note(&self, note_id: NoteId) -> Result<WindowId> {
        Ok(self.open(WindowSpec::pinned_note(note_id)))
    }

    fn open_timer_window(&self) -> Result<WindowId> {
        Ok(self.open(WindowSpec::timer()))
    }

    /// Closing an unknown or already-closed window is not an error.
    fn close_window(&self, window: WindowId) -> Result<()> {
        if self.windows.lock().remove(&window).is_some() {
            info!(window = %window, "closed window");
        }
        Ok(())
    }
}
