use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::{EventKind, EventRecord};

/// Store handle shared between the command handlers and the reminder job.
pub type SharedStore = Arc<tokio::sync::Mutex<EventStore>>;

/// On-disk shape of the backing file: one object with a single array field.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    events: Vec<EventRecord>,
}

/// Flat JSON-file-backed event list. Every mutation rewrites the whole
/// file; there is no batching and no protection against concurrent
/// external editors.
pub struct EventStore {
    path: PathBuf,
    events: Vec<EventRecord>,
}

impl EventStore {
    /// Read the backing file if present. Any read or parse failure resets
    /// to an empty list — no backup of the corrupt file, no error surfaced.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let events = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<StoreFile>(&content) {
                Ok(file) => file.events,
                Err(e) => {
                    warn!(file = %path.display(), "Backing file unreadable, starting empty: {}", e);
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!(file = %path.display(), "Backing file unreadable, starting empty: {}", e);
                Vec::new()
            }
        };
        Self { path, events }
    }

    /// Serialize the full list and atomically replace the backing file
    /// (temp file + rename). Failures propagate; this is the one error
    /// class the bot treats as fatal to the operation.
    pub fn save(&self) -> anyhow::Result<()> {
        let file = StoreFile {
            events: self.events.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Append a record and synchronously flush the whole list.
    pub fn append(&mut self, record: EventRecord) -> anyhow::Result<()> {
        self.events.push(record);
        self.save()
    }

    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    /// Records for one chat and kind, in insertion order.
    pub fn for_chat_and_kind(&self, chat_id: i64, kind: EventKind) -> Vec<EventRecord> {
        self.events
            .iter()
            .filter(|e| e.chat_id == chat_id && e.kind == kind)
            .cloned()
            .collect()
    }
}
