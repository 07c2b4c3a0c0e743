use serde::{Deserialize, Serialize};

/// What a stored record describes: a yearly-recurring birthday or a
/// one-off dated event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Birthday,
    Event,
}

/// One persisted register entry. Records are append-only: there is no
/// update or delete path anywhere in the bot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub chat_id: i64,
    pub kind: EventKind,
    /// Resolved platform user id, when the record was added via a
    /// clickable mention.
    #[serde(default)]
    pub user_id: Option<u64>,
    /// Handle without the leading '@'.
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub title: String,
    pub day: u32,
    pub month: u32,
    /// Present for `Event`, absent for `Birthday` (which recurs yearly).
    #[serde(default)]
    pub year: Option<i32>,
}

impl EventRecord {
    /// The name shown in lists and reminders: display name first, then
    /// @handle, then a placeholder.
    pub fn label(&self) -> String {
        if !self.display_name.is_empty() {
            return self.display_name.clone();
        }
        match &self.username {
            Some(u) => format!("@{}", u),
            None => "?".to_string(),
        }
    }

    /// Tertiary sort key for the birthday list: display name or handle,
    /// empty-string fallback. Plain `str` ordering, stable sort upstream.
    pub fn name_key(&self) -> &str {
        if !self.display_name.is_empty() {
            &self.display_name
        } else {
            self.username.as_deref().unwrap_or("")
        }
    }
}
