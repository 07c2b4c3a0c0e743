use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

/// Gate handle owned by the telegram channel and shared with its handlers.
pub type SharedGate = Arc<tokio::sync::Mutex<GateState>>;

/// (chat id, user id) — drunk mode is scoped per user per group.
pub type GateKey = (i64, u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStatus {
    NotGated,
    Unlimited,
    /// Whole minutes left, floor of seconds-left / 60.
    ExpiresIn {
        minutes: i64,
    },
}

/// Session state for drunk mode: who is gated (and until when), plus at
/// most one pending outgoing text per key awaiting confirm/cancel.
///
/// The clock is passed into every time-sensitive call; there is no
/// background timer. Expiry is detected lazily on the next status check or
/// intercepted message.
#[derive(Debug, Default)]
pub struct GateState {
    /// `None` value = gated without a time limit.
    gated: HashMap<GateKey, Option<DateTime<Utc>>>,
    pending: HashMap<GateKey, String>,
}

impl GateState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gate the user. With `minutes`, expiry = now + minutes; otherwise
    /// unlimited. Re-enabling overwrites any previous expiry.
    pub fn enable(&mut self, chat_id: i64, user_id: u64, minutes: Option<i64>, now: DateTime<Utc>) {
        let expiry = minutes.map(|m| now + Duration::minutes(m));
        self.gated.insert((chat_id, user_id), expiry);
    }

    /// Remove the gate entry and any pending text. Returns whether the
    /// user was gated at all.
    pub fn disable(&mut self, chat_id: i64, user_id: u64) -> bool {
        let key = (chat_id, user_id);
        let was_gated = self.gated.remove(&key).is_some();
        self.pending.remove(&key);
        was_gated
    }

    /// Report the gate state at `now`. An entry found expired is cleared
    /// (both maps) and reported as not gated.
    pub fn status(&mut self, chat_id: i64, user_id: u64, now: DateTime<Utc>) -> GateStatus {
        let key = (chat_id, user_id);
        match self.gated.get(&key) {
            None => GateStatus::NotGated,
            Some(None) => GateStatus::Unlimited,
            Some(Some(expiry)) => {
                if *expiry <= now {
                    self.gated.remove(&key);
                    self.pending.remove(&key);
                    GateStatus::NotGated
                } else {
                    let minutes = (*expiry - now).num_seconds() / 60;
                    GateStatus::ExpiresIn { minutes }
                }
            }
        }
    }

    /// Called for every candidate group message. Returns `true` when the
    /// message must be held for confirmation (the text is stored as
    /// pending, overwriting any unconfirmed previous one). Returns `false`
    /// when the message stands; an expired entry is cleared on the way.
    pub fn intercept(
        &mut self,
        chat_id: i64,
        user_id: u64,
        text: &str,
        now: DateTime<Utc>,
    ) -> bool {
        match self.status(chat_id, user_id, now) {
            GateStatus::NotGated => false,
            GateStatus::Unlimited | GateStatus::ExpiresIn { .. } => {
                self.pending.insert((chat_id, user_id), text.to_string());
                true
            }
        }
    }

    /// Drop the pending text for a key. Returns whether one existed.
    pub fn cancel(&mut self, chat_id: i64, user_id: u64) -> bool {
        self.pending.remove(&(chat_id, user_id)).is_some()
    }

    /// Remove and return the pending text (confirm path).
    pub fn take_pending(&mut self, chat_id: i64, user_id: u64) -> Option<String> {
        self.pending.remove(&(chat_id, user_id))
    }

    #[cfg(test)]
    fn has_pending(&self, chat_id: i64, user_id: u64) -> bool {
        self.pending.contains_key(&(chat_id, user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const CHAT: i64 = -100_123;
    const USER: u64 = 42;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 25, 20, 0, 0).unwrap()
    }

    #[test]
    fn test_not_gated_by_default() {
        let mut gate = GateState::new();
        assert_eq!(gate.status(CHAT, USER, t0()), GateStatus::NotGated);
        assert!(!gate.intercept(CHAT, USER, "hi", t0()));
    }

    #[test]
    fn test_enable_unlimited() {
        let mut gate = GateState::new();
        gate.enable(CHAT, USER, None, t0());
        assert_eq!(gate.status(CHAT, USER, t0()), GateStatus::Unlimited);
        // Still gated arbitrarily far in the future.
        let later = t0() + Duration::days(30);
        assert_eq!(gate.status(CHAT, USER, later), GateStatus::Unlimited);
    }

    #[test]
    fn test_enable_with_minutes_reports_remaining() {
        let mut gate = GateState::new();
        gate.enable(CHAT, USER, Some(5), t0());

        let after_90s = t0() + Duration::seconds(90);
        match gate.status(CHAT, USER, after_90s) {
            GateStatus::ExpiresIn { minutes } => {
                assert!(minutes > 0 && minutes < 5, "got {} minutes", minutes);
                assert_eq!(minutes, 3); // floor(210s / 60)
            }
            other => panic!("expected ExpiresIn, got {:?}", other),
        }
    }

    #[test]
    fn test_expiry_clears_gate_and_pending_on_status() {
        let mut gate = GateState::new();
        gate.enable(CHAT, USER, Some(5), t0());
        assert!(gate.intercept(CHAT, USER, "held", t0()));
        assert!(gate.has_pending(CHAT, USER));

        let after = t0() + Duration::minutes(6);
        assert_eq!(gate.status(CHAT, USER, after), GateStatus::NotGated);
        assert!(!gate.has_pending(CHAT, USER));
    }

    #[test]
    fn test_expiry_lets_message_stand_on_intercept() {
        let mut gate = GateState::new();
        gate.enable(CHAT, USER, Some(5), t0());
        assert!(gate.intercept(CHAT, USER, "held", t0()));

        let after = t0() + Duration::minutes(5);
        assert!(!gate.intercept(CHAT, USER, "free again", after));
        assert!(!gate.has_pending(CHAT, USER));
    }

    #[test]
    fn test_new_intercept_overwrites_pending() {
        let mut gate = GateState::new();
        gate.enable(CHAT, USER, None, t0());
        assert!(gate.intercept(CHAT, USER, "first", t0()));
        assert!(gate.intercept(CHAT, USER, "second", t0()));
        assert_eq!(gate.take_pending(CHAT, USER).as_deref(), Some("second"));
        assert_eq!(gate.take_pending(CHAT, USER), None);
    }

    #[test]
    fn test_disable_clears_both_maps() {
        let mut gate = GateState::new();
        gate.enable(CHAT, USER, None, t0());
        gate.intercept(CHAT, USER, "held", t0());

        assert!(gate.disable(CHAT, USER));
        assert_eq!(gate.status(CHAT, USER, t0()), GateStatus::NotGated);
        assert!(!gate.has_pending(CHAT, USER));
        // Second disable is a no-op.
        assert!(!gate.disable(CHAT, USER));
    }

    #[test]
    fn test_cancel_drops_pending_only() {
        let mut gate = GateState::new();
        gate.enable(CHAT, USER, None, t0());
        gate.intercept(CHAT, USER, "held", t0());

        assert!(gate.cancel(CHAT, USER));
        assert!(!gate.cancel(CHAT, USER));
        // Still gated after a cancel.
        assert_eq!(gate.status(CHAT, USER, t0()), GateStatus::Unlimited);
    }

    #[test]
    fn test_keys_are_scoped_per_chat_and_user() {
        let mut gate = GateState::new();
        gate.enable(CHAT, USER, None, t0());
        assert_eq!(gate.status(CHAT, USER + 1, t0()), GateStatus::NotGated);
        assert_eq!(gate.status(CHAT - 1, USER, t0()), GateStatus::NotGated);
    }
}
