//! Relayed requests and their moderation state.

use crate::error::Result;
use crate::store::FileStore;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;
use teloxide::types::{ChatId, MessageId};
use thiserror::Error;

/// Final disposition of a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Rejected,
    Completed,
    Unavailable,
}

impl Outcome {
    pub const ALL: [Outcome; 3] = [Outcome::Rejected, Outcome::Completed, Outcome::Unavailable];

    /// Header written above the relay text once settled.
    pub fn label(self) -> &'static str {
        match self {
            Outcome::Rejected => "REJECTED",
            Outcome::Completed => "COMPLETED",
            Outcome::Unavailable => "UNAVAILABLE",
        }
    }

    /// Callback payload of the button that settles a pending request.
    pub fn action_token(self) -> &'static str {
        match self {
            Outcome::Rejected => "reject",
            Outcome::Completed => "done",
            Outcome::Unavailable => "unavailable",
        }
    }

    pub fn action_caption(self) -> &'static str {
        match self {
            Outcome::Rejected => "🚫Reject",
            Outcome::Completed => "Done✅",
            Outcome::Unavailable => "⚠️Unavailable⚠️",
        }
    }

    /// Callback payload of the single button left after settling.
    pub fn settled_token(self) -> &'static str {
        match self {
            Outcome::Rejected => "rejected",
            Outcome::Completed => "completed",
            Outcome::Unavailable => "unavailed",
        }
    }

    pub fn settled_caption(self) -> &'static str {
        match self {
            Outcome::Rejected => "Request Rejected🚫",
            Outcome::Completed => "Request Completed✅",
            Outcome::Unavailable => "Request Unavailable⚠️",
        }
    }

    /// Ending of the sentence sent back to the group.
    pub fn group_phrase(self) -> &'static str {
        match self {
            Outcome::Rejected => "has been Rejected💔.",
            Outcome::Completed => "is Completed🥳.",
            Outcome::Unavailable => "has been rejected💔 due to Unavailability🥲.",
        }
    }

    /// Alert for anyone pressing the settled button.
    pub fn settled_alert(self) -> &'static str {
        match self {
            Outcome::Rejected => "This request is rejected💔...\nSearch in channel and request again",
            Outcome::Completed => "This request Is Completed🥳...\nCheckout in Channel😊",
            Outcome::Unavailable => {
                "This request is unavailable🥲...\nSearch in channel and request again later"
            }
        }
    }

    /// Short toast for the admin who settled the request.
    pub fn toast(self) -> &'static str {
        match self {
            Outcome::Rejected => "Request rejected",
            Outcome::Completed => "Request marked as completed",
            Outcome::Unavailable => "Request marked as unavailable",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    #[default]
    Pending,
    Rejected,
    Completed,
    Unavailable,
}

impl RequestStatus {
    pub fn outcome(self) -> Option<Outcome> {
        match self {
            RequestStatus::Pending => None,
            RequestStatus::Rejected => Some(Outcome::Rejected),
            RequestStatus::Completed => Some(Outcome::Completed),
            RequestStatus::Unavailable => Some(Outcome::Unavailable),
        }
    }
}

impl From<Outcome> for RequestStatus {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Rejected => RequestStatus::Rejected,
            Outcome::Completed => RequestStatus::Completed,
            Outcome::Unavailable => RequestStatus::Unavailable,
        }
    }
}

/// Identifies a relay message inside its moderation channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub channel_id: ChatId,
    pub relay_message_id: MessageId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub channel_id: i64,
    pub relay_message_id: i32,
    pub group_id: i64,
    pub group_message_id: i32,
    #[serde(default)]
    pub requester_id: Option<u64>,
    pub requester_name: String,
    /// Full text of the group message, tag included.
    pub text: String,
    /// What follows the tag.
    pub content: String,
    #[serde(default)]
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub settled_at: Option<DateTime<Utc>>,
}

impl RequestRecord {
    pub fn key(&self) -> RequestKey {
        RequestKey {
            channel_id: ChatId(self.channel_id),
            relay_message_id: MessageId(self.relay_message_id),
        }
    }

    pub fn group(&self) -> ChatId {
        ChatId(self.group_id)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettleError {
    #[error("This request is no longer tracked.")]
    Unknown,
    #[error("This request is already {}.", .0.label())]
    AlreadySettled(Outcome),
}

/// Tracks every relay message and enforces `Pending → terminal` exactly once.
///
/// Settled records are kept for `retention` so stale button presses still get
/// a precise answer, then dropped on the next write.
pub struct RequestLedger {
    records: DashMap<RequestKey, RequestRecord>,
    retention: Duration,
    file: Option<Mutex<FileStore>>,
}

impl RequestLedger {
    pub fn open(path: impl Into<PathBuf>, retention: Duration) -> Result<Self> {
        let file = FileStore::new(path);
        let persisted: Vec<RequestRecord> = file.load()?;
        let records = DashMap::new();
        for record in persisted {
            records.insert(record.key(), record);
        }
        info!(
            "Loaded {} request(s) from {}",
            records.len(),
            file.path().display()
        );
        Ok(Self {
            records,
            retention,
            file: Some(Mutex::new(file)),
        })
    }

    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self {
            records: DashMap::new(),
            retention: Duration::days(crate::config::DEFAULT_SETTLED_RETENTION_DAYS),
            file: None,
        }
    }

    pub fn get(&self, key: &RequestKey) -> Option<RequestRecord> {
        self.records.get(key).map(|r| r.clone())
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn track(&self, record: RequestRecord) {
        self.records.insert(record.key(), record);
        self.prune_settled_before(Utc::now() - self.retention);
        self.persist();
    }

    pub fn pending_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.status == RequestStatus::Pending)
            .count()
    }

    /// Moves a pending request to `outcome`. Settled requests never change again.
    pub fn settle(
        &self,
        key: &RequestKey,
        outcome: Outcome,
    ) -> std::result::Result<RequestRecord, SettleError> {
        let settled = {
            let mut record = self.records.get_mut(key).ok_or(SettleError::Unknown)?;
            if let Some(done) = record.status.outcome() {
                return Err(SettleError::AlreadySettled(done));
            }
            record.status = outcome.into();
            record.settled_at = Some(Utc::now());
            record.clone()
        };
        self.persist();
        Ok(settled)
    }

    /// Puts a request claimed by [`settle`](Self::settle) back to pending.
    /// Used when the channel message could not be rewritten.
    pub fn reopen(&self, key: &RequestKey) {
        let reopened = match self.records.get_mut(key) {
            Some(mut record) if record.status != RequestStatus::Pending => {
                record.status = RequestStatus::Pending;
                record.settled_at = None;
                true
            }
            _ => false,
        };
        if reopened {
            warn!(
                "Reopened request {} in channel {}",
                key.relay_message_id.0, key.channel_id.0
            );
            self.persist();
        }
    }

    /// Drops settled records older than `cutoff`. Pending ones always stay.
    pub fn prune_settled_before(&self, cutoff: DateTime<Utc>) -> usize {
        let before = self.records.len();
        self.records
            .retain(|_, r| r.settled_at.map_or(true, |at| at > cutoff));
        let pruned = before.saturating_sub(self.records.len());
        if pruned > 0 {
            debug!("Pruned {pruned} settled request(s)");
        }
        pruned
    }

    fn persist(&self) {
        let Some(file) = &self.file else {
            return;
        };
        let Ok(store) = file.lock() else {
            warn!("Request file lock is poisoned; skipping save");
            return;
        };
        let mut snapshot: Vec<RequestRecord> =
            self.records.iter().map(|r| r.value().clone()).collect();
        snapshot.sort_by_key(|r| (r.channel_id, r.relay_message_id));
        if let Err(e) = store.save(&snapshot) {
            warn!("Failed to save requests to {}: {}", store.path().display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(channel: i64, relay: i32) -> RequestRecord {
        RequestRecord {
            channel_id: channel,
            relay_message_id: relay,
            group_id: -1001,
            group_message_id: 55,
            requester_id: Some(7),
            requester_name: "Alice".into(),
            text: "#request Dune".into(),
            content: "Dune".into(),
            status: RequestStatus::Pending,
            created_at: Utc::now(),
            settled_at: None,
        }
    }

    #[test]
    fn tokens_are_distinct() {
        let mut tokens: Vec<&str> = Outcome::ALL
            .iter()
            .flat_map(|o| [o.action_token(), o.settled_token()])
            .collect();
        tokens.sort_unstable();
        tokens.dedup();
        assert_eq!(tokens.len(), 6);
    }

    #[test]
    fn settle_is_terminal() {
        let ledger = RequestLedger::in_memory();
        let rec = record(-2001, 10);
        let key = rec.key();
        ledger.track(rec);
        assert_eq!(ledger.pending_count(), 1);

        let settled = ledger.settle(&key, Outcome::Completed).unwrap();
        assert_eq!(settled.status, RequestStatus::Completed);
        assert!(settled.settled_at.is_some());

        for outcome in Outcome::ALL {
            assert_eq!(
                ledger.settle(&key, outcome),
                Err(SettleError::AlreadySettled(Outcome::Completed))
            );
        }
        assert_eq!(ledger.get(&key).unwrap().status, RequestStatus::Completed);
        assert_eq!(ledger.pending_count(), 0);
    }

    #[test]
    fn settle_unknown_request() {
        let ledger = RequestLedger::in_memory();
        let key = record(-2001, 10).key();
        assert_eq!(
            ledger.settle(&key, Outcome::Rejected),
            Err(SettleError::Unknown)
        );
    }

    #[test]
    fn already_settled_message_names_outcome() {
        assert_eq!(
            SettleError::AlreadySettled(Outcome::Unavailable).to_string(),
            "This request is already UNAVAILABLE."
        );
    }

    #[test]
    fn ledger_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requests.json");
        let key = {
            let ledger = RequestLedger::open(&path, Duration::days(7)).unwrap();
            let rec = record(-2001, 10);
            let key = rec.key();
            ledger.track(rec);
            ledger.track(record(-2001, 11));
            ledger.settle(&key, Outcome::Rejected).unwrap();
            key
        };

        let reopened = RequestLedger::open(&path, Duration::days(7)).unwrap();
        assert_eq!(reopened.get(&key).unwrap().status, RequestStatus::Rejected);
        assert_eq!(reopened.pending_count(), 1);
    }

    #[test]
    fn reopen_returns_claimed_request_to_pending() {
        let ledger = RequestLedger::in_memory();
        let rec = record(-2001, 10);
        let key = rec.key();
        ledger.track(rec);

        ledger.settle(&key, Outcome::Rejected).unwrap();
        ledger.reopen(&key);
        let back = ledger.get(&key).unwrap();
        assert_eq!(back.status, RequestStatus::Pending);
        assert_eq!(back.settled_at, None);

        // A second attempt can settle it again.
        assert!(ledger.settle(&key, Outcome::Completed).is_ok());
    }

    #[test]
    fn settled_records_are_pruned_pending_kept() {
        let ledger = RequestLedger::in_memory();
        for relay in 0..5 {
            let rec = record(-2001, relay);
            let key = rec.key();
            ledger.track(rec);
            if relay % 2 == 0 {
                ledger.settle(&key, Outcome::Completed).unwrap();
            }
        }
        assert_eq!(ledger.len(), 5);

        // Nothing is old enough yet.
        assert_eq!(ledger.prune_settled_before(Utc::now() - Duration::days(1)), 0);

        assert_eq!(ledger.prune_settled_before(Utc::now() + Duration::seconds(1)), 3);
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.pending_count(), 2);
    }

    #[test]
    fn ledger_size_stays_bounded_without_retention() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = RequestLedger::open(dir.path().join("requests.json"), Duration::zero()).unwrap();

        for relay in 0..50 {
            let rec = record(-2001, relay);
            let key = rec.key();
            ledger.track(rec);
            ledger.settle(&key, Outcome::Rejected).unwrap();
        }
        // Each track prunes everything settled before it; only the last one remains.
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.pending_count(), 0);
    }
}
