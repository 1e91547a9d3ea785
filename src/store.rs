//! Group ↔ channel pairings, kept in memory and mirrored to a JSON file.

use crate::error::{Error, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::{fs, io};
use teloxide::types::ChatId;
use thiserror::Error;

/// One registered group and the channel that moderates its requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pairing {
    pub group_id: ChatId,
    pub channel_id: ChatId,
    /// Private chat of the user who ran `/add`.
    pub registrar_id: ChatId,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InsertError {
    #[error("Your Group ID already Added.")]
    GroupTaken,
    #[error("This Channel ID is already linked with another Group.")]
    ChannelTaken,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UnpairError {
    #[error("Given Group ID is not found in our Database🤔.")]
    NotFound,
    #[error("😒You are not the one who added this Channel ID & Group ID.")]
    NotOwner,
}

/// On-disk shape: `{"<group id>": ["<channel id>", <registrar chat id>]}`.
type PersistentPairings = BTreeMap<String, (String, i64)>;

/// Plain JSON file with write-to-temp-then-rename saves.
pub(crate) struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub(crate) fn load<T: DeserializeOwned + Default>(&self) -> Result<T> {
        match fs::read_to_string(&self.path) {
            Ok(s) if s.trim().is_empty() => Ok(T::default()),
            Ok(s) => Ok(serde_json::from_str(&s)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(T::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) fn save<T: Serialize>(&self, value: &T) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let tmp = self.path.with_extension("tmp");
        let data = serde_json::to_vec_pretty(value)?;
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub(crate) fn path(&self) -> &PathBuf {
        &self.path
    }
}

/// Pairings keyed by group, with a reverse index by channel.
///
/// Lock order is always group map first, channel map second.
pub struct PairingStore {
    by_group: DashMap<ChatId, Pairing>,
    by_channel: DashMap<ChatId, ChatId>,
    file: Option<Mutex<FileStore>>,
}

impl PairingStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let file = FileStore::new(path);
        let persisted: PersistentPairings = file.load()?;

        let store = Self {
            by_group: DashMap::new(),
            by_channel: DashMap::new(),
            file: None,
        };
        for (group, (channel, registrar)) in persisted {
            let pairing = Pairing {
                group_id: ChatId(parse_id(&group)?),
                channel_id: ChatId(parse_id(&channel)?),
                registrar_id: ChatId(registrar),
            };
            if store.insert_unpersisted(pairing).is_err() {
                warn!(
                    "Skipping duplicate pairing in {}: group={} channel={}",
                    file.path().display(),
                    group,
                    channel
                );
            }
        }
        info!(
            "Loaded {} pairing(s) from {}",
            store.by_group.len(),
            file.path().display()
        );

        Ok(Self {
            file: Some(Mutex::new(file)),
            ..store
        })
    }

    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self {
            by_group: DashMap::new(),
            by_channel: DashMap::new(),
            file: None,
        }
    }

    pub fn find_by_group(&self, group_id: ChatId) -> Option<Pairing> {
        self.by_group.get(&group_id).map(|p| *p)
    }

    pub fn find_by_channel(&self, channel_id: ChatId) -> Option<Pairing> {
        // Guard on the channel map must be released before touching the group map.
        let group_id = self.by_channel.get(&channel_id).map(|g| *g)?;
        self.find_by_group(group_id)
    }

    /// All pairings, ordered by group ID.
    pub fn all(&self) -> Vec<Pairing> {
        let mut all: Vec<Pairing> = self.by_group.iter().map(|p| *p).collect();
        all.sort_unstable_by_key(|p| p.group_id.0);
        all
    }

    pub fn registered_by(&self, registrar_id: ChatId) -> Vec<Pairing> {
        self.all()
            .into_iter()
            .filter(|p| p.registrar_id == registrar_id)
            .collect()
    }

    /// Adds a pairing unless its group or channel is already taken.
    pub fn insert(&self, pairing: Pairing) -> std::result::Result<(), InsertError> {
        self.insert_unpersisted(pairing)?;
        info!(
            "Paired group {} with channel {} (registrar {})",
            pairing.group_id.0, pairing.channel_id.0, pairing.registrar_id.0
        );
        self.persist();
        Ok(())
    }

    fn insert_unpersisted(&self, pairing: Pairing) -> std::result::Result<(), InsertError> {
        match self.by_group.entry(pairing.group_id) {
            Entry::Occupied(_) => Err(InsertError::GroupTaken),
            Entry::Vacant(group_slot) => {
                match self.by_channel.entry(pairing.channel_id) {
                    Entry::Occupied(_) => return Err(InsertError::ChannelTaken),
                    Entry::Vacant(channel_slot) => {
                        channel_slot.insert(pairing.group_id);
                    }
                }
                group_slot.insert(pairing);
                Ok(())
            }
        }
    }

    /// Removes the group's pairing if `requester` is the one who registered it.
    pub fn remove(
        &self,
        group_id: ChatId,
        requester: ChatId,
    ) -> std::result::Result<Pairing, UnpairError> {
        let removed = match self.by_group.entry(group_id) {
            Entry::Vacant(_) => return Err(UnpairError::NotFound),
            Entry::Occupied(slot) => {
                if slot.get().registrar_id != requester {
                    return Err(UnpairError::NotOwner);
                }
                self.by_channel.remove(&slot.get().channel_id);
                slot.remove()
            }
        };
        info!(
            "Unpaired group {} from channel {}",
            removed.group_id.0, removed.channel_id.0
        );
        self.persist();
        Ok(removed)
    }

    fn snapshot(&self) -> PersistentPairings {
        self.by_group
            .iter()
            .map(|p| {
                (
                    p.group_id.0.to_string(),
                    (p.channel_id.0.to_string(), p.registrar_id.0),
                )
            })
            .collect()
    }

    fn persist(&self) {
        let Some(file) = &self.file else {
            return;
        };
        // Snapshot under the file lock so a slower writer never saves stale data last.
        let Ok(store) = file.lock() else {
            warn!("Pairing file lock is poisoned; skipping save");
            return;
        };
        if let Err(e) = store.save(&self.snapshot()) {
            warn!("Failed to save pairings to {}: {}", store.path().display(), e);
        }
    }
}

fn parse_id(raw: &str) -> Result<i64> {
    raw.trim()
        .parse()
        .map_err(|_| Error::message(format!("malformed chat id in pairings file: {raw:?}")))
}
