//! Shared application state injected into every handler.

use crate::config::Config;
use crate::error::Result;
use crate::requests::RequestLedger;
use crate::store::PairingStore;
use chrono::Duration;

pub struct AppState {
    pub cfg: Config,
    pub pairings: PairingStore,
    pub requests: RequestLedger,
}

impl AppState {
    pub fn open(cfg: Config) -> Result<Self> {
        let pairings = PairingStore::open(cfg.pairings_path())?;
        let requests = RequestLedger::open(
            cfg.requests_path(),
            Duration::days(cfg.settled_retention_days),
        )?;
        Ok(Self {
            cfg,
            pairings,
            requests,
        })
    }

    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self {
            cfg: Config::default(),
            pairings: PairingStore::in_memory(),
            requests: RequestLedger::in_memory(),
        }
    }
}
