// src/config.rs
use std::path::PathBuf;

pub const DEFAULT_UPLOADS_URL: &str = "https://t.me/+B_q7PnIdPJk5ZmY1";
pub const DEFAULT_SETTLED_RETENTION_DAYS: i64 = 7;

#[derive(Clone, Debug)]
pub struct Config {
    /// Directory holding `pairings.json` and `requests.json`.
    pub state_dir: PathBuf,
    /// Invite link shown under welcome and result messages.
    pub uploads_url: String,
    pub bot_title: String,
    pub team_signature: String,
    /// How long settled requests stay in `requests.json`.
    pub settled_retention_days: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from("data"),
            uploads_url: DEFAULT_UPLOADS_URL.to_string(),
            bot_title: "SiC Request Bot".to_string(),
            team_signature: "Team SiC".to_string(),
            settled_retention_days: DEFAULT_SETTLED_RETENTION_DAYS,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            state_dir: non_empty("STATE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.state_dir),
            uploads_url: non_empty("UPLOADS_URL").unwrap_or(defaults.uploads_url),
            bot_title: non_empty("BOT_TITLE").unwrap_or(defaults.bot_title),
            team_signature: non_empty("TEAM_SIGNATURE").unwrap_or(defaults.team_signature),
            settled_retention_days: non_empty("SETTLED_RETENTION_DAYS")
                .and_then(|v| v.trim().parse::<i64>().ok())
                .filter(|d| (0..=36_500).contains(d))
                .unwrap_or(defaults.settled_retention_days),
        }
    }

    pub fn pairings_path(&self) -> PathBuf {
        self.state_dir.join("pairings.json")
    }

    pub fn requests_path(&self) -> PathBuf {
        self.state_dir.join("requests.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_when_nothing_set() {
        let cfg = Config::from_lookup(|_| None);
        assert_eq!(cfg.state_dir, PathBuf::from("data"));
        assert_eq!(cfg.uploads_url, DEFAULT_UPLOADS_URL);
        assert_eq!(cfg.pairings_path(), PathBuf::from("data/pairings.json"));
    }

    #[test]
    fn env_overrides_and_blank_values() {
        let vars: HashMap<&str, &str> = [
            ("STATE_DIR", "/var/lib/tracker"),
            ("TEAM_SIGNATURE", "Team X"),
            ("BOT_TITLE", "   "),
            ("SETTLED_RETENTION_DAYS", "30"),
        ]
        .into_iter()
        .collect();
        let cfg = Config::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.requests_path(), PathBuf::from("/var/lib/tracker/requests.json"));
        assert_eq!(cfg.team_signature, "Team X");
        assert_eq!(cfg.bot_title, "SiC Request Bot");
        assert_eq!(cfg.settled_retention_days, 30);
    }

    #[test]
    fn bad_retention_falls_back_to_default() {
        for raw in ["-3", "week", "99999999"] {
            let cfg = Config::from_lookup(|k| (k == "SETTLED_RETENTION_DAYS").then(|| raw.to_string()));
            assert_eq!(cfg.settled_retention_days, DEFAULT_SETTLED_RETENTION_DAYS);
        }
    }
}
