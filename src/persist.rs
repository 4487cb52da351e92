use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::Result;

/// Dict-like state that persists between spider runs, one JSON file per
/// spider. Used for the last execution time, the Equasis credential table,
/// and the IMO queue of an interrupted run.
#[derive(Debug)]
pub struct PersistedState {
    file_path: PathBuf,
    data: Map<String, Value>,
}

const EXEC_KEY: &str = "spider_exec";

impl PersistedState {
    /// Load the state file for `spider_name` under `state_dir`, starting
    /// empty if the file is missing or unreadable.
    pub fn load<P: AsRef<Path>>(state_dir: P, spider_name: &str) -> Self {
        let file_path = state_dir.as_ref().join(format!("{spider_name}.json"));
        let data = match fs::read_to_string(&file_path) {
            Ok(content) => match serde_json::from_str::<Map<String, Value>>(&content) {
                Ok(map) => map,
                Err(e) => {
                    warn!(path = %file_path.display(), error = %e, "could not deserialize state file, starting fresh");
                    Map::new()
                }
            },
            Err(_) => {
                debug!(path = %file_path.display(), "no state file yet");
                Map::new()
            }
        };
        Self { file_path, data }
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn set<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        self.data
            .insert(key.to_string(), serde_json::to_value(value)?);
        self.save()
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    /// Write the whole table to disk. Called on every mutation so another
    /// job launched before this one finishes sees fresh data.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string(&self.data)?;
        fs::write(&self.file_path, content)?;
        Ok(())
    }

    /// Stamp the current run, saved on spider close.
    pub fn record_exec(&mut self) -> Result<()> {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        self.set(EXEC_KEY, &now)
    }

    pub fn last_exec(&self) -> Option<DateTime<Utc>> {
        self.get::<String>(EXEC_KEY)
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Drop the state file entirely, for when persisted storage is
    /// corrupted or a clean run is wanted.
    pub fn clean(&mut self) {
        self.data.clear();
        if let Err(e) = fs::remove_file(&self.file_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.file_path.display(), error = %e, "could not remove state file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = PersistedState::load(dir.path(), "equasis");
        state
            .set("imos_queue", &vec!["9232876".to_string(), "6510215".to_string()])
            .unwrap();

        let reloaded = PersistedState::load(dir.path(), "equasis");
        let queue: Vec<String> = reloaded.get("imos_queue").unwrap();
        assert_eq!(queue, vec!["9232876", "6510215"]);
    }

    #[test]
    fn exec_timestamp_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = PersistedState::load(dir.path(), "equasis");
        state.record_exec().unwrap();

        let reloaded = PersistedState::load(dir.path(), "equasis");
        assert!(reloaded.last_exec().is_some());
    }

    #[test]
    fn clean_removes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = PersistedState::load(dir.path(), "equasis");
        state.set("logins", &serde_json::json!({})).unwrap();
        assert!(dir.path().join("equasis.json").exists());

        state.clean();
        assert!(!dir.path().join("equasis.json").exists());
        assert!(state.get::<Value>("logins").is_none());
    }

    #[test]
    fn corrupt_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("equasis.json"), "not json at all").unwrap();
        let state = PersistedState::load(dir.path(), "equasis");
        assert!(state.last_exec().is_none());
    }
}
