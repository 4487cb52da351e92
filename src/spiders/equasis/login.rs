//! Login bookkeeping for Equasis. The website bans logins quickly, so a
//! run rotates through a pool of credentials and persists per-login usage
//! between runs.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::info;

use crate::config::CredentialEntry;
use crate::error::{Result, ScraperError};
use crate::persist::PersistedState;

const LOGINS_KEY: &str = "logins";

/// A login with its lifecycle counters, persisted between runs so bans and
/// usage spread are remembered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginMeta {
    pub login: String,
    pub password: String,
    #[serde(default)]
    pub created_at: Option<String>,
    /// Number of successful logins made in total.
    #[serde(default)]
    pub successful_logins: u64,
    /// Number of failed and successful logins made in total.
    #[serde(default)]
    pub total_logins: u64,
    #[serde(default)]
    pub last_used: Option<String>,
    #[serde(default)]
    pub last_success: Option<String>,
    #[serde(default)]
    pub last_response: String,
    /// Epoch seconds of the last detected block, only used for checking
    /// whether the ban expired.
    #[serde(default)]
    pub last_blocked: i64,
}

impl LoginMeta {
    fn from_entry(entry: &CredentialEntry) -> Self {
        Self {
            login: entry.login.clone(),
            password: entry.password.clone(),
            created_at: entry.created_at.clone(),
            successful_logins: 0,
            total_logins: 0,
            last_used: None,
            last_success: None,
            last_response: String::new(),
            last_blocked: 0,
        }
    }
}

/// Check if the login's last ban is older than `tolerance_secs`.
pub fn old_enough(login: &LoginMeta, tolerance_secs: i64) -> bool {
    Utc::now().timestamp() - login.last_blocked > tolerance_secs
}

/// Select the login that was used the least recently. Logins never used
/// before have no `last_used` and win the election outright.
pub fn oldest_login(logins: &[LoginMeta]) -> Option<&LoginMeta> {
    logins
        .iter()
        .min_by_key(|login| login.last_used.clone().unwrap_or_else(|| "0".to_string()))
}

/// Merge the configured inventory into the persisted login table, appending
/// logins missing from storage and keeping the old ones as they are.
pub fn rebuild_logins(
    persisted: &mut BTreeMap<String, LoginMeta>,
    inventory: &[CredentialEntry],
) {
    for entry in inventory {
        if persisted.contains_key(&entry.login) {
            continue;
        }
        persisted.insert(entry.login.clone(), LoginMeta::from_entry(entry));
    }
}

/// Owns which credential is in use and all the persisted bookkeeping
/// around it. Every mutation is saved immediately so another job launched
/// before this one finishes sees fresh data.
#[derive(Debug)]
pub struct CredentialPool {
    state: Arc<Mutex<PersistedState>>,
    cooldown_secs: i64,
    current: Option<(String, String)>,
}

impl CredentialPool {
    pub fn new(
        state: Arc<Mutex<PersistedState>>,
        inventory: &[CredentialEntry],
        cooldown_secs: i64,
    ) -> Result<Self> {
        let pool = Self {
            state,
            cooldown_secs,
            current: None,
        };

        // reconcile persisted logins with the configured inventory
        let mut guard = pool.lock();
        let mut logins: BTreeMap<String, LoginMeta> =
            guard.get(LOGINS_KEY).unwrap_or_default();
        if logins.len() != inventory.len() {
            rebuild_logins(&mut logins, inventory);
            guard.set(LOGINS_KEY, &logins)?;
        }
        drop(guard);

        Ok(pool)
    }

    fn lock(&self) -> MutexGuard<'_, PersistedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn logins(&self) -> BTreeMap<String, LoginMeta> {
        self.lock().get(LOGINS_KEY).unwrap_or_default()
    }

    /// Logins whose ban period, if any, has expired.
    pub fn available_logins(&self) -> Vec<LoginMeta> {
        self.logins()
            .into_values()
            .filter(|login| old_enough(login, self.cooldown_secs))
            .collect()
    }

    /// Elect the least recently used available login.
    pub fn renew(&mut self) -> Result<(String, String)> {
        let logins = self.available_logins();
        metrics::gauge!("equasis_logins_available").set(logins.len() as f64);
        let chosen = oldest_login(&logins).ok_or(ScraperError::NoCredentialsLeft)?;

        info!(left = logins.len(), login = %chosen.login, "renewing credentials");
        let pair = (chosen.login.clone(), chosen.password.clone());
        self.current = Some(pair.clone());
        Ok(pair)
    }

    /// Record a login attempt, successful or not.
    pub fn mark_used(&mut self, login_res: &str) -> Result<()> {
        self.update_current(|meta| {
            meta.last_response = login_res.to_string();
            meta.last_used = Some(now_iso());
            meta.total_logins += 1;
        })
    }

    pub fn mark_success(&mut self, login_res: &str) -> Result<()> {
        self.update_current(|meta| {
            meta.last_response = login_res.to_string();
            meta.last_success = Some(now_iso());
            meta.successful_logins += 1;
        })
    }

    /// Put the current login on cooldown.
    pub fn ban(&mut self) -> Result<()> {
        metrics::counter!("equasis_logins_banned").increment(1);
        self.update_current(|meta| meta.last_blocked = Utc::now().timestamp())
    }

    fn update_current<F: FnOnce(&mut LoginMeta)>(&self, apply: F) -> Result<()> {
        let Some((login, _)) = &self.current else {
            return Ok(());
        };
        let mut guard = self.lock();
        let mut logins: BTreeMap<String, LoginMeta> =
            guard.get(LOGINS_KEY).unwrap_or_default();
        if let Some(meta) = logins.get_mut(login) {
            apply(meta);
        }
        guard.set(LOGINS_KEY, &logins)
    }
}

/// ISO8601 without sub-second noise, to keep the state file readable.
fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(login: &str) -> CredentialEntry {
        CredentialEntry {
            login: login.to_string(),
            password: format!("{login}-pass"),
            created_at: None,
        }
    }

    fn pool_with(entries: &[CredentialEntry], cooldown: i64) -> CredentialPool {
        let dir = tempfile::tempdir().unwrap();
        let state = Arc::new(Mutex::new(PersistedState::load(dir.path(), "equasis")));
        // keep the tempdir alive for the duration of the test
        std::mem::forget(dir);
        CredentialPool::new(state, entries, cooldown).unwrap()
    }

    #[test]
    fn never_used_login_wins_the_election() {
        let used = LoginMeta {
            last_used: Some("2019-03-30T00:00:00Z".to_string()),
            ..LoginMeta::from_entry(&entry("used@example.com"))
        };
        let fresh = LoginMeta::from_entry(&entry("fresh@example.com"));
        let logins = [used, fresh];
        let chosen = oldest_login(&logins).unwrap();
        assert_eq!(chosen.login, "fresh@example.com");
    }

    #[test]
    fn least_recently_used_login_wins_otherwise() {
        let recent = LoginMeta {
            last_used: Some("2019-08-30T00:00:00Z".to_string()),
            ..LoginMeta::from_entry(&entry("recent@example.com"))
        };
        let stale = LoginMeta {
            last_used: Some("2018-12-30T00:00:00Z".to_string()),
            ..LoginMeta::from_entry(&entry("stale@example.com"))
        };
        let logins = [recent, stale];
        let chosen = oldest_login(&logins).unwrap();
        assert_eq!(chosen.login, "stale@example.com");
    }

    #[test]
    fn rebuild_appends_without_resetting_existing() {
        let mut persisted = BTreeMap::new();
        let mut existing = LoginMeta::from_entry(&entry("a@example.com"));
        existing.successful_logins = 7;
        persisted.insert(existing.login.clone(), existing);

        rebuild_logins(&mut persisted, &[entry("a@example.com"), entry("b@example.com")]);
        assert_eq!(persisted.len(), 2);
        assert_eq!(persisted["a@example.com"].successful_logins, 7);
        assert_eq!(persisted["b@example.com"].successful_logins, 0);
    }

    #[test]
    fn banned_login_is_excluded_until_cooldown_expires() {
        let mut pool = pool_with(&[entry("only@example.com")], 3600);
        pool.renew().unwrap();
        pool.ban().unwrap();

        assert!(pool.available_logins().is_empty());
        assert!(matches!(
            pool.renew(),
            Err(ScraperError::NoCredentialsLeft)
        ));
    }

    #[test]
    fn ban_with_zero_cooldown_is_immediately_forgiven() {
        let mut pool = pool_with(&[entry("only@example.com")], -1);
        pool.renew().unwrap();
        pool.ban().unwrap();
        assert_eq!(pool.available_logins().len(), 1);
    }

    #[test]
    fn usage_counters_persist_through_the_state_file() {
        let dir = tempfile::tempdir().unwrap();
        let state = Arc::new(Mutex::new(PersistedState::load(dir.path(), "equasis")));
        let mut pool =
            CredentialPool::new(Arc::clone(&state), &[entry("a@example.com")], 3600).unwrap();
        pool.renew().unwrap();
        pool.mark_used("success").unwrap();
        pool.mark_success("success").unwrap();

        let reloaded = PersistedState::load(dir.path(), "equasis");
        let logins: BTreeMap<String, LoginMeta> = reloaded.get("logins").unwrap();
        let meta = &logins["a@example.com"];
        assert_eq!(meta.total_logins, 1);
        assert_eq!(meta.successful_logins, 1);
        assert!(meta.last_used.is_some());
        assert_eq!(meta.last_response, "success");
    }
}
