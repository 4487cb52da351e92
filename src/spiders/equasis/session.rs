//! Session state machines for Equasis: a base session that owns a login
//! and rotates it, a search session that aggregates IMOs from advanced
//! search, and a vessel session that walks an IMO list through the detail
//! pages.

use reqwest::Client;
use serde_json::Value;
use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::api::{self, SearchFilters};
use super::login::CredentialPool;
use super::parser;
use crate::error::{Result, ScraperError};
use crate::http;
use crate::models::{Item, VesselRegistry};
use crate::persist::PersistedState;
use crate::pipeline::rate_limiter::random_delay;
use crate::spiders::ItemSink;

use super::IMOS_QUEUE_KEY;

/// What to do after a failed request: transport hiccups are worth retrying,
/// HTTP errors mean the current page or vessel should be skipped.
#[derive(Debug)]
enum FetchFailure {
    Retry,
    Skip,
}

/// Common session behaviour: holds the HTTP client with its cookie jar,
/// the elected credential, and the rotation counter.
#[derive(Debug)]
pub struct EquasisSession {
    name: &'static str,
    id: String,
    base: String,
    client: Client,
    pool: CredentialPool,
    search_count: u32,
    search_quota: u32,
    avg_delay_secs: u64,
}

impl EquasisSession {
    pub fn new(
        name: &'static str,
        pool: CredentialPool,
        search_quota: u32,
        avg_delay_secs: u64,
    ) -> Result<Self> {
        Ok(Self {
            name,
            id: session_id(),
            base: api::BASE_URL.to_string(),
            client: http::build_session_client()?,
            pool,
            search_count: 0,
            search_quota,
            avg_delay_secs,
        })
    }

    #[cfg(test)]
    fn with_base(
        name: &'static str,
        pool: CredentialPool,
        search_quota: u32,
        avg_delay_secs: u64,
        base: &str,
    ) -> Result<Self> {
        let mut session = Self::new(name, pool, search_quota, avg_delay_secs)?;
        session.base = base.to_string();
        Ok(session)
    }

    /// Open the session: fresh cookie jar, fresh identity, and a login
    /// elected from the pool. Keeps trying logins until one gets through
    /// or the pool runs dry.
    pub async fn start(&mut self) -> Result<()> {
        self.id = session_id();
        self.search_count = 0;
        self.client = http::build_session_client()?;
        info!(session = self.name, id = %self.id, "opening session");

        loop {
            let (login, password) = self.pool.renew()?;
            debug!(%login, "submitting login request");

            let response = self
                .client
                .post(api::login_url(&self.base))
                .headers(api::search_headers())
                .form(&api::login_form(&login, &password))
                .send()
                .await;

            let html = match response.and_then(|r| r.error_for_status()) {
                Ok(resp) => match resp.text().await {
                    Ok(html) => html,
                    Err(e) => {
                        warn!(error = %e, "login request failed, retrying");
                        continue;
                    }
                },
                Err(e) => {
                    warn!(error = %e, "login request failed, retrying");
                    continue;
                }
            };

            let (blocked, login_res) = api::is_blocked(&html);
            self.pool.mark_used(&login_res)?;
            if blocked {
                warn!(%login, msg = %login_res, "unable to login");
                self.pool.ban()?;
                // the next election excludes this login since it was just used
                continue;
            }

            debug!(%login, "logged in");
            self.pool.mark_success(&login_res)?;
            return Ok(());
        }
    }

    pub async fn rotate(&mut self) -> Result<()> {
        info!(session = self.name, id = %self.id, "rotating session");
        self.start().await
    }

    /// Count one search against the current credential and rotate once the
    /// quota is spent. Spreading usage across all credentials minimises the
    /// chances of being banned.
    pub async fn stay_or_rotate(&mut self) -> Result<()> {
        if self.search_count < self.search_quota {
            self.search_count += 1;
            Ok(())
        } else {
            self.rotate().await
        }
    }

    /// Check if the current credential got blocked and put it on cooldown
    /// if so.
    fn check_blocked(&mut self, html: &str) -> Result<bool> {
        let (blocked, msg) = api::is_blocked(html);
        if blocked {
            warn!(session = self.name, id = %self.id, %msg, "current credential is blocked");
            self.pool.ban()?;
        }
        Ok(blocked)
    }

    fn has_no_result(&self, html: &str) -> bool {
        if api::has_no_results(html) {
            warn!(session = self.name, id = %self.id, "no search results");
            return true;
        }
        false
    }

    /// One request attempt. Transport failures are retried by the caller,
    /// HTTP errors skip the current unit of work.
    async fn fetch_once(
        &self,
        request: reqwest::RequestBuilder,
    ) -> std::result::Result<String, FetchFailure> {
        let failure = |e: reqwest::Error| {
            metrics::counter!("equasis_requests_failed").increment(1);
            warn!(session = self.name, id = %self.id, error = %e, "request failed");
            if e.is_status() {
                FetchFailure::Skip
            } else {
                FetchFailure::Retry
            }
        };

        let response = request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(failure)?;
        response.text().await.map_err(failure)
    }
}

fn session_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Walks the advanced-search result pages for a list of filters and
/// aggregates the vessel IMOs found.
pub struct SearchSession {
    session: EquasisSession,
    filters: Vec<SearchFilters>,
}

impl SearchSession {
    pub fn new(session: EquasisSession, filters: Vec<SearchFilters>) -> Self {
        Self { session, filters }
    }

    pub async fn run(mut self) -> Result<Vec<String>> {
        self.session.start().await?;

        let mut result_imos = BTreeSet::new();
        for filter in std::mem::take(&mut self.filters) {
            let mut page = filter.min_page;
            let mut retried_empty = false;
            let mut found_for_filter = 0usize;

            loop {
                random_delay(self.session.avg_delay_secs).await;

                let request = self
                    .session
                    .client
                    .post(api::search_url(&self.session.base))
                    .headers(api::search_headers())
                    .form(&api::search_form(&filter, page));
                let html = match self.session.fetch_once(request).await {
                    Ok(html) => html,
                    Err(FetchFailure::Retry) => continue,
                    Err(FetchFailure::Skip) => {
                        // skip current page
                        page += 1;
                        if page > filter.max_page {
                            break;
                        }
                        continue;
                    }
                };

                if self.session.check_blocked(&html)? {
                    self.session.rotate().await?;
                    continue;
                }
                if self.session.has_no_result(&html) {
                    // a timeout sometimes masquerades as an empty result,
                    // give the page one more chance
                    if retried_empty {
                        break;
                    }
                    retried_empty = true;
                    continue;
                }
                retried_empty = false;

                let imos = parser::parse_imos_from_search_results(&html);
                found_for_filter += imos.len();
                result_imos.extend(imos);
                metrics::counter!("equasis_pages_count").increment(1);

                // every result page counts against the quota, the last
                // page of a filter included
                self.session.stay_or_rotate().await?;

                if api::has_next_page(&html) && page < filter.max_page {
                    page += 1;
                } else {
                    info!(
                        found_for_filter,
                        found_total = result_imos.len(),
                        ?filter,
                        id = %self.session.id,
                        "search results sum-up"
                    );
                    break;
                }
            }
        }

        info!(imos = result_imos.len(), "searching vessels is done, moving to vessel parsing");
        Ok(result_imos.into_iter().collect())
    }
}

/// Fetches vessel detail pages for an IMO list. Every parsed vessel goes
/// straight to the sink, and only then is its IMO dropped from the
/// persisted queue, so an interrupted run resumes with nothing lost.
#[derive(Debug)]
pub struct VesselSession {
    session: EquasisSession,
    imos: VecDeque<String>,
    whitelist: BTreeSet<String>,
    blacklist: BTreeSet<String>,
    state: Arc<Mutex<PersistedState>>,
}

impl VesselSession {
    pub fn new(
        session: EquasisSession,
        imos: Vec<String>,
        whitelist: BTreeSet<String>,
        blacklist: BTreeSet<String>,
        state: Arc<Mutex<PersistedState>>,
    ) -> Result<Self> {
        if !whitelist.is_empty() && !blacklist.is_empty() {
            return Err(ScraperError::SpiderClosed(
                "whitelist and blacklist cannot be specified simultaneously".to_string(),
            ));
        }

        let mut whitelist = whitelist;
        if !whitelist.is_empty() {
            // mandatory field, kept no matter what the caller asked for
            whitelist.insert("imo".to_string());
        }
        let mut blacklist = blacklist;
        blacklist.remove("imo");

        Ok(Self {
            session,
            imos: imos.into(),
            whitelist,
            blacklist,
            state,
        })
    }

    pub async fn run(mut self, sink: &mut dyn ItemSink) -> Result<()> {
        self.session.start().await?;

        while let Some(imo) = self.imos.front().cloned() {
            random_delay(self.session.avg_delay_secs).await;

            let request = self
                .session
                .client
                .get(api::vessel_url(&self.session.base, &imo))
                .headers(api::search_headers());
            let html = match self.session.fetch_once(request).await {
                Ok(html) => html,
                Err(FetchFailure::Retry) => continue,
                Err(FetchFailure::Skip) => {
                    self.imos.pop_front();
                    self.persist_queue()?;
                    continue;
                }
            };

            if self.session.check_blocked(&html)? {
                self.session.rotate().await?;
                continue;
            }

            debug!(%imo, id = %self.session.id, "parsing vessel");

            if self.session.has_no_result(&html) {
                warn!(%imo, "vessel not found");
            } else {
                match parser::parse_vessel_details(&html) {
                    // emitted before the queue forgets this imo, so an
                    // interruption never loses a parsed vessel
                    Ok(vessel) => match trim_fields(vessel, &self.whitelist, &self.blacklist) {
                        Ok(vessel) => sink.emit(Item::VesselRegistry(vessel))?,
                        Err(e) => {
                            warn!(%imo, error = %e, "failed to trim item fields");
                            sink.missing(&imo);
                        }
                    },
                    Err(e) => {
                        warn!(%imo, error = %e, "failed to parse vessel page");
                        sink.missing(&imo);
                    }
                }
            }

            // save progress so an interrupted run resumes from here
            self.imos.pop_front();
            self.persist_queue()?;
            self.session.stay_or_rotate().await?;
        }

        info!(id = %self.session.id, "parsed all imos");
        self.lock_state().remove(IMOS_QUEUE_KEY);
        self.lock_state().save()?;
        Ok(())
    }

    fn persist_queue(&self) -> Result<()> {
        let queue: Vec<&String> = self.imos.iter().collect();
        self.lock_state().set(IMOS_QUEUE_KEY, &queue)
    }

    fn lock_state(&self) -> MutexGuard<'_, PersistedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Trim a registry item down to a field whitelist, or drop the fields on a
/// blacklist. `imo` always survives.
fn trim_fields(
    vessel: VesselRegistry,
    whitelist: &BTreeSet<String>,
    blacklist: &BTreeSet<String>,
) -> Result<VesselRegistry> {
    if whitelist.is_empty() && blacklist.is_empty() {
        return Ok(vessel);
    }

    let mut value = serde_json::to_value(&vessel)?;
    if let Value::Object(ref mut map) = value {
        if !whitelist.is_empty() {
            map.retain(|key, _| whitelist.contains(key));
        } else {
            map.retain(|key, _| !blacklist.contains(key));
        }
    }
    Ok(serde_json::from_value(value)?)
}
