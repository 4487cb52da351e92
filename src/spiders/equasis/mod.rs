//! Equasis registry crawler.
//!
//! website: http://www.equasis.org/EquasisWeb/public/HomePage
//!
//! Crawls using the search per vessel category. A direct GET url also
//! works (`ShipInfo?fs=ShipList&P_IMO=...`) but only for vessels we
//! already know, not for new ones or when loading a new vessel category
//! for a new commodity.

pub mod api;
pub mod login;
pub mod parser;
pub mod session;

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::info;

use crate::config::EquasisConfig;
use crate::error::Result;
use crate::persist::PersistedState;
use crate::spiders::{ItemSink, Spider};
use api::SearchFilters;
use login::CredentialPool;
use session::{EquasisSession, SearchSession, VesselSession};

/// Broader categories than vessel types, needed for search on the Equasis
/// interface.
pub const VESSEL_CATEGORIES: &[(&str, &str)] = &[
    ("5", "Bulk Carriers"),
    ("6", "Oil and Chemical Tankers"),
    ("7", "Gas Tankers"),
];

pub const DEFAULT_MIN_PAGE: u32 = 1;
pub const DEFAULT_MAX_PAGE: u32 = 1_000_000;

const IMOS_QUEUE_KEY: &str = "imos_queue";

/// Run arguments, all optional. Page and year bounds split the search so
/// we stay gentle with Equasis.
#[derive(Debug, Clone, Default)]
pub struct EquasisArgs {
    /// Force the IMOs scraped instead of searching everything.
    pub imos: Vec<String>,
    pub min_year: Option<u32>,
    pub max_year: Option<u32>,
    pub min_page: Option<u32>,
    pub max_page: Option<u32>,
    /// Vessel category code, see [`VESSEL_CATEGORIES`].
    pub category: Option<String>,
    /// Ad-hoc extra `P_*` form parameters.
    pub filters: Vec<(String, String)>,
    /// Fields kept in the emitted item; everything else is dropped.
    pub whitelist: Vec<String>,
    /// Fields dropped from the emitted item.
    pub blacklist: Vec<String>,
    /// Use the dev login inventory to preserve the prod users' quota.
    pub test: bool,
    /// Drop the persisted state before running, for when the storage is
    /// corrupted or a clean run is wanted.
    pub reset_state: bool,
}

pub struct EquasisSpider {
    config: EquasisConfig,
    state: Arc<Mutex<PersistedState>>,
    requested_imos: Vec<String>,
    categories: Vec<&'static str>,
    min_year: u32,
    max_year: u32,
    min_page: u32,
    max_page: u32,
    extra_filters: Vec<(String, String)>,
    whitelist: BTreeSet<String>,
    blacklist: BTreeSet<String>,
    is_test: bool,
}

impl EquasisSpider {
    pub fn new(config: EquasisConfig, state_dir: &Path, args: EquasisArgs) -> Result<Self> {
        let mut state = PersistedState::load(state_dir, "equasis");
        if args.reset_state {
            state.clean();
        }

        let max_year = args.max_year.unwrap_or_else(|| Utc::now().year() as u32);
        let min_year = args.min_year.unwrap_or(max_year);
        let min_page = args.min_page.unwrap_or(DEFAULT_MIN_PAGE);
        let max_page = args.max_page.unwrap_or(DEFAULT_MAX_PAGE);

        // given IMOs take precedence, then the queue of an interrupted run
        let requested_imos = if !args.imos.is_empty() {
            args.imos
        } else {
            state.get::<Vec<String>>(IMOS_QUEUE_KEY).unwrap_or_default()
        };
        // reset the queue so we don't load it again next run
        state.remove(IMOS_QUEUE_KEY);
        state.save()?;

        let categories: Vec<&'static str> = match &args.category {
            Some(code) => VESSEL_CATEGORIES
                .iter()
                .filter(|(c, _)| c == code)
                .map(|(c, _)| *c)
                .collect(),
            None => Vec::new(),
        };
        let categories = if categories.is_empty() {
            VESSEL_CATEGORIES.iter().map(|(c, _)| *c).collect()
        } else {
            categories
        };

        info!(?categories, "filtering search on categories");
        info!(min_page, max_page, min_year, max_year, "search bounds");
        if args.test {
            info!("test run, using dev logins");
        }

        Ok(Self {
            config,
            state: Arc::new(Mutex::new(state)),
            requested_imos,
            categories,
            min_year,
            max_year,
            min_page,
            max_page,
            extra_filters: args.filters,
            whitelist: args.whitelist.into_iter().collect(),
            blacklist: args.blacklist.into_iter().collect(),
            is_test: args.test,
        })
    }

    fn make_pool(&self) -> Result<CredentialPool> {
        let inventory = if self.is_test {
            &self.config.dev_credentials
        } else {
            &self.config.credentials
        };
        CredentialPool::new(
            Arc::clone(&self.state),
            inventory,
            self.config.banned_cooldown_secs,
        )
    }

    fn make_session(&self, name: &'static str) -> Result<EquasisSession> {
        EquasisSession::new(
            name,
            self.make_pool()?,
            self.config.search_quota,
            self.config.avg_delay_secs,
        )
    }

    fn make_search_filters(&self) -> Vec<SearchFilters> {
        self.categories
            .iter()
            .map(|code| SearchFilters {
                ship_category: Some(code.to_string()),
                min_build_year: Some(self.min_year),
                max_build_year: Some(self.max_year),
                min_page: self.min_page,
                max_page: self.max_page,
                extra_filters: self.extra_filters.clone(),
                ..Default::default()
            })
            .collect()
    }

    fn lock_state(&self) -> MutexGuard<'_, PersistedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Spider for EquasisSpider {
    fn name(&self) -> &'static str {
        "equasis"
    }

    fn provider(&self) -> &'static str {
        "Equasis"
    }

    fn version(&self) -> &'static str {
        "1.1.0"
    }

    async fn crawl(&mut self, sink: &mut dyn ItemSink) -> Result<()> {
        let imos = if !self.requested_imos.is_empty() {
            info!(imos = self.requested_imos.len(), "scraping given imos");
            std::mem::take(&mut self.requested_imos)
        } else {
            let search =
                SearchSession::new(self.make_session("SearchSession")?, self.make_search_filters());
            search.run().await?
        };

        let vessels = VesselSession::new(
            self.make_session("VesselSession")?,
            imos,
            self.whitelist.clone(),
            self.blacklist.clone(),
            Arc::clone(&self.state),
        )?;
        vessels.run(sink).await?;

        self.lock_state().record_exec()?;
        Ok(())
    }
}
