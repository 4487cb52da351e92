//! Maritime Connector ship search, a registry without a login wall.
//!
//! website: http://maritime-connector.com/ship-search/
//!
//! The search first returns a capped page of 25 results along with the
//! total count; re-requesting with `limit=<count>` yields everything in
//! one listing.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, warn};

use crate::error::Result;
use crate::http;
use crate::models::{Item, Vessel};
use crate::pipeline::rate_limiter::{Limits, RateLimiter};
use crate::spiders::{ItemSink, Spider};

const START_URLS: &[&str] = &[
    "http://maritime-connector.com/ship-search/?keyword=&ship=&imo=&type=lng-tanker&limit=25",
    "http://maritime-connector.com/ship-search/?keyword=&ship=&imo=&type=lpg-tanker&limit=25",
];

const REQUESTS_PER_MIN: u64 = 30;

static RESULT_COUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{3,4}").unwrap());

pub struct MaritimeConnectorSpider {
    client: Client,
    limiter: RateLimiter,
    start_urls: Vec<String>,
}

impl MaritimeConnectorSpider {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: http::build_client()?,
            limiter: RateLimiter::new(Limits {
                requests_per_min: Some(REQUESTS_PER_MIN),
            }),
            start_urls: START_URLS.iter().map(|s| s.to_string()).collect(),
        })
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        self.limiter.acquire().await;
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

#[async_trait]
impl Spider for MaritimeConnectorSpider {
    fn name(&self) -> &'static str {
        "maritime_connector"
    }

    fn provider(&self) -> &'static str {
        "MaritimeConnector"
    }

    async fn crawl(&mut self, sink: &mut dyn ItemSink) -> Result<()> {
        for start_url in self.start_urls.clone() {
            let search_page = self.fetch(&start_url).await?;
            let Some(count) = parse_result_count(&search_page) else {
                warn!(url = %start_url, "could not read the result count");
                sink.missing(&start_url);
                continue;
            };

            // re-request with the full count so one listing has everything
            let listing_url = start_url.replace("limit=25", &format!("limit={count}"));
            let listing = self.fetch(&listing_url).await?;

            for link in parse_vessel_links(&listing) {
                let page = match self.fetch(&link).await {
                    Ok(page) => page,
                    Err(e) => {
                        warn!(url = %link, error = %e, "vessel page fetch failed, skipping");
                        sink.missing(&link);
                        continue;
                    }
                };
                match parse_vessel_page(&page) {
                    Some(vessel) => {
                        if vessel.imo.is_none() {
                            // still emitted; downstream may match on name
                            warn!(
                                name = vessel.name.as_deref().unwrap_or("unknown vessel"),
                                url = %link,
                                "vessel without an IMO"
                            );
                        }
                        sink.emit(Item::Vessel(vessel))?;
                    }
                    None => {
                        warn!(url = %link, "no data table on vessel page");
                        sink.missing(&link);
                    }
                }
            }
        }

        Ok(())
    }
}

/// Total result count from the "Listing n ships" box header.
pub fn parse_result_count(html: &str) -> Option<u32> {
    let doc = Html::parse_document(html);
    let sel = Selector::parse("div.box-head p.result-count").unwrap();
    let raw = doc.select(&sel).next()?.text().collect::<String>();
    RESULT_COUNT.find(&raw)?.as_str().parse().ok()
}

pub fn parse_vessel_links(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let sel = Selector::parse("a.ship-name").unwrap();
    doc.select(&sel)
        .filter_map(|a| a.value().attr("href"))
        .map(String::from)
        .collect()
}

/// Parse the ship-data table into a vessel, None when the page carries no
/// table at all.
pub fn parse_vessel_page(html: &str) -> Option<Vessel> {
    let doc = Html::parse_document(html);
    let row_sel = Selector::parse("table.ship-data-table tr").unwrap();
    let th_sel = Selector::parse("th").unwrap();
    let td_sel = Selector::parse("td").unwrap();

    let mut vessel = Vessel::default();
    let mut found_rows = false;
    for row in doc.select(&row_sel) {
        let label = row
            .select(&th_sel)
            .next()
            .map(|th| th.text().collect::<String>().trim().to_string());
        let value = row
            .select(&td_sel)
            .next()
            .map(|td| td.text().collect::<String>().trim().to_string());
        let (Some(label), Some(value)) = (label, value) else {
            continue;
        };
        if value.is_empty() {
            continue;
        }
        found_rows = true;
        match label.as_str() {
            "IMO number" => vessel.imo = Some(value),
            "Name of the ship" => vessel.name = Some(value),
            "Type of ship" => vessel.vessel_type = Some(value),
            "MMSI" => vessel.mmsi = Some(value),
            "Gross tonnage" => vessel.gross_tonnage = parse_u32(&value),
            "DWT" => vessel.dead_weight = parse_u32(&value),
            "Year of build" => vessel.build_year = parse_u32(&value),
            "Flag" => vessel.flag_name = Some(value),
            "Last known flag" => {
                if vessel.flag_name.is_none() {
                    vessel.flag_name = Some(value);
                }
            }
            other => debug!(field = other, "skipped an unmapped ship field"),
        }
    }

    found_rows.then_some(vessel)
}

fn parse_u32(raw: &str) -> Option<u32> {
    raw.replace([',', ' '], "").parse().ok()
}
