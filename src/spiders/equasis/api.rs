//! Wire surface of the Equasis website: URLs, form payloads and the
//! response checks that tell a ban apart from an empty result.

use reqwest::header::{HeaderMap, HeaderValue};
use tracing::{debug, warn};

use super::parser;

pub const BASE_URL: &str = "http://www.equasis.org";

const LOGIN_PATH: &str = "/EquasisWeb/authen/HomePage?fs=HomePage";
const SEARCH_PATH: &str = "/EquasisWeb/restricted/Search?fs=Search";
const SHIP_PATH: &str = "/EquasisWeb/restricted/ShipInfo?fs=Search";

pub fn login_url(base: &str) -> String {
    format!("{base}{LOGIN_PATH}")
}

pub fn search_url(base: &str) -> String {
    format!("{base}{SEARCH_PATH}")
}

pub fn vessel_url(base: &str, imo: &str) -> String {
    format!("{base}{SHIP_PATH}&P_IMO={imo}")
}

/// Codes for the advanced-search dropdown filters.
pub mod dropdown_mode {
    pub const ALL: &str = "TT";
    pub const IGNORE: &str = "HC";
    pub const CHOSE: &str = "CM";
    pub const EXCLUDE_ALL: &str = "AU";
}

const INCLUDE_HISTORY: &str = "on";

/// Headers the Equasis backend expects on every authenticated request.
/// The user agent is set per-session on the client itself.
pub fn search_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        "Accept",
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert("Accept-Language", HeaderValue::from_static("en-GB,en;q=0.5"));
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert(
        "Content-Type",
        HeaderValue::from_static("application/x-www-form-urlencoded"),
    );
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));
    headers.insert("DNT", HeaderValue::from_static("1"));
    headers.insert("Host", HeaderValue::from_static("www.equasis.org"));
    headers.insert("Pragma", HeaderValue::from_static("no-cache"));
    headers.insert(
        "Referer",
        HeaderValue::from_static("http://www.equasis.org/EquasisWeb/public/HomePage?fs=HomePage"),
    );
    headers.insert("Upgrade-Insecure-Requests", HeaderValue::from_static("1"));
    headers
}

/// Filters for one advanced search, mapped onto the `P_*` form parameters.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    /// Vessel category code, see [`super::VESSEL_CATEGORIES`].
    pub ship_category: Option<String>,
    pub vessel_name: Option<String>,
    pub min_build_year: Option<u32>,
    pub max_build_year: Option<u32>,
    pub min_dwt: Option<u32>,
    pub max_dwt: Option<u32>,
    pub min_page: u32,
    pub max_page: u32,
    /// Ad-hoc `P_*` parameters given straight on the command line.
    pub extra_filters: Vec<(String, String)>,
}

/// Build the advanced-search form body. The backend wants every parameter
/// present even when empty.
pub fn search_form(filters: &SearchFilters, page: u32) -> Vec<(String, String)> {
    let opt = |value: &Option<u32>| value.map(|v| v.to_string()).unwrap_or_default();

    let mut form: Vec<(String, String)> = vec![
        ("P_PAGE".into(), "1".into()),
        ("P_PAGE_COMP".into(), "1".into()),
        ("P_PAGE_SHIP".into(), page.to_string()),
        ("ongletActifSC".into(), "ship".into()),
        ("P_ENTREE_HOME_HIDDEN".into(), String::new()),
        ("P_IMO".into(), String::new()),
        ("P_CALLSIGN".into(), String::new()),
        (
            "P_NAME".into(),
            filters.vessel_name.clone().unwrap_or_default(),
        ),
        ("P_NAME_cu".into(), INCLUDE_HISTORY.into()),
        ("P_MMSI".into(), String::new()),
        ("P_GT_GT".into(), String::new()),
        ("P_GT_LT".into(), String::new()),
        ("P_DW_GT".into(), opt(&filters.min_dwt)),
        ("P_DW_LT".into(), opt(&filters.max_dwt)),
        ("P_YB_GT".into(), opt(&filters.min_build_year)),
        ("P_YB_LT".into(), opt(&filters.max_build_year)),
        ("P_CLASS_rb".into(), dropdown_mode::IGNORE.into()),
        ("P_CLASS_ST_rb".into(), dropdown_mode::IGNORE.into()),
        ("P_FLAG_rb".into(), dropdown_mode::IGNORE.into()),
        ("buttonAdvancedSearch".into(), "advancedOk".into()),
    ];

    match &filters.ship_category {
        Some(category) => {
            form.push(("P_CatTypeShip_rb".into(), dropdown_mode::CHOSE.into()));
            form.push(("P_CatTypeShip".into(), category.clone()));
            form.push(("P_CatTypeShip_p2".into(), category.clone()));
        }
        None => form.push(("P_CatTypeShip_rb".into(), dropdown_mode::IGNORE.into())),
    }

    form.extend(filters.extra_filters.iter().cloned());
    form
}

/// Login form body. The session cookie comes back on the response.
pub fn login_form(login: &str, password: &str) -> Vec<(String, String)> {
    vec![
        ("submit".into(), "Login".into()),
        ("j_email".into(), login.to_string()),
        ("j_password".into(), password.to_string()),
    ]
}

/// Works for both the vessel search and advanced-search result pages.
pub fn has_no_results(html: &str) -> bool {
    html.contains("No ship has been found")
        || html.contains("No company nor Ship has been found with your criteria !")
}

/// Check if we have been logged out or blocked from the website.
///
/// When no vessel is found the same warning modal displays, but with a
/// different message. That case is not a block, just an empty result.
pub fn is_blocked(html: &str) -> (bool, String) {
    match parser::warning_message(html) {
        None => (false, "success".to_string()),
        Some(msg) if msg.contains("has been found with your criteria") => {
            (false, "success".to_string())
        }
        Some(msg) => (true, msg),
    }
}

/// Check if there are more result pages after the current one. The ">"
/// link disappears from the pagination row on the last page; the result
/// counters double-check that. A page with no ">" that still has not
/// reached the total means a truncated pagination row, and silently
/// ending the search there would drop the remaining vessels.
pub fn has_next_page(html: &str) -> bool {
    const NEXT_SYMBOL: &str = ">";
    let pages = parser::parse_page_links(html);
    if pages.is_empty() {
        return false;
    }
    let has_next = pages.iter().any(|p| p == NEXT_SYMBOL);

    if let [total, current_last] = parser::parse_number_of_results(html)[..] {
        debug!(current_last, total, "results progress");
        if !has_next && current_last != total {
            warn!(
                current_last,
                total, "no next page link but the full result count was not reached"
            );
        }
    }
    has_next
}
