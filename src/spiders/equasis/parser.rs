//! HTML extraction for Equasis pages: search results, pagination and the
//! vessel detail page.

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::error::{Result, ScraperError};
use crate::models::{
    ClassificationStatus, ClassificationSurvey, Player, PlayerRole, VesselRegistry, VesselStatus,
};

// Names of classification sections on the detail page
const STATUS_SECTION: &str = "Status";
const SURVEYS_SECTION: &str = "Surveys";

static IMO_IN_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)").unwrap());

/// Text of the warning modal, shown both on lockouts and on empty results.
pub fn warning_message(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let sel = Selector::parse("div#warning p").unwrap();
    doc.select(&sel).next().map(|p| collect_text(&p))
}

/// Given a search page, extract all the links to vessel pages and pull the
/// IMOs out of their `onclick` handlers. The website hides and shows cells
/// based on screen size, so the same IMO appears multiple times; dedupe.
pub fn parse_imos_from_search_results(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let sel = Selector::parse("form[name=formShip] table a").unwrap();

    let mut imos = BTreeSet::new();
    for link in doc.select(&sel) {
        if let Some(onclick) = link.value().attr("onclick") {
            if let Some(caps) = IMO_IN_LINK.captures(onclick) {
                imos.insert(caps[1].to_string());
            }
        }
    }
    imos.into_iter().collect()
}

/// Labels of the results-page pagination row, empty when the page has no
/// pagination at all.
pub fn parse_page_links(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let pagination = Selector::parse(".pagination").unwrap();
    let links = Selector::parse("li > a").unwrap();

    let Some(row) = doc.select(&pagination).next() else {
        return Vec::new();
    };
    row.select(&links)
        .map(|a| collect_text(&a))
        .filter(|text| !text.is_empty())
        .collect()
}

/// The "showing x of y results" counters, used for pagination sanity logs.
pub fn parse_number_of_results(html: &str) -> Vec<u32> {
    let doc = Html::parse_document(html);
    let sel = Selector::parse("div.form-group.results p strong").unwrap();
    doc.select(&sel)
        .filter_map(|node| collect_text(&node).parse().ok())
        .collect()
}

/// Parse the vessel detail page into a registry item.
pub fn parse_vessel_details(html: &str) -> Result<VesselRegistry> {
    let doc = Html::parse_document(html);

    let mut vessel = parse_base_vessel(&doc)?;
    vessel.companies = parse_companies(&doc);
    let (statuses, surveys) = parse_classification(&doc);
    vessel.classification_statuses = statuses;
    vessel.classification_surveys = surveys;

    Ok(vessel)
}

fn parse_base_vessel(doc: &Html) -> Result<VesselRegistry> {
    let row_sel = Selector::parse(".access-item .row").unwrap();
    let title_sel = Selector::parse(".info-details h4 b").unwrap();
    let badge_sel = Selector::parse(".info-details .badge").unwrap();

    let mut vessel = VesselRegistry::default();
    let mut found_content = false;

    for row in doc.select(&row_sel) {
        let cells = text_fields(&row);
        if cells.len() < 2 {
            continue;
        }
        found_content = true;
        let value = cells[1].clone();
        match cells[0].as_str() {
            "Year of build" => vessel.build_year = parse_u32(&value),
            "Call Sign" => {
                if !value.to_lowercase().contains("unknown") {
                    vessel.call_sign = Some(value);
                }
            }
            "DWT" => vessel.dead_weight = parse_u32(&value),
            "Flag" => vessel.flag_name = Some(value.replace(['(', ')'], "")),
            "Gross tonnage" => vessel.gross_tonnage = parse_u32(&value),
            "MMSI" => vessel.mmsi = Some(value),
            "Type of ship" => vessel.vessel_type = Some(value),
            "Status" => {
                vessel.status = VesselStatus::from_raw(&value);
                if vessel.status.is_none() {
                    debug!(raw = %value, "status outside the known set, keeping raw");
                    vessel.status_raw = Some(value);
                }
            }
            other => debug!(field = other, "skipped an unmapped vessel field"),
        }
    }

    // name and imo live in the page header, not the property table
    if let Some(title) = doc.select(&title_sel).next() {
        let cells = text_fields(&title);
        if cells.len() >= 2 {
            found_content = true;
            vessel.name = Some(cells[0].clone());
            vessel.imo = cells[1].clone();
        }
    }

    // "updated on <date>" badge
    if let Some(badge) = doc.select(&badge_sel).next() {
        let text = collect_text(&badge);
        if let Some(raw_date) = text.split_whitespace().nth(2) {
            vessel.reported_date = parse_date(raw_date, &[]);
        }
    }

    if !found_content {
        return Err(ScraperError::Parse(
            "unable to parse the page, no content found".to_string(),
        ));
    }
    Ok(vessel)
}

fn parse_companies(doc: &Html) -> Vec<Player> {
    let table_sel = Selector::parse("#collapse3 .tableLS").unwrap();
    let head_sel = Selector::parse("thead th").unwrap();
    let row_sel = Selector::parse("tbody tr").unwrap();
    let cell_sel = Selector::parse("td").unwrap();

    let Some(table) = doc.select(&table_sel).next() else {
        return Vec::new();
    };

    let titles: Vec<String> = table.select(&head_sel).map(|th| collect_text(&th)).collect();

    let mut players = Vec::new();
    for row in table.select(&row_sel) {
        let mut player = Player::default();
        for (i, td) in row.select(&cell_sel).enumerate() {
            let value = collect_text(&td);
            if value.is_empty() {
                continue;
            }
            match titles.get(i).map(String::as_str) {
                Some("IMO number") => player.imo = Some(value),
                Some("Name of company") => player.name = Some(value),
                Some("Address") => player.address = Some(value),
                Some("Role") => player.role = PlayerRole::from_raw(&value),
                Some("Date of effect") => {
                    player.date_of_effect =
                        parse_date(&value, &["since ", "during ", "before "]);
                }
                _ => {}
            }
        }
        players.push(player);
    }
    players
}

/// All classification rows share the same classes and attributes. We look
/// for the section headers and parse subsequent rows according to which
/// section we are in.
fn parse_classification(doc: &Html) -> (Vec<ClassificationStatus>, Vec<ClassificationSurvey>) {
    let body_sel = Selector::parse("#collapse4 .access-body").unwrap();
    let link_sel = Selector::parse("a").unwrap();

    let mut statuses = Vec::new();
    let mut surveys = Vec::new();
    let mut current_section: Option<String> = None;

    for row in doc.select(&body_sel) {
        let fields = text_fields(&row);
        if fields.len() == 1 {
            current_section = Some(fields[0].clone());
            continue;
        }
        match current_section.as_deref() {
            Some(STATUS_SECTION) => {
                let status = ClassificationStatus {
                    classification_society: fields.first().cloned(),
                    status: fields.get(1).cloned(),
                    status_change_date: fields
                        .get(2)
                        .and_then(|raw| parse_date(raw, &["since ", "during ", "before "])),
                };
                if status.classification_society.is_some() {
                    statuses.push(status);
                }
            }
            Some(SURVEYS_SECTION) => {
                let survey = ClassificationSurvey {
                    classification_society: fields.first().cloned(),
                    last_renewal_date: fields.get(2).and_then(|raw| parse_date(raw, &[])),
                    next_renewal_date: fields.get(4).and_then(|raw| parse_date(raw, &[])),
                    details_url: row
                        .select(&link_sel)
                        .next()
                        .and_then(|a| a.value().attr("href"))
                        .map(String::from),
                };
                if survey.classification_society.is_some() {
                    surveys.push(survey);
                }
            }
            _ => debug!(content = ?fields, "skipped a classification row"),
        }
    }

    (statuses, surveys)
}

/// Parse a raw day-first date, stripping any of `exclude` beforehand.
pub fn parse_date(raw: &str, exclude: &[&str]) -> Option<DateTime<Utc>> {
    let mut cleaned = raw.to_string();
    for token in exclude {
        cleaned = cleaned.replace(token, "");
    }
    let cleaned = cleaned.trim().trim_matches(|c| c == '(' || c == ')');
    if cleaned.is_empty() {
        return None;
    }

    for format in ["%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y-%m-%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(cleaned, format) {
            return date
                .and_hms_opt(0, 0, 0)
                .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }
    warn!(raw = cleaned, "could not parse date");
    None
}

fn parse_u32(raw: &str) -> Option<u32> {
    raw.replace([',', ' '], "").parse().ok()
}

/// Non-empty text fields inside a node, one entry per text node. Fields
/// with only spacing are considered empty.
fn text_fields(node: &ElementRef) -> Vec<String> {
    node.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

fn collect_text(node: &ElementRef) -> String {
    node.text().collect::<String>().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    const VESSEL_PAGE: &str = r#"
    <html><body>
      <div class="info-details">
        <h4><b><span>OCEAN TRADER</span><span>9232876</span></b></h4>
        <span class="badge">updated on 14/08/2019</span>
      </div>
      <div class="access-item">
        <div class="row"><span>Flag</span><span>(Panama)</span></div>
        <div class="row"><span>Call Sign</span><span>3EUV8</span></div>
        <div class="row"><span>MMSI</span><span>352898000</span></div>
        <div class="row"><span>Gross tonnage</span><span>27547</span></div>
        <div class="row"><span>DWT</span><span>46197</span></div>
        <div class="row"><span>Type of ship</span><span>Chemical/Oil Products Tanker</span></div>
        <div class="row"><span>Year of build</span><span>2002</span></div>
        <div class="row"><span>Status</span><span>In Service/Commission</span><span>(since 18/05/2019)</span></div>
      </div>
      <div id="collapse3"><table class="tableLS">
        <thead><tr><th>IMO number</th><th>Role</th><th>Name of company</th><th>Address</th><th>Date of effect</th></tr></thead>
        <tbody>
          <tr><td>5051266</td><td>Registered owner</td><td>OCEAN SHIPHOLDING</td><td>Majuro, Marshall Islands</td><td>since 01/06/2017</td></tr>
        </tbody>
      </table></div>
      <div id="collapse4">
        <div class="access-body"><span>Status</span></div>
        <div class="access-body"><span>Bureau Veritas</span><span>In class</span><span>since 05/03/2018</span></div>
        <div class="access-body"><span>Surveys</span></div>
        <div class="access-body"><a href="/survey/123"><span>Bureau Veritas</span><span>Renewal</span><span>05/03/2018</span><span>due</span><span>05/03/2023</span></a></div>
      </div>
    </body></html>
    "#;

    #[test]
    fn vessel_details_parse_completely() {
        let vessel = parse_vessel_details(VESSEL_PAGE).unwrap();
        assert_eq!(vessel.imo, "9232876");
        assert_eq!(vessel.name.as_deref(), Some("OCEAN TRADER"));
        assert_eq!(vessel.flag_name.as_deref(), Some("Panama"));
        assert_eq!(vessel.dead_weight, Some(46197));
        assert_eq!(vessel.gross_tonnage, Some(27547));
        assert_eq!(vessel.build_year, Some(2002));
        assert_eq!(vessel.status, Some(VesselStatus::InService));
        assert_eq!(vessel.reported_date.map(|d| d.year()), Some(2019));

        assert_eq!(vessel.companies.len(), 1);
        let owner = &vessel.companies[0];
        assert_eq!(owner.imo.as_deref(), Some("5051266"));
        assert_eq!(owner.role, Some(PlayerRole::Owner));
        assert_eq!(owner.name.as_deref(), Some("OCEAN SHIPHOLDING"));
        assert!(owner.date_of_effect.is_some());

        assert_eq!(vessel.classification_statuses.len(), 1);
        assert_eq!(
            vessel.classification_statuses[0].status.as_deref(),
            Some("In class")
        );
        assert_eq!(vessel.classification_surveys.len(), 1);
        assert_eq!(
            vessel.classification_surveys[0].details_url.as_deref(),
            Some("/survey/123")
        );
    }

    #[test]
    fn empty_page_is_a_parse_error() {
        let err = parse_vessel_details("<html><body></body></html>").unwrap_err();
        assert!(matches!(err, ScraperError::Parse(_)));
    }

    #[test]
    fn imos_deduped_from_search_results() {
        let html = r#"
        <form name="formShip"><table>
          <tr><td><a onclick="ship('9232876')">OCEAN TRADER</a></td></tr>
          <tr><td><a onclick="ship('9232876')">OCEAN TRADER</a></td></tr>
          <tr><td><a onclick="ship('6510215')">BERRIZ</a></td></tr>
        </table></form>
        "#;
        let imos = parse_imos_from_search_results(html);
        assert_eq!(imos, vec!["6510215".to_string(), "9232876".to_string()]);
    }

    #[test]
    fn pagination_labels_extracted() {
        let html = r#"
        <ul class="pagination">
          <li><a>1</a></li><li><a>2</a></li><li><a> &gt; </a></li>
        </ul>
        "#;
        let pages = parse_page_links(html);
        assert_eq!(pages, vec!["1", "2", ">"]);
        assert!(parse_page_links("<html></html>").is_empty());
    }

    #[test]
    fn dayfirst_dates_parse_with_exclusions() {
        let date = parse_date("since 18/05/2019", &["since ", "during ", "before "]).unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2019, 5, 18));
        assert!(parse_date("", &[]).is_none());
        assert!(parse_date("not a date", &[]).is_none());
    }
}
