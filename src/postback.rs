//! Reading the portal's postback state out of a results page.
//!
//! The grid only exposes "next page" as a `__doPostBack` link. Its control id
//! is read from the page that is currently displayed, and the hidden state
//! fields that must accompany it are single use, so both are re-derived from
//! every response.

use std::collections::BTreeMap;

use scraper::{Html, Selector};

use crate::config::SEARCH_BUTTON_FIELD;

pub const EVENT_TARGET: &str = "__EVENTTARGET";

pub const HIDDEN_FIELDS: [&str; 5] = [
    EVENT_TARGET,
    "__EVENTARGUMENT",
    "__VIEWSTATE",
    "__VIEWSTATEGENERATOR",
    "__EVENTVALIDATION",
];

fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("static selector")
}

/// The text the grid renders for the page it is showing.
pub fn page_marker(page_index: u32) -> String {
    format!("<span>{}</span>", page_index)
}

pub fn has_page_marker(markup: &str, page_index: u32) -> bool {
    markup.contains(&page_marker(page_index))
}

/// Hidden ASP.NET state as `(name, value)` in `HIDDEN_FIELDS` order.
/// Absent fields come back empty.
pub fn scrape_hidden_fields(markup: &str) -> Vec<(String, String)> {
    let document = Html::parse_document(markup);
    let inputs = selector("input[name]");

    let mut found: BTreeMap<&str, String> = BTreeMap::new();
    for input in document.select(&inputs) {
        let Some(name) = input.value().attr("name") else { continue };
        if let Some(field) = HIDDEN_FIELDS.iter().find(|f| **f == name) {
            let value = input.value().attr("value").unwrap_or_default();
            found.entry(*field).or_insert_with(|| value.to_string());
        }
    }

    HIDDEN_FIELDS
        .iter()
        .map(|f| (f.to_string(), found.remove(f).unwrap_or_default()))
        .collect()
}

/// Event target of the control that follows the current page marker, e.g.
/// `_ctl0$cphBody$grdDockets$_ctl54$_ctl3`. `None` when the marker is absent
/// or nothing follows it (last page).
pub fn derive_postback_target(markup: &str, page_index: u32, prefix: &str) -> Option<String> {
    let marker = page_marker(page_index);
    let after_marker = markup.find(&marker)? + marker.len();
    let rest = &markup[after_marker..];

    let control_start = rest.find(prefix)? + prefix.len();
    let tail = &rest[control_start..];
    let end = tail
        .find(|c: char| matches!(c, '&' | '\'' | '"' | ')' | ',' | '<' | '>') || c.is_whitespace())
        .unwrap_or(tail.len());
    let control_id = &tail[..end];
    if control_id.is_empty() {
        return None;
    }
    Some(format!("{}{}", prefix, control_id))
}

/// Form body for a results postback: the search criteria, the hidden state
/// scraped from the previous response, and the event target if paging.
pub fn build_postback_form(
    hidden: &[(String, String)],
    criteria: &BTreeMap<String, String>,
    event_target: Option<&str>,
) -> Vec<(String, String)> {
    let mut form: Vec<(String, String)> = Vec::with_capacity(hidden.len() + criteria.len() + 1);
    form.push((SEARCH_BUTTON_FIELD.to_string(), "Search".to_string()));
    for (k, v) in criteria {
        form.push((k.clone(), v.clone()));
    }
    for (k, v) in hidden {
        let value = match event_target {
            Some(target) if k == EVENT_TARGET => target.to_string(),
            _ => v.clone(),
        };
        form.push((k.clone(), value));
    }
    form
}

/// One docket link in the results grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub href: String,
    pub title: String,
    pub sealed: bool,
}

pub fn parse_listing(markup: &str) -> Vec<ListingEntry> {
    let document = Html::parse_document(markup);
    let rows = selector("tr.grdRow, tr.grdRowAlt");
    let links = selector("a[id]");

    let mut entries = Vec::new();
    for row in document.select(&rows) {
        let Some(link) = row.select(&links).next() else { continue };
        let Some(href) = link.value().attr("href") else { continue };
        let title = link.value().attr("title").unwrap_or_default().to_string();
        entries.push(ListingEntry {
            href: href.trim().to_string(),
            sealed: title.contains("Sealed"),
            title,
        });
    }
    entries
}
