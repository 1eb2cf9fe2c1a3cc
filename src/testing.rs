//! Scripted stand-in for the docket portal, used by the unit tests.
//!
//! It enforces the same chain the real site does: a results postback is only
//! honoured when its event target and `__VIEWSTATE` both come from the page
//! served just before it. Anything else gets the session-timeout page.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use crate::config::{DelayRange, HarvesterConfig, COURT_FIELD, DEFAULT_DAILY_DOCKET_PATH, DEFAULT_POSTBACK_PREFIX};
use crate::error::{SinkError, TransportError};
use crate::models::{CaseRecord, SearchCategory};
use crate::postback::EVENT_TARGET;
use crate::sink::CaseSink;
use crate::transport::{Method, Request, Response, Transport};

pub const SESSION_TIMEOUT_PAGE: &str =
    "<html><head><title>Session Timeout</title></head><body>Session Timeout. Please search again.</body></html>";

/// Shape of the fake result grid.
#[derive(Debug, Clone)]
pub struct GridSite {
    pub pages: u32,
    pub rows_per_page: u32,
    pub record_kind: SearchCategory,
    sealed: HashSet<(u32, u32)>,
}

impl GridSite {
    pub fn new(pages: u32, rows_per_page: u32) -> Self {
        GridSite {
            pages,
            rows_per_page,
            record_kind: SearchCategory::Conviction,
            sealed: HashSet::new(),
        }
    }

    pub fn with_record_kind(mut self, kind: SearchCategory) -> Self {
        self.record_kind = kind;
        self
    }

    pub fn seal(mut self, page: u32, row: u32) -> Self {
        self.sealed.insert((page, row));
        self
    }

    pub fn docket(page: u32, row: u32) -> String {
        format!("D{}-{}", page, row)
    }

    pub fn href(page: u32, row: u32) -> String {
        format!("CaseDetail.aspx?DocketNo={}", Self::docket(page, row))
    }

    fn hidden_inputs(state: u32) -> String {
        format!(
            r#"<input type="hidden" name="__EVENTTARGET" value="" />
<input type="hidden" name="__EVENTARGUMENT" value="" />
<input type="hidden" name="__VIEWSTATE" value="vs-{state}" />
<input type="hidden" name="__VIEWSTATEGENERATOR" value="5F1A2B" />
<input type="hidden" name="__EVENTVALIDATION" value="ev-{state}" />"#
        )
    }

    pub fn search_form(&self) -> String {
        format!(
            "<html><head><title>Search</title></head><body><form method=\"post\">{}<input name=\"_ctl0:cphBody:btnSearch\" type=\"submit\" value=\"Search\" /></form></body></html>",
            Self::hidden_inputs(0)
        )
    }

    pub fn results_page(&self, page: u32, with_marker: bool) -> String {
        let mut rows = String::new();
        for row in 1..=self.rows_per_page {
            let class = if row % 2 == 1 { "grdRow" } else { "grdRowAlt" };
            let title = if self.sealed.contains(&(page, row)) {
                "Sealed Case".to_string()
            } else {
                format!("Docket {}", Self::docket(page, row))
            };
            rows.push_str(&format!(
                "<tr class=\"{}\"><td><a id=\"cphBody_grdDockets_lnk{}\" href=\"{}\" title=\"{}\">{}</a></td></tr>\n",
                class,
                row,
                Self::href(page, row),
                title,
                Self::docket(page, row)
            ));
        }

        let marker = if with_marker {
            format!("<span>{}</span>", page)
        } else {
            format!("<b>{}</b>", page)
        };
        let next = if page < self.pages {
            format!(
                "<a href=\"javascript:__doPostBack(&#39;{}_ctl{}&#39;,&#39;&#39;)\">{}</a>",
                DEFAULT_POSTBACK_PREFIX,
                page,
                page + 1
            )
        } else {
            String::new()
        };

        format!(
            "<html><head><title>Search Results</title></head><body><form method=\"post\">{}\n<table id=\"cphBody_grdDockets\">\n{}<tr class=\"grdPager\"><td>{} {}</td></tr>\n</table></form></body></html>",
            Self::hidden_inputs(page),
            rows,
            marker,
            next
        )
    }
}

/// Minimal but complete record page with one charge.
pub fn record_markup(kind: SearchCategory, docket: &str) -> String {
    let title = match kind {
        SearchCategory::Pending => "Pending Case Detail",
        SearchCategory::Conviction => "Conviction Case Detail",
    };
    format!(
        r#"<html><head><title>{title}</title></head><body>
<span id="cphBody_lblDocketNo">{docket}</span>
<span id="cphBody_lblDefendant">DOE, JANE</span>
<span id="cphBody_lblCourt">Hartford GA 14</span>
<span id="cphBody_lblArrestDate">01/02/2020</span>
<table id="cphBody_Datagrid1">
<tr class="grdHeader"><td>Statute</td><td>Description</td></tr>
<tr class="grdRow"><td>53a-125b</td><td>Larceny 6th Deg</td><td>AM</td><td>M</td><td>1</td><td>01/01/2020</td><td>Guilty</td><td>Guilty</td><td>03/03/2020</td><td>$0.00</td><td>$140.00</td></tr>
</table>
</body></html>"#
    )
}

/// One court of the fake daily docket.
#[derive(Debug, Clone)]
pub struct DailyCourt {
    pub code: String,
    pub name: String,
    pub cases: u32,
}

impl DailyCourt {
    pub fn new(code: &str, name: &str, cases: u32) -> Self {
        DailyCourt { code: code.to_string(), name: name.to_string(), cases }
    }

    pub fn docket(&self, row: u32) -> String {
        format!("{}-{}", self.code, row)
    }
}

const DAILY_STATE: &str = "daily-vs";

fn daily_form(courts: &[DailyCourt]) -> String {
    let options: String = courts
        .iter()
        .map(|c| format!("<option value=\"{}\">{}</option>", c.code, c.name))
        .collect();
    format!(
        r#"<html><head><title>Daily Docket</title></head><body><form method="post">
<input type="hidden" name="__EVENTTARGET" value="" />
<input type="hidden" name="__VIEWSTATE" value="{DAILY_STATE}" />
<select name="_ctl0:cphBody:ddlCourts"><option value="">Select a court</option>{options}</select>
</form></body></html>"#
    )
}

fn daily_listing(court: &DailyCourt) -> String {
    let rows: String = (1..=court.cases)
        .map(|row| {
            format!(
                "<tr class=\"grdRow\"><td><a id=\"cphBody_grdDocket_lnk{row}\" href=\"CaseDetail.aspx?DocketNo={docket}\" title=\"Docket {docket}\">{docket}</a></td><td>10:00 AM</td></tr>\n",
                docket = court.docket(row)
            )
        })
        .collect();
    format!(
        r#"<html><head><title>Daily Docket</title></head><body>
<span id="cphBody_lblRecordCount">{}</span>
<table id="cphBody_grdDocket">
<tr class="grdHeader"><td><a>Docket No</a></td><td><a>Time</a></td></tr>
{}</table></body></html>"#,
        court.cases, rows
    )
}

pub struct ScriptedPortal {
    site: GridSite,
    courts: Vec<DailyCourt>,
    failing_courts: RefCell<HashSet<String>>,
    log: RefCell<Vec<Request>>,
    served: RefCell<Vec<u32>>,
    dropped_markers: RefCell<HashSet<u32>>,
    record_failures: RefCell<HashMap<String, u32>>,
}

impl ScriptedPortal {
    pub fn new(site: GridSite) -> Self {
        ScriptedPortal {
            site,
            courts: Vec::new(),
            failing_courts: RefCell::new(HashSet::new()),
            log: RefCell::new(Vec::new()),
            served: RefCell::new(Vec::new()),
            dropped_markers: RefCell::new(HashSet::new()),
            record_failures: RefCell::new(HashMap::new()),
        }
    }

    pub fn with_courts(mut self, courts: Vec<DailyCourt>) -> Self {
        self.courts = courts;
        self
    }

    /// Posts for `code` on the daily docket answer HTTP 500.
    pub fn fail_court(&self, code: &str) {
        self.failing_courts.borrow_mut().insert(code.to_string());
    }

    /// Court codes posted to the daily docket, in order.
    pub fn daily_posts(&self) -> Vec<String> {
        self.log
            .borrow()
            .iter()
            .filter(|r| r.url.contains(DEFAULT_DAILY_DOCKET_PATH) && matches!(r.method, Method::PostForm(_)))
            .filter_map(|r| r.form_value(COURT_FIELD).map(str::to_string))
            .collect()
    }

    fn serve_daily(&self, request: &Request) -> Response {
        if matches!(request.method, Method::Get) {
            return Response::ok(daily_form(&self.courts));
        }
        if request.form_value("__VIEWSTATE") != Some(DAILY_STATE) {
            return Response::ok(SESSION_TIMEOUT_PAGE);
        }
        let code = request.form_value(COURT_FIELD).unwrap_or_default();
        if self.failing_courts.borrow().contains(code) {
            return Response { status: 500, body: "Server Error".to_string() };
        }
        match self.courts.iter().find(|c| c.code == code) {
            Some(court) => Response::ok(daily_listing(court)),
            None => Response::ok(SESSION_TIMEOUT_PAGE),
        }
    }

    /// Results pages served, in order.
    pub fn served_pages(&self) -> Vec<u32> {
        self.served.borrow().clone()
    }

    /// Postbacks submitted to a results URL.
    pub fn postbacks(&self) -> Vec<Request> {
        self.log
            .borrow()
            .iter()
            .filter(|r| r.url.contains("SearchResults") && matches!(r.method, Method::PostForm(_)))
            .cloned()
            .collect()
    }

    /// Dockets whose record page was requested, in order.
    pub fn record_requests(&self) -> Vec<String> {
        self.log
            .borrow()
            .iter()
            .filter_map(|r| docket_param(&r.url))
            .collect()
    }

    pub fn drop_marker_on(&self, page: u32) {
        self.dropped_markers.borrow_mut().insert(page);
    }

    /// The next `times` requests for `docket` answer HTTP 500.
    pub fn fail_record(&self, docket: &str, times: u32) {
        self.record_failures.borrow_mut().insert(docket.to_string(), times);
    }

    fn serve_results(&self, page: u32) -> Response {
        self.served.borrow_mut().push(page);
        let with_marker = !self.dropped_markers.borrow().contains(&page);
        Response::ok(self.site.results_page(page, with_marker))
    }

    fn serve_record(&self, docket: &str) -> Response {
        let mut failures = self.record_failures.borrow_mut();
        if let Some(left) = failures.get_mut(docket) {
            if *left > 0 {
                *left -= 1;
                return Response { status: 500, body: "Server Error".to_string() };
            }
        }
        Response::ok(record_markup(self.site.record_kind, docket))
    }

    fn serve_postback(&self, request: &Request) -> Response {
        let target = request.form_value(EVENT_TARGET).unwrap_or_default();
        let state = request.form_value("__VIEWSTATE").unwrap_or_default();

        if target.is_empty() {
            if state != "vs-0" {
                return Response::ok(SESSION_TIMEOUT_PAGE);
            }
            return self.serve_results(1);
        }

        let from_page = target
            .strip_prefix(DEFAULT_POSTBACK_PREFIX)
            .and_then(|ctl| ctl.strip_prefix("_ctl"))
            .and_then(|n| n.parse::<u32>().ok());
        match from_page {
            Some(n) if state == format!("vs-{}", n) && n < self.site.pages => self.serve_results(n + 1),
            _ => Response::ok(SESSION_TIMEOUT_PAGE),
        }
    }
}

fn docket_param(url: &str) -> Option<String> {
    let (_, query) = url.split_once("CaseDetail.aspx?")?;
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("DocketNo="))
        .map(str::to_string)
}

impl Transport for ScriptedPortal {
    fn exchange(&self, request: &Request) -> Result<Response, TransportError> {
        self.log.borrow_mut().push(request.clone());
        if request.url.contains(DEFAULT_DAILY_DOCKET_PATH) {
            return Ok(self.serve_daily(request));
        }
        let response = match &request.method {
            Method::Get => match docket_param(&request.url) {
                Some(docket) => self.serve_record(&docket),
                None => Response::ok(self.site.search_form()),
            },
            Method::PostForm(_) => self.serve_postback(request),
        };
        Ok(response)
    }
}

/// Defaults with every pause set to zero.
pub fn quiet_config() -> HarvesterConfig {
    HarvesterConfig {
        page_delay: DelayRange::NONE,
        record_delay: DelayRange::NONE,
        record_retry_delay_secs: 0,
        transport_retry_delay_secs: 0,
        ..HarvesterConfig::default()
    }
}

/// Keeps stored records in memory; refuses the dockets it is told to.
#[derive(Default)]
pub struct VecSink {
    pub records: Vec<CaseRecord>,
    refuse: HashSet<String>,
}

impl VecSink {
    pub fn failing_on(dockets: &[&str]) -> Self {
        VecSink {
            records: Vec::new(),
            refuse: dockets.iter().map(|d| d.to_string()).collect(),
        }
    }

    pub fn dockets(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|r| r.identity().docket_number().to_string())
            .collect()
    }
}

impl CaseSink for VecSink {
    fn store(&mut self, record: &CaseRecord) -> Result<(), SinkError> {
        if self.refuse.contains(record.identity().docket_number()) {
            return Err(SinkError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full")));
        }
        self.records.push(record.clone());
        Ok(())
    }
}
