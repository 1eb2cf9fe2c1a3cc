use std::collections::HashMap;

use log::{debug, warn};
use regex::Regex;
use scraper::{Html, Selector};

use crate::error::ExtractionError;
use crate::markup::{extract_cells, find_table_after, find_table_by_id, normalize_cell, split_rows};
use crate::models::{CaseRecord, ChargeRecord, ConvictionRecord, PaymentStatus, PendingRecord, SearchCategory};

pub const CHARGES_TABLE_ID: &str = "cphBody_Datagrid1";
pub const PENDING_CHARGES_TABLE_ID: &str = "cphBody_grdCharges";
pub const MODIFIED_TABLE_ID: &str = "cphBody_DatagridModCharge";
pub const MODIFIED_HEADING: &str = "Modified Sentence Information";
pub const SENTENCE_TABLE_ID: &str = "cphBody_Datagrid2";

/// One row of the modified sentence table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifiedCharge {
    pub statute: String,
    pub description: String,
    pub finding: String,
    pub date: String,
    pub fine: String,
    pub fees: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub matched: usize,
    /// `(statute, description)` of modification rows with no charge to land on.
    pub unmatched: Vec<(String, String)>,
}

/// An extracted record plus whatever was wrong with its markup. Problems
/// never stop extraction; the record comes back with defaults instead.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub record: CaseRecord,
    pub issues: Vec<ExtractionError>,
    pub reconcile: ReconcileReport,
}

impl Extraction {
    pub fn is_degraded(&self) -> bool {
        !self.issues.is_empty()
    }
}

/// The record kind named by the last `<title>` of the page.
pub fn detect_record_kind(raw: &str) -> Option<SearchCategory> {
    let document = Html::parse_document(raw);
    let titles = Selector::parse("title").ok()?;
    let title = document.select(&titles).last()?.text().collect::<String>().to_lowercase();
    if title.contains("pending") {
        Some(SearchCategory::Pending)
    } else if title.contains("conviction") {
        Some(SearchCategory::Conviction)
    } else {
        None
    }
}

fn cell(cells: &[String], i: usize) -> String {
    cells.get(i).cloned().unwrap_or_default()
}

fn cell_or(cells: &[String], i: usize, default: &str) -> String {
    match cells.get(i) {
        Some(v) if !v.is_empty() => v.clone(),
        _ => default.to_string(),
    }
}

/// Maps the fixed column order of the charge grid onto a charge. Short rows
/// are padded with the portal's defaults.
pub fn charge_from_cells(cells: &[String]) -> ChargeRecord {
    ChargeRecord {
        statute: cell(cells, 0),
        description: cell(cells, 1),
        class: cell(cells, 2),
        charge_type: cell(cells, 3),
        occurrence: cell_or(cells, 4, "1"),
        offense_date: cell(cells, 5),
        plea: cell(cells, 6),
        verdict_finding: cell(cells, 7),
        verdict_date: cell(cells, 8),
        fine: cell_or(cells, 9, "$0.00"),
        fees: cell_or(cells, 10, "$0.00"),
        ..ChargeRecord::default()
    }
}

fn modified_from_cells(cells: &[String]) -> ModifiedCharge {
    ModifiedCharge {
        statute: cell(cells, 0),
        description: cell(cells, 1),
        finding: cell(cells, 7),
        date: cell(cells, 8),
        fine: cell_or(cells, 9, "$0.00"),
        fees: cell_or(cells, 10, "$0.00"),
    }
}

/// Marks the charges that the modification rows refer to.
///
/// The k-th modification row with a given `(statute, description)` lands on
/// the k-th charge with that pair, so repeated identical charges are matched
/// in order.
pub fn reconcile(charges: &mut [ChargeRecord], modified: &[ModifiedCharge]) -> ReconcileReport {
    let mut report = ReconcileReport::default();
    let mut seen: HashMap<(&str, &str), usize> = HashMap::new();

    for m in modified {
        let nth = seen.entry((m.statute.as_str(), m.description.as_str())).or_insert(0);
        *nth += 1;

        let target = charges
            .iter_mut()
            .filter(|c| c.key() == (m.statute.as_str(), m.description.as_str()))
            .nth(*nth - 1)
            .filter(|c| !c.is_modified);

        match target {
            Some(charge) => {
                charge.is_modified = true;
                charge.modified_finding = m.finding.clone();
                charge.modified_date = m.date.clone();
                charge.modified_fine = m.fine.clone();
                charge.modified_fees = m.fees.clone();
                report.matched += 1;
            }
            None => {
                warn!(
                    "Modification row {} / {} (occurrence {}) has no matching charge",
                    m.statute, m.description, nth
                );
                report.unmatched.push((m.statute.clone(), m.description.clone()));
            }
        }
    }
    report
}

fn first_table<'h>(raw: &'h str, ids: &[&str]) -> Option<&'h str> {
    ids.iter().find_map(|id| find_table_by_id(raw, id)).map(|span| &raw[span])
}

/// Labels of a record page keyed by the last segment of their id
/// (`cphBody_lblDocketNo` -> `lblDocketNo`).
struct Labels(HashMap<String, String>);

impl Labels {
    fn parse(document: &Html) -> Labels {
        let mut labels = HashMap::new();
        if let Ok(spans) = Selector::parse("span[id]") {
            for span in document.select(&spans) {
                let Some(id) = span.value().attr("id") else { continue };
                let key = id.rsplit('_').next().unwrap_or(id);
                let text = span.text().collect::<Vec<_>>().join(" ");
                labels.entry(key.to_string()).or_insert_with(|| normalize_cell(&text));
            }
        }
        Labels(labels)
    }

    fn get(&self, key: &str) -> String {
        self.0.get(key).cloned().unwrap_or_default()
    }
}

pub struct RecordExtractor {
    sentence_regex: Regex,
}

impl Default for RecordExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordExtractor {
    pub fn new() -> Self {
        RecordExtractor {
            sentence_regex: Regex::new(r"(?is)<b>\s*Sentenced:\s*</b>\s*([^<]+)").expect("static regex"),
        }
    }

    fn sentence_in(&self, row: &str) -> Option<String> {
        self.sentence_regex
            .captures(row)
            .and_then(|c| c.get(1))
            .map(|m| normalize_cell(m.as_str()))
            .filter(|s| !s.is_empty())
    }

    /// Charges of the main grid, scanned from the raw markup.
    pub fn charges(&self, raw: &str, table_ids: &[&str]) -> Result<Vec<ChargeRecord>, ExtractionError> {
        let table = first_table(raw, table_ids)
            .ok_or_else(|| ExtractionError::TableNotFound(table_ids.join(" / ")))?;

        let mut charges: Vec<ChargeRecord> = Vec::new();
        for span in split_rows(table) {
            let row = &table[span];
            let cells = extract_cells(row);
            let sentence = self.sentence_in(row);

            if cells.first().map_or(true, |s| s.is_empty()) {
                // continuation row carrying the previous charge's sentence
                if let (Some(text), Some(last)) = (sentence, charges.last_mut()) {
                    if last.sentence_text.is_empty() {
                        last.sentence_text = text;
                    } else {
                        last.sentence_text = format!("{} {}", last.sentence_text, text);
                    }
                }
                continue;
            }

            let mut charge = charge_from_cells(&cells);
            if let Some(text) = sentence {
                charge.sentence_text = text;
            }
            charges.push(charge);
        }
        Ok(charges)
    }

    /// Rows of the modified sentence table. Rows without both statute and
    /// description are not modifications. No table means no modifications.
    pub fn modified_charges(&self, raw: &str) -> Vec<ModifiedCharge> {
        let span = find_table_by_id(raw, MODIFIED_TABLE_ID).or_else(|| find_table_after(raw, MODIFIED_HEADING));
        let Some(span) = span else { return Vec::new() };
        let table = &raw[span];

        split_rows(table)
            .into_iter()
            .map(|row| extract_cells(&table[row]))
            .filter(|cells| {
                cells.len() >= 2 && !cells[0].is_empty() && !cells[1].is_empty()
            })
            .map(|cells| modified_from_cells(&cells))
            .collect()
    }

    fn overall_sentence(document: &Html) -> String {
        let css = format!("table#{id} tr.grdRow td, table#{id} tr.grdRowAlt td", id = SENTENCE_TABLE_ID);
        let Ok(rows) = Selector::parse(&css) else {
            return String::new();
        };
        document
            .select(&rows)
            .map(|td| normalize_cell(&td.text().collect::<Vec<_>>().join(" ")))
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Extracts one record page. Never fails outright: missing pieces are
    /// reported in `issues` and defaulted in the record.
    pub fn extract(&self, raw: &str, kind: SearchCategory, source_url: &str) -> Extraction {
        let document = Html::parse_document(raw);
        let labels = Labels::parse(&document);
        let mut issues = Vec::new();

        let table_ids: &[&str] = match kind {
            SearchCategory::Pending => &[CHARGES_TABLE_ID, PENDING_CHARGES_TABLE_ID],
            SearchCategory::Conviction => &[CHARGES_TABLE_ID],
        };
        let mut charges = match self.charges(raw, table_ids) {
            Ok(charges) => charges,
            Err(e) => {
                warn!("{} for {}; record kept without charges", e, source_url);
                issues.push(e);
                Vec::new()
            }
        };

        let modified = self.modified_charges(raw);
        let reconcile = reconcile(&mut charges, &modified);
        if !modified.is_empty() {
            debug!(
                "{}: {} of {} modification rows matched",
                source_url,
                reconcile.matched,
                modified.len()
            );
        }

        let record = match kind {
            SearchCategory::Pending => CaseRecord::Pending(Self::pending(&labels, source_url, charges)),
            SearchCategory::Conviction => {
                let overall_sentence = Self::overall_sentence(&document);
                CaseRecord::Conviction(Self::conviction(&labels, source_url, charges, overall_sentence))
            }
        };

        if record.identity().docket_number().is_empty() {
            warn!("No docket number in {}", source_url);
            issues.push(ExtractionError::MissingField("docket number"));
        }

        Extraction { record, issues, reconcile }
    }

    fn pending(labels: &Labels, source_url: &str, charges: Vec<ChargeRecord>) -> PendingRecord {
        PendingRecord {
            docket_number: labels.get("lblDocketNo"),
            defendant_name: labels.get("lblDefendant"),
            defendant_attorney: labels.get("lblDefendantAttorney"),
            birth_year: labels.get("lblDefendantBirthDate"),
            times_in_court: labels.get("lblTimesInCourt"),
            arresting_agency: labels.get("lblArrestingAgency"),
            arrest_date: labels.get("lblArrestDate"),
            companion_docket: labels.get("lblCompanionDocketNo"),
            docket_type: labels.get("lblDocketType"),
            court: labels.get("lblCourt"),
            bond_amount: labels.get("lblBondAmount"),
            bond_type: labels.get("lblBondTypeDesc"),
            sidebar_flag: labels.get("lblSidebarFlag"),
            hearing_purpose: labels.get("lblPurposeDesc"),
            hearing_date: labels.get("lblHearingDate"),
            hearing_reason: labels.get("lblReasonDesc"),
            source_url: source_url.to_string(),
            charges,
        }
    }

    fn conviction(
        labels: &Labels,
        source_url: &str,
        charges: Vec<ChargeRecord>,
        overall_sentence: String,
    ) -> ConvictionRecord {
        let total_cost = labels.get("lblCost");
        let amount_paid = labels.get("Label4");
        let offense_date = charges
            .first()
            .map(|c| c.offense_date.clone())
            .unwrap_or_default();

        ConvictionRecord {
            docket_number: labels.get("lblDocketNo"),
            defendant_name: labels.get("lblDefendant"),
            defendant_attorney: labels.get("lblDefendantAttorney"),
            birth_year: labels.get("lblDefendantBirthDate"),
            case_status: labels.get("lblCaseStatus"),
            file_date: labels.get("lblFileDate"),
            offense_date,
            arrest_date: labels.get("lblArrestDate"),
            arresting_agency: labels.get("lblArrestingAgency"),
            plea_date: labels.get("lblPleaDate"),
            disposition_date: labels.get("lblSentDate"),
            court: labels.get("lblCourt"),
            overall_sentence,
            payment_status: PaymentStatus::from_amounts(&total_cost, &amount_paid),
            total_cost,
            amount_paid,
            source_url: source_url.to_string(),
            charges,
        }
    }
}
