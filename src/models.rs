use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchCategory {
    Pending,
    Conviction,
}

impl SearchCategory {
    pub const ALL: [SearchCategory; 2] = [SearchCategory::Pending, SearchCategory::Conviction];

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchCategory::Pending => "pending",
            SearchCategory::Conviction => "conviction",
        }
    }
}

impl fmt::Display for SearchCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(SearchCategory::Pending),
            "conviction" => Ok(SearchCategory::Conviction),
            other => Err(format!("unknown search category '{}'", other)),
        }
    }
}

/// One charge row. Every field is always present; cells missing from the
/// source row are defaulted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChargeRecord {
    pub statute: String,
    pub description: String,
    pub class: String,
    pub charge_type: String,
    pub occurrence: String,
    pub offense_date: String,
    pub plea: String,
    pub verdict_finding: String,
    pub verdict_date: String,
    pub fine: String,
    pub fees: String,
    pub sentence_text: String,
    pub is_modified: bool,
    pub modified_finding: String,
    pub modified_date: String,
    pub modified_fine: String,
    pub modified_fees: String,
}

impl Default for ChargeRecord {
    fn default() -> Self {
        ChargeRecord {
            statute: String::new(),
            description: String::new(),
            class: String::new(),
            charge_type: String::new(),
            occurrence: "1".to_string(),
            offense_date: String::new(),
            plea: String::new(),
            verdict_finding: String::new(),
            verdict_date: String::new(),
            fine: "$0.00".to_string(),
            fees: "$0.00".to_string(),
            sentence_text: String::new(),
            is_modified: false,
            modified_finding: String::new(),
            modified_date: String::new(),
            modified_fine: String::new(),
            modified_fees: String::new(),
        }
    }
}

impl ChargeRecord {
    pub fn key(&self) -> (&str, &str) {
        (self.statute.as_str(), self.description.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PaymentStatus {
    NoCost,
    PaidInFull,
    PartiallyPaid,
    Unpaid,
    Unknown,
}

impl PaymentStatus {
    /// Derived from the "$1,234.50" style cost and paid labels.
    pub fn from_amounts(total_cost: &str, amount_paid: &str) -> PaymentStatus {
        let parse = |s: &str| -> Option<f64> {
            let cleaned: String = s.chars().filter(|c| *c != '$' && *c != ',').collect();
            let cleaned = cleaned.trim();
            if cleaned.is_empty() {
                return None;
            }
            cleaned.parse::<f64>().ok()
        };

        match (parse(total_cost), parse(amount_paid)) {
            (Some(cost), _) if cost == 0.0 => PaymentStatus::NoCost,
            (Some(cost), Some(paid)) if paid >= cost => PaymentStatus::PaidInFull,
            (Some(_), Some(paid)) if paid > 0.0 => PaymentStatus::PartiallyPaid,
            (Some(_), Some(_)) => PaymentStatus::Unpaid,
            _ => PaymentStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::NoCost => "NO COST",
            PaymentStatus::PaidInFull => "PAID IN FULL",
            PaymentStatus::PartiallyPaid => "PARTIALLY PAID",
            PaymentStatus::Unpaid => "UNPAID",
            PaymentStatus::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PendingRecord {
    pub docket_number: String,
    pub defendant_name: String,
    pub defendant_attorney: String,
    pub birth_year: String,
    pub times_in_court: String,
    pub arresting_agency: String,
    pub arrest_date: String,
    pub companion_docket: String,
    pub docket_type: String,
    pub court: String,
    pub bond_amount: String,
    pub bond_type: String,
    pub sidebar_flag: String,
    pub hearing_purpose: String,
    pub hearing_date: String,
    pub hearing_reason: String,
    pub source_url: String,
    pub charges: Vec<ChargeRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvictionRecord {
    pub docket_number: String,
    pub defendant_name: String,
    pub defendant_attorney: String,
    pub birth_year: String,
    pub case_status: String,
    pub file_date: String,
    pub offense_date: String,
    pub arrest_date: String,
    pub arresting_agency: String,
    pub plea_date: String,
    pub disposition_date: String,
    pub court: String,
    pub overall_sentence: String,
    pub total_cost: String,
    pub amount_paid: String,
    pub payment_status: PaymentStatus,
    pub source_url: String,
    pub charges: Vec<ChargeRecord>,
}

impl Default for ConvictionRecord {
    fn default() -> Self {
        ConvictionRecord {
            docket_number: String::new(),
            defendant_name: String::new(),
            defendant_attorney: String::new(),
            birth_year: String::new(),
            case_status: String::new(),
            file_date: String::new(),
            offense_date: String::new(),
            arrest_date: String::new(),
            arresting_agency: String::new(),
            plea_date: String::new(),
            disposition_date: String::new(),
            court: String::new(),
            overall_sentence: String::new(),
            total_cost: String::new(),
            amount_paid: String::new(),
            payment_status: PaymentStatus::Unknown,
            source_url: String::new(),
            charges: Vec::new(),
        }
    }
}

/// Fields every record kind exposes to the storage side.
pub trait CaseIdentity {
    fn docket_number(&self) -> &str;
    fn defendant_name(&self) -> &str;
    fn court(&self) -> &str;
    fn arrest_date(&self) -> &str;
    fn source_url(&self) -> &str;
    fn charges(&self) -> &[ChargeRecord];
}

impl CaseIdentity for PendingRecord {
    fn docket_number(&self) -> &str { &self.docket_number }
    fn defendant_name(&self) -> &str { &self.defendant_name }
    fn court(&self) -> &str { &self.court }
    fn arrest_date(&self) -> &str { &self.arrest_date }
    fn source_url(&self) -> &str { &self.source_url }
    fn charges(&self) -> &[ChargeRecord] { &self.charges }
}

impl CaseIdentity for ConvictionRecord {
    fn docket_number(&self) -> &str { &self.docket_number }
    fn defendant_name(&self) -> &str { &self.defendant_name }
    fn court(&self) -> &str { &self.court }
    fn arrest_date(&self) -> &str { &self.arrest_date }
    fn source_url(&self) -> &str { &self.source_url }
    fn charges(&self) -> &[ChargeRecord] { &self.charges }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CaseRecord {
    Pending(PendingRecord),
    Conviction(ConvictionRecord),
}

impl CaseRecord {
    pub fn category(&self) -> SearchCategory {
        match self {
            CaseRecord::Pending(_) => SearchCategory::Pending,
            CaseRecord::Conviction(_) => SearchCategory::Conviction,
        }
    }

    pub fn identity(&self) -> &dyn CaseIdentity {
        match self {
            CaseRecord::Pending(r) => r,
            CaseRecord::Conviction(r) => r,
        }
    }
}
