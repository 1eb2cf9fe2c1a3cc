use chrono::{Datelike, NaiveDate};
use log::debug;

const DATE_FORMATS: [&str; 9] = [
    "%m/%d/%Y",
    "%m/%d/%y",
    "%Y-%m-%d",
    "%m-%d-%Y",
    "%m-%d-%y",
    "%d/%m/%Y",
    "%Y/%m/%d",
    "%b %d, %Y",
    "%B %d, %Y",
];

/// Converts the portal's date labels to `YYYY-MM-DD`. A trailing time part
/// is dropped. Returns `None` for blanks and anything unrecognized.
pub fn normalize_date(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
        return None;
    }

    // "Dec 14, 2019" has spaces but no time part
    let candidate = if trimmed.contains(',') {
        trimmed
    } else {
        trimmed.split_whitespace().next().unwrap_or(trimmed)
    };

    for fmt in DATE_FORMATS {
        let Ok(date) = NaiveDate::parse_from_str(candidate, fmt) else { continue };
        // %Y also accepts "19"; leave short years to the %y formats
        if fmt.contains("%Y") && date.year() < 1000 {
            continue;
        }
        return Some(date.format("%Y-%m-%d").to_string());
    }

    debug!("Could not parse date: {}", raw);
    None
}

/// ISO form when parseable, the raw text otherwise.
pub fn normalize_or_keep(raw: &str) -> String {
    normalize_date(raw).unwrap_or_else(|| raw.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_portal_formats() {
        assert_eq!(normalize_date("12/14/2019").as_deref(), Some("2019-12-14"));
        assert_eq!(normalize_date("12/14/19").as_deref(), Some("2019-12-14"));
        assert_eq!(normalize_date("2019-12-14").as_deref(), Some("2019-12-14"));
        assert_eq!(normalize_date("Dec 14, 2019").as_deref(), Some("2019-12-14"));
        assert_eq!(normalize_date("12/14/2019 9:30 AM").as_deref(), Some("2019-12-14"));
    }

    #[test]
    fn two_digit_years_land_in_this_century() {
        assert_eq!(normalize_date("03/02/21").as_deref(), Some("2021-03-02"));
        assert_eq!(normalize_date("06-13-19").as_deref(), Some("2019-06-13"));
        assert_eq!(normalize_date("06-13-2019").as_deref(), Some("2019-06-13"));
    }

    #[test]
    fn blanks_and_garbage_are_none() {
        assert_eq!(normalize_date(""), None);
        assert_eq!(normalize_date("NULL"), None);
        assert_eq!(normalize_date("sometime"), None);
        assert_eq!(normalize_or_keep(" sometime "), "sometime");
    }
}
