use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use log::info;

use crate::date_utils::normalize_or_keep;
use crate::error::SinkError;
use crate::models::{CaseRecord, ChargeRecord};

/// Receiver of finished records. Implementations are expected to upsert on
/// the docket number; the crawler only promises complete records.
pub trait CaseSink {
    fn store(&mut self, record: &CaseRecord) -> Result<(), SinkError>;
}

impl<S: CaseSink + ?Sized> CaseSink for &mut S {
    fn store(&mut self, record: &CaseRecord) -> Result<(), SinkError> {
        (**self).store(record)
    }
}

impl<S: CaseSink + ?Sized> CaseSink for Box<S> {
    fn store(&mut self, record: &CaseRecord) -> Result<(), SinkError> {
        (**self).store(record)
    }
}

pub const CSV_HEADERS: [&str; 32] = [
    "category",
    "docket_number",
    "defendant_name",
    "defendant_attorney",
    "birth_year",
    "court",
    "arrest_date",
    "arresting_agency",
    "case_status",
    "disposition_date",
    "overall_sentence",
    "payment_status",
    "hearing_date",
    "bond_amount",
    "source_url",
    "statute",
    "description",
    "class",
    "type",
    "occurrence",
    "offense_date",
    "plea",
    "verdict_finding",
    "verdict_date",
    "fine",
    "fees",
    "sentence",
    "is_modified",
    "modified_finding",
    "modified_date",
    "modified_fine",
    "modified_fees",
];

/// Trailing header columns filled from a charge.
const CHARGE_COLUMNS: usize = 17;

/// One CSV row per charge. A record without charges still gets one row.
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
    rows_written: u64,
}

impl CsvSink<File> {
    /// Appends to `path`, writing the header only when the file is new.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SinkError> {
        let path = path.as_ref();
        let file_exists = path.exists() && path.metadata().map(|m| m.len() > 0).unwrap_or(false);
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        let mut sink = CsvSink {
            writer: csv::WriterBuilder::new().has_headers(false).from_writer(file),
            rows_written: 0,
        };
        if !file_exists {
            sink.writer.write_record(CSV_HEADERS)?;
            sink.writer.flush()?;
        } else {
            info!("Appending to existing output {:?}", path);
        }
        Ok(sink)
    }
}

impl<W: Write> CsvSink<W> {
    pub fn from_writer(inner: W) -> Result<Self, SinkError> {
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(inner);
        writer.write_record(CSV_HEADERS)?;
        Ok(CsvSink { writer, rows_written: 0 })
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    pub fn into_inner(self) -> Result<W, SinkError> {
        self.writer
            .into_inner()
            .map_err(|e| SinkError::Io(e.into_error()))
    }

    fn case_columns(record: &CaseRecord) -> Vec<String> {
        let id = record.identity();
        let mut cols = vec![
            record.category().as_str().to_string(),
            id.docket_number().to_string(),
            id.defendant_name().to_string(),
        ];
        match record {
            CaseRecord::Pending(r) => cols.extend([
                r.defendant_attorney.clone(),
                r.birth_year.clone(),
                r.court.clone(),
                normalize_or_keep(&r.arrest_date),
                r.arresting_agency.clone(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                normalize_or_keep(&r.hearing_date),
                r.bond_amount.clone(),
            ]),
            CaseRecord::Conviction(r) => cols.extend([
                r.defendant_attorney.clone(),
                r.birth_year.clone(),
                r.court.clone(),
                normalize_or_keep(&r.arrest_date),
                r.arresting_agency.clone(),
                r.case_status.clone(),
                normalize_or_keep(&r.disposition_date),
                r.overall_sentence.clone(),
                r.payment_status.as_str().to_string(),
                String::new(),
                String::new(),
            ]),
        }
        cols.push(id.source_url().to_string());
        cols
    }

    fn charge_columns(charge: Option<&ChargeRecord>) -> Vec<String> {
        let Some(c) = charge else {
            return vec![String::new(); CHARGE_COLUMNS];
        };
        vec![
            c.statute.clone(),
            c.description.clone(),
            c.class.clone(),
            c.charge_type.clone(),
            c.occurrence.clone(),
            normalize_or_keep(&c.offense_date),
            c.plea.clone(),
            c.verdict_finding.clone(),
            normalize_or_keep(&c.verdict_date),
            c.fine.clone(),
            c.fees.clone(),
            c.sentence_text.clone(),
            if c.is_modified { "yes".to_string() } else { "no".to_string() },
            c.modified_finding.clone(),
            normalize_or_keep(&c.modified_date),
            c.modified_fine.clone(),
            c.modified_fees.clone(),
        ]
    }
}

impl<W: Write> CaseSink for CsvSink<W> {
    fn store(&mut self, record: &CaseRecord) -> Result<(), SinkError> {
        let case = Self::case_columns(record);
        let charges = record.identity().charges();

        let mut rows: Vec<Option<&ChargeRecord>> = charges.iter().map(Some).collect();
        if rows.is_empty() {
            rows.push(None);
        }
        for charge in rows {
            let mut row = case.clone();
            row.extend(Self::charge_columns(charge));
            self.writer.write_record(&row)?;
            self.rows_written += 1;
        }
        self.writer.flush()?;
        Ok(())
    }
}
