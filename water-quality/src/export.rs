//! CSV export and re-import of pool history.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

use crate::error::ExportError;
use crate::evaluated::EvaluatedReading;
use crate::parameter::Parameter;
use crate::quality::Grade;

/// Exported parameter columns, in order, with their header labels.
pub const PARAMETER_COLUMNS: [(Parameter, &str); 14] = [
    (Parameter::Temperature, "Temp (°C)"),
    (Parameter::Turbidity, "Turbidity (cm)"),
    (Parameter::DissolvedOxygen, "DO (mg/L)"),
    (Parameter::Bod, "BOD (mg/L)"),
    (Parameter::Co2, "CO2 (mg/L)"),
    (Parameter::Ph, "pH"),
    (Parameter::Alkalinity, "Alkalinity (mg L-1)"),
    (Parameter::Hardness, "Hardness (mg L-1)"),
    (Parameter::Calcium, "Calcium (mg L-1)"),
    (Parameter::Ammonia, "Ammonia (mg L-1)"),
    (Parameter::Nitrite, "Nitrite (mg L-1)"),
    (Parameter::Phosphorus, "Phosphorus (mg L-1)"),
    (Parameter::H2s, "H2S (mg L-1)"),
    (Parameter::Plankton, "Plankton (No. L-1)"),
];

const LEADING: [&str; 3] = ["Timestamp", "Date", "Time"];
const TRAILING: [&str; 4] = ["Water Quality", "Status", "Active Alerts", "Notes"];
const COLUMN_COUNT: usize = LEADING.len() + PARAMETER_COLUMNS.len() + TRAILING.len();

/// One parsed row of an export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedRow {
    pub timestamp: DateTime<Utc>,
    pub values: BTreeMap<Parameter, f64>,
    pub water_quality: Grade,
    pub status: String,
    pub active_alerts: usize,
    pub notes: String,
}

pub fn headers() -> Vec<&'static str> {
    LEADING
        .iter()
        .copied()
        .chain(PARAMETER_COLUMNS.iter().map(|(_, h)| *h))
        .chain(TRAILING.iter().copied())
        .collect()
}

// ------------------------------------------------------------------ //
//  Export                                                             //
// ------------------------------------------------------------------ //

fn row(entry: &EvaluatedReading) -> Vec<String> {
    let mut cells = vec![
        entry.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        entry.timestamp.format("%Y-%m-%d").to_string(),
        entry.timestamp.format("%H:%M:%S").to_string(),
    ];
    for (parameter, _) in PARAMETER_COLUMNS {
        cells.push(format!("{:.*}", parameter.precision(), entry.value(parameter)));
    }
    cells.push(entry.quality.grade.as_str().to_string());
    cells.push(entry.quality.grade.as_str().to_lowercase());
    cells.push(entry.active_alerts().to_string());
    cells.push(entry.notes.clone());
    cells
}

/// Render entries (in the order given) as CSV with every cell quoted.
pub fn to_csv(entries: &[EvaluatedReading]) -> Result<String, ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(headers())?;
    for entry in entries {
        writer.write_record(row(entry))?;
    }
    let bytes = writer.into_inner().map_err(|e| ExportError::Csv(e.error().to_string()))?;
    String::from_utf8(bytes).map_err(|e| ExportError::Csv(e.to_string()))
}

/// `<pool name, whitespace runs as _>_WaterQuality_History_<date>.csv`
pub fn file_name(pool_name: &str, date: NaiveDate) -> String {
    let mut name = String::with_capacity(pool_name.len());
    let mut in_run = false;
    for c in pool_name.chars() {
        if c.is_whitespace() {
            if !in_run {
                name.push('_');
            }
            in_run = true;
        } else {
            name.push(c);
            in_run = false;
        }
    }
    format!("{}_WaterQuality_History_{}.csv", name, date.format("%Y-%m-%d"))
}

// ------------------------------------------------------------------ //
//  Import                                                             //
// ------------------------------------------------------------------ //

fn invalid(line: usize, column: &str, value: &str) -> ExportError {
    ExportError::InvalidCell { line, column: column.to_string(), value: value.to_string() }
}

/// Parse text produced by [`to_csv`].
pub fn parse(text: &str) -> Result<Vec<ExportedRow>, ExportError> {
    if text.trim().is_empty() {
        return Err(ExportError::Empty);
    }
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let header = reader.headers()?;
    if header.iter().ne(headers()) {
        return Err(ExportError::Header(header.iter().collect::<Vec<_>>().join(",")));
    }

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        let line_no = record.position().map_or(idx + 2, |p| p.line() as usize);
        if record.len() != COLUMN_COUNT {
            return Err(ExportError::CellCount { line: line_no, expected: COLUMN_COUNT, found: record.len() });
        }
        let cell = |i: usize| &record[i];

        let timestamp = DateTime::parse_from_rfc3339(cell(0))
            .map_err(|_| invalid(line_no, LEADING[0], cell(0)))?
            .with_timezone(&Utc);

        let mut values = BTreeMap::new();
        for (offset, (parameter, label)) in PARAMETER_COLUMNS.iter().enumerate() {
            let raw = cell(LEADING.len() + offset);
            let v: f64 = raw.parse().map_err(|_| invalid(line_no, label, raw))?;
            values.insert(*parameter, v);
        }

        let tail = LEADING.len() + PARAMETER_COLUMNS.len();
        let water_quality = Grade::from_str(cell(tail)).ok_or_else(|| invalid(line_no, TRAILING[0], cell(tail)))?;
        let active_alerts = cell(tail + 2)
            .parse()
            .map_err(|_| invalid(line_no, TRAILING[2], cell(tail + 2)))?;

        rows.push(ExportedRow {
            timestamp,
            values,
            water_quality,
            status: cell(tail + 1).to_string(),
            active_alerts,
            notes: cell(tail + 3).to_string(),
        });
    }
    Ok(rows)
}

// ------------------------------------------------------------------ //
//  Tests                                                              //
// ------------------------------------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::ledger::HistoryLedger;
    use crate::reading::Reading;
    use chrono::{Duration, TimeZone};

    fn sample_ledger() -> HistoryLedger {
        let mut ledger = HistoryLedger::new();
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
        for i in 0..5 {
            let reading = Reading::new(base + Duration::hours(i))
                .with(Parameter::Temperature, 18.0 + i as f64 * 1.337)
                .with(Parameter::Ammonia, 0.1234 * (i + 1) as f64)
                .with(Parameter::H2s, 0.0456)
                .with(Parameter::Plankton, 12_345.6)
                .with(Parameter::Ph, 7.019);
            ledger.append("bassin-1", EvaluatedReading::evaluate("bassin-1", &reading, &Catalog::default()));
        }
        ledger
    }

    #[test]
    fn header_has_fixed_column_order() {
        let h = headers();
        assert_eq!(h.len(), 21);
        assert_eq!(h[0], "Timestamp");
        assert_eq!(h[3], "Temp (°C)");
        assert_eq!(h[16], "Plankton (No. L-1)");
        assert_eq!(h[20], "Notes");
    }

    #[test]
    fn empty_export_is_header_only() {
        let csv = to_csv(&[]).unwrap();
        assert_eq!(csv.lines().count(), 1);
        assert!(parse(&csv).unwrap().is_empty());
    }

    #[test]
    fn cells_use_documented_precision() {
        let entries = sample_ledger().query("bassin-1", Some(1));
        let csv = to_csv(&entries).unwrap();
        let data = csv.lines().nth(1).unwrap();
        assert!(data.starts_with("\"2024-05-01T12:30:00.000Z\",\"2024-05-01\",\"12:30:00\",\"23.35\""));
        assert!(data.contains("\"0.617\""), "ammonia to 3 places: {data}");
        assert!(data.contains("\"0.046\""), "h2s to 3 places: {data}");
        assert!(data.contains("\"12346\""), "plankton to 0 places: {data}");
        assert!(data.contains("\"7.02\""), "ph to 2 places: {data}");
    }

    #[test]
    fn round_trip_within_precision() {
        let entries = sample_ledger().query("bassin-1", None);
        let rows = parse(&to_csv(&entries).unwrap()).unwrap();
        assert_eq!(rows.len(), entries.len());
        for (entry, row) in entries.iter().zip(&rows) {
            assert_eq!(row.timestamp, entry.timestamp);
            assert_eq!(row.water_quality, entry.quality.grade);
            assert_eq!(row.active_alerts, entry.active_alerts());
            assert_eq!(row.notes, entry.notes);
            for (parameter, _) in PARAMETER_COLUMNS {
                let tolerance = 0.5 * 10f64.powi(-(parameter.precision() as i32)) + 1e-9;
                let diff = (row.values[&parameter] - entry.value(parameter)).abs();
                assert!(diff <= tolerance, "{parameter}: {diff} > {tolerance}");
            }
        }
    }

    #[test]
    fn embedded_quotes_and_commas_survive() {
        let mut entries = sample_ledger().query("bassin-1", Some(1));
        entries[0].notes = "manual check, \"filter\" cleaned".to_string();
        let rows = parse(&to_csv(&entries).unwrap()).unwrap();
        assert_eq!(rows[0].notes, "manual check, \"filter\" cleaned");
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert_eq!(parse(""), Err(ExportError::Empty));
        assert!(matches!(parse("a,b,c"), Err(ExportError::Header(_))));

        let header = headers().join(",");
        assert!(matches!(
            parse(&format!("{header}\n\"x\",\"y\"")),
            Err(ExportError::CellCount { line: 2, .. })
        ));
        assert!(matches!(
            parse(&format!("{header}\n\"unterminated")),
            Err(ExportError::CellCount { line: 2, found: 1, .. })
        ));

        let csv = to_csv(&sample_ledger().query("bassin-1", Some(1))).unwrap();
        assert_eq!(
            parse(&csv.replace("\"23.35\"", "\"warm\"")),
            Err(ExportError::InvalidCell { line: 2, column: "Temp (°C)".into(), value: "warm".into() })
        );
    }

    #[test]
    fn multi_line_notes_survive() {
        let mut entries = sample_ledger().query("bassin-1", Some(2));
        entries[0].notes = "line one\nline two".to_string();
        let rows = parse(&to_csv(&entries).unwrap()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].notes, "line one\nline two");
        assert_eq!(rows[1].notes, entries[1].notes);
        assert_eq!(rows[1].timestamp, entries[1].timestamp);
    }

    #[test]
    fn file_name_collapses_whitespace() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert_eq!(file_name("North  Basin 2", date), "North_Basin_2_WaterQuality_History_2024-05-01.csv");
        assert_eq!(file_name(" North\t Basin ", date), "_North_Basin__WaterQuality_History_2024-05-01.csv");
    }
}
