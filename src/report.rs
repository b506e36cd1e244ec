//! Repair report files. Writing uses our fixed column set; reading is
//! deliberately loose, because reports may come back from other tools or
//! older versions with different headers and status vocabularies. On read,
//! every column is kept keyed by (lowercased) header name and the row index
//! falls back to row position when no explicit column provides it.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::repair::ReportRow;
use crate::{Error, Result};

pub const REPORT_HEADER: [&str; 6] = [
    "status",
    "extinf_duration",
    "extinf_display",
    "original_path",
    "written_path",
    "notes",
];

/// One report row as read back for reconciliation: position, resolved row
/// index, and every column the file had.
#[derive(Debug, Clone)]
pub struct RawRow {
    /// 0-based position in the file, the fallback join key.
    pub position: usize,
    /// Explicit `row_index` column when present and non-empty, else the
    /// position rendered as a string.
    pub row_index: String,
    fields: BTreeMap<String, String>,
}

impl RawRow {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .get(column)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// First non-empty value among several column spellings.
    pub fn get_any(&self, columns: &[&str]) -> Option<&str> {
        columns.iter().find_map(|c| self.get(c))
    }

    pub fn status(&self) -> &str {
        self.get("status").unwrap_or_default()
    }

    pub fn display(&self) -> &str {
        self.get_any(&["extinf_display", "extinf"]).unwrap_or_default()
    }

    pub fn original_path(&self) -> &str {
        self.get_any(&["original_path", "original"]).unwrap_or_default()
    }

    pub fn notes(&self) -> &str {
        self.get("notes").unwrap_or_default()
    }

    pub fn extinf_duration(&self) -> Option<i64> {
        self.get("extinf_duration")?.trim().parse().ok()
    }

    #[cfg(test)]
    pub fn for_tests(position: usize, fields: &[(&str, &str)]) -> Self {
        let fields: BTreeMap<String, String> = fields
            .iter()
            .map(|(k, v)| (k.to_lowercase(), v.to_string()))
            .collect();
        let row_index = fields
            .get("row_index")
            .filter(|v| !v.trim().is_empty())
            .map(|v| v.trim().to_string())
            .unwrap_or_else(|| position.to_string());
        Self {
            position,
            row_index,
            fields,
        }
    }
}

/// Write a report snapshot: fixed header, one row per EXTINF unit in
/// playlist order.
pub fn write_report(path: &Path, rows: &[ReportRow]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    let mut writer = csv::Writer::from_path(path).map_err(|e| Error::Csv {
        path: path.to_path_buf(),
        source: e,
    })?;

    let wrap = |e: csv::Error| Error::Csv {
        path: path.to_path_buf(),
        source: e,
    };

    writer.write_record(REPORT_HEADER).map_err(wrap)?;
    for row in rows {
        let duration = row
            .extinf_duration
            .map(|d| d.to_string())
            .unwrap_or_default();
        writer
            .write_record([
                row.status.as_str(),
                &duration,
                &row.extinf_display,
                &row.original_path,
                &row.written_path,
                &row.notes,
            ])
            .map_err(wrap)?;
    }
    writer.flush().map_err(|e| Error::io(path, e))
}

/// Read a report leniently. Headers are lowercased and trimmed; unknown
/// columns are preserved so reconciliation can probe them.
pub fn read_report(path: &Path) -> Result<Vec<RawRow>> {
    if !path.exists() {
        return Err(Error::MissingReport(path.to_path_buf()));
    }

    let wrap = |e: csv::Error| Error::Csv {
        path: path.to_path_buf(),
        source: e,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(wrap)?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(wrap)?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();

    let mut rows = Vec::new();
    for (position, record) in reader.records().enumerate() {
        let record = record.map_err(wrap)?;

        let mut fields = BTreeMap::new();
        for (i, value) in record.iter().enumerate() {
            if let Some(name) = headers.get(i) {
                fields.insert(name.clone(), value.to_string());
            }
        }

        let row_index = fields
            .get("row_index")
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| position.to_string());

        rows.push(RawRow {
            position,
            row_index,
            fields,
        });
    }
    Ok(rows)
}
