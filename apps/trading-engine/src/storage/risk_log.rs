//! Append-only risk journal: daily P&L and VaR snapshots.

use std::fs::OpenOptions;
use std::path::PathBuf;

use super::StorageError;
use crate::models::{DailyPnlRecord, PnlKind};

/// File-backed append-only journal of [`DailyPnlRecord`] rows.
///
/// One `EOD` row per calendar day plus ad-hoc `Temp` rows written on
/// shutdown. Rows are never rewritten.
#[derive(Debug, Clone)]
pub struct RiskJournal {
    path: PathBuf,
}

impl RiskJournal {
    /// Journal at the given file path. The file may not exist yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append one record, writing the header when the file is new.
    pub fn append(&self, record: &DailyPnlRecord) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
        }

        let is_new = !self.path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StorageError::io(&self.path, e))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(is_new)
            .from_writer(file);
        writer.serialize(record)?;
        writer.flush().map_err(|e| StorageError::io(&self.path, e))
    }

    /// All journal rows, in append order. A missing file is empty.
    pub fn load(&self) -> Result<Vec<DailyPnlRecord>, StorageError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut rows = Vec::new();
        for result in reader.deserialize() {
            rows.push(result?);
        }
        Ok(rows)
    }

    /// The most recently appended `EOD` row, if any.
    pub fn last_eod(&self) -> Result<Option<DailyPnlRecord>, StorageError> {
        Ok(self
            .load()?
            .into_iter()
            .rfind(|row| row.kind == PnlKind::Eod))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn make_record(day: u32, kind: PnlKind) -> DailyPnlRecord {
        DailyPnlRecord {
            date: NaiveDate::from_ymd_opt(2026, 8, day).unwrap(),
            kind,
            var_pct: -0.042,
            var_value: -310.5,
            realised_pnl: dec!(125.40),
            unrealised_pnl: dec!(-12.05),
        }
    }

    #[test]
    fn test_append_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let journal = RiskJournal::new(dir.path().join("risk_history.csv"));

        journal.append(&make_record(20, PnlKind::Eod)).unwrap();
        journal.append(&make_record(21, PnlKind::Temp)).unwrap();

        let rows = journal.load().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].kind, PnlKind::Eod);
        assert_eq!(rows[1].kind, PnlKind::Temp);
        assert_eq!(rows[0].realised_pnl, dec!(125.40));
    }

    #[test]
    fn test_last_eod_skips_temp_rows() {
        let dir = tempfile::tempdir().unwrap();
        let journal = RiskJournal::new(dir.path().join("risk_history.csv"));

        journal.append(&make_record(19, PnlKind::Eod)).unwrap();
        journal.append(&make_record(20, PnlKind::Eod)).unwrap();
        journal.append(&make_record(21, PnlKind::Temp)).unwrap();

        let last = journal.last_eod().unwrap().unwrap();
        assert_eq!(last.kind, PnlKind::Eod);
        assert_eq!(last.date, NaiveDate::from_ymd_opt(2026, 8, 20).unwrap());
    }

    #[test]
    fn test_last_eod_empty_journal() {
        let dir = tempfile::tempdir().unwrap();
        let journal = RiskJournal::new(dir.path().join("risk_history.csv"));
        assert!(journal.last_eod().unwrap().is_none());
    }
}
