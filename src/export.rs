use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::attempt::Attempt;

#[derive(Debug, Serialize)]
struct HistoryRow<'a> {
    id: i64,
    test_id: u32,
    correct: u32,
    total: u32,
    score: u8,
    date: &'a str,
}

/// Writes `attempts` as CSV with a header row, in the order given.
pub fn write_history_csv<W: Write>(attempts: &[Attempt], writer: W) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);

    for a in attempts {
        wtr.serialize(HistoryRow {
            id: a.id.0,
            test_id: a.test_id,
            correct: a.correct_count,
            total: a.total_count,
            score: a.score_percent,
            date: &a.timestamp_iso,
        })?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn export_history<P: AsRef<Path>>(attempts: &[Attempt], path: P) -> Result<(), csv::Error> {
    if let Some(parent) = path.as_ref().parent() {
        std::fs::create_dir_all(parent)?;
    }
    write_history_csv(attempts, File::create(path)?)
}
