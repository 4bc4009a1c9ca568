// ============================================================
// Layer 6 - Scalar Writer
// ============================================================
// Appends every scalar the trainer reports to scalars.csv in the
// run directory, one row per value:
//
//   step,name,value
//   0,mle_train_loss,9.874512
//   0,disc_train_loss,0.693147
//   0,disc_train_acc,0.500000
//   1,pg_train_loss,4.120034
//   ...
//
// The long format plots directly with pandas / gnuplot grouped by
// name, and new scalar names never change the header.
//
// A failed write is logged and dropped: ScalarSink is side-effect
// only and must never stop training.

use anyhow::Result;
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::domain::traits::ScalarSink;

pub const SCALARS_FILE: &str = "scalars.csv";

pub struct CsvScalarWriter {
    csv_path: PathBuf,
}

impl CsvScalarWriter {
    /// Create `<dir>/scalars.csv` with its header (if new).
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let csv_path = dir.join(SCALARS_FILE);

        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "step,name,value")?;
            tracing::debug!("Created scalar CSV: '{}'", csv_path.display());
        }
        Ok(Self { csv_path })
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }

    fn append(&self, scores: &[(&str, f64)], step: usize) -> std::io::Result<()> {
        let mut f = OpenOptions::new().append(true).open(&self.csv_path)?;
        for (name, value) in scores {
            writeln!(f, "{step},{name},{value:.6}")?;
        }
        Ok(())
    }
}

impl ScalarSink for CsvScalarWriter {
    fn write(&mut self, scores: &[(&str, f64)], step: usize) {
        if let Err(e) = self.append(scores, step) {
            tracing::warn!("Dropping scalars at step {}: {}", step, e);
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appends_one_row_per_scalar() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvScalarWriter::new(dir.path()).unwrap();
        sink.write(&[("disc_train_loss", 0.5), ("disc_train_acc", 0.75)], 3);
        sink.write(&[("mle_train_loss", 2.0)], 4);

        let text = fs::read_to_string(sink.csv_path()).unwrap();
        let rows: Vec<&str> = text.lines().collect();
        assert_eq!(
            rows,
            vec![
                "step,name,value",
                "3,disc_train_loss,0.500000",
                "3,disc_train_acc,0.750000",
                "4,mle_train_loss,2.000000",
            ]
        );
    }

    #[test]
    fn test_write_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvScalarWriter::new(dir.path()).unwrap();
        fs::remove_file(sink.csv_path()).unwrap();
        fs::create_dir(sink.csv_path()).unwrap();
        // Opening a directory for append fails; write must not panic
        sink.write(&[("x", 1.0)], 0);
    }
}
