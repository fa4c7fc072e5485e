//! Optional tabular recording of per-iteration state.
//!
//! Each method that is handed a recorder writes one CSV table per kind of
//! row (per-particle state, per-poll candidates, per-iteration bests) under
//! a common output directory.  Table creation is idempotent; rows buffer in
//! memory and flush in one batch per iteration.  Write failures are logged
//! and swallowed: persistence must never abort an optimization.

use std::collections::HashMap;
use std::fs::{create_dir_all, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

struct Table {
    path: PathBuf,
    columns: Vec<String>,
    header_written: bool,
    pending: Vec<Vec<f64>>,
}

/// A CSV-table sink for optimization traces.
pub struct Recorder {
    dir: PathBuf,
    tables: Mutex<HashMap<String, Table>>,
}

impl Recorder {
    /// A recorder writing its tables under `dir` (created on first commit).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Recorder {
            dir: dir.into(),
            tables: Mutex::new(HashMap::new()),
        }
    }

    /// Declare a table.  Calling again with the same name is a no-op, so
    /// methods declare their schema unconditionally at construction.
    pub fn table(&self, name: &str, columns: &[impl AsRef<str>]) {
        let mut tables = self.tables.lock().unwrap();
        if tables.contains_key(name) {
            return;
        }
        tables.insert(
            name.to_string(),
            Table {
                path: self.dir.join(format!("{}.csv", name)),
                columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
                header_written: false,
                pending: Vec::new(),
            },
        );
    }

    /// Buffer one row for `name`.  Rows for undeclared tables are dropped
    /// with a warning.
    pub fn append(&self, name: &str, row: Vec<f64>) {
        let mut tables = self.tables.lock().unwrap();
        match tables.get_mut(name) {
            Some(t) => {
                if row.len() != t.columns.len() {
                    log::warn!(
                        "recorder: row width {} does not match table {} ({} columns); dropped",
                        row.len(),
                        name,
                        t.columns.len()
                    );
                    return;
                }
                t.pending.push(row);
            }
            None => log::warn!("recorder: table {} was never declared; row dropped", name),
        }
    }

    /// Flush all buffered rows to disk in one batch.  Failures are logged
    /// and the buffered rows are discarded either way.
    pub fn commit(&self) {
        let mut tables = self.tables.lock().unwrap();
        for (name, t) in tables.iter_mut() {
            if t.pending.is_empty() {
                continue;
            }
            if let Err(e) = flush_table(&self.dir, t) {
                log::warn!("recorder: write to table {} failed: {}", name, e);
            }
            t.pending.clear();
        }
    }

    /// Column labels `x0..x{ndim-1}` for position coordinates.
    pub fn coord_columns(ndim: usize) -> Vec<String> {
        (0..ndim).map(|i| format!("x{}", i)).collect()
    }
}

fn flush_table(dir: &PathBuf, t: &mut Table) -> std::io::Result<()> {
    create_dir_all(dir)?;
    let mut file = OpenOptions::new().create(true).append(true).open(&t.path)?;
    if !t.header_written {
        writeln!(file, "{}", t.columns.join(","))?;
        t.header_written = true;
    }
    for row in &t.pending {
        let line: Vec<String> = row.iter().map(|v| format!("{}", v)).collect();
        writeln!(file, "{}", line.join(","))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn declaring_twice_is_idempotent() {
        let rec = Recorder::new("./target/recorder-test-idem");
        rec.table("best", &["iter", "val"]);
        rec.table("best", &["iter", "val"]);
        rec.append("best", vec![1.0, 0.5]);
        assert_eq!(rec.tables.lock().unwrap()["best"].pending.len(), 1);
    }

    #[test]
    fn mismatched_rows_are_dropped() {
        let rec = Recorder::new("./target/recorder-test-drop");
        rec.table("best", &["iter", "val"]);
        rec.append("best", vec![1.0]);
        assert!(rec.tables.lock().unwrap()["best"].pending.is_empty());
    }

    #[test]
    fn commit_writes_header_once() {
        let dir = "./target/recorder-test-commit";
        let _ = fs::remove_dir_all(dir);
        let rec = Recorder::new(dir);
        rec.table("best", &["iter", "val"]);
        rec.append("best", vec![1.0, 0.5]);
        rec.commit();
        rec.append("best", vec![2.0, 0.25]);
        rec.commit();

        let content = fs::read_to_string(format!("{}/best.csv", dir)).unwrap();
        let lines: Vec<&str> = content.trim().split('\n').collect();
        assert_eq!(lines, vec!["iter,val", "1,0.5", "2,0.25"]);
    }
}
