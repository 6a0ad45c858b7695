//! JSON Lines commit dataset reader.

use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::Path;

use crate::domain::{Commit, HarvestError, HarvestResult};

/// Commits read from a dataset file, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    pub commits: Vec<Commit>,
    /// Lines that were not valid commit records.
    pub malformed_lines: u64,
}

/// Read up to `limit` commits from a JSON Lines file.
///
/// Blank lines are ignored; malformed lines are skipped and counted. A limit
/// of zero means no limit. The only error is a dataset that cannot be
/// opened or read.
pub fn read_dataset(path: &Path, limit: Option<usize>) -> HarvestResult<Dataset> {
    let dataset_err = |source| HarvestError::Dataset {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(dataset_err)?;
    let limit = limit.filter(|n| *n > 0);

    let mut dataset = Dataset::default();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        if limit.is_some_and(|n| dataset.commits.len() >= n) {
            break;
        }
        let line_no = idx + 1;
        let line = match line {
            Ok(line) => line,
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                record_skip(&mut dataset, line_no, e.to_string());
                continue;
            }
            Err(e) => return Err(dataset_err(e)),
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Commit>(&line) {
            Ok(commit) => dataset.commits.push(commit),
            Err(e) => record_skip(&mut dataset, line_no, e.to_string()),
        }
    }

    tracing::debug!(
        path = %path.display(),
        commits = dataset.commits.len(),
        malformed = dataset.malformed_lines,
        "dataset loaded"
    );
    Ok(dataset)
}

fn record_skip(dataset: &mut Dataset, line: usize, reason: String) {
    let err = HarvestError::ParseSkip { line, reason };
    tracing::debug!(error = %err, "dataset line skipped");
    dataset.malformed_lines += 1;
}
