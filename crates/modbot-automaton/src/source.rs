//! Matrix sources.
//!
//! A [`MatrixSource`] is a blocking pull of complete samples. The line
//! protocol used by the sensor board sends one comma-separated row per line
//! and a fixed number of rows per sample.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{debug, trace};

use crate::decoder::ConnectivityMatrix;
use crate::error::{AutomatonError, AutomatonResult};

/// Supplier of connectivity matrices.
pub trait MatrixSource {
    /// Block until the next full sample is available.
    ///
    /// Returns `Ok(None)` when the source ends cleanly between samples. A
    /// source that ends partway through a sample returns an error rather
    /// than a partial matrix.
    fn next_matrix(&mut self) -> AutomatonResult<Option<ConnectivityMatrix>>;
}

/// Reads samples from a line-oriented stream.
pub struct LineMatrixSource<R> {
    reader: R,
    rows: usize,
    line: String,
}

impl<R: BufRead> LineMatrixSource<R> {
    /// Read samples of `rows` lines each from `reader`.
    ///
    /// `rows` must be at least one; a zero-row sample would never end.
    pub fn new(reader: R, rows: usize) -> AutomatonResult<Self> {
        if rows == 0 {
            return Err(AutomatonError::MalformedMatrix {
                message: "a sample needs at least one row".to_string(),
            });
        }
        Ok(Self {
            reader,
            rows,
            line: String::new(),
        })
    }
}

impl LineMatrixSource<BufReader<File>> {
    /// Open a file or character device.
    pub fn open(path: impl AsRef<Path>, rows: usize) -> AutomatonResult<Self> {
        let file = File::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), rows, "matrix_source_opened");
        Self::new(BufReader::new(file), rows)
    }
}

/// Parse one comma-separated row.
pub fn parse_row(line: &str) -> AutomatonResult<Vec<u8>> {
    line.split(',')
        .map(|cell| {
            cell.trim()
                .parse::<u8>()
                .map_err(|_| AutomatonError::MalformedMatrix {
                    message: format!(
                        "cell '{}' in row '{}' is not a value in 0..=255",
                        cell.trim(),
                        line
                    ),
                })
        })
        .collect()
}

impl<R: BufRead> MatrixSource for LineMatrixSource<R> {
    fn next_matrix(&mut self) -> AutomatonResult<Option<ConnectivityMatrix>> {
        let mut rows = Vec::with_capacity(self.rows);

        while rows.len() < self.rows {
            self.line.clear();
            if self.reader.read_line(&mut self.line)? == 0 {
                if rows.is_empty() {
                    return Ok(None);
                }
                return Err(AutomatonError::ShortRead {
                    expected: self.rows,
                    received: rows.len(),
                });
            }
            let line = self.line.trim();
            if line.is_empty() {
                continue;
            }
            trace!(line, "matrix_row_read");
            rows.push(parse_row(line)?);
        }

        ConnectivityMatrix::new(rows).map(Some)
    }
}

/// Replays a fixed list of samples.
#[derive(Debug, Clone, Default)]
pub struct ReplaySource {
    samples: VecDeque<ConnectivityMatrix>,
}

impl ReplaySource {
    pub fn new(samples: impl IntoIterator<Item = ConnectivityMatrix>) -> Self {
        Self {
            samples: samples.into_iter().collect(),
        }
    }

    /// Remaining samples.
    pub fn remaining(&self) -> usize {
        self.samples.len()
    }
}

impl MatrixSource for ReplaySource {
    fn next_matrix(&mut self) -> AutomatonResult<Option<ConnectivityMatrix>> {
        Ok(self.samples.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_reads_complete_samples() {
        let input = "1,0,0\n0,12,0\n0,0,28\n\n0,0,0\n0,0,0\n0,0,0\n";
        let mut source = LineMatrixSource::new(Cursor::new(input), 3).unwrap();

        let first = source.next_matrix().unwrap().unwrap();
        assert_eq!(first.rows()[1], vec![0, 12, 0]);
        let second = source.next_matrix().unwrap().unwrap();
        assert!(second.rows().iter().flatten().all(|&v| v == 0));
        assert!(source.next_matrix().unwrap().is_none());
    }

    #[test]
    fn test_short_read_is_an_error() {
        let mut source = LineMatrixSource::new(Cursor::new("1,0,0\n0,12,0\n"), 3).unwrap();
        assert!(matches!(
            source.next_matrix(),
            Err(AutomatonError::ShortRead {
                expected: 3,
                received: 2
            })
        ));
    }

    #[test]
    fn test_bad_cell_is_an_error() {
        let mut source = LineMatrixSource::new(Cursor::new("1,x,0\n"), 1).unwrap();
        assert!(matches!(
            source.next_matrix(),
            Err(AutomatonError::MalformedMatrix { .. })
        ));
        assert!(parse_row("256").is_err());
        assert_eq!(parse_row(" 4 , 20 ").unwrap(), vec![4, 20]);
    }

    #[test]
    fn test_zero_rows_rejected() {
        assert!(matches!(
            LineMatrixSource::new(Cursor::new(""), 0),
            Err(AutomatonError::MalformedMatrix { .. })
        ));
        assert!(matches!(
            LineMatrixSource::new(Cursor::new("0,0\n0,0\n"), 0),
            Err(AutomatonError::MalformedMatrix { .. })
        ));
    }

    #[test]
    fn test_replay_source_drains() {
        let sample = ConnectivityMatrix::new(vec![vec![0]]).unwrap();
        let mut source = ReplaySource::new([sample.clone(), sample]);
        assert_eq!(source.remaining(), 2);
        assert!(source.next_matrix().unwrap().is_some());
        assert!(source.next_matrix().unwrap().is_some());
        assert!(source.next_matrix().unwrap().is_none());
    }
}
